use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use boxr_core::path::normalize_request_path;
use boxr_core::{Error, Result};

use super::{BoxFile, FileCallback, FileInfo, FilePredicate, IterableBox, ResourceBox};

/// Read-only box serving the contents of a host directory.
///
/// Box paths are `/`-rooted relative to `root`. Lookups follow symlinks;
/// iteration yields symlinked files but never descends into symlinked
/// directories, so link cycles cannot recurse forever.
#[derive(Debug, Clone)]
pub struct DirectoryBox {
    root: PathBuf,
}

impl DirectoryBox {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let meta = fs::metadata(root)
            .map_err(|err| Error::Io(format!("cannot open box at {}: {err}", root.display())))?;
        if !meta.is_dir() {
            return Err(Error::Io(format!(
                "cannot open box at {}: not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn host_path(&self, normalized: &str) -> PathBuf {
        let mut out = self.root.clone();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            out.push(segment);
        }
        out
    }

    fn describe(&self, op: &'static str, path: &str) -> Result<(FileInfo, PathBuf)> {
        let normalized = normalize_request_path(path)?;
        let host = self.host_path(&normalized);
        let meta = match fs::metadata(&host) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::not_found(op, path));
            }
            Err(err) => return Err(Error::Io(format!("{op} {path}: {err}"))),
        };
        Ok((file_info(normalized, &meta), host))
    }

    fn walk(
        &self,
        dir: &Path,
        prefix: &str,
        predicate: FilePredicate<'_>,
        callback: FileCallback<'_>,
    ) -> Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 entry");
                continue;
            };
            let path = format!("{prefix}/{name}");
            let meta = if entry.file_type()?.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_dir() => {
                        tracing::debug!(path, "skipping symlinked directory");
                        continue;
                    }
                    Ok(meta) => meta,
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        tracing::debug!(path, "skipping dangling symlink");
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            } else {
                entry.metadata()?
            };
            if meta.is_dir() {
                self.walk(&entry.path(), &path, predicate, &mut *callback)?;
                continue;
            }
            let info = file_info(path, &meta);
            if predicate(&info)? {
                callback(&info)?;
            }
        }
        Ok(())
    }
}

fn file_info(path: String, meta: &fs::Metadata) -> FileInfo {
    let modified_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64);
    FileInfo {
        path,
        size_bytes: if meta.is_dir() { 0 } else { meta.len() },
        is_dir: meta.is_dir(),
        modified_ms,
    }
}

impl ResourceBox for DirectoryBox {
    fn open(&self, path: &str) -> Result<BoxFile> {
        let (info, host) = self.describe("open", path)?;
        if info.is_dir {
            return Ok(BoxFile::new(info, std::io::empty()));
        }
        let file = match fs::File::open(&host) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::not_found("open", path));
            }
            Err(err) => return Err(Error::Io(format!("open {path}: {err}"))),
        };
        Ok(BoxFile::new(info, file))
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        self.describe("info", path).map(|(info, _)| info)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn as_iterable(&self) -> Option<&dyn IterableBox> {
        Some(self)
    }
}

impl IterableBox for DirectoryBox {
    fn for_each(&self, predicate: FilePredicate<'_>, callback: FileCallback<'_>) -> Result<()> {
        self.walk(&self.root, "", predicate, callback)
    }
}
