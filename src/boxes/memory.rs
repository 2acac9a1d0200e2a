use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use boxr_core::path::normalize_request_path;
use boxr_core::{Error, Result};

use super::{BoxFile, FileCallback, FileInfo, FilePredicate, IterableBox, ResourceBox};

/// A box holding its resources in memory.
///
/// Directories are implied by the file paths. After [`ResourceBox::close`]
/// every lookup fails with [`Error::Closed`].
#[derive(Debug)]
pub struct MemoryBox {
    name: String,
    files: BTreeMap<String, Arc<[u8]>>,
    closed: AtomicBool,
}

impl MemoryBox {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_files<P, C>(
        name: impl Into<String>,
        files: impl IntoIterator<Item = (P, C)>,
    ) -> Result<Self>
    where
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let mut out = Self::new(name);
        for (path, content) in files {
            out.insert(path.as_ref(), content)?;
        }
        Ok(out)
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let path = normalize_request_path(path)?;
        if path == "/" {
            return Err(Error::InvalidPath(
                "the root of a box cannot hold content".to_string(),
            ));
        }
        let content: Vec<u8> = content.into();
        self.files.insert(path, Arc::from(content));
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed(self.name.clone()));
        }
        Ok(())
    }

    fn is_dir(&self, path: &str) -> bool {
        if path == "/" {
            return true;
        }
        let prefix = format!("{path}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(candidate, _)| candidate.starts_with(&prefix))
    }

    fn lookup(&self, op: &'static str, path: &str) -> Result<FileInfo> {
        self.ensure_open()?;
        let normalized = normalize_request_path(path)?;
        if let Some(content) = self.files.get(&normalized) {
            return Ok(FileInfo::file(normalized, content.len() as u64));
        }
        if self.is_dir(&normalized) {
            return Ok(FileInfo::dir(normalized));
        }
        Err(Error::not_found(op, path))
    }
}

impl ResourceBox for MemoryBox {
    fn open(&self, path: &str) -> Result<BoxFile> {
        let info = self.lookup("open", path)?;
        let content = self
            .files
            .get(&info.path)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()));
        Ok(BoxFile::new(info, Cursor::new(content)))
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        self.lookup("info", path)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn as_iterable(&self) -> Option<&dyn IterableBox> {
        Some(self)
    }
}

impl IterableBox for MemoryBox {
    fn for_each(&self, predicate: FilePredicate<'_>, callback: FileCallback<'_>) -> Result<()> {
        self.ensure_open()?;
        for (path, content) in &self.files {
            let info = FileInfo::file(path.clone(), content.len() as u64);
            if predicate(&info)? {
                callback(&info)?;
            }
        }
        Ok(())
    }
}
