//! Capability contract every box implements.
//!
//! A box is a container of named resources addressed by `/`-rooted paths.
//! Iteration is an optional extra capability that a box advertises through
//! [`ResourceBox::as_iterable`].

use std::fmt;
use std::io::Read;

use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size_bytes: u64,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_ms: Option<u64>,
}

impl FileInfo {
    pub fn file(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            is_dir: false,
            modified_ms: None,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size_bytes: 0,
            is_dir: true,
            modified_ms: None,
        }
    }
}

/// An opened resource.
pub struct BoxFile {
    info: FileInfo,
    reader: Box<dyn Read + Send>,
}

impl BoxFile {
    pub fn new(info: FileInfo, reader: impl Read + Send + 'static) -> Self {
        Self {
            info,
            reader: Box::new(reader),
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(usize::try_from(self.info.size_bytes).unwrap_or(0));
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for BoxFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for BoxFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxFile")
            .field("info", &self.info)
            .field("reader", &"<reader>")
            .finish()
    }
}

pub trait ResourceBox: Send + Sync {
    /// Open `path`. A missing path must fail with [`crate::Error::NotFound`].
    fn open(&self, path: &str) -> Result<BoxFile>;

    /// Describe `path`. A missing path must fail with [`crate::Error::NotFound`].
    fn info(&self, path: &str) -> Result<FileInfo>;

    fn close(&self) -> Result<()>;

    /// Boxes that can walk their entries return themselves here.
    fn as_iterable(&self) -> Option<&dyn IterableBox> {
        None
    }
}

pub type FilePredicate<'a> = &'a dyn Fn(&FileInfo) -> Result<bool>;

pub type FileCallback<'a> = &'a mut dyn FnMut(&FileInfo) -> Result<()>;

pub trait IterableBox: ResourceBox {
    /// Call `callback` for every entry accepted by `predicate`.
    ///
    /// An error from either closure stops the walk and is returned.
    fn for_each(&self, predicate: FilePredicate<'_>, callback: FileCallback<'_>) -> Result<()>;
}

pub fn accept_all(_: &FileInfo) -> Result<bool> {
    Ok(true)
}
