use std::fmt;
use std::sync::Arc;

use boxr_core::{Error, Result};

use crate::boxes::{BoxFile, FileCallback, FileInfo, FilePredicate, IterableBox, ResourceBox};

/// An ordered stack of boxes presented as a single box.
///
/// Lookups search front to back and the first box holding a path wins;
/// later boxes holding the same path are shadowed. Only
/// [`Error::NotFound`] falls through to the next box, any other error is
/// returned as is.
///
/// Iteration concatenates the boxes' own iterations in order without
/// removing shadowed paths, so a path may be yielded more than once.
#[derive(Clone, Default)]
pub struct OverlayBox {
    boxes: Vec<Arc<dyn ResourceBox>>,
}

impl fmt::Debug for OverlayBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayBox")
            .field("boxes", &self.boxes.len())
            .finish()
    }
}

impl OverlayBox {
    pub fn new(boxes: Vec<Arc<dyn ResourceBox>>) -> Self {
        Self { boxes }
    }

    /// A new overlay with `resource_box` appended at the lowest priority.
    ///
    /// `self` is left untouched.
    pub fn with(&self, resource_box: Arc<dyn ResourceBox>) -> Self {
        let mut boxes = Vec::with_capacity(self.boxes.len() + 1);
        boxes.extend(self.boxes.iter().cloned());
        boxes.push(resource_box);
        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Whether every box can be iterated.
    pub fn supports_iteration(&self) -> bool {
        self.boxes.iter().all(|b| b.as_iterable().is_some())
    }

    fn first_found<T>(
        &self,
        op: &'static str,
        path: &str,
        lookup: impl Fn(&dyn ResourceBox) -> Result<T>,
    ) -> Result<T> {
        for (idx, resource_box) in self.boxes.iter().enumerate() {
            match lookup(resource_box.as_ref()) {
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    tracing::debug!(op, path, box_index = idx, err = %err, "overlay lookup failed");
                    return Err(err);
                }
                Ok(found) => return Ok(found),
            }
        }
        Err(Error::not_found(op, path))
    }
}

impl ResourceBox for OverlayBox {
    fn open(&self, path: &str) -> Result<BoxFile> {
        self.first_found("open", path, |b| b.open(path))
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        self.first_found("info", path, |b| b.info(path))
    }

    /// Close every box, even after failures.
    ///
    /// One failure is returned verbatim; several are combined into an
    /// [`Error::Aggregate`] in box order.
    fn close(&self) -> Result<()> {
        let mut errors = Vec::new();
        for (idx, resource_box) in self.boxes.iter().enumerate() {
            if let Err(err) = resource_box.close() {
                tracing::warn!(box_index = idx, err = %err, "failed to close box");
                errors.push(err);
            }
        }
        Error::collapse(errors)
    }

    fn as_iterable(&self) -> Option<&dyn IterableBox> {
        Some(self)
    }
}

impl IterableBox for OverlayBox {
    /// Fails with [`Error::IterationUnsupported`] before visiting anything if
    /// any box lacks the capability.
    fn for_each(&self, predicate: FilePredicate<'_>, callback: FileCallback<'_>) -> Result<()> {
        let iterables = self
            .boxes
            .iter()
            .map(|b| b.as_iterable().ok_or(Error::IterationUnsupported))
            .collect::<Result<Vec<_>>>()?;
        for iterable in iterables {
            iterable.for_each(predicate, &mut *callback)?;
        }
        Ok(())
    }
}
