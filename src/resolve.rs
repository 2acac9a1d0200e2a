use boxr_core::path::{join_request_path, normalize_request_path};
use boxr_core::policy::PathPolicy;
use boxr_core::{Error, Result};

use crate::boxes::{BoxFile, ResourceBox};
use crate::overlay::OverlayBox;

/// Status used for content served from the boxes or the catchall target.
pub const STATUS_OK: u16 = 200;
/// Status whose override page is served when nothing else matched.
pub const STATUS_NOT_FOUND: u16 = 404;

/// A request answered by [`Resolver::resolve`].
#[derive(Debug)]
pub struct Resolved {
    pub status: u16,
    pub path: String,
    pub file: BoxFile,
}

/// Answers request paths from an overlay of boxes under a validated policy.
///
/// Resolution order for a request:
/// 1. the requested path (directories map to the index document),
///    if the policy allows it;
/// 2. the catchall target, if the catchall matches the request;
/// 3. the page configured for status 404.
#[derive(Debug, Clone)]
pub struct Resolver {
    boxes: OverlayBox,
    policy: PathPolicy,
}

impl Resolver {
    /// Validate `policy` against `boxes` and build a resolver.
    ///
    /// Every configuration problem is reported at once.
    pub fn new(boxes: OverlayBox, mut policy: PathPolicy) -> Result<Self> {
        let errors = policy.validate(&boxes);
        Error::collapse(errors)?;
        tracing::debug!(
            boxes = boxes.len(),
            index = policy.index(),
            "resolver ready"
        );
        Ok(Self { boxes, policy })
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    pub fn resolve(&self, request: &str) -> Result<Resolved> {
        let path = normalize_request_path(request)?;
        let index = self.policy.index();
        let candidate = if request.ends_with('/') && !index.is_empty() {
            join_request_path(&path, index)
        } else {
            path.clone()
        };

        if let Some(found) = self.lookup(candidate)? {
            return Ok(found);
        }

        if self.policy.catchall.matches(&path)?
            && let Some(target) = self.policy.catchall.target()
        {
            tracing::debug!(request, target, "serving catchall target");
            return self.open_as(STATUS_OK, target);
        }

        if let Some(page) = self.resolve_status(STATUS_NOT_FOUND)? {
            tracing::debug!(request, page = %page.path, "serving not found page");
            return Ok(page);
        }
        Err(Error::not_found("resolve", request))
    }

    /// The page configured for `code`, if any exists in the boxes.
    pub fn resolve_status(&self, code: u16) -> Result<Option<Resolved>> {
        let page = self.policy.find_status_code(code);
        if page.is_empty() {
            return Ok(None);
        }
        match self.open_as(code, page) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(err) if err.is_not_found() => {
                tracing::warn!(code, page, "status code page is missing");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn close(&self) -> Result<()> {
        self.boxes.close()
    }

    fn lookup(&self, candidate: String) -> Result<Option<Resolved>> {
        if !self.policy.path_allowed(&candidate)? {
            tracing::debug!(path = %candidate, "path denied by policy");
            return Ok(None);
        }
        let file = match self.boxes.open(&candidate) {
            Ok(file) => file,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if !file.info().is_dir {
            return Ok(Some(Resolved {
                status: STATUS_OK,
                path: candidate,
                file,
            }));
        }

        let index = self.policy.index();
        if index.is_empty() {
            return Ok(None);
        }
        let index_path = join_request_path(&candidate, index);
        if !self.policy.path_allowed(&index_path)? {
            return Ok(None);
        }
        match self.boxes.open(&index_path) {
            Ok(file) if !file.info().is_dir => Ok(Some(Resolved {
                status: STATUS_OK,
                path: index_path,
                file,
            })),
            Ok(_) => Ok(None),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn open_as(&self, status: u16, path: &str) -> Result<Resolved> {
        let file = self.boxes.open(path)?;
        Ok(Resolved {
            status,
            path: path.to_string(),
            file,
        })
    }
}
