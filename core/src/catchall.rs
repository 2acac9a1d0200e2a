use serde::{Deserialize, Serialize};

use crate::pattern::{PatternCache, any_match};
use crate::resource::ResourceBox;
use crate::{Error, Result};

/// Fallback target served for requests that matched nothing in the boxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catchall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    includes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excludes: Option<Vec<String>>,

    #[serde(skip)]
    includes_cache: PatternCache,
    #[serde(skip)]
    excludes_cache: PatternCache,
}

impl Catchall {
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|target| !target.is_empty())
    }

    pub fn includes(&self) -> &[String] {
        self.includes.as_deref().unwrap_or_default()
    }

    pub fn excludes(&self) -> &[String] {
        self.excludes.as_deref().unwrap_or_default()
    }

    /// Replace the include patterns; the next match recompiles them.
    pub fn set_includes(&mut self, includes: Option<Vec<String>>) {
        self.includes = includes;
        self.includes_cache.invalidate();
    }

    /// Replace the exclude patterns; the next match recompiles them.
    pub fn set_excludes(&mut self, excludes: Option<Vec<String>>) {
        self.excludes = excludes;
        self.excludes_cache.invalidate();
    }

    /// Whether a request for `candidate` that found nothing falls back to the target.
    pub fn matches(&self, candidate: &str) -> Result<bool> {
        if self.target().is_none() {
            return Ok(false);
        }
        let includes = self
            .includes_cache
            .get_or_compile("paths.catchall.includes", self.includes())?;
        let excludes = self
            .excludes_cache
            .get_or_compile("paths.catchall.excludes", self.excludes())?;

        if !includes.is_empty() && !any_match(&includes, candidate) {
            return Ok(false);
        }
        if !excludes.is_empty() && any_match(&excludes, candidate) {
            return Ok(false);
        }
        Ok(true)
    }

    pub fn validate(&mut self, using: &dyn ResourceBox) -> Vec<Error> {
        let mut errors = Vec::new();
        if let Some(target) = self.target() {
            match using.info(target) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => errors.push(Error::InvalidConfig(format!(
                    "paths.catchall.target = {target:?} - path does not exist in box"
                ))),
                Err(err) => errors.push(Error::InvalidConfig(format!(
                    "paths.catchall.target = {target:?} - cannot read path information: {err}"
                ))),
            }
        }
        errors.extend(
            self.includes_cache
                .rebuild("paths.catchall.includes", self.includes()),
        );
        errors.extend(
            self.excludes_cache
                .rebuild("paths.catchall.excludes", self.excludes()),
        );
        errors
    }

    pub fn merge(&self, with: &Catchall) -> Catchall {
        let mut result = self.clone();
        if let Some(target) = &with.target {
            result.target = Some(target.clone());
        }
        if let Some(includes) = &with.includes {
            result.set_includes(Some(includes.clone()));
        }
        if let Some(excludes) = &with.excludes {
            result.set_excludes(Some(excludes.clone()));
        }
        result
    }
}
