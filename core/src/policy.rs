use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::catchall::Catchall;
use crate::path::RESERVED_MANIFEST_PATH;
use crate::pattern::{PatternCache, any_match};
use crate::resource::ResourceBox;
use crate::{Error, Result};

/// Document looked up when no explicit index is configured.
pub const DEFAULT_INDEX: &str = "/index.html";

/// HTTP status code used as a key of [`PathPolicy::status_codes`].
///
/// Accepted as an integer or as a numeric string so that TOML tables
/// (whose keys are always strings) and JSON objects both work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub fn new(code: u16) -> Result<Self> {
        if !(100..=599).contains(&code) {
            return Err(Error::InvalidConfig(format!(
                "status code {code} is out of range (100..=599)"
            )));
        }
        Ok(Self(code))
    }

}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = StatusCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an HTTP status code")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<StatusCode, E> {
                let code = u16::try_from(v)
                    .map_err(|_| E::custom(format!("status code {v} is out of range")))?;
                StatusCode::new(code).map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<StatusCode, E> {
                let v = u64::try_from(v)
                    .map_err(|_| E::custom(format!("status code {v} is out of range")))?;
                self.visit_u64(v)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<StatusCode, E> {
                let code = v
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| E::custom(format!("invalid status code {v:?}")))?;
                self.visit_u64(code)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Which request paths of a box may be served, and where unmatched or
/// erroring requests are redirected.
///
/// Every list field distinguishes "absent" (`None`, defaults apply) from
/// "empty" (`Some(vec![])`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathPolicy {
    #[serde(default)]
    pub catchall: Catchall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(
        default,
        rename = "statusCodes",
        alias = "status_codes",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_codes: Option<BTreeMap<StatusCode, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    includes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excludes: Option<Vec<String>>,

    #[serde(skip)]
    default_index: Option<String>,
    #[serde(skip)]
    includes_cache: PatternCache,
    #[serde(skip)]
    excludes_cache: PatternCache,
}

static DEFAULT_EXCLUDES: LazyLock<Vec<String>> =
    LazyLock::new(|| vec![regex::escape(RESERVED_MANIFEST_PATH)]);

impl PathPolicy {
    /// The explicit index, or the default discovered by [`PathPolicy::validate`].
    ///
    /// Empty when neither exists.
    pub fn index(&self) -> &str {
        match &self.index {
            Some(index) => index.as_str(),
            None => self.default_index.as_deref().unwrap_or_default(),
        }
    }

    pub fn status_codes(&self) -> BTreeMap<StatusCode, String> {
        self.status_codes.clone().unwrap_or_default()
    }

    /// Override page for `code`, or an empty string when none is configured.
    pub fn find_status_code(&self, code: u16) -> &str {
        self.status_codes
            .as_ref()
            .and_then(|codes| codes.get(&StatusCode(code)))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn includes(&self) -> &[String] {
        self.includes.as_deref().unwrap_or_default()
    }

    /// Configured excludes; when unset, a single pattern matching exactly
    /// [`RESERVED_MANIFEST_PATH`].
    pub fn excludes(&self) -> &[String] {
        self.excludes.as_deref().unwrap_or(DEFAULT_EXCLUDES.as_slice())
    }

    /// Replace the include patterns; the next evaluation recompiles them.
    pub fn set_includes(&mut self, includes: Option<Vec<String>>) {
        self.includes = includes;
        self.includes_cache.invalidate();
    }

    /// Replace the exclude patterns; `None` restores the default.
    pub fn set_excludes(&mut self, excludes: Option<Vec<String>>) {
        self.excludes = excludes;
        self.excludes_cache.invalidate();
    }

    /// Decide whether `candidate` may be served.
    ///
    /// A non-empty include set must match; any exclude match denies, even
    /// when an include matched. Patterns are searched, not anchored.
    pub fn path_allowed(&self, candidate: &str) -> Result<bool> {
        let includes = self
            .includes_cache
            .get_or_compile("paths.includes", self.includes())?;
        let excludes = self
            .excludes_cache
            .get_or_compile("paths.excludes", self.excludes())?;

        if !includes.is_empty() && !any_match(&includes, candidate) {
            return Ok(false);
        }
        if !excludes.is_empty() && any_match(&excludes, candidate) {
            return Ok(false);
        }
        Ok(true)
    }

    /// Check the policy against `using`, collecting every problem.
    ///
    /// Also discovers the default index and rebuilds both pattern caches.
    /// Must run before the policy is shared with concurrent readers.
    pub fn validate(&mut self, using: &dyn ResourceBox) -> Vec<Error> {
        let mut errors = self.catchall.validate(using);
        errors.extend(self.validate_index(using));
        errors.extend(self.validate_status_codes(using));
        errors.extend(
            self.includes_cache
                .rebuild("paths.includes", self.includes()),
        );
        errors.extend(
            self.excludes_cache
                .rebuild("paths.excludes", self.excludes()),
        );
        for err in &errors {
            tracing::warn!(code = err.code(), err = %err, "path policy problem");
        }
        errors
    }

    fn validate_index(&mut self, using: &dyn ResourceBox) -> Vec<Error> {
        let mut errors = Vec::new();
        match &self.index {
            Some(index) => match using.info(index) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => errors.push(Error::InvalidConfig(format!(
                    "paths.index = {index:?} - path does not exist in box"
                ))),
                Err(err) => errors.push(Error::InvalidConfig(format!(
                    "paths.index = {index:?} - cannot read path information: {err}"
                ))),
            },
            None => match using.info(DEFAULT_INDEX) {
                Ok(_) => self.default_index = Some(DEFAULT_INDEX.to_string()),
                Err(err) if err.is_not_found() => self.default_index = None,
                Err(err) => errors.push(Error::InvalidConfig(format!(
                    "cannot read path information for default index {DEFAULT_INDEX:?}: {err}"
                ))),
            },
        }
        errors
    }

    fn validate_status_codes(&self, using: &dyn ResourceBox) -> Vec<Error> {
        let mut errors = Vec::new();
        for (code, path) in self.status_codes.iter().flatten() {
            match using.info(path) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => errors.push(Error::InvalidConfig(format!(
                    "paths.statusCodes[{code}] = {path:?} - path does not exist in box"
                ))),
                Err(err) => errors.push(Error::InvalidConfig(format!(
                    "paths.statusCodes[{code}] = {path:?} - cannot read path information: {err}"
                ))),
            }
        }
        errors
    }

    /// `self` overridden field by field by every field `with` sets.
    ///
    /// Lists and the status code map are replaced wholesale, never unioned.
    /// Neither input is modified.
    pub fn merge(&self, with: &PathPolicy) -> PathPolicy {
        let mut result = self.clone();
        result.catchall = self.catchall.merge(&with.catchall);

        if let Some(index) = &with.index {
            result.index = Some(index.clone());
            result.default_index = None;
        }
        if let Some(status_codes) = &with.status_codes {
            result.status_codes = Some(status_codes.clone());
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
