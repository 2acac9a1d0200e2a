use std::sync::{Arc, Mutex, PoisonError};

use regex::{Regex, RegexBuilder};

use crate::Error;

const MAX_PATTERNS: usize = 1024;
const MAX_PATTERN_BYTES: usize = 4096;
const MAX_PATTERN_COMPILED_SIZE_BYTES: usize = 1_000_000;
const MAX_PATTERN_NEST_LIMIT: u32 = 128;

/// Compiled form of an include or exclude list.
pub type Matchers = Arc<[Regex]>;

fn summarize_pattern_for_error(pattern: &str) -> String {
    const MAX_BYTES: usize = 200;
    if pattern.len() <= MAX_BYTES {
        return pattern.to_string();
    }
    let mut end = MAX_BYTES;
    while end > 0 && !pattern.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    format!("{}…", &pattern[..end])
}

/// Compile every pattern of `field`, collecting one error per broken pattern.
///
/// Nothing is returned unless all patterns compile.
pub fn compile_patterns(field: &str, patterns: &[String]) -> Result<Matchers, Vec<Error>> {
    if patterns.len() > MAX_PATTERNS {
        return Err(vec![Error::InvalidPattern(format!(
            "{field} has too many patterns ({} > {})",
            patterns.len(),
            MAX_PATTERNS
        ))]);
    }

    let mut errors = Vec::new();
    let mut compiled = Vec::with_capacity(patterns.len());
    for (idx, pattern) in patterns.iter().enumerate() {
        let preview = summarize_pattern_for_error(pattern);
        if pattern.len() > MAX_PATTERN_BYTES {
            errors.push(Error::InvalidPattern(format!(
                "{field}[{idx}] = {preview:?} is too large ({} bytes; max {} bytes)",
                pattern.len(),
                MAX_PATTERN_BYTES
            )));
            continue;
        }
        match RegexBuilder::new(pattern)
            .size_limit(MAX_PATTERN_COMPILED_SIZE_BYTES)
            .nest_limit(MAX_PATTERN_NEST_LIMIT)
            .build()
        {
            Ok(regex) => compiled.push(regex),
            Err(err) => errors.push(Error::InvalidPattern(format!(
                "{field}[{idx}] = {preview:?} - pattern invalid: {err}"
            ))),
        }
    }

    if errors.is_empty() {
        Ok(compiled.into())
    } else {
        Err(errors)
    }
}

/// True if any matcher finds a match anywhere in `candidate`.
pub fn any_match(matchers: &[Regex], candidate: &str) -> bool {
    matchers.iter().any(|regex| regex.is_match(candidate))
}

/// Lazily compiled matchers for one pattern list.
///
/// The first caller compiles while holding the lock, so concurrent callers
/// wait for that result instead of compiling their own. A failed compilation
/// leaves the cache empty. Clones share the already compiled matchers.
///
/// The cache does not remember which list it compiled; its owner must
/// [`invalidate`](PatternCache::invalidate) it whenever the list changes.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: Mutex<Option<Matchers>>,
}

impl Clone for PatternCache {
    fn clone(&self) -> Self {
        Self {
            compiled: Mutex::new(self.current()),
        }
    }
}

impl PatternCache {
    fn current(&self) -> Option<Matchers> {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_built(&self) -> bool {
        self.current().is_some()
    }

    /// Return the cached matchers, compiling `patterns` if nothing is cached.
    ///
    /// On failure the first compilation error is returned.
    pub fn get_or_compile(&self, field: &str, patterns: &[String]) -> crate::Result<Matchers> {
        let mut guard = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(matchers) = guard.as_ref() {
            return Ok(Arc::clone(matchers));
        }
        let matchers = compile_patterns(field, patterns).map_err(|mut errors| errors.remove(0))?;
        *guard = Some(Arc::clone(&matchers));
        Ok(matchers)
    }

    /// Recompile unconditionally, returning every compilation error.
    pub fn rebuild(&self, field: &str, patterns: &[String]) -> Vec<Error> {
        let mut guard = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        match compile_patterns(field, patterns) {
            Ok(matchers) => {
                *guard = Some(matchers);
                Vec::new()
            }
            Err(errors) => {
                *guard = None;
                errors
            }
        }
    }

    pub fn invalidate(&mut self) {
        *self
            .compiled
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn compile_reports_every_broken_pattern() {
        let errors = compile_patterns("paths.includes", &patterns(&["(", "ok", "["])).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("paths.includes[0]"));
        assert!(errors[1].to_string().contains("paths.includes[2]"));
    }

    #[test]
    fn matching_searches_instead_of_anchoring() {
        let matchers = compile_patterns("p", &patterns(&["api"])).unwrap();
        assert!(any_match(&matchers, "/v1/api/x"));
        let anchored = compile_patterns("p", &patterns(&["^api$"])).unwrap();
        assert!(!any_match(&anchored, "/api"));
    }

    #[test]
    fn cache_compiles_once_and_shares_result() {
        let cache = PatternCache::default();
        assert!(!cache.is_built());
        let list = patterns(&["a"]);
        let first = cache.get_or_compile("p", &list).unwrap();
        let second = cache.get_or_compile("p", &list).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_compilation_is_not_cached() {
        let cache = PatternCache::default();
        assert!(cache.get_or_compile("p", &patterns(&["("])).is_err());
        assert!(!cache.is_built());
        assert!(cache.get_or_compile("p", &patterns(&["ok"])).is_ok());
    }

    #[test]
    fn invalidate_forces_recompilation() {
        let mut cache = PatternCache::default();
        let first = cache.get_or_compile("p", &patterns(&["a"])).unwrap();
        cache.invalidate();
        let second = cache.get_or_compile("p", &patterns(&["b"])).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(any_match(&second, "b"));
    }

    #[test]
    fn rebuild_clears_cache_on_error() {
        let cache = PatternCache::default();
        cache.get_or_compile("p", &patterns(&["a"])).unwrap();
        assert_eq!(cache.rebuild("p", &patterns(&["("])).len(), 1);
        assert!(!cache.is_built());
    }

    #[test]
    fn concurrent_readers_observe_one_compilation() {
        let cache = Arc::new(PatternCache::default());
        let list = patterns(&["^/api/"]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let list = list.clone();
                std::thread::spawn(move || cache.get_or_compile("p", &list).unwrap())
            })
            .collect();
        let results: Vec<Matchers> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for matchers in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], matchers));
        }
    }
}
