use std::path::Path;

use anyhow::Context;
use boxr_core::Error;
use boxr_core::path::normalize_request_path;
use boxr_core::pattern::compile_patterns;
use boxr_core::policy::PathPolicy;
use serde::{Deserialize, Serialize};

const MAX_CONFIG_BYTES: usize = 4 * 1024 * 1024;

/// Environment variable holding a JSON override layer for `paths`.
pub const PATHS_ENV_VAR: &str = "BOXR_PATHS_JSON";

/// Top level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxrConfig {
    #[serde(default)]
    pub paths: PathPolicy,
}

impl BoxrConfig {
    pub fn merge(&self, with: &BoxrConfig) -> BoxrConfig {
        BoxrConfig {
            paths: self.paths.merge(&with.paths),
        }
    }
}

/// Load one configuration layer (`.toml` or `.json`) and check it on its own.
///
/// Every error names the layer file. Checks that need the boxes (whether a
/// page exists) are left to [`PathPolicy::validate`].
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<BoxrConfig> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("cannot read config layer {}", path.display()))?;
    if bytes.len() > MAX_CONFIG_BYTES {
        anyhow::bail!(
            "config layer {} is too large ({} bytes; max {} bytes)",
            path.display(),
            bytes.len(),
            MAX_CONFIG_BYTES
        );
    }
    let raw = String::from_utf8(bytes)
        .with_context(|| format!("config layer {} is not UTF-8", path.display()))?;
    let config: BoxrConfig = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse config layer {} as JSON", path.display()))?,
        Some("toml") | None => toml::from_str(&raw)
            .with_context(|| format!("cannot parse config layer {} as TOML", path.display()))?,
        Some(other) => anyhow::bail!(
            "config layer {} has unsupported extension {other:?} (expected .toml or .json)",
            path.display()
        ),
    };
    check_paths_layer(&config.paths)
        .with_context(|| format!("invalid config layer {}", path.display()))?;
    Ok(config)
}

/// Parse the `paths` override layer carried by [`PATHS_ENV_VAR`].
pub fn paths_layer_from_env(value: Option<&str>) -> anyhow::Result<Option<PathPolicy>> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let paths: PathPolicy =
        serde_json::from_str(raw).with_context(|| format!("cannot parse {PATHS_ENV_VAR} as JSON"))?;
    check_paths_layer(&paths).with_context(|| format!("invalid {PATHS_ENV_VAR}"))?;
    Ok(Some(paths))
}

/// Box-independent checks of a single layer: every page is a usable request
/// path and every pattern compiles. All problems are reported together.
fn check_paths_layer(paths: &PathPolicy) -> boxr_core::Result<()> {
    let mut errors = Vec::new();
    let mut check_page = |field: String, page: &str| {
        if let Err(err) = normalize_request_path(page) {
            errors.push(Error::InvalidConfig(format!("{field} = {page:?} - {err}")));
        }
    };
    if let Some(index) = paths.index.as_deref().filter(|index| !index.is_empty()) {
        check_page("paths.index".to_string(), index);
    }
    for (code, page) in paths.status_codes.iter().flatten() {
        check_page(format!("paths.statusCodes[{code}]"), page);
    }
    if let Some(target) = paths.catchall.target() {
        check_page("paths.catchall.target".to_string(), target);
    }

    for (field, patterns) in [
        ("paths.includes", paths.includes()),
        ("paths.excludes", paths.excludes()),
        ("paths.catchall.includes", paths.catchall.includes()),
        ("paths.catchall.excludes", paths.catchall.excludes()),
    ] {
        if let Err(broken) = compile_patterns(field, patterns) {
            errors.extend(broken);
        }
    }
    Error::collapse(errors)
}

/// Merge defaults, then every file in order, then the environment layer.
///
/// Later layers replace whole fields of earlier ones.
pub fn load_layers(
    files: &[impl AsRef<Path>],
    env_paths: Option<&str>,
) -> anyhow::Result<BoxrConfig> {
    let mut config = BoxrConfig::default();
    for file in files {
        let file = file.as_ref();
        let layer = load_config(file)?;
        tracing::debug!(file = %file.display(), "merging config layer");
        config = config.merge(&layer);
    }
    if let Some(paths) = paths_layer_from_env(env_paths)? {
        tracing::debug!(var = PATHS_ENV_VAR, "merging environment layer");
        config = config.merge(&BoxrConfig { paths });
    }
    Ok(config)
}
