//! Build configuration.
//!
//! Every setting a stage needs is carried by an explicitly constructed
//! [`GenConfig`] that callers pass into the stages they build. Nothing is read
//! from process-wide state, so two builds with different settings can run
//! side by side in one process and each stage can be tested on its own.
//!
//! ## Config File
//!
//! [`load_config`] reads an optional `gen.toml` from a directory and layers it
//! over the stock defaults:
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [pipeline]
//! threads = 4               # Transform workers (omit for auto = CPU cores)
//!
//! [minify]
//! html = true               # Minify .html/.htm pages
//! css = true                # Minify .css pages
//! js = true                 # Minify .js/.mjs pages
//! xml = true                # Minify .xml/.svg pages
//! keep_comments = false     # Keep HTML and XML comments
//! minify_inline = true      # Minify <style> blocks inside HTML
//!
//! [gzip]
//! level = 6                 # 0 (store) to 9 (smallest)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "gen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenConfig {
    /// Concurrency of the transform pipeline.
    pub pipeline: PipelineConfig,
    /// Which content types are minified, and how.
    pub minify: MinifyConfig,
    /// Compression settings for the gzip stage.
    pub gzip: GzipConfig,
}

impl GenConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gzip.level > 9 {
            return Err(ConfigError::Validation("gzip.level must be 0-9".into()));
        }
        if self.pipeline.threads == Some(0) {
            return Err(ConfigError::Validation(
                "pipeline.threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Transform pipeline settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Number of threads that run item transforms.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &PipelineConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Minifier settings, one switch per supported content type.
///
/// A disabled type is treated exactly like an unsupported one: its pages pass
/// through the minify stage unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    pub html: bool,
    pub css: bool,
    pub js: bool,
    pub xml: bool,
    /// Keep `<!-- -->` comments in HTML and XML output.
    pub keep_comments: bool,
    /// Minify `<style>` contents embedded in HTML. Embedded scripts are
    /// never rewritten.
    pub minify_inline: bool,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            html: true,
            css: true,
            js: true,
            xml: true,
            keep_comments: false,
            minify_inline: true,
        }
    }
}

/// Gzip stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GzipConfig {
    /// Compression level, 0 (store) to 9 (smallest output).
    pub level: u32,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GenConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `gen.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `gen.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GenConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GenConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `gen.toml` in the given directory.
///
/// Missing file means stock defaults. User values are merged on top of the
/// defaults, unknown keys are rejected and the result is validated.
pub fn load_config(dir: &Path) -> Result<GenConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `gen.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# Site Build Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# Threads that run page transforms.
# Omit or comment out to auto-detect (= number of CPU cores).
# threads = 4

# ---------------------------------------------------------------------------
# Minification
# ---------------------------------------------------------------------------
[minify]
# Content types to minify. Disabled types are written unchanged.
html = true
css = true
js = true
xml = true

# Keep <!-- comments --> in HTML and XML.
keep_comments = false

# Also minify <style> blocks embedded in HTML. <script> blocks are kept as-is.
minify_inline = true

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[gzip]
# 0 = store only, 9 = smallest output.
level = 6
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = GenConfig::default();
        assert_eq!(config.pipeline.threads, None);
        assert!(config.minify.html && config.minify.css && config.minify.js);
        assert!(config.minify.xml);
        assert!(!config.minify.keep_comments);
        assert!(config.minify.minify_inline);
        assert_eq!(config.gzip.level, 6);
    }

    #[test]
    fn parse_partial_config() {
        let config: GenConfig = toml::from_str(
            r#"
[minify]
js = false
"#,
        )
        .unwrap();
        assert!(!config.minify.js);
        // Everything else keeps its default
        assert!(config.minify.css);
        assert_eq!(config.gzip.level, 6);
    }

    // =========================================================================
    // effective_threads tests
    // =========================================================================

    fn cores() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    #[test]
    fn effective_threads_auto() {
        let config = PipelineConfig { threads: None };
        assert_eq!(effective_threads(&config), cores());
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = PipelineConfig {
            threads: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores());
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = PipelineConfig { threads: Some(1) };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("[gzip]\nlevel = 6").unwrap();
        let overlay: toml::Value = toml::from_str("[gzip]\nlevel = 9").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["gzip"]["level"].as_integer(), Some(9));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("[minify]\ncss = true\njs = true").unwrap();
        let overlay: toml::Value = toml::from_str("[minify]\njs = false").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["minify"]["css"].as_bool(), Some(true));
        assert_eq!(merged["minify"]["js"].as_bool(), Some(false));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_config(tmp.path()).unwrap(), GenConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[pipeline]\nthreads = 2\n\n[gzip]\nlevel = 9\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.pipeline.threads, Some(2));
        assert_eq!(config.gzip.level, 9);
        assert_eq!(config.minify, MinifyConfig::default());
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[minify]\nhtlm = false\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[gzip]\nlevel = 12\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_zero_threads() {
        let mut config = GenConfig::default();
        config.pipeline.threads = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: GenConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, GenConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value();
        let table = value.as_table().unwrap();
        assert!(table.contains_key("pipeline"));
        assert!(table.contains_key("minify"));
        assert!(table.contains_key("gzip"));
    }
}
