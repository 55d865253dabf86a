/// Configuration system for benchctl.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::BenchConfig::default()`]
/// 2. **User global config**: `~/.benchctl/config.toml`
/// 3. **Project local config**: `.benchctl.toml` in the current working directory
/// 4. **Environment variables**: `BENCHCTL_*` overrides (highest precedence)
///
/// Layers are merged at the key level: a file that only sets
/// `runner.base_url` leaves every other value from the previous layer intact.
///
/// # Usage
///
/// ```rust,ignore
/// use benchctl::config;
///
/// let cfg = config::load();
/// let client = RunnerClient::from_config(&cfg.runner);
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::BenchConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars.
pub fn load() -> BenchConfig {
    let mut config = load_layers(&[global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config);
    config
}

/// Merge the given TOML files over the built-in defaults.
///
/// Missing or malformed files are skipped so a broken config never stops
/// the CLI from reaching the runner with defaults.
pub fn load_layers(paths: &[Option<PathBuf>]) -> BenchConfig {
    let Ok(mut merged) = toml::Value::try_from(BenchConfig::default()) else {
        return BenchConfig::default();
    };

    for path in paths.iter().flatten() {
        if let Some(layer) = load_toml_value(path) {
            merge_values(&mut merged, layer);
        }
    }

    merged.try_into().unwrap_or_default()
}

/// Read a TOML file into a raw value tree.
fn load_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Deep-merge `overlay` into `base`: tables merge key by key, any other
/// value replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.benchctl/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".benchctl").join("config.toml"))
}

/// Path to the project local config: `.benchctl.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".benchctl.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None if path == "~" => dirs::home_dir(),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `BENCHCTL_URL`: runner base URL
/// - `BENCHCTL_TIMEOUT_MS`: per-request timeout
/// - `BENCHCTL_POLL_MS`: poll interval
/// - `BENCHCTL_HISTORY_LIMIT`: history rows per test
/// - `BENCHCTL_LOG`: event log on/off (`1`/`true`/`yes`/`on`)
/// - `BENCHCTL_FORMAT`: default output format
pub fn apply_env_overrides(config: &mut BenchConfig) {
    if let Ok(val) = std::env::var("BENCHCTL_URL")
        && !val.is_empty()
    {
        config.runner.base_url = val;
    }
    if let Ok(val) = std::env::var("BENCHCTL_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.runner.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("BENCHCTL_POLL_MS")
        && let Ok(ms) = val.parse::<u64>()
        && ms > 0
    {
        config.runner.poll_interval_ms = ms;
    }
    if let Ok(val) = std::env::var("BENCHCTL_HISTORY_LIMIT")
        && let Ok(limit) = val.parse::<usize>()
    {
        config.runner.history_limit = limit;
    }
    if let Ok(val) = std::env::var("BENCHCTL_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("BENCHCTL_FORMAT") {
        config.display.format = schema::OutputFormat::from_str_opt(Some(&val));
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.benchctl/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.benchctl/ directory")?;
    }

    fs::write(&path, BenchConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key in the global config file.
///
/// Supports dotted keys like `runner.base_url`. The value is parsed
/// according to the type of the value currently stored under that key.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_in(&path, key, value)
}

/// [`set_config_value`] against an explicit file path.
pub fn set_config_value_in(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut tree = if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(BenchConfig::default())
            .context("failed to serialize default config")?
    };

    // Fill in keys the file omits so type lookup works for any known key.
    let mut with_defaults = toml::Value::try_from(BenchConfig::default())
        .context("failed to serialize default config")?;
    merge_values(&mut with_defaults, tree.clone());
    let typed = typed_value(&with_defaults, key, value)?;

    insert_dotted(&mut tree, key, typed.clone())?;

    // Reject values that would make the file unloadable (e.g. an unknown
    // output format).
    insert_dotted(&mut with_defaults, key, typed)?;
    let _: BenchConfig = with_defaults
        .try_into()
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    let output = toml::to_string_pretty(&tree).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Parse `raw_value` into a TOML value matching the type currently stored
/// under `key` in `root`.
fn typed_value(root: &toml::Value, key: &str, raw_value: &str) -> Result<toml::Value> {
    let mut current = root;
    for part in key.split('.') {
        current = current
            .get(part)
            .with_context(|| format!("unknown config key: '{key}'"))?;
    }

    let value = match current {
        toml::Value::Boolean(_) => toml::Value::Boolean(is_truthy(raw_value)),
        toml::Value::Integer(_) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        toml::Value::Float(_) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        toml::Value::Table(_) => anyhow::bail!("'{key}' is a section, not a value"),
        _ => toml::Value::String(raw_value.to_string()),
    };

    Ok(value)
}

/// Insert a value at a dotted key, creating intermediate tables.
fn insert_dotted(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let (leaf, sections) = parts.split_last().context("empty config key")?;

    let mut current = root;
    for &part in sections {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table above '{part}' in '{key}'"))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .with_context(|| format!("expected table at '{key}'"))?
        .insert((*leaf).to_string(), value);

    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "benchctl-config-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("yes"));
        assert!(is_truthy("On"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn layers_merge_at_key_level() {
        let dir = temp_dir("layers");
        let global = dir.join("global.toml");
        let project = dir.join("project.toml");
        fs::write(
            &global,
            "[runner]\nbase_url = \"http://global:1\"\nhistory_limit = 25\n",
        )
        .unwrap();
        fs::write(&project, "[runner]\nbase_url = \"http://project:2\"\n").unwrap();

        let config = load_layers(&[Some(global), Some(project)]);
        assert_eq!(config.runner.base_url, "http://project:2");
        assert_eq!(config.runner.history_limit, 25, "global value survives");
        assert_eq!(config.runner.poll_interval_ms, 1000, "default survives");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_and_missing_layers_are_skipped() {
        let dir = temp_dir("malformed");
        let broken = dir.join("broken.toml");
        fs::write(&broken, "this is = = not toml").unwrap();

        let config = load_layers(&[Some(broken), Some(dir.join("missing.toml")), None]);
        assert_eq!(config, BenchConfig::default());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn set_value_keeps_existing_type() {
        let dir = temp_dir("set");
        let path = dir.join("config.toml");

        set_config_value_in(&path, "runner.poll_interval_ms", "250").unwrap();
        set_config_value_in(&path, "logging.enabled", "off").unwrap();
        set_config_value_in(&path, "runner.base_url", "http://x:9").unwrap();

        let config = load_layers(&[Some(path.clone())]);
        assert_eq!(config.runner.poll_interval_ms, 250);
        assert!(!config.logging.enabled);
        assert_eq!(config.runner.base_url, "http://x:9");

        assert!(set_config_value_in(&path, "runner.poll_interval_ms", "soon").is_err());
        assert!(set_config_value_in(&path, "runner.nope", "1").is_err());
        assert!(set_config_value_in(&path, "runner", "1").is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn set_value_rejects_unknown_format() {
        let dir = temp_dir("format");
        let path = dir.join("config.toml");
        assert!(set_config_value_in(&path, "display.format", "yaml").is_err());
        set_config_value_in(&path, "display.format", "csv").unwrap();
        let config = load_layers(&[Some(path)]);
        assert_eq!(config.display.format, schema::OutputFormat::Csv);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn expand_home_handles_tilde() {
        let home = dirs::home_dir();
        assert_eq!(expand_home("~/x.jsonl"), home.map(|h| h.join("x.jsonl")));
        assert_eq!(
            expand_home("/var/log/e.jsonl"),
            Some(PathBuf::from("/var/log/e.jsonl"))
        );
    }
}
