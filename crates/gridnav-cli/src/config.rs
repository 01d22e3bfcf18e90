//! Grid configuration loading – `--config`, `$GRIDNAV_CONFIG` or
//! `~/.gridnav/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use gridnav_types::{GridConfig, GridNavError};
use tracing::warn;

/// Env-var naming the configuration file.
pub const CONFIG_ENV: &str = "GRIDNAV_CONFIG";

/// Env-var seeding the simulated world.
pub const SEED_ENV: &str = "GRIDNAV_SEED";

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the default location; the built-in demo world is used.
    BuiltIn,
}

/// Return the path to `~/.gridnav/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gridnav").join("config.toml")
}

/// Resolve and load the configuration.
///
/// An explicit path (flag or [`CONFIG_ENV`]) must exist.  A missing file at
/// the default location falls back to [`GridConfig::default`].
pub fn load(explicit: Option<&Path>) -> Result<(ConfigSource, GridConfig), GridNavError> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    match explicit {
        Some(path) => match load_from(&path)? {
            Some(cfg) => Ok((ConfigSource::File(path), cfg)),
            None => Err(GridNavError::Config(format!(
                "config file {} does not exist",
                path.display()
            ))),
        },
        None => {
            let path = config_path();
            match load_from(&path)? {
                Some(cfg) => Ok((ConfigSource::File(path), cfg)),
                None => {
                    let mut cfg = GridConfig::default();
                    apply_env_overrides(&mut cfg);
                    cfg.validate()?;
                    Ok((ConfigSource::BuiltIn, cfg))
                }
            }
        }
    }
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<GridConfig>, GridNavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        GridNavError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg = GridConfig::parse_toml(&raw).map_err(|e| match e {
        GridNavError::Config(msg) => GridNavError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `GRIDNAV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GRIDNAV_GOAL_CONFIDENCE` | `sensing.goal_confidence` |
/// | `GRIDNAV_MAX_ITERATIONS` | `solver.max_iterations` |
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut GridConfig) {
    if let Ok(v) = std::env::var("GRIDNAV_GOAL_CONFIDENCE") {
        match v.parse::<f64>() {
            Ok(p) => cfg.sensing.goal_confidence = p,
            Err(_) => warn!(value = %v, "ignoring unparseable GRIDNAV_GOAL_CONFIDENCE"),
        }
    }
    if let Ok(v) = std::env::var("GRIDNAV_MAX_ITERATIONS") {
        match v.parse::<usize>() {
            Ok(n) => cfg.solver.max_iterations = n,
            Err(_) => warn!(value = %v, "ignoring unparseable GRIDNAV_MAX_ITERATIONS"),
        }
    }
}

/// Seed from [`SEED_ENV`], if set and numeric.
pub fn seed_from_env() -> Option<u64> {
    let raw = std::env::var(SEED_ENV).ok()?;
    match raw.parse() {
        Ok(seed) => Some(seed),
        Err(_) => {
            warn!(value = %raw, "ignoring unparseable {SEED_ENV}");
            None
        }
    }
}
