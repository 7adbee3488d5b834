//! Layered configuration for benchmark runs.
//!
//! Uses `figment`: defaults -> user config -> workspace config -> explicit file
//! -> environment -> CLI flags. Files are TOML named `mlbench.toml`.

use crate::params::BenchParams;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name looked up in the user config directory and the workspace.
pub const CONFIG_FILE_NAME: &str = "mlbench.toml";

/// Prefix of environment overrides, e.g. `MLBENCH_TIMING__TIME_LIMIT_SECS=2`.
pub const ENV_PREFIX: &str = "MLBENCH_";

/// Path of the per-user configuration file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "mlbench", "mlbench")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Build the figment without extracting it.
///
/// Priority (highest to lowest):
/// 1. CLI overrides (absent options must be skipped when serialized)
/// 2. Environment variables (prefixed with `MLBENCH_`)
/// 3. Explicit config file
/// 4. Workspace config (`<workspace>/mlbench.toml`)
/// 5. User config (`~/.config/mlbench/mlbench.toml`)
/// 6. Built-in defaults
pub fn figment<O: Serialize>(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: &O,
) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(BenchParams::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(CONFIG_FILE_NAME);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = config_file {
        figment = figment.merge(Toml::file(file));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment.merge(Serialized::defaults(overrides))
}

/// Resolve the parameters of a run.
///
/// Unlike the discovered files, an explicit `config_file` must exist.
pub fn load_params<O: Serialize>(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: &O,
) -> Result<BenchParams, Box<figment::Error>> {
    if let Some(file) = config_file {
        if !file.is_file() {
            return Err(Box::new(figment::Error::from(format!(
                "config file not found: {}",
                file.display()
            ))));
        }
    }
    figment(workspace, config_file, overrides)
        .extract()
        .map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{OutputFormat, TimeMethod};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_sources() {
        let dir = TempDir::new().unwrap();
        let params = load_params(Some(dir.path()), None, &json!({})).unwrap();
        assert_eq!(params.run.seed, 12345);
        assert_eq!(params.timing.method, TimeMethod::BoxFilter);
    }

    #[test]
    fn test_workspace_file_then_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[run]\nseed = 7\nbatch = \"nightly\"\n\n[timing]\ninner_loops = 5\n",
        )
        .unwrap();

        let overrides = json!({ "run": { "seed": 42 }, "output": { "format": "json" } });
        let params = load_params(Some(dir.path()), None, &overrides).unwrap();
        assert_eq!(params.run.seed, 42);
        assert_eq!(params.run.batch, "nightly");
        assert_eq!(params.timing.inner_loops, 5);
        assert_eq!(params.timing.outer_loops, 100);
        assert_eq!(params.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_params(None, Some(&missing), &json!({})).is_err());
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.toml");
        std::fs::write(&file, "[run]\ndtype = \"float16\"\n").unwrap();
        assert!(load_params(None, Some(&file), &json!({})).is_err());
    }
}
