//! Configuration loading and discovery for `texscale.toml`

use super::schema::TexscaleConfig;
use crate::kernel::KernelKind;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "texscale.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse texscale.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub scale: Option<u32>,
    pub jobs: Option<usize>,
    pub kernel: Option<KernelKind>,
    pub optimize: Option<bool>,
    pub max_dimension: Option<u32>,
}

/// Find texscale.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for texscale.toml
/// 2. Check XDG_CONFIG_HOME/texscale/texscale.toml (or ~/.config/texscale/texscale.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find texscale.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("texscale").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find texscale.toml by walking up from `start`.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration.
///
/// With an explicit `path` that file must exist. Otherwise the file is
/// located with [`find_config`]; if none is found the defaults are used.
///
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("packs/texscale.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<TexscaleConfig, ConfigError> {
    let config = read_config(path)?;
    check(&config)?;
    Ok(config)
}

/// Load configuration, apply CLI overrides, then validate the result once.
///
/// A bad value in the file is accepted if a CLI argument replaces it.
pub fn load_config_with_overrides(
    path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<TexscaleConfig, ConfigError> {
    let mut config = read_config(path)?;
    apply_overrides(&mut config, overrides);
    check(&config)?;
    Ok(config)
}

/// Locate and parse the config without validating it.
fn read_config(path: Option<&Path>) -> Result<TexscaleConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            log::debug!("Loading config from {}", p.display());
            let contents = fs::read_to_string(&p)?;
            Ok(toml::from_str(&contents)?)
        }
        None => Ok(default_config()),
    }
}

fn check(config: &TexscaleConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
    }
}

/// Configuration used when no texscale.toml is found.
pub fn default_config() -> TexscaleConfig {
    TexscaleConfig::default()
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. The merged
/// configuration is validated again.
pub fn merge_cli_overrides(
    config: &mut TexscaleConfig,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    apply_overrides(config, overrides);
    check(config)
}

fn apply_overrides(config: &mut TexscaleConfig, overrides: &CliOverrides) {
    if let Some(scale) = overrides.scale {
        config.upscale.scale = scale;
    }
    if let Some(jobs) = overrides.jobs {
        config.upscale.jobs = Some(jobs);
    }
    if let Some(kernel) = overrides.kernel {
        config.upscale.kernel = kernel;
    }
    if let Some(optimize) = overrides.optimize {
        config.upscale.optimize = optimize;
    }
    if let Some(max_dimension) = overrides.max_dimension {
        config.limits.max_dimension = max_dimension;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[upscale]\nscale = 2");

        assert_eq!(find_config_from(temp.path().to_path_buf()), Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "");

        let subdir = temp.path().join("assets").join("minecraft");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_config_from(subdir), Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            r#"
[upscale]
scale = 6
kernel = "nearest"

[limits]
max_dimension = 1024
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.upscale.scale, 6);
        assert_eq!(config.upscale.kernel, KernelKind::Nearest);
        assert_eq!(config.limits.max_dimension, 1024);
        assert_eq!(config.cull.threshold, 191);
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");

        assert!(matches!(load_config(Some(&config_path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[upscale]\nscale = 1\n");

        match load_config(Some(&config_path)) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("upscale.scale"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_override_replaces_invalid_file_value() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[upscale]\nscale = 9\n");

        let overrides = CliOverrides { scale: Some(2), ..Default::default() };
        let config = load_config_with_overrides(Some(&config_path), &overrides)
            .expect("override should replace the bad value");
        assert_eq!(config.upscale.scale, 2);

        let result = load_config_with_overrides(Some(&config_path), &CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_max_dimension_override() {
        let mut config = default_config();
        let overrides = CliOverrides { max_dimension: Some(512), ..Default::default() };
        merge_cli_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.limits.max_dimension, 512);

        let overrides = CliOverrides { max_dimension: Some(0), ..Default::default() };
        assert!(matches!(
            merge_cli_overrides(&mut config, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        let overrides = CliOverrides {
            scale: Some(2),
            jobs: Some(3),
            kernel: Some(KernelKind::Nearest),
            optimize: Some(false),
            ..Default::default()
        };

        merge_cli_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.upscale.scale, 2);
        assert_eq!(config.upscale.jobs, Some(3));
        assert_eq!(config.upscale.kernel, KernelKind::Nearest);
        assert!(!config.upscale.optimize);
        assert_eq!(config.limits.max_dimension, 2048);
    }

    #[test]
    fn test_merge_cli_overrides_rejects_bad_scale() {
        let mut config = default_config();
        let overrides = CliOverrides { scale: Some(8), ..Default::default() };
        assert!(matches!(
            merge_cli_overrides(&mut config, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_merge_empty_overrides_is_noop() {
        let mut config = default_config();
        merge_cli_overrides(&mut config, &CliOverrides::default()).unwrap();
        assert_eq!(config, default_config());
    }
}
