//! Configuration schema types for `texscale.toml`
//!
//! Every section and field is optional; missing values take the defaults
//! documented on each field.
//!
//! ```toml
//! [upscale]
//! scale = 4
//! jobs = 8
//! kernel = "scalenx"
//! optimize = true
//!
//! [limits]
//! max_dimension = 2048
//!
//! [cull]
//! threshold = 191
//!
//! [classify]
//! painting_mode = "wrap"
//! skip = ["/font/", "/colormap/", "/gui/"]
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::kernel::{KernelAdapter, KernelError, KernelKind, ScaleFactor};
use crate::pipeline::{Processor, DEFAULT_MAX_DIMENSION};
use crate::postprocess::CULL_THRESHOLD;
use crate::settings::{ClassifyConfig, Classifier};

/// Batch upscaling options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpscaleConfig {
    /// Scale factor, 2-6
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Worker threads (default: available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    /// Upscaling kernel
    #[serde(default)]
    pub kernel: KernelKind,
    /// Run outputs through oxipng, keeping the smaller file
    #[serde(default = "default_true")]
    pub optimize: bool,
}

fn default_scale() -> u32 {
    ScaleFactor::default().get()
}

fn default_true() -> bool {
    true
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self { scale: default_scale(), jobs: None, kernel: KernelKind::default(), optimize: true }
    }
}

/// Input size limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Images wider or taller than this are passed through unscaled
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_dimension: DEFAULT_MAX_DIMENSION }
    }
}

/// Translucency culling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullConfig {
    /// Alpha below this becomes 0, at or above becomes 255
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

fn default_threshold() -> u8 {
    CULL_THRESHOLD
}

impl Default for CullConfig {
    fn default() -> Self {
        Self { threshold: CULL_THRESHOLD }
    }
}

/// Complete texscale.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexscaleConfig {
    #[serde(default)]
    pub upscale: UpscaleConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cull: CullConfig,
    /// Path markers for per-asset settings
    #[serde(default)]
    pub classify: ClassifyConfig,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "upscale.scale")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "texscale.toml: '{}' {}", self.field, self.message)
    }
}

impl TexscaleConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigValidationError { field: field.to_string(), message })
        };

        if ScaleFactor::new(self.upscale.scale).is_err() {
            push(
                "upscale.scale",
                format!("must be between {} and {}", ScaleFactor::MIN, ScaleFactor::MAX),
            );
        }
        if self.upscale.jobs == Some(0) {
            push("upscale.jobs", "must be a positive integer".to_string());
        }
        if self.limits.max_dimension == 0 {
            push("limits.max_dimension", "must be a positive integer".to_string());
        }
        if self.cull.threshold == 0 {
            push("cull.threshold", "must be between 1 and 255".to_string());
        }

        let markers = [
            ("classify.block", &self.classify.block),
            ("classify.painting", &self.classify.painting),
            ("classify.relayer", &self.classify.relayer),
            ("classify.skip", &self.classify.skip),
            ("classify.skip_suffixes", &self.classify.skip_suffixes),
        ];
        for (field, values) in markers {
            if values.iter().any(|m| m.is_empty()) {
                push(field, "must not contain empty markers".to_string());
            }
        }

        errors
    }

    /// The configured scale factor.
    pub fn scale_factor(&self) -> Result<ScaleFactor, KernelError> {
        ScaleFactor::new(self.upscale.scale)
    }

    /// Build a processor with the configured kernel, factor and limits.
    pub fn processor(&self) -> Result<Processor, KernelError> {
        let kernel = Arc::new(KernelAdapter::from_kind(self.upscale.kernel));
        Ok(Processor::new(kernel, self.scale_factor()?)
            .with_max_dimension(self.limits.max_dimension)
            .with_cull_threshold(self.cull.threshold))
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.classify.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EdgeMode;

    #[test]
    fn test_empty_config_parse() {
        let config: TexscaleConfig = toml::from_str("").unwrap();
        assert_eq!(config, TexscaleConfig::default());
        assert_eq!(config.upscale.scale, 4);
        assert!(config.upscale.optimize);
        assert_eq!(config.limits.max_dimension, 2048);
        assert_eq!(config.cull.threshold, 191);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[upscale]
scale = 2
jobs = 3
kernel = "nearest"
optimize = false

[limits]
max_dimension = 512

[cull]
threshold = 128

[classify]
painting_mode = "extend"
skip = ["/gui/"]
"#;
        let config: TexscaleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.upscale.scale, 2);
        assert_eq!(config.upscale.jobs, Some(3));
        assert_eq!(config.upscale.kernel, KernelKind::Nearest);
        assert!(!config.upscale.optimize);
        assert_eq!(config.limits.max_dimension, 512);
        assert_eq!(config.cull.threshold, 128);
        assert_eq!(config.classify.painting_mode, EdgeMode::Extend);
        assert_eq!(config.classify.skip, vec!["/gui/".to_string()]);
        // Unlisted markers keep their defaults
        assert_eq!(config.classify.block, vec!["/block/".to_string()]);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = TexscaleConfig::default();
        config.upscale.scale = 9;
        config.upscale.jobs = Some(0);
        config.limits.max_dimension = 0;
        config.cull.threshold = 0;
        config.classify.skip.push(String::new());

        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "upscale.scale",
                "upscale.jobs",
                "limits.max_dimension",
                "cull.threshold",
                "classify.skip"
            ]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigValidationError {
            field: "upscale.scale".to_string(),
            message: "must be between 2 and 6".to_string(),
        };
        assert_eq!(err.to_string(), "texscale.toml: 'upscale.scale' must be between 2 and 6");
    }

    #[test]
    fn test_processor_from_config() {
        let mut config = TexscaleConfig::default();
        config.upscale.scale = 3;
        config.upscale.kernel = KernelKind::Nearest;
        let processor = config.processor().unwrap();
        assert_eq!(processor.factor().get(), 3);
        assert_eq!(processor.kernel().kernel_name(), "nearest");

        config.upscale.scale = 1;
        assert!(config.processor().is_err());
    }
}
