//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod classify;
mod process;
mod upscale;

use clap::{Parser, Subcommand};
use glob::{glob_with, MatchOptions, Pattern};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{load_config_with_overrides, CliOverrides, ConfigError, TexscaleConfig};
use crate::kernel::KernelKind;
use crate::settings::EdgeMode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Find all PNG files under `dir` (recursively, extension case-insensitive).
///
/// Paths are returned sorted.
pub fn find_png_files(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*.png", Pattern::escape(&dir.display().to_string()));
    let options = MatchOptions { case_sensitive: false, ..MatchOptions::new() };

    let mut files: Vec<PathBuf> = match glob_with(&pattern, options) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            log::error!("Invalid search pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    files.sort();
    files
}

/// `path` relative to `root`, `/`-separated.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// texscale - Bulk pixel-art texture upscaler
#[derive(Parser)]
#[command(name = "texscale")]
#[command(about = "texscale - Upscale pixel-art textures with an edge-aware kernel")]
#[command(version)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upscale every PNG under a directory
    Upscale {
        /// Directory containing the textures (e.g. an unpacked resource pack)
        input: PathBuf,

        /// Output directory (default: {input}_xbr)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scale factor, 2-6 (default from config, else 4)
        #[arg(long)]
        scale: Option<u32>,

        /// Number of worker threads (default: available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Upscaling kernel
        #[arg(long, value_enum)]
        kernel: Option<KernelKind>,

        /// Largest width or height to upscale; bigger images are copied unchanged
        #[arg(long)]
        max_dimension: Option<u32>,

        /// Skip the oxipng optimization pass
        #[arg(long)]
        no_optimize: bool,

        /// Emit progress and the result as JSON
        #[arg(long)]
        json: bool,

        /// Path to texscale.toml (default: discovered)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Upscale a single image with explicit settings
    Process {
        /// Input PNG
        input: PathBuf,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,

        /// Scale factor, 2-6
        #[arg(long)]
        scale: Option<u32>,

        /// Upscaling kernel
        #[arg(long, value_enum)]
        kernel: Option<KernelKind>,

        /// Largest width or height to upscale
        #[arg(long)]
        max_dimension: Option<u32>,

        /// Edge mode for all four edges (individual --tile-* flags win)
        #[arg(long, value_enum)]
        tile: Option<EdgeMode>,

        /// Edge mode for the top edge
        #[arg(long, value_enum)]
        tile_n: Option<EdgeMode>,

        /// Edge mode for the bottom edge
        #[arg(long, value_enum)]
        tile_s: Option<EdgeMode>,

        /// Edge mode for the right edge
        #[arg(long, value_enum)]
        tile_e: Option<EdgeMode>,

        /// Edge mode for the left edge
        #[arg(long, value_enum)]
        tile_w: Option<EdgeMode>,

        /// Keep translucent alpha values
        #[arg(long)]
        no_cull: bool,

        /// Fill transparent gaps from the original image
        #[arg(long)]
        relayer: bool,

        /// Copy the input unchanged
        #[arg(long)]
        skip: bool,

        /// Derive settings from the input path instead of the flags above
        #[arg(long, conflicts_with_all = ["tile", "tile_n", "tile_s", "tile_e", "tile_w", "no_cull", "relayer", "skip"])]
        auto: bool,

        /// Path to texscale.toml (default: discovered)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the settings derived for asset paths
    Classify {
        /// Asset paths (need not exist)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Path to texscale.toml (default: discovered)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Route `log` output to stderr.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    // Fails only if a logger is already installed
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

/// Exit code for a config problem: invalid values are usage errors.
fn config_exit_code(error: &ConfigError) -> u8 {
    match error {
        ConfigError::Validation(_) => EXIT_INVALID_ARGS,
        _ => EXIT_ERROR,
    }
}

/// Load config and apply CLI overrides, printing any error.
fn resolve_config(path: Option<&Path>, overrides: &CliOverrides) -> Result<TexscaleConfig, ExitCode> {
    load_config_with_overrides(path, overrides).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        ExitCode::from(config_exit_code(&e))
    })
}

/// Entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Upscale {
            input,
            output,
            scale,
            jobs,
            kernel,
            max_dimension,
            no_optimize,
            json,
            config,
        } => {
            let overrides = CliOverrides {
                scale,
                jobs,
                kernel,
                optimize: no_optimize.then_some(false),
                max_dimension,
            };
            upscale::run_upscale(
                &input,
                output.as_deref(),
                config.as_deref(),
                &overrides,
                json,
                cli.verbose,
            )
        }
        Commands::Process {
            input,
            output,
            scale,
            kernel,
            max_dimension,
            tile,
            tile_n,
            tile_s,
            tile_e,
            tile_w,
            no_cull,
            relayer,
            skip,
            auto,
            config,
        } => {
            let overrides = CliOverrides { scale, kernel, max_dimension, ..Default::default() };
            let settings = if auto {
                None
            } else {
                Some(process::settings_from_flags(
                    tile,
                    [tile_n, tile_s, tile_e, tile_w],
                    !no_cull,
                    relayer,
                    skip,
                ))
            };
            process::run_process(&input, &output, config.as_deref(), &overrides, settings)
        }
        Commands::Classify { paths, config } => classify::run_classify(&paths, config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_find_png_files() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("assets/block");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("stone.png"), b"x").unwrap();
        fs::write(nested.join("DIRT.PNG"), b"x").unwrap();
        fs::write(nested.join("notes.txt"), b"x").unwrap();
        fs::write(temp.path().join("pack.png"), b"x").unwrap();

        let names: Vec<String> =
            find_png_files(temp.path()).iter().map(|p| relative_name(temp.path(), p)).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"assets/block/stone.png".to_string()));
        assert!(names.contains(&"assets/block/DIRT.PNG".to_string()));
        assert!(names.contains(&"pack.png".to_string()));
    }

    #[test]
    fn test_relative_name() {
        let root = Path::new("/packs/faithful");
        let path = root.join("assets").join("minecraft").join("stone.png");
        assert_eq!(relative_name(root, &path), "assets/minecraft/stone.png");
    }

    #[test]
    fn test_parse_upscale_args() {
        let cli = Cli::try_parse_from([
            "texscale", "upscale", "pack", "--scale", "2", "-j", "3", "--kernel", "nearest",
            "--no-optimize",
        ])
        .unwrap();
        match cli.command {
            Commands::Upscale { scale, jobs, kernel, no_optimize, .. } => {
                assert_eq!(scale, Some(2));
                assert_eq!(jobs, Some(3));
                assert_eq!(kernel, Some(KernelKind::Nearest));
                assert!(no_optimize);
            }
            _ => panic!("expected upscale"),
        }
    }

    #[test]
    fn test_config_exit_codes() {
        let invalid = ConfigError::Validation(vec!["texscale.toml: 'upscale.scale' bad".into()]);
        assert_eq!(config_exit_code(&invalid), EXIT_INVALID_ARGS);
        let missing = ConfigError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(config_exit_code(&missing), EXIT_ERROR);
    }

    #[test]
    fn test_parse_max_dimension() {
        let cli = Cli::try_parse_from([
            "texscale", "process", "a.png", "-o", "b.png", "--max-dimension", "512",
        ])
        .unwrap();
        match cli.command {
            Commands::Process { max_dimension, .. } => assert_eq!(max_dimension, Some(512)),
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_auto_conflicts_with_manual_flags() {
        let result = Cli::try_parse_from([
            "texscale", "process", "a.png", "-o", "b.png", "--auto", "--relayer",
        ]);
        assert!(result.is_err());
    }
}
