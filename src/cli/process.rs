//! Process command implementation (single image, manual settings)

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use super::{resolve_config, EXIT_ERROR, EXIT_SUCCESS};
use crate::codec::{decode_png, encode_output};
use crate::config::CliOverrides;
use crate::settings::{EdgeMode, ProcessSettings, TileSettings};

/// Build settings from the command-line flags.
///
/// `edges` is `[north, south, east, west]`; each overrides `all` for its edge.
pub(crate) fn settings_from_flags(
    all: Option<EdgeMode>,
    edges: [Option<EdgeMode>; 4],
    cull_translucent: bool,
    relayer: bool,
    skip: bool,
) -> ProcessSettings {
    let base = all.unwrap_or_default();
    let [north, south, east, west] = edges.map(|e| e.unwrap_or(base));
    ProcessSettings {
        tile: TileSettings { north, south, east, west },
        cull_translucent,
        relayer,
        skip,
    }
}

/// Run the process command
///
/// With `settings` of `None` the settings are classified from the input path.
pub fn run_process(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    settings: Option<ProcessSettings>,
) -> ExitCode {
    let config = match resolve_config(config_path, overrides) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let settings =
        settings.unwrap_or_else(|| config.classifier().classify(&input.to_string_lossy()));
    log::debug!("Settings for {}: {:?}", input.display(), settings);

    let bytes = match fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Cannot read {}: {}", input.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let encoded = if settings.skip {
        bytes
    } else {
        let result = config.processor().map_err(|e| e.to_string()).and_then(|processor| {
            let source = decode_png(&bytes).map_err(|e| e.to_string())?;
            let scaled = processor.process(&source, &settings).map_err(|e| e.to_string())?;
            encode_output(&scaled, config.upscale.optimize).map_err(|e| e.to_string())
        });
        match result {
            Ok(encoded) => encoded,
            Err(e) => {
                eprintln!("Error: {}: {}", input.display(), e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Error: Cannot create {}: {}", parent.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }
    if let Err(e) = fs::write(output, &encoded) {
        eprintln!("Error: Cannot write {}: {}", output.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Wrote {}", output.display());
    ExitCode::from(EXIT_SUCCESS)
}
