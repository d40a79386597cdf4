//! Upscale command implementation

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::json;

use super::{find_png_files, relative_name, resolve_config, EXIT_ERROR, EXIT_SUCCESS};
use crate::batch::{
    BatchResult, BatchRunner, BatchState, ConsoleProgress, JsonProgress, ProgressReporter,
    SourceImage,
};
use crate::config::CliOverrides;

/// `{input}_xbr` next to the input directory.
pub(crate) fn default_output_dir(input: &Path) -> PathBuf {
    let input = input.canonicalize().unwrap_or_else(|_| input.to_path_buf());
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "textures".to_string());
    input.with_file_name(format!("{}_xbr", name))
}

/// Read every file, keyed by its path relative to `root`.
fn read_sources(root: &Path, files: &[PathBuf]) -> Result<Vec<SourceImage>, String> {
    files
        .par_iter()
        .map(|path| {
            fs::read(path)
                .map(|bytes| SourceImage::new(relative_name(root, path), bytes))
                .map_err(|e| format!("{}: {}", path.display(), e))
        })
        .collect()
}

/// Write every result that carries data. Returns the write failures.
fn write_outputs(out_dir: &Path, result: &BatchResult) -> Vec<String> {
    result
        .items
        .par_iter()
        .filter_map(|item| {
            let data = item.data.as_ref()?;
            let path = out_dir.join(&item.name);
            let written = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&path, data));
            written.err().map(|e| format!("{}: {}", path.display(), e))
        })
        .collect()
}

fn result_json(result: &BatchResult, out_dir: &Path) -> serde_json::Value {
    let items: Vec<serde_json::Value> = result
        .items
        .iter()
        .map(|item| {
            let mut value = json!({
                "name": item.name,
                "status": item.outcome.label(),
                "duration_ms": item.duration.as_millis() as u64,
            });
            if let Some(msg) = item.outcome.diagnostic() {
                value["error"] = json!(msg);
            }
            value
        })
        .collect();

    json!({
        "state": result.state.to_string(),
        "output": out_dir.display().to_string(),
        "processed": result.processed_count(),
        "unchanged": result.unchanged_count(),
        "fallback": result.fallback_count(),
        "failed": result.failed_count(),
        "duration_ms": result.total_duration.as_millis() as u64,
        "items": items,
    })
}

/// Run the upscale command
pub fn run_upscale(
    input: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    json: bool,
    verbose: bool,
) -> ExitCode {
    let config = match resolve_config(config_path, overrides) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if !input.is_dir() {
        eprintln!("Error: Input directory not found: {}", input.display());
        return ExitCode::from(EXIT_ERROR);
    }
    let out_dir = output.map(Path::to_path_buf).unwrap_or_else(|| default_output_dir(input));

    let files = find_png_files(input);
    log::debug!("Found {} PNG files under {}", files.len(), input.display());

    let sources = match read_sources(input, &files) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Error reading input: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let processor = match config.processor() {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let progress: Arc<dyn ProgressReporter> = if json {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(
            ConsoleProgress::new()
                .with_colors(std::io::stderr().is_terminal())
                .with_verbose(verbose),
        )
    };

    let mut runner = BatchRunner::new(processor)
        .with_classifier(config.classifier())
        .with_optimize(config.upscale.optimize)
        .with_progress(progress);
    if let Some(jobs) = config.upscale.jobs {
        runner = runner.with_jobs(jobs);
    }

    let result = match runner.run(&sources) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let write_errors = write_outputs(&out_dir, &result);
    for e in &write_errors {
        eprintln!("Error writing output: {}", e);
    }

    if json {
        println!("{}", result_json(&result, &out_dir));
    } else if result.is_success() {
        println!("{}", result.summary());
        println!("Output written to {}", out_dir.display());
    } else {
        eprintln!("{}", result.summary());
    }

    if result.state == BatchState::Completed && write_errors.is_empty() {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}
