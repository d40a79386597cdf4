//! Classify command implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde_json::json;

use super::{resolve_config, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::CliOverrides;
use crate::settings::Classifier;

fn classify_json(classifier: &Classifier, paths: &[PathBuf]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = paths
        .iter()
        .map(|path| {
            let path = path.to_string_lossy();
            json!({ "path": path, "settings": classifier.classify(&path) })
        })
        .collect();
    json!(entries)
}

/// Run the classify command
pub fn run_classify(paths: &[PathBuf], config_path: Option<&Path>) -> ExitCode {
    let config = match resolve_config(config_path, &CliOverrides::default()) {
        Ok(config) => config,
        Err(code) => return code,
    };

    match serde_json::to_string_pretty(&classify_json(&config.classifier(), paths)) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
