use std::path::PathBuf;

use tracing::error;

use crate::config::{EngineConfig, RecognizeModel};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("missing model files: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    Missing(Vec<PathBuf>),
}

/// Checks that every model file the configuration points at exists.
///
/// Must run before the listener binds: a server that cannot load its models
/// exits non-zero without accepting a single connection. Remote engines have
/// no local files and pass vacuously.
pub fn check_model(config: &EngineConfig) -> Result<(), ModelError> {
    let mut missing: Vec<PathBuf> = model_paths(config)
        .into_iter()
        .filter(|p| !p.exists())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    missing.sort();
    error!("required model files were not found:");
    for path in &missing {
        error!("    - {}", path.display());
    }
    Err(ModelError::Missing(missing))
}

fn model_paths(config: &EngineConfig) -> Vec<PathBuf> {
    match &config.recognize_model {
        RecognizeModel::Remote { .. } => Vec::new(),
        RecognizeModel::Whisper { model, .. } => vec![model.clone()],
    }
}
