use voxtype_transcribe::check_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address/port could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Required model files are absent. Checked before binding.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The recognizer worker did not reach readiness.
    #[error("recognizer worker failed to start")]
    EngineStart,
}
