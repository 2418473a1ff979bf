use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Serialization(#[from] serde_json::Error),
}
