use thiserror::Error;

/// Errors that abort the current resolution request.
///
/// Most failure modes in the pipeline deliberately do NOT show up here:
/// detection sub-paths degrade to empty candidate lists, a model abstention
/// is a regular `None` outcome, and knowledge-store failures surface as
/// cache misses. Only a fatal inability to obtain or load an image, or a
/// broken collaborator boundary, is an error.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("failed to write image: {0}")]
    ImageWrite(String),

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("collaborator call failed: {0}")]
    Provider(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
