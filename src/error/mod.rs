#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration Error: {0:?} is not an activation tap of the backbone")]
    UnknownLayer(String),
    #[error("Shape Error: {0} should be {1}")]
    Shape(String, String),
    #[error("Numerical Error: {0}")]
    Numerical(String),
    #[error("Record Error: {0}")]
    Record(#[from] burn::record::RecorderError),
}
