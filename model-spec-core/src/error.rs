use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelPoolError {
    #[error("model '{0}' not found")]
    NotFound(String),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("cannot delete: model is assigned to '{scenario}'; reassign it first")]
    AssignedToScenario { scenario: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
