/// Core error type.
///
/// Adapter crates map their specific errors into this type so the assistant
/// core can handle failures consistently (degrade vs. user-facing 400).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// An external dependency (POS, LLM, messaging provider) failed.
    /// Callers degrade to cached data or template fallbacks instead of
    /// surfacing this to the end user.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// No cached aggregate and no way to compute one.
    #[error("sales data unavailable for merchant {0}")]
    DataUnavailable(String),

    /// Malformed inbound payload; maps to HTTP 400, no reply is sent.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
