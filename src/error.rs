use thiserror::Error;

use crate::selector::SelectorError;

/// Failures that end a page run. Locally recovered situations (a selector set
/// with no match, a variant without a specs button) are outcomes, not errors.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("missing required URL argument")]
    MissingArgument,

    #[error("content did not appear for any of: {}", tried.join(", "))]
    ContentTimeout { tried: Vec<String> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("browser error: {0:#}")]
    Browser(#[from] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
