use thiserror::Error;

use smartplc_config::SignalKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Signal not found: {0}")]
    NotFound(String),

    #[error("Signal {name} ({}) does not accept this write", kind.short_code())]
    InvalidKind { name: String, kind: SignalKind },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid signal catalogue: {0}")]
    InvalidCatalogue(String),
}
