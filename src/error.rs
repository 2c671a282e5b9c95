//! Error types for the momentum engine.

use thiserror::Error;

/// Errors surfaced by the engine core.
///
/// Insufficient data and missing prices are not errors: they degrade to
/// "do nothing" for the affected cycle or security and are only logged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Structural misconfiguration. The engine refuses to run.
    #[error("configuration error: {0}")]
    Config(String),

    /// A bar or query referenced a security outside the fixed universe.
    #[error("unknown security '{0}' (universe is fixed at startup)")]
    UnknownSecurity(String),

    /// The engine actor is no longer receiving commands.
    #[error("engine channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, EngineError>;
