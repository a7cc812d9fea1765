//! Error types for the engine binary.

use outbreak_core::{ConfigError, KernelError};

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The simulation could not be built or did not shut down cleanly.
    #[error("kernel error: {source}")]
    Kernel {
        /// The underlying kernel error.
        #[from]
        source: KernelError,
    },

    /// The command reader task failed.
    #[error("command source error: {message}")]
    CommandSource {
        /// Description of the failure.
        message: String,
    },
}
