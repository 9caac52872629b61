//! Kernel-specific error types.

use hippo_types::error::HippoError;
use thiserror::Error;

/// Kernel error type wrapping HippoError with boot context.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A wrapped HippoError.
    #[error(transparent)]
    Hippo(#[from] HippoError),

    /// The kernel failed to boot.
    #[error("Boot failed: {0}")]
    BootFailed(String),
}

impl KernelError {
    /// Boot failures and fatal store/config errors halt the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            KernelError::Hippo(e) => e.is_fatal(),
            KernelError::BootFailed(_) => true,
        }
    }
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
