//! Error types for the forest mirror

use thiserror::Error;

/// Error variants are named with the `Error` suffix for clarity (e.g., `KubeError`, `WatchError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] kube::runtime::watcher::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(api_err)) => {
                // 4xx errors (except 409 Conflict, 429 TooManyRequests) are usually not retryable
                let code = api_err.code;
                if (400..500).contains(&code) {
                    return code == 409 || code == 429;
                }
                true
            }
            // Network and other errors are retryable
            Error::KubeError(_) => true,
            // The watcher re-lists on its own after backoff
            Error::WatchError(_) => true,
            Error::MissingObjectKey(_) => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
