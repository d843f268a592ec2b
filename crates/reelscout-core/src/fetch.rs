use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Error from a single media download attempt.
///
/// Fetch errors are never fatal to a reconciliation run; the item is
/// recorded without a path and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The API rejected or failed the request (rate limit, expired
    /// session, missing media). Transient from the caller's view.
    #[error("api error: {0}")]
    Api(String),
    /// Anything else: network failure, unexpected payload, local I/O.
    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

/// Boundary to the service that performs the actual byte download of one
/// photo or one video into a target directory.
///
/// Implementations return the path of the file they wrote. The reconciler
/// never inspects the file contents, only the returned name.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_photo(&self, pk: u64, folder: &Path) -> Result<PathBuf, FetchError>;
    async fn fetch_video(&self, pk: u64, folder: &Path) -> Result<PathBuf, FetchError>;
}
