//! Native HTTP fetcher -- in-process GET with streaming copy to disk.
//!
//! Split into focused submodules:
//! - [`landing`] - Publisher landing pages that embed the real asset URL
//!
//! Every fetch goes through the shared [`Session`], so cookies set by one
//! response are presented on later requests of the same run. Failures come
//! back as a typed [`FetchFailure`]; only transient transport failures are
//! retried.

mod landing;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::{Config, RetryConfig};
use crate::error::{FetchFailure, Result};
use crate::progress::{ProgressRegistry, TransferBar, bar_label};
use crate::retry::fetch_with_retry;
use crate::session::Session;
use crate::utils::ensure_parent_dir;
use futures::StreamExt;
use landing::LandingRewrite;
use reqwest::StatusCode;
use reqwest::header::{CONNECTION, USER_AGENT};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

/// Landing-page rewrites followed per fetch before the page itself is kept
const MAX_LANDING_HOPS: usize = 3;

/// Response body about to be written to the destination
enum Body {
    /// Already read in full while looking for an embedded asset URL
    Buffered(Vec<u8>),
    /// Not read yet; streamed chunk by chunk
    Streaming(reqwest::Response),
}

impl Body {
    fn declared_len(&self) -> Option<u64> {
        match self {
            Body::Buffered(page) => Some(page.len() as u64),
            Body::Streaming(response) => response.content_length(),
        }
    }
}

/// Fetches URLs into files through a shared [`Session`]
pub struct NativeFetcher {
    session: Arc<Session>,
    progress: ProgressRegistry,
    rewrites: Vec<LandingRewrite>,
    retry: RetryConfig,
}

impl NativeFetcher {
    /// Create a fetcher sharing `session` and `progress` with its siblings
    pub fn new(session: Arc<Session>, progress: ProgressRegistry, config: &Config) -> Result<Self> {
        Ok(Self {
            session,
            progress,
            rewrites: LandingRewrite::compile_all(&config.http.publisher_quirks)?,
            retry: config.retry.clone(),
        })
    }

    /// The session every request of this fetcher goes through
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Fetch `url` into `dest`.
    ///
    /// No file is created unless the server answers 200. When `quiet` is set
    /// no progress bar is registered and failures are logged at debug level.
    pub async fn fetch(&self, url: &str, dest: &Path, quiet: bool) -> std::result::Result<(), FetchFailure> {
        let result = fetch_with_retry(&self.retry, || self.fetch_once(url, dest, quiet)).await;

        if let Err(failure) = &result {
            if failure.is_fatal() {
                error!(url = %url, dest = %dest.display(), error = %failure, "Fetch aborted");
            } else if quiet {
                debug!(url = %url, error = %failure, "Access failed");
            } else {
                warn!(url = %url, error = %failure, "Access failed");
            }
        }
        result
    }

    async fn fetch_once(&self, url: &str, dest: &Path, quiet: bool) -> std::result::Result<(), FetchFailure> {
        let mut target = url.to_string();
        let mut hops = 0;

        loop {
            let response = self.get(&target).await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(FetchFailure::HttpStatus {
                    status: status.as_u16(),
                });
            }

            let landed = response.url().to_string();
            let Some(rewrite) = landing::find(&self.rewrites, &target, &landed) else {
                return self.write_body(Body::Streaming(response), dest, quiet).await;
            };

            let page = response
                .bytes()
                .await
                .map_err(|e| FetchFailure::from_reqwest(&e, self.session.max_redirects()))?;
            match rewrite.extract(&page) {
                Some(asset) if asset != target && hops < MAX_LANDING_HOPS => {
                    debug!(url = %target, asset = %asset, "Following embedded asset URL");
                    hops += 1;
                    target = asset;
                }
                _ => return self.write_body(Body::Buffered(page.to_vec()), dest, quiet).await,
            }
        }
    }

    async fn get(&self, target: &str) -> std::result::Result<reqwest::Response, FetchFailure> {
        let url = Url::parse(target).map_err(|e| FetchFailure::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?;
        self.session.observe_cookies(&url);

        self.session
            .client()
            .get(url)
            .header(CONNECTION, "keep-alive")
            .header(USER_AGENT, self.session.user_agent())
            .send()
            .await
            .map_err(|e| FetchFailure::from_reqwest(&e, self.session.max_redirects()))
    }

    async fn write_body(&self, body: Body, dest: &Path, quiet: bool) -> std::result::Result<(), FetchFailure> {
        ensure_parent_dir(dest).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchFailure::CreateFile {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            })?;
        let partial = PartialFile::new(dest);

        let bar = (!quiet).then(|| self.progress.register(bar_label(dest), body.declared_len()));

        copy_body(body, &mut file, bar.as_ref()).await?;
        file.flush().await.map_err(write_failure)?;

        partial.keep();
        if let Some(bar) = bar {
            bar.finish();
        }
        Ok(())
    }
}

/// Destination being written; removed on drop unless kept.
///
/// Covers both a failed copy and a fetch future dropped mid-stream.
struct PartialFile<'a> {
    path: &'a Path,
    complete: bool,
}

impl<'a> PartialFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            complete: false,
        }
    }

    fn keep(mut self) {
        self.complete = true;
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        if self.complete {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(dest = %self.path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

async fn copy_body(
    body: Body,
    file: &mut tokio::fs::File,
    bar: Option<&TransferBar>,
) -> std::result::Result<(), FetchFailure> {
    match body {
        Body::Buffered(page) => {
            file.write_all(&page).await.map_err(write_failure)?;
            if let Some(bar) = bar {
                bar.advance(page.len() as u64);
            }
        }
        Body::Streaming(response) => {
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| FetchFailure::Stream {
                    message: e.to_string(),
                })?;
                file.write_all(&chunk).await.map_err(write_failure)?;
                if let Some(bar) = bar {
                    bar.advance(chunk.len() as u64);
                }
            }
        }
    }
    Ok(())
}

fn write_failure(e: std::io::Error) -> FetchFailure {
    FetchFailure::Stream {
        message: format!("write failed: {e}"),
    }
}
