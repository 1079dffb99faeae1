// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Staged downloads.
//
// A download target is never overwritten: if the destination exists the call
// fails before any network traffic. Once the destination has been created,
// every failure path, including cancellation, removes it again so no
// truncated file is left behind.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mxnative_core::error::{MxNativeError, Result};
use mxnative_core::types::{DownloadConfig, DownloadProgress};
use mxnative_net::{HttpClient, HttpResponse};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

/// Per-download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub connect_timeout: Duration,
    /// When set, the response's content type must name this MIME type.
    pub expected_mime: Option<String>,
}

impl DownloadOptions {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            expected_mime: None,
        }
    }

    pub fn with_expected_mime(mut self, mime: impl Into<String>) -> Self {
        self.expected_mime = Some(mime.into());
        self
    }
}

impl From<&DownloadConfig> for DownloadOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(u64::from(config.timeout_ms())),
            expected_mime: config.mime_type.clone(),
        }
    }
}

/// Emits progress roughly every 1% of the expected size.
///
/// Without a known size every chunk is reported.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: u64,
    next: u64,
}

impl ProgressThrottle {
    pub(crate) fn new(total: Option<u64>) -> Self {
        let interval = total.map(|t| t / 100).unwrap_or(0);
        Self {
            interval,
            next: interval,
        }
    }

    /// Whether `received` crosses the next reporting threshold.
    pub(crate) fn should_emit(&mut self, received: u64) -> bool {
        if received >= self.next {
            self.next = received.saturating_add(self.interval);
            true
        } else {
            false
        }
    }
}

/// Download `url` into `destination`, streaming chunk by chunk.
///
/// `on_progress` receives `(received_bytes, total_bytes)`; the total is
/// `None` when the server did not announce a length. Returns the number of
/// bytes written.
#[instrument(skip(client, destination, options, on_progress), fields(destination = %destination.display()))]
pub async fn download_to<P>(
    client: &dyn HttpClient,
    url: &str,
    destination: &Path,
    options: &DownloadOptions,
    mut on_progress: P,
) -> Result<u64>
where
    P: FnMut(u64, Option<u64>) + Send,
{
    if fs::try_exists(destination).await? {
        return Err(MxNativeError::FileAlreadyExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await
    {
        Ok(file) => file,
        // Lost a race with another writer; the other file is not ours to delete.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(MxNativeError::FileAlreadyExists(destination.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    // Removes the file if this future fails or is dropped mid-transfer.
    let partial = PartialFile::new(destination);
    let written = fetch_into(client, url, file, options, &mut on_progress).await?;
    partial.keep();
    info!(bytes = written, "download complete");
    Ok(written)
}

/// A download target that is deleted on drop unless kept.
struct PartialFile<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> PartialFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!(path = %self.path.display(), "partial download removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove partial download"),
        }
    }
}

async fn fetch_into<P>(
    client: &dyn HttpClient,
    url: &str,
    file: File,
    options: &DownloadOptions,
    on_progress: &mut P,
) -> Result<u64>
where
    P: FnMut(u64, Option<u64>) + Send,
{
    let response = client.get(url, options.connect_timeout).await?;
    if !response.is_success() {
        return Err(MxNativeError::ConnectFailed(format!(
            "server responded with HTTP {}",
            response.status
        )));
    }
    let HttpResponse {
        content_type,
        content_length,
        body,
        ..
    } = response;

    let Some(mut body) = body else {
        return Err(MxNativeError::NoData);
    };
    if let Some(expected) = &options.expected_mime {
        let actual = content_type.unwrap_or_default();
        if !same_mime(expected, &actual) {
            return Err(MxNativeError::MimeTypeMismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }

    let mut writer = BufWriter::new(file);
    let mut throttle = ProgressThrottle::new(content_length);
    let mut received: u64 = 0;
    while let Some(chunk) = body.next_chunk().await? {
        writer.write_all(&chunk).await?;
        received += chunk.len() as u64;
        if throttle.should_emit(received) {
            on_progress(received, content_length);
        }
    }
    writer.flush().await?;
    writer.get_ref().sync_all().await?;

    debug!(received, ?content_length, "body written");
    Ok(received)
}

/// Compare MIME types by essence, ignoring case and parameters.
fn same_mime(expected: &str, actual: &str) -> bool {
    fn essence(mime: &str) -> &str {
        mime.split(';').next().unwrap_or_default().trim()
    }
    essence(expected).eq_ignore_ascii_case(essence(actual))
}

/// Bridge-facing download handler.
#[derive(Clone)]
pub struct FileDownloader {
    client: Arc<dyn HttpClient>,
}

impl FileDownloader {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Download with the runtime's `DownloadConfig`. Unknown totals are
    /// reported as `-1`.
    pub async fn download<P>(
        &self,
        url: &str,
        destination: &Path,
        config: &DownloadConfig,
        mut on_progress: P,
    ) -> Result<()>
    where
        P: FnMut(DownloadProgress) + Send,
    {
        let options = DownloadOptions::from(config);
        download_to(
            self.client.as_ref(),
            url,
            destination,
            &options,
            |received, total| {
                on_progress(DownloadProgress {
                    received_bytes: received as f64,
                    total_bytes: total.map_or(-1.0, |t| t as f64),
                })
            },
        )
        .await
        .map(|_| ())
    }
}
