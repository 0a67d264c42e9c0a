// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Streamed download with progress
//!
//! The body is read chunk by chunk. Each chunk is kept in arrival order and
//! the callback receives the running byte count and the expected total after
//! every chunk. The payload is assembled once the body is exhausted.
//!
//! # Progress contract
//! - `on_progress(loaded, total)` is called at least once, even for an empty body
//! - `total` is `None` for the whole download when `Content-Length` is missing
//! - a body that ends short of `total` is still returned

use crate::api::client::ResponseStream;
use crate::download::filename::resolve_filename;
use crate::download::save::{save_payload, SavedFile};
use crate::error::{ClientError, Result};
use bytes::Bytes;
use futures_util::{pin_mut, Stream, StreamExt};
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, warn};

/// Fully read body of a binary response
#[derive(Debug, Clone)]
pub struct StreamedPayload {
    pub data: Vec<u8>,

    /// Expected size announced by the server
    pub total: Option<u64>,

    /// Header the file name is resolved from
    pub content_disposition: Option<String>,
}

impl StreamedPayload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read a chunked body to the end, reporting after every chunk
pub async fn collect_with_progress<S, E, F>(
    body: S,
    total: Option<u64>,
    mut on_progress: F,
) -> Result<Vec<u8>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
    F: FnMut(u64, Option<u64>),
{
    let total = total.filter(|t| *t > 0);
    pin_mut!(body);

    let mut chunks: Vec<Bytes> = Vec::new();
    let mut loaded: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            ClientError::network_error(
                format!("Body read failed after {} bytes: {}", loaded, e),
                false,
            )
        })?;
        loaded += chunk.len() as u64;
        chunks.push(chunk);
        on_progress(loaded, total);
    }

    if chunks.is_empty() {
        on_progress(0, total);
    }

    if let Some(expected) = total {
        if loaded < expected {
            warn!(loaded, expected, "body ended before Content-Length was reached");
        }
    }

    let mut data = Vec::with_capacity(loaded as usize);
    for chunk in &chunks {
        data.extend_from_slice(chunk);
    }

    debug!(bytes = data.len(), chunks = chunks.len(), "body assembled");
    Ok(data)
}

/// Read a binary response into memory
pub async fn download<F>(response: ResponseStream, on_progress: F) -> Result<StreamedPayload>
where
    F: FnMut(u64, Option<u64>),
{
    let total = response.content_length();
    let content_disposition = response.content_disposition().map(str::to_string);

    let data = collect_with_progress(response.into_body(), total, on_progress).await?;

    Ok(StreamedPayload {
        data,
        total,
        content_disposition,
    })
}

/// Download a response and save it into `dir`
///
/// The file name comes from `Content-Disposition`, or `fallback_base` plus
/// `extension`.
pub async fn download_to_dir<F>(
    response: ResponseStream,
    dir: &Path,
    fallback_base: &str,
    extension: &str,
    on_progress: F,
) -> Result<SavedFile>
where
    F: FnMut(u64, Option<u64>),
{
    let payload = download(response, on_progress).await?;
    let filename = resolve_filename(
        payload.content_disposition.as_deref(),
        fallback_base,
        extension,
    );
    save_payload(dir, &filename, payload.data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunked(sizes: &[usize]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        let chunks: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, n)| Ok(Bytes::from(vec![i as u8; *n])))
            .collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_progress_accumulates_per_chunk() {
        let mut calls = Vec::new();
        let data = collect_with_progress(chunked(&[10, 20, 5]), Some(35), |loaded, total| {
            calls.push((loaded, total))
        })
        .await
        .unwrap();

        assert_eq!(calls, vec![(10, Some(35)), (30, Some(35)), (35, Some(35))]);
        assert_eq!(data.len(), 35);
        // order preserved
        assert_eq!(data[0], 0);
        assert_eq!(data[10], 1);
        assert_eq!(data[34], 2);
    }

    #[tokio::test]
    async fn test_unknown_total_stays_unknown() {
        let mut totals = Vec::new();
        let data = collect_with_progress(chunked(&[4, 4]), None, |_, total| totals.push(total))
            .await
            .unwrap();
        assert_eq!(totals, vec![None, None]);
        assert_eq!(data.len(), 8);

        // a zero Content-Length is the same as none
        let mut totals = Vec::new();
        collect_with_progress(chunked(&[3]), Some(0), |_, total| totals.push(total))
            .await
            .unwrap();
        assert_eq!(totals, vec![None]);
    }

    #[tokio::test]
    async fn test_empty_body_reports_once() {
        let mut calls = Vec::new();
        let data = collect_with_progress(chunked(&[]), None, |loaded, total| {
            calls.push((loaded, total))
        })
        .await
        .unwrap();
        assert_eq!(calls, vec![(0, None)]);
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_short_body_is_returned() {
        let data = collect_with_progress(chunked(&[5]), Some(100), |_, _| {})
            .await
            .unwrap();
        assert_eq!(data.len(), 5);
    }

    #[tokio::test]
    async fn test_read_error_is_transport_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = collect_with_progress(body, None, |_, _| {}).await.unwrap_err();
        assert!(err.is_transport_error());
        assert!(err.to_string().contains("after 3 bytes"));
    }
}
