//! Fetching package archives named by a dependency's download link.

use crate::http::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::fs::File;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Download `url` to `destination`. `label` names what is being fetched
    /// in progress messages.
    async fn download_url(&self, url: &str, destination: &Path, label: &str) -> Result<()>;
}

/// Fetcher going over HTTP with retries.
#[derive(Clone)]
pub struct HttpFetcher {
    http_client: HttpClient,
}

impl HttpFetcher {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl PackageFetcher for HttpFetcher {
    #[tracing::instrument(skip(self, destination))]
    async fn download_url(&self, url: &str, destination: &Path, label: &str) -> Result<()> {
        info!("Downloading {} from {}...", label, url);

        let bytes = self
            .http_client
            .download_file(url, || {
                File::create(destination).with_context(|| {
                    format!("Failed to create download file at {:?}", destination)
                })
            })
            .await?;

        info!("Downloaded {} ({} bytes).", label, bytes);
        Ok(())
    }
}
