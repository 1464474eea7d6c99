use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::path::PathBuf;

use crate::device::LocalDevice;
use crate::download::HttpFetcher;
use crate::http::HttpClient;
use crate::manager::ModManager;

/// Settings for one run of the CLI.
pub struct Config {
    /// Application whose mods are managed
    pub app_id: String,
    /// Local directory standing in for the device filesystem
    pub device_root: PathBuf,
    pub client: Client,
}

impl Config {
    pub fn new(app_id: String, device_root: Option<PathBuf>) -> Result<Self> {
        let device_root = match device_root {
            Some(root) => root,
            None => default_device_root()?,
        };
        debug!("Using device root {:?} for {}", device_root, app_id);

        let client = Client::builder()
            .user_agent(concat!("modkeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            app_id,
            device_root,
            client,
        })
    }

    pub fn manager(&self) -> ModManager<LocalDevice, HttpFetcher> {
        ModManager::new(
            self.app_id.clone(),
            LocalDevice::new(&self.device_root),
            HttpFetcher::new(HttpClient::new(self.client.clone())),
        )
    }
}

/// `<data dir>/modkeeper/device`
pub fn default_device_root() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to determine the data directory")?;
    Ok(data_dir.join("modkeeper").join("device"))
}
