pub mod archive;
pub mod commands;
pub mod config;
pub mod device;
pub mod download;
pub mod error;
pub mod http;
pub mod manager;
pub mod package;
