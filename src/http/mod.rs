//! HTTP client with retry logic, used to fetch packages named by a
//! dependency's download link.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::NonRetryableError;
