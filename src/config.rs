use crate::endpoints::{API_BASE, REPORT_URL};
use derive_builder::Builder;
use getset::Getters;
use std::time::Duration;

/// Settings shared by every request a [`DexClient`](crate::DexClient) makes.
///
/// ```
/// use mangadex::ClientConfigBuilder;
/// use std::time::Duration;
///
/// let config = ClientConfigBuilder::default()
///     .request_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.api_base(), "https://api.mangadex.org/");
/// ```
#[derive(Debug, Clone, Builder, Getters)]
#[builder(default, setter(into))]
#[getset(get = "pub")]
pub struct ClientConfig {
    api_base: String,
    report_url: String,
    user_agent: String,
    request_timeout: Duration,
    /// Upper bound for a single telemetry report; reports never inherit the
    /// caller's cancellation.
    report_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            report_url: REPORT_URL.to_string(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            report_timeout: Duration::from_secs(10),
        }
    }
}
