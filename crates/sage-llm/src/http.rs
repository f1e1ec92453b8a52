//! Shared HTTP client construction.

use std::time::Duration;

/// Create the HTTP client used for model calls.
///
/// Config: 10s connect timeout, rustls TLS, `sage/{version}` user-agent,
/// redirect limit 10. The overall per-attempt timeout is set on each request
/// from the retry policy, not here.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("sage/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
