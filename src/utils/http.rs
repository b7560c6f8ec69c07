use std::time::Duration;

use once_cell::sync::Lazy;

/// Shared client for all backend calls. Connection pooling lives here.
pub static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Short-timeout liveness check. Network failure of any kind maps to `false`.
pub async fn probe_url(url: &str, timeout: Duration) -> bool {
    match HTTP.get(url).timeout(timeout).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
