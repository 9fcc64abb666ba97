use anyhow::{Context, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use url::Url;

/// Browser-like agent; the public quote endpoints reject unknown clients
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// HTTP client with exponential-backoff retries on transient failures
    pub fn create_client(timeout: Duration) -> ClientWithMiddleware {
        Self::create_client_with_retries(timeout, 3)
    }

    pub fn create_client_with_retries(timeout: Duration, max_retries: u32) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// `base_url` with `params` appended as an encoded query string.
///
/// reqwest-middleware does not expose `.query()`, so the URL is built up
/// front.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        let url = Url::parse(base_url).with_context(|| format!("Invalid URL: {}", base_url))?;
        return Ok(url.into());
    }
    let url = Url::parse_with_params(
        base_url,
        params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())),
    )
    .with_context(|| format!("Invalid URL: {}", base_url))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_with_query_encodes_values() {
        let url = build_url_with_query(
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EGSPC",
            &[("interval", "1d"), ("range", "6mo"), ("note", "a b&c")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EGSPC?interval=1d&range=6mo&note=a+b%26c"
        );
    }

    #[test]
    fn test_build_url_rejects_garbage() {
        assert!(build_url_with_query::<&str, &str>("not a url", &[]).is_err());
    }
}
