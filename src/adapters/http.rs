use crate::domain::ports::FeedSource;
use crate::utils::error::{FeedError, Result};
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Fetches the configured feed over HTTP and decodes it to text.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    url: String,
    encoding_override: Option<&'static Encoding>,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, encoding_override: Option<&'static Encoding>) -> Self {
        Self::with_client(Client::new(), url, encoding_override)
    }

    pub fn with_client(
        client: Client,
        url: impl Into<String>,
        encoding_override: Option<&'static Encoding>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            encoding_override,
        }
    }

    /// Builds a source whose requests give up after `timeout`, if one is set.
    pub fn with_timeout(
        url: impl Into<String>,
        encoding_override: Option<&'static Encoding>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| FeedError::ConfigError {
            message: format!("Cannot build HTTP client: {}", e),
        })?;
        Ok(Self::with_client(client, url, encoding_override))
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String> {
        tracing::debug!("Fetching feed from: {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        tracing::debug!("Upstream response status: {}", status);
        if !status.is_success() {
            return Err(FeedError::UpstreamStatusError {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let detected = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = response.bytes().await?;

        if let Some(encoding) = self.encoding_override {
            tracing::info!("Overriding response encoding with: {}", encoding.name());
        }
        let encoding = resolve_encoding(self.encoding_override, detected.as_deref());
        Ok(decode(&bytes, encoding))
    }
}

/// Extracts the `charset` parameter from a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Override first, then the transport-detected charset, then UTF-8.
pub fn resolve_encoding(
    encoding_override: Option<&'static Encoding>,
    detected: Option<&str>,
) -> &'static Encoding {
    if let Some(encoding) = encoding_override {
        return encoding;
    }
    match detected {
        None => UTF_8,
        Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
            tracing::warn!("Unknown charset '{}' in response, decoding as UTF-8", label);
            UTF_8
        }),
    }
}

/// Decodes with replacement characters for malformed input; a byte-order mark wins.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("Feed body contained bytes invalid for {}", used.name());
    }
    text.into_owned()
}
