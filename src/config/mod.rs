use crate::domain::model::RuleSet;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_encoding_label, validate_non_empty_string, validate_positive_number,
    validate_required_field, validate_url, Validate,
};
use clap::{Parser, ValueEnum};
use encoding_rs::Encoding;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Process configuration, read once at startup from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "feed-transform")]
#[command(about = "Fetch an RSS feed, rewrite item fields with regex rules and serve the result")]
pub struct ServiceConfig {
    /// Source feed to fetch on every request
    #[arg(long, env = "FEED_URL")]
    pub feed_url: Option<String>,

    /// Decode the feed with this charset regardless of what the server reports
    #[arg(long, env = "FEED_ENCODING")]
    pub feed_encoding: Option<String>,

    /// JSON array of {"field", "regex", "replacement"} objects
    #[arg(long, env = "TRANSFORM_RULES")]
    pub transform_rules: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(long, env = "LISTEN_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Give up on the upstream request after this many seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Configuration with only the feed URL set; everything else at its default.
    pub fn for_feed(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: Some(feed_url.into()),
            feed_encoding: None,
            transform_rules: None,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Compact,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            fetch_timeout_secs: None,
        }
    }

    pub fn feed_url(&self) -> Result<&str> {
        let url = validate_required_field("FEED_URL", &self.feed_url)?;
        validate_non_empty_string("FEED_URL", url)?;
        Ok(url.trim())
    }

    /// The forced decode charset; unknown labels are rejected by `validate`.
    pub fn encoding_override(&self) -> Option<&'static Encoding> {
        self.feed_encoding
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .and_then(|label| Encoding::for_label(label.as_bytes()))
    }

    pub fn rule_set(&self) -> RuleSet {
        RuleSet::from_config(self.transform_rules.as_deref())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == LogFormat::Json
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        let url = self.feed_url()?;
        if let Err(e) = validate_url("FEED_URL", url) {
            tracing::warn!("{}; requests will fail until it is corrected", e);
        }

        if let Some(label) = self.feed_encoding.as_deref().map(str::trim) {
            if !label.is_empty() {
                validate_encoding_label("FEED_ENCODING", label)?;
            }
        }

        validate_positive_number("PORT", usize::from(self.port), 1)?;
        if let Some(secs) = self.fetch_timeout_secs {
            validate_positive_number("FETCH_TIMEOUT_SECS", secs as usize, 1)?;
        }

        Ok(())
    }
}
