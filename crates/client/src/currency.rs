use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hatchquote_core::config::CurrencyConfig;
use hatchquote_core::cpq::currency::{ExchangeRate, RateSource};
use hatchquote_core::errors::ApplicationError;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Exchange-rate endpoint returning `{ "rate": ..., "updatedAt": ... }`.
pub struct HttpRateSource {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateBody {
    rate: Decimal,
    updated_at: Option<chrono::DateTime<Utc>>,
}

impl HttpRateSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    pub fn from_config(config: &CurrencyConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self::new(client, config.rate_url.clone()))
    }
}

/// Rates must be positive; a missing timestamp means "now".
pub fn parse_rate_body(body: &str) -> Result<ExchangeRate, ApplicationError> {
    let parsed: RateBody = serde_json::from_str(body)
        .map_err(|error| ApplicationError::Currency(format!("invalid rate payload: {error}")))?;
    if parsed.rate <= Decimal::ZERO {
        return Err(ApplicationError::Currency(format!("non-positive rate {}", parsed.rate)));
    }
    Ok(ExchangeRate { rate: parsed.rate, updated_at: parsed.updated_at.unwrap_or_else(Utc::now) })
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self) -> Result<ExchangeRate, ApplicationError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|error| ApplicationError::Currency(format!("GET {}: {error}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Currency(format!("GET {} returned {status}", self.url)));
        }

        let body = response
            .text()
            .await
            .map_err(|error| ApplicationError::Currency(error.to_string()))?;
        parse_rate_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hatchquote_core::errors::ApplicationError;
    use rust_decimal_macros::dec;

    use super::parse_rate_body;

    #[test]
    fn parses_rate_with_timestamp() {
        let rate = parse_rate_body(r#"{"rate": 12725, "updatedAt": "2026-03-01T08:00:00Z"}"#)
            .expect("valid payload");
        assert_eq!(rate.rate, dec!(12725));
        assert_eq!(
            rate.updated_at,
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().expect("valid date")
        );
    }

    #[test]
    fn accepts_string_rate_without_timestamp() {
        let rate = parse_rate_body(r#"{"rate": "12650.75"}"#).expect("valid payload");
        assert_eq!(rate.rate, dec!(12650.75));
    }

    #[test]
    fn rejects_zero_and_malformed_rates() {
        assert!(matches!(parse_rate_body(r#"{"rate": 0}"#), Err(ApplicationError::Currency(_))));
        assert!(matches!(parse_rate_body("<html>"), Err(ApplicationError::Currency(_))));
    }
}
