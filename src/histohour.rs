//! CryptoCompare `histohour` endpoint: wire types and the HTTP page source.

use crate::errors::FetchError;
use crate::fetcher::PageSource;
use crate::price_series::PricePoint;
use crate::storage_utils::FetchConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::debug;

// --- Wire format ---

#[derive(Deserialize, Debug)]
struct HistoResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: HistoData,
}

// On errors the provider sends `"Data": {}`, hence the defaults.
#[derive(Deserialize, Debug, Default)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<RawPoint>,
}

#[derive(Deserialize, Debug)]
struct RawPoint {
    time: i64,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    volumefrom: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    volumeto: Option<f64>,
}

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

/// Turns a decoded body into price points, surfacing provider-level errors
/// that arrive with HTTP 200.
fn into_page(body: HistoResponse) -> Result<Vec<PricePoint>, FetchError> {
    if body.response.eq_ignore_ascii_case("error") {
        return Err(if is_rate_limit_message(&body.message) {
            FetchError::RateLimited(body.message)
        } else {
            FetchError::Api(body.message)
        });
    }

    body.data
        .data
        .into_iter()
        .map(|raw| -> Result<PricePoint, FetchError> {
            let timestamp = DateTime::from_timestamp(raw.time, 0)
                .ok_or_else(|| FetchError::Decode(format!("timestamp {} out of range", raw.time)))?;
            Ok(PricePoint {
                timestamp,
                open: raw.open,
                high: raw.high,
                low: raw.low,
                close: raw.close,
                volume_from: raw.volumefrom,
                volume_to: raw.volumeto,
            })
        })
        .collect()
}

/// Maps an HTTP status and raw body to a page or a [`FetchError`].
///
/// 429 is throttling and gets retried; any other non-2xx status aborts.
fn into_result(status: StatusCode, body: &str) -> Result<Vec<PricePoint>, FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited(body.to_string()));
    }
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body: HistoResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    into_page(body)
}

// --- HTTP client ---

pub struct CryptoCompareClient {
    client: Client,
    config: FetchConfig,
    api_key: SecretString,
}

impl CryptoCompareClient {
    pub fn new(config: &FetchConfig, api_key: SecretString) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn query(&self, cursor: DateTime<Utc>) -> Vec<(&'static str, String)> {
        vec![
            ("fsym", self.config.from_symbol.clone()),
            ("tsym", self.config.to_symbol.clone()),
            ("limit", self.config.limit.to_string()),
            ("toTs", cursor.timestamp().to_string()),
            ("api_key", self.api_key.expose_secret().to_string()),
        ]
    }
}

#[async_trait]
impl PageSource for CryptoCompareClient {
    async fn fetch_page(&self, cursor: DateTime<Utc>) -> Result<Vec<PricePoint>, FetchError> {
        debug!(to_ts = cursor.timestamp(), "requesting histohour page");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&self.query(cursor))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        into_result(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<PricePoint>, FetchError> {
        into_page(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn success_page_is_decoded_in_order() {
        let page = parse(
            r#"{
                "Response": "Success",
                "Message": "",
                "HasWarning": false,
                "Type": 100,
                "Data": {
                    "Aggregated": false,
                    "TimeFrom": 1609459200,
                    "TimeTo": 1609462800,
                    "Data": [
                        {"time": 1609459200, "high": 29300.5, "low": 28900, "open": 28990.1,
                         "volumefrom": 1234.5, "volumeto": 36000000, "close": 29250.0,
                         "conversionType": "direct", "conversionSymbol": ""},
                        {"time": 1609462800, "high": 29400, "low": 29100, "open": 29250.0,
                         "volumefrom": 999, "volumeto": 29000000, "close": 29380.25,
                         "conversionType": "direct", "conversionSymbol": ""}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].timestamp.timestamp(), 1_609_459_200);
        assert_eq!(page[0].low, Some(28900.0));
        assert_eq!(page[1].close, Some(29380.25));
        assert!(!page[1].has_missing_field());
    }

    #[test]
    fn blank_and_null_fields_become_missing() {
        let page = parse(
            r#"{"Response": "Success", "Data": {"Data": [
                {"time": 1609459200, "open": "", "high": null, "low": "28900.5",
                 "close": 29000, "volumefrom": 1, "volumeto": 2}
            ]}}"#,
        )
        .unwrap();

        assert_eq!(page[0].open, None);
        assert_eq!(page[0].high, None);
        assert_eq!(page[0].low, Some(28900.5));
        assert!(page[0].has_missing_field());
    }

    #[test]
    fn provider_error_with_http_200_is_surfaced() {
        let err = parse(
            r#"{"Response": "Error", "Type": 1, "Data": {},
                "Message": "You need a valid auth key or api key to access this endpoint"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Api(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn provider_rate_limit_message_is_transient() {
        let err = parse(
            r#"{"Response": "Error", "Type": 99, "Data": {},
                "Message": "You are over your rate limit please upgrade your account!"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn http_429_is_retried_as_rate_limit() {
        let err = into_result(StatusCode::TOO_MANY_REQUESTS, "slow down").unwrap_err();
        assert!(matches!(&err, FetchError::RateLimited(msg) if msg == "slow down"));
        assert!(err.is_transient());
    }

    #[test]
    fn server_error_status_is_transient() {
        let err = into_result(StatusCode::SERVICE_UNAVAILABLE, "").unwrap_err();
        assert!(matches!(err, FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(err.is_transient());
    }

    #[test]
    fn client_error_status_aborts() {
        let err = into_result(StatusCode::UNAUTHORIZED, r#"{"Response": "Success"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Status(StatusCode::UNAUTHORIZED)));
        assert!(!err.is_transient());
    }

    #[test]
    fn undecodable_body_aborts() {
        let err = into_result(StatusCode::OK, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn ok_status_with_valid_body_yields_points() {
        let page = into_result(
            StatusCode::OK,
            r#"{"Response": "Success", "Data": {"Data": [
                {"time": 1609459200, "open": 1, "high": 2, "low": 1, "close": 2,
                 "volumefrom": 1, "volumeto": 2}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].close, Some(2.0));
    }

    #[test]
    fn query_carries_cursor_and_page_cap() {
        let api_key = SecretString::new("k".into());
        let client = CryptoCompareClient::new(&FetchConfig::default(), api_key).unwrap();
        let cursor = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let query = client.query(cursor);

        assert!(query.contains(&("fsym", "BTC".to_string())));
        assert!(query.contains(&("tsym", "USD".to_string())));
        assert!(query.contains(&("limit", "2000".to_string())));
        assert!(query.contains(&("toTs", "1700000000".to_string())));
        assert!(query.contains(&("api_key", "k".to_string())));
    }
}
