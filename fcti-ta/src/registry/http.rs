//! HTTP document registry client
//!
//! Issues `GET {base_url}/search` with the query as URL parameters and
//! decodes whatever JSON shape comes back through `registry::decode`.
//! Requests are paced by a token-bucket limiter; HTTP 429 is surfaced as
//! `RegistryError::RateLimited` carrying any `Retry-After` value.

use super::{decode_response, DocumentRegistry, DocumentSummary, RegistryError, SearchQuery};
use crate::config::RegistryConfig;
use governor::{Quota, RateLimiter};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use std::num::NonZeroU32;
use tracing::debug;

pub struct HttpRegistryClient {
    name: String,
    client: Client,
    base_url: String,
    user_agent: String,
    /// Token bucket: `requests_per_second` searches per second
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpRegistryClient {
    /// Build a client for one registry channel
    ///
    /// # Arguments
    /// * `name` - Channel name used in logs and events
    /// * `base_url` - Registry root; `/search` is appended
    /// * `config` - Timeouts and request rate
    ///
    /// # Errors
    /// Returns `RegistryError::Network` if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        config: &RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RegistryError::Network(format!("HTTP client build failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            name: name.into(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: fcti_common::config::get_user_agent(),
            rate_limiter,
        })
    }

    fn query_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("type", query.task_type.as_str().to_string()),
            ("term", query.term.clone()),
            ("operator", query.operator.as_str().to_string()),
        ];
        if let Some(from) = query.date_from {
            params.push(("dateFrom", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = query.date_to {
            params.push(("dateTo", to.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

#[async_trait::async_trait]
impl DocumentRegistry for HttpRegistryClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<DocumentSummary>, RegistryError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search", self.base_url);
        debug!(channel = %self.name, term = %query.term, task_type = query.task_type.as_str(), "Registry search");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RegistryError::Timeout(e.to_string())
                } else {
                    RegistryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(RegistryError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::NOT_FOUND {
            // Some registries answer an empty search with 404
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchOperator, TaskType};
    use chrono::NaiveDate;

    #[test]
    fn test_query_params_include_bounds() {
        let query = SearchQuery {
            task_type: TaskType::PartyName,
            term: "DOE JANE".into(),
            operator: SearchOperator::Prefix,
            date_from: NaiveDate::from_ymd_opt(2010, 1, 1),
            date_to: None,
        };
        let params = HttpRegistryClient::query_params(&query);
        assert!(params.contains(&("type", "PARTY_NAME".to_string())));
        assert!(params.contains(&("dateFrom", "2010-01-01".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "dateTo"));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let config = RegistryConfig {
            requests_per_second: 0,
            ..RegistryConfig::default()
        };
        let client = HttpRegistryClient::new("primary", "http://localhost:9/", &config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9");
        assert_eq!(client.name(), "primary");
    }
}
