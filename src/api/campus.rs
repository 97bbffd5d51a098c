//! Implements the `TransactionSource` trait against the card system's self-trade list endpoint.

use crate::api::TransactionSource;
use crate::config::Credentials;
use crate::error::MonthFault;
use crate::model::DateRange;
use crate::{Config, Result};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, REFERER};
use serde_json::Value;
use tracing::trace;
use url::Url;

const USER_AGENT: &str = concat!("cardstat/", env!("CARGO_PKG_VERSION"));

/// Fetches trade lists over HTTP. The card system identifies the student by `openid` in the query
/// and the session `Cookie` header, both taken from the configured credentials.
pub struct CampusCardSource {
    client: reqwest::Client,
    endpoint: Url,
    org_id: String,
    trade_type: u32,
    credentials: Credentials,
}

impl CampusCardSource {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.endpoint().clone();
        let headers = default_headers(&endpoint, config.org_id(), config.credentials())?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            org_id: config.org_id().to_string(),
            trade_type: config.trade_type(),
            credentials: config.credentials().clone(),
        })
    }

    fn query(&self, range: &DateRange) -> [(&'static str, String); 5] {
        [
            ("beginDate", range.begin_str()),
            ("endDate", range.end_str()),
            ("tradeType", self.trade_type.to_string()),
            ("openid", self.credentials.openid().to_string()),
            ("orgid", self.org_id.clone()),
        ]
    }
}

#[async_trait::async_trait]
impl TransactionSource for CampusCardSource {
    async fn fetch(&mut self, range: &DateRange) -> std::result::Result<Value, MonthFault> {
        trace!("GET {} for {range}", self.endpoint);
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&self.query(range))
            .send()
            .await
            .map_err(|e| MonthFault::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonthFault::Transport(format!(
                "the card system answered with HTTP status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MonthFault::Transport(format!("unable to read the body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| {
            trace!("unparseable body: {body}");
            MonthFault::Malformed(format!("the body is not JSON: {e}"))
        })
    }
}

/// The headers that every request carries.
fn default_headers(endpoint: &Url, org_id: &str, credentials: &Credentials) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "x-requested-with",
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert("iswechatapp", HeaderValue::from_static("true"));
    headers.insert(
        "orgid",
        HeaderValue::from_str(org_id).context("The org_id is not a valid header value")?,
    );

    let referer = format!("{}/", endpoint.origin().ascii_serialization());
    headers.insert(
        REFERER,
        HeaderValue::from_str(&referer).context("The endpoint origin is not a valid header")?,
    );

    let mut cookie = HeaderValue::from_str(credentials.cookie())
        .context("The cookie is not a valid header value")?;
    cookie.set_sensitive(true);
    headers.insert(COOKIE, cookie);
    Ok(headers)
}
