use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT,
};
use serde_json::Value;

use crate::error::TankobonError;

#[derive(Debug, Clone)]
pub struct CatalogResponse {
    pub status: u16,
    pub status_text: String,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

pub trait CatalogTransport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<CatalogResponse, TankobonError>;
}

#[derive(Clone)]
pub struct HttpCatalogTransport {
    client: Client,
}

impl HttpCatalogTransport {
    pub fn new() -> Result<Self, TankobonError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("tankobon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| TankobonError::CatalogHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| TankobonError::CatalogHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl CatalogTransport for HttpCatalogTransport {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<CatalogResponse, TankobonError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request
            .send()
            .map_err(|err| TankobonError::CatalogHttp(err.to_string()))?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .map_err(|err| TankobonError::CatalogHttp(err.to_string()))?
            .to_vec();
        Ok(CatalogResponse {
            status: status.as_u16(),
            status_text: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string()),
            retry_after,
            body,
        })
    }
}
