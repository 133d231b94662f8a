use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::TankobonError;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const IMAGE_ACCEPT: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

pub trait AssetClient: Send + Sync {
    fn fetch_image(
        &self,
        cancel: &CancelToken,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Vec<u8>, TankobonError>;
}

#[derive(Clone)]
pub struct HttpAssetClient {
    client: Client,
}

impl HttpAssetClient {
    pub fn new() -> Result<Self, TankobonError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| TankobonError::AssetHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(response: Response) -> Result<Response, TankobonError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .status()
            .canonical_reason()
            .unwrap_or("image request failed")
            .to_string();
        Err(TankobonError::AssetStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        cancel: &CancelToken,
        mut make_req: F,
    ) -> Result<Response, TankobonError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            cancel.check()?;
            let delay = Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1));
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(status, attempt, "retrying image request");
                        cancel.sleep(delay)?;
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(error = %err, attempt, "retrying image request");
                        cancel.sleep(delay)?;
                        attempt += 1;
                        continue;
                    }
                    return Err(TankobonError::AssetHttp(err.to_string()));
                }
            }
        }
    }
}

impl AssetClient for HttpAssetClient {
    fn fetch_image(
        &self,
        cancel: &CancelToken,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Vec<u8>, TankobonError> {
        let response = self.send_with_retries(cancel, || {
            let request = self.client.get(url);
            match referer {
                Some(referer) => request.header(REFERER, referer),
                None => request,
            }
        })?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| TankobonError::AssetHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
