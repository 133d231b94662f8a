use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cache::TypedCache;
use crate::cancel::CancelToken;
use crate::catalog::{self, ExternalWorkRecord};
use crate::domain::Work;
use crate::error::TankobonError;
use crate::store::ResolverStores;
use crate::transport::CatalogTransport;

pub const DEFAULT_API_URL: &str = "https://graphql.anilist.co";
pub const DEFAULT_OAUTH_URL: &str = "https://anilist.co/api/v2/oauth/token";
const OAUTH_REDIRECT_URI: &str = "https://anilist.co/api/v2/oauth/pin";
const ACCESS_TOKEN_KEY: &str = "access-token";

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub api_url: String,
    pub oauth_url: String,
    pub closest_tries: usize,
    pub closest_step: usize,
    pub default_retry_after: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            closest_tries: 3,
            closest_step: 3,
            default_retry_after: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
    pub code: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<QueryError>>,
}

#[derive(Deserialize)]
struct QueryError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct MediaData {
    #[serde(rename = "Media", alias = "media", default)]
    media: Option<ExternalWorkRecord>,
}

#[derive(Deserialize)]
struct PageData {
    #[serde(rename = "Page", alias = "page")]
    page: Option<PageMedia>,
}

#[derive(Deserialize)]
struct PageMedia {
    #[serde(default)]
    media: Option<Vec<ExternalWorkRecord>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct MetadataResolver {
    transport: Arc<dyn CatalogTransport>,
    query_to_ids: TypedCache<Vec<u64>>,
    title_to_id: TypedCache<u64>,
    id_to_record: TypedCache<ExternalWorkRecord>,
    access_token: TypedCache<String>,
    token: RwLock<Option<String>>,
    options: ResolverOptions,
}

impl MetadataResolver {
    pub fn new(
        transport: Arc<dyn CatalogTransport>,
        stores: ResolverStores,
        options: ResolverOptions,
    ) -> Self {
        let access_token = TypedCache::<String>::new("access-token", stores.access_token);
        let token = match access_token.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(err) => {
                warn!(error = %err, "failed to load stored access token");
                None
            }
        };
        Self {
            transport,
            query_to_ids: TypedCache::new("query-ids", stores.query_to_ids),
            title_to_id: TypedCache::new("title-id", stores.title_to_id),
            id_to_record: TypedCache::new("records", stores.id_to_record),
            access_token,
            token: RwLock::new(token),
            options,
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn resolve_by_id(
        &self,
        cancel: &CancelToken,
        id: u64,
    ) -> Result<Option<ExternalWorkRecord>, TankobonError> {
        let key = id.to_string();
        if let Some(record) = self.id_to_record.get(&key)? {
            return Ok(Some(record));
        }

        debug!(id, "fetching catalog record");
        let body = json!({ "query": catalog::query_by_id(), "variables": { "id": id } });
        let data: MediaData = match self.send_request(cancel, &self.options.api_url, &body) {
            Ok(data) => data,
            Err(TankobonError::CatalogStatus { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let Some(record) = data.media else {
            return Ok(None);
        };
        self.id_to_record.set(&key, &record)?;
        Ok(Some(record))
    }

    pub fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
    ) -> Result<Vec<ExternalWorkRecord>, TankobonError> {
        let query = normalize(query);

        if let Some(ids) = self.query_to_ids.get(&query)? {
            if ids.is_empty() {
                debug!(%query, "cached empty search result");
                return Ok(Vec::new());
            }
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = self.resolve_by_id(cancel, id)? {
                    records.push(record);
                }
            }
            if !records.is_empty() {
                return Ok(records);
            }
            debug!(%query, "all cached search results are stale, searching again");
        }

        info!(%query, "searching catalog");
        let body = json!({ "query": catalog::query_search(), "variables": { "query": query } });
        let data: PageData = self.send_request(cancel, &self.options.api_url, &body)?;
        let records = data
            .page
            .and_then(|page| page.media)
            .unwrap_or_default();

        for record in &records {
            self.id_to_record.set(&record.id.to_string(), record)?;
        }
        let ids = records.iter().map(|record| record.id).collect::<Vec<_>>();
        self.query_to_ids.set(&query, &ids)?;
        Ok(records)
    }

    pub fn find_closest(
        &self,
        cancel: &CancelToken,
        title: &str,
    ) -> Result<Option<ExternalWorkRecord>, TankobonError> {
        let normalized = normalize(title);
        if normalized.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.title_to_id.get(&normalized)? {
            if let Some(record) = self.resolve_by_id(cancel, id)? {
                return Ok(Some(record));
            }
            debug!(title = %normalized, id, "bound record no longer resolves");
        }

        let tries = self.options.closest_tries.max(1);
        let step = self.options.closest_step.max(1);
        let mut query = normalized.clone();
        for attempt in 1..=tries {
            cancel.check()?;
            debug!(attempt, %query, "closest match attempt");
            let records = self.search(cancel, &query)?;
            if let Some(best) = closest_match(&normalized, records) {
                info!(
                    title = %normalized,
                    id = best.id,
                    found = best.display_title(),
                    "matched title"
                );
                self.title_to_id.set(&normalized, &best.id)?;
                return Ok(Some(best));
            }
            if attempt == tries {
                break;
            }
            match truncate_query(&query, step) {
                Some(shorter) => query = shorter,
                None => break,
            }
        }

        debug!(title = %normalized, "no catalog match");
        Ok(None)
    }

    pub fn bind_title(
        &self,
        cancel: &CancelToken,
        title: &str,
        id: u64,
    ) -> Result<ExternalWorkRecord, TankobonError> {
        let record = self
            .resolve_by_id(cancel, id)?
            .ok_or_else(|| TankobonError::NotFound(id.to_string()))?;
        self.title_to_id.set(&normalize(title), &id)?;
        Ok(record)
    }

    pub fn work_record(
        &self,
        cancel: &CancelToken,
        work: &Work,
    ) -> Result<Option<ExternalWorkRecord>, TankobonError> {
        self.find_closest(cancel, work.search_title())
    }

    pub fn authorize(
        &self,
        cancel: &CancelToken,
        credentials: &Credentials,
    ) -> Result<(), TankobonError> {
        for (name, value) in [
            ("id", &credentials.id),
            ("secret", &credentials.secret),
            ("code", &credentials.code),
        ] {
            if value.trim().is_empty() {
                return Err(TankobonError::Auth(format!("{name} is empty")));
            }
        }
        cancel.check()?;

        info!("authorizing with the catalog");
        let body = json!({
            "client_id": credentials.id,
            "client_secret": credentials.secret,
            "code": credentials.code,
            "grant_type": "authorization_code",
            "redirect_uri": OAUTH_REDIRECT_URI,
        });
        let response = self
            .transport
            .post_json(&self.options.oauth_url, &body, None)?;
        if response.status != 200 {
            return Err(TankobonError::Auth(format!(
                "{} {}",
                response.status, response.status_text
            )));
        }
        let token: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|err| TankobonError::Auth(err.to_string()))?;
        if token.access_token.is_empty() {
            return Err(TankobonError::Auth("empty access token".to_string()));
        }
        self.access_token.set(ACCESS_TOKEN_KEY, &token.access_token)?;
        *self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(token.access_token);
        Ok(())
    }

    pub fn logout(&self) -> Result<(), TankobonError> {
        self.access_token.delete(ACCESS_TOKEN_KEY)?;
        *self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }

    pub fn is_authorized(&self) -> bool {
        self.bearer().is_some()
    }

    pub fn set_progress(
        &self,
        cancel: &CancelToken,
        id: u64,
        progress: u32,
    ) -> Result<(), TankobonError> {
        if !self.is_authorized() {
            return Err(TankobonError::NotAuthorized);
        }
        info!(id, progress, "saving reading progress");
        let body = json!({
            "query": catalog::MUTATION_SAVE_PROGRESS,
            "variables": { "id": id, "progress": progress },
        });
        let _: Value = self.send_request(cancel, &self.options.api_url, &body)?;
        Ok(())
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn send_request<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
        url: &str,
        body: &Value,
    ) -> Result<T, TankobonError> {
        let bearer = self.bearer();
        loop {
            cancel.check()?;
            let response = self.transport.post_json(url, body, bearer.as_deref())?;

            if response.status == 429 {
                let wait = response
                    .retry_after
                    .as_deref()
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(self.options.default_retry_after);
                warn!(seconds = wait.as_secs_f64(), "rate limited by catalog, waiting");
                cancel.sleep(wait)?;
                continue;
            }

            if response.status != 200 {
                return Err(TankobonError::CatalogStatus {
                    status: response.status,
                    message: response.status_text,
                });
            }

            let envelope: Envelope<T> = serde_json::from_slice(&response.body)
                .map_err(|err| TankobonError::CatalogDecode(err.to_string()))?;
            if let Some(error) = envelope.errors.and_then(|errors| errors.into_iter().next()) {
                return Err(TankobonError::CatalogQuery(error.message));
            }
            return envelope
                .data
                .ok_or_else(|| TankobonError::CatalogDecode("response has no data".to_string()));
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn closest_match(title: &str, records: Vec<ExternalWorkRecord>) -> Option<ExternalWorkRecord> {
    records
        .into_iter()
        .min_by_key(|record| strsim::levenshtein(&record.display_title().to_lowercase(), title))
}

fn truncate_query(query: &str, step: usize) -> Option<String> {
    let query = query.trim();
    let len = query.chars().count();
    let keep = if len > step {
        len - step
    } else if len > 1 {
        len - 1
    } else {
        return None;
    };
    let shorter = query.chars().take(keep).collect::<String>();
    let shorter = shorter.trim();
    if shorter.is_empty() {
        None
    } else {
        Some(shorter.to_string())
    }
}
