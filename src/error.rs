use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TankobonError {
    #[error("invalid work: {0}")]
    InvalidWork(String),

    #[error("invalid chapter: {0}")]
    InvalidChapter(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("invalid provider info: {0}")]
    InvalidProviderInfo(String),

    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("failed to list pages of chapter {chapter:?}")]
    ChapterPages {
        chapter: String,
        #[source]
        source: Box<TankobonError>,
    },

    #[error("failed to download page #{index}")]
    PageDownload {
        index: usize,
        #[source]
        source: Box<TankobonError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("catalog query failed: {0}")]
    CatalogQuery(String),

    #[error("failed to decode catalog response: {0}")]
    CatalogDecode(String),

    #[error("no catalog record matches {0:?}")]
    NotFound(String),

    #[error("not authorized with the catalog")]
    NotAuthorized,

    #[error("catalog authorization failed: {0}")]
    Auth(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to encode chapter: {0}")]
    Encode(String),

    #[error("cannot build a document without pages")]
    EmptyDocument,

    #[error("failed to produce {artifact}: {message}")]
    Metadata { artifact: String, message: String },

    #[error("image request failed: {0}")]
    AssetHttp(String),

    #[error("image host returned status {status}: {message}")]
    AssetStatus { status: u16, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to open chapter: {0}")]
    Open(String),

    #[error("{0}")]
    Runtime(String),
}

impl TankobonError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            TankobonError::Cancelled => true,
            TankobonError::ChapterPages { source, .. }
            | TankobonError::PageDownload { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub(crate) fn metadata(artifact: &str, err: impl std::fmt::Display) -> Self {
        TankobonError::Metadata {
            artifact: artifact.to_string(),
            message: err.to_string(),
        }
    }
}
