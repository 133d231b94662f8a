use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use clap::ValueEnum;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::TankobonError;

pub const DEFAULT_PAGE_EXTENSION: &str = "jpg";

static PAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.]*[a-zA-Z0-9]$").expect("static pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Cbz,
    Zip,
    Tar,
    #[serde(alias = "tar.gz")]
    #[value(name = "targz", alias = "tar.gz")]
    TarGz,
    Images,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => ".pdf",
            Format::Cbz => ".cbz",
            Format::Zip => ".zip",
            Format::Tar => ".tar",
            Format::TarGz => ".tar.gz",
            Format::Images => "",
        }
    }

    pub fn is_directory(self) -> bool {
        matches!(self, Format::Images)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Pdf => write!(f, "pdf"),
            Format::Cbz => write!(f, "cbz"),
            Format::Zip => write!(f, "zip"),
            Format::Tar => write!(f, "tar"),
            Format::TarGz => write!(f, "targz"),
            Format::Images => write!(f, "images"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

impl ProviderInfo {
    pub fn validate(&self) -> Result<(), TankobonError> {
        if self.id.trim().is_empty() {
            return Err(TankobonError::InvalidProviderInfo("id must be non-empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(TankobonError::InvalidProviderInfo(
                "name must be non-empty".to_string(),
            ));
        }
        let version = self.version.strip_prefix('v').unwrap_or(&self.version);
        semver::Version::parse(version).map_err(|err| {
            TankobonError::InvalidProviderInfo(format!("version {:?}: {err}", self.version))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub title: String,
    #[serde(default)]
    pub alternate_search_title: Option<String>,
    pub url: String,
    pub id: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
}

impl Work {
    pub fn validate(&self) -> Result<(), TankobonError> {
        if self.title.trim().is_empty() {
            return Err(TankobonError::InvalidWork("title must be non-empty".to_string()));
        }
        if self.id.trim().is_empty() {
            return Err(TankobonError::InvalidWork(format!(
                "{:?}: id must be non-empty",
                self.title
            )));
        }
        for url in [Some(&self.url), self.cover_url.as_ref(), self.banner_url.as_ref()]
            .into_iter()
            .flatten()
            .filter(|url| !url.is_empty())
        {
            Url::parse(url).map_err(|err| {
                TankobonError::InvalidWork(format!("{:?}: invalid url {url:?}: {err}", self.title))
            })?;
        }
        Ok(())
    }

    pub fn search_title(&self) -> &str {
        self.alternate_search_title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub number: u32,
    work: Arc<Work>,
}

impl Volume {
    pub fn new(number: u32, work: Arc<Work>) -> Self {
        Self { number, work }
    }

    pub fn work(&self) -> &Work {
        &self.work
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub url: String,
    pub number: f32,
    volume: Arc<Volume>,
}

impl Chapter {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        number: f32,
        volume: Arc<Volume>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            number,
            volume,
        }
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn work(&self) -> &Work {
        self.volume.work()
    }

    pub fn validate(&self) -> Result<(), TankobonError> {
        if self.title.trim().is_empty() {
            return Err(TankobonError::InvalidChapter(format!(
                "chapter {} of {:?}: title must be non-empty",
                self.number,
                self.work().title
            )));
        }
        if !self.number.is_finite() {
            return Err(TankobonError::InvalidChapter(format!(
                "{:?}: number must be finite",
                self.title
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub extension: String,
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
    chapter: Arc<Chapter>,
}

impl Page {
    pub fn new(extension: impl Into<String>, chapter: Arc<Chapter>) -> Self {
        Self {
            extension: extension.into(),
            url: None,
            headers: BTreeMap::new(),
            chapter,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn normalize(mut self) -> Result<Self, TankobonError> {
        let trimmed = self.extension.trim().trim_start_matches('.');
        self.extension = if trimmed.is_empty() {
            DEFAULT_PAGE_EXTENSION.to_string()
        } else {
            trimmed.to_string()
        };
        if !PAGE_EXTENSION.is_match(&self.extension) {
            return Err(TankobonError::InvalidPage(format!(
                "invalid extension {:?}",
                self.extension
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedPage {
    pub page: Page,
    pub image: Vec<u8>,
}

impl DownloadedPage {
    pub fn extension(&self) -> &str {
        &self.page.extension
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn work() -> Arc<Work> {
        Arc::new(Work {
            title: "Blue Period".to_string(),
            alternate_search_title: None,
            url: "https://example.org/manga/blue-period".to_string(),
            id: "blue-period".to_string(),
            cover_url: None,
            banner_url: None,
        })
    }

    #[test]
    fn provider_info_accepts_v_prefix() {
        let info = ProviderInfo {
            id: "mangadex".to_string(),
            name: "MangaDex".to_string(),
            version: "v1.2.3".to_string(),
            description: String::new(),
        };
        assert!(info.validate().is_ok());
    }

    #[test]
    fn provider_info_rejects_bad_version() {
        let info = ProviderInfo {
            id: "mangadex".to_string(),
            name: "MangaDex".to_string(),
            version: "1.2".to_string(),
            description: String::new(),
        };
        assert_matches!(info.validate(), Err(TankobonError::InvalidProviderInfo(_)));
    }

    #[test]
    fn page_extension_normalized() {
        let volume = Arc::new(Volume::new(1, work()));
        let chapter = Arc::new(Chapter::new("Start", "https://example.org/c/1", 1.0, volume));
        let page = Page::new(".png", chapter.clone()).normalize().unwrap();
        assert_eq!(page.extension, "png");
        let page = Page::new("", chapter.clone()).normalize().unwrap();
        assert_eq!(page.extension, DEFAULT_PAGE_EXTENSION);
        assert_matches!(
            Page::new("p!g", chapter).normalize(),
            Err(TankobonError::InvalidPage(_))
        );
    }

    #[test]
    fn search_title_prefers_alternate() {
        let mut work = (*work()).clone();
        assert_eq!(work.search_title(), "Blue Period");
        work.alternate_search_title = Some("Buruu Piriodo".to_string());
        assert_eq!(work.search_title(), "Buruu Piriodo");
    }
}
