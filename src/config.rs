use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::FuzzyDate;
use crate::domain::Format;
use crate::download::DownloadOptions;
use crate::error::TankobonError;
use crate::metadata::ComicInfoOptions;
use crate::resolver::ResolverOptions;
use crate::store::Store;
use crate::transform;

pub const DEFAULT_CONFIG_FILE: &str = "tankobon.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub metadata: MetadataSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DownloadSection {
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub directory: Option<Utf8PathBuf>,
    #[serde(default)]
    pub create_work_dir: Option<bool>,
    #[serde(default)]
    pub create_volume_dir: Option<bool>,
    #[serde(default)]
    pub skip_if_exists: Option<bool>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub download_cover: Option<bool>,
    #[serde(default)]
    pub download_banner: Option<bool>,
    #[serde(default)]
    pub write_series_json: Option<bool>,
    #[serde(default)]
    pub write_comic_info: Option<bool>,
    #[serde(default)]
    pub grayscale: Option<bool>,
    #[serde(default)]
    pub comic_info: ComicInfoSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ComicInfoSection {
    #[serde(default)]
    pub add_date: Option<bool>,
    #[serde(default)]
    pub alternative_date: Option<FuzzyDate>,
    #[serde(default)]
    pub tag_relevance_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MetadataSection {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub oauth_url: Option<String>,
    #[serde(default)]
    pub closest_tries: Option<usize>,
    #[serde(default)]
    pub closest_step: Option<usize>,
    #[serde(default)]
    pub default_retry_after_secs: Option<u64>,
    #[serde(default)]
    pub cache_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDownload {
    pub format: Format,
    pub directory: Utf8PathBuf,
    pub create_work_dir: bool,
    pub create_volume_dir: bool,
    pub skip_if_exists: bool,
    pub strict: bool,
    pub download_cover: bool,
    pub download_banner: bool,
    pub write_series_json: bool,
    pub write_comic_info: bool,
    pub grayscale: bool,
    pub add_date: bool,
    pub alternative_date: Option<FuzzyDate>,
    pub tag_relevance_threshold: u32,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub download: ResolvedDownload,
    pub resolver: ResolverOptions,
    pub cache_dir: Option<Utf8PathBuf>,
}

impl ResolvedConfig {
    pub fn download_options(&self) -> DownloadOptions {
        let d = &self.download;
        DownloadOptions {
            format: d.format,
            directory: d.directory.clone(),
            create_work_dir: d.create_work_dir,
            create_volume_dir: d.create_volume_dir,
            skip_if_exists: d.skip_if_exists,
            strict: d.strict,
            download_cover: d.download_cover,
            download_banner: d.download_banner,
            write_series_json: d.write_series_json,
            write_comic_info: d.write_comic_info,
            comic_info_options: ComicInfoOptions {
                add_date: d.add_date,
                alternative_date: d.alternative_date,
                tag_relevance_threshold: d.tag_relevance_threshold,
            },
            image_transform: if d.grayscale {
                transform::grayscale()
            } else {
                transform::identity()
            },
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        self.resolver.clone()
    }

    pub fn store(&self) -> Result<Store, TankobonError> {
        match &self.cache_dir {
            Some(dir) => Ok(Store::new_with_paths(dir.clone())),
            None => Store::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, TankobonError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TankobonError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TankobonError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TankobonError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(TankobonError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let defaults = DownloadOptions::default();
        let d = config.download;
        let tag_relevance_threshold = d
            .comic_info
            .tag_relevance_threshold
            .unwrap_or(defaults.comic_info_options.tag_relevance_threshold);
        if tag_relevance_threshold > 100 {
            return Err(TankobonError::ConfigParse(format!(
                "tag_relevance_threshold must be at most 100, got {tag_relevance_threshold}"
            )));
        }
        let download = ResolvedDownload {
            format: d.format.unwrap_or(defaults.format),
            directory: d.directory.unwrap_or(defaults.directory),
            create_work_dir: d.create_work_dir.unwrap_or(defaults.create_work_dir),
            create_volume_dir: d.create_volume_dir.unwrap_or(defaults.create_volume_dir),
            skip_if_exists: d.skip_if_exists.unwrap_or(defaults.skip_if_exists),
            strict: d.strict.unwrap_or(defaults.strict),
            download_cover: d.download_cover.unwrap_or(defaults.download_cover),
            download_banner: d.download_banner.unwrap_or(defaults.download_banner),
            write_series_json: d.write_series_json.unwrap_or(defaults.write_series_json),
            write_comic_info: d.write_comic_info.unwrap_or(defaults.write_comic_info),
            grayscale: d.grayscale.unwrap_or(false),
            add_date: d
                .comic_info
                .add_date
                .unwrap_or(defaults.comic_info_options.add_date),
            alternative_date: d.comic_info.alternative_date,
            tag_relevance_threshold,
        };

        let base = ResolverOptions::default();
        let m = config.metadata;
        let closest_tries = m.closest_tries.unwrap_or(base.closest_tries);
        let closest_step = m.closest_step.unwrap_or(base.closest_step);
        if closest_tries == 0 || closest_step == 0 {
            return Err(TankobonError::ConfigParse(
                "closest_tries and closest_step must be at least 1".to_string(),
            ));
        }
        let resolver = ResolverOptions {
            api_url: m.api_url.unwrap_or(base.api_url),
            oauth_url: m.oauth_url.unwrap_or(base.oauth_url),
            closest_tries,
            closest_step,
            default_retry_after: m
                .default_retry_after_secs
                .map(Duration::from_secs)
                .unwrap_or(base.default_retry_after),
        };

        Ok(ResolvedConfig {
            schema_version,
            download,
            resolver,
            cache_dir: m.cache_dir,
        })
    }
}
