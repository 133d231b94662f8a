use std::io::Write;
use std::time::Duration;

use assert_matches::assert_matches;

use tankobon::config::{Config, ConfigLoader, DownloadSection, MetadataSection};
use tankobon::domain::Format;
use tankobon::error::TankobonError;

#[test]
fn file_values_override_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "schema_version": 1,
            "download": {{
                "format": "cbz",
                "directory": "/srv/manga",
                "create_volume_dir": true,
                "strict": true,
                "write_comic_info": true,
                "comic_info": {{ "add_date": false, "tag_relevance_threshold": 80 }}
            }},
            "metadata": {{
                "closest_tries": 5,
                "default_retry_after_secs": 10,
                "cache_dir": "/tmp/tankobon-cache"
            }}
        }}"#
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(file.path().to_str()).unwrap();
    let download = resolved.download_options();
    assert_eq!(download.format, Format::Cbz);
    assert_eq!(download.directory, "/srv/manga");
    assert!(download.create_work_dir);
    assert!(download.create_volume_dir);
    assert!(download.strict);
    assert!(download.write_comic_info);
    assert!(!download.comic_info_options.add_date);
    assert_eq!(download.comic_info_options.tag_relevance_threshold, 80);

    let resolver = resolved.resolver_options();
    assert_eq!(resolver.closest_tries, 5);
    assert_eq!(resolver.closest_step, 3);
    assert_eq!(resolver.default_retry_after, Duration::from_secs(10));
    assert_eq!(resolved.store().unwrap().cache_root().as_str(), "/tmp/tankobon-cache");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    assert_matches!(
        ConfigLoader::resolve(missing.to_str()),
        Err(TankobonError::ConfigRead(path)) if path == missing
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ \"download\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(file.path().to_str()),
        Err(TankobonError::ConfigParse(_))
    );
}

#[test]
fn out_of_range_values_are_rejected() {
    let zero_tries = Config {
        metadata: MetadataSection {
            closest_tries: Some(0),
            ..MetadataSection::default()
        },
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_tries),
        Err(TankobonError::ConfigParse(_))
    );

    let mut threshold = Config::default();
    threshold.download.comic_info.tag_relevance_threshold = Some(101);
    assert_matches!(
        ConfigLoader::resolve_config(threshold),
        Err(TankobonError::ConfigParse(_))
    );

    let future = Config {
        schema_version: Some(2),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(future),
        Err(TankobonError::ConfigParse(_))
    );
}

#[test]
fn grayscale_switch_selects_the_transform() {
    let config = Config {
        download: DownloadSection {
            grayscale: Some(true),
            ..DownloadSection::default()
        },
        ..Config::default()
    };
    let options = ConfigLoader::resolve_config(config).unwrap().download_options();
    assert!((options.image_transform)(b"not an image".to_vec()).is_err());
}
