use std::sync::Arc;

use assert_matches::assert_matches;

use tankobon::domain::{Chapter, Format, Page, ProviderInfo, Volume, Work};
use tankobon::error::TankobonError;
use tankobon::naming::{Filenames, NameTemplates};

fn work(title: &str) -> Arc<Work> {
    Arc::new(Work {
        title: title.to_string(),
        alternate_search_title: None,
        url: "https://source.test/w/1".to_string(),
        id: "w1".to_string(),
        cover_url: None,
        banner_url: None,
    })
}

fn chapter(work: Arc<Work>, number: f32, title: &str) -> Arc<Chapter> {
    let volume = Arc::new(Volume::new(3, work));
    Arc::new(Chapter::new(title, "https://source.test/c/1", number, volume))
}

#[test]
fn provider_versions_accept_a_v_prefix() {
    let info = ProviderInfo {
        id: "mangadex".to_string(),
        name: "MangaDex".to_string(),
        version: "v0.4.1".to_string(),
        description: String::new(),
    };
    assert!(info.validate().is_ok());

    let unnamed = ProviderInfo {
        name: " ".to_string(),
        ..info.clone()
    };
    assert_matches!(unnamed.validate(), Err(TankobonError::InvalidProviderInfo(_)));

    let unversioned = ProviderInfo {
        version: "latest".to_string(),
        ..info
    };
    assert_matches!(unversioned.validate(), Err(TankobonError::InvalidProviderInfo(_)));
}

#[test]
fn works_need_a_title_and_parseable_urls() {
    assert!(work("Monster").validate().is_ok());

    let mut broken = (*work("Monster")).clone();
    broken.cover_url = Some("not a url".to_string());
    assert_matches!(broken.validate(), Err(TankobonError::InvalidWork(_)));

    let untitled = (*work("")).clone();
    assert_matches!(untitled.validate(), Err(TankobonError::InvalidWork(_)));
}

#[test]
fn alternate_title_is_preferred_for_lookups() {
    let mut w = (*work("Shingeki no Kyojin")).clone();
    assert_eq!(w.search_title(), "Shingeki no Kyojin");
    w.alternate_search_title = Some("Attack on Titan".to_string());
    assert_eq!(w.search_title(), "Attack on Titan");
}

#[test]
fn page_extensions_are_normalized() {
    let ch = chapter(work("Monster"), 1.0, "Herr Dr. Tenma");
    assert_eq!(Page::new(".webp", ch.clone()).normalize().unwrap().extension, "webp");
    assert_eq!(Page::new("", ch.clone()).normalize().unwrap().extension, "jpg");
    assert_matches!(
        Page::new("../png", ch).normalize(),
        Err(TankobonError::InvalidPage(_))
    );
}

#[test]
fn default_names_follow_the_chapter_hierarchy() {
    let ch = chapter(work("Re:Zero / Arc 1"), 4.0, "A Long Night?");
    let names = Filenames::compute(&NameTemplates::default(), &ch, Format::TarGz);
    assert_eq!(names.work, "Re_Zero _ Arc 1");
    assert_eq!(names.volume, "Vol. 3");
    assert_eq!(names.chapter, "[0004] A Long Night_.tar.gz");

    let images = Filenames::compute(&NameTemplates::default(), &ch, Format::Images);
    assert_eq!(images.chapter, "[0004] A Long Night_");
}

#[test]
fn custom_name_functions_are_used() {
    let templates = NameTemplates {
        chapter: Arc::new(|chapter: &Chapter| format!("ch{}", chapter.number)),
        ..NameTemplates::default()
    };
    let ch = chapter(work("Monster"), 7.0, "The Nameless Monster");
    assert_eq!(Filenames::compute(&templates, &ch, Format::Cbz).chapter, "ch7.cbz");
}

#[test]
fn formats_parse_from_config_values() {
    let format: Format = serde_json::from_str("\"tar.gz\"").unwrap();
    assert_eq!(format, Format::TarGz);
    let format: Format = serde_json::from_str("\"cbz\"").unwrap();
    assert_eq!(format.extension(), ".cbz");
}
