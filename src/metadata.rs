use serde::{Deserialize, Serialize};

use crate::catalog::{ExternalWorkRecord, FuzzyDate, ReleaseStatus};
use crate::domain::{Chapter, Work};
use crate::error::TankobonError;

pub const COMIC_INFO_FILENAME: &str = "ComicInfo.xml";
pub const SERIES_JSON_FILENAME: &str = "series.json";
pub const COVER_FILENAME: &str = "cover.jpg";
pub const BANNER_FILENAME: &str = "banner.jpg";

const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XMLNS_XSD: &str = "http://www.w3.org/2001/XMLSchema";
const PUBLISHER_ROLE_MARKER: &str = "role";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComicInfoOptions {
    pub add_date: bool,
    pub alternative_date: Option<FuzzyDate>,
    pub tag_relevance_threshold: u32,
}

impl Default for ComicInfoOptions {
    fn default() -> Self {
        Self {
            add_date: true,
            alternative_date: None,
            tag_relevance_threshold: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComicInfo {
    pub title: String,
    pub series: String,
    pub number: f32,
    pub web: String,
    pub genres: Vec<String>,
    pub summary: String,
    pub count: u32,
    pub characters: Vec<String>,
    pub page_count: usize,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub writers: Vec<String>,
    pub pencillers: Vec<String>,
    pub letterers: Vec<String>,
    pub translators: Vec<String>,
    pub tags: Vec<String>,
    pub notes: String,
    pub publisher: String,
    pub language_iso: String,
    pub age_rating: String,
    pub community_rating: f32,
    pub format: String,
}

impl ComicInfo {
    pub fn from_record(
        chapter: &Chapter,
        record: &ExternalWorkRecord,
        options: &ComicInfoOptions,
    ) -> Self {
        let mut writers = Vec::new();
        let mut pencillers = Vec::new();
        let mut translators = Vec::new();
        let mut letterers = Vec::new();
        for edge in &record.staff.edges {
            let role = edge.role.to_lowercase();
            let name = edge.node.name.full.clone();
            if role.contains("story") {
                writers.push(name);
            } else if role.contains("art") {
                pencillers.push(name);
            } else if role.contains("translator") {
                translators.push(name);
            } else if role.contains("lettering") {
                letterers.push(name);
            }
        }

        let tags = record
            .tags
            .iter()
            .filter(|tag| tag.rank >= options.tag_relevance_threshold)
            .map(|tag| tag.name.clone())
            .collect();

        Self {
            title: chapter.title.clone(),
            series: chapter.work().title.clone(),
            number: chapter.number,
            web: chapter.url.clone(),
            genres: record.genres.clone(),
            summary: record.description.clone(),
            count: record.chapters,
            characters: record
                .characters
                .nodes
                .iter()
                .map(|node| node.name.full.clone())
                .filter(|name| !name.is_empty())
                .collect(),
            page_count: 0,
            year: record.start_date.year,
            month: record.start_date.month,
            day: record.start_date.day,
            writers,
            pencillers,
            letterers,
            translators,
            tags,
            community_rating: record.average_score as f32 / 20.0,
            ..Self::default()
        }
    }

    pub fn to_xml(&self, options: &ComicInfoOptions) -> Result<String, TankobonError> {
        let mut document = ComicInfoDocument::new(self);
        if !options.add_date {
            document.year = 0;
            document.month = 0;
            document.day = 0;
        } else if let Some(date) = options.alternative_date {
            document.year = date.year;
            document.month = date.month;
            document.day = date.day;
        }

        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some("ComicInfo"))
            .map_err(|err| TankobonError::metadata(COMIC_INFO_FILENAME, err))?;
        serializer.indent(' ', 2);
        document
            .serialize(serializer)
            .map_err(|err| TankobonError::metadata(COMIC_INFO_FILENAME, err))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
    }
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

fn format_decimal(value: f32) -> String {
    if value == 0.0 || !value.is_finite() {
        String::new()
    } else if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ComicInfoDocument {
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'static str,
    #[serde(rename = "@xmlns:xsd")]
    xmlns_xsd: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    series: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    number: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    web: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    genre: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    summary: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    characters: String,
    #[serde(skip_serializing_if = "is_zero_usize")]
    page_count: usize,
    #[serde(skip_serializing_if = "is_zero_i32")]
    year: i32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    month: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    day: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    writer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    penciller: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    letterer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    translator: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    tags: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    notes: String,
    manga: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    age_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    community_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    format: String,
    #[serde(rename = "LanguageISO", skip_serializing_if = "String::is_empty")]
    language_iso: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    publisher: String,
}

impl ComicInfoDocument {
    fn new(info: &ComicInfo) -> Self {
        let notes = [
            info.notes.as_str(),
            "",
            &format!("Downloaded with tankobon/{}", env!("CARGO_PKG_VERSION")),
        ]
        .join("\n")
        .trim_start()
        .to_string();

        Self {
            xmlns_xsi: XMLNS_XSI,
            xmlns_xsd: XMLNS_XSD,
            title: info.title.clone(),
            series: info.series.clone(),
            number: format_decimal(info.number),
            web: info.web.clone(),
            genre: info.genres.join(","),
            summary: info.summary.clone(),
            count: info.count,
            characters: info.characters.join(","),
            page_count: info.page_count,
            year: info.year,
            month: info.month,
            day: info.day,
            writer: info.writers.join(","),
            penciller: info.pencillers.join(","),
            letterer: info.letterers.join(","),
            translator: info.translators.join(","),
            tags: info.tags.join(","),
            notes,
            manga: "YesAndRightToLeft",
            age_rating: info.age_rating.clone(),
            community_rating: format_decimal(info.community_rating),
            format: info.format.clone(),
            language_iso: info.language_iso.clone(),
            publisher: info.publisher.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description_formatted: String,
    pub description_text: String,
    pub status: String,
    pub year: i32,
    #[serde(rename = "ComicImage")]
    pub comic_image: String,
    pub publisher: String,
    #[serde(rename = "comicId")]
    pub comic_id: u64,
    #[serde(rename = "booktype")]
    pub book_type: String,
    pub total_issues: u32,
    pub publication_run: String,
}

#[derive(Serialize)]
struct SeriesJsonDocument<'a> {
    metadata: &'a SeriesJson,
}

impl SeriesJson {
    pub fn from_record(work: &Work, record: &ExternalWorkRecord) -> Self {
        let status = match record.status {
            Some(ReleaseStatus::Finished) => "Ended",
            Some(ReleaseStatus::Releasing) => "Continuing",
            _ => "Unknown",
        };
        let publication_run = format!(
            "{} {} - {} {}",
            record.start_date.month,
            record.start_date.year,
            record.end_date.month,
            record.end_date.year
        );
        Self {
            kind: "comicSeries".to_string(),
            name: work.title.clone(),
            description_formatted: record.description.clone(),
            description_text: record.description.clone(),
            status: status.to_string(),
            year: record.start_date.year,
            comic_image: record.cover_image.extra_large.clone(),
            publisher: record
                .staff_with_role(PUBLISHER_ROLE_MARKER)
                .next()
                .unwrap_or_default()
                .to_string(),
            comic_id: record.id,
            book_type: "Print".to_string(),
            total_issues: record.chapters,
            publication_run,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TankobonError> {
        let mut content = serde_json::to_vec_pretty(&SeriesJsonDocument { metadata: self })
            .map_err(|err| TankobonError::metadata(SERIES_JSON_FILENAME, err))?;
        content.push(b'\n');
        Ok(content)
    }
}
