use serde::{Deserialize, Deserializer, Serialize};

const MEDIA_FIELDS: &str = r#"
id
idMal
title {
  romaji
  english
  native
}
description(asHtml: false)
averageScore
tags {
  name
  description
  rank
}
genres
coverImage {
  extraLarge
  large
  medium
  color
}
bannerImage
characters(page: 1, perPage: 10, role: MAIN) {
  nodes {
    name {
      full
      native
    }
  }
}
startDate {
  year
  month
  day
}
endDate {
  year
  month
  day
}
staff {
  edges {
    role
    node {
      name {
        full
      }
    }
  }
}
status
synonyms
siteUrl
chapters
countryOfOrigin
externalLinks {
  url
}
"#;

pub fn query_by_id() -> String {
    format!("query ($id: Int) {{\n  Media(id: $id, type: MANGA) {{{MEDIA_FIELDS}}}\n}}")
}

pub fn query_search() -> String {
    format!(
        "query ($query: String) {{\n  Page(page: 1, perPage: 30) {{\n    media(search: $query, type: MANGA) {{{MEDIA_FIELDS}}}\n  }}\n}}"
    )
}

pub const MUTATION_SAVE_PROGRESS: &str = r#"
mutation ($id: Int, $progress: Int) {
  SaveMediaListEntry(mediaId: $id, progress: $progress, status: CURRENT) {
    id
  }
}
"#;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleVariants {
    #[serde(default, deserialize_with = "null_as_default")]
    pub romaji: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub english: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub native: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub extra_large: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub large: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medium: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

impl CoverImage {
    pub fn best(&self) -> Option<&str> {
        [&self.extra_large, &self.large, &self.medium]
            .into_iter()
            .map(String::as_str)
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(default, deserialize_with = "null_as_default")]
    pub full: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub native: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: PersonName,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characters {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<CharacterNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: PersonName,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffEdge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub node: StaffNode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<StaffEdge>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyDate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub year: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub month: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalWorkRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id_mal: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: TitleVariants,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_score: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    #[serde(default, deserialize_with = "null_as_default")]
    pub banner_image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Characters,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: FuzzyDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_date: FuzzyDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub staff: Staff,
    #[serde(default)]
    pub status: Option<ReleaseStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub synonyms: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub site_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapters: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country_of_origin: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_links: Vec<ExternalLink>,
}

impl ExternalWorkRecord {
    pub fn display_title(&self) -> &str {
        [&self.title.english, &self.title.romaji, &self.title.native]
            .into_iter()
            .map(String::as_str)
            .find(|title| !title.is_empty())
            .unwrap_or("")
    }

    pub fn staff_with_role<'a>(&'a self, marker: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let marker = marker.to_lowercase();
        self.staff
            .edges
            .iter()
            .filter(move |edge| edge.role.to_lowercase().contains(&marker))
            .map(|edge| edge.node.name.full.as_str())
    }
}
