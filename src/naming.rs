use std::fmt;
use std::sync::{Arc, LazyLock};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::domain::{Chapter, Format, Volume, Work};

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static pattern"));

const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub type NameFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

pub fn sanitize_path(name: &str) -> String {
    let replaced = name
        .chars()
        .map(|ch| {
            if INVALID_PATH_CHARS.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect::<String>();
    UNDERSCORE_RUNS
        .replace_all(replaced.trim(), "_")
        .into_owned()
}

pub fn format_chapter_number(number: f32) -> String {
    if number.fract() == 0.0 {
        format!("{:04}", number as i64)
    } else {
        format!("{number:06.1}")
    }
}

pub fn default_work_name(work: &Work) -> String {
    sanitize_path(&work.title)
}

pub fn default_volume_name(volume: &Volume) -> String {
    sanitize_path(&format!("Vol. {}", volume.number))
}

pub fn default_chapter_name(chapter: &Chapter) -> String {
    sanitize_path(&format!(
        "[{}] {}",
        format_chapter_number(chapter.number),
        chapter.title
    ))
}

#[derive(Clone)]
pub struct NameTemplates {
    pub work: NameFn<Work>,
    pub volume: NameFn<Volume>,
    pub chapter: NameFn<Chapter>,
}

impl Default for NameTemplates {
    fn default() -> Self {
        Self {
            work: Arc::new(default_work_name),
            volume: Arc::new(default_volume_name),
            chapter: Arc::new(default_chapter_name),
        }
    }
}

impl fmt::Debug for NameTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTemplates").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filenames {
    pub work: String,
    pub volume: String,
    pub chapter: String,
}

impl Filenames {
    pub fn compute(templates: &NameTemplates, chapter: &Chapter, format: Format) -> Self {
        Self {
            work: (templates.work)(chapter.work()),
            volume: (templates.volume)(chapter.volume()),
            chapter: format!("{}{}", (templates.chapter)(chapter), format.extension()),
        }
    }

    pub fn chapter_dir(
        &self,
        root: &Utf8Path,
        create_work_dir: bool,
        create_volume_dir: bool,
    ) -> Utf8PathBuf {
        let mut dir = root.to_path_buf();
        if create_work_dir {
            dir.push(&self.work);
        }
        if create_volume_dir {
            dir.push(&self.volume);
        }
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_underscores() {
        assert_eq!(sanitize_path("Re:Zero / Part *2*"), "Re_Zero _ Part _2_");
        assert_eq!(sanitize_path("a<>b"), "a_b");
    }

    #[test]
    fn chapter_numbers_are_padded() {
        assert_eq!(format_chapter_number(7.0), "0007");
        assert_eq!(format_chapter_number(10.5), "0010.5");
        assert_eq!(format_chapter_number(1234.0), "1234");
    }

    #[test]
    fn chapter_dir_respects_flags() {
        let names = Filenames {
            work: "Berserk".to_string(),
            volume: "Vol. 1".to_string(),
            chapter: "[0001] The Black Swordsman.cbz".to_string(),
        };
        let root = Utf8Path::new("/library");
        assert_eq!(names.chapter_dir(root, true, true), "/library/Berserk/Vol. 1");
        assert_eq!(names.chapter_dir(root, false, true), "/library/Vol. 1");
        assert_eq!(names.chapter_dir(root, false, false), "/library");
    }
}
