use std::fmt;
use std::process::Command;
use std::sync::{Arc, mpsc};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::assets::AssetClient;
use crate::cancel::CancelToken;
use crate::catalog::ExternalWorkRecord;
use crate::domain::{Chapter, DownloadedPage, Format, Page, ProviderInfo, Volume, Work};
use crate::error::TankobonError;
use crate::format;
use crate::fs::{Filesystem, MemoryFilesystem, merge_dirs};
use crate::metadata::{
    BANNER_FILENAME, COMIC_INFO_FILENAME, COVER_FILENAME, ComicInfo, ComicInfoOptions,
    SERIES_JSON_FILENAME, SeriesJson,
};
use crate::naming::{Filenames, NameTemplates};
use crate::provider::Provider;
use crate::resolver::MetadataResolver;
use crate::transform::{self, ImageTransform};

#[derive(Clone)]
pub struct DownloadOptions {
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
    pub comic_info_options: ComicInfoOptions,
    pub image_transform: ImageTransform,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: Format::Pdf,
            directory: Utf8PathBuf::from("."),
            create_work_dir: true,
            create_volume_dir: false,
            skip_if_exists: true,
            strict: false,
            download_cover: false,
            download_banner: false,
            write_series_json: false,
            write_comic_info: false,
            comic_info_options: ComicInfoOptions::default(),
            image_transform: transform::identity(),
        }
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("format", &self.format)
            .field("directory", &self.directory)
            .field("create_work_dir", &self.create_work_dir)
            .field("create_volume_dir", &self.create_volume_dir)
            .field("skip_if_exists", &self.skip_if_exists)
            .field("strict", &self.strict)
            .field("download_cover", &self.download_cover)
            .field("download_banner", &self.download_banner)
            .field("write_series_json", &self.write_series_json)
            .field("write_comic_info", &self.write_comic_info)
            .field("comic_info_options", &self.comic_info_options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub save_progress: bool,
    pub incognito: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            save_progress: true,
            incognito: false,
        }
    }
}

pub trait ArtifactOpener: Send + Sync {
    fn open(&self, path: &Utf8Path) -> Result<(), TankobonError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl ArtifactOpener for SystemOpener {
    fn open(&self, path: &Utf8Path) -> Result<(), TankobonError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };
        let output = cmd
            .arg(path.as_str())
            .output()
            .map_err(|err| TankobonError::Open(format!("{path}: {err}")))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{path}: opener exited with {}", output.status)
        } else {
            format!("{path}: {stderr}")
        };
        Err(TankobonError::Open(message))
    }
}

pub struct Downloader {
    provider: Arc<dyn Provider>,
    resolver: Arc<MetadataResolver>,
    assets: Arc<dyn AssetClient>,
    fs: Arc<dyn Filesystem>,
    opener: Arc<dyn ArtifactOpener>,
    names: NameTemplates,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("provider", &self.provider.info().id)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    pub fn new(
        provider: Arc<dyn Provider>,
        resolver: Arc<MetadataResolver>,
        assets: Arc<dyn AssetClient>,
        fs: Arc<dyn Filesystem>,
    ) -> Result<Self, TankobonError> {
        provider.info().validate()?;
        Ok(Self {
            provider,
            resolver,
            assets,
            fs,
            opener: Arc::new(SystemOpener),
            names: NameTemplates::default(),
        })
    }

    pub fn with_names(mut self, names: NameTemplates) -> Self {
        self.names = names;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ArtifactOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn info(&self) -> ProviderInfo {
        self.provider.info()
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn search_works(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Work>, TankobonError> {
        let works = self.provider.search_works(cancel, query)?;
        for work in &works {
            work.validate()?;
        }
        Ok(works)
    }

    pub fn work_volumes(
        &self,
        cancel: &CancelToken,
        work: &Arc<Work>,
    ) -> Result<Vec<Volume>, TankobonError> {
        self.provider.work_volumes(cancel, work)
    }

    pub fn volume_chapters(
        &self,
        cancel: &CancelToken,
        volume: &Arc<Volume>,
    ) -> Result<Vec<Chapter>, TankobonError> {
        let chapters = self.provider.volume_chapters(cancel, volume)?;
        for chapter in &chapters {
            chapter.validate()?;
        }
        Ok(chapters)
    }

    pub fn chapter_pages(
        &self,
        cancel: &CancelToken,
        chapter: &Arc<Chapter>,
    ) -> Result<Vec<Page>, TankobonError> {
        let pages = self
            .provider
            .chapter_pages(cancel, chapter)
            .map_err(|err| TankobonError::ChapterPages {
                chapter: chapter.title.clone(),
                source: Box::new(err),
            })?;
        pages.into_iter().map(Page::normalize).collect()
    }

    pub fn filenames(&self, chapter: &Chapter, format: Format) -> Filenames {
        Filenames::compute(&self.names, chapter, format)
    }

    pub fn download_chapter(
        &self,
        cancel: &CancelToken,
        chapter: &Arc<Chapter>,
        options: &DownloadOptions,
    ) -> Result<Utf8PathBuf, TankobonError> {
        chapter.validate()?;
        chapter.work().validate()?;
        cancel.check()?;

        let names = self.filenames(chapter, options.format);
        let root = options.directory.as_path();
        let work_dir = names.chapter_dir(root, options.create_work_dir, false);
        let chapter_dir =
            names.chapter_dir(root, options.create_work_dir, options.create_volume_dir);
        let chapter_path = chapter_dir.join(&names.chapter);

        let staging = MemoryFilesystem::new();
        staging.create_dir_all(root)?;
        staging.create_dir_all(&chapter_dir)?;

        let mut lookup = RecordLookup::new(&self.resolver, chapter.work());
        let exists = self.fs.exists(&chapter_path)?;
        let staged_chapter = if exists && options.skip_if_exists {
            info!(path = %chapter_path, "chapter already downloaded, skipping");
            false
        } else {
            self.stage_chapter(cancel, chapter, &chapter_path, &staging, options, &mut lookup)?;
            true
        };

        self.stage_aux(cancel, chapter.work(), &work_dir, &staging, options, &mut lookup)?;
        cancel.check()?;

        // single-file artifacts are replaced atomically by the merge
        if staged_chapter && exists && self.fs.is_dir(&chapter_path)? {
            debug!(path = %chapter_path, "replacing existing image directory");
            self.fs.remove_dir_all(&chapter_path)?;
        }
        merge_dirs(self.fs.as_ref(), root, &staging, root)?;
        Ok(chapter_path)
    }

    pub fn read_chapter(
        &self,
        cancel: &CancelToken,
        path: &Utf8Path,
        chapter: &Chapter,
        options: ReadOptions,
    ) -> Result<(), TankobonError> {
        info!(path = %path, "opening chapter with the default application");
        self.opener.open(path)?;
        if options.save_progress && !options.incognito && self.resolver.is_authorized() {
            return self.mark_chapter_as_read(cancel, chapter);
        }
        Ok(())
    }

    pub fn mark_chapter_as_read(
        &self,
        cancel: &CancelToken,
        chapter: &Chapter,
    ) -> Result<(), TankobonError> {
        let work = chapter.work();
        let record = self.resolver.work_record(cancel, work)?.ok_or_else(|| {
            TankobonError::metadata(
                "reading progress",
                format!("no catalog match for {:?}", work.search_title()),
            )
        })?;
        let progress = chapter.number.trunc().max(0.0) as u32;
        self.resolver.set_progress(cancel, record.id, progress)
    }

    fn stage_chapter(
        &self,
        cancel: &CancelToken,
        chapter: &Arc<Chapter>,
        chapter_path: &Utf8Path,
        staging: &MemoryFilesystem,
        options: &DownloadOptions,
        lookup: &mut RecordLookup<'_>,
    ) -> Result<(), TankobonError> {
        let pages = self.chapter_pages(cancel, chapter)?;
        info!(chapter = %chapter.title, pages = pages.len(), "downloading chapter");
        let pages = self
            .download_pages(cancel, pages)?
            .into_iter()
            .map(|mut page| {
                page.image = (options.image_transform)(std::mem::take(&mut page.image))?;
                Ok(page)
            })
            .collect::<Result<Vec<_>, TankobonError>>()?;

        let comic_info = if options.format == Format::Cbz && options.write_comic_info {
            let result = self.comic_info(cancel, chapter, options, lookup);
            tolerate(options.strict, COMIC_INFO_FILENAME, result)?
        } else {
            None
        };

        format::write_chapter(
            staging,
            chapter_path,
            options.format,
            &pages,
            comic_info.as_ref(),
            &options.comic_info_options,
        )
    }

    fn stage_aux(
        &self,
        cancel: &CancelToken,
        work: &Work,
        work_dir: &Utf8Path,
        staging: &MemoryFilesystem,
        options: &DownloadOptions,
        lookup: &mut RecordLookup<'_>,
    ) -> Result<(), TankobonError> {
        if options.write_series_json {
            let path = work_dir.join(SERIES_JSON_FILENAME);
            if self.fs.exists(&path)? {
                debug!(path = %path, "series.json exists, skipping");
            } else {
                let result = self
                    .series_json(cancel, work, lookup)
                    .and_then(|series| series.to_json());
                if let Some(content) = tolerate(options.strict, SERIES_JSON_FILENAME, result)? {
                    staging.write(&path, &content)?;
                }
            }
        }

        let images = [
            (options.download_cover, COVER_FILENAME, ImageKind::Cover),
            (options.download_banner, BANNER_FILENAME, ImageKind::Banner),
        ];
        for (requested, filename, kind) in images {
            if !requested {
                continue;
            }
            let path = work_dir.join(filename);
            if self.fs.exists(&path)? {
                debug!(path = %path, "{filename} exists, skipping");
                continue;
            }
            let result = self.work_image(cancel, work, kind, lookup);
            if let Some(content) = tolerate(options.strict, filename, result)? {
                staging.write(&path, &content)?;
            }
        }
        Ok(())
    }

    fn comic_info(
        &self,
        cancel: &CancelToken,
        chapter: &Chapter,
        options: &DownloadOptions,
        lookup: &mut RecordLookup<'_>,
    ) -> Result<ComicInfo, TankobonError> {
        if let Some(info) = self.provider.chapter_comic_info(cancel, chapter)? {
            return Ok(info);
        }
        let record = lookup.require(cancel)?;
        Ok(ComicInfo::from_record(chapter, record, &options.comic_info_options))
    }

    fn series_json(
        &self,
        cancel: &CancelToken,
        work: &Work,
        lookup: &mut RecordLookup<'_>,
    ) -> Result<SeriesJson, TankobonError> {
        if let Some(series) = self.provider.work_series_json(cancel, work)? {
            return Ok(series);
        }
        let record = lookup.require(cancel)?;
        Ok(SeriesJson::from_record(work, record))
    }

    fn work_image(
        &self,
        cancel: &CancelToken,
        work: &Work,
        kind: ImageKind,
        lookup: &mut RecordLookup<'_>,
    ) -> Result<Vec<u8>, TankobonError> {
        let supplied = match kind {
            ImageKind::Cover => work.cover_url.as_deref(),
            ImageKind::Banner => work.banner_url.as_deref(),
        }
        .filter(|url| !url.is_empty())
        .map(str::to_string);

        let url = match supplied {
            Some(url) => url,
            None => {
                let record = lookup.require(cancel)?;
                let url = match kind {
                    ImageKind::Cover => record.cover_image.best(),
                    ImageKind::Banner => Some(record.banner_image.as_str()),
                };
                url.filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        TankobonError::metadata(kind.filename(), "no image url available")
                    })?
            }
        };
        debug!(%url, "fetching {}", kind.filename());
        let referer = Some(work.url.as_str()).filter(|url| !url.is_empty());
        self.assets.fetch_image(cancel, &url, referer)
    }

    fn download_pages(
        &self,
        cancel: &CancelToken,
        pages: Vec<Page>,
    ) -> Result<Vec<DownloadedPage>, TankobonError> {
        let total = pages.len();
        let group = cancel.child();
        let (tx, rx) = mpsc::channel();

        for (index, page) in pages.into_iter().enumerate() {
            let tx = tx.clone();
            let provider = Arc::clone(&self.provider);
            let task_cancel = group.clone();
            thread::Builder::new()
                .name(format!("page-{}", index + 1))
                .spawn(move || {
                    let result = task_cancel
                        .check()
                        .and_then(|()| provider.page_image(&task_cancel, &page))
                        .map(|image| DownloadedPage { page, image });
                    let _ = tx.send((index, result));
                })
                .map_err(|err| {
                    group.cancel();
                    TankobonError::Runtime(format!("failed to spawn page download: {err}"))
                })?;
        }
        drop(tx);

        let mut slots: Vec<Option<DownloadedPage>> = (0..total).map(|_| None).collect();
        for (index, result) in rx {
            match result {
                Ok(page) => {
                    debug!(page = index + 1, total, "page downloaded");
                    slots[index] = Some(page);
                }
                Err(err) => {
                    group.cancel();
                    if err.is_cancelled() {
                        return Err(TankobonError::Cancelled);
                    }
                    warn!(page = index + 1, error = %err, "page download failed");
                    return Err(TankobonError::PageDownload {
                        index: index + 1,
                        source: Box::new(err),
                    });
                }
            }
        }
        cancel.check()?;

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    TankobonError::Runtime(format!("page {} download did not complete", index + 1))
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum ImageKind {
    Cover,
    Banner,
}

impl ImageKind {
    fn filename(self) -> &'static str {
        match self {
            ImageKind::Cover => COVER_FILENAME,
            ImageKind::Banner => BANNER_FILENAME,
        }
    }
}

struct RecordLookup<'a> {
    resolver: &'a MetadataResolver,
    work: &'a Work,
    resolved: Option<Option<ExternalWorkRecord>>,
}

impl<'a> RecordLookup<'a> {
    fn new(resolver: &'a MetadataResolver, work: &'a Work) -> Self {
        Self {
            resolver,
            work,
            resolved: None,
        }
    }

    fn require(&mut self, cancel: &CancelToken) -> Result<&ExternalWorkRecord, TankobonError> {
        if self.resolved.is_none() {
            let record = self.resolver.work_record(cancel, self.work)?;
            self.resolved = Some(record);
        }
        self.resolved
            .as_ref()
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                TankobonError::metadata(
                    "catalog record",
                    format!("no catalog match for {:?}", self.work.search_title()),
                )
            })
    }
}

fn tolerate<T>(
    strict: bool,
    artifact: &str,
    result: Result<T, TankobonError>,
) -> Result<Option<T>, TankobonError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_cancelled() => Err(TankobonError::Cancelled),
        Err(err @ TankobonError::Metadata { .. }) if strict => Err(err),
        Err(err) if strict => Err(TankobonError::metadata(artifact, err)),
        Err(err) => {
            warn!(artifact, error = %err, "skipping auxiliary file");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn lenient_mode_swallows_auxiliary_failures() {
        let result: Result<u8, _> = Err(TankobonError::AssetHttp("timeout".to_string()));
        assert_matches!(tolerate(false, COVER_FILENAME, result), Ok(None));
    }

    #[test]
    fn strict_mode_names_the_artifact() {
        let result: Result<u8, _> = Err(TankobonError::AssetHttp("timeout".to_string()));
        assert_matches!(
            tolerate(true, COVER_FILENAME, result),
            Err(TankobonError::Metadata { artifact, .. }) if artifact == COVER_FILENAME
        );
    }

    #[test]
    fn cancellation_is_never_swallowed() {
        let result: Result<u8, _> = Err(TankobonError::Cancelled);
        assert_matches!(tolerate(false, BANNER_FILENAME, result), Err(TankobonError::Cancelled));
    }

    #[test]
    fn default_options_produce_pdf_in_a_work_directory() {
        let options = DownloadOptions::default();
        assert_eq!(options.format, Format::Pdf);
        assert!(options.create_work_dir && options.skip_if_exists);
        assert!(!options.strict && !options.write_comic_info);
    }
}
