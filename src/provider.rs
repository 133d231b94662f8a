use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::domain::{Chapter, Page, ProviderInfo, Volume, Work};
use crate::error::TankobonError;
use crate::metadata::{ComicInfo, SeriesJson};

pub trait Provider: Send + Sync {
    fn info(&self) -> ProviderInfo;

    fn search_works(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Work>, TankobonError>;

    fn work_volumes(
        &self,
        cancel: &CancelToken,
        work: &Arc<Work>,
    ) -> Result<Vec<Volume>, TankobonError>;

    fn volume_chapters(
        &self,
        cancel: &CancelToken,
        volume: &Arc<Volume>,
    ) -> Result<Vec<Chapter>, TankobonError>;

    fn chapter_pages(
        &self,
        cancel: &CancelToken,
        chapter: &Arc<Chapter>,
    ) -> Result<Vec<Page>, TankobonError>;

    fn page_image(&self, cancel: &CancelToken, page: &Page) -> Result<Vec<u8>, TankobonError>;

    fn work_series_json(
        &self,
        _cancel: &CancelToken,
        _work: &Work,
    ) -> Result<Option<SeriesJson>, TankobonError> {
        Ok(None)
    }

    fn chapter_comic_info(
        &self,
        _cancel: &CancelToken,
        _chapter: &Chapter,
    ) -> Result<Option<ComicInfo>, TankobonError> {
        Ok(None)
    }
}
