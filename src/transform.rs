use std::io::Cursor;
use std::sync::Arc;

use image::ImageFormat;

use crate::error::TankobonError;

pub type ImageTransform = Arc<dyn Fn(Vec<u8>) -> Result<Vec<u8>, TankobonError> + Send + Sync>;

pub fn identity() -> ImageTransform {
    Arc::new(|bytes: Vec<u8>| -> Result<Vec<u8>, TankobonError> { Ok(bytes) })
}

pub fn grayscale() -> ImageTransform {
    Arc::new(|bytes: Vec<u8>| -> Result<Vec<u8>, TankobonError> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| TankobonError::Encode(format!("grayscale: {err}")))?;
        let mut out = Cursor::new(Vec::new());
        decoded
            .grayscale()
            .to_luma8()
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|err| TankobonError::Encode(format!("grayscale: {err}")))?;
        Ok(out.into_inner())
    })
}
