use std::io::{Cursor, Write};

use camino::Utf8Path;
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::domain::{DownloadedPage, Format};
use crate::error::TankobonError;
use crate::fs::Filesystem;
use crate::metadata::{COMIC_INFO_FILENAME, ComicInfo, ComicInfoOptions};

pub fn page_file_name(index: usize, page: &DownloadedPage) -> String {
    format!("{:04}.{}", index + 1, page.extension())
}

fn encode_err(err: impl std::fmt::Display) -> TankobonError {
    TankobonError::Encode(err.to_string())
}

pub fn encode(
    format: Format,
    pages: &[DownloadedPage],
    comic_info: Option<&ComicInfo>,
    options: &ComicInfoOptions,
) -> Result<Vec<u8>, TankobonError> {
    match format {
        Format::Pdf => encode_pdf(pages),
        Format::Cbz => encode_zip(pages, comic_info, options),
        Format::Zip => encode_zip(pages, None, options),
        Format::Tar => encode_tar(pages, Vec::new()),
        Format::TarGz => {
            let encoder = GzEncoder::new(Vec::new(), Compression::default());
            encode_tar(pages, encoder)?.finish().map_err(encode_err)
        }
        Format::Images => Err(TankobonError::Encode(
            "image directories are written, not encoded".to_string(),
        )),
    }
}

pub fn write_chapter(
    fs: &dyn Filesystem,
    path: &Utf8Path,
    format: Format,
    pages: &[DownloadedPage],
    comic_info: Option<&ComicInfo>,
    options: &ComicInfoOptions,
) -> Result<(), TankobonError> {
    if format.is_directory() {
        return write_images(fs, path, pages);
    }
    let content = encode(format, pages, comic_info, options)?;
    fs.write(path, &content)
}

pub fn write_images(
    fs: &dyn Filesystem,
    dir: &Utf8Path,
    pages: &[DownloadedPage],
) -> Result<(), TankobonError> {
    fs.create_dir_all(dir)?;
    for (index, page) in pages.iter().enumerate() {
        fs.write(&dir.join(page_file_name(index, page)), &page.image)?;
    }
    Ok(())
}

fn encode_zip(
    pages: &[DownloadedPage],
    comic_info: Option<&ComicInfo>,
    options: &ComicInfoOptions,
) -> Result<Vec<u8>, TankobonError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (index, page) in pages.iter().enumerate() {
        zip.start_file(page_file_name(index, page), stored)
            .map_err(encode_err)?;
        zip.write_all(&page.image).map_err(encode_err)?;
    }

    if let Some(info) = comic_info {
        let mut info = info.clone();
        info.page_count = pages.len();
        let xml = info.to_xml(options)?;
        zip.start_file(COMIC_INFO_FILENAME, stored)
            .map_err(encode_err)?;
        zip.write_all(xml.as_bytes()).map_err(encode_err)?;
    }

    Ok(zip.finish().map_err(encode_err)?.into_inner())
}

fn encode_tar<W: Write>(pages: &[DownloadedPage], writer: W) -> Result<W, TankobonError> {
    let mtime = chrono::Utc::now().timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(writer);
    for (index, page) in pages.iter().enumerate() {
        let mut header = tar::Header::new_gnu();
        header.set_size(page.image.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder
            .append_data(&mut header, page_file_name(index, page), page.image.as_slice())
            .map_err(encode_err)?;
    }
    builder.into_inner().map_err(encode_err)
}

fn encode_pdf(pages: &[DownloadedPage]) -> Result<Vec<u8>, TankobonError> {
    if pages.is_empty() {
        return Err(TankobonError::EmptyDocument);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for (index, page) in pages.iter().enumerate() {
        let image = image::load_from_memory(&page.image)
            .map_err(|err| TankobonError::Encode(format!("page {}: {err}", index + 1)))?
            .to_rgb8();
        let (width, height) = (image.width() as i64, image.height() as i64);

        let mut pixels = ZlibEncoder::new(Vec::new(), Compression::default());
        pixels.write_all(image.as_raw()).map_err(encode_err)?;
        let pixels = pixels.finish().map_err(encode_err)?;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            pixels,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(encode_err)?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(encode_err)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_rejects_empty_chapter() {
        let result = encode(Format::Pdf, &[], None, &ComicInfoOptions::default());
        assert!(matches!(result, Err(TankobonError::EmptyDocument)));
    }

    #[test]
    fn archives_accept_empty_chapter() {
        for format in [Format::Cbz, Format::Zip, Format::Tar, Format::TarGz] {
            assert!(encode(format, &[], None, &ComicInfoOptions::default()).is_ok());
        }
    }
}
