//! Embedding a raster image into a paginated PDF.
//!
//! The image is scaled to the printable width of the page. When the
//! scaled height exceeds one page it is cut into horizontal slices, one
//! JPEG image per page.

use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const JPEG_QUALITY: u8 = 90;
const IMAGE_NAME: &str = "Im0";

/// Output page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// ISO A4 portrait, 595 x 842 pt.
    #[default]
    A4,
    /// US Letter portrait, 612 x 792 pt.
    Letter,
}

impl PageFormat {
    /// Page width and height in points.
    #[must_use]
    pub fn size_pt(self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A4 => write!(f, "a4"),
            Self::Letter => write!(f, "letter"),
        }
    }
}

/// Finished PDF bytes.
#[derive(Debug)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

fn pdf_error(e: impl fmt::Display) -> Error {
    Error::report(format!("PDF encoding failed: {e}"))
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| Error::report(format!("JPEG encoding failed: {e}")))?;
    Ok(buffer.into_inner())
}

/// Lay `image` out over as many pages as its scaled height needs.
///
/// # Errors
///
/// Returns a report error if the margins leave no printable area or
/// encoding fails.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn build_pdf(
    image: &RgbImage,
    format: PageFormat,
    margin_pt: f32,
    title: &str,
) -> Result<PdfOutput> {
    let (page_width, page_height) = format.size_pt();
    let printable_width = page_width - 2.0 * margin_pt;
    let printable_height = page_height - 2.0 * margin_pt;
    if !margin_pt.is_finite()
        || margin_pt < 0.0
        || printable_width <= 0.0
        || printable_height <= 0.0
    {
        return Err(Error::report(format!(
            "margin of {margin_pt}pt leaves no printable area on {format} pages"
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::report("cannot embed an empty image"));
    }

    // Points per image pixel.
    let scale = printable_width / image.width() as f32;
    let slice_height = ((printable_height / scale).floor() as u32).max(1);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    let mut top = 0;
    while top < image.height() {
        let height = slice_height.min(image.height() - top);
        let slice = imageops::crop_imm(image, 0, top, image.width(), height).to_image();
        let drawn_height = height as f32 * scale;

        let page_id = add_page(
            &mut doc,
            pages_id,
            &slice,
            (page_width, page_height),
            (margin_pt, page_height - margin_pt - drawn_height),
            (printable_width, drawn_height),
        )?;
        kids.push(page_id.into());
        top += height;
    }

    let pages = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::try_from(pages).map_err(pdf_error)?,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(concat!("rollcall ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(pdf_error)?;
    debug!("Encoded {} page PDF ({} bytes)", pages, bytes.len());

    Ok(PdfOutput { bytes, pages })
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    slice: &RgbImage,
    (page_width, page_height): (f32, f32),
    (x, y): (f32, f32),
    (width, height): (f32, f32),
) -> Result<ObjectId> {
    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(slice.width()),
                "Height" => i64::from(slice.height()),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            encode_jpeg(slice)?,
        )
        .with_compression(false),
    );

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(height),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().map_err(pdf_error)?,
    ));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_width),
            Object::Real(page_height),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_NAME => image_id,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([200, 10, 10]))
    }

    #[test]
    fn test_page_sizes() {
        assert_eq!(PageFormat::A4.size_pt(), (595.0, 842.0));
        assert_eq!(PageFormat::Letter.size_pt(), (612.0, 792.0));
        assert_eq!(PageFormat::default(), PageFormat::A4);
    }

    #[test]
    fn test_single_page() {
        let output = build_pdf(&image(794, 600), PageFormat::A4, 36.0, "test").unwrap();
        assert_eq!(output.pages, 1);
        assert!(output.bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&output.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_tall_image_spans_pages() {
        // 523pt printable width over 794px gives ~1168px of image per page.
        let output = build_pdf(&image(794, 3000), PageFormat::A4, 36.0, "test").unwrap();
        assert_eq!(output.pages, 3);

        let doc = Document::load_mem(&output.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_margin_too_large() {
        let err = build_pdf(&image(10, 10), PageFormat::Letter, 400.0, "test").unwrap_err();
        assert!(err.to_string().contains("printable area"));
    }

    #[test]
    fn test_non_finite_margin_rejected() {
        for margin in [f32::NAN, f32::INFINITY] {
            let err = build_pdf(&image(10, 10), PageFormat::A4, margin, "test").unwrap_err();
            assert!(err.to_string().contains("printable area"));
        }
    }

    #[test]
    fn test_encode_jpeg_header() {
        let bytes = encode_jpeg(&image(4, 4)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
