//! PNG signature images as PDF image XObjects

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::OnboardPdfError;

/// 8-bit pixels split into colour samples and an optional alpha plane
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// 1 for gray, 3 for RGB
    pub components: u8,
    pub color: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Embedded image and its pixel size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

pub fn decode_png(bytes: &[u8]) -> Result<DecodedImage, OnboardPdfError> {
    let mut decoder = png::Decoder::new(bytes);
    // Palette and low bit depths expand to 8-bit, 16-bit is stripped
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| OnboardPdfError::ImageError(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| OnboardPdfError::ImageError(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.width == 0 || info.height == 0 {
        return Err(OnboardPdfError::ImageError("Image has no pixels".into()));
    }

    let (components, has_alpha) = match info.color_type {
        png::ColorType::Grayscale => (1, false),
        png::ColorType::GrayscaleAlpha => (1, true),
        png::ColorType::Rgb => (3, false),
        png::ColorType::Rgba => (3, true),
        png::ColorType::Indexed => {
            return Err(OnboardPdfError::ImageError(
                "Indexed image was not expanded".into(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        let stride = components as usize + 1;
        let mut color = Vec::with_capacity(buf.len() / stride * components as usize);
        let mut alpha = Vec::with_capacity(buf.len() / stride);
        for pixel in buf.chunks_exact(stride) {
            color.extend_from_slice(&pixel[..components as usize]);
            alpha.push(pixel[components as usize]);
        }
        (color, Some(alpha))
    } else {
        (buf, None)
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        components,
        color,
        alpha,
    })
}

/// Add a decoded image to the document, with an `/SMask` when it carries
/// transparency
pub fn embed_image(
    doc: &mut Document,
    image: &DecodedImage,
) -> Result<EmbeddedImage, OnboardPdfError> {
    let color_space = if image.components == 1 {
        "DeviceGray"
    } else {
        "DeviceRGB"
    };

    let smask_id = match &image.alpha {
        Some(alpha) => Some(doc.add_object(image_stream(
            image.width,
            image.height,
            "DeviceGray",
            None,
            deflate(alpha)?,
        ))),
        None => None,
    };

    let id = doc.add_object(image_stream(
        image.width,
        image.height,
        color_space,
        smask_id,
        deflate(&image.color)?,
    ));

    Ok(EmbeddedImage {
        id,
        width: image.width,
        height: image.height,
    })
}

pub fn embed_png(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, OnboardPdfError> {
    let image = decode_png(bytes)?;
    embed_image(doc, &image)
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    smask: Option<ObjectId>,
    data: Vec<u8>,
) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(smask) = smask {
        dict.set("SMask", smask);
    }
    let mut stream = Stream::new(dict, data);
    stream.allows_compression = false;
    stream
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, OnboardPdfError> {
    let compress_error =
        |e: std::io::Error| OnboardPdfError::ImageError(format!("Failed to compress image: {}", e));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(compress_error)?;
    encoder.finish().map_err(compress_error)
}
