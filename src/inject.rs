//! Caption metadata injection for downloaded photos.
//!
//! Writes the caption into the image container without re-encoding pixels:
//!
//! - **JPEG**: a COM segment after SOI and any leading APPn segments,
//!   holding the caption, the credit line, and `Source: <label>`.
//! - **PNG**: `Description`, `Credit`, and `Source` text chunks inserted
//!   before `IEND`. Latin-1-safe text uses `tEXt`; anything else `iTXt`.
//!
//! Format detection goes through [`image::guess_format`]. Other formats
//! are rejected.

use anyhow::{bail, Context, Result};

use photodesk_core::reconcile::{ImageFormat, MetadataInjector};

const JPEG_COM: u8 = 0xFE;
const JPEG_APP0: u8 = 0xE0;
const JPEG_APP15: u8 = 0xEF;
/// Segment payload limit: the 16-bit length field counts itself.
const JPEG_MAX_SEGMENT: usize = 0xFFFF - 2;
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Credit text for a source label.
pub fn short_source_label(label: &str) -> &str {
    if label.contains("gettyimages.com") {
        "Getty Images"
    } else {
        label
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CaptionInjector;

impl MetadataInjector for CaptionInjector {
    fn inject(
        &self,
        bytes: &[u8],
        caption: &str,
        source_label: &str,
    ) -> Result<(Vec<u8>, ImageFormat)> {
        let format = detect_format(bytes)?;
        let caption = caption.trim();
        if caption.is_empty() {
            return Ok((bytes.to_vec(), format));
        }
        let out = match format {
            ImageFormat::Jpeg => inject_jpeg(bytes, caption, source_label)?,
            ImageFormat::Png => inject_png(bytes, caption, source_label)?,
        };
        Ok((out, format))
    }
}

fn detect_format(bytes: &[u8]) -> Result<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
        Ok(image::ImageFormat::Png) => Ok(ImageFormat::Png),
        Ok(other) => bail!("unsupported image format: {:?}", other),
        Err(e) => bail!("unrecognised image data: {}", e),
    }
}

fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn inject_jpeg(bytes: &[u8], caption: &str, source_label: &str) -> Result<Vec<u8>> {
    if bytes.len() < 2 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        bail!("JPEG is missing its SOI marker");
    }
    let text = format!(
        "{}\nCredit: {}\nSource: {}",
        caption,
        short_source_label(source_label),
        source_label
    );
    let payload = truncate_utf8(&text, JPEG_MAX_SEGMENT).as_bytes();
    let len = u16::try_from(payload.len() + 2).context("COM segment too large")?;

    let at = after_app_segments(bytes)?;
    let mut out = Vec::with_capacity(bytes.len() + payload.len() + 4);
    out.extend_from_slice(&bytes[..at]);
    out.extend_from_slice(&[0xFF, JPEG_COM]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&bytes[at..]);
    Ok(out)
}

/// Offset just past SOI and the APPn segments that follow it. JFIF and
/// Exif readers expect their APP0/APP1 segment directly after SOI.
fn after_app_segments(bytes: &[u8]) -> Result<usize> {
    let mut offset = 2;
    while offset + 4 <= bytes.len()
        && bytes[offset] == 0xFF
        && (JPEG_APP0..=JPEG_APP15).contains(&bytes[offset + 1])
    {
        let len = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if len < 2 || offset + 2 + len > bytes.len() {
            bail!("JPEG APP segment is truncated");
        }
        offset += 2 + len;
    }
    Ok(offset)
}

/// Byte offset of the `IEND` chunk.
fn find_iend(bytes: &[u8]) -> Result<usize> {
    if !bytes.starts_with(PNG_SIGNATURE) {
        bail!("PNG signature missing");
    }
    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= bytes.len() {
        let len = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        if &bytes[offset + 4..offset + 8] == b"IEND" {
            return Ok(offset);
        }
        offset = offset
            .checked_add(12 + len)
            .context("PNG chunk length overflow")?;
    }
    bail!("PNG has no IEND chunk")
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| (c as u32) < 0x100 && c != '\0')
}

/// Encode one `tEXt` (or `iTXt` for non Latin-1 text) chunk.
pub fn png_text_chunk(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    let kind: &[u8; 4] = if is_latin1(text) {
        data.extend_from_slice(keyword.as_bytes());
        data.push(0);
        data.extend(text.chars().map(|c| c as u32 as u8));
        b"tEXt"
    } else {
        data.extend_from_slice(keyword.as_bytes());
        // null separator, no compression, empty language and translated keyword
        data.extend_from_slice(&[0, 0, 0, 0, 0]);
        data.extend_from_slice(text.as_bytes());
        b"iTXt"
    };
    png_chunk(kind, &data)
}

pub fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(data.len() + 12);
    chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
    chunk.extend_from_slice(kind);
    chunk.extend_from_slice(data);
    let crc = crc32(&chunk[4..]);
    chunk.extend_from_slice(&crc.to_be_bytes());
    chunk
}

fn inject_png(bytes: &[u8], caption: &str, source_label: &str) -> Result<Vec<u8>> {
    let iend = find_iend(bytes)?;
    let mut out = Vec::with_capacity(bytes.len() + caption.len() + source_label.len() + 64);
    out.extend_from_slice(&bytes[..iend]);
    out.extend(png_text_chunk("Description", caption));
    out.extend(png_text_chunk("Credit", short_source_label(source_label)));
    out.extend(png_text_chunk("Source", source_label));
    out.extend_from_slice(&bytes[iend..]);
    Ok(out)
}

/// CRC-32 (IEEE 802.3) as used by PNG.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
