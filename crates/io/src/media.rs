// Multimedia ZIP adapter + image suitability classifier

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;
use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::sniff::Signature;
use crate::upload;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Members larger than this are not decoded.
const MAX_MEMBER_BYTES: u64 = 256 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suitability {
    ProfessionalPrint,
    AiTraining,
    StandardWeb,
    LowQuality,
    Corrupted,
}

impl Suitability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfessionalPrint => "Professional Print",
            Self::AiTraining => "AI Training",
            Self::StandardWeb => "Standard Web",
            Self::LowQuality => "Low Quality",
            Self::Corrupted => "Corrupted",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::ProfessionalPrint => 4,
            Self::AiTraining => 3,
            Self::StandardWeb => 2,
            Self::LowQuality => 1,
            Self::Corrupted => 0,
        }
    }
}

impl fmt::Display for Suitability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded facts about one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Detected container format, lowercase (`png`, `jpeg`, `gif`, `svg`, ...).
    pub format: String,
    pub width: u64,
    pub height: u64,
}

/// Megapixel bands: >= 3.0 print, >= 0.5 AI training, >= 0.1 web, else low.
/// GIF never rates above Standard Web.
pub fn classify(info: &ImageInfo) -> Suitability {
    let megapixels = (info.width as f64 * info.height as f64) / 1_000_000.0;
    let band = if megapixels >= 3.0 {
        Suitability::ProfessionalPrint
    } else if megapixels >= 0.5 {
        Suitability::AiTraining
    } else if megapixels >= 0.1 {
        Suitability::StandardWeb
    } else {
        Suitability::LowQuality
    };
    if info.format == "gif" && band.rank() > Suitability::StandardWeb.rank() {
        Suitability::StandardWeb
    } else {
        band
    }
}

/// Read dimensions and check the stream is complete. `Err` carries the
/// reason the image counts as corrupted.
pub fn inspect_image(ext: &str, bytes: &[u8]) -> Result<ImageInfo, String> {
    if bytes.is_empty() {
        return Err("empty file".into());
    }
    if ext == "svg" {
        return inspect_svg(bytes);
    }

    let kind = imagesize::image_type(bytes).map_err(|_| "unrecognized image data".to_string())?;
    let size = imagesize::blob_size(bytes).map_err(|e| format!("unreadable header: {:?}", e))?;
    if size.width == 0 || size.height == 0 {
        return Err("zero image dimension".into());
    }

    let format = match kind {
        imagesize::ImageType::Png => {
            if !tail_contains(bytes, b"IEND") {
                return Err("truncated PNG (no IEND chunk)".into());
            }
            "png".to_string()
        }
        imagesize::ImageType::Jpeg => {
            if !tail_contains(bytes, &[0xFF, 0xD9]) {
                return Err("truncated JPEG (no end-of-image marker)".into());
            }
            "jpeg".to_string()
        }
        imagesize::ImageType::Gif => {
            if !bytes.iter().rev().take(16).any(|&b| b == 0x3B) {
                return Err("truncated GIF (no trailer)".into());
            }
            "gif".to_string()
        }
        imagesize::ImageType::Webp => {
            let declared = bytes
                .get(4..8)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize + 8)
                .unwrap_or(usize::MAX);
            if declared > bytes.len() {
                return Err("truncated WebP (RIFF size exceeds data)".into());
            }
            "webp".to_string()
        }
        other => format!("{:?}", other).to_ascii_lowercase(),
    };

    Ok(ImageInfo {
        format,
        width: size.width as u64,
        height: size.height as u64,
    })
}

fn tail_contains(bytes: &[u8], needle: &[u8]) -> bool {
    let start = bytes.len().saturating_sub(64);
    bytes[start..].windows(needle.len()).any(|w| w == needle)
}

fn svg_dims() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"viewBox\s*=\s*["']\s*[-\d.]+[\s,]+[-\d.]+[\s,]+([\d.]+)[\s,]+([\d.]+)"#).unwrap()
    })
}

fn svg_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\b(width|height)\s*=\s*["']\s*([\d.]+)"#).unwrap())
}

/// SVG is vector: dimensions come from `width`/`height` or the `viewBox`.
fn inspect_svg(bytes: &[u8]) -> Result<ImageInfo, String> {
    let text = std::str::from_utf8(bytes).map_err(|_| "SVG is not valid UTF-8".to_string())?;
    let open = text.find("<svg").ok_or_else(|| "no <svg> element".to_string())?;
    if !text.contains("</svg>") && !text[open..].contains("/>") {
        return Err("unterminated <svg> element".into());
    }
    let tag_end = text[open..].find('>').map(|i| open + i).unwrap_or(text.len());
    let tag = &text[open..tag_end];

    let mut width = None;
    let mut height = None;
    for caps in svg_attr().captures_iter(tag) {
        let v = caps[2].parse::<f64>().ok();
        match &caps[1] {
            "width" => width = v,
            _ => height = v,
        }
    }
    if width.is_none() || height.is_none() {
        if let Some(caps) = svg_dims().captures(tag) {
            width = width.or_else(|| caps[1].parse().ok());
            height = height.or_else(|| caps[2].parse().ok());
        }
    }
    let (w, h) = match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w.round() as u64, h.round() as u64),
        _ => return Err("SVG declares no usable size".into()),
    };
    Ok(ImageInfo {
        format: "svg".into(),
        width: w.max(1),
        height: h.max(1),
    })
}

// ---------------------------------------------------------------------------
// ZIP adapter
// ---------------------------------------------------------------------------

pub struct ZipMediaAdapter;

impl SourceAdapter for ZipMediaAdapter {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["zip"], &[Signature::Zip])?;
        let items = scan_archive(&file.bytes)?;
        let corrupted = items.iter().filter(|i| i.defect.is_some()).count();
        tracing::info!(file = %file.name, members = items.len(), corrupted, "scanned multimedia archive");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/zip"),
            items,
        })
    }
}

fn is_skipped(name: &str) -> bool {
    let base = name.rsplit('/').next().unwrap_or(name);
    name.ends_with('/') || name.starts_with("__MACOSX/") || name.contains("/__MACOSX/") || base.starts_with("._")
}

/// One record per archive member. Members that cannot be decoded become
/// corrupted items; they never fail their siblings.
pub fn scan_archive(bytes: &[u8]) -> Result<Vec<RawItem>, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::ParseFailure(format!("unreadable ZIP archive: {}", e)))?;

    let mut items = Vec::new();
    for i in 0..archive.len() {
        let name = archive.name_for_index(i).unwrap_or_default().to_string();
        if is_skipped(&name) {
            continue;
        }
        let ext = name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .filter(|e| !e.contains('/'))
            .unwrap_or_default();

        let mut fields = BTreeMap::new();
        fields.insert("filename".to_string(), FieldValue::text(name.clone()));
        fields.insert("extension".to_string(), FieldValue::text(ext.clone()));

        let content = match read_member(&mut archive, i) {
            Ok((size, data)) => {
                fields.insert("size_kb".to_string(), FieldValue::float(round2(size as f64 / 1024.0)));
                data
            }
            Err(reason) => {
                tracing::warn!(member = %name, %reason, "unreadable archive member");
                items.push(corrupted_item(fields, &ext, reason));
                continue;
            }
        };

        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            fields.insert("multimedia_type".to_string(), FieldValue::text("Other"));
            fields.insert("resolution".to_string(), FieldValue::Null);
            fields.insert("suitability".to_string(), FieldValue::text("N/A (Non-Image)"));
            fields.insert("status".to_string(), FieldValue::text("Healthy"));
            items.push(RawItem::new(fields));
            continue;
        }

        match inspect_image(&ext, &content) {
            Ok(info) => {
                let suitability = classify(&info);
                let status = if suitability == Suitability::LowQuality {
                    "Warning (Low Res)"
                } else {
                    "Healthy"
                };
                fields.insert("multimedia_type".to_string(), FieldValue::text("Image"));
                fields.insert(
                    "resolution".to_string(),
                    FieldValue::Text(format!("{}x{}", info.width, info.height)),
                );
                fields.insert("detected_format".to_string(), FieldValue::Text(info.format));
                fields.insert("suitability".to_string(), FieldValue::text(suitability.as_str()));
                fields.insert("status".to_string(), FieldValue::text(status));
                items.push(RawItem::new(fields));
            }
            Err(reason) => {
                tracing::warn!(member = %name, %reason, "corrupted image");
                items.push(corrupted_item(fields, &ext, reason));
            }
        }
    }
    Ok(items)
}

fn read_member(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    index: usize,
) -> Result<(u64, Vec<u8>), String> {
    let member = archive.by_index(index).map_err(|e| e.to_string())?;
    let size = member.size();
    if size > MAX_MEMBER_BYTES {
        return Err(format!("member too large ({} bytes)", size));
    }
    let mut data = Vec::with_capacity(size as usize);
    member
        .take(MAX_MEMBER_BYTES)
        .read_to_end(&mut data)
        .map_err(|e| e.to_string())?;
    Ok((size, data))
}

fn corrupted_item(mut fields: BTreeMap<String, FieldValue>, ext: &str, reason: String) -> RawItem {
    let kind = if IMAGE_EXTENSIONS.contains(&ext) { "Image" } else { "Other" };
    fields.insert("multimedia_type".to_string(), FieldValue::text(kind));
    fields.insert("resolution".to_string(), FieldValue::Null);
    fields.insert("suitability".to_string(), FieldValue::text(Suitability::Corrupted.as_str()));
    fields.insert("status".to_string(), FieldValue::text("Corrupted"));
    RawItem::corrupted(fields, reason)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal, structurally valid image streams for tests.

    use std::io::{Cursor, Write};

    pub fn png(w: u32, h: u32) -> Vec<u8> {
        let mut v = b"\x89PNG\r\n\x1a\n".to_vec();
        v.extend(13u32.to_be_bytes());
        v.extend(b"IHDR");
        v.extend(w.to_be_bytes());
        v.extend(h.to_be_bytes());
        v.extend([8, 2, 0, 0, 0]);
        v.extend([0; 4]);
        v.extend(0u32.to_be_bytes());
        v.extend(b"IEND");
        v.extend([0xAE, 0x42, 0x60, 0x82]);
        v
    }

    pub fn jpeg(w: u16, h: u16) -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8];
        v.extend([0xFF, 0xC0, 0x00, 0x11, 0x08]);
        v.extend(h.to_be_bytes());
        v.extend(w.to_be_bytes());
        v.extend([0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
        v.extend([0xFF, 0xD9]);
        v
    }

    pub fn gif(w: u16, h: u16) -> Vec<u8> {
        let mut v = b"GIF89a".to_vec();
        v.extend(w.to_le_bytes());
        v.extend(h.to_le_bytes());
        v.extend([0x00, 0x00, 0x00]);
        v.push(0x3B);
        v
    }

    pub fn zip(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        let mut zw = zip::ZipWriter::new(&mut buf);
        for (name, data) in members {
            if name.ends_with('/') {
                zw.add_directory(*name, zip::write::SimpleFileOptions::default()).unwrap();
            } else {
                zw.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
                zw.write_all(data).unwrap();
            }
        }
        zw.finish().unwrap();
        buf.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn info(format: &str, w: u64, h: u64) -> ImageInfo {
        ImageInfo {
            format: format.into(),
            width: w,
            height: h,
        }
    }

    #[test]
    fn megapixel_bands() {
        assert_eq!(classify(&info("png", 2000, 1500)), Suitability::ProfessionalPrint);
        assert_eq!(classify(&info("png", 1000, 500)), Suitability::AiTraining);
        assert_eq!(classify(&info("png", 400, 250)), Suitability::StandardWeb);
        assert_eq!(classify(&info("png", 300, 300)), Suitability::LowQuality);
    }

    #[test]
    fn gif_capped_at_standard_web() {
        assert_eq!(classify(&info("gif", 4000, 4000)), Suitability::StandardWeb);
        assert_eq!(classify(&info("gif", 50, 50)), Suitability::LowQuality);
    }

    #[test]
    fn inspect_detects_truncation() {
        assert!(inspect_image("png", &png(10, 10)).is_ok());
        let mut cut = png(10, 10);
        cut.truncate(33);
        assert!(inspect_image("png", &cut).is_err());

        let mut cut = jpeg(10, 10);
        cut.truncate(cut.len() - 2);
        assert!(inspect_image("jpg", &cut).is_err());
        assert!(inspect_image("png", b"definitely not an image").is_err());
    }

    #[test]
    fn svg_size_from_attributes_or_viewbox() {
        let a = inspect_svg(br#"<svg width="1200" height="800"></svg>"#).unwrap();
        assert_eq!((a.width, a.height), (1200, 800));
        let b = inspect_svg(br#"<svg viewBox="0 0 640 480"/>"#).unwrap();
        assert_eq!((b.width, b.height), (640, 480));
        assert!(inspect_svg(b"<svg>").is_err());
    }

    #[test]
    fn five_images_two_corrupted() {
        let mut bad_jpeg = jpeg(800, 600);
        bad_jpeg.truncate(bad_jpeg.len() - 2);
        let archive = zip(&[
            ("photos/", Vec::new()),
            ("photos/print.png", png(2000, 2000)),
            ("photos/train.png", png(1000, 600)),
            ("photos/web.jpg", jpeg(400, 300)),
            ("photos/anim.gif", gif(2000, 2000)),
            ("photos/thumb.png", png(100, 100)),
            ("photos/broken.png", b"garbage bytes".to_vec()),
            ("photos/cut.jpg", bad_jpeg),
            ("__MACOSX/photos/._print.png", vec![0; 16]),
        ]);
        let items = scan_archive(&archive).unwrap();
        assert_eq!(items.len(), 7);

        let ok: Vec<_> = items.iter().filter(|i| i.defect.is_none()).collect();
        let bad: Vec<_> = items.iter().filter(|i| i.defect.is_some()).collect();
        assert_eq!(ok.len(), 5);
        assert_eq!(bad.len(), 2);

        let suit = |name: &str| {
            items
                .iter()
                .find(|i| i.fields["filename"] == FieldValue::text(name))
                .map(|i| i.fields["suitability"].clone())
                .unwrap()
        };
        assert_eq!(suit("photos/print.png"), FieldValue::text("Professional Print"));
        assert_eq!(suit("photos/train.png"), FieldValue::text("AI Training"));
        assert_eq!(suit("photos/web.jpg"), FieldValue::text("Standard Web"));
        assert_eq!(suit("photos/anim.gif"), FieldValue::text("Standard Web"));
        assert_eq!(suit("photos/thumb.png"), FieldValue::text("Low Quality"));
        assert_eq!(suit("photos/broken.png"), FieldValue::text("Corrupted"));
        assert_eq!(bad[0].fields["status"], FieldValue::text("Corrupted"));
    }

    #[test]
    fn non_images_are_reported() {
        let items = scan_archive(&zip(&[("notes.txt", b"hello".to_vec())])).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields["multimedia_type"], FieldValue::text("Other"));
        assert_eq!(items[0].fields["suitability"], FieldValue::text("N/A (Non-Image)"));
    }

    #[test]
    fn non_zip_is_parse_failure() {
        let err = scan_archive(b"PK\x03\x04 broken").unwrap_err();
        assert_eq!(err.category(), "parse_failure");
    }
}
