//! Content type sniffing module
//!
//! Classifies a leading sample of a blob by magic bytes and structure,
//! following the WHATWG MIME sniffing rules for the signatures that matter to
//! a code host (images, PDF, archives, markup) and recognising SVG documents
//! that would otherwise be reported as text.

use crate::http::mime::SVG_MIME_TYPE;
use regex::bytes::Regex;
use std::sync::LazyLock;

/// Coarse content classes driving the response policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Text,
    Image,
    Pdf,
    Svg,
    Binary,
}

/// Result of sniffing a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedType {
    content_type: &'static str,
}

impl SniffedType {
    /// The detected MIME type, e.g. `image/png`
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/")
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_svg(&self) -> bool {
        self.content_type.contains(SVG_MIME_TYPE)
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.contains("application/pdf")
    }

    /// Collapse the MIME type into the classes the response policy knows
    pub fn classification(&self) -> Classification {
        if self.is_svg() {
            Classification::Svg
        } else if self.is_image() {
            Classification::Image
        } else if self.is_pdf() {
            Classification::Pdf
        } else if self.is_text() {
            Classification::Text
        } else {
            Classification::Binary
        }
    }
}

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const TEXT_XML: &str = "text/xml; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Exact prefix signatures
const PREFIX_SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"Rar!\x1A\x07", "application/x-rar-compressed"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"\x00asm", "application/wasm"),
    (b"\x7FELF", OCTET_STREAM),
];

/// Byte order marks that mark the content as text
const TEXT_BOMS: &[&[u8]] = &[b"\xEF\xBB\xBF", b"\xFE\xFF", b"\xFF\xFE"];

/// Markup openers recognised as HTML when followed by a tag-terminating byte
const HTML_OPENERS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

static SVG_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s-u)<!--.*?-->").expect("svg comment pattern is valid"));

static SVG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si-u)\A\s*(?:(<!DOCTYPE\s+svg([\s:]+.*?>|>))\s*)*<svg\b")
        .expect("svg tag pattern is valid")
});

static SVG_TAG_IN_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si-u)\A<\?xml\b.*?\?>\s*(?:(<!DOCTYPE\s+svg([\s:]+.*?>|>))\s*)*<svg\b")
        .expect("svg in xml pattern is valid")
});

/// Detect the content type of a leading sample
///
/// # Examples
/// ```
/// use blobserve::content::sniff::{sniff, Classification};
///
/// assert_eq!(sniff(b"hello world\n").classification(), Classification::Text);
/// assert_eq!(sniff(b"%PDF-1.7").classification(), Classification::Pdf);
/// assert_eq!(sniff(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>").classification(), Classification::Svg);
/// ```
pub fn sniff(sample: &[u8]) -> SniffedType {
    let content_type = detect_base_type(sample);
    let content_type = refine_svg(sample, content_type);
    SniffedType { content_type }
}

fn detect_base_type(sample: &[u8]) -> &'static str {
    if sample.is_empty() {
        return TEXT_PLAIN;
    }

    if let Some(mime) = PREFIX_SIGNATURES
        .iter()
        .find_map(|&(magic, mime)| sample.starts_with(magic).then_some(mime))
    {
        return mime;
    }

    if let Some(mime) = detect_riff_or_iso_media(sample) {
        return mime;
    }

    if TEXT_BOMS.iter().any(|bom| sample.starts_with(bom)) {
        return TEXT_PLAIN;
    }

    let trimmed = sample.trim_ascii_start();
    if trimmed.starts_with(b"<?xml") {
        return TEXT_XML;
    }
    if HTML_OPENERS.iter().any(|opener| is_html_opener(trimmed, opener)) {
        return TEXT_HTML;
    }

    if sample.iter().copied().any(is_binary_byte) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

/// Containers with a signature past the first bytes (`RIFF....WEBP`, `....ftyp`)
fn detect_riff_or_iso_media(sample: &[u8]) -> Option<&'static str> {
    if sample.len() >= 12 && sample.starts_with(b"RIFF") {
        return match &sample[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wave"),
            b"AVI " => Some("video/avi"),
            _ => None,
        };
    }
    if sample.len() >= 12 && &sample[4..8] == b"ftyp" {
        return match &sample[8..12] {
            b"avif" | b"avis" => Some("image/avif"),
            b"heic" | b"heix" => Some("image/heic"),
            _ => Some("video/mp4"),
        };
    }
    None
}

fn is_html_opener(data: &[u8], opener: &[u8]) -> bool {
    if data.len() <= opener.len() || !data[..opener.len()].eq_ignore_ascii_case(opener) {
        return false;
    }
    matches!(data[opener.len()], b' ' | b'>')
}

/// Bytes that never appear in text (WHATWG "binary data byte")
const fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Report SVG documents that the base detection saw as text or markup
fn refine_svg(sample: &[u8], content_type: &'static str) -> &'static str {
    let by_html = content_type.contains("text/plain") || content_type.contains("text/html");
    let by_xml = content_type.contains("text/xml");
    if !by_html && !by_xml {
        return content_type;
    }

    let stripped = SVG_COMMENT.replace_all(sample, &b""[..]);
    let stripped = stripped.trim_ascii();
    if (by_html && SVG_TAG.is_match(stripped)) || (by_xml && SVG_TAG_IN_XML.is_match(stripped)) {
        SVG_MIME_TYPE
    } else {
        content_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let st = sniff(b"fn main() {\n    println!(\"hi\");\n}\n");
        assert!(st.is_text());
        assert_eq!(st.classification(), Classification::Text);
    }

    #[test]
    fn test_empty_is_text() {
        assert_eq!(sniff(b"").classification(), Classification::Text);
    }

    #[test]
    fn test_utf8_multibyte_is_text() {
        assert!(sniff("héllo wörld ✓".as_bytes()).is_text());
    }

    #[test]
    fn test_images() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").content_type(), "image/png");
        assert_eq!(sniff(b"\xFF\xD8\xFF\xE0\0\x10JFIF").content_type(), "image/jpeg");
        assert_eq!(sniff(b"GIF89a\x01\0\x01\0").content_type(), "image/gif");
        assert_eq!(sniff(b"RIFF\x24\0\0\0WEBPVP8 ").content_type(), "image/webp");
        assert_eq!(sniff(b"\0\0\0\x1cftypavif\0\0\0\0").content_type(), "image/avif");
        assert_eq!(
            sniff(b"\x89PNG\r\n\x1a\n").classification(),
            Classification::Image
        );
    }

    #[test]
    fn test_pdf() {
        let st = sniff(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        assert!(st.is_pdf());
        assert_eq!(st.classification(), Classification::Pdf);
    }

    #[test]
    fn test_binary() {
        let st = sniff(b"\x7FELF\x02\x01\x01\0\0\0");
        assert_eq!(st.classification(), Classification::Binary);
        assert_eq!(sniff(b"PK\x03\x04\x14\0").content_type(), "application/zip");
        assert_eq!(sniff(b"abc\x00\x01def").classification(), Classification::Binary);
    }

    #[test]
    fn test_html_and_xml_are_text() {
        assert_eq!(sniff(b"  <!doctype html><html>").content_type(), TEXT_HTML);
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><feed/>").content_type(), TEXT_XML);
        assert!(sniff(b"<html>").is_text());
    }

    #[test]
    fn test_svg_variants() {
        let plain = b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\"></svg>";
        assert_eq!(sniff(plain).classification(), Classification::Svg);

        let with_prolog = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- generator -->\n<svg viewBox=\"0 0 1 1\"/>";
        assert_eq!(sniff(with_prolog).classification(), Classification::Svg);

        let with_doctype = b"<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"x\">\n<svg/>";
        assert_eq!(sniff(with_doctype).classification(), Classification::Svg);

        let st = sniff(plain);
        assert!(st.is_image());
        assert!(st.is_svg());
        assert!(!st.is_text());
    }

    #[test]
    fn test_svg_mentioned_in_text_is_not_svg() {
        let st = sniff(b"This document explains how <svg> tags work.");
        assert_eq!(st.classification(), Classification::Text);
    }
}
