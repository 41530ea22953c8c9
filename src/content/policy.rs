//! Response shaping policy
//!
//! Pure decision table from what is known about a blob (its class, the user's
//! render request, the configured MIME override, the SVG switch and the
//! detected charset) to the representation headers of the response. No I/O
//! happens here.

use super::sniff::Classification;
use crate::http::mime::SVG_MIME_TYPE;
use hyper::header::{
    HeaderName, ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY,
    CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};

/// Policy applied to SVG served inline, blocking scripts and external loads
pub const SVG_CONTENT_SECURITY_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

/// Charset assumed when detection fails
pub const DEFAULT_CHARSET: &str = "utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn header_value(self, filename: &str) -> String {
        match self {
            Self::Inline => format!("inline; filename=\"{filename}\""),
            Self::Attachment => format!("attachment; filename=\"{filename}\""),
        }
    }
}

/// Inputs of the decision table
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub classification: Classification,
    /// User asked for the blob to be rendered as text
    pub render: bool,
    /// Configured MIME type for the extension, "" when none
    pub mapped_mime: &'a str,
    pub svg_enabled: bool,
    /// Detected charset, only consulted for text responses
    pub charset: Option<&'a str>,
}

/// Representation headers chosen for one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeaders {
    /// `None` leaves Content-Type to the transport default
    pub content_type: Option<String>,
    pub disposition: Option<Disposition>,
    pub expose_disposition: bool,
    /// Add the SVG Content-Security-Policy and `nosniff`
    pub svg_lockdown: bool,
}

impl ContentHeaders {
    /// Header name/value pairs for a given display filename
    pub fn to_pairs(&self, filename: &str) -> Vec<(HeaderName, String)> {
        let mut pairs = Vec::with_capacity(5);
        if self.expose_disposition {
            pairs.push((
                ACCESS_CONTROL_EXPOSE_HEADERS,
                "Content-Disposition".to_string(),
            ));
        }
        if let Some(content_type) = &self.content_type {
            pairs.push((CONTENT_TYPE, content_type.clone()));
        }
        if let Some(disposition) = self.disposition {
            pairs.push((CONTENT_DISPOSITION, disposition.header_value(filename)));
        }
        if self.svg_lockdown {
            pairs.push((
                CONTENT_SECURITY_POLICY,
                SVG_CONTENT_SECURITY_POLICY.to_string(),
            ));
            pairs.push((X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()));
        }
        pairs
    }
}

/// Whether the blob is served as text (and needs a charset)
pub fn is_served_as_text(classification: Classification, render: bool) -> bool {
    render || classification == Classification::Text
}

/// Decide the representation headers
///
/// # Examples
/// ```
/// use blobserve::content::policy::{decide, Disposition, PolicyInput};
/// use blobserve::content::sniff::Classification;
///
/// let headers = decide(&PolicyInput {
///     classification: Classification::Svg,
///     render: false,
///     mapped_mime: "",
///     svg_enabled: false,
///     charset: None,
/// });
/// assert_eq!(headers.disposition, Some(Disposition::Attachment));
/// ```
pub fn decide(input: &PolicyInput<'_>) -> ContentHeaders {
    if is_served_as_text(input.classification, input.render) {
        let base = if input.mapped_mime.is_empty() {
            "text/plain"
        } else {
            input.mapped_mime
        };
        let charset = input.charset.unwrap_or(DEFAULT_CHARSET).to_lowercase();
        return ContentHeaders {
            content_type: Some(format!("{base}; charset={charset}")),
            disposition: None,
            expose_disposition: false,
            svg_lockdown: false,
        };
    }

    let is_svg = input.classification == Classification::Svg;
    let displayable = matches!(
        input.classification,
        Classification::Image | Classification::Pdf | Classification::Svg
    );
    let content_type = (!input.mapped_mime.is_empty()).then(|| input.mapped_mime.to_string());

    if displayable && (input.svg_enabled || !is_svg) {
        if is_svg {
            return ContentHeaders {
                content_type: Some(SVG_MIME_TYPE.to_string()),
                disposition: Some(Disposition::Inline),
                expose_disposition: true,
                svg_lockdown: true,
            };
        }
        return ContentHeaders {
            content_type,
            disposition: Some(Disposition::Inline),
            expose_disposition: true,
            svg_lockdown: false,
        };
    }

    ContentHeaders {
        content_type,
        disposition: Some(Disposition::Attachment),
        expose_disposition: true,
        svg_lockdown: false,
    }
}

/// Display name used in `Content-Disposition`
///
/// Takes the last path element and replaces commas with spaces, since some
/// browsers reject commas in the filename parameter.
pub fn display_name(name: &str) -> String {
    let name = name.replace(',', " ");
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        return if name.is_empty() { ".".to_string() } else { "/".to_string() };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(classification: Classification) -> PolicyInput<'static> {
        PolicyInput {
            classification,
            render: false,
            mapped_mime: "",
            svg_enabled: true,
            charset: Some("UTF-8"),
        }
    }

    #[test]
    fn test_text_defaults_to_plain_with_charset() {
        let headers = decide(&input(Classification::Text));
        assert_eq!(
            headers.content_type.as_deref(),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(headers.disposition, None);
        assert!(!headers.expose_disposition);
    }

    #[test]
    fn test_text_uses_mapped_mime_and_lowercases_charset() {
        let headers = decide(&PolicyInput {
            mapped_mime: "text/markdown",
            charset: Some("ISO-8859-1"),
            ..input(Classification::Text)
        });
        assert_eq!(
            headers.content_type.as_deref(),
            Some("text/markdown; charset=iso-8859-1")
        );
    }

    #[test]
    fn test_text_without_detected_charset_falls_back() {
        let headers = decide(&PolicyInput {
            charset: None,
            ..input(Classification::Text)
        });
        assert_eq!(
            headers.content_type.as_deref(),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_render_flag_forces_text_for_any_class() {
        for class in [
            Classification::Binary,
            Classification::Image,
            Classification::Pdf,
            Classification::Svg,
        ] {
            let headers = decide(&PolicyInput {
                render: true,
                ..input(class)
            });
            let content_type = headers.content_type.unwrap();
            assert!(content_type.contains("; charset="), "{class:?}: {content_type}");
            assert!(!headers.svg_lockdown);
        }
    }

    #[test]
    fn test_image_and_pdf_inline() {
        for class in [Classification::Image, Classification::Pdf] {
            let headers = decide(&input(class));
            assert_eq!(headers.disposition, Some(Disposition::Inline));
            assert!(headers.expose_disposition);
            assert_eq!(headers.content_type, None);
            assert!(!headers.svg_lockdown);
        }
    }

    #[test]
    fn test_mapped_mime_applies_to_binary() {
        let headers = decide(&PolicyInput {
            mapped_mime: "application/vnd.android.package-archive",
            ..input(Classification::Binary)
        });
        assert_eq!(
            headers.content_type.as_deref(),
            Some("application/vnd.android.package-archive")
        );
        assert_eq!(headers.disposition, Some(Disposition::Attachment));
    }

    #[test]
    fn test_svg_enabled_is_inline_and_locked_down() {
        let headers = decide(&PolicyInput {
            mapped_mime: "text/xml",
            ..input(Classification::Svg)
        });
        assert_eq!(headers.content_type.as_deref(), Some(SVG_MIME_TYPE));
        assert_eq!(headers.disposition, Some(Disposition::Inline));
        assert!(headers.svg_lockdown);

        let pairs = headers.to_pairs("logo.svg");
        assert!(pairs.contains(&(
            CONTENT_SECURITY_POLICY,
            SVG_CONTENT_SECURITY_POLICY.to_string()
        )));
        assert!(pairs.contains(&(X_CONTENT_TYPE_OPTIONS, "nosniff".to_string())));
    }

    #[test]
    fn test_svg_disabled_is_attachment() {
        let headers = decide(&PolicyInput {
            svg_enabled: false,
            ..input(Classification::Svg)
        });
        assert_eq!(headers.disposition, Some(Disposition::Attachment));
        assert!(!headers.svg_lockdown);
        assert_eq!(headers.content_type, None);
    }

    #[test]
    fn test_only_svg_gets_security_headers() {
        for class in [
            Classification::Text,
            Classification::Image,
            Classification::Pdf,
            Classification::Binary,
        ] {
            let pairs = decide(&input(class)).to_pairs("f");
            assert!(pairs
                .iter()
                .all(|(name, _)| *name != CONTENT_SECURITY_POLICY && *name != X_CONTENT_TYPE_OPTIONS));
        }
    }

    #[test]
    fn test_disposition_values() {
        assert_eq!(
            Disposition::Inline.header_value("a b.png"),
            "inline; filename=\"a b.png\""
        );
        assert_eq!(
            Disposition::Attachment.header_value("x.bin"),
            "attachment; filename=\"x.bin\""
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("docs/a,b,c.txt"), "a b c.txt");
        assert_eq!(display_name("dir,with,commas/file.bin"), "file.bin");
        assert_eq!(display_name("plain.md"), "plain.md");
        assert_eq!(display_name("nested/dir/"), "dir");
        assert_eq!(display_name(""), ".");
    }
}
