//! MIME type mapping module
//!
//! Resolves operator-configured Content-Type overrides from file extensions.

use std::collections::HashMap;

/// Canonical MIME type for SVG images
pub const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Extension to MIME type overrides
///
/// Keys are stored lowercased with their leading dot (`.apk`); configuration
/// may list them either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeTypeMap {
    enabled: bool,
    map: HashMap<String, String>,
}

impl MimeTypeMap {
    pub fn new(enabled: bool, map: &HashMap<String, String>) -> Self {
        let map = map
            .iter()
            .map(|(ext, mime)| {
                let ext = ext.trim().to_lowercase();
                let ext = if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                };
                (ext, mime.trim().to_string())
            })
            .collect();
        Self { enabled, map }
    }

    /// Look up the MIME type mapped to the extension of `name`
    ///
    /// Returns an empty string when mapping is disabled or nothing matches.
    ///
    /// # Examples
    /// ```
    /// use std::collections::HashMap;
    /// use blobserve::http::mime::MimeTypeMap;
    ///
    /// let table = HashMap::from([("apk".to_string(), "application/vnd.android.package-archive".to_string())]);
    /// let map = MimeTypeMap::new(true, &table);
    /// assert_eq!(map.lookup("App.APK"), "application/vnd.android.package-archive");
    /// assert_eq!(map.lookup("readme"), "");
    /// ```
    pub fn lookup(&self, name: &str) -> &str {
        if !self.enabled {
            return "";
        }
        let ext = extension(name).to_lowercase();
        if ext.is_empty() {
            return "";
        }
        self.map.get(&ext).map_or("", String::as_str)
    }
}

/// Extension of the final path element including its dot, or "" when absent
///
/// A leading dot counts (`.gitignore` has extension `.gitignore`), matching how
/// the table is keyed.
pub fn extension(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.rfind('.').map_or("", |idx| &base[idx..])
}
