//! Access log format module
//!
//! Supports multiple log formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)
//! - Custom patterns with `$variables`

use chrono::Local;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One served request, as written to the access log
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Client IP address
    pub remote_addr: String,
    pub time: chrono::DateTime<Local>,
    pub method: String,
    /// Request URI path (blob tree path)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// HTTP version (1.0, 1.1, 2)
    pub http_version: String,
    pub status: u16,
    /// Bytes promised to the client (`Content-Length`, 0 when unknown)
    pub body_bytes: u64,
    /// `Range` request header
    pub range: Option<String>,
    /// `Content-Type` response header
    pub content_type: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// Time until response headers were ready, in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            range: None,
            content_type: None,
            referer: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Format the log entry according to the specified format
    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => format!(
                "{} \"{}\" \"{}\"",
                self.format_common(),
                dash(self.referer.as_deref()),
                dash(self.user_agent.as_deref()),
            ),
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    fn request_uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    fn request_line(&self) -> String {
        format!(
            "{} {} HTTP/{}",
            self.method,
            self.request_uri(),
            self.http_version
        )
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn format_json(&self) -> String {
        format!(
            r#"{{"remote_addr":{},"time":"{}","method":{},"path":{},"query":{},"http_version":{},"status":{},"body_bytes":{},"range":{},"content_type":{},"referer":{},"user_agent":{},"request_time_us":{}}}"#,
            json_string(&self.remote_addr),
            self.time.to_rfc3339(),
            json_string(&self.method),
            json_string(&self.path),
            json_option(self.query.as_deref()),
            json_string(&self.http_version),
            self.status,
            self.body_bytes,
            json_option(self.range.as_deref()),
            json_option(self.content_type.as_deref()),
            json_option(self.referer.as_deref()),
            json_option(self.user_agent.as_deref()),
            self.request_time_us,
        )
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables: `$remote_addr`, `$time_local`, `$time_iso8601`,
    /// `$request`, `$request_method`, `$request_uri`, `$request_time`
    /// (seconds, 3 decimals), `$status`, `$body_bytes_sent`, `$http_range`,
    /// `$sent_http_content_type`, `$http_referer`, `$http_user_agent`.
    fn format_custom(&self, pattern: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let request_time = self.request_time_us as f64 / 1_000_000.0;

        // Longer names first so `$request` does not eat `$request_time`
        let variables: [(&str, String); 13] = [
            ("$sent_http_content_type", dash(self.content_type.as_deref()).to_string()),
            ("$http_user_agent", dash(self.user_agent.as_deref()).to_string()),
            ("$body_bytes_sent", self.body_bytes.to_string()),
            ("$request_method", self.method.clone()),
            ("$time_iso8601", self.time.to_rfc3339()),
            ("$request_time", format!("{request_time:.3}")),
            ("$http_referer", dash(self.referer.as_deref()).to_string()),
            ("$request_uri", self.request_uri()),
            ("$remote_addr", self.remote_addr.clone()),
            ("$time_local", self.time.format(CLF_TIME).to_string()),
            ("$http_range", dash(self.range.as_deref()).to_string()),
            ("$request", self.request_line()),
            ("$status", self.status.to_string()),
        ];

        variables
            .iter()
            .fold(pattern.to_string(), |acc, (name, value)| acc.replace(name, value))
    }
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn json_option(value: Option<&str>) -> String {
    value.map_or_else(|| "null".to_string(), json_string)
}

/// Quote and escape a JSON string
fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "10.0.0.7".to_string(),
            "GET".to_string(),
            "/docs/manual.pdf".to_string(),
        );
        entry.query = Some("render=1".to_string());
        entry.status = 206;
        entry.body_bytes = 512;
        entry.range = Some("bytes=0-511".to_string());
        entry.content_type = Some("application/pdf".to_string());
        entry.user_agent = Some("curl/8.5.0".to_string());
        entry.request_time_us = 12_000;
        entry
    }

    #[test]
    fn test_format_combined() {
        let log = blob_entry().format("combined");
        assert!(log.starts_with("10.0.0.7 - - ["));
        assert!(log.contains("\"GET /docs/manual.pdf?render=1 HTTP/1.1\" 206 512"));
        assert!(log.ends_with("\"-\" \"curl/8.5.0\""));
    }

    #[test]
    fn test_format_common() {
        let log = blob_entry().format("common");
        assert!(log.ends_with("\"GET /docs/manual.pdf?render=1 HTTP/1.1\" 206 512"));
        assert!(!log.contains("curl"));
    }

    #[test]
    fn test_format_json() {
        let mut entry = blob_entry();
        entry.path = "/odd \"name\".txt".to_string();
        let log = entry.format("json");
        assert!(log.contains(r#""path":"/odd \"name\".txt""#));
        assert!(log.contains(r#""status":206"#));
        assert!(log.contains(r#""range":"bytes=0-511""#));
        assert!(log.contains(r#""referer":null"#));
    }

    #[test]
    fn test_format_custom() {
        let log = blob_entry().format("$request_method $request_uri $status $http_range $request_time");
        assert_eq!(log, "GET /docs/manual.pdf?render=1 206 bytes=0-511 0.012");

        let log = blob_entry().format("[$request] $sent_http_content_type");
        assert_eq!(log, "[GET /docs/manual.pdf?render=1 HTTP/1.1] application/pdf");
    }

    #[test]
    fn test_json_string_escapes_controls() {
        assert_eq!(json_string("a\u{1}b"), "\"a\\u0001b\"");
    }
}
