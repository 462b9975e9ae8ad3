use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Empty,
    Json(String),
}

fn is_secret_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "authorization" || name.contains("api-key")
}

// Requests get logged; keys must never reach the log.
impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let v = if is_secret_header(k) { "[REDACTED]" } else { v.as_str() };
                (k.as_str(), v)
            })
            .collect();

        let body = match &self.body {
            Body::Empty => "Empty".to_string(),
            Body::Json(s) => format!("Json(len={})", s.len()),
        };

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &body)
            .finish()
    }
}

impl HttpRequest {
    pub fn post_json(url: impl Into<String>, json: String) -> Self {
        Self {
            method: "POST".into(),
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Body::Json(json),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_json_content_type() {
        let req = HttpRequest::post_json("https://example.com/x", "{}".into())
            .with_header("X-Trace", "abc");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn debug_hides_keys_and_body() {
        let req = HttpRequest::post_json("https://example.com/x", r#"{"secret":"items"}"#.into())
            .with_header("Authorization", "Bearer sk-live-1")
            .with_header("x-goog-api-key", "goog-2");

        let s = format!("{req:?}");
        assert!(!s.contains("sk-live-1"));
        assert!(!s.contains("goog-2"));
        assert!(!s.contains("items"));
        assert!(s.contains("[REDACTED]"));
        assert!(s.contains("Json(len=18)"));
    }
}
