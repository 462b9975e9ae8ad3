use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::parse::parse_api_error;
use crate::request::{Body, HttpRequest};

const ERROR_BODY_PREVIEW: usize = 300;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Body of a 2xx response, or an error naming the status and the
    /// server's message.
    pub fn into_success_body(self) -> anyhow::Result<Vec<u8>> {
        if self.is_success() {
            return Ok(self.body);
        }
        let detail = parse_api_error(&self.body).unwrap_or_else(|| {
            String::from_utf8_lossy(&self.body)
                .chars()
                .take(ERROR_BODY_PREVIEW)
                .collect()
        });
        Err(anyhow!("request failed with status {}: {}", self.status, detail))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        // Generation can take a while on long batches.
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(120),
        }
    }
}

/// Reusable client; without explicit timeouts a dead endpoint would leave the
/// session awaiting a response forever.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeouts: HttpTimeouts) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()
            .context("build http client")?;
        Ok(Self { inner })
    }

    pub async fn execute(&self, req: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        for (k, v) in &req.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name: {k}"))?;
            let value = HeaderValue::from_str(v)
                .with_context(|| format!("invalid header value for {k}"))?;
            headers.insert(name, value);
        }

        let builder = match req.method.as_str() {
            "GET" => self.inner.get(&req.url),
            "POST" => self.inner.post(&req.url),
            other => return Err(anyhow!("unsupported method: {other}")),
        }
        .headers(headers);

        let builder = match &req.body {
            Body::Empty => builder,
            Body::Json(s) => builder.body(s.clone()),
        };

        log::debug!("sending {req:?}");
        let resp = builder.send().await.context("http request failed")?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .context("failed reading response body")?
            .to_vec();
        log::debug!("{} {} -> {} ({} bytes)", req.method, req.url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}
