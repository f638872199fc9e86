//! HTTP transport types and the swappable transport seam.
//!
//! # Design
//! Requests and responses are plain data. `TelegraphClient` builds an
//! `HttpRequest`, hands it to a `Transport`, and decodes the returned
//! `HttpResponse`; nothing in the client owns a connection. Tests swap in a
//! stub `Transport` to stay deterministic, and callers that already have an
//! HTTP stack can wrap it the same way.
//!
//! All fields use owned types so a request can be moved across threads or
//! queued by the caller without lifetime concerns.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::BoxError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// How parameters are placed into an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Parameters URL-encoded into the query string.
    Get,
    /// POST with an `application/x-www-form-urlencoded` body.
    Form,
    /// POST with a `multipart/form-data` body, as the upload endpoint expects.
    Multipart,
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one HTTP round-trip.
///
/// Implementations must return non-2xx responses as data. The client reads
/// the body of every response because the API reports failures inside the
/// envelope, not through the status line.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// The agent is configured once; every call still owns its own request and
/// response, so one `UreqTransport` can serve many threads.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut response = match (request.method, &request.body) {
            (HttpMethod::Get, _) => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            (HttpMethod::Post, body) => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => builder.send(body.as_slice())?,
                    None => builder.send_empty()?,
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Ordered request parameters. Repeated keys are kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Push `key` only when `value` is set.
    pub fn push_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// URL-encode `params` as `application/x-www-form-urlencoded`.
pub fn encode_params(params: &Params) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// One part of a multipart body. Text fields carry no file name.
#[derive(Debug, Clone)]
struct Part {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("telegraph-{}", Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.parts.push(Part {
            field: field.to_string(),
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        });
        self
    }

    /// Add a file part. The content type is derived from `file_name`.
    pub fn file(mut self, field: &str, file_name: &str, data: Vec<u8>) -> Self {
        self.parts.push(Part {
            field: field.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type_for(file_name).to_string()),
            data,
        });
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_body(self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(&part.field));
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(file_name)));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace(['\r', '\n'], " ")
}

/// Media type the upload endpoint expects for a file name's extension.
fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_params_escapes_reserved_characters() {
        let params = Params::new()
            .push("title", "Hello & bye")
            .push("content", r#"["a=b"]"#);
        assert_eq!(
            encode_params(&params),
            "title=Hello+%26+bye&content=%5B%22a%3Db%22%5D"
        );
    }

    #[test]
    fn encode_params_empty_is_empty_string() {
        assert_eq!(encode_params(&Params::new()), "");
    }

    #[test]
    fn push_opt_skips_unset_values() {
        let params = Params::new()
            .push("path", "Sample-01-01")
            .push_opt("year", Some(2024))
            .push_opt::<i64>("month", None);
        assert_eq!(params.get("year"), Some("2024"));
        assert_eq!(params.get("month"), None);
        assert_eq!(params.iter().count(), 2);
    }

    #[test]
    fn multipart_text_part_has_no_filename() {
        let body = String::from_utf8(MultipartForm::new().text("title", "Hi").into_body()).unwrap();
        assert!(body.contains("Content-Disposition: form-data; name=\"title\"\r\n\r\nHi\r\n"));
    }

    #[test]
    fn multipart_body_has_single_file_part() {
        let form = MultipartForm::new().file("file", "cat.png", b"PNGDATA".to_vec());
        let boundary = form.boundary().to_string();
        assert_eq!(
            form.content_type(),
            format!("multipart/form-data; boundary={boundary}")
        );

        let body = String::from_utf8(form.into_body()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("Content-Disposition: form-data; name=\"file\"; filename=\"cat.png\"\r\n"));
        assert!(body.contains("Content-Type: image/png\r\n\r\nPNGDATA\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn multipart_boundaries_are_unique_per_form() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn request_header_lookup_is_case_insensitive() {
        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "http://localhost/x".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: None,
        };
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("accept"), None);
    }
}
