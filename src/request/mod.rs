//! Request builder
//!
//! Encodes an optional file plus form fields as `multipart/form-data` and wraps
//! the result into an outgoing [`hyper::Request`].
//!
//! # Example
//!
//! ```no_run
//! use hyper::Method;
//! use party::request::MultipartRequest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = MultipartRequest::new()
//!     .file("./dissertation.pdf")
//!     .param("Author", "Luc Perkins")
//!     .param("Title", "The purposive Prometheus")
//!     .to_request(Method::POST, "https://example.com/dissertations")?;
//!
//! assert!(request.headers().contains_key("content-type"));
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use futures::executor::block_on_stream;
use futures::stream::{self, Iter};
use http_body_util::Full;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metrics;

pub mod form_data;

pub use form_data::FILE_CONTENT_TYPE;

/// Single-chunk stream carrying a file part's content
type PartStream = Iter<std::option::IntoIter<io::Result<Bytes>>>;

type FormStream = mpart_async::client::MultipartRequest<PartStream>;

/// Request builder errors
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request has no file and no request params")]
    EmptyRequest,

    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("Failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy file into request body: {0}")]
    IoCopy(#[source] io::Error),

    #[error("Failed to write field '{name}': {source}")]
    FieldWrite {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to finalize multipart body: {0}")]
    Finalize(#[source] io::Error),

    #[error(transparent)]
    Http(#[from] hyper::http::Error),
}

/// Multipart request configuration
///
/// A file can be included with the request and/or form parameters. Building
/// fails with [`RequestError::EmptyRequest`] if neither is present.
#[derive(Debug, Clone, Default)]
pub struct MultipartRequest {
    /// Path to the file to include in the request
    pub file_path: Option<PathBuf>,
    /// Field name for the file part (empty means `"file"`)
    pub file_field_name: String,
    /// Boundary to use instead of a random one
    pub boundary: Option<String>,
    /// Plain form fields
    pub params: HashMap<String, String>,
}

/// An encoded multipart body
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub bytes: Bytes,
    /// `multipart/form-data; boundary=...`
    pub content_type: String,
    pub boundary: String,
}

impl MultipartRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a file by path
    pub fn file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the field name of the file part
    pub fn file_field_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_field_name = name.into();
        self
    }

    /// Use a fixed boundary
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Add a form field
    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add several form fields
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Field name the file part is written under
    pub fn effective_file_field_name(&self) -> &str {
        crate::effective_field_name(&self.file_field_name)
    }

    /// Encode the request body
    #[tracing::instrument(
        name = "multipart.build",
        skip(self),
        fields(
            file = ?self.file_path,
            params = self.params.len(),
            body.bytes = tracing::field::Empty
        ),
        err
    )]
    pub fn build(&self) -> Result<EncodedBody, RequestError> {
        self.validate()?;

        let boundary = match self.boundary.as_deref().filter(|b| !b.is_empty()) {
            Some(boundary) => {
                form_data::validate_boundary(boundary)?;
                boundary.to_string()
            }
            None => form_data::random_boundary(),
        };
        let mut form = FormStream::new(boundary);

        if let Some(path) = self.source_file() {
            add_file_part(&mut form, self.effective_file_field_name(), path)?;
        }

        for (name, value) in &self.params {
            form_data::check_field_name(name).map_err(|source| RequestError::FieldWrite {
                name: name.clone(),
                source,
            })?;
            form.add_field(form_data::quote_param(name), value.clone());
        }

        let boundary = form.get_boundary().to_string();
        let content_type = form_data::content_type(&boundary);

        let mut body = BytesMut::new();
        for chunk in block_on_stream(form) {
            body.extend_from_slice(&chunk.map_err(RequestError::Finalize)?);
        }
        let bytes = body.freeze();

        tracing::Span::current().record("body.bytes", bytes.len() as u64);
        metrics::record_request_built(bytes.len() as u64);

        Ok(EncodedBody {
            bytes,
            content_type,
            boundary,
        })
    }

    /// Encode the body and wrap it into an outgoing request
    ///
    /// Sets `Content-Type` (with boundary) and `Content-Length`.
    pub fn to_request<T>(&self, method: Method, uri: T) -> Result<Request<Full<Bytes>>, RequestError>
    where
        T: TryInto<Uri>,
        <T as TryInto<Uri>>::Error: Into<hyper::http::Error>,
    {
        let body = self.build()?;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, body.content_type)
            .header(CONTENT_LENGTH, body.bytes.len())
            .body(Full::new(body.bytes))?;

        Ok(request)
    }

    fn source_file(&self) -> Option<&Path> {
        self.file_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    fn validate(&self) -> Result<(), RequestError> {
        if self.source_file().is_none() && self.params.is_empty() {
            return Err(RequestError::EmptyRequest);
        }
        Ok(())
    }
}

/// Read a file into a new file part; the handle is closed on return
fn add_file_part(form: &mut FormStream, field_name: &str, path: &Path) -> Result<(), RequestError> {
    form_data::check_field_name(field_name).map_err(|source| RequestError::FieldWrite {
        name: field_name.to_string(),
        source,
    })?;

    let mut file = File::open(path).map_err(|source| RequestError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut contents = Vec::new();
    let copied = file
        .read_to_end(&mut contents)
        .map_err(RequestError::IoCopy)?;

    form.add_stream(
        form_data::quote_param(field_name),
        form_data::quote_param(&filename),
        FILE_CONTENT_TYPE.to_string(),
        stream::iter(Some(Ok(Bytes::from(contents)))),
    );

    tracing::debug!(
        path = %path.display(),
        field = field_name,
        bytes = copied,
        "Added file part"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        let result = MultipartRequest::new().build();
        assert!(matches!(result, Err(RequestError::EmptyRequest)));
    }

    #[test]
    fn test_empty_path_counts_as_absent() {
        let result = MultipartRequest::new().file("").build();
        assert!(matches!(result, Err(RequestError::EmptyRequest)));
    }

    #[test]
    fn test_missing_file() {
        let result = MultipartRequest::new().file("does-not-exist.txt").build();
        match result {
            Err(RequestError::FileOpen { path, source }) => {
                assert_eq!(path, PathBuf::from("does-not-exist.txt"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Expected FileOpen, got {:?}", other),
        }
    }

    #[test]
    fn test_default_field_name() {
        let request = MultipartRequest::new();
        assert_eq!(request.effective_file_field_name(), "file");
        assert!(request.file_field_name.is_empty());

        let request = request.file_field_name("upload-file");
        assert_eq!(request.effective_file_field_name(), "upload-file");
    }

    #[test]
    fn test_params_only() {
        let body = MultipartRequest::new()
            .boundary("fixed")
            .param("foo", "bar")
            .build()
            .unwrap();

        assert_eq!(body.boundary, "fixed");
        assert_eq!(body.content_type, "multipart/form-data; boundary=fixed");
        assert_eq!(
            body.bytes,
            Bytes::from_static(
                b"--fixed\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\nbar\r\n--fixed--\r\n"
            )
        );
    }

    #[test]
    fn test_invalid_custom_boundary() {
        let result = MultipartRequest::new()
            .boundary("bad;boundary")
            .param("foo", "bar")
            .build();
        assert!(matches!(result, Err(RequestError::InvalidBoundary(_))));
    }

    #[test]
    fn test_params_with_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let body = MultipartRequest::new()
            .boundary("b")
            .file(&path)
            .file_field_name("upload")
            .param("foo", "bar")
            .build()
            .unwrap();

        assert_eq!(
            body.bytes,
            Bytes::from_static(
                b"--b\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
                  Content-Type: application/octet-stream\r\n\r\nhello\r\n\
                  --b\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\nbar\r\n\
                  --b--\r\n"
            )
        );
    }

    #[test]
    fn test_control_character_in_field_name() {
        let result = MultipartRequest::new()
            .param("bad\r\nX-Injected: 1", "value")
            .build();

        match result {
            Err(RequestError::FieldWrite { name, source }) => {
                assert_eq!(name, "bad\r\nX-Injected: 1");
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("Expected FieldWrite, got {:?}", other),
        }
    }

    #[test]
    fn test_to_request_headers() {
        let request = MultipartRequest::new()
            .param("foo", "bar")
            .to_request(Method::PUT, "https://example.com/upload")
            .unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri(), "https://example.com/upload");

        let content_type = request.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert!(request.headers().contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn test_to_request_invalid_uri() {
        let result = MultipartRequest::new()
            .param("foo", "bar")
            .to_request(Method::POST, "not a uri");
        assert!(matches!(result, Err(RequestError::Http(_))));
    }
}
