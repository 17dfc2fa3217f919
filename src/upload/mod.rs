//! Upload module
//!
//! Extracts an uploaded file from an incoming `multipart/form-data` request.
//!
//! The whole request body is capped at [`UploadLimits::max_bytes`]: a declared
//! `Content-Length` above the ceiling is rejected up front, the body is wrapped
//! so reads past the ceiling fail, and the parser enforces the same limit on
//! the stream.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use hyper::Request;
//! use party::upload::{UploadHandler, UploadLimits};
//! use std::io::Read;
//!
//! # async fn example(request: Request<Full<Bytes>>) -> Result<(), Box<dyn std::error::Error>> {
//! let handler = UploadHandler::new(UploadLimits::new(32 << 20));
//! let mut upload = handler.handle(request).await?;
//!
//! let mut contents = Vec::new();
//! upload.file.read_to_end(&mut contents)?;
//! println!("{}: {} bytes", upload.filename, upload.size);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::Request;
use multer::{Constraints, Multipart, SizeLimit};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

use crate::metrics;

pub mod form;
pub mod temp_file;

pub use form::{FileHeader, Form, FormFile};

/// Default in-memory budget for file parts (32 MiB)
pub const DEFAULT_MAX_MEMORY: u64 = 32 << 20;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Request body exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("No file found in field '{0}'")]
    FieldNotFound(String),

    #[error(transparent)]
    Multipart(multer::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Map a parser error, folding both size ceilings into `PayloadTooLarge`
    pub(crate) fn from_multer(err: multer::Error, limit: u64) -> Self {
        match err {
            multer::Error::StreamSizeExceeded { limit } => UploadError::PayloadTooLarge { limit },
            multer::Error::StreamReadFailed(ref source)
                if source.downcast_ref::<LengthLimitError>().is_some() =>
            {
                UploadError::PayloadTooLarge { limit }
            }
            other => UploadError::Multipart(other),
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::PayloadTooLarge { .. } => "payload_too_large",
            UploadError::FieldNotFound(_) => "field_not_found",
            UploadError::Multipart(_) => "malformed",
            UploadError::Io(_) => "io",
        }
    }
}

/// Upload handler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    /// Maximum allowable bytes in the whole request body
    pub max_bytes: u64,
    /// Field name of the file part (empty means `"file"`)
    pub file_field_name: String,
    /// Bytes of file content kept in memory before spilling to disk
    pub max_memory: u64,
}

impl UploadLimits {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            file_field_name: crate::DEFAULT_FILE_FIELD_NAME.to_string(),
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }

    pub fn with_file_field_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_field_name = name.into();
        self
    }

    pub fn with_max_memory(mut self, max_memory: u64) -> Self {
        self.max_memory = max_memory;
        self
    }

    /// Field name the handler looks up
    pub fn effective_file_field_name(&self) -> &str {
        crate::effective_field_name(&self.file_field_name)
    }
}

/// A file extracted from an incoming request
///
/// The caller owns `file` and releases it by dropping it.
#[derive(Debug)]
pub struct UploadResult {
    pub file: FormFile,
    pub filename: String,
    pub size: u64,
    pub headers: HeaderMap,
    /// Text fields sent alongside the file
    pub values: HashMap<String, Vec<String>>,
}

impl UploadResult {
    /// Declared content type of the uploaded file
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// Multipart upload handler
#[derive(Debug, Clone)]
pub struct UploadHandler {
    limits: UploadLimits,
}

impl UploadHandler {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Translate an incoming request into the uploaded file and its metadata
    #[tracing::instrument(
        name = "multipart.handle",
        skip(self, request),
        fields(
            field = %self.limits.effective_file_field_name(),
            max_bytes = self.limits.max_bytes,
            upload.filename = tracing::field::Empty,
            upload.bytes = tracing::field::Empty
        ),
        err
    )]
    pub async fn handle<B>(&self, request: Request<B>) -> Result<UploadResult, UploadError>
    where
        B: Body + Send + 'static,
        B::Data: Into<Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let start_time = Instant::now();

        match self.extract(request).await {
            Ok(result) => {
                metrics::record_upload_success(result.size);

                let span = tracing::Span::current();
                span.record("upload.filename", result.filename.as_str());
                span.record("upload.bytes", result.size);

                tracing::info!(
                    filename = %result.filename,
                    bytes = result.size,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Upload extracted"
                );

                Ok(result)
            }
            Err(e) => {
                metrics::record_upload_rejected(e.kind());

                tracing::warn!(
                    error = %e,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Upload rejected"
                );

                Err(e)
            }
        }
    }

    async fn extract<B>(&self, request: Request<B>) -> Result<UploadResult, UploadError>
    where
        B: Body + Send + 'static,
        B::Data: Into<Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let field_name = self.limits.effective_file_field_name();
        let max_bytes = self.limits.max_bytes;

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or(UploadError::Multipart(multer::Error::NoMultipart))?;
        let boundary = multer::parse_boundary(content_type).map_err(UploadError::Multipart)?;

        let content_length = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok()?.parse::<u64>().ok());
        if let Some(len) = content_length {
            if len > max_bytes {
                return Err(UploadError::PayloadTooLarge { limit: max_bytes });
            }
        }

        // Saturate on platforms where usize is narrower than u64
        let body_limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);
        let body = Limited::new(request.into_body(), body_limit).into_data_stream();

        let constraints =
            Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes));
        let multipart = Multipart::with_constraints(body, boundary, constraints);

        let mut form = form::read_form(multipart, max_bytes, self.limits.max_memory).await?;

        let header = form
            .remove_file(field_name)
            .ok_or_else(|| UploadError::FieldNotFound(field_name.to_string()))?;

        tracing::debug!(
            filename = %header.filename,
            on_disk = header.is_on_disk(),
            "Found file part"
        );

        Ok(UploadResult {
            filename: header.filename.clone(),
            size: header.size,
            headers: header.headers.clone(),
            file: header.open(),
            values: form.values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[test]
    fn test_limits_defaults() {
        let limits = UploadLimits::new(32 << 20);
        assert_eq!(limits.max_bytes, 32 << 20);
        assert_eq!(limits.file_field_name, "file");
        assert_eq!(limits.max_memory, DEFAULT_MAX_MEMORY);
    }

    #[test]
    fn test_empty_field_name_resolves_without_mutation() {
        let limits = UploadLimits::new(1024).with_file_field_name("");
        let handler = UploadHandler::new(limits.clone());

        assert_eq!(handler.limits().effective_file_field_name(), "file");
        assert_eq!(handler.limits(), &limits);
        assert!(handler.limits().file_field_name.is_empty());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            UploadError::PayloadTooLarge { limit: 1 }.kind(),
            "payload_too_large"
        );
        assert_eq!(UploadError::FieldNotFound("file".into()).kind(), "field_not_found");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let handler = UploadHandler::new(UploadLimits::new(1024));
        let request = Request::post("/upload")
            .body(Full::new(Bytes::from_static(b"plain")))
            .unwrap();

        let result = handler.handle(request).await;
        assert!(matches!(
            result,
            Err(UploadError::Multipart(multer::Error::NoMultipart))
        ));
    }

    #[tokio::test]
    async fn test_not_multipart() {
        let handler = UploadHandler::new(UploadLimits::new(1024));
        let request = Request::post("/upload")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();

        let result = handler.handle(request).await;
        assert!(matches!(result, Err(UploadError::Multipart(_))));
    }
}
