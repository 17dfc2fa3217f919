//! Party
//!
//! Build and parse `multipart/form-data` HTTP payloads.
//!
//! # Features
//!
//! - **Request builder**: encode an optional file plus form fields into a body
//!   and a ready-to-send `http::Request`
//! - **Upload handler**: extract a single uploaded file from an incoming request
//!   under a whole-body byte ceiling
//! - **Spill to disk**: large file parts go to a temp file removed on drop
//!
//! # Example
//!
//! ```no_run
//! use hyper::Method;
//! use party::request::MultipartRequest;
//! use party::upload::{UploadHandler, UploadLimits};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = MultipartRequest::new()
//!     .file("./dissertation.pdf")
//!     .param("Author", "Luc Perkins")
//!     .to_request(Method::POST, "https://example.com/dissertations")?;
//!
//! let handler = UploadHandler::new(UploadLimits::new(32 << 20));
//! let upload = handler.handle(request).await?;
//! println!("{} ({} bytes)", upload.filename, upload.size);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod request;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use request::{EncodedBody, MultipartRequest, RequestError};
pub use upload::{UploadError, UploadHandler, UploadLimits, UploadResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Field name used for the file part when none is configured
pub const DEFAULT_FILE_FIELD_NAME: &str = "file";

/// Resolve the field name an operation should use for the file part
#[inline]
pub(crate) fn effective_field_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_FILE_FIELD_NAME
    } else {
        name
    }
}
