//! Parsed multipart form
//!
//! Collects every part of a multipart stream: text fields as strings, file
//! parts in memory until the memory budget runs out, then in temp files.

use bytes::{Bytes, BytesMut};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use multer::Multipart;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::temp_file::TempFile;
use super::UploadError;

/// A fully parsed multipart form
#[derive(Debug, Default)]
pub struct Form {
    /// Text fields by name, in arrival order
    pub values: HashMap<String, Vec<String>>,
    /// File parts by field name, in arrival order
    pub files: HashMap<String, Vec<FileHeader>>,
}

impl Form {
    /// First value of a text field
    #[cfg(test)]
    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    /// Take the first file uploaded under `name`
    ///
    /// Other files under the same name stay in the form and are released
    /// with it.
    pub fn remove_file(&mut self, name: &str) -> Option<FileHeader> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            return None;
        }
        Some(files.remove(0))
    }
}

/// Metadata and content of an uploaded file part
#[derive(Debug)]
pub struct FileHeader {
    /// Declared filename (base name only)
    pub filename: String,
    /// Part headers
    pub headers: HeaderMap,
    /// Content length in bytes
    pub size: u64,
    content: FormFile,
}

impl FileHeader {
    /// Declared content type of the part
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Whether the content was spilled to a temp file
    pub fn is_on_disk(&self) -> bool {
        matches!(self.content, FormFile::Disk(_))
    }

    /// Open the content for reading
    pub fn open(self) -> FormFile {
        self.content
    }
}

/// Readable content of an uploaded file
///
/// Dropping it releases the content; a backing temp file is deleted.
#[derive(Debug)]
pub enum FormFile {
    Memory(Cursor<Bytes>),
    Disk(TempFile),
}

impl Read for FormFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FormFile::Memory(cursor) => cursor.read(buf),
            FormFile::Disk(file) => file.read(buf),
        }
    }
}

impl Seek for FormFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            FormFile::Memory(cursor) => cursor.seek(pos),
            FormFile::Disk(file) => file.seek(pos),
        }
    }
}

/// Read every part of `multipart` into a [`Form`]
///
/// `max_bytes` is only used to report the ceiling when the stream trips it.
pub(crate) async fn read_form(
    mut multipart: Multipart<'_>,
    max_bytes: u64,
    max_memory: u64,
) -> Result<Form, UploadError> {
    let mut form = Form::default();
    let mut memory_left = max_memory;
    let fail = |e: multer::Error| UploadError::from_multer(e, max_bytes);

    while let Some(mut field) = multipart.next_field().await.map_err(fail)? {
        let name = field.name().unwrap_or_default().to_string();

        // An empty filename is what browsers send when no file was chosen
        let Some(filename) = field
            .file_name()
            .filter(|filename| !filename.is_empty())
            .map(base_name)
        else {
            let text = field.text().await.map_err(fail)?;
            memory_left = memory_left.saturating_sub(text.len() as u64);
            form.values.entry(name).or_default().push(text);
            continue;
        };

        let headers = field.headers().clone();
        let mut buffer = BytesMut::new();
        let mut spill: Option<TempFile> = None;
        let mut size = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(fail)? {
            size += chunk.len() as u64;
            match spill.as_mut() {
                Some(temp) => temp.write_all(&chunk)?,
                None if size > memory_left => {
                    let mut temp = TempFile::create()?;
                    temp.write_all(&buffer)?;
                    temp.write_all(&chunk)?;
                    buffer.clear();
                    tracing::debug!(
                        field = %name,
                        filename = %filename,
                        path = %temp.path().display(),
                        "File part exceeds memory budget, spilling to disk"
                    );
                    spill = Some(temp);
                }
                None => buffer.extend_from_slice(&chunk),
            }
        }

        let content = match spill {
            Some(mut temp) => {
                temp.flush()?;
                temp.rewind()?;
                FormFile::Disk(temp)
            }
            None => {
                memory_left -= size;
                FormFile::Memory(Cursor::new(buffer.freeze()))
            }
        };

        form.files.entry(name).or_default().push(FileHeader {
            filename,
            headers,
            size,
            content,
        });
    }

    Ok(form)
}

/// Strip any directory components a client put in the filename
fn base_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
