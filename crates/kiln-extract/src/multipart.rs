//! `multipart/form-data` bodies and uploaded files.
//!
//! [`MultiPartParser`] turns a multipart body into [`RequestData`]:
//! plain fields become JSON strings (an array when a name repeats) and
//! parts with a `filename` become [`UploadedFile`]s. Handlers can take a
//! single file by parameter name through [`UploadedFileComponent`].
//!
//! # Example
//!
//! ```rust,ignore
//! let upload = Callable::builder("upload")
//!     .param::<UploadedFile>("avatar")
//!     .build(|args| {
//!         let avatar = args.shared::<UploadedFile>("avatar")?;
//!         avatar.save(format!("uploads/{}", avatar.file_name()))?;
//!         Ok(Reply::ok(json!({"size": avatar.len()})))
//!     });
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use bytes::Bytes;
use futures_util::{future, stream, FutureExt};
use kiln_core::{Callable, Component, Headers, KilnError, KilnResult, Parameter, Value};
use serde_json::json;
use tracing::debug;

use crate::body::{RequestBody, RequestData};
use crate::header::Header;
use crate::parser::{collect_fields, RequestParser};

/// Default maximum size of a plain field (500 KB).
pub const DEFAULT_MAX_FIELD_SIZE: usize = 500 * 1024;

/// Default maximum size of a file (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum number of parts.
pub const DEFAULT_MAX_FIELDS: usize = 100;

/// Limits applied while parsing multipart bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Maximum size of a plain field in bytes.
    pub max_field_size: usize,
    /// Maximum size of a file in bytes.
    pub max_file_size: usize,
    /// Maximum number of parts.
    pub max_fields: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_fields: DEFAULT_MAX_FIELDS,
        }
    }
}

impl MultipartConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum field size.
    #[must_use]
    pub fn max_field_size(mut self, size: usize) -> Self {
        self.max_field_size = size;
        self
    }

    /// Set the maximum file size.
    #[must_use]
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set the maximum number of parts.
    #[must_use]
    pub fn max_fields(mut self, count: usize) -> Self {
        self.max_fields = count;
        self
    }
}

/// A file sent as part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    name: String,
    file_name: String,
    headers: Headers,
    data: Bytes,
}

impl UploadedFile {
    /// Creates an uploaded file.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        headers: Headers,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            headers,
            data: data.into(),
        }
    }

    /// The form field the file was sent under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file name the client sent.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The part's headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The part's `content-type`, if it had one.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// The file contents.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies the contents into `destination`.
    ///
    /// # Errors
    ///
    /// Returns the writer's error.
    pub fn write_to<W: Write>(&self, mut destination: W) -> io::Result<()> {
        destination.write_all(&self.data)
    }

    /// Writes the contents to a file at `path`, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Fails with [`KilnError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> KilnResult<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }
}

/// The files of a multipart body, in the order they were sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadedFiles(Vec<UploadedFile>);

impl UploadedFiles {
    /// No files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    pub fn push(&mut self, file: UploadedFile) {
        self.0.push(file);
    }

    /// The last file sent under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UploadedFile> {
        self.0.iter().rev().find(|file| file.name == name)
    }

    /// Every file sent under `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.0.iter().filter(move |file| file.name == name)
    }

    /// Iterates all files.
    pub fn iter(&self) -> impl Iterator<Item = &UploadedFile> {
        self.0.iter()
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<UploadedFile> for UploadedFiles {
    fn from_iter<I: IntoIterator<Item = UploadedFile>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses `multipart/form-data` bodies.
///
/// The boundary is read from the original `content-type` header, so
/// its case is preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiPartParser {
    config: MultipartConfig,
}

impl MultiPartParser {
    /// A parser enforcing `config`.
    #[must_use]
    pub fn new(config: MultipartConfig) -> Self {
        Self { config }
    }
}

impl RequestParser for MultiPartParser {
    fn mime_type(&self) -> &str {
        "multipart/form-data"
    }

    fn can_parse_content(&self, content_type: &str) -> bool {
        content_type.starts_with("multipart/form-data")
    }

    fn parse(&self) -> Callable<RequestData> {
        let config = self.config;
        Callable::builder("MultiPartParser::parse")
            .param::<Header>("content_type")
            .param::<RequestBody>("body")
            .build(move |args| {
                let content_type = args.shared::<Header>("content_type")?;
                let body = args.shared::<RequestBody>("body")?;
                let boundary = multer::parse_boundary(content_type.as_str())
                    .map_err(|_| KilnError::parse("boundary missing from content-type header"))?;

                // The body is already in memory, so every poll completes.
                read_parts(body.0.clone(), boundary, config)
                    .now_or_never()
                    .unwrap_or_else(|| Err(KilnError::parse("unexpected end of input")))
            })
    }
}

async fn read_parts(body: Bytes, boundary: String, config: MultipartConfig) -> KilnResult<RequestData> {
    let input = stream::once(future::ready(Ok::<_, io::Error>(body)));
    let mut multipart = multer::Multipart::new(input, boundary);
    let mut fields = Vec::new();
    let mut files = UploadedFiles::new();
    let mut count = 0;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        count += 1;
        if count > config.max_fields {
            return Err(KilnError::parse("the input contains too many fields"));
        }

        let Some(name) = field.name().map(str::to_string) else {
            return Err(KilnError::parse("content-disposition header without a name"));
        };
        let file_name = field.file_name().map(str::to_string);
        let headers = Headers::from(field.headers().clone());
        let data = field.bytes().await.map_err(multipart_error)?;

        match file_name {
            Some(file_name) => {
                if data.len() > config.max_file_size {
                    return Err(KilnError::parse(format!(
                        "file '{name}' exceeds the file size limit"
                    )));
                }
                files.push(UploadedFile::new(name, file_name, headers, data));
            }
            None => {
                if data.len() > config.max_field_size {
                    return Err(KilnError::parse(format!(
                        "field '{name}' exceeds the field size limit"
                    )));
                }
                fields.push((name, String::from_utf8_lossy(&data).into_owned()));
            }
        }
    }

    debug!(fields = fields.len(), files = files.len(), "parsed multipart body");
    Ok(RequestData::with_files(collect_fields(fields), files))
}

fn multipart_error(err: multer::Error) -> KilnError {
    match err {
        multer::Error::IncompleteStream
        | multer::Error::IncompleteHeaders
        | multer::Error::IncompleteFieldData { .. } => KilnError::parse("unexpected end of input"),
        other => KilnError::parse(format!("multipart parse error: {other}")),
    }
}

/// Provides [`UploadedFile`] parameters, picked by parameter name.
///
/// Not cacheable: each parameter names a different file. A missing file
/// is a `400` unless the parameter is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadedFileComponent;

impl Component for UploadedFileComponent {
    fn cacheable(&self) -> bool {
        false
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<UploadedFile>()
    }

    fn resolve(&self) -> Callable {
        Callable::builder("UploadedFileComponent::resolve")
            .param::<Parameter>("parameter")
            .param::<RequestData>("data")
            .build(|args| {
                let parameter = args.shared::<Parameter>("parameter")?;
                let data = args.shared::<RequestData>("data")?;
                let name = parameter.name().to_string();

                match data.files().get(&name) {
                    Some(file) => Ok(Value::new(file.clone())),
                    None if parameter.is_optional() => Ok(Value::none()),
                    None if data.get(&name).is_some() => {
                        Err(KilnError::bad_request(json!({ name: "must be a file" })))
                    }
                    None => Err(KilnError::bad_request(json!({ name: "missing" }))),
                }
            })
    }
}
