//! Minimal `multipart/form-data` encoder for snap sideloading.
//!
//! Only the shape snapd accepts on `POST /v2/snaps` is supported: plain text
//! fields followed by one or more file parts. Field values are written as-is;
//! callers are expected to pass ASCII names.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// A single file part of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// A form payload plus the boundary that delimits its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(format!("snapd-rs-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` header of a request carrying this form.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Renders the form into its wire representation.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();

        for (name, value) in &self.fields {
            self.put_delimiter(&mut out);
            out.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quoted(name)
                )
                .as_bytes(),
            );
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        for file in &self.files {
            self.put_delimiter(&mut out);
            out.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quoted(&file.name),
                    escape_quoted(&file.filename)
                )
                .as_bytes(),
            );
            out.put_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            out.put_slice(&file.data);
            out.put_slice(b"\r\n");
        }

        out.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out.freeze()
    }

    fn put_delimiter(&self, out: &mut BytesMut) {
        out.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
    }
}

/// Percent-encodes the characters that would end a quoted
/// `Content-Disposition` parameter or the header line itself.
fn escape_quoted(value: &str) -> Cow<'_, str> {
    if !value.contains(['"', '\r', '\n']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}
