//! `multipart/form-data` encoding for file uploads.
//!
//! # Design
//! The whole payload is assembled in memory so its length is known before the
//! request is sent. Files given by path are opened, copied into their part,
//! and closed before the next field is looked at, on success and on failure
//! alike. A field with neither a reader nor a path contributes nothing.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use uuid::Uuid;

use crate::body::EncodedBody;
use crate::error::ConfigError;

const CRLF: &[u8] = b"\r\n";
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// One upload in a multipart body.
///
/// When both a reader and a path are set, the reader wins and the path is
/// never opened.
pub struct FileField {
    pub field_name: String,
    pub file_name: String,
    pub reader: Option<Box<dyn Read + Send>>,
    pub path: Option<PathBuf>,
}

impl FileField {
    pub fn from_path(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            reader: None,
            path: Some(path.into()),
        }
    }

    pub fn from_reader(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            reader: Some(Box::new(reader)),
            path: None,
        }
    }

    /// Open the content source, or `None` when there is nothing to upload.
    fn open(self) -> Result<Option<(String, String, Box<dyn Read + Send>)>, ConfigError> {
        let FileField {
            field_name,
            file_name,
            reader,
            path,
        } = self;
        let reader = match (reader, path.filter(|p| !p.as_os_str().is_empty())) {
            (Some(reader), _) => reader,
            (None, Some(path)) => match File::open(&path) {
                Ok(file) => Box::new(file) as Box<dyn Read + Send>,
                Err(source) => {
                    return Err(ConfigError::File {
                        field: field_name,
                        source,
                    })
                }
            },
            (None, None) => return Ok(None),
        };
        Ok(Some((field_name, file_name, reader)))
    }
}

impl fmt::Debug for FileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileField")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("reader", &self.reader.as_ref().map(|_| "<reader>"))
            .field("path", &self.path)
            .finish()
    }
}

/// Files plus scalar fields, encoded when the owning option is applied.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: Vec<FileField>,
    pub fields: Vec<(String, String)>,
}

impl MultipartForm {
    pub fn encode(self) -> Result<EncodedBody, ConfigError> {
        encode_multipart(self.files, &self.fields)
    }
}

/// Encode files first, then scalar fields, in the order given.
pub fn encode_multipart(
    files: Vec<FileField>,
    fields: &[(String, String)],
) -> Result<EncodedBody, ConfigError> {
    let mut writer = MultipartWriter::new();

    for file in files {
        let Some((field_name, file_name, mut reader)) = file.open()? else {
            continue;
        };
        let copied = writer.copy_file(&field_name, &file_name, &mut reader);
        drop(reader);
        match copied {
            Ok(size) => tracing::trace!(field = %field_name, size, "copied multipart file"),
            Err(source) => {
                return Err(ConfigError::File {
                    field: field_name,
                    source,
                })
            }
        }
    }

    for (name, value) in fields {
        writer.write_field(name, value);
    }

    Ok(writer.finish())
}

struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    has_parts: bool,
}

impl MultipartWriter {
    fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            buf: Vec::new(),
            has_parts: false,
        }
    }

    fn begin_part(&mut self, disposition: &str, content_type: Option<&str>) {
        if self.has_parts {
            self.buf.extend_from_slice(CRLF);
        }
        self.has_parts = true;

        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(CRLF);
        self.buf.extend_from_slice(b"Content-Disposition: ");
        self.buf.extend_from_slice(disposition.as_bytes());
        self.buf.extend_from_slice(CRLF);
        if let Some(content_type) = content_type {
            self.buf.extend_from_slice(b"Content-Type: ");
            self.buf.extend_from_slice(content_type.as_bytes());
            self.buf.extend_from_slice(CRLF);
        }
        self.buf.extend_from_slice(CRLF);
    }

    fn copy_file(&mut self, field_name: &str, file_name: &str, reader: &mut dyn Read) -> io::Result<u64> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field_name),
            escape_quotes(file_name)
        );
        self.begin_part(&disposition, Some(FILE_CONTENT_TYPE));
        io::copy(reader, &mut self.buf)
    }

    fn write_field(&mut self, name: &str, value: &str) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.begin_part(&disposition, None);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write the closing boundary. The length is only final after this.
    fn finish(mut self) -> EncodedBody {
        if self.has_parts {
            self.buf.extend_from_slice(CRLF);
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(CRLF);
        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        EncodedBody::new(self.buf, content_type)
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    fn boundary_of(body: &EncodedBody) -> String {
        body.content_type()
            .strip_prefix("multipart/form-data; boundary=")
            .expect("multipart content type")
            .to_string()
    }

    #[test]
    fn writer_lays_out_parts_and_closing_boundary() {
        let mut writer = MultipartWriter::with_boundary("XYZ".to_string());
        writer
            .copy_file("file", "a.txt", &mut Cursor::new(b"hello".to_vec()))
            .unwrap();
        writer.write_field("upload", "true");
        let body = writer.finish();

        let expected = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
            Content-Type: application/octet-stream\r\n\
            \r\n\
            hello\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"upload\"\r\n\
            \r\n\
            true\r\n\
            --XYZ--\r\n";
        assert_eq!(std::str::from_utf8(body.bytes()).unwrap(), expected);
        assert_eq!(body.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn empty_form_is_just_the_closing_boundary() {
        let body = MultipartWriter::with_boundary("B".to_string()).finish();
        assert_eq!(body.bytes(), b"--B--\r\n");
    }

    #[test]
    fn names_are_quote_escaped() {
        let mut writer = MultipartWriter::with_boundary("B".to_string());
        writer.write_field("we\"ird\\name", "v");
        let body = writer.finish();
        let text = std::str::from_utf8(body.bytes()).unwrap();
        assert!(text.contains(r#"name="we\"ird\\name""#), "{text}");
    }

    #[test]
    fn path_fields_are_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let files = vec![FileField::from_path("doc", "digits.txt", file.path())];
        let fields = vec![("upload".to_string(), "true".to_string())];
        let body = encode_multipart(files, &fields).unwrap();

        let text = String::from_utf8(body.bytes().to_vec()).unwrap();
        assert!(text.contains("name=\"doc\"; filename=\"digits.txt\""));
        assert!(text.contains("\r\n\r\n0123456789\r\n"));
        assert!(text.contains("name=\"upload\"\r\n\r\ntrue\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary_of(&body))));
    }

    #[test]
    fn reader_takes_precedence_over_path() {
        let field = FileField {
            field_name: "file".to_string(),
            file_name: "mem.bin".to_string(),
            reader: Some(Box::new(Cursor::new(b"in memory".to_vec()))),
            path: Some(PathBuf::from("/definitely/not/here")),
        };
        let body = encode_multipart(vec![field], &[]).unwrap();
        let text = String::from_utf8(body.bytes().to_vec()).unwrap();
        assert!(text.contains("in memory"));
    }

    #[test]
    fn fields_without_content_are_skipped() {
        let empty = FileField {
            field_name: "ghost".to_string(),
            file_name: "ghost.txt".to_string(),
            reader: None,
            path: None,
        };
        let blank_path = FileField::from_path("blank", "blank.txt", "");
        let body = encode_multipart(vec![empty, blank_path], &[]).unwrap();
        let text = String::from_utf8(body.bytes().to_vec()).unwrap();
        assert!(!text.contains("ghost"));
        assert!(!text.contains("blank"));
    }

    #[test]
    fn missing_file_aborts_with_field_name() {
        let files = vec![FileField::from_path("doc", "x.txt", "/definitely/not/here.txt")];
        let err = encode_multipart(files, &[]).unwrap_err();
        match err {
            ConfigError::File { field, source } => {
                assert_eq!(field, "doc");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn copy_failure_aborts_encode() {
        let files = vec![FileField::from_reader("doc", "x.txt", FailingReader)];
        let err = encode_multipart(files, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn debug_hides_reader() {
        let field = FileField::from_reader("f", "n", Cursor::new(Vec::new()));
        let debug = format!("{field:?}");
        assert!(debug.contains("<reader>"));
    }
}
