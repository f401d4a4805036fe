//! Request body encoders.
//!
//! Each encoder turns a logical payload into bytes plus the content type that
//! describes them. They do no I/O; multipart uploads, which read files, live in
//! [`crate::multipart`].

use serde::Serialize;

use crate::error::{BodyFormat, ConfigError};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// An encoded request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    bytes: Vec<u8>,
    content_type: String,
}

impl EncodedBody {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<u8>, String) {
        (self.bytes, self.content_type)
    }
}

pub fn encode_text(text: &str) -> EncodedBody {
    EncodedBody::new(text.as_bytes().to_vec(), TEXT_PLAIN)
}

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, ConfigError> {
    let bytes = serde_json::to_vec(value).map_err(|e| serialization(BodyFormat::Json, e))?;
    Ok(EncodedBody::new(bytes, APPLICATION_JSON))
}

/// Serialize with the type name as the root element.
pub fn encode_xml<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, ConfigError> {
    let xml = quick_xml::se::to_string(value).map_err(|e| serialization(BodyFormat::Xml, e))?;
    Ok(EncodedBody::new(xml.into_bytes(), APPLICATION_XML))
}

/// Percent-encode a flat key/value mapping. Nested values are rejected.
pub fn encode_form<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, ConfigError> {
    let encoded = serde_urlencoded::to_string(value).map_err(|e| serialization(BodyFormat::Form, e))?;
    Ok(EncodedBody::new(encoded.into_bytes(), FORM_URLENCODED))
}

fn serialization(format: BodyFormat, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Serialization {
        format,
        reason: err.to_string(),
    }
}
