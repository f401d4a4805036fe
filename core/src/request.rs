//! The outgoing request as plain data.
//!
//! # Design
//! A `RequestDraft` is built fresh for every call, mutated only while options
//! are applied, and then converted into a transport request. It is never
//! reused. Two header names are kept out of the header map: the host override
//! and the transfer-encoding list, which the transport treats specially and
//! which are only written onto the wire when the draft is finalized.

use ureq::http::header::{CONTENT_TYPE, COOKIE, HOST, TRANSFER_ENCODING};
use ureq::http::{HeaderMap, HeaderValue, Method, Request};
use url::Url;

use crate::body::EncodedBody;
use crate::error::ConfigError;

#[derive(Debug)]
pub struct RequestDraft {
    method: Method,
    url: Url,
    headers: HeaderMap,
    host: Option<HeaderValue>,
    transfer_encoding: Vec<String>,
    body: Option<Vec<u8>>,
    content_length: u64,
}

impl RequestDraft {
    /// A draft with no body and no headers.
    pub fn new(method: Method, url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            host: None,
            transfer_encoding: Vec::new(),
            body: None,
            content_length: 0,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Destination host sent instead of the one in the URL.
    pub fn host(&self) -> Option<&HeaderValue> {
        self.host.as_ref()
    }

    pub fn set_host(&mut self, host: HeaderValue) {
        self.host = Some(host);
    }

    pub fn transfer_encoding(&self) -> &[String] {
        &self.transfer_encoding
    }

    pub fn set_transfer_encoding(&mut self, encodings: Vec<String>) {
        self.transfer_encoding = encodings;
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Replace body, length, and content type. Nothing of a previous body survives.
    pub fn set_body(&mut self, body: EncodedBody) -> Result<(), ConfigError> {
        let (bytes, content_type) = body.into_parts();
        let content_type =
            HeaderValue::from_str(&content_type).map_err(|_| ConfigError::InvalidHeaderValue {
                name: CONTENT_TYPE.to_string(),
            })?;
        self.content_length = bytes.len() as u64;
        self.body = Some(bytes);
        self.headers.insert(CONTENT_TYPE, content_type);
        Ok(())
    }

    /// Finalize into a transport request and its body.
    ///
    /// `jar_cookies` is a `Cookie` header value from the client's store; it is
    /// appended to any `Cookie` header the caller set.
    pub(crate) fn into_request(
        self,
        jar_cookies: Option<String>,
    ) -> Result<(Request<()>, Option<Vec<u8>>), ConfigError> {
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.url.as_str())
            .body(())?;

        let mut headers = self.headers;
        if let Some(host) = self.host {
            headers.insert(HOST, host);
        }
        if !self.transfer_encoding.is_empty() {
            let joined = self.transfer_encoding.join(", ");
            let value = HeaderValue::from_str(&joined).map_err(|_| ConfigError::InvalidHeaderValue {
                name: TRANSFER_ENCODING.to_string(),
            })?;
            headers.insert(TRANSFER_ENCODING, value);
        }
        if let Some(jar_cookies) = jar_cookies {
            let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{existing}; {jar_cookies}"),
                _ => jar_cookies,
            };
            let value = HeaderValue::from_str(&merged).map_err(|_| ConfigError::InvalidHeaderValue {
                name: COOKIE.to_string(),
            })?;
            headers.insert(COOKIE, value);
        }
        *request.headers_mut() = headers;

        Ok((request, self.body))
    }
}
