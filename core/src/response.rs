//! The response wrapper and its single-use body extractors.
//!
//! # Design
//! The body is taken out of the wrapper by the first extraction call and is
//! dropped when that call returns, on success or failure, which releases the
//! connection. Any later extraction finds nothing to read and fails with an
//! `Io` error instead of returning stale or partial data. Status, headers, and
//! cookies stay available after the body is gone.

use std::fmt;
use std::io::{self, BufReader, Read};

use serde::de::DeserializeOwned;
use serde_json::error::Category;
use ureq::http::header::COOKIE;
use ureq::http::{HeaderMap, StatusCode};
use url::Url;

use cookie_store::RawCookie;

use crate::cookies;
use crate::error::{BodyFormat, DecodeError, DecodeErrorKind, Error};

pub struct Response {
    url: Url,
    final_url: Url,
    request_headers: HeaderMap,
    status: StatusCode,
    headers: HeaderMap,
    body: Option<ureq::Body>,
}

impl Response {
    pub(crate) fn new(
        url: Url,
        final_url: Url,
        request_headers: HeaderMap,
        status: StatusCode,
        headers: HeaderMap,
        body: ureq::Body,
    ) -> Self {
        Self {
            url,
            final_url,
            request_headers,
            status,
            headers,
            body: Some(body),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// URL of the originating request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL of the response actually returned, after any followed redirects.
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    /// Headers as sent on the originating request, including jar cookies.
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    fn take_reader(&mut self) -> Result<impl Read, Error> {
        let body = self
            .body
            .take()
            .ok_or_else(|| io::Error::other("response body already consumed"))?;
        Ok(body.into_reader())
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        let mut reader = self.take_reader()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// The body as UTF-8 text; invalid UTF-8 is an `InvalidData` I/O error.
    pub fn text(&mut self) -> Result<String, Error> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }

    /// Stream the body into a JSON decoder.
    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let reader = BufReader::new(self.take_reader()?);
        serde_json::from_reader(reader).map_err(json_error)
    }

    /// Stream the body into an XML decoder.
    pub fn xml<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let reader = BufReader::new(self.take_reader()?);
        quick_xml::de::from_reader(reader).map_err(xml_error)
    }

    /// Cookies sent on the originating request, split from its `Cookie` header.
    pub fn request_cookies(&self) -> Vec<RawCookie<'static>> {
        self.request_headers
            .get(COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(cookies::parse_cookie_header)
            .unwrap_or_default()
    }

    /// Cookies set by this response, normalized through a cookie store keyed
    /// by the URL that produced it.
    pub fn response_cookies(&self) -> Vec<RawCookie<'static>> {
        cookies::normalize_response_cookies(&self.headers, &self.final_url)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("final_url", &self.final_url.as_str())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

fn json_error(err: serde_json::Error) -> Error {
    match err.classify() {
        Category::Io => Error::Io(err.into()),
        Category::Syntax | Category::Eof => {
            DecodeError::new(BodyFormat::Json, DecodeErrorKind::Malformed, err).into()
        }
        Category::Data => DecodeError::new(BodyFormat::Json, DecodeErrorKind::Mismatch, err).into(),
    }
}

fn xml_error(err: quick_xml::DeError) -> Error {
    let kind = if matches!(err, quick_xml::DeError::InvalidXml(_) | quick_xml::DeError::UnexpectedEof) {
        DecodeErrorKind::Malformed
    } else {
        DecodeErrorKind::Mismatch
    };
    DecodeError::new(BodyFormat::Xml, kind, err).into()
}
