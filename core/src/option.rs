//! Request options and the pipeline that applies them.
//!
//! # Design
//! Each option is a `RequestOption` variant acting on an explicit
//! `(RequestDraft, Client)` pair, so a single option can be built, inspected,
//! and applied in a test without any network call. Options apply in the order
//! given and each one sees the effects of the ones before it. The first
//! failure stops the pipeline; what was already applied stays applied.
//!
//! Body options encode their payload when they are built and report an
//! encoding failure when applied. Multipart options read their files when
//! applied. Whichever body option is applied last owns the body.

use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use serde::Serialize;
use ureq::http::header::AUTHORIZATION;
use ureq::http::{HeaderName, HeaderValue};
use url::Url;

use crate::body::{encode_form, encode_json, encode_text, encode_xml, EncodedBody};
use crate::client::Client;
use crate::config::RedirectPolicy;
use crate::error::ConfigError;
use crate::multipart::{FileField, MultipartForm};
use crate::request::RequestDraft;

#[derive(Debug)]
#[non_exhaustive]
pub enum RequestOption {
    /// A pre-encoded body, or the error its encoding produced.
    Body(Result<EncodedBody, ConfigError>),
    Multipart(MultipartForm),
    /// Headers set in order. `host` and `transfer-encoding` are special-cased.
    Headers(Vec<(String, String)>),
    Timeout(Duration),
    DisableRedirect,
    Proxy(String),
    SkipTlsVerify,
    Http2,
    CookieJar,
    BasicAuth { username: String, password: String },
}

impl RequestOption {
    pub fn text(body: impl AsRef<str>) -> Self {
        Self::Body(Ok(encode_text(body.as_ref())))
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::Body(encode_json(value))
    }

    pub fn xml<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::Body(encode_xml(value))
    }

    pub fn form<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::Body(encode_form(value))
    }

    pub fn multipart<I, K, V>(files: Vec<FileField>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Multipart(MultipartForm {
            files,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Headers(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout(timeout)
    }

    pub fn disable_redirect() -> Self {
        Self::DisableRedirect
    }

    pub fn proxy(url: impl Into<String>) -> Self {
        Self::Proxy(url.into())
    }

    pub fn skip_tls_verify() -> Self {
        Self::SkipTlsVerify
    }

    pub fn http2() -> Self {
        Self::Http2
    }

    pub fn cookie_jar() -> Self {
        Self::CookieJar
    }

    pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Short label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Body(_) => "body",
            Self::Multipart(_) => "multipart",
            Self::Headers(_) => "headers",
            Self::Timeout(_) => "timeout",
            Self::DisableRedirect => "disable_redirect",
            Self::Proxy(_) => "proxy",
            Self::SkipTlsVerify => "skip_tls_verify",
            Self::Http2 => "http2",
            Self::CookieJar => "cookie_jar",
            Self::BasicAuth { .. } => "basic_auth",
        }
    }

    pub fn apply(self, draft: &mut RequestDraft, client: &mut Client) -> Result<(), ConfigError> {
        match self {
            Self::Body(encoded) => draft.set_body(encoded?)?,
            Self::Multipart(form) => draft.set_body(form.encode()?)?,
            Self::Headers(headers) => apply_headers(draft, headers)?,
            Self::Timeout(timeout) => client.config_mut().timeout = Some(timeout),
            Self::DisableRedirect => client.config_mut().redirect = RedirectPolicy::Stop,
            Self::Proxy(raw) => {
                let proxy = parse_proxy(&raw)?;
                client.transport_mut().proxy = Some(proxy);
            }
            Self::SkipTlsVerify => client.transport_mut().skip_tls_verify(),
            Self::Http2 => client.transport_mut().http2 = true,
            Self::CookieJar => client.enable_cookie_jar(),
            Self::BasicAuth { username, password } => {
                let value = basic_auth_header(&username, &password)?;
                draft.headers_mut().insert(AUTHORIZATION, value);
            }
        }
        Ok(())
    }
}

/// Apply `options` in order, stopping at the first failure without rollback.
pub fn apply_options<I>(
    draft: &mut RequestDraft,
    client: &mut Client,
    options: I,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = RequestOption>,
{
    for (index, option) in options.into_iter().enumerate() {
        let name = option.name();
        if let Err(err) = option.apply(draft, client) {
            tracing::debug!(option = name, index, error = %err, "request option failed");
            return Err(err);
        }
        tracing::trace!(option = name, index, "applied request option");
    }
    Ok(())
}

fn apply_headers(draft: &mut RequestDraft, headers: Vec<(String, String)>) -> Result<(), ConfigError> {
    for (key, value) in headers {
        let key = key.trim();
        if key.eq_ignore_ascii_case("host") {
            draft.set_host(header_value(key, &value)?);
        } else if key.eq_ignore_ascii_case("transfer-encoding") {
            draft.set_transfer_encoding(vec![value]);
        } else {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName(key.to_string()))?;
            let value = header_value(key, &value)?;
            draft.headers_mut().insert(name, value);
        }
    }
    Ok(())
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
    })
}

fn parse_proxy(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidProxy {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    ureq::Proxy::new(raw).map_err(|e| invalid(e.to_string()))?;
    Ok(url)
}

fn basic_auth_header(username: &str, password: &str) -> Result<HeaderValue, ConfigError> {
    let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
    let mut value = header_value(AUTHORIZATION.as_str(), &format!("Basic {encoded}"))?;
    value.set_sensitive(true);
    Ok(value)
}
