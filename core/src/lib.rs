//! Blocking single-request HTTP helper built from composable options.
//!
//! # Overview
//! A call names a verb and a URL and passes a list of `RequestOption`
//! values. Options shape the outgoing request (body, headers, auth) or the
//! client that sends it (timeout, redirects, proxy, TLS, cookie jar). The
//! returned `Response` exposes status and headers and lets the body be read
//! once, as text, bytes, JSON, or XML.
//!
//! # Design
//! - Bodies are encoded to bytes up front by the `body` and `multipart`
//!   modules; the last body option applied wins.
//! - Client settings live in a caller-owned `Client`. The free verb
//!   functions use a fresh default client per call, so nothing is shared
//!   between unrelated calls.
//! - Errors are split into configuration, transport, decode, and I/O
//!   failures so callers can tell "never sent" from "sent and failed".
//! - HTTP status codes are never errors.

pub mod body;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod multipart;
pub mod option;
pub mod request;
pub mod response;

pub use body::EncodedBody;
pub use client::{delete, get, head, options, patch, post, put, request, Client};
pub use config::{ClientConfig, RedirectPolicy, TlsSettings, TransportConfig};
pub use cookie_store::RawCookie;
pub use error::{
    BodyFormat, ConfigError, DecodeError, DecodeErrorKind, Error, TransportError,
    TransportErrorKind,
};
pub use multipart::FileField;
pub use option::{apply_options, RequestOption};
pub use request::RequestDraft;
pub use response::Response;
pub use ureq::http::{Method, StatusCode};
