//! Caller-owned client and request dispatcher.
//!
//! # Design
//! `Client` owns its `ClientConfig`, an optional cookie store, and a cached
//! transport agent. Options mutate the config through `&mut Client`, which
//! drops the cached agent; the next dispatch builds a new one from the
//! current config. Because every call borrows the client mutably, two calls
//! can never reconfigure the same client concurrently. Threads that need
//! parallel calls use one client each.
//!
//! Non-2xx responses are returned as `Response` values, not errors.

use cookie_store::CookieStore;
use ureq::http::Method;
use ureq::tls::TlsConfig;
use ureq::{Agent, Proxy, ResponseExt};
use url::Url;

use crate::config::{ClientConfig, RedirectPolicy, TransportConfig};
use crate::cookies;
use crate::error::{ConfigError, Error, TransportError};
use crate::option::{apply_options, RequestOption};
use crate::request::RequestDraft;
use crate::response::Response;

#[derive(Debug, Default)]
pub struct Client {
    config: ClientConfig,
    cookie_jar: Option<CookieStore>,
    agent: Option<Agent>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client from configuration, creating a cookie store if requested.
    pub fn from_config(config: ClientConfig) -> Self {
        let cookie_jar = config.cookie_jar.then(CookieStore::default);
        Self {
            config,
            cookie_jar,
            agent: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Mutable access to the config. Invalidates the cached transport agent.
    pub fn config_mut(&mut self) -> &mut ClientConfig {
        self.agent = None;
        &mut self.config
    }

    /// The transport sub-object, created on first use and reused afterwards.
    pub fn transport_mut(&mut self) -> &mut TransportConfig {
        self.config_mut().transport_mut()
    }

    /// Attach a fresh, empty cookie store.
    pub fn enable_cookie_jar(&mut self) {
        self.config.cookie_jar = true;
        self.cookie_jar = Some(CookieStore::default());
    }

    pub fn cookie_jar(&self) -> Option<&CookieStore> {
        self.cookie_jar.as_ref()
    }

    /// Mutable access to the store, for seeding or clearing cookies between calls.
    pub fn cookie_jar_mut(&mut self) -> Option<&mut CookieStore> {
        self.cookie_jar.as_mut()
    }

    /// Build a request for `method` and `url`, apply `options`, and send it.
    pub fn request<I>(&mut self, method: Method, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        let mut draft = RequestDraft::new(method, url)?;
        apply_options(&mut draft, self, options)?;
        self.execute(draft)
    }

    pub fn head<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::HEAD, url, options)
    }

    pub fn options<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::OPTIONS, url, options)
    }

    pub fn get<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::GET, url, options)
    }

    pub fn post<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::POST, url, options)
    }

    pub fn put<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::PUT, url, options)
    }

    pub fn patch<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::PATCH, url, options)
    }

    pub fn delete<I>(&mut self, url: &str, options: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = RequestOption>,
    {
        self.request(Method::DELETE, url, options)
    }

    fn agent(&mut self) -> Result<Agent, ConfigError> {
        if let Some(agent) = &self.agent {
            return Ok(agent.clone());
        }
        let agent = build_agent(&self.config)?;
        self.agent = Some(agent.clone());
        Ok(agent)
    }

    fn execute(&mut self, draft: RequestDraft) -> Result<Response, Error> {
        let url = draft.url().clone();
        let jar_cookies = self
            .cookie_jar
            .as_ref()
            .and_then(|jar| cookies::request_header_from_store(jar, &url));
        let (request, body) = draft.into_request(jar_cookies)?;
        let request_headers = request.headers().clone();
        let agent = self.agent()?;

        tracing::debug!(method = %request.method(), url = %url, "sending request");
        let result = match body {
            Some(bytes) => agent.run(request.map(|()| bytes)),
            None => agent.run(request),
        };
        let response = result.map_err(|err| {
            let err = TransportError::from(err);
            tracing::debug!(url = %url, error = %err, "request failed");
            err
        })?;

        let final_url = final_url(&response, &url);
        let (parts, body) = response.into_parts();
        tracing::debug!(url = %final_url, status = parts.status.as_u16(), "received response");

        if let Some(jar) = self.cookie_jar.as_mut() {
            jar.store_response_cookies(
                cookies::set_cookie_headers(&parts.headers).into_iter(),
                &final_url,
            );
        }

        Ok(Response::new(
            url,
            final_url,
            request_headers,
            parts.status,
            parts.headers,
            body,
        ))
    }
}

/// URL of the hop that produced `response`, which differs from `requested`
/// after followed redirects.
fn final_url(response: &ureq::http::Response<ureq::Body>, requested: &Url) -> Url {
    match Url::parse(&response.get_uri().to_string()) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(error = %err, "final URI is not a URL; keeping request URL");
            requested.clone()
        }
    }
}

fn build_agent(config: &ClientConfig) -> Result<Agent, ConfigError> {
    let mut builder = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(config.timeout);

    // With zero redirects the transport hands back the 3xx response itself.
    builder = match config.redirect {
        RedirectPolicy::Follow { max } => builder.max_redirects(max),
        RedirectPolicy::Stop => builder.max_redirects(0),
    };

    if let Some(transport) = &config.transport {
        if let Some(proxy) = &transport.proxy {
            let proxy = Proxy::new(proxy.as_str()).map_err(|err| ConfigError::InvalidProxy {
                url: proxy.to_string(),
                reason: err.to_string(),
            })?;
            builder = builder.proxy(Some(proxy));
        }
        if let Some(tls) = &transport.tls {
            let tls_config = TlsConfig::builder()
                .disable_verification(tls.disable_verification)
                .use_sni(tls.use_sni)
                .build();
            builder = builder.tls_config(tls_config);
        }
        if transport.http2 {
            tracing::debug!("HTTP/2 requested; transport will negotiate HTTP/1.1");
        }
    }

    Ok(builder.build().new_agent())
}

/// Send a request with a fresh default client.
pub fn request<I>(method: Method, url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    Client::new().request(method, url, options)
}

pub fn head<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::HEAD, url, options)
}

pub fn options<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::OPTIONS, url, options)
}

pub fn get<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::GET, url, options)
}

pub fn post<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::POST, url, options)
}

pub fn put<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::PUT, url, options)
}

pub fn patch<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::PATCH, url, options)
}

pub fn delete<I>(url: &str, options: I) -> Result<Response, Error>
where
    I: IntoIterator<Item = RequestOption>,
{
    request(Method::DELETE, url, options)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::TlsSettings;

    #[test]
    fn from_config_creates_cookie_jar_on_request() {
        let client = Client::from_config(ClientConfig {
            cookie_jar: true,
            ..ClientConfig::default()
        });
        assert!(client.cookie_jar().is_some());
        assert!(Client::new().cookie_jar().is_none());
    }

    #[test]
    fn agent_is_cached_until_config_changes() {
        let mut client = Client::new();
        client.agent().unwrap();
        assert!(client.agent.is_some());

        client.config_mut().timeout = Some(Duration::from_secs(1));
        assert!(client.agent.is_none());
    }

    #[test]
    fn agent_builds_from_full_transport_config() {
        let mut config = ClientConfig {
            timeout: Some(Duration::from_secs(3)),
            redirect: RedirectPolicy::Stop,
            ..ClientConfig::default()
        };
        let transport = config.transport_mut();
        transport.proxy = Some("http://127.0.0.1:3128".parse().unwrap());
        transport.tls = Some(TlsSettings::default());
        transport.http2 = true;

        assert!(build_agent(&config).is_ok());
    }

    #[test]
    fn unsupported_proxy_scheme_from_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.transport_mut().proxy = Some("ftp://127.0.0.1:21".parse().unwrap());
        let err = build_agent(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProxy { .. }));
    }

    #[test]
    fn invalid_url_fails_before_any_io() {
        let err = Client::new().get("::not a url::", []).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn invalid_proxy_fails_before_any_io() {
        // Port 9 (discard) would hang or refuse; the call must never get that far.
        let err = get("http://127.0.0.1:9/", [RequestOption::proxy("http://[::1")]).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidProxy { .. })));
    }
}
