//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain data that options mutate and that the client turns
//! into a transport agent on dispatch. It deserializes from configuration
//! files with every field optional, so a caller can keep connection settings
//! next to the rest of its configuration and layer per-call options on top.
//!
//! The transport sub-object is created lazily by `transport_mut` and never
//! replaced afterwards: a proxy set by one option and a TLS flag set by a
//! later one both land on the same `TransportConfig`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Redirects followed by default before the call fails.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// What the client does when a response is a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RedirectPolicy {
    /// Follow up to `max` redirects, then fail.
    Follow { max: u32 },
    /// Return the first response as-is, 3xx status and headers intact.
    Stop,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy::Follow {
            max: DEFAULT_MAX_REDIRECTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSettings {
    /// Accept any server certificate. Only for testing against self-signed endpoints.
    pub disable_verification: bool,
    /// Send the server name indication extension.
    pub use_sni: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            disable_verification: false,
            use_sni: true,
        }
    }
}

/// Connection-level settings shared by every option that affects networking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub proxy: Option<Url>,
    pub tls: Option<TlsSettings>,
    /// Attempt HTTP/2 when the transport can negotiate it.
    pub http2: bool,
}

impl TransportConfig {
    /// Turn off certificate verification, keeping any other TLS settings.
    pub fn skip_tls_verify(&mut self) {
        match &mut self.tls {
            Some(tls) => tls.disable_verification = true,
            None => {
                self.tls = Some(TlsSettings {
                    disable_verification: true,
                    ..TlsSettings::default()
                });
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Deadline for the whole call: connect, send, and receive.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub redirect: RedirectPolicy,
    /// Create a cookie store when a client is built from this config.
    pub cookie_jar: bool,
    pub transport: Option<TransportConfig>,
}

impl ClientConfig {
    /// The transport sub-object, created on first use.
    pub fn transport_mut(&mut self) -> &mut TransportConfig {
        self.transport.get_or_insert_with(TransportConfig::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_follows_redirects_without_timeout() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, None);
        assert_eq!(config.redirect, RedirectPolicy::Follow { max: 10 });
        assert!(!config.cookie_jar);
        assert!(config.transport.is_none());
    }

    #[test]
    fn transport_is_created_once_and_reused() {
        let mut config = ClientConfig::default();
        config.transport_mut().http2 = true;
        config.transport_mut().proxy = Some(Url::parse("http://proxy.local:3128").unwrap());

        let transport = config.transport.as_ref().unwrap();
        assert!(transport.http2, "earlier setting must survive later access");
        assert_eq!(transport.proxy.as_ref().unwrap().host_str(), Some("proxy.local"));
    }

    #[test]
    fn skip_tls_verify_preserves_existing_tls_settings() {
        let mut transport = TransportConfig {
            tls: Some(TlsSettings {
                disable_verification: false,
                use_sni: false,
            }),
            ..TransportConfig::default()
        };
        transport.skip_tls_verify();

        let tls = transport.tls.unwrap();
        assert!(tls.disable_verification);
        assert!(!tls.use_sni);
    }

    #[test]
    fn skip_tls_verify_creates_tls_settings_when_absent() {
        let mut transport = TransportConfig::default();
        transport.skip_tls_verify();
        assert_eq!(
            transport.tls,
            Some(TlsSettings {
                disable_verification: true,
                use_sni: true,
            })
        );
    }

    #[test]
    fn deserializes_from_json_with_humantime_durations() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "timeout": "1s 500ms",
                "redirect": { "mode": "stop" },
                "cookie_jar": true,
                "transport": { "proxy": "http://127.0.0.1:8080", "http2": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.redirect, RedirectPolicy::Stop);
        assert!(config.cookie_jar);
        let transport = config.transport.unwrap();
        assert!(transport.http2);
        assert!(transport.tls.is_none());
        assert_eq!(transport.proxy.unwrap().port(), Some(8080));
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<ClientConfig, _> = serde_json::from_str(r#"{"retries": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn follow_policy_carries_limit() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"redirect": {"mode": "follow", "max": 3}}"#).unwrap();
        assert_eq!(config.redirect, RedirectPolicy::Follow { max: 3 });
    }
}
