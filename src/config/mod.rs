//! Configuration for the friendly error layer.
//!
//! [`FriendlyErrorsConfig`] is the raw, user-facing shape (deserializable, or
//! assembled fluently, or read from the environment through
//! [`ConfigService`]). Calling [`FriendlyErrorsConfig::validate`] produces the
//! frozen [`InterceptorConfig`] that the layer closes over for the lifetime
//! of the server.

use crate::error::{FriendlyErrorsError, Result};
use dashmap::DashMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use strum_macros::{Display as StrumDisplay, EnumString};

/// Keys every rendered error context carries.
pub const RESERVED_CONTEXT_KEYS: [&str; 3] = ["statusCode", "error", "message"];

/// Largest request body buffered for server error logs.
pub const DEFAULT_PAYLOAD_LIMIT: usize = 64 * 1024;

const ENV_VIEW: &str = "FRIENDLY_ERRORS_VIEW";
const ENV_URL: &str = "FRIENDLY_ERRORS_URL";
const ENV_CONTEXT: &str = "FRIENDLY_ERRORS_CONTEXT";
const ENV_LOG_ERRORS: &str = "FRIENDLY_ERRORS_LOG_ERRORS";
const ENV_BLACKLIST: &str = "FRIENDLY_ERRORS_BLACKLIST";
const ENV_RESERVED_KEYS: &str = "FRIENDLY_ERRORS_RESERVED_KEYS";
const ENV_REQUIRE_TARGET: &str = "FRIENDLY_ERRORS_REQUIRE_TARGET";
const ENV_PLAIN_ERRORS: &str = "FRIENDLY_ERRORS_PLAIN_ERRORS";
const ENV_PAYLOAD_LIMIT: &str = "FRIENDLY_ERRORS_PAYLOAD_LIMIT";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Snapshot of the process environment.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse a value, treating blank values as unset.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| FriendlyErrorsError::invalid_value(key, e)),
            _ => Ok(None),
        }
    }
}

/// What to do when extra context uses one of [`RESERVED_CONTEXT_KEYS`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReservedKeyPolicy {
    /// Refuse the configuration at registration.
    #[default]
    Reject,
    /// Extra context replaces the built-in value.
    Override,
    /// Built-in value wins, the extra key is dropped.
    Preserve,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FriendlyErrorsConfig {
    #[serde(alias = "view")]
    pub view_name: Option<String>,
    #[serde(alias = "url")]
    pub forward_url: Option<String>,
    #[serde(alias = "context")]
    pub extra_context: Map<String, Value>,
    #[serde(alias = "logErrors")]
    pub log_server_errors: bool,
    #[serde(alias = "errorBlacklist")]
    pub blacklist_pattern: Option<String>,
    pub reserved_keys: ReservedKeyPolicy,
    /// Fail registration when neither a view nor a forward url is set.
    pub require_target: bool,
    /// Treat non-Boom responses with an error status as errors.
    pub intercept_plain_errors: bool,
    pub payload_limit: usize,
}

impl Default for FriendlyErrorsConfig {
    fn default() -> Self {
        Self {
            view_name: None,
            forward_url: None,
            extra_context: Map::new(),
            log_server_errors: false,
            blacklist_pattern: None,
            reserved_keys: ReservedKeyPolicy::default(),
            require_target: false,
            intercept_plain_errors: true,
            payload_limit: DEFAULT_PAYLOAD_LIMIT,
        }
    }
}

impl FriendlyErrorsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(mut self, view_name: impl Into<String>) -> Self {
        self.view_name = Some(view_name.into());
        self
    }

    pub fn forward_url(mut self, url: impl Into<String>) -> Self {
        self.forward_url = Some(url.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_context.insert(key.into(), value.into());
        self
    }

    pub fn log_server_errors(mut self, enabled: bool) -> Self {
        self.log_server_errors = enabled;
        self
    }

    pub fn blacklist(mut self, pattern: impl Into<String>) -> Self {
        self.blacklist_pattern = Some(pattern.into());
        self
    }

    pub fn reserved_keys(mut self, policy: ReservedKeyPolicy) -> Self {
        self.reserved_keys = policy;
        self
    }

    pub fn require_target(mut self, required: bool) -> Self {
        self.require_target = required;
        self
    }

    pub fn intercept_plain_errors(mut self, enabled: bool) -> Self {
        self.intercept_plain_errors = enabled;
        self
    }

    pub fn payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = limit;
        self
    }

    /// Read `FRIENDLY_ERRORS_*` keys from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_config_service(&ConfigService::new())
    }

    /// Read `FRIENDLY_ERRORS_*` keys, leaving defaults for unset ones.
    ///
    /// `FRIENDLY_ERRORS_CONTEXT` must hold a JSON object.
    pub fn from_config_service(service: &ConfigService) -> Result<Self> {
        let mut config = Self::default();

        config.view_name = service.get_parsed(ENV_VIEW)?;
        config.forward_url = service.get_parsed(ENV_URL)?;
        config.blacklist_pattern = service.get_parsed(ENV_BLACKLIST)?;

        if let Some(raw) = service.get_parsed::<String>(ENV_CONTEXT)? {
            config.extra_context = serde_json::from_str(&raw)
                .map_err(|e| FriendlyErrorsError::invalid_value(ENV_CONTEXT, e))?;
        }
        if let Some(enabled) = service.get_parsed(ENV_LOG_ERRORS)? {
            config.log_server_errors = enabled;
        }
        if let Some(policy) = service.get_parsed(ENV_RESERVED_KEYS)? {
            config.reserved_keys = policy;
        }
        if let Some(required) = service.get_parsed(ENV_REQUIRE_TARGET)? {
            config.require_target = required;
        }
        if let Some(enabled) = service.get_parsed(ENV_PLAIN_ERRORS)? {
            config.intercept_plain_errors = enabled;
        }
        if let Some(limit) = service.get_parsed(ENV_PAYLOAD_LIMIT)? {
            config.payload_limit = limit;
        }

        Ok(config)
    }

    /// Check the configuration once and freeze it.
    pub fn validate(self) -> Result<InterceptorConfig> {
        if self.require_target && self.view_name.is_none() && self.forward_url.is_none() {
            return Err(FriendlyErrorsError::MissingTarget);
        }

        if self.reserved_keys == ReservedKeyPolicy::Reject {
            if let Some(key) = RESERVED_CONTEXT_KEYS
                .iter()
                .find(|key| self.extra_context.contains_key(**key))
            {
                return Err(FriendlyErrorsError::ReservedContextKey {
                    key: (*key).to_string(),
                });
            }
        }

        let blacklist = self
            .blacklist_pattern
            .map(|pattern| {
                Regex::new(&pattern)
                    .map_err(|source| FriendlyErrorsError::InvalidBlacklistPattern { pattern, source })
            })
            .transpose()?;

        let forward_url = self.forward_url.map(ForwardUrl::parse).transpose()?;

        Ok(InterceptorConfig {
            view_name: self.view_name,
            forward_url,
            extra_context: self.extra_context,
            log_server_errors: self.log_server_errors,
            blacklist,
            reserved_keys: self.reserved_keys,
            intercept_plain_errors: self.intercept_plain_errors,
            payload_limit: self.payload_limit,
        })
    }
}

/// An internal route errors are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardUrl {
    path: String,
    query: Option<String>,
}

impl ForwardUrl {
    pub fn parse(url: String) -> Result<Self> {
        if !url.starts_with('/') {
            return Err(FriendlyErrorsError::InvalidForwardUrl {
                url,
                message: "must be an absolute path on this server".to_string(),
            });
        }
        if url.contains('#') {
            return Err(FriendlyErrorsError::InvalidForwardUrl {
                url,
                message: "fragments are not allowed".to_string(),
            });
        }

        let (path, query) = match url.split_once('?') {
            Some((path, query)) if !query.is_empty() => (path.to_string(), Some(query.to_string())),
            Some((path, _)) => (path.to_string(), None),
            None => (url, None),
        };
        Ok(Self { path, query })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `<path>?statusCode=..&error=..&message=..`, form-urlencoded.
    pub fn with_error_query(&self, status_code: u16, error: &str, message: &str) -> String {
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("statusCode", &status_code.to_string())
            .append_pair("error", error)
            .append_pair("message", message)
            .finish();

        match &self.query {
            Some(existing) => format!("{}?{}&{}", self.path, existing, params),
            None => format!("{}?{}", self.path, params),
        }
    }
}

/// Validated, read-only configuration shared by every request.
#[derive(Debug)]
pub struct InterceptorConfig {
    view_name: Option<String>,
    forward_url: Option<ForwardUrl>,
    extra_context: Map<String, Value>,
    log_server_errors: bool,
    blacklist: Option<Regex>,
    reserved_keys: ReservedKeyPolicy,
    intercept_plain_errors: bool,
    payload_limit: usize,
}

impl InterceptorConfig {
    pub fn view_name(&self) -> Option<&str> {
        self.view_name.as_deref()
    }

    pub fn forward_url(&self) -> Option<&ForwardUrl> {
        self.forward_url.as_ref()
    }

    pub fn extra_context(&self) -> &Map<String, Value> {
        &self.extra_context
    }

    pub fn log_server_errors(&self) -> bool {
        self.log_server_errors
    }

    pub fn is_blacklisted(&self, path: &str) -> bool {
        self.blacklist
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(path))
    }

    pub fn reserved_keys(&self) -> ReservedKeyPolicy {
        self.reserved_keys
    }

    pub fn intercept_plain_errors(&self) -> bool {
        self.intercept_plain_errors
    }

    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_falls_back_without_target() {
        let config = FriendlyErrorsConfig::new().validate().unwrap();
        assert!(config.view_name().is_none());
        assert!(config.forward_url().is_none());
        assert!(config.intercept_plain_errors());
        assert_eq!(config.payload_limit(), DEFAULT_PAYLOAD_LIMIT);
    }

    #[test]
    fn test_require_target_fails_fast() {
        let err = FriendlyErrorsConfig::new()
            .log_server_errors(true)
            .require_target(true)
            .validate()
            .unwrap_err();
        assert!(matches!(err, FriendlyErrorsError::MissingTarget));

        assert!(
            FriendlyErrorsConfig::new()
                .require_target(true)
                .view("error")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_malformed_blacklist_is_rejected() {
        let err = FriendlyErrorsConfig::new().blacklist("^/api/(").validate().unwrap_err();
        assert!(matches!(err, FriendlyErrorsError::InvalidBlacklistPattern { .. }));
    }

    #[test]
    fn test_blacklist_matches_path() {
        let config = FriendlyErrorsConfig::new().blacklist("^/api/").validate().unwrap();
        assert!(config.is_blacklisted("/api/users"));
        assert!(!config.is_blacklisted("/users"));
    }

    #[test]
    fn test_reserved_keys_policy() {
        let err = FriendlyErrorsConfig::new()
            .context("message", "mine")
            .validate()
            .unwrap_err();
        assert!(matches!(err, FriendlyErrorsError::ReservedContextKey { ref key } if key == "message"));

        let config = FriendlyErrorsConfig::new()
            .context("message", "mine")
            .reserved_keys(ReservedKeyPolicy::Override)
            .validate()
            .unwrap();
        assert_eq!(config.reserved_keys(), ReservedKeyPolicy::Override);
    }

    #[test]
    fn test_deserialize_accepts_short_option_names() {
        let config: FriendlyErrorsConfig = serde_json::from_value(serde_json::json!({
            "view": "error",
            "logErrors": true,
            "errorBlacklist": "^/api",
            "context": { "someData": "VALUE" },
            "reservedKeys": "preserve"
        }))
        .unwrap();

        assert_eq!(config.view_name.as_deref(), Some("error"));
        assert!(config.log_server_errors);
        assert_eq!(config.blacklist_pattern.as_deref(), Some("^/api"));
        assert_eq!(config.extra_context["someData"], "VALUE");
        assert_eq!(config.reserved_keys, ReservedKeyPolicy::Preserve);
        assert!(config.intercept_plain_errors);
    }

    #[test]
    fn test_from_config_service() {
        let service = ConfigService::default();
        service.set(ENV_URL, "/error");
        service.set(ENV_LOG_ERRORS, "true");
        service.set(ENV_CONTEXT, r#"{"brand":"Acme"}"#);
        service.set(ENV_RESERVED_KEYS, "Override");
        service.set(ENV_PAYLOAD_LIMIT, "1024");
        service.set(ENV_VIEW, "  ");

        let config = FriendlyErrorsConfig::from_config_service(&service).unwrap();
        assert_eq!(config.forward_url.as_deref(), Some("/error"));
        assert!(config.view_name.is_none());
        assert!(config.log_server_errors);
        assert_eq!(config.extra_context["brand"], "Acme");
        assert_eq!(config.reserved_keys, ReservedKeyPolicy::Override);
        assert_eq!(config.payload_limit, 1024);
    }

    #[test]
    fn test_from_config_service_rejects_bad_values() {
        let service = ConfigService::default();
        service.set(ENV_LOG_ERRORS, "sometimes");
        let err = FriendlyErrorsConfig::from_config_service(&service).unwrap_err();
        assert!(matches!(err, FriendlyErrorsError::InvalidValue { ref key, .. } if key == ENV_LOG_ERRORS));

        let service = ConfigService::default();
        service.set(ENV_CONTEXT, "[1, 2]");
        assert!(FriendlyErrorsConfig::from_config_service(&service).is_err());
    }

    #[test]
    fn test_forward_url_query() {
        let url = ForwardUrl::parse("/error".to_string()).unwrap();
        assert_eq!(
            url.with_error_query(404, "Not Found", "not found here"),
            "/error?statusCode=404&error=Not+Found&message=not+found+here"
        );

        let url = ForwardUrl::parse("/error?theme=dark".to_string()).unwrap();
        assert_eq!(url.path(), "/error");
        assert_eq!(
            url.with_error_query(403, "Forbidden", "a&b"),
            "/error?theme=dark&statusCode=403&error=Forbidden&message=a%26b"
        );
    }

    #[test]
    fn test_forward_url_must_be_internal() {
        assert!(ForwardUrl::parse("https://example.com/error".to_string()).is_err());
        assert!(ForwardUrl::parse("/error#top".to_string()).is_err());
    }
}
