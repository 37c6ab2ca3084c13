//! Client configuration.
//!
//! [`Settings`] is the immutable per-client record, buildable directly or
//! from a semicolon-delimited `key=value` connection string. [`QueryOptions`]
//! carries the per-query overrides.

use crate::json_registry::JsonMode;
use crate::{
    Error,
    Result,
};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// URL scheme for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Protocol {
    fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Immutable client settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// URL scheme.
    pub protocol: Protocol,
    /// Optional path prefix under the server root.
    pub path: Option<String>,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Bearer token; when set it wins over basic auth.
    pub bearer_token: Option<String>,
    /// Default database.
    pub database: Option<String>,
    /// Enable gzip for request and response bodies.
    pub compression: bool,
    /// Send a sticky `session_id` with every request.
    pub use_session: bool,
    /// Session id; generated when `use_session` is set and none is given.
    pub session_id: Option<String>,
    /// Per-request deadline enforced by the transport.
    pub timeout: Option<Duration>,
    /// Accepted for compatibility; the host decimal representation is
    /// always the exact raw-256-bit form.
    pub use_custom_decimals: bool,
    /// Return `String` columns as raw bytes without UTF-8 validation.
    pub read_strings_as_byte_arrays: bool,
    /// How JSON columns are read.
    pub json_read_mode: JsonMode,
    /// How JSON columns are written.
    pub json_write_mode: JsonMode,
    /// Default roles activated for every query.
    pub roles: Vec<String>,
    /// Disable TLS certificate validation.
    pub skip_server_certificate_validation: bool,
    /// Extra server settings sent with every request.
    pub custom_settings: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            protocol: Protocol::Http,
            path: None,
            username: "default".to_string(),
            password: String::new(),
            bearer_token: None,
            database: None,
            compression: false,
            use_session: false,
            session_id: None,
            timeout: None,
            use_custom_decimals: false,
            read_strings_as_byte_arrays: false,
            json_read_mode: JsonMode::Binary,
            json_write_mode: JsonMode::Binary,
            roles: Vec::new(),
            skip_server_certificate_validation: false,
            custom_settings: Vec::new(),
        }
    }
}

impl Settings {
    /// Creates settings for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Default::default() }
    }

    /// Sets the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the basic-auth username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the basic-auth password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Sets a bearer token, which wins over basic auth.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Enables gzip compression both ways.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Sets the per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The base server URL, e.g. `http://host:8123/` or
    /// `https://host:8443/prefix/`.
    pub fn base_url(&self) -> Result<Url> {
        let path = match &self.path {
            Some(p) => format!("/{}/", p.trim_matches('/')),
            None => "/".to_string(),
        };
        let raw = format!(
            "{}://{}:{}{}",
            self.protocol.scheme(),
            self.host,
            self.port,
            path
        );
        Url::parse(&raw)
            .map_err(|e| Error::Config(format!("invalid server URL: {}", e)))
    }
}

impl FromStr for Settings {
    type Err = Error;

    /// Parses a semicolon-delimited `key=value` connection string. Keys are
    /// case-insensitive except for the `set_<name>` pass-through settings,
    /// which keep the setting name verbatim.
    fn from_str(s: &str) -> Result<Self> {
        let mut settings = Settings::default();
        for entry in s.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                Error::Config(format!(
                    "connection string entry '{}' is not key=value",
                    entry
                ))
            })?;
            let key = key.trim();
            let value = value.trim();

            if let Some(name) = strip_prefix_ignore_case(key, "set_") {
                settings
                    .custom_settings
                    .push((name.to_string(), value.to_string()));
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "host" => settings.host = value.to_string(),
                "port" => {
                    settings.port = value.parse().map_err(|_| {
                        Error::Config(format!("invalid port '{}'", value))
                    })?
                }
                "protocol" => {
                    settings.protocol =
                        match value.to_ascii_lowercase().as_str() {
                            "http" => Protocol::Http,
                            "https" => Protocol::Https,
                            other => {
                                return Err(Error::Config(format!(
                                    "unknown protocol '{}'",
                                    other
                                )))
                            }
                        }
                }
                "path" => settings.path = Some(value.to_string()),
                "username" | "user" => {
                    settings.username = value.to_string()
                }
                "password" => settings.password = value.to_string(),
                "bearertoken" => {
                    settings.bearer_token = Some(value.to_string())
                }
                "database" => settings.database = Some(value.to_string()),
                "compression" => {
                    settings.compression = parse_bool(key, value)?
                }
                "usesession" => {
                    settings.use_session = parse_bool(key, value)?
                }
                "sessionid" => {
                    settings.session_id = Some(value.to_string())
                }
                "timeout" => {
                    let seconds: u64 = value.parse().map_err(|_| {
                        Error::Config(format!(
                            "invalid timeout '{}', seconds expected",
                            value
                        ))
                    })?;
                    settings.timeout = Some(Duration::from_secs(seconds));
                }
                "usecustomdecimals" => {
                    settings.use_custom_decimals = parse_bool(key, value)?
                }
                "readstringsasbytearrays" => {
                    settings.read_strings_as_byte_arrays =
                        parse_bool(key, value)?
                }
                "jsonreadmode" => {
                    settings.json_read_mode = value.parse()?
                }
                "jsonwritemode" => {
                    settings.json_write_mode = value.parse()?
                }
                "roles" => {
                    settings.roles = value
                        .split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                }
                "skipservercertificatevalidation" => {
                    settings.skip_server_certificate_validation =
                        parse_bool(key, value)?
                }
                other => {
                    return Err(Error::Config(format!(
                        "unknown connection string key '{}'",
                        other
                    )))
                }
            }
        }
        Ok(settings)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::Config(format!(
            "invalid boolean '{}' for key '{}'",
            other, key
        ))),
    }
}

/// Per-query overrides of the client settings.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Explicit query id; generated when absent.
    pub query_id: Option<String>,
    /// Database override.
    pub database: Option<String>,
    /// Session override; `Some(true)` forces a session even when the client
    /// default has none.
    pub use_session: Option<bool>,
    /// Session id override.
    pub session_id: Option<String>,
    /// Bearer token override.
    pub bearer_token: Option<String>,
    /// Roles override; replaces the client default when non-empty.
    pub roles: Vec<String>,
    /// Extra server settings for this query.
    pub custom_settings: Vec<(String, String)>,
    /// Extra request headers. `Connection`, `Authorization` and
    /// `User-Agent` are silently dropped.
    pub custom_headers: Vec<(String, String)>,
    /// Server-side execution ceiling, forwarded as `max_execution_time`.
    pub max_execution_time: Option<Duration>,
    /// Cancellation signal propagated into the request and body stream.
    pub cancellation: Option<CancellationToken>,
}

impl QueryOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query id.
    pub fn query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    /// Sets the database override.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Adds one custom server setting.
    pub fn setting(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.custom_settings.push((name.into(), value.into()));
        self
    }

    /// Adds one custom header.
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the server-side execution ceiling.
    pub fn max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    /// Attaches a cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_round() {
        let s: Settings =
            "Host=ch.example.com;Port=8443;Protocol=https;Username=alice;\
             Password=secret;Database=metrics;Compression=true;\
             UseSession=true;Timeout=30;Roles=admin, reader;\
             set_max_threads=4;ReadStringsAsByteArrays=1"
                .parse()
                .unwrap();
        assert_eq!(s.host, "ch.example.com");
        assert_eq!(s.port, 8443);
        assert_eq!(s.protocol, Protocol::Https);
        assert_eq!(s.username, "alice");
        assert_eq!(s.database.as_deref(), Some("metrics"));
        assert!(s.compression);
        assert!(s.use_session);
        assert_eq!(s.timeout, Some(Duration::from_secs(30)));
        assert_eq!(s.roles, vec!["admin", "reader"]);
        assert_eq!(
            s.custom_settings,
            vec![("max_threads".to_string(), "4".to_string())]
        );
        assert!(s.read_strings_as_byte_arrays);
    }

    #[test]
    fn test_connection_string_errors() {
        assert!("Host".parse::<Settings>().is_err());
        assert!("Port=notanumber".parse::<Settings>().is_err());
        assert!("Whatever=1".parse::<Settings>().is_err());
        assert!("Compression=maybe".parse::<Settings>().is_err());
    }

    #[test]
    fn test_keys_case_insensitive_except_set() {
        let s: Settings =
            "HOST=h;poRT=9000;SET_send_logs_level=trace".parse().unwrap();
        assert_eq!(s.host, "h");
        assert_eq!(s.port, 9000);
        assert_eq!(s.custom_settings[0].0, "send_logs_level");
    }

    #[test]
    fn test_base_url() {
        let s = Settings::new("example.org", 8123);
        assert_eq!(s.base_url().unwrap().as_str(), "http://example.org:8123/");

        let mut s = Settings::new("example.org", 8443);
        s.protocol = Protocol::Https;
        s.path = Some("clickhouse".to_string());
        assert_eq!(
            s.base_url().unwrap().as_str(),
            "https://example.org:8443/clickhouse/"
        );
    }

    #[test]
    fn test_bearer_wins_is_recorded() {
        let s: Settings = "BearerToken=tok".parse().unwrap();
        assert_eq!(s.bearer_token.as_deref(), Some("tok"));
    }
}
