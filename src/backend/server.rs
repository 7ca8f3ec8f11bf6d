//! Upstream server addresses.

use crate::config::ConfigError;
use hyper::Uri;
use hyper::header::HeaderValue;
use hyper::http::uri::PathAndQuery;

/// One upstream server.
///
/// Parsed once from its configured base URL (`http://host[:port][/base]`)
/// and immutable afterwards. Two backends are the same backend exactly when
/// their configured URLs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Backend {
    /// The URL as configured.
    url: String,
    /// `host:port` to open the TCP connection to.
    connect_addr: String,
    /// Value for the outbound `Host` header.
    host_header: HeaderValue,
    /// Base path prefixed to every forwarded path, without trailing slash.
    base_path: String,
}

impl Backend {
    /// Parse a backend base URL.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBackend {
            backend: url.to_string(),
            reason,
        };

        let uri: Uri = url.parse().map_err(|e| invalid(format!("{}", e)))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(format!("unsupported scheme '{}'", other))),
            None => return Err(invalid("missing http:// scheme".to_string())),
        }

        let authority = uri
            .authority()
            .ok_or_else(|| invalid("missing host".to_string()))?;

        if authority.host().is_empty() {
            return Err(invalid("missing host".to_string()));
        }

        if uri.query().is_some() {
            return Err(invalid("query strings are not allowed".to_string()));
        }

        let port = authority.port_u16().unwrap_or(80);
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|e| invalid(format!("{}", e)))?;

        Ok(Self {
            url: url.to_string(),
            connect_addr: format!("{}:{}", authority.host(), port),
            host_header,
            base_path: uri.path().trim_end_matches('/').to_string(),
        })
    }

    /// The configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Socket address string (`host:port`) to connect to.
    pub fn connect_addr(&self) -> &str {
        &self.connect_addr
    }

    /// `Host` header value for requests sent to this backend.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Origin-form URI for a forwarded request: the backend's base path
    /// followed by the inbound path and query.
    pub fn target_uri(
        &self,
        path_and_query: Option<&PathAndQuery>,
    ) -> Result<Uri, hyper::http::uri::InvalidUri> {
        let pq = path_and_query.map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.base_path, pq).parse()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
