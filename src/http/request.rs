//! HTTP/1.0 requests: URL parsing, wire formatting, server-side parsing and
//! redirect targets.

use std::fmt;
use std::str::FromStr;

use crate::core::constants::{DEFAULT_HTTP_PORT, EOL, HTTP_VERSION};
use crate::core::{Error, Result};

/// Supported request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Fetch a resource.
    Get,
    /// Store a body at a resource.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            _ => Err(Error::MalformedRequest(format!("unsupported method {s:?}"))),
        }
    }
}

/// One request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Host name or address; sent in the `Host` header.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Absolute path, always starting with `/`.
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Extra headers in send order.
    pub headers: Vec<(String, String)>,
    /// Body; only sent for POST.
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Build a GET request for `url`.
    pub fn get(url: &str) -> Result<Self> {
        Self::parse_url(Method::Get, url)
    }

    /// Build a POST request for `url` carrying `body`.
    pub fn post(url: &str, body: impl Into<Vec<u8>>) -> Result<Self> {
        let mut request = Self::parse_url(Method::Post, url)?;
        request.body = Some(body.into());
        Ok(request)
    }

    /// Parse `http://host[:port][/path][?query]`. The port defaults to 8080.
    pub fn parse_url(method: Method, url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| Error::InvalidUrl(format!("{url}: only http:// URLs are supported")))?;

        let (authority, target) = match rest.find(['/', '?']) {
            Some(at) => rest.split_at(at),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(Error::InvalidUrl(format!("{url}: missing host")));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidUrl(format!("{url}: bad port {port:?}")))?;
                (host, port)
            }
            None => (authority, DEFAULT_HTTP_PORT),
        };

        let (path, query) = split_target(target);
        Ok(Self {
            method,
            host: host.to_string(),
            port,
            path,
            query,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path plus query, as it appears in the request line.
    pub fn target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Serialize to the request payload.
    ///
    /// `METHOD SP TARGET SP HTTP/1.0 CRLF`, `Host` and the extra headers one
    /// per line, then for a POST an empty line followed by the body and CRLF,
    /// and a final CRLF.
    pub fn format(&self) -> Vec<u8> {
        let mut head = format!("{} {} {HTTP_VERSION}{EOL}", self.method, self.target());
        head.push_str(&format!("Host: {}{EOL}", self.host));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}{EOL}"));
        }

        let mut bytes = head.into_bytes();
        if self.method == Method::Post {
            bytes.extend_from_slice(EOL.as_bytes());
            bytes.extend_from_slice(self.body.as_deref().unwrap_or_default());
            bytes.extend_from_slice(EOL.as_bytes());
        }
        bytes.extend_from_slice(EOL.as_bytes());
        bytes
    }

    /// Only GET requests follow redirects.
    pub fn is_redirectable(&self) -> bool {
        self.method == Method::Get
    }

    /// The request to send after a redirect to `location`.
    ///
    /// An absolute `http://` location replaces host, port and target; a path
    /// keeps the current host and port. Headers carry over.
    pub fn redirect_to(&self, location: &str) -> Result<Self> {
        let location = location.trim();
        let mut next = if location.starts_with("http://") {
            Self::parse_url(self.method, location)?
        } else if location.starts_with('/') {
            let (path, query) = split_target(location);
            Self {
                path,
                query,
                ..self.clone()
            }
        } else {
            return Err(Error::InvalidUrl(format!("unusable redirect location {location:?}")));
        };
        next.headers = self.headers.clone();
        next.body = self.body.clone();
        Ok(next)
    }

    /// Parse a request payload as received by the server.
    ///
    /// Host and port come from the `Host` header when present. The body is
    /// whatever follows the blank line, minus the trailing CRLF pair the
    /// client appends; a `Content-Length` header truncates it further.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let (head, body) = match text.split_once("\r\n\r\n") {
            Some((head, body)) => (head, Some(body)),
            None => (text.trim_end_matches(EOL), None),
        };

        let mut lines = head.split(EOL);
        let request_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::MalformedRequest("empty request".into()))?;

        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::MalformedRequest(format!("bad request line {request_line:?}")));
        };
        if !version.starts_with("HTTP/") {
            return Err(Error::MalformedRequest(format!("bad version {version:?}")));
        }
        let method: Method = method.parse()?;
        if !target.starts_with('/') {
            return Err(Error::MalformedRequest(format!("bad target {target:?}")));
        }
        let (path, query) = split_target(target);

        let mut headers = Vec::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::MalformedRequest(format!("bad header {line:?}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut request = Self {
            method,
            host: String::new(),
            port: DEFAULT_HTTP_PORT,
            path,
            query,
            headers,
            body: None,
        };
        if let Some(host) = request.header("Host").map(str::to_string) {
            let port = host
                .rsplit_once(':')
                .and_then(|(name, port)| Some((name, port.parse::<u16>().ok()?)));
            match port {
                Some((name, port)) => {
                    request.host = name.to_string();
                    request.port = port;
                }
                None => request.host = host,
            }
        }

        if let Some(body) = body {
            let mut body = body.strip_suffix("\r\n\r\n").unwrap_or(body).as_bytes().to_vec();
            let declared = request
                .header("Content-Length")
                .and_then(|value| value.parse::<usize>().ok());
            if let Some(length) = declared {
                body.truncate(length);
            }
            request.body = Some(body);
        }
        Ok(request)
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (target, None),
    };
    let path = if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    };
    (path, query)
}
