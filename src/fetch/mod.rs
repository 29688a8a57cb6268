//! Request and response model for intercepted fetches
//!
//! Mirrors the subset of the Fetch API the offline cache needs: the request
//! method, URL and destination, and a fully buffered response snapshot.

mod network;

pub use network::{HttpNetwork, Network};

use crate::error::{ShellcacheError, ShellcacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use ureq::http::{Method, Uri};

/// Scheme, host and port of a URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Parse the origin of an absolute URL
    pub fn parse(url: &str) -> ShellcacheResult<Self> {
        let uri: Uri = encode_path(strip_fragment(url))
            .parse()
            .map_err(|e: ureq::http::uri::InvalidUri| ShellcacheError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Self::of(&uri, url)
    }

    fn of(uri: &Uri, raw: &str) -> ShellcacheResult<Self> {
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| ShellcacheError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing scheme".to_string(),
            })?
            .to_ascii_lowercase();
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ShellcacheError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_ascii_lowercase();

        let port = match (scheme.as_str(), uri.port_u16()) {
            ("http", Some(80)) | ("https", Some(443)) => None,
            (_, port) => port,
        };

        Ok(Self { scheme, host, port })
    }

    /// URL scheme (lowercase)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name (lowercase)
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

/// The site whose requests are intercepted
#[derive(Debug, Clone)]
pub struct Site {
    /// Origin the site is served from
    pub origin: Origin,
    /// Path prefix owned by the site (e.g. `/EAD-web/`)
    pub scope: String,
    /// Document served when a navigation fails offline
    pub entry_point: String,
}

impl Site {
    /// Create a site from its origin URL, scope prefix and entry point path
    pub fn new(
        origin: &str,
        scope: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> ShellcacheResult<Self> {
        Ok(Self {
            origin: Origin::parse(origin)?,
            scope: scope.into(),
            entry_point: entry_point.into(),
        })
    }

    /// Resolve a root-relative path into an absolute, encoded URL
    pub fn resolve(&self, path: &str) -> String {
        if path.contains("://") {
            return encode_path(path);
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("{}{}", self.origin, encode_path(&path))
    }

    /// Cache key of the entry point document
    pub fn entry_point_key(&self) -> String {
        self.resolve(&self.entry_point)
    }

    /// Whether a request path falls under the site scope
    pub fn in_scope(&self, path: &str) -> bool {
        path.starts_with(&encode_path(&self.scope))
    }
}

/// Percent-encode the bytes of a URL that are not legal in a URI.
///
/// Existing `%XX` escapes are kept, so encoding is idempotent.
pub fn encode_path(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        let allowed = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'-' | b'.'
                    | b'_'
                    | b'~'
                    | b'!'
                    | b'$'
                    | b'&'
                    | b'\''
                    | b'('
                    | b')'
                    | b'*'
                    | b'+'
                    | b','
                    | b';'
                    | b'='
                    | b':'
                    | b'@'
                    | b'/'
                    | b'?'
                    | b'%'
                    | b'['
                    | b']'
            );
        if allowed {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

/// Normalize an absolute URL into the key used by the cache store.
///
/// Drops the fragment, lowercases scheme and host, removes default ports
/// and turns an empty path into `/`.
pub fn cache_key(url: &str) -> ShellcacheResult<String> {
    let encoded = encode_path(strip_fragment(url));
    let uri: Uri = encoded
        .parse()
        .map_err(|e: ureq::http::uri::InvalidUri| ShellcacheError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let origin = Origin::of(&uri, url)?;
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    let path_and_query = if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{}", path_and_query)
    };
    Ok(format!("{}{}", origin, path_and_query))
}

/// What kind of resource a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    Empty,
    Other,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Self::Document,
            "image" => Self::Image,
            "script" => Self::Script,
            "style" => Self::Style,
            "font" => Self::Font,
            "manifest" => Self::Manifest,
            "empty" | "" => Self::Empty,
            _ => Self::Other,
        }
    }

    /// Guess the destination from an `Accept` header
    pub fn from_accept(value: &str) -> Self {
        let value = value.to_ascii_lowercase();
        if value.contains("text/html") {
            Self::Document
        } else if value.starts_with("image/") {
            Self::Image
        } else if value.contains("text/css") {
            Self::Style
        } else {
            Self::Empty
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Script => "script",
            Self::Style => "style",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Empty => "empty",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// An outgoing request as seen by the interceptor
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    origin: Origin,
    path: String,
    destination: Destination,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    /// Create a request for an absolute URL
    pub fn new(method: Method, url: &str) -> ShellcacheResult<Self> {
        let key = cache_key(url)?;
        let origin = Origin::parse(&key)?;
        let path = key[origin.to_string().len()..]
            .split('?')
            .next()
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            method,
            url: key,
            origin,
            path,
            destination: Destination::Empty,
            headers: Vec::new(),
            body: Vec::new(),
        })
    }

    /// Create a GET request
    pub fn get(url: &str) -> ShellcacheResult<Self> {
        Self::new(Method::GET, url)
    }

    /// Create a top-level navigation request
    pub fn navigate(url: &str) -> ShellcacheResult<Self> {
        Ok(Self::get(url)?.with_destination(Destination::Document))
    }

    /// Set the request destination
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized absolute URL, also the cache key
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// URL path without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// How a response may be read, after the Fetch response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response readable by the page
    Cors,
    /// Cross-origin response the page cannot read
    Opaque,
    /// Response constructed locally
    Default,
    /// Network error
    Error,
}

/// A fully buffered response snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Create a locally constructed response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            kind: ResponseKind::Default,
            url: String::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// The empty placeholder returned for images that cannot be fetched
    pub fn not_found() -> Self {
        Self::new(404, Vec::new())
    }

    /// Status is in the 2xx range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
