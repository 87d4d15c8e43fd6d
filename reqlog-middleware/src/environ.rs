//! Request metadata handed to applications.
//!
//! An [`Environ`] is an ordered key/value map. Upper-case keys are CGI-style
//! variables (`REQUEST_METHOD`, `PATH_INFO`, `HTTP_HOST`, ...). Everything
//! else is a framework variable such as `reqlog.id`. Keys under `server.`
//! describe the hosting server and are left out of log entries.

use http::Request;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::fmt;

/// Correlation id attached by the response logger.
pub const REQLOG_ID: &str = "reqlog.id";
/// Unix timestamp (seconds, float) recorded when the logger saw the request.
pub const REQLOG_REQUEST_BEGIN: &str = "reqlog.request_begin";

pub const URL_SCHEME: &str = "server.url_scheme";
pub const MULTITHREAD: &str = "server.multithread";
pub const MULTIPROCESS: &str = "server.multiprocess";
pub const RUN_ONCE: &str = "server.run_once";
pub const SERVER_VERSION: &str = "server.version";

/// Protocol version assumed when `server.version` is absent.
const DEFAULT_SERVER_VERSION: &str = "1.0";

/// Server plumbing keys never rendered in log entries.
const HIDDEN_VARS: &[&str] = &[URL_SCHEME, MULTITHREAD, MULTIPROCESS, RUN_ONCE, SERVER_VERSION];

/// Characters left as-is when quoting URL paths.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// A single environ value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Text(String),
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl EnvValue {
    /// Empty text, zero and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            EnvValue::Text(s) => !s.is_empty(),
            EnvValue::Int(n) => *n != 0,
            EnvValue::Unsigned(n) => *n != 0,
            EnvValue::Float(f) => *f != 0.0,
            EnvValue::Bool(b) => *b,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EnvValue::Float(f) => Some(*f),
            EnvValue::Int(n) => Some(*n as f64),
            EnvValue::Unsigned(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            EnvValue::Unsigned(n) => Some(*n),
            EnvValue::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(s) => f.write_str(s),
            EnvValue::Int(n) => write!(f, "{n}"),
            EnvValue::Unsigned(n) => write!(f, "{n}"),
            EnvValue::Float(v) => write!(f, "{v}"),
            EnvValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Text(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Text(s)
    }
}

impl From<i64> for EnvValue {
    fn from(n: i64) -> Self {
        EnvValue::Int(n)
    }
}

impl From<u64> for EnvValue {
    fn from(n: u64) -> Self {
        EnvValue::Unsigned(n)
    }
}

impl From<f64> for EnvValue {
    fn from(v: f64) -> Self {
        EnvValue::Float(v)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Bool(b)
    }
}

/// How the hosting server runs, used when building an environ from an
/// [`http::Request`].
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub port: u16,
    pub url_scheme: String,
    pub multithread: bool,
    pub multiprocess: bool,
    /// The server handles one request per process, CGI style.
    pub run_once: bool,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "localhost".into(),
            port: 80,
            url_scheme: "http".into(),
            multithread: true,
            multiprocess: false,
            run_once: false,
        }
    }
}

/// Ordered request metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environ {
    vars: Vec<(String, EnvValue)>,
}

impl Environ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.vars.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.vars.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value of `key`, if it is text.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(EnvValue::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<EnvValue> {
        let pos = self.vars.iter().position(|(k, _)| k == key)?;
        Some(self.vars.remove(pos).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Build the CGI-style view of an HTTP request.
    pub fn from_request<B>(req: &Request<B>, server: &ServerInfo) -> Self {
        let mut env = Environ::new();

        env.insert("REQUEST_METHOD", req.method().as_str());
        env.insert("SCRIPT_NAME", "");
        env.insert(
            "PATH_INFO",
            percent_decode_str(req.uri().path())
                .decode_utf8_lossy()
                .into_owned(),
        );
        env.insert("QUERY_STRING", req.uri().query().unwrap_or(""));
        env.insert("SERVER_NAME", server.name.as_str());
        env.insert("SERVER_PORT", server.port.to_string());
        env.insert("SERVER_PROTOCOL", format!("{:?}", req.version()));

        for name in req.headers().keys() {
            let joined = req
                .headers()
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            let key = match name.as_str() {
                "content-type" => "CONTENT_TYPE".to_string(),
                "content-length" => "CONTENT_LENGTH".to_string(),
                other => format!("HTTP_{}", other.to_uppercase().replace('-', "_")),
            };
            env.insert(key, joined);
        }

        env.insert(URL_SCHEME, server.url_scheme.as_str());
        env.insert(MULTITHREAD, server.multithread);
        env.insert(MULTIPROCESS, server.multiprocess);
        env.insert(RUN_ONCE, server.run_once);
        env
    }

    /// Reconstruct the request URL.
    pub fn source_url(&self) -> String {
        let scheme = self.get_str(URL_SCHEME).unwrap_or("http");
        let default_port = if scheme == "https" { "443" } else { "80" };
        let mut url = format!("{scheme}://");

        match self.get_str("HTTP_HOST").filter(|h| !h.is_empty()) {
            Some(host) => match host.split_once(':') {
                Some((name, port)) if !port.is_empty() && port != default_port => {
                    url.push_str(name);
                    url.push(':');
                    url.push_str(port);
                }
                Some((name, _)) => url.push_str(name),
                None => url.push_str(host),
            },
            None => {
                url.push_str(self.get_str("SERVER_NAME").unwrap_or(""));
                let port = self.get("SERVER_PORT").map(|p| p.to_string()).unwrap_or_default();
                if !port.is_empty() && port != default_port {
                    url.push(':');
                    url.push_str(&port);
                }
            }
        }

        for key in ["SCRIPT_NAME", "PATH_INFO"] {
            if let Some(part) = self.get_str(key) {
                url.extend(utf8_percent_encode(part, PATH_SAFE));
            }
        }

        if let Some(query) = self.get_str("QUERY_STRING").filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Truthy upper-case variables, sorted by key.
    pub fn cgi_variables(&self) -> Vec<(&str, &EnvValue)> {
        let mut vars: Vec<(&str, &EnvValue)> = self
            .iter()
            .filter(|(k, v)| is_cgi_key(k) && v.is_truthy())
            .collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        vars
    }

    /// Framework variables in insertion order, then `server.version` when it
    /// is not the default, then a `wsgi process` line describing the
    /// concurrency model.
    pub fn wsgi_variables(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .iter()
            .filter(|(k, _)| !is_cgi_key(k) && !HIDDEN_VARS.contains(k))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(version) = self.get(SERVER_VERSION) {
            let version = version.to_string();
            if version != DEFAULT_SERVER_VERSION {
                vars.push((SERVER_VERSION.to_string(), version));
            }
        }
        vars.push(("wsgi process".to_string(), self.process_description().to_string()));
        vars
    }

    fn process_description(&self) -> &'static str {
        let flag = |key: &str| self.get(key).is_some_and(EnvValue::is_truthy);
        match (flag(MULTIPROCESS), flag(MULTITHREAD), flag(RUN_ONCE)) {
            (false, false, false) => "Non-concurrent server",
            (false, true, false) => "Multithreaded",
            (true, false, false) => "Multiprocess",
            (true, true, false) => "Multi process AND threads (?)",
            (false, false, true) => "Non-concurrent CGI",
            (false, true, true) => "Multithread CGI (?)",
            (true, false, true) => "CGI",
            (true, true, true) => "Multi thread/process CGI (?)",
        }
    }
}

fn is_cgi_key(key: &str) -> bool {
    key.to_uppercase() == key
}

impl<K: Into<String>, V: Into<EnvValue>> FromIterator<(K, V)> for Environ {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Environ::new();
        for (k, v) in iter {
            env.insert(k, v);
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Environ {
        [
            ("REQUEST_METHOD", EnvValue::from("GET")),
            ("SERVER_NAME", EnvValue::from("example.com")),
            ("SERVER_PORT", EnvValue::from("80")),
            ("PATH_INFO", EnvValue::from("/a b/c")),
            (URL_SCHEME, EnvValue::from("http")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn insert_existing_key_keeps_position() {
        let mut env = Environ::new();
        env.insert("first", "1");
        env.insert("second", "2");
        env.insert("first", "one");
        let keys: Vec<&str> = env.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["first", "second"]);
        assert_eq!(env.get_str("first"), Some("one"));
    }

    #[test]
    fn remove_returns_value() {
        let mut env = sample();
        assert_eq!(env.remove("SERVER_PORT"), Some(EnvValue::from("80")));
        assert!(!env.contains_key("SERVER_PORT"));
        assert_eq!(env.remove("SERVER_PORT"), None);
    }

    #[test]
    fn truthiness_follows_value_kind() {
        assert!(!EnvValue::from("").is_truthy());
        assert!(EnvValue::from("x").is_truthy());
        assert!(!EnvValue::Int(0).is_truthy());
        assert!(EnvValue::Unsigned(3).is_truthy());
        assert!(!EnvValue::Float(0.0).is_truthy());
        assert!(!EnvValue::Bool(false).is_truthy());
    }

    #[test]
    fn source_url_quotes_path_and_drops_default_port() {
        let env = sample();
        assert_eq!(env.source_url(), "http://example.com/a%20b/c");
    }

    #[test]
    fn source_url_keeps_non_default_port_and_query() {
        let mut env = sample();
        env.insert("SERVER_PORT", "8080");
        env.insert("QUERY_STRING", "q=1&x=2");
        assert_eq!(env.source_url(), "http://example.com:8080/a%20b/c?q=1&x=2");
    }

    #[test]
    fn source_url_prefers_http_host() {
        let mut env = sample();
        env.insert("HTTP_HOST", "api.example.com:443");
        env.insert(URL_SCHEME, "https");
        assert_eq!(env.source_url(), "https://api.example.com/a%20b/c");

        env.insert("HTTP_HOST", "api.example.com:8443");
        assert_eq!(env.source_url(), "https://api.example.com:8443/a%20b/c");
    }

    #[test]
    fn cgi_variables_sorted_and_falsy_skipped() {
        let env: Environ = [
            ("B", EnvValue::from("2")),
            ("A", EnvValue::from("1")),
            ("EMPTY", EnvValue::from("")),
            ("mixed.Case", EnvValue::from("fw")),
        ]
        .into_iter()
        .collect();
        let vars: Vec<(&str, String)> = env
            .cgi_variables()
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        assert_eq!(vars, vec![("A", "1".to_string()), ("B", "2".to_string())]);
    }

    #[test]
    fn wsgi_variables_keep_order_and_hide_server_keys() {
        let mut env = sample();
        env.insert("framework.zeta", "z");
        env.insert("framework.alpha", 7i64);
        env.insert(MULTITHREAD, true);
        let vars = env.wsgi_variables();
        assert_eq!(
            vars,
            vec![
                ("framework.zeta".to_string(), "z".to_string()),
                ("framework.alpha".to_string(), "7".to_string()),
                ("wsgi process".to_string(), "Multithreaded".to_string()),
            ]
        );
    }

    #[test]
    fn process_description_covers_all_flags() {
        let mut env = Environ::new();
        assert_eq!(env.process_description(), "Non-concurrent server");
        env.insert(MULTIPROCESS, true);
        assert_eq!(env.process_description(), "Multiprocess");
        env.insert(MULTITHREAD, true);
        assert_eq!(env.process_description(), "Multi process AND threads (?)");
        env.insert(MULTIPROCESS, false);
        assert_eq!(env.process_description(), "Multithreaded");

        env.insert(RUN_ONCE, true);
        assert_eq!(env.process_description(), "Multithread CGI (?)");
        env.insert(MULTIPROCESS, true);
        assert_eq!(env.process_description(), "Multi thread/process CGI (?)");
        env.insert(MULTITHREAD, false);
        assert_eq!(env.process_description(), "CGI");
        env.insert(MULTIPROCESS, false);
        assert_eq!(env.process_description(), "Non-concurrent CGI");
    }

    #[test]
    fn run_once_multiprocess_server_is_cgi() {
        let server = ServerInfo {
            multithread: false,
            multiprocess: true,
            run_once: true,
            ..ServerInfo::default()
        };
        let req = Request::builder().uri("/").body(()).unwrap();
        let env = Environ::from_request(&req, &server);
        assert_eq!(env.get(RUN_ONCE), Some(&EnvValue::Bool(true)));
        assert_eq!(
            env.wsgi_variables().last(),
            Some(&("wsgi process".to_string(), "CGI".to_string()))
        );
    }

    #[test]
    fn source_url_drops_empty_host_port() {
        let mut env = sample();
        env.insert("HTTP_HOST", "example.com:");
        env.insert("PATH_INFO", "/x");
        assert_eq!(env.source_url(), "http://example.com/x");
    }

    #[test]
    fn wsgi_variables_show_non_default_version() {
        let mut env = Environ::new();
        env.insert(SERVER_VERSION, "1.0");
        assert_eq!(
            env.wsgi_variables(),
            vec![("wsgi process".to_string(), "Non-concurrent server".to_string())]
        );

        env.insert(SERVER_VERSION, "2.0");
        assert_eq!(
            env.wsgi_variables(),
            vec![
                ("server.version".to_string(), "2.0".to_string()),
                ("wsgi process".to_string(), "Non-concurrent server".to_string()),
            ]
        );
    }

    #[test]
    fn from_request_maps_headers_to_cgi_names() {
        let req = Request::builder()
            .method("POST")
            .uri("http://example.com/upload%20dir/file?debug=1")
            .header("Host", "example.com:8080")
            .header("Content-Type", "text/plain")
            .header("Content-Length", "5")
            .header("X-Forwarded-For", "10.0.0.1")
            .header("Accept", "text/html")
            .header("Accept", "application/json")
            .body(())
            .unwrap();
        let server = ServerInfo {
            name: "example.com".into(),
            port: 8080,
            ..ServerInfo::default()
        };

        let env = Environ::from_request(&req, &server);
        assert_eq!(env.get_str("REQUEST_METHOD"), Some("POST"));
        assert_eq!(env.get_str("PATH_INFO"), Some("/upload dir/file"));
        assert_eq!(env.get_str("QUERY_STRING"), Some("debug=1"));
        assert_eq!(env.get_str("SERVER_PORT"), Some("8080"));
        assert_eq!(env.get_str("SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert_eq!(env.get_str("CONTENT_TYPE"), Some("text/plain"));
        assert_eq!(env.get_str("CONTENT_LENGTH"), Some("5"));
        assert_eq!(env.get_str("HTTP_HOST"), Some("example.com:8080"));
        assert_eq!(env.get_str("HTTP_X_FORWARDED_FOR"), Some("10.0.0.1"));
        assert_eq!(env.get_str("HTTP_ACCEPT"), Some("text/html,application/json"));
        assert_eq!(env.get(MULTITHREAD), Some(&EnvValue::Bool(true)));
        assert_eq!(
            env.source_url(),
            "http://example.com:8080/upload%20dir/file?debug=1"
        );
    }
}
