//! HTTP fetch capability.
//!
//! The [`Fetcher`] trait is the only way the rest of the crate touches the
//! network: page fetches for pattern matching and raw byte fetches for image
//! downloads both go through [`Fetcher::get`]. The production implementation
//! is [`HttpFetcher`] (blocking `reqwest`); tests use a recording mock.
//!
//! Every call is a single attempt. There is no retry and no timeout beyond
//! the client's defaults.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Transport(String),
    #[error("Invalid CA bundle {path}: {message}")]
    CaBundle { path: String, message: String },
}

/// A completed HTTP exchange. Any status code counts as completed; callers
/// decide which codes they accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Reason phrase for the status (`"Not Found"`), empty when unknown.
    pub reason: String,
    pub body: Vec<u8>,
}

impl Response {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Request headers as `(name, value)` pairs, sent in order.
pub type Headers<'a> = [(&'a str, &'a str)];

/// Injected fetch capability.
pub trait Fetcher {
    /// Perform one GET request.
    fn get(&self, url: &str, headers: &Headers<'_>) -> Result<Response, FetchError>;
}

/// Build the header list shared by page and image requests.
pub fn request_headers<'a>(
    user_agent: Option<&'a str>,
    referer: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    let mut headers = Vec::new();
    if let Some(referer) = referer {
        headers.push(("Referer", referer));
    }
    if let Some(ua) = user_agent {
        headers.push(("User-Agent", ua));
    }
    headers
}

/// Blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::build(None)
    }

    /// Trust only the certificates in the given PEM bundle. The built-in
    /// roots are switched off.
    pub fn with_ca_bundle(path: &Path) -> Result<Self, FetchError> {
        Self::build(Some(path))
    }

    fn build(ca_bundle: Option<&Path>) -> Result<Self, FetchError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(path) = ca_bundle {
            builder = builder.tls_built_in_root_certs(false);
            for cert in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

/// Read every certificate from a PEM bundle. A bundle without any is an
/// error, since it would leave nothing to trust.
fn load_ca_bundle(path: &Path) -> Result<Vec<reqwest::Certificate>, FetchError> {
    let bundle_error = |message: String| FetchError::CaBundle {
        path: path.display().to_string(),
        message,
    };
    let pem = std::fs::read(path)?;
    let certs =
        reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| bundle_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(bundle_error("no certificates found".into()));
    }
    Ok(certs)
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str, headers: &Headers<'_>) -> Result<Response, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let resp = request
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Response {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned reply for one URL.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Ok(Response),
        Fail(String),
    }

    /// A request as the mock saw it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub url: String,
        pub headers: Vec<(String, String)>,
    }

    /// Mock fetcher serving canned replies by exact URL.
    /// Unknown URLs fail with a transport error.
    #[derive(Default)]
    pub struct MockFetcher {
        pub replies: Mutex<HashMap<String, MockReply>>,
        pub requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, url: &str, html: &str) -> Self {
            self.bytes(url, html.as_bytes().to_vec())
        }

        pub fn bytes(self, url: &str, body: Vec<u8>) -> Self {
            self.status(url, 200, body)
        }

        pub fn status(self, url: &str, status: u16, body: Vec<u8>) -> Self {
            self.replies.lock().unwrap().insert(
                url.to_string(),
                MockReply::Ok(Response {
                    status,
                    reason: if status == 200 { "OK" } else { "Not Found" }.to_string(),
                    body,
                }),
            );
            self
        }

        pub fn failing(self, url: &str, message: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(url.to_string(), MockReply::Fail(message.to_string()));
            self
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.url.clone())
                .collect()
        }

        pub fn header_for(&self, url: &str, name: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.url == url)
                .and_then(|r| r.headers.iter().find(|(n, _)| n == name))
                .map(|(_, v)| v.clone())
        }
    }

    impl Fetcher for MockFetcher {
        fn get(&self, url: &str, headers: &Headers<'_>) -> Result<Response, FetchError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
            });
            match self.replies.lock().unwrap().get(url) {
                Some(MockReply::Ok(resp)) => Ok(resp.clone()),
                Some(MockReply::Fail(msg)) => Err(FetchError::Transport(msg.clone())),
                None => Err(FetchError::Transport(format!("no route to {url}"))),
            }
        }
    }

    #[test]
    fn request_headers_orders_referer_first() {
        let headers = request_headers(Some("ua/1.0"), Some("https://example.com/"));
        assert_eq!(
            headers,
            vec![("Referer", "https://example.com/"), ("User-Agent", "ua/1.0")]
        );
    }

    #[test]
    fn request_headers_empty_when_nothing_set() {
        assert!(request_headers(None, None).is_empty());
    }

    #[test]
    fn response_text_is_lossy() {
        let resp = Response {
            status: 200,
            reason: "OK".into(),
            body: vec![b'a', 0xff, b'b'],
        };
        assert_eq!(resp.text(), "a\u{fffd}b");
        assert!(resp.is_ok());
    }

    #[test]
    fn mock_records_requests_and_headers() {
        let mock = MockFetcher::new().page("https://a.test/", "hello");
        let resp = mock
            .get("https://a.test/", &[("User-Agent", "x")])
            .unwrap();
        assert_eq!(resp.text(), "hello");
        assert_eq!(mock.requested_urls(), vec!["https://a.test/"]);
        assert_eq!(
            mock.header_for("https://a.test/", "User-Agent").as_deref(),
            Some("x")
        );
    }

    #[test]
    fn ca_bundle_without_certificates_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();
        let err = load_ca_bundle(&path).unwrap_err();
        assert!(matches!(err, FetchError::CaBundle { .. }), "{err:?}");
        assert!(HttpFetcher::with_ca_bundle(&path).is_err());
    }

    #[test]
    fn missing_ca_bundle_is_io_error() {
        let err = load_ca_bundle(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }

    #[test]
    fn mock_unknown_url_is_transport_error() {
        let mock = MockFetcher::new();
        let err = mock.get("https://nowhere.test/", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
