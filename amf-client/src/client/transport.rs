//! The HTTP boundary of a session
use log::{trace, warn};
use std::time::Duration;
use thiserror::Error;

/// An HTTP proxy that requests are routed through
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    /// Host name or address of the proxy
    pub host: String,

    /// Port of the proxy
    pub port: u16,
}

impl ProxyConfig {
    /// A proxy at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The proxy as an `http` url
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// An HTTP POST to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// The gateway url
    pub url: String,

    /// Request headers, in the order they are sent
    pub headers: Vec<(String, String)>,

    /// The encoded AMF packet
    pub body: Vec<u8>,

    /// The proxy to route the request through
    pub proxy: Option<ProxyConfig>,
}

impl HttpRequest {
    /// The first value of a header, names are compared case insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The answer of the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// The status code
    pub status: u16,

    /// The reason phrase of the status
    pub reason: String,

    /// Response headers, a name may repeat
    pub headers: Vec<(String, String)>,

    /// The response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Every value of a header, names are compared case insensitively
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Errors raised before an HTTP response was received
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP exchange failed
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Performs the HTTP exchange of a call
pub trait Transport {
    /// Send a request and wait for the whole response
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Release any held resources, the transport stays usable
    fn close(&mut self) {}
}

/// A blocking [`Transport`] built on `reqwest`
///
/// The client is built on first use and rebuilt whenever the proxy changes.
#[derive(Default)]
pub struct ReqwestTransport {
    client: Option<(Option<ProxyConfig>, reqwest::blocking::Client)>,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// A transport whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: None,
            timeout: Some(timeout),
        }
    }

    fn client(
        &mut self,
        proxy: &Option<ProxyConfig>,
    ) -> Result<&reqwest::blocking::Client, TransportError> {
        let reusable = matches!(&self.client, Some((p, _)) if p == proxy);
        if !reusable {
            let mut builder = reqwest::blocking::Client::builder().no_proxy();
            if let Some(proxy) = proxy {
                builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
            }
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            self.client = Some((proxy.clone(), builder.build()?));
        }

        match &self.client {
            Some((_, client)) => Ok(client),
            None => Err(TransportError::InvalidRequest(
                "HTTP client unavailable".to_string(),
            )),
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client(&request.proxy)?;

        let mut builder = client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().inspect_err(|e| {
            warn!("POST {} failed: {}", request.url, e);
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes()?.to_vec();
        trace!("POST {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }

    fn close(&mut self) {
        self.client = None;
    }
}
