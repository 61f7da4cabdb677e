//! A client for invoking remote operations on an AMF gateway over HTTP
//!
//! ```no_run
//! use amf_client::client::AmfConnection;
//! use amf_client::types::Value;
//!
//! let mut connection = AmfConnection::new();
//! connection.connect("http://localhost:8400/team/messagebroker/amf")?;
//! let result = connection.call("remoting_AMF.echoString", vec![Value::from("hello")])?;
//! assert_eq!(result.as_str(), Some("hello"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Cookies set by the broker
pub mod cookies;
/// Request and response packets
pub mod envelope;
/// Failures of calls
pub mod fault;
/// Headers sent with every call
pub mod headers;
/// Dumps of the exchanged packets
pub mod trace;
/// The HTTP boundary
pub mod transport;

use crate::alias::{self, TypeAliasRegistry};
use crate::client::cookies::CookieJar;
use crate::client::envelope::{
    CallTarget, HttpResponseInfo, InboundEnvelope, Outcome, classify_packet, decode_packet,
    encode_request,
};
use crate::client::fault::{ClientFault, ClientFaultKind, Fault, ServerFault};
use crate::client::headers::HeaderRegistry;
use crate::client::trace::{Direction, TraceSink, describe_packet};
use crate::client::transport::{HttpRequest, ProxyConfig, ReqwestTransport, Transport};
use crate::context::SerializationContext;
use crate::packet::{Header, Packet};
use crate::types::{AMFVersion, Value};
use log::{debug, trace, warn};
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, Ordering};

/// The content type of AMF requests
pub const AMF_CONTENT_TYPE: &str = "application/x-amf";

/// Response header appending its value to the gateway url
pub const APPEND_TO_GATEWAY_URL: &str = "AppendToGatewayUrl";

/// Response header replacing the gateway url
pub const REPLACE_GATEWAY_URL: &str = "ReplaceGatewayUrl";

/// Response header asking for an AMF header on every later request
pub const REQUEST_PERSISTENT_HEADER: &str = "RequestPersistentHeader";

static DEFAULT_OBJECT_ENCODING: AtomicU8 = AtomicU8::new(AMFVersion::AMF3 as u8);

/// Receives the response headers a session does not handle itself
pub trait AmfHeaderProcessor {
    /// Called for each such header, before the result of the call is returned
    fn process_header(&mut self, header: &Header);
}

/// A logical connection to an AMF gateway
///
/// Calls are synchronous, one at a time. The url, headers and cookies belong to the
/// connection and are dropped by [`AmfConnection::close`].
pub struct AmfConnection {
    url: Option<String>,
    object_encoding: AMFVersion,
    instantiate_types: bool,
    proxy: Option<ProxyConfig>,
    trace: Option<Box<dyn TraceSink>>,
    header_processor: Option<Box<dyn AmfHeaderProcessor>>,
    context: SerializationContext,
    headers: HeaderRegistry,
    cookies: CookieJar,
    response_counter: u32,
    transport: Box<dyn Transport>,
}

impl Default for AmfConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AmfConnection {
    /// A connection sending requests with `reqwest`
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::default())
    }

    /// A connection sending requests with the given transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            url: None,
            object_encoding: Self::default_object_encoding(),
            instantiate_types: true,
            proxy: None,
            trace: None,
            header_processor: None,
            context: SerializationContext::default(),
            headers: HeaderRegistry::default(),
            cookies: CookieJar::default(),
            response_counter: 0,
            transport: Box::new(transport),
        }
    }

    /// The object encoding new connections start with
    pub fn default_object_encoding() -> AMFVersion {
        AMFVersion::try_from(DEFAULT_OBJECT_ENCODING.load(Ordering::Relaxed))
            .unwrap_or(AMFVersion::AMF3)
    }

    /// Change the object encoding of connections created from now on
    pub fn set_default_object_encoding(version: AMFVersion) {
        DEFAULT_OBJECT_ENCODING.store(u8::from(version), Ordering::Relaxed);
    }

    /// Register an alias between a remote class name and a local type id, for every connection
    pub fn register_alias(remote: impl Into<String>, local: impl Into<String>) {
        alias::register_alias(remote, local);
    }

    /// Set the gateway url
    ///
    /// Nothing is sent, the url only has to be an absolute `http` or `https` url with a host.
    pub fn connect(&mut self, url: &str) -> Result<(), ClientFault> {
        let parsed = reqwest::Url::parse(url).map_err(|e| {
            ClientFault::new(
                ClientFaultKind::ConnectFailed,
                format!("Invalid url '{url}': {e}"),
            )
            .with_source(e)
        })?;

        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            return Err(ClientFault::new(
                ClientFaultKind::ConnectFailed,
                format!("Unsupported url '{url}', expected an http(s) url with a host"),
            ));
        }

        debug!("Connected to {}", url);
        self.url = Some(url.to_string());
        Ok(())
    }

    /// Set the gateway url and the serialization settings
    pub fn connect_with(
        &mut self,
        url: &str,
        context: SerializationContext,
    ) -> Result<(), ClientFault> {
        self.connect(url)?;
        self.context = context;
        Ok(())
    }

    /// The gateway url, `None` until connected and after closing
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Drop the url, headers and cookies of this connection
    pub fn close(&mut self) {
        debug!("Closing connection to {:?}", self.url);
        self.transport.close();
        self.url = None;
        self.headers.clear();
        self.cookies.clear();
        self.response_counter = 0;
    }

    /// The object encoding used for the body of requests
    pub fn object_encoding(&self) -> AMFVersion {
        self.object_encoding
    }

    /// Set the object encoding used for the body of requests
    pub fn set_object_encoding(&mut self, version: AMFVersion) {
        self.object_encoding = version;
    }

    /// Are aliased remote types returned under their local type id
    pub fn instantiate_types(&self) -> bool {
        self.instantiate_types
    }

    /// When false, typed objects keep their remote class name even when an alias exists
    pub fn set_instantiate_types(&mut self, instantiate_types: bool) {
        self.instantiate_types = instantiate_types;
    }

    /// The proxy requests are routed through
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Route requests through an HTTP proxy, or connect directly with `None`
    pub fn set_proxy(&mut self, proxy: Option<ProxyConfig>) {
        self.proxy = proxy;
    }

    /// Receive a record of every request and response
    pub fn set_amf_trace(&mut self, sink: impl TraceSink + 'static) {
        self.trace = Some(Box::new(sink));
    }

    /// Stop tracing
    pub fn clear_amf_trace(&mut self) {
        self.trace = None;
    }

    /// The processor of unhandled response headers
    pub fn amf_header_processor(&self) -> Option<&dyn AmfHeaderProcessor> {
        self.header_processor.as_deref()
    }

    /// Set the processor of unhandled response headers
    pub fn set_amf_header_processor(&mut self, processor: Option<Box<dyn AmfHeaderProcessor>>) {
        self.header_processor = processor;
    }

    /// The serialization settings
    pub fn serialization_context(&self) -> &SerializationContext {
        &self.context
    }

    /// Add an AMF header to every request, replacing one of the same name
    pub fn add_amf_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.headers.add_amf_header(name, value);
    }

    /// Add an AMF header to every request, replacing one of the same name
    pub fn add_amf_header_with(
        &mut self,
        name: impl Into<String>,
        must_understand: bool,
        value: impl Into<Value>,
    ) {
        self.headers.add_amf_header_with(name, must_understand, value);
    }

    /// Remove an AMF header, returns whether it existed
    pub fn remove_amf_header(&mut self, name: &str) -> bool {
        self.headers.remove_amf_header(name)
    }

    /// Remove every AMF header
    pub fn remove_all_amf_headers(&mut self) {
        self.headers.remove_all_amf_headers();
    }

    /// Add an HTTP header to every request, replacing one of the same name
    pub fn add_http_request_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.add_http_request_header(name, value);
    }

    /// Remove an HTTP request header, returns whether it existed
    pub fn remove_http_request_header(&mut self, name: &str) -> bool {
        self.headers.remove_http_request_header(name)
    }

    /// Remove every HTTP request header
    pub fn remove_all_http_request_headers(&mut self) {
        self.headers.remove_all_http_request_headers();
    }

    /// The headers sent with every request
    pub fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    /// The cookies set by the broker
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    fn http_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.http_request_headers().to_vec();
        if !headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("Content-Type"))
        {
            headers.push(("Content-Type".to_string(), AMF_CONTENT_TYPE.to_string()));
        }
        if let Some(cookie) = self.cookies.header_value() {
            headers.push(("Cookie".to_string(), cookie));
        }
        headers
    }

    fn record(&self, direction: Direction, packet: Option<&Packet>, bytes: &[u8]) {
        if let Some(sink) = &self.trace {
            sink.on_exchange(direction, &describe_packet(packet, bytes));
        }
    }

    /// Act on the headers of a response
    fn process_response_headers(&mut self, headers: &[Header]) {
        for header in headers {
            let value = header.value.unwrap_amf3();
            match header.name.as_str() {
                APPEND_TO_GATEWAY_URL => {
                    if let (Some(url), Some(suffix)) = (self.url.as_mut(), value.as_str()) {
                        url.push_str(suffix);
                        debug!("Gateway url is now {}", url);
                    }
                }
                REPLACE_GATEWAY_URL => {
                    if let Some(url) = value.as_str() {
                        debug!("Gateway url replaced by {}", url);
                        self.url = Some(url.to_string());
                    }
                }
                REQUEST_PERSISTENT_HEADER => {
                    let name = value.get("name").and_then(|v| v.as_str());
                    let must_understand = value
                        .get("mustUnderstand")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    let data = value.get("data").map(|v| v.unwrap_amf3());
                    match (name, data) {
                        (Some(name), Some(data)) => {
                            debug!("Persisting AMF header {}", name);
                            self.headers.insert_amf_header(Header {
                                name: name.to_string(),
                                must_understand,
                                value: data,
                            });
                        }
                        _ => warn!("Ignoring malformed {} header", REQUEST_PERSISTENT_HEADER),
                    }
                }
                _ => match self.header_processor.as_mut() {
                    Some(processor) => processor.process_header(header),
                    None => trace!("Ignoring response header {}", header.name),
                },
            }
        }
    }

    /// Invoke `operation` with `arguments` and wait for the answer
    ///
    /// The operation names the remote destination and method as `destination.method`.
    pub fn call(&mut self, operation: &str, arguments: Vec<Value>) -> Result<Rc<Value>, Fault> {
        let Some(url) = self.url.clone() else {
            return Err(ClientFault::new(
                ClientFaultKind::CallFailed,
                format!("Can't call {operation}, the connection has no url"),
            )
            .into());
        };

        self.response_counter = self.response_counter.wrapping_add(1).max(1);
        let response_uri = format!("/{}", self.response_counter);
        let target = CallTarget::parse(operation);
        debug!(
            "Calling {} on {} as {} ({})",
            target, url, response_uri, self.object_encoding
        );

        let request = encode_request(
            &target,
            &response_uri,
            arguments,
            &self.headers,
            self.object_encoding,
            &self.context,
            TypeAliasRegistry::global(),
        )?;

        self.record(Direction::Request, Some(&request.packet), &request.bytes);
        let response = self
            .transport
            .send(HttpRequest {
                url: url.clone(),
                headers: self.http_headers(),
                body: request.bytes.clone(),
                proxy: self.proxy.clone(),
            })
            .map_err(|e| {
                warn!("Call to {} on {} failed: {}", target, url, e);
                ClientFault::new(
                    ClientFaultKind::CallFailed,
                    format!("Call to {target} failed: {e}"),
                )
                .with_source(e)
            })?;

        for set_cookie in response.header_values("Set-Cookie") {
            self.cookies.store(set_cookie);
        }

        let http = HttpResponseInfo::new(response.status, response.reason.clone());

        if response.status != 200 {
            self.record(Direction::Response, None, &response.body);
            warn!("Call to {} on {} answered with {}", target, url, http);
            return Err(ClientFault::new(
                ClientFaultKind::CallFailed,
                format!("Call to {target} answered with {http}"),
            )
            .with_http(http)
            .into());
        }

        let packet = match decode_packet(&response.body, &self.context, &http) {
            Ok(packet) => packet,
            Err(fault) => {
                self.record(Direction::Response, None, &response.body);
                return Err(fault.into());
            }
        };
        self.record(Direction::Response, Some(&packet), &response.body);

        let aliases = self
            .instantiate_types
            .then(TypeAliasRegistry::global);
        let InboundEnvelope {
            outcome,
            payload,
            headers,
            http,
        } = classify_packet(packet, &response_uri, http, aliases)?;

        self.process_response_headers(&headers);

        match outcome {
            Outcome::Result => {
                debug!("{} returned", target);
                Ok(payload)
            }
            Outcome::Status => {
                let fault = ServerFault::from_payload(payload, http);
                debug!("{} faulted: {}", target, fault);
                Err(fault.into())
            }
        }
    }
}

impl Drop for AmfConnection {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::AmfConnection;
    use crate::client::fault::ClientFaultKind;
    use crate::client::trace::AmfTrace;
    use crate::client::transport::{HttpRequest, HttpResponse, Transport, TransportError};
    use crate::packet::read::parse;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&mut self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::InvalidRequest("unreachable".into()))
        }
    }

    /// Keeps the body of every request, then fails it
    #[derive(Default)]
    struct Recording(Rc<RefCell<Vec<Vec<u8>>>>);

    impl Transport for Recording {
        fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.0.borrow_mut().push(request.body);
            Err(TransportError::InvalidRequest("unreachable".into()))
        }
    }

    #[test]
    fn connect_validates_the_url() {
        let mut connection = AmfConnection::with_transport(Unreachable);
        let fault = connection.connect("badUrl").unwrap_err();
        assert_eq!(fault.kind, ClientFaultKind::ConnectFailed);
        assert_eq!(connection.url(), None);

        assert!(connection.connect("ftp://host/amf").is_err());
        connection.connect("http://localhost:8400/amf").unwrap();
        assert_eq!(connection.url(), Some("http://localhost:8400/amf"));
        connection.close();
        assert_eq!(connection.url(), None);
    }

    #[test]
    fn transport_errors_fail_the_call() {
        let mut connection = AmfConnection::with_transport(Unreachable);
        connection.connect("http://localhost:8400/amf").unwrap();
        let fault = connection.call("svc.op", Vec::new()).unwrap_err();
        assert_eq!(fault.client_kind(), Some(ClientFaultKind::CallFailed));
        assert_eq!(fault.http(), None);
    }

    #[test]
    fn failed_requests_are_traced() {
        let trace = AmfTrace::new();
        let mut connection = AmfConnection::with_transport(Unreachable);
        connection.set_amf_trace(trace.clone());
        connection.connect("http://localhost:8400/amf").unwrap();

        assert!(connection.call("svc.op", Vec::new()).is_err());
        let contents = trace.contents();
        assert!(contents.contains("---- request ----"));
        assert!(contents.contains("svc.op"));
        assert!(!contents.contains("---- response ----"));
    }

    #[test]
    fn response_counter_wraps_past_zero() {
        let bodies = Rc::new(RefCell::new(Vec::new()));
        let mut connection = AmfConnection::with_transport(Recording(Rc::clone(&bodies)));
        connection.connect("http://localhost:8400/amf").unwrap();
        connection.response_counter = u32::MAX - 1;

        for _ in 0..2 {
            let _ = connection.call("svc.op", Vec::new());
        }

        let response_uris = bodies
            .borrow()
            .iter()
            .map(|body| parse(body).unwrap().messages[0].response_uri.clone())
            .collect::<Vec<_>>();
        assert_eq!(response_uris, vec![format!("/{}", u32::MAX), "/1".to_string()]);
    }
}
