use amf_client::client::fault::{CALL_FAILED, CONNECT_FAILED, ClientFaultKind, Fault};
use amf_client::client::trace::AmfTrace;
use amf_client::client::transport::{
    HttpRequest, HttpResponse, ProxyConfig, ReqwestTransport, Transport, TransportError,
};
use amf_client::client::{AmfConnection, AmfHeaderProcessor};
use amf_client::context::SerializationContext;
use amf_client::extra::flex::read::unwrap_collection;
use amf_client::extra::flex::write::{acknowledge_message, array_collection, error_message};
use amf_client::packet::{Header, Message, Packet};
use amf_client::types::{AMFVersion, Element, Value};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::thread::JoinHandle;

const URL: &str = "http://localhost:8400/team/messagebroker/amf";
const UNAVAILABLE: &str = "Server.Resource.Unavailable";
const SERVER_TYPE: &str = "remoting.amfclient.ServerCustomType";

/// An in-process broker answering the way a BlazeDS remoting destination does
#[derive(Clone, Default)]
struct Broker {
    requests: Rc<RefCell<Vec<HttpRequest>>>,
}

impl Broker {
    fn last_request(&self) -> HttpRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

fn ok(body: Vec<u8>, headers: Vec<(String, String)>) -> HttpResponse {
    HttpResponse {
        status: 200,
        reason: "OK".to_string(),
        headers,
        body,
    }
}

impl Transport for Broker {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());

        let context = SerializationContext::default();
        let packet = context
            .packet_decoder()
            .parse(&request.body)
            .map_err(|e| TransportError::InvalidRequest(format!("{e:?}")))?;
        let message = &packet.messages[0];
        let args = match message.contents.unwrap_amf3().as_ref() {
            Value::StrictArray(args) => args.iter().map(|a| a.unwrap_amf3()).collect(),
            _ => Vec::new(),
        };
        let arg = |n: usize| args.get(n).cloned().unwrap_or_else(|| Rc::new(Value::Null));

        let mut http_headers = Vec::new();
        let mut amf_headers = Vec::new();
        let (success, result) = match message.target_uri.as_str() {
            "remoting_AMF.echoString" | "remoting_AMF.echoCollection" => (true, arg(0)),
            "remoting_AMF.getObject2" => (
                true,
                Rc::new(Value::typed_object(
                    SERVER_TYPE,
                    vec![Element::new("id", 2), Element::new("name", "obj2")],
                )),
            ),
            "remoting_AMF.getObjectEncoding" => (
                true,
                Rc::new(Value::Number(f64::from(u8::from(packet.version)))),
            ),
            "remoting_AMF.getHeader" => {
                let name = arg(0).as_str().unwrap_or_default().to_string();
                let value = packet
                    .headers
                    .iter()
                    .find(|h| h.name == name)
                    .map(|h| h.value.unwrap_amf3())
                    .unwrap_or_else(|| Rc::new(Value::Null));
                (true, value)
            }
            "remoting_AMF.getCookie" => (
                true,
                Rc::new(Value::from(request.header("Cookie").map(str::to_string))),
            ),
            "remoting_AMF.setCookie" => {
                http_headers.push((
                    "Set-Cookie".to_string(),
                    "JSESSIONID=abc123; Path=/; HttpOnly".to_string(),
                ));
                (true, Rc::new(Value::Null))
            }
            "remoting_AMF.appendUrl" => {
                amf_headers.push(Header {
                    name: "AppendToGatewayUrl".to_string(),
                    must_understand: false,
                    value: Rc::new(Value::from(";jsessionid=abc123")),
                });
                (true, Rc::new(Value::Null))
            }
            "remoting_AMF.persistHeader" => {
                amf_headers.push(Header {
                    name: "RequestPersistentHeader".to_string(),
                    must_understand: true,
                    value: Rc::new(Value::object(vec![
                        Element::new("name", "token"),
                        Element::new("mustUnderstand", false),
                        Element::new("data", "secret"),
                    ])),
                });
                (true, Rc::new(Value::Null))
            }
            "remoting_AMF.customHeader" => {
                amf_headers.push(Header {
                    name: "Custom".to_string(),
                    must_understand: false,
                    value: Rc::new(Value::from(7.0)),
                });
                (true, Rc::new(Value::Null))
            }
            "remoting_AMF.acknowledge" => (
                true,
                Rc::new(acknowledge_message("correlation", arg(0).as_ref().clone())),
            ),
            "remoting_AMF.fail" => {
                return Ok(HttpResponse {
                    status: 500,
                    reason: "Internal Server Error".to_string(),
                    headers: Vec::new(),
                    body: b"<html>error</html>".to_vec(),
                });
            }
            "remoting_AMF.garbage" => return Ok(ok(b"not amf".to_vec(), Vec::new())),
            target => (
                false,
                Rc::new(error_message(
                    UNAVAILABLE,
                    &format!("No method named '{target}'"),
                    Some("at flex.messaging.services.RemotingService"),
                )),
            ),
        };

        let contents = match packet.version {
            AMFVersion::AMF0 => result,
            AMFVersion::AMF3 => Rc::new(Value::AMF3(result)),
        };
        let suffix = if success { "/onResult" } else { "/onStatus" };
        let response = Packet {
            version: packet.version,
            headers: amf_headers,
            messages: vec![Message {
                target_uri: format!("{}{}", message.response_uri, suffix),
                response_uri: "null".to_string(),
                contents,
            }],
        };
        let body = context
            .packet_encoder()
            .write(&response)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(ok(body, http_headers))
    }
}

fn connected() -> (AmfConnection, Broker) {
    let broker = Broker::default();
    let mut connection = AmfConnection::with_transport(broker.clone());
    connection.connect(URL).expect("connect");
    (connection, broker)
}

fn client_kind(result: Result<Rc<Value>, Fault>) -> ClientFaultKind {
    match result {
        Err(Fault::Client(fault)) => fault.kind,
        other => panic!("expected a client fault, got {other:?}"),
    }
}

#[test]
fn connect_and_close() {
    let (mut connection, _) = connected();
    assert_eq!(connection.url(), Some(URL));
    connection.close();
    assert_eq!(connection.url(), None);
    connection.close();
}

#[test]
fn connect_to_bad_url() {
    let mut connection = AmfConnection::with_transport(Broker::default());
    let fault = connection.connect("badUrl").unwrap_err();
    assert_eq!(fault.kind, ClientFaultKind::ConnectFailed);
    assert_eq!(fault.code(), CONNECT_FAILED);
    connection.close();
}

#[test]
fn reconnecting_replaces_the_url() {
    const OTHER_URL: &str = "http://backup.example.com:8400/team/messagebroker/amf";

    let (mut connection, broker) = connected();
    connection.add_amf_header("token", "abc");
    connection.call("remoting_AMF.setCookie", vec![]).unwrap();

    connection.connect(OTHER_URL).unwrap();
    assert_eq!(connection.url(), Some(OTHER_URL));

    let result = connection.call("remoting_AMF.getCookie", vec![]).unwrap();
    assert_eq!(result.as_str(), Some("JSESSIONID=abc123"));
    assert_eq!(broker.last_request().url, OTHER_URL);

    let result = connection
        .call("remoting_AMF.getHeader", vec![Value::from("token")])
        .unwrap();
    assert_eq!(result.as_str(), Some("abc"));
}

#[test]
fn call_without_connecting() {
    let broker = Broker::default();
    let mut connection = AmfConnection::with_transport(broker.clone());
    let result = connection.call("remoting_AMF.echoString", vec![Value::from("hi")]);
    assert_eq!(client_kind(result), ClientFaultKind::CallFailed);
    assert_eq!(broker.request_count(), 0);
}

#[test]
fn repeated_calls_are_answered_in_order() {
    let (mut connection, broker) = connected();
    for n in 1..=5 {
        let argument = format!("hello {n}");
        let result = connection
            .call("remoting_AMF.echoString", vec![Value::from(argument.as_str())])
            .unwrap();
        assert_eq!(result.as_str(), Some(argument.as_str()));

        let request = broker.last_request();
        let packet = amf_client::packet::read::parse(&request.body).unwrap();
        assert_eq!(packet.messages[0].response_uri, format!("/{n}"));
    }
}

#[test]
fn close_restarts_the_response_counter() {
    let (mut connection, broker) = connected();
    connection.call("remoting_AMF.echoString", vec![]).unwrap();
    connection.call("remoting_AMF.echoString", vec![]).unwrap();
    connection.close();
    connection.connect(URL).unwrap();
    connection.call("remoting_AMF.echoString", vec![]).unwrap();

    let packet = amf_client::packet::read::parse(&broker.last_request().body).unwrap();
    assert_eq!(packet.messages[0].response_uri, "/1");
}

#[test]
fn unknown_method_is_a_server_fault() {
    let (mut connection, _) = connected();
    match connection.call("remoting_AMF.nonExistingMethod", vec![]) {
        Err(Fault::Server(fault)) => {
            assert_eq!(fault.code(), UNAVAILABLE);
            assert_eq!(fault.http.code, 200);
            assert_eq!(fault.http.message, "OK");
            assert!(fault.description().contains("nonExistingMethod"));
            assert_eq!(
                fault.detail(),
                Some("at flex.messaging.services.RemotingService")
            );
        }
        other => panic!("expected a server fault, got {other:?}"),
    }
}

#[test]
fn instantiate_types_controls_aliasing() {
    AmfConnection::register_alias(SERVER_TYPE, "ServerCustomType");
    let (mut connection, _) = connected();

    connection.set_instantiate_types(false);
    assert!(!connection.instantiate_types());
    let result = connection.call("remoting_AMF.getObject2", vec![]).unwrap();
    assert_eq!(result.class_name(), Some(SERVER_TYPE));

    connection.set_instantiate_types(true);
    let result = connection.call("remoting_AMF.getObject2", vec![]).unwrap();
    assert_eq!(result.class_name(), Some("ServerCustomType"));
    assert_eq!(result.get("name").and_then(|v| v.as_str()), Some("obj2"));
}

#[test]
fn local_types_are_sent_under_their_alias() {
    AmfConnection::register_alias(SERVER_TYPE, "ServerCustomType");
    let (mut connection, broker) = connected();

    let argument = Value::typed_object("ServerCustomType", vec![Element::new("id", 1)]);
    let result = connection
        .call("remoting_AMF.echoString", vec![argument])
        .unwrap();
    assert_eq!(result.class_name(), Some("ServerCustomType"));

    let packet = amf_client::packet::read::parse(&broker.last_request().body).unwrap();
    let body = packet.messages[0].contents.unwrap_amf3();
    let Value::StrictArray(args) = body.as_ref() else {
        panic!("not an array: {body:?}");
    };
    assert_eq!(args[0].class_name(), Some(SERVER_TYPE));
}

#[test]
fn amf_headers_reach_the_broker() {
    let (mut connection, _) = connected();
    connection.add_amf_header("token", "abc");
    let result = connection
        .call("remoting_AMF.getHeader", vec![Value::from("token")])
        .unwrap();
    assert_eq!(result.as_str(), Some("abc"));

    assert!(connection.remove_amf_header("token"));
    assert!(!connection.remove_amf_header("token"));
    let result = connection
        .call("remoting_AMF.getHeader", vec![Value::from("token")])
        .unwrap();
    assert!(result.is_null());

    connection.add_amf_header_with("a", true, 1);
    connection.add_amf_header("b", 2);
    connection.remove_all_amf_headers();
    assert!(connection.headers().amf_headers().is_empty());
}

#[test]
fn http_headers_reach_the_broker() {
    let (mut connection, broker) = connected();
    connection.add_http_request_header("X-Client", "tests");
    connection.call("remoting_AMF.echoString", vec![]).unwrap();

    let request = broker.last_request();
    assert_eq!(request.header("X-Client"), Some("tests"));
    assert_eq!(request.header("Content-Type"), Some("application/x-amf"));
    assert_eq!(request.url, URL);

    assert!(connection.remove_http_request_header("X-Client"));
    assert!(!connection.remove_http_request_header("X-Client"));
    connection.add_http_request_header("X-Other", "1");
    connection.remove_all_http_request_headers();
    connection.call("remoting_AMF.echoString", vec![]).unwrap();
    assert_eq!(broker.last_request().header("X-Other"), None);
}

#[test]
fn object_encoding_is_used_for_requests() {
    let (mut connection, _) = connected();
    connection.set_object_encoding(AMFVersion::AMF0);
    assert_eq!(connection.object_encoding(), AMFVersion::AMF0);
    let result = connection
        .call("remoting_AMF.getObjectEncoding", vec![])
        .unwrap();
    assert_eq!(result.as_f64(), Some(0.0));

    connection.set_object_encoding(AMFVersion::AMF3);
    let result = connection
        .call("remoting_AMF.getObjectEncoding", vec![])
        .unwrap();
    assert_eq!(result.as_f64(), Some(3.0));
}

#[test]
fn trace_records_calls_that_were_sent() {
    let trace = AmfTrace::new();
    let mut connection = AmfConnection::with_transport(Broker::default());
    connection.set_amf_trace(trace.clone());

    let _ = connection.call("remoting_AMF.echoString", vec![]);
    assert!(trace.is_empty());

    connection.connect(URL).unwrap();
    connection
        .call("remoting_AMF.echoString", vec![Value::from("traced")])
        .unwrap();
    let contents = trace.contents();
    assert!(contents.contains("---- request ----"));
    assert!(contents.contains("---- response ----"));
    assert!(contents.contains("remoting_AMF.echoString"));

    trace.clear();
    connection.clear_amf_trace();
    connection.call("remoting_AMF.echoString", vec![]).unwrap();
    assert!(trace.is_empty());
}

#[test]
fn http_errors_fail_the_call() {
    let (mut connection, _) = connected();
    match connection.call("remoting_AMF.fail", vec![]) {
        Err(Fault::Client(fault)) => {
            assert_eq!(fault.kind, ClientFaultKind::CallFailed);
            assert_eq!(fault.code(), CALL_FAILED);
            let http = fault.http.expect("http info");
            assert_eq!(http.code, 500);
            assert_eq!(http.message, "Internal Server Error");
        }
        other => panic!("expected a client fault, got {other:?}"),
    }
}

#[test]
fn undecodable_responses_fail_the_call() {
    let (mut connection, _) = connected();
    let fault = connection.call("remoting_AMF.garbage", vec![]).unwrap_err();
    assert_eq!(fault.client_kind(), Some(ClientFaultKind::DecodeFailed));
    assert_eq!(fault.code(), CALL_FAILED);
    assert_eq!(fault.http().map(|h| h.code), Some(200));
}

#[test]
fn cookies_are_replayed_until_close() {
    let (mut connection, _) = connected();
    let result = connection.call("remoting_AMF.getCookie", vec![]).unwrap();
    assert!(result.is_null());

    connection.call("remoting_AMF.setCookie", vec![]).unwrap();
    assert_eq!(connection.cookies().get("JSESSIONID"), Some("abc123"));
    let result = connection.call("remoting_AMF.getCookie", vec![]).unwrap();
    assert_eq!(result.as_str(), Some("JSESSIONID=abc123"));

    connection.close();
    connection.connect(URL).unwrap();
    let result = connection.call("remoting_AMF.getCookie", vec![]).unwrap();
    assert!(result.is_null());
}

#[test]
fn append_to_gateway_url() {
    let (mut connection, broker) = connected();
    connection.call("remoting_AMF.appendUrl", vec![]).unwrap();
    let expected = format!("{URL};jsessionid=abc123");
    assert_eq!(connection.url(), Some(expected.as_str()));

    connection.call("remoting_AMF.echoString", vec![]).unwrap();
    assert_eq!(broker.last_request().url, expected);
}

#[test]
fn request_persistent_header() {
    let (mut connection, _) = connected();
    connection.call("remoting_AMF.persistHeader", vec![]).unwrap();
    let result = connection
        .call("remoting_AMF.getHeader", vec![Value::from("token")])
        .unwrap();
    assert_eq!(result.as_str(), Some("secret"));

    connection.close();
    assert!(connection.headers().amf_headers().is_empty());
}

struct Collect(Rc<RefCell<Vec<String>>>);

impl AmfHeaderProcessor for Collect {
    fn process_header(&mut self, header: &Header) {
        self.0.borrow_mut().push(header.name.clone());
    }
}

#[test]
fn unhandled_headers_go_to_the_processor() {
    let (mut connection, _) = connected();
    connection.call("remoting_AMF.customHeader", vec![]).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    connection.set_amf_header_processor(Some(Box::new(Collect(Rc::clone(&seen)))));
    assert!(connection.amf_header_processor().is_some());
    connection.call("remoting_AMF.customHeader", vec![]).unwrap();
    connection.call("remoting_AMF.appendUrl", vec![]).unwrap();
    assert_eq!(*seen.borrow(), vec!["Custom".to_string()]);
}

#[test]
fn flex_messages_and_collections() {
    let (mut connection, _) = connected();
    let result = connection
        .call("remoting_AMF.acknowledge", vec![Value::from("inner")])
        .unwrap();
    assert_eq!(result.as_str(), Some("inner"));

    for version in [AMFVersion::AMF0, AMFVersion::AMF3] {
        connection.set_object_encoding(version);
        let collection = array_collection([Value::from("a"), Value::from("b")]);
        let result = connection
            .call("remoting_AMF.echoCollection", vec![collection])
            .unwrap();
        assert_eq!(
            *unwrap_collection(&result),
            Value::array([Value::from("a"), Value::from("b")])
        );
    }
}

#[test]
fn nesting_limit_applies_to_responses() {
    let (mut connection, _) = connected();
    connection
        .connect_with(
            URL,
            SerializationContext {
                max_object_nest_level: 2,
                ..SerializationContext::default()
            },
        )
        .unwrap();
    let deep = Value::array([Value::array([Value::array([])])]);
    let fault = connection
        .call("remoting_AMF.echoString", vec![deep])
        .unwrap_err();
    assert_eq!(fault.client_kind(), Some(ClientFaultKind::DecodeFailed));
}

/// Answer a single HTTP request with the in-process broker, returns the gateway url and the
/// request headers seen
fn serve_once() -> (String, JoinHandle<Vec<(String, String)>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/messagebroker/amf", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let (headers, body) = read_request(&mut stream);

        let mut broker = Broker::default();
        let response = broker
            .send(HttpRequest {
                url: String::new(),
                headers: headers.clone(),
                body,
                proxy: None,
            })
            .expect("broker");

        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/x-amf\r\nContent-Length: {}\r\nConnection: close\r\n",
            response.status,
            response.reason,
            response.body.len()
        );
        for (name, value) in &response.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        stream.write_all(out.as_bytes()).unwrap();
        stream.write_all(&response.body).unwrap();
        stream.flush().unwrap();
        headers
    });

    (url, handle)
}

fn read_request(stream: &mut TcpStream) -> (Vec<(String, String)>, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("read");
        assert!(n > 0, "connection closed before the request was complete");
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let headers: Vec<(String, String)> = head
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
            .collect();
        let length = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        if buf.len() >= end + 4 + length {
            return (headers, buf[end + 4..end + 4 + length].to_vec());
        }
    }
}

#[test]
fn reqwest_transport_over_loopback() {
    let (url, server) = serve_once();

    let mut connection = AmfConnection::with_transport(ReqwestTransport::default());
    connection.connect(&url).unwrap();
    let result = connection
        .call("remoting_AMF.echoString", vec![Value::from("over http")])
        .unwrap();
    assert_eq!(result.as_str(), Some("over http"));

    let headers = server.join().unwrap();
    let content_type = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Type"))
        .map(|(_, v)| v.as_str());
    assert_eq!(content_type, Some("application/x-amf"));
}

#[test]
fn proxy_on_closed_port_fails_the_call() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut connection = AmfConnection::with_transport(ReqwestTransport::default());
    connection.connect(URL).unwrap();
    connection.set_proxy(Some(ProxyConfig::new("127.0.0.1", port)));
    assert_eq!(connection.proxy().map(|p| p.port), Some(port));

    let result = connection.call("remoting_AMF.echoString", vec![Value::from("hi")]);
    match result {
        Err(Fault::Client(fault)) => {
            assert_eq!(fault.kind, ClientFaultKind::CallFailed);
            assert!(fault.http.is_none());
            assert!(fault.source.is_some());
        }
        other => panic!("expected a client fault, got {other:?}"),
    }
}
