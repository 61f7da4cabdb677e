//! Building request packets and reading response packets
use crate::alias::{self, TypeAliasRegistry};
use crate::client::fault::{ClientFault, ClientFaultKind};
use crate::client::headers::HeaderRegistry;
use crate::context::SerializationContext;
use crate::errors::describe_nom_error;
use crate::extra::flex;
use crate::packet::{Header, Message, Packet};
use crate::types::{AMFVersion, Value};
use log::trace;
use std::fmt;
use std::rc::Rc;

/// The status line of an HTTP response
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseInfo {
    /// The status code
    pub code: u16,

    /// The reason phrase
    pub message: String,
}

impl HttpResponseInfo {
    /// Status info from a code and reason phrase
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpResponseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.code, self.message)
    }
}

/// The remote operation a call invokes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    operation: String,
    split: Option<usize>,
}

impl CallTarget {
    /// Split `destination.method` on the last dot
    ///
    /// Without a dot the whole operation is the method and there is no destination.
    pub fn parse(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        let split = operation.rfind('.');
        Self { operation, split }
    }

    /// The remote destination, such as `remoting_AMF` or `com.example.Service`
    pub fn destination(&self) -> Option<&str> {
        self.split.map(|at| &self.operation[..at])
    }

    /// The method invoked on the destination
    pub fn method(&self) -> &str {
        match self.split {
            Some(at) => &self.operation[at + 1..],
            None => &self.operation,
        }
    }

    /// The operation as sent in the target URI
    pub fn as_str(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.operation)
    }
}

/// Whether the broker answered with a result or a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A successful result
    Result,

    /// A fault
    Status,
}

/// A decoded response
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// Was the call successful
    pub outcome: Outcome,

    /// The result, or the status describing the fault
    pub payload: Rc<Value>,

    /// Headers sent by the broker
    pub headers: Vec<Header>,

    /// The HTTP status of the response
    pub http: HttpResponseInfo,
}

/// An encoded request
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    /// The request packet
    pub packet: Packet,

    /// The packet as sent
    pub bytes: Vec<u8>,
}

/// Build and encode the request for one call
///
/// The arguments form the body as a strict array, behind the AMF3 switch when `version` is
/// AMF3. Local type ids in the arguments are replaced by their remote class names.
pub fn encode_request(
    target: &CallTarget,
    response_uri: &str,
    arguments: Vec<Value>,
    headers: &HeaderRegistry,
    version: AMFVersion,
    context: &SerializationContext,
    aliases: &TypeAliasRegistry,
) -> Result<OutboundEnvelope, ClientFault> {
    let arguments = Rc::new(Value::array(arguments));
    let arguments = alias::to_remote(&arguments, aliases);
    let contents = match version {
        AMFVersion::AMF0 => arguments,
        AMFVersion::AMF3 => Rc::new(Value::AMF3(arguments)),
    };

    let packet = Packet {
        version,
        headers: headers.amf_headers().to_vec(),
        messages: vec![Message {
            target_uri: target.as_str().to_string(),
            response_uri: response_uri.to_string(),
            contents,
        }],
    };

    let bytes = context.packet_encoder().write(&packet).map_err(|e| {
        ClientFault::new(
            ClientFaultKind::CallFailed,
            format!("Could not encode the call to {target}: {e}"),
        )
        .with_source(e)
    })?;
    trace!("Encoded {} ({} bytes)", target, bytes.len());

    Ok(OutboundEnvelope { packet, bytes })
}

/// Decode the bytes of a response packet
pub fn decode_packet(
    bytes: &[u8],
    context: &SerializationContext,
    http: &HttpResponseInfo,
) -> Result<Packet, ClientFault> {
    context.packet_decoder().parse(bytes).map_err(|e| {
        ClientFault::new(
            ClientFaultKind::DecodeFailed,
            format!(
                "Could not decode the response: {}",
                describe_nom_error(&e, bytes)
            ),
        )
        .with_http(http.clone())
    })
}

/// Find the answer to `response_uri` in a response packet
///
/// The payload has AMF3 switches and acknowledge messages removed. A body addressed to
/// `onStatus`, or carrying a Flex error message, is a [`Outcome::Status`]. Remote class
/// names are replaced by local type ids when `aliases` is given.
pub fn classify_packet(
    packet: Packet,
    response_uri: &str,
    http: HttpResponseInfo,
    aliases: Option<&TypeAliasRegistry>,
) -> Result<InboundEnvelope, ClientFault> {
    let Some((message, success)) = packet
        .messages
        .iter()
        .find_map(|m| m.answers(response_uri).map(|success| (m, success)))
    else {
        return Err(ClientFault::new(
            ClientFaultKind::DecodeFailed,
            format!("The response holds no answer to {response_uri}"),
        )
        .with_http(http));
    };

    let payload = flex::unwrap_acknowledge(&message.contents);
    let outcome = if success && !flex::is_error_message(&payload) {
        Outcome::Result
    } else {
        Outcome::Status
    };
    let payload = match aliases {
        Some(aliases) => alias::materialize(&payload, aliases),
        None => payload,
    };

    Ok(InboundEnvelope {
        outcome,
        payload,
        headers: packet.headers,
        http,
    })
}

/// Decode a response and find the answer to `response_uri` in it
pub fn decode_response(
    bytes: &[u8],
    response_uri: &str,
    http: HttpResponseInfo,
    context: &SerializationContext,
    aliases: Option<&TypeAliasRegistry>,
) -> Result<InboundEnvelope, ClientFault> {
    let packet = decode_packet(bytes, context, &http)?;
    classify_packet(packet, response_uri, http, aliases)
}
