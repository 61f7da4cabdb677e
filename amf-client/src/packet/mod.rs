use crate::types::{AMFVersion, Value};
use std::rc::Rc;

/// Reading of AMF Packets
pub mod read;

/// Writing of AMF Packets
pub mod write;

/// An AMF Packet Header
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The name of this header.
    pub name: String,

    /// If true, the endpoint must immediately abort and error if it does not understand this header.
    pub must_understand: bool,

    /// The value of this header.
    pub value: Rc<Value>,
}

/// An AMF Packet Message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The target URI that this message is intended for.
    ///
    /// For requests this names the remote operation, for responses it is the response URI of
    /// the request suffixed with either `/onResult` or `/onStatus`.
    pub target_uri: String,

    /// The response URI for this message.
    ///
    /// For requests, this should be a unique identifier to represent "this message", for example `/1`.
    /// For responses this is usually `null` or empty.
    pub response_uri: String,

    /// The contents of this message.
    pub contents: Rc<Value>,
}

impl Message {
    /// Does this message answer the request sent with `response_uri`, and if so was it a success
    pub fn answers(&self, response_uri: &str) -> Option<bool> {
        let suffix = self.target_uri.strip_prefix(response_uri)?;
        match suffix {
            "/onResult" => Some(true),
            "/onStatus" => Some(false),
            _ => None,
        }
    }
}

/// An AMF Packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The version of this packet, selects the object encoding used by the body of requests
    pub version: AMFVersion,

    /// Any headers associated with every message inside this packet.
    pub headers: Vec<Header>,

    /// All messages included inside this packet.
    pub messages: Vec<Message>,
}
