//! Flex messaging types as exchanged with BlazeDS compatible brokers
//!
//! Brokers answer remoting calls made with Flex messages by an `AcknowledgeMessage` (usually
//! externalized under the short alias `DSK`) wrapping the result, or by an `ErrorMessage`
//! describing the fault. Collections arrive as externalized `ArrayCollection` and
//! `ObjectProxy` values.
use crate::types::Value;
use std::rc::Rc;

/// Decoders for externalized flex types
pub mod read;

/// Encoders for externalized flex types and the `RemotingMessage` builder
pub mod write;

const NEXT_FLAG: u8 = 128;

const BODY_FLAG: u8 = 1;
const CLIENT_ID_FLAG: u8 = 2;
const DESTINATION_ID_FLAG: u8 = 4;
const HEADERS_FLAG: u8 = 8;
const MESSAGE_ID_FLAG: u8 = 16;
const TIMESTAMP_FLAG: u8 = 32;
const TTL_FLAG: u8 = 64;

const CLIENT_ID_BYTES_FLAG: u8 = 1;
const MESSAGE_ID_BYTES_FLAG: u8 = 2;

const CORRELATION_ID_FLAG: u8 = 1;
const CORRELATION_ID_BYTES_FLAG: u8 = 2;

const OPERATION_FLAG: u8 = 1;

/// Short alias of an externalized `AcknowledgeMessage`
pub const ACKNOWLEDGE_MESSAGE_ALIAS: &str = "DSK";

/// Short alias of an externalized `AsyncMessage`
pub const ASYNC_MESSAGE_ALIAS: &str = "DSA";

/// Short alias of an externalized `CommandMessage`
pub const COMMAND_MESSAGE_ALIAS: &str = "DSC";

/// Class name of an `AcknowledgeMessage`
pub const ACKNOWLEDGE_MESSAGE: &str = "flex.messaging.messages.AcknowledgeMessage";

/// Class name of an externalized `AcknowledgeMessage`
pub const ACKNOWLEDGE_MESSAGE_EXT: &str = "flex.messaging.messages.AcknowledgeMessageExt";

/// Class name of an `ErrorMessage`
pub const ERROR_MESSAGE: &str = "flex.messaging.messages.ErrorMessage";

/// Class name of a `RemotingMessage`
pub const REMOTING_MESSAGE: &str = "flex.messaging.messages.RemotingMessage";

/// Class name of an `ArrayCollection`
pub const ARRAY_COLLECTION: &str = "flex.messaging.io.ArrayCollection";

/// Class name of an `ObjectProxy`
pub const OBJECT_PROXY: &str = "flex.messaging.io.ObjectProxy";

/// Is this value an acknowledge message, externalized or not
pub fn is_acknowledge_message(value: &Value) -> bool {
    matches!(
        value.class_name(),
        Some(ACKNOWLEDGE_MESSAGE_ALIAS | ACKNOWLEDGE_MESSAGE | ACKNOWLEDGE_MESSAGE_EXT)
    )
}

/// Is this value an error message
pub fn is_error_message(value: &Value) -> bool {
    value.class_name() == Some(ERROR_MESSAGE)
}

/// The body of an acknowledge message, or the value itself for anything else
///
/// AMF3 switch layers are removed first.
pub fn unwrap_acknowledge(value: &Rc<Value>) -> Rc<Value> {
    let value = value.unwrap_amf3();
    if is_acknowledge_message(&value) {
        if let Some(body) = value.get("body") {
            return body.unwrap_amf3();
        }
        return Rc::new(Value::Null);
    }
    value
}

/// Render 16 bytes as an uppercase UUID string
fn uuid_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    let hex = |range: std::ops::Range<usize>| {
        bytes[range]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<String>()
    };
    Some(format!(
        "{}-{}-{}-{}-{}",
        hex(0..4),
        hex(4..6),
        hex(6..8),
        hex(8..10),
        hex(10..16)
    ))
}
