//! Handles encoding of flex types

use crate::amf3::custom_encoder::CustomEncoder;
use crate::amf3::write::AMF3Encoder;
use crate::errors::Error;
use crate::extra::flex::{
    ACKNOWLEDGE_MESSAGE_ALIAS, ARRAY_COLLECTION, BODY_FLAG, CLIENT_ID_FLAG, CORRELATION_ID_FLAG,
    DESTINATION_ID_FLAG, ERROR_MESSAGE, HEADERS_FLAG, MESSAGE_ID_FLAG, OBJECT_PROXY,
    REMOTING_MESSAGE, TIMESTAMP_FLAG, TTL_FLAG,
};
use crate::types::{Attribute, ClassDefinition, Element, Value};
use std::collections::HashMap;
use std::rc::Rc;

type Result = std::result::Result<(), Error<'static>>;

/// Write the single wrapped value of a collection or proxy
struct Wrapper;

impl CustomEncoder for Wrapper {
    fn encode(
        &self,
        elements: &[Element],
        _class_def: &ClassDefinition,
        encoder: &mut AMF3Encoder,
        out: &mut Vec<u8>,
    ) -> Result {
        match elements.first() {
            Some(element) => encoder.write_value(out, &element.value),
            None => encoder.write_value(out, &Value::Null),
        }
    }
}

/// Write the flag byte for `fields` followed by the value of each field that is present
fn write_fields(
    elements: &[Element],
    fields: &[(u8, &str)],
    encoder: &mut AMF3Encoder,
    out: &mut Vec<u8>,
) -> Result {
    let present = fields
        .iter()
        .filter_map(|(flag, name)| {
            elements
                .iter()
                .find(|e| e.name == *name)
                .map(|e| (*flag, Rc::clone(&e.value)))
        })
        .collect::<Vec<_>>();

    out.push(present.iter().fold(0u8, |flags, (flag, _)| flags | *flag));
    for (_, value) in present {
        encoder.write_value(out, &value)?;
    }
    Ok(())
}

/// Writes acknowledge messages, ids are written as strings rather than as bytes
struct AcknowledgeMessage;

impl CustomEncoder for AcknowledgeMessage {
    fn encode(
        &self,
        elements: &[Element],
        _class_def: &ClassDefinition,
        encoder: &mut AMF3Encoder,
        out: &mut Vec<u8>,
    ) -> Result {
        write_fields(
            elements,
            &[
                (BODY_FLAG, "body"),
                (CLIENT_ID_FLAG, "clientId"),
                (DESTINATION_ID_FLAG, "destination"),
                (HEADERS_FLAG, "headers"),
                (MESSAGE_ID_FLAG, "messageId"),
                (TIMESTAMP_FLAG, "timestamp"),
                (TTL_FLAG, "timeToLive"),
            ],
            encoder,
            out,
        )?;
        write_fields(
            elements,
            &[(CORRELATION_ID_FLAG, "correlationId")],
            encoder,
            out,
        )?;
        // No acknowledge specific fields
        out.push(0);
        Ok(())
    }
}

/// Register the flex encoders into the given table of external encoders
pub fn register_encoders(encoders: &mut HashMap<String, Rc<dyn CustomEncoder>>) {
    let wrapper: Rc<dyn CustomEncoder> = Rc::new(Wrapper);
    encoders.insert(ARRAY_COLLECTION.to_string(), Rc::clone(&wrapper));
    encoders.insert("flex.messaging.io.ArrayList".to_string(), Rc::clone(&wrapper));
    encoders.insert(OBJECT_PROXY.to_string(), wrapper);
    encoders.insert(
        ACKNOWLEDGE_MESSAGE_ALIAS.to_string(),
        Rc::new(AcknowledgeMessage),
    );
}

fn external(name: &str, custom: Vec<Element>) -> Value {
    let mut class_def = ClassDefinition::default_with_name(name);
    class_def.attributes |= Attribute::External;
    Value::Custom(custom, Vec::new(), Some(class_def))
}

/// An `ArrayCollection` holding the given values
pub fn array_collection(values: impl IntoIterator<Item = Value>) -> Value {
    external(
        ARRAY_COLLECTION,
        vec![Element::new("source", Value::array(values))],
    )
}

/// An `ObjectProxy` wrapping the given object
pub fn object_proxy(object: Value) -> Value {
    external(OBJECT_PROXY, vec![Element::new("object", object)])
}

/// An externalized acknowledge message answering `correlation_id` with `body`
pub fn acknowledge_message(correlation_id: &str, body: Value) -> Value {
    external(
        ACKNOWLEDGE_MESSAGE_ALIAS,
        vec![
            Element::new("body", body),
            Element::new("correlationId", correlation_id),
        ],
    )
}

/// An error message carrying the given fault
pub fn error_message(fault_code: &str, fault_string: &str, fault_detail: Option<&str>) -> Value {
    Value::typed_object(
        ERROR_MESSAGE,
        vec![
            Element::new("faultCode", fault_code),
            Element::new("faultString", fault_string),
            Element::new("faultDetail", fault_detail),
        ],
    )
}

/// Builds a `RemotingMessage`, the Flex form of a remote call
#[derive(Debug, Clone, Default)]
pub struct RemotingMessage {
    destination: String,
    operation: String,
    source: Option<String>,
    message_id: String,
    client_id: Option<String>,
    headers: Vec<Element>,
    body: Vec<Value>,
}

impl RemotingMessage {
    /// A message invoking `operation` on `destination`, identified by `message_id`
    pub fn new(
        destination: impl Into<String>,
        operation: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            operation: operation.into(),
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Set the source (remote class) of the call
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the client id assigned by the broker
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Add a message header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.push(Element::new(name, value));
        self
    }

    /// Set the arguments of the call
    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.body = arguments;
        self
    }

    /// Build the message as a typed object
    pub fn build(self) -> Value {
        Value::typed_object(
            REMOTING_MESSAGE,
            vec![
                Element::new("body", Value::array(self.body)),
                Element::new("clientId", self.client_id),
                Element::new("destination", self.destination),
                Element::new("headers", Value::object(self.headers)),
                Element::new("messageId", self.message_id),
                Element::new("operation", self.operation),
                Element::new("source", self.source),
                Element::new("timeToLive", 0.0),
                Element::new("timestamp", 0.0),
            ],
        )
    }
}
