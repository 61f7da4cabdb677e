//! Handles decoding of flex types

use crate::amf3::custom_encoder::ExternalDecoderFn;
use crate::amf3::read::AMF3Decoder;
use crate::extra::flex::{
    ACKNOWLEDGE_MESSAGE_ALIAS, ACKNOWLEDGE_MESSAGE_EXT, ARRAY_COLLECTION, ASYNC_MESSAGE_ALIAS,
    BODY_FLAG, CLIENT_ID_BYTES_FLAG, CLIENT_ID_FLAG, COMMAND_MESSAGE_ALIAS,
    CORRELATION_ID_BYTES_FLAG, CORRELATION_ID_FLAG, DESTINATION_ID_FLAG, HEADERS_FLAG,
    MESSAGE_ID_BYTES_FLAG, MESSAGE_ID_FLAG, NEXT_FLAG, OBJECT_PROXY, OPERATION_FLAG,
    TIMESTAMP_FLAG, TTL_FLAG, uuid_string,
};
use crate::nom_utils::AMFResult;
use crate::types::{Element, Value};
use nom::number::complete::be_u8;
use std::collections::HashMap;
use std::rc::Rc;

fn parse_flags(i: &[u8]) -> AMFResult<'_, Vec<u8>> {
    let mut flags = Vec::new();

    let mut i = i;
    loop {
        let (j, flag) = be_u8(i)?;
        flags.push(flag);
        i = j;
        if flag & NEXT_FLAG == 0 {
            break;
        }
    }

    Ok((i, flags))
}

/// Read the values of the flags above `reserved`, these belong to newer versions of a message
fn skip_unknown<'a>(
    i: &'a [u8],
    amf3: &mut AMF3Decoder,
    flags: u8,
    reserved: u8,
) -> AMFResult<'a, ()> {
    let mut i = i;
    if (flags >> reserved) != 0 {
        for j in reserved..6 {
            if (flags >> j) & 1 != 0 {
                let (k, _) = amf3.parse_single_element(i)?;
                i = k;
            }
        }
    }
    Ok((i, ()))
}

/// Read the value of every set flag in `fields`, in order
fn parse_fields<'a>(
    i: &'a [u8],
    amf3: &mut AMF3Decoder,
    flags: u8,
    fields: &[(u8, &str)],
    elements: &mut Vec<Element>,
) -> AMFResult<'a, ()> {
    let mut i = i;
    for (flag, name) in fields {
        if flags & flag != 0 {
            let (j, value) = amf3.parse_single_element(i)?;
            elements.push(Element {
                name: name.to_string(),
                value,
            });
            i = j;
        }
    }
    Ok((i, ()))
}

/// Replace the `<name>Bytes` element with a `<name>` UUID string
fn bytes_to_uuid(elements: &mut Vec<Element>, name: &str) {
    let bytes_name = format!("{name}Bytes");
    let Some(pos) = elements.iter().position(|e| e.name == bytes_name) else {
        return;
    };
    let uuid = match elements[pos].value.as_ref() {
        Value::ByteArray(bytes) => uuid_string(bytes),
        _ => None,
    };
    if let Some(uuid) = uuid {
        elements.remove(pos);
        elements.retain(|e| e.name != name);
        elements.push(Element::new(name, uuid));
    }
}

fn parse_abstract_message<'a>(i: &'a [u8], amf3: &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>> {
    let (i, flags) = parse_flags(i)?;

    let mut elements = Vec::new();

    let mut i = i;
    for (pos, flags) in flags.into_iter().enumerate() {
        let reserved = match pos {
            0 => {
                let (j, _) = parse_fields(
                    i,
                    amf3,
                    flags,
                    &[
                        (BODY_FLAG, "body"),
                        (CLIENT_ID_FLAG, "clientId"),
                        (DESTINATION_ID_FLAG, "destination"),
                        (HEADERS_FLAG, "headers"),
                        (MESSAGE_ID_FLAG, "messageId"),
                        (TIMESTAMP_FLAG, "timestamp"),
                        (TTL_FLAG, "timeToLive"),
                    ],
                    &mut elements,
                )?;
                i = j;
                7
            }
            1 => {
                let (j, _) = parse_fields(
                    i,
                    amf3,
                    flags,
                    &[
                        (CLIENT_ID_BYTES_FLAG, "clientIdBytes"),
                        (MESSAGE_ID_BYTES_FLAG, "messageIdBytes"),
                    ],
                    &mut elements,
                )?;
                i = j;
                2
            }
            _ => 0,
        };

        let (j, _) = skip_unknown(i, amf3, flags, reserved)?;
        i = j;
    }

    bytes_to_uuid(&mut elements, "clientId");
    bytes_to_uuid(&mut elements, "messageId");

    Ok((i, elements))
}

fn parse_async_message<'a>(i: &'a [u8], amf3: &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>> {
    let (i, mut elements) = parse_abstract_message(i, amf3)?;
    let (i, flags) = parse_flags(i)?;

    let mut i = i;
    for (pos, flags) in flags.into_iter().enumerate() {
        let reserved = if pos == 0 {
            let (j, _) = parse_fields(
                i,
                amf3,
                flags,
                &[
                    (CORRELATION_ID_FLAG, "correlationId"),
                    (CORRELATION_ID_BYTES_FLAG, "correlationIdBytes"),
                ],
                &mut elements,
            )?;
            i = j;
            2
        } else {
            0
        };

        let (j, _) = skip_unknown(i, amf3, flags, reserved)?;
        i = j;
    }

    bytes_to_uuid(&mut elements, "correlationId");

    Ok((i, elements))
}

fn parse_acknowledge_message<'a>(
    i: &'a [u8],
    amf3: &mut AMF3Decoder,
) -> AMFResult<'a, Vec<Element>> {
    let (i, elements) = parse_async_message(i, amf3)?;
    let (i, flags) = parse_flags(i)?;

    let mut i = i;
    for flags in flags {
        let (j, _) = skip_unknown(i, amf3, flags, 0)?;
        i = j;
    }

    Ok((i, elements))
}

fn parse_command_message<'a>(i: &'a [u8], amf3: &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>> {
    let (i, mut elements) = parse_async_message(i, amf3)?;
    let (i, flags) = parse_flags(i)?;

    let mut i = i;
    for (pos, flags) in flags.into_iter().enumerate() {
        let reserved = if pos == 0 {
            let (j, _) = parse_fields(
                i,
                amf3,
                flags,
                &[(OPERATION_FLAG, "operation")],
                &mut elements,
            )?;
            i = j;
            1
        } else {
            0
        };

        let (j, _) = skip_unknown(i, amf3, flags, reserved)?;
        i = j;
    }

    Ok((i, elements))
}

// all arrays
fn parse_array_collection<'a>(i: &'a [u8], amf3: &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>> {
    let (i, value) = amf3.parse_single_element(i)?;

    Ok((
        i,
        vec![Element {
            name: "source".to_string(),
            value,
        }],
    ))
}

// all proxies
fn parse_object_proxy<'a>(i: &'a [u8], amf3: &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>> {
    let (i, value) = amf3.parse_single_element(i)?;

    Ok((
        i,
        vec![Element {
            name: "object".to_string(),
            value,
        }],
    ))
}

/// The contents of a decoded `ArrayCollection` or `ObjectProxy`, the value itself otherwise
pub fn unwrap_collection(value: &Rc<Value>) -> Rc<Value> {
    match value.as_ref() {
        Value::Custom(custom, _, Some(def))
            if def.name == ARRAY_COLLECTION || def.name == OBJECT_PROXY =>
        {
            custom
                .first()
                .map(|e| Rc::clone(&e.value))
                .unwrap_or_else(|| Rc::new(Value::Null))
        }
        _ => Rc::clone(value),
    }
}

/// Register the flex decoders into the given table of external decoders
pub fn register_decoders(decoders: &mut HashMap<String, ExternalDecoderFn>) {
    let table: [(&str, ExternalDecoderFn); 13] = [
        (ACKNOWLEDGE_MESSAGE_ALIAS, parse_acknowledge_message),
        (ACKNOWLEDGE_MESSAGE_EXT, parse_acknowledge_message),
        (ASYNC_MESSAGE_ALIAS, parse_async_message),
        ("flex.messaging.messages.AsyncMessageExt", parse_async_message),
        (COMMAND_MESSAGE_ALIAS, parse_command_message),
        ("flex.messaging.messages.CommandMessageExt", parse_command_message),
        ("flex.messaging.messages.AbstractMessage", parse_abstract_message),
        (ARRAY_COLLECTION, parse_array_collection),
        ("flex.messaging.io.ArrayList", parse_array_collection),
        ("mx.collections.ArrayCollection", parse_array_collection),
        (OBJECT_PROXY, parse_object_proxy),
        ("flex.messaging.io.ManagedObjectProxy", parse_object_proxy),
        ("flex.messaging.io.SerializationProxy", parse_object_proxy),
    ];
    for (name, decoder) in table {
        decoders.insert(name.to_string(), decoder);
    }
}

#[cfg(test)]
mod tests {
    use super::{register_decoders, unwrap_collection};
    use crate::amf3::read::AMF3Decoder;
    use crate::extra::flex::unwrap_acknowledge;
    use crate::types::Value;
    use pretty_assertions::assert_eq;

    fn decoder() -> AMF3Decoder {
        let mut decoder = AMF3Decoder::default();
        register_decoders(&mut decoder.external_decoders);
        decoder
    }

    #[test]
    fn reads_acknowledge_message() {
        let mut bytes = vec![
            0x0A, 0x07, 0x07, b'D', b'S', b'K', // externalized DSK
            0x81, // body, next flags byte follows
            0x02, // message id bytes
            0x06, 0x05, b'o', b'k', // body: "ok"
            0x0C, 0x21, // 16 byte array
        ];
        bytes.extend(0u8..16);
        bytes.extend([
            0x01, // correlation id
            0x06, 0x03, b'c', // "c"
            0x00, // no acknowledge flags
        ]);

        let (rest, value) = decoder().parse_single_element(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value.class_name(), Some("DSK"));
        assert_eq!(
            value.get("messageId").and_then(|v| v.as_str()),
            Some("00010203-0405-0607-0809-0A0B0C0D0E0F")
        );
        assert_eq!(value.get("correlationId").and_then(|v| v.as_str()), Some("c"));
        assert_eq!(unwrap_acknowledge(&value).as_str(), Some("ok"));
    }

    #[test]
    fn unknown_flags_are_skipped() {
        let bytes = [
            0x0A, 0x07, 0x07, b'D', b'S', b'A', // externalized DSA
            0x00, // no abstract fields
            0x04, // unknown async field at bit 2
            0x01, // null
        ];
        let (rest, value) = decoder().parse_single_element(&bytes).unwrap();
        assert!(rest.is_empty());
        assert!(matches!(value.as_ref(), Value::Custom(custom, _, _) if custom.is_empty()));
    }

    #[test]
    fn reads_array_collection() {
        let mut bytes = vec![0x0A, 0x07, 0x43];
        bytes.extend(b"flex.messaging.io.ArrayCollection");
        bytes.extend([0x09, 0x03, 0x01, 0x04, 0x07]);

        let (_, value) = decoder().parse_single_element(&bytes).unwrap();
        assert_eq!(*unwrap_collection(&value), Value::array([Value::Integer(7)]));
    }
}
