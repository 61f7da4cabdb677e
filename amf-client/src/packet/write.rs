//! Handles writing of AMF packets

use std::collections::HashMap;
use std::rc::Rc;

use crate::amf0::write::AMF0Encoder;
use crate::amf3::custom_encoder::CustomEncoder;
use crate::amf3::write::AMF3Encoder;
use crate::errors::Error;
use crate::nom_utils::write_string;
use crate::packet::{Header, Message, Packet};
use crate::types::Value;

/// Encodes AMF packets
///
/// Every header and message body is written with fresh reference tables.
pub struct PacketEncoder {
    /// Write the real length of every body, otherwise the "unknown" length `0xFFFFFFFF` is used
    pub exact_lengths: bool,

    /// Encoders used for externalized AMF3 types
    pub external_encoders: HashMap<String, Rc<dyn CustomEncoder>>,
}

impl Default for PacketEncoder {
    fn default() -> Self {
        Self {
            exact_lengths: true,
            external_encoders: HashMap::new(),
        }
    }
}

impl PacketEncoder {
    fn write_body(&self, value: &Value, out: &mut Vec<u8>) -> Result<(), Error<'static>> {
        let mut amf3_encoder = AMF3Encoder::default();
        amf3_encoder.external_encoders = self.external_encoders.clone();
        let mut encoder = AMF0Encoder { amf3_encoder };
        let mut body = Vec::new();
        encoder.write_value(&mut body, value)?;

        if self.exact_lengths {
            let body_length = u32::try_from(body.len()).map_err(|_| Error::PacketTooLarge)?;
            out.extend(body_length.to_be_bytes());
        } else {
            out.extend(u32::MAX.to_be_bytes());
        }
        out.append(&mut body);
        Ok(())
    }

    fn write_header(&self, header: &Header, out: &mut Vec<u8>) -> Result<(), Error<'static>> {
        write_string(out, &header.name).map_err(|_| Error::PacketTooLarge)?;
        out.push(u8::from(header.must_understand));
        self.write_body(&header.value, out)
    }

    fn write_message(&self, message: &Message, out: &mut Vec<u8>) -> Result<(), Error<'static>> {
        write_string(out, &message.target_uri).map_err(|_| Error::PacketTooLarge)?;
        write_string(out, &message.response_uri).map_err(|_| Error::PacketTooLarge)?;
        self.write_body(&message.contents, out)
    }

    /// Write a packet to a vec of bytes
    pub fn write(&self, packet: &Packet) -> Result<Vec<u8>, Error<'static>> {
        let mut buffer = vec![0, u8::from(packet.version)];

        // Headers
        let header_count =
            u16::try_from(packet.headers.len()).map_err(|_| Error::PacketTooLarge)?;
        buffer.extend(header_count.to_be_bytes());
        for header in &packet.headers {
            self.write_header(header, &mut buffer)?;
        }

        // Messages
        let message_count =
            u16::try_from(packet.messages.len()).map_err(|_| Error::PacketTooLarge)?;
        buffer.extend(message_count.to_be_bytes());
        for message in &packet.messages {
            self.write_message(message, &mut buffer)?;
        }

        Ok(buffer)
    }
}

/// Write a packet to a vec of bytes
pub fn write_to_bytes(packet: &Packet, exact_lengths: bool) -> Result<Vec<u8>, Error<'static>> {
    PacketEncoder {
        exact_lengths,
        ..PacketEncoder::default()
    }
    .write(packet)
}

#[cfg(test)]
mod tests {
    use super::write_to_bytes;
    use crate::packet::read::parse;
    use crate::packet::{Header, Message, Packet};
    use crate::types::{AMFVersion, Value};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn request() -> Packet {
        Packet {
            version: AMFVersion::AMF3,
            headers: vec![Header {
                name: "token".to_string(),
                must_understand: false,
                value: Rc::new(Value::from("abc")),
            }],
            messages: vec![Message {
                target_uri: "echo.echoString".to_string(),
                response_uri: "/1".to_string(),
                contents: Rc::new(Value::AMF3(Rc::new(Value::array([Value::from("hi")])))),
            }],
        }
    }

    #[test]
    fn written_packet_reads_back() {
        let packet = request();
        let bytes = write_to_bytes(&packet, true).unwrap();
        assert_eq!(parse(&bytes).unwrap(), packet);
    }

    #[test]
    fn unknown_lengths() {
        let bytes = write_to_bytes(&request(), false).unwrap();
        let header_length = &bytes[4 + 2 + 5 + 1..4 + 2 + 5 + 1 + 4];
        assert_eq!(header_length, &[0xFF; 4]);
        assert_eq!(parse(&bytes).unwrap(), request());
    }

    #[test]
    fn long_target_is_rejected() {
        let mut packet = request();
        packet.messages[0].target_uri = "x".repeat(70_000);
        assert!(write_to_bytes(&packet, true).is_err());
    }
}
