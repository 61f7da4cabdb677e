//! Handles reading of AMF packets
use std::collections::HashMap;

use nom::bytes::complete::tag;
use nom::combinator::all_consuming;
use nom::multi::length_count;
use nom::number::complete::{be_u16, be_u32, be_u8};

use crate::amf0;
use crate::amf0::read::{AMF0Decoder, DEFAULT_MAX_NEST_LEVEL};
use crate::amf3::custom_encoder::ExternalDecoderFn;
use crate::amf3::read::AMF3Decoder;
use crate::errors::Error;
use crate::nom_utils::{AMFResult, fail_with};
use crate::packet::{Header, Message, Packet};
use crate::types::AMFVersion;

/// Decodes AMF packets
///
/// Every header and message body is read with fresh reference tables, so references never
/// cross from one body to the next.
pub struct PacketDecoder {
    /// How deeply values may nest before decoding fails
    pub max_nest_level: usize,

    /// Decoders used for externalized AMF3 types
    pub external_decoders: HashMap<String, ExternalDecoderFn>,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self {
            max_nest_level: DEFAULT_MAX_NEST_LEVEL,
            external_decoders: HashMap::new(),
        }
    }
}

impl PacketDecoder {
    fn value_decoder(&self) -> AMF0Decoder {
        let mut amf3_decoder = AMF3Decoder::default();
        amf3_decoder.external_decoders = self.external_decoders.clone();
        amf3_decoder.max_nest_level = self.max_nest_level;
        AMF0Decoder::new(amf3_decoder)
    }

    fn parse_header<'a>(&self, decoder: &mut AMF0Decoder, i: &'a [u8]) -> AMFResult<'a, Header> {
        let (i, name) = amf0::read::parse_string(i)?;
        let (i, must_understand) = be_u8(i)?;
        let (i, _length) = be_u32(i)?;
        decoder.reset();
        let (i, value) = decoder.parse_single_element(i)?;

        Ok((
            i,
            Header {
                name: name.to_string(),
                must_understand: must_understand != 0,
                value,
            },
        ))
    }

    fn parse_message<'a>(&self, decoder: &mut AMF0Decoder, i: &'a [u8]) -> AMFResult<'a, Message> {
        let (i, target_uri) = amf0::read::parse_string(i)?;
        let (i, response_uri) = amf0::read::parse_string(i)?;
        let (i, _length) = be_u32(i)?;
        decoder.reset();
        let (i, contents) = decoder.parse_single_element(i)?;

        Ok((
            i,
            Message {
                target_uri: target_uri.to_string(),
                response_uri: response_uri.to_string(),
                contents,
            },
        ))
    }

    /// Read a given buffer as a packet
    ///
    /// Unlike parse, this function will not error if the entire slice isn't consumed
    /// and will return the data that was not parsed
    pub fn parse_incomplete<'a>(&self, i: &'a [u8]) -> AMFResult<'a, Packet> {
        let (i, _) = tag(&[0u8])(i)?;
        let (i, version) = be_u8(i)?;
        let Ok(version) = AMFVersion::try_from(version) else {
            return fail_with(Error::UnsupportedType(version));
        };

        let mut decoder = self.value_decoder();
        let (i, headers) = length_count(be_u16, |i| self.parse_header(&mut decoder, i))(i)?;
        let (i, messages) = length_count(be_u16, |i| self.parse_message(&mut decoder, i))(i)?;

        Ok((
            i,
            Packet {
                version,
                headers,
                messages,
            },
        ))
    }

    /// Read a given slice as a packet
    ///
    /// This function will return an error if the slice could not be parsed or if the entire slice
    /// was not consumed
    pub fn parse<'a>(&self, i: &'a [u8]) -> Result<Packet, nom::Err<Error<'a>>> {
        let (_, packet) = all_consuming(|i| self.parse_incomplete(i))(i)?;
        Ok(packet)
    }
}

/// Read a given slice as a packet with the default decoder
pub fn parse(i: &[u8]) -> Result<Packet, nom::Err<Error<'_>>> {
    PacketDecoder::default().parse(i)
}
