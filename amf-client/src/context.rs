//! Codec configuration shared by every call of a session
use crate::amf0::read::DEFAULT_MAX_NEST_LEVEL;
use crate::extra::flex;
use crate::packet::read::PacketDecoder;
use crate::packet::write::PacketEncoder;

/// Settings for encoding requests and decoding responses
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializationContext {
    /// Write the exact length of every header and message body instead of `0xFFFFFFFF`
    pub exact_lengths: bool,

    /// How deeply values in a response may nest, at least 1
    pub max_object_nest_level: usize,

    /// Understand externalized Flex messages and collections
    pub flex_messages: bool,
}

impl Default for SerializationContext {
    fn default() -> Self {
        Self {
            exact_lengths: true,
            max_object_nest_level: DEFAULT_MAX_NEST_LEVEL,
            flex_messages: true,
        }
    }
}

impl SerializationContext {
    /// A packet decoder configured by this context
    pub fn packet_decoder(&self) -> PacketDecoder {
        let mut decoder = PacketDecoder {
            max_nest_level: self.max_object_nest_level.max(1),
            ..PacketDecoder::default()
        };
        if self.flex_messages {
            flex::read::register_decoders(&mut decoder.external_decoders);
        }
        decoder
    }

    /// A packet encoder configured by this context
    pub fn packet_encoder(&self) -> PacketEncoder {
        let mut encoder = PacketEncoder {
            exact_lengths: self.exact_lengths,
            ..PacketEncoder::default()
        };
        if self.flex_messages {
            flex::write::register_encoders(&mut encoder.external_encoders);
        }
        encoder
    }
}
