/// Support for custom encoders / decoders
pub mod custom_encoder;
/// Reference caches used while encoding
mod element_cache;
/// Abstraction over the AMF3 length and reference types
mod length;
/// Reading of AMF3 data
pub mod read;
/// AMF3 type markers
mod type_marker;
/// Writing of AMF3 data
pub mod write;
