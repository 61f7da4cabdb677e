/// Support for reading AMF0 data
pub mod read;
/// AMF0 type markers
mod type_marker;
/// Support for writing AMF0 data
pub mod write;
