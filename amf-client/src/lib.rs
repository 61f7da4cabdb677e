//! A client for AMF remoting gateways, and the AMF0 / AMF3 codecs it is built on
//!
//! [`client::AmfConnection`] invokes remote operations over HTTP POST, the codec modules
//! ([`amf0`], [`amf3`], [`packet`]) can be used on their own.
#![warn(missing_docs)]

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

/// Reading and writing of the AMF0 encoding
pub mod amf0;
/// Reading and writing of the AMF3 encoding
pub mod amf3;
/// Mapping between remote class names and local type ids
pub mod alias;
/// Invoking remote operations
pub mod client;
/// Codec configuration
pub mod context;
/// Errors of the codecs
pub mod errors;
/// Extensions to the AMF3 encoding
pub mod extra;
mod nom_utils;
/// Reading and writing of AMF packets
pub mod packet;
/// The value model shared by both encodings
pub mod types;

pub use nom_utils::AMFResult;
