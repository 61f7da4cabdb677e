use crate::amf3::read::AMF3Decoder;
use crate::amf3::write::AMF3Encoder;
use crate::errors::Error;
use crate::nom_utils::AMFResult;
use crate::types::{ClassDefinition, Element};

/// A trait to define encoding for custom types for use with Externalized objects
pub trait CustomEncoder {
    /// This should implement the encoding of a given set of external elements for the given class definition
    /// Access to the AMF3Encoder is given to allow access to caches
    fn encode(
        &self,
        elements: &[Element],
        class_def: &ClassDefinition,
        encoder: &mut AMF3Encoder,
        out: &mut Vec<u8>,
    ) -> Result<(), Error<'static>>;
}

/// Decodes the body of an externalized object into a list of elements
pub type ExternalDecoderFn = for<'a> fn(&'a [u8], &mut AMF3Decoder) -> AMFResult<'a, Vec<Element>>;
