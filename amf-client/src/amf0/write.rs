//! Support for encoding AMF0
use crate::amf0::type_marker::TypeMarker;
use crate::amf3::write::AMF3Encoder;
use crate::errors::Error;
use crate::nom_utils::write_string;
use crate::types::{Element, Value};
use std::ops::Deref;
use std::rc::Rc;

type Result = std::result::Result<(), Error<'static>>;

fn write_type_marker(out: &mut Vec<u8>, type_: TypeMarker) {
    out.push(type_ as u8);
}

fn write_number_element(out: &mut Vec<u8>, n: f64) {
    write_type_marker(out, TypeMarker::Number);
    out.extend(n.to_be_bytes());
}

fn write_bool_element(out: &mut Vec<u8>, b: bool) {
    write_type_marker(out, TypeMarker::Boolean);
    out.push(u8::from(b));
}

fn write_long_string_content(out: &mut Vec<u8>, s: &str) -> Result {
    let length = u32::try_from(s.len()).map_err(|_| Error::ValueTooLarge)?;
    out.extend(length.to_be_bytes());
    out.extend(s.as_bytes());
    Ok(())
}

fn write_string_element(out: &mut Vec<u8>, s: &str) -> Result {
    if s.len() > usize::from(u16::MAX) {
        write_type_marker(out, TypeMarker::LongString);
        write_long_string_content(out, s)
    } else {
        write_type_marker(out, TypeMarker::String);
        write_string(out, s)
    }
}

fn write_date_element(out: &mut Vec<u8>, date: f64, tz: Option<u16>) {
    write_type_marker(out, TypeMarker::Date);
    out.extend(date.to_be_bytes());
    out.extend(tz.unwrap_or(0).to_be_bytes());
}

fn write_xml_element(out: &mut Vec<u8>, content: &str) -> Result {
    write_type_marker(out, TypeMarker::Xml);
    write_long_string_content(out, content)
}

fn write_object_end(out: &mut Vec<u8>) {
    out.extend(0u16.to_be_bytes());
    write_type_marker(out, TypeMarker::ObjectEnd);
}

/// Handles encoding AMF0
///
/// Values that only exist in AMF3 are written behind the AMF3 switch marker, sharing one
/// AMF3 encoder so its reference tables stay in step with a decoder reading the same stream.
#[derive(Default)]
pub struct AMF0Encoder {
    /// The encoder used for values written behind the AMF3 switch marker
    pub amf3_encoder: AMF3Encoder,
}

impl AMF0Encoder {
    fn write_element(&mut self, out: &mut Vec<u8>, element: &Element) -> Result {
        write_string(out, &element.name)?;
        self.write_value(out, &element.value)
    }

    fn write_properties(&mut self, out: &mut Vec<u8>, elements: &[Element]) -> Result {
        for element in elements {
            self.write_element(out, element)?;
        }
        write_object_end(out);
        Ok(())
    }

    fn write_strict_array_element(&mut self, out: &mut Vec<u8>, elements: &[Rc<Value>]) -> Result {
        write_type_marker(out, TypeMarker::Array);
        let length = u32::try_from(elements.len()).map_err(|_| Error::ValueTooLarge)?;
        out.extend(length.to_be_bytes());
        for element in elements {
            self.write_value(out, element)?;
        }
        Ok(())
    }

    fn write_mixed_array(
        &mut self,
        out: &mut Vec<u8>,
        dense: &[Rc<Value>],
        elements: &[Element],
        length: u32,
    ) -> Result {
        write_type_marker(out, TypeMarker::MixedArrayStart);
        out.extend(length.to_be_bytes());
        for (idx, value) in dense.iter().enumerate() {
            write_string(out, &idx.to_string())?;
            self.write_value(out, value)?;
        }
        self.write_properties(out, elements)
    }

    fn write_amf3(&mut self, out: &mut Vec<u8>, value: &Value) -> Result {
        write_type_marker(out, TypeMarker::AMF3);
        self.amf3_encoder.write_value(out, value)
    }

    /// Write a single value
    pub fn write_value(&mut self, out: &mut Vec<u8>, value: &Value) -> Result {
        match value {
            Value::Number(n) => write_number_element(out, *n),
            Value::Integer(i) => write_number_element(out, f64::from(*i)),
            Value::Bool(b) => write_bool_element(out, *b),
            Value::String(s) => write_string_element(out, s)?,
            Value::Object(elements, Some(class_def)) if !class_def.is_anonymous() => {
                write_type_marker(out, TypeMarker::TypedObject);
                write_string(out, &class_def.name)?;
                self.write_properties(out, elements)?;
            }
            Value::Object(elements, _) => {
                write_type_marker(out, TypeMarker::Object);
                self.write_properties(out, elements)?;
            }
            Value::Null => write_type_marker(out, TypeMarker::Null),
            Value::Undefined => write_type_marker(out, TypeMarker::Undefined),
            Value::StrictArray(a) => self.write_strict_array_element(out, a)?,
            Value::Date(d, tz) => write_date_element(out, *d, *tz),
            Value::Unsupported => write_type_marker(out, TypeMarker::Unsupported),
            Value::XML(x, _string) => write_xml_element(out, x)?,
            Value::ECMAArray(dense, elems, elems_length) => {
                self.write_mixed_array(out, dense, elems, *elems_length)?
            }
            Value::AMF3(e) => self.write_amf3(out, e.deref())?,
            Value::ByteArray(_)
            | Value::VectorInt(..)
            | Value::VectorUInt(..)
            | Value::VectorDouble(..)
            | Value::VectorObject(..)
            | Value::Dictionary(..)
            | Value::Custom(..) => self.write_amf3(out, value)?,
        }
        Ok(())
    }
}

/// Write a single value to a new buffer
pub fn write_to_bytes(value: &Value) -> std::result::Result<Vec<u8>, Error<'static>> {
    let mut out = Vec::new();
    AMF0Encoder::default().write_value(&mut out, value)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::write_to_bytes;
    use crate::amf0::read::AMF0Decoder;
    use crate::types::{Element, Value};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn writes_short_string() {
        assert_eq!(
            write_to_bytes(&Value::String("foo".into())).unwrap(),
            vec![0x02, 0x00, 0x03, b'f', b'o', b'o']
        );
    }

    #[test]
    fn writes_long_string_marker_past_u16() {
        let long = "a".repeat(70_000);
        let bytes = write_to_bytes(&Value::String(long)).unwrap();
        assert_eq!(bytes[0], 0x0C);
        assert_eq!(&bytes[1..5], &70_000u32.to_be_bytes());
    }

    #[test]
    fn integers_become_numbers() {
        assert_eq!(
            write_to_bytes(&Value::Integer(1)).unwrap(),
            write_to_bytes(&Value::Number(1.0)).unwrap()
        );
    }

    #[test]
    fn typed_object_is_read_back_with_its_class() {
        let v = Value::typed_object(
            "remoting.Thing",
            vec![Element::new("id", 7.0), Element::new("tags", Value::array([Value::from("a")]))],
        );
        let bytes = write_to_bytes(&v).unwrap();
        let (_, read) = AMF0Decoder::default().parse_single_element(&bytes).unwrap();
        assert_eq!(*read, v);
    }

    #[test]
    fn byte_arrays_use_the_amf3_switch() {
        let bytes = write_to_bytes(&Value::ByteArray(vec![1, 2])).unwrap();
        assert_eq!(bytes, vec![0x11, 0x0C, 0x05, 1, 2]);
        let (_, read) = AMF0Decoder::default().parse_single_element(&bytes).unwrap();
        assert_eq!(*read, Value::AMF3(Rc::new(Value::ByteArray(vec![1, 2]))));
    }
}
