//! Support for encoding AMF3
use crate::amf3::custom_encoder::CustomEncoder;
use crate::amf3::element_cache::ElementCache;
use crate::amf3::length::Length;
use crate::amf3::type_marker::TypeMarker;
use crate::errors::Error;
use crate::types::{Attribute, ClassDefinition, Element, Value};
use std::collections::HashMap;
use std::rc::Rc;

type Result = std::result::Result<(), Error<'static>>;

/// The smallest value that can be written as an AMF3 integer
const MIN_INT: i32 = -(1 << 28);

/// The largest value that can be written as an AMF3 integer
const MAX_INT: i32 = (1 << 28) - 1;

/// Write a variable length unsigned 29 bit integer, higher bits are ignored
pub(crate) fn write_u29(out: &mut Vec<u8>, n: u32) {
    let n = n & 0x1FFF_FFFF;
    if n < 0x80 {
        out.push(n as u8);
    } else if n < 0x4000 {
        out.push(((n >> 7) & 0x7F) as u8 | 0x80);
        out.push((n & 0x7F) as u8);
    } else if n < 0x20_0000 {
        out.push(((n >> 14) & 0x7F) as u8 | 0x80);
        out.push(((n >> 7) & 0x7F) as u8 | 0x80);
        out.push((n & 0x7F) as u8);
    } else {
        out.push(((n >> 22) & 0x7F) as u8 | 0x80);
        out.push(((n >> 15) & 0x7F) as u8 | 0x80);
        out.push(((n >> 8) & 0x7F) as u8 | 0x80);
        out.push((n & 0xFF) as u8);
    }
}

/// Write a signed 29 bit integer, the caller checks the range
fn write_int(out: &mut Vec<u8>, i: i32) {
    write_u29(out, i as u32);
}

/// A size that fits in the 28 bits left after the reference flag
fn to_size(len: usize) -> std::result::Result<u32, Error<'static>> {
    match u32::try_from(len) {
        Ok(len) if len < (1 << 28) => Ok(len),
        _ => Err(Error::ValueTooLarge),
    }
}

fn write_type_marker(out: &mut Vec<u8>, type_: TypeMarker) {
    out.push(type_ as u8);
}

/// Handles encoding AMF3
///
/// Strings and traits are written once and referenced afterwards. Objects are always
/// written inline.
#[derive(Default)]
pub struct AMF3Encoder {
    /// The table used to cache repeated byte strings
    string_reference_table: ElementCache<String>,

    /// The table used to cache repeated trait definitions
    trait_reference_table: ElementCache<ClassDefinition>,

    /// Encoders used for handling externalized types
    pub external_encoders: HashMap<String, Rc<dyn CustomEncoder>>,
}

impl AMF3Encoder {
    /// Forget every string and trait written so far
    pub fn reset(&mut self) {
        self.string_reference_table = ElementCache::default();
        self.trait_reference_table = ElementCache::default();
    }

    /// Write a string without a type marker, as used for names and class names
    pub(crate) fn write_string(&mut self, out: &mut Vec<u8>, s: &str) -> Result {
        if s.is_empty() {
            Length::Size(0).write(out);
            return Ok(());
        }

        let len = self
            .string_reference_table
            .to_length_store(s.to_string(), to_size(s.len())?);
        len.write(out);
        if !len.is_reference() {
            out.extend(s.as_bytes());
        }
        Ok(())
    }

    /// Write a length prefixed run of bytes without a type marker
    pub(crate) fn write_byte_stream(&mut self, out: &mut Vec<u8>, bytes: &[u8]) -> Result {
        Length::Size(to_size(bytes.len())?).write(out);
        out.extend(bytes);
        Ok(())
    }

    fn write_number(&mut self, out: &mut Vec<u8>, n: f64) {
        write_type_marker(out, TypeMarker::Number);
        out.extend(n.to_be_bytes());
    }

    fn write_integer(&mut self, out: &mut Vec<u8>, i: i32) {
        if (MIN_INT..=MAX_INT).contains(&i) {
            write_type_marker(out, TypeMarker::Integer);
            write_int(out, i);
        } else {
            self.write_number(out, f64::from(i));
        }
    }

    fn write_xml(&mut self, out: &mut Vec<u8>, content: &str, string: bool) -> Result {
        let marker = if string {
            TypeMarker::XmlString
        } else {
            TypeMarker::Xml
        };
        write_type_marker(out, marker);
        self.write_byte_stream(out, content.as_bytes())
    }

    fn write_date(&mut self, out: &mut Vec<u8>, millis: f64) {
        write_type_marker(out, TypeMarker::Date);
        Length::Size(0).write(out);
        out.extend(millis.to_be_bytes());
    }

    fn write_dynamic_elements<'e>(
        &mut self,
        out: &mut Vec<u8>,
        elements: impl Iterator<Item = &'e Element>,
    ) -> Result {
        for element in elements {
            self.write_string(out, &element.name)?;
            self.write_value(out, &element.value)?;
        }
        // End of the dynamic members
        self.write_string(out, "")
    }

    fn write_array(&mut self, out: &mut Vec<u8>, dense: &[Rc<Value>], assoc: &[Element]) -> Result {
        write_type_marker(out, TypeMarker::Array);
        Length::Size(to_size(dense.len())?).write(out);
        self.write_dynamic_elements(out, assoc.iter())?;
        for value in dense {
            self.write_value(out, value)?;
        }
        Ok(())
    }

    /// Write the traits of an object, either as a reference or inline
    fn write_class_def(&mut self, out: &mut Vec<u8>, class_def: &ClassDefinition) -> Result {
        if let Some(index) = self.trait_reference_table.get_index(class_def) {
            let index = to_size(index)?;
            write_u29(out, (index << 2) | 0b01);
            return Ok(());
        }

        let count = to_size(class_def.static_properties.len())?;
        let mut header = count << 4;
        if class_def.is_dynamic() {
            header |= 0b1000;
        }
        if class_def.is_external() {
            header |= 0b0100;
        }
        write_u29(out, header | 0b11);

        self.write_string(out, &class_def.name)?;
        for name in class_def.static_properties.iter() {
            self.write_string(out, name)?;
        }

        self.trait_reference_table.store(class_def.clone());
        Ok(())
    }

    fn write_object(
        &mut self,
        out: &mut Vec<u8>,
        elements: &[Element],
        class_def: Option<&ClassDefinition>,
    ) -> Result {
        let mut class_def = class_def.cloned().unwrap_or_default();
        // A sealed definition with no declared members is sealed over whatever it holds
        if !class_def.is_dynamic() && class_def.static_properties.is_empty() {
            class_def.static_properties = elements.iter().map(|e| e.name.clone()).collect();
        }

        write_type_marker(out, TypeMarker::Object);
        self.write_class_def(out, &class_def)?;

        for name in class_def.static_properties.iter() {
            match elements.iter().find(|e| &e.name == name) {
                Some(element) => self.write_value(out, &element.value)?,
                None => write_type_marker(out, TypeMarker::Undefined),
            }
        }

        if class_def.is_dynamic() {
            let statics = &class_def.static_properties;
            self.write_dynamic_elements(
                out,
                elements.iter().filter(|e| !statics.contains(&e.name)),
            )?;
        }
        Ok(())
    }

    fn write_external(
        &mut self,
        out: &mut Vec<u8>,
        custom_elements: &[Element],
        class_def: Option<&ClassDefinition>,
    ) -> Result {
        let Some(class_def) = class_def else {
            return Err(Error::UnsupportedExternalClass(String::new()));
        };
        let Some(encoder) = self.external_encoders.get(&class_def.name).cloned() else {
            return Err(Error::UnsupportedExternalClass(class_def.name.clone()));
        };

        let mut class_def = class_def.clone();
        class_def.attributes |= Attribute::External;
        class_def.attributes.remove(Attribute::Dynamic);
        class_def.static_properties.clear();

        write_type_marker(out, TypeMarker::Object);
        self.write_class_def(out, &class_def)?;
        encoder.encode(custom_elements, &class_def, self, out)
    }

    fn write_vector_header(&mut self, out: &mut Vec<u8>, type_: TypeMarker, len: usize, fixed: bool) -> Result {
        write_type_marker(out, type_);
        Length::Size(to_size(len)?).write(out);
        out.push(u8::from(fixed));
        Ok(())
    }

    /// Write a single value
    pub fn write_value(&mut self, out: &mut Vec<u8>, value: &Value) -> Result {
        match value {
            Value::Undefined | Value::Unsupported => write_type_marker(out, TypeMarker::Undefined),
            Value::Null => write_type_marker(out, TypeMarker::Null),
            Value::Bool(false) => write_type_marker(out, TypeMarker::False),
            Value::Bool(true) => write_type_marker(out, TypeMarker::True),
            Value::Integer(i) => self.write_integer(out, *i),
            Value::Number(n) => self.write_number(out, *n),
            Value::String(s) => {
                write_type_marker(out, TypeMarker::String);
                self.write_string(out, s)?;
            }
            Value::XML(content, string) => self.write_xml(out, content, *string)?,
            Value::Date(millis, _) => self.write_date(out, *millis),
            Value::StrictArray(values) => self.write_array(out, values, &[])?,
            Value::ECMAArray(dense, assoc, _) => self.write_array(out, dense, assoc)?,
            Value::Object(elements, class_def) => {
                self.write_object(out, elements, class_def.as_ref())?
            }
            Value::Custom(custom_elements, _, class_def) => {
                self.write_external(out, custom_elements, class_def.as_ref())?
            }
            Value::ByteArray(bytes) => {
                write_type_marker(out, TypeMarker::ByteArray);
                self.write_byte_stream(out, bytes)?;
            }
            Value::VectorInt(items, fixed) => {
                self.write_vector_header(out, TypeMarker::VectorInt, items.len(), *fixed)?;
                for i in items {
                    out.extend(i.to_be_bytes());
                }
            }
            Value::VectorUInt(items, fixed) => {
                self.write_vector_header(out, TypeMarker::VectorUInt, items.len(), *fixed)?;
                for i in items {
                    out.extend(i.to_be_bytes());
                }
            }
            Value::VectorDouble(items, fixed) => {
                self.write_vector_header(out, TypeMarker::VectorDouble, items.len(), *fixed)?;
                for n in items {
                    out.extend(n.to_be_bytes());
                }
            }
            Value::VectorObject(items, type_name, fixed) => {
                self.write_vector_header(out, TypeMarker::VectorObject, items.len(), *fixed)?;
                self.write_string(out, type_name)?;
                for item in items {
                    self.write_value(out, item)?;
                }
            }
            Value::Dictionary(pairs, weak_keys) => {
                write_type_marker(out, TypeMarker::Dictionary);
                Length::Size(to_size(pairs.len())?).write(out);
                out.push(u8::from(*weak_keys));
                for (key, value) in pairs {
                    self.write_value(out, key)?;
                    self.write_value(out, value)?;
                }
            }
            Value::AMF3(inner) => self.write_value(out, inner)?,
        }
        Ok(())
    }
}
