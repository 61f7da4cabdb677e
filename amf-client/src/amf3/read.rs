use crate::amf0::read::DEFAULT_MAX_NEST_LEVEL;
use crate::amf3::custom_encoder::ExternalDecoderFn;
use crate::amf3::length::{INLINE_FLAG, Length};
use crate::amf3::type_marker::TypeMarker;
use crate::errors::Error;
use crate::nom_utils::{AMFResult, fail, fail_with};
use crate::types::{Attribute, ClassDefinition, Element, Value};
use enumset::EnumSet;
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::error::ErrorKind;
use nom::number::complete::{be_f64, be_i32, be_u32, be_u8};
use std::collections::HashMap;
use std::rc::Rc;

#[cfg(fuzzing)]
/// For fuzzing
pub fn fuzz_read_int_signed(i: &[u8]) -> AMFResult<'_, i32> {
    read_int_signed(i)
}

#[cfg(fuzzing)]
/// For fuzzing
pub fn fuzz_read_int(i: &[u8]) -> AMFResult<'_, u32> {
    read_int(i)
}

/// Read a variable length unsigned 29 bit integer
fn read_int(i: &[u8]) -> AMFResult<'_, u32> {
    // Read the first byte of the number
    let (mut i, num) = be_u8(i)?;
    let mut value = u32::from(num & 0b0111_1111);
    // Check if we have another byte
    if num & 0b1000_0000 == 0 {
        return Ok((i, value));
    }

    for _ in 0..2 {
        let (j, num) = be_u8(i)?;
        i = j;
        value = (value << 7) | u32::from(num & 0b0111_1111);
        // Check if we have another byte
        if num & 0b1000_0000 == 0 {
            return Ok((i, value));
        }
    }

    // The fourth byte contributes all 8 bits
    let (i, num) = be_u8(i)?;
    value = (value << 8) | u32::from(num);

    Ok((i, value))
}

/// Read a variable length signed 29 bit integer
#[allow(clippy::unusual_byte_groupings)]
fn read_int_signed(i: &[u8]) -> AMFResult<'_, i32> {
    let (i, value) = read_int(i)?;
    let mut value = value as i32;

    // Negate if the 29th bit is set
    if value & 0b000_1000000_0000000_0000000_00000000 != 0 {
        value -= 0b001_0000000_0000000_0000000_00000000;
    }

    Ok((i, value))
}

fn read_length(i: &[u8]) -> AMFResult<'_, Length> {
    map(read_int, Length::from_u29)(i)
}

fn to_usize<'a>(i: &'a [u8], len: u32) -> AMFResult<'a, usize> {
    match usize::try_from(len) {
        Ok(len) => Ok((i, len)),
        Err(_) => fail(i, ErrorKind::TooLarge),
    }
}

/// Handles decoding AMF3
pub struct AMF3Decoder {
    /// The table used to cache repeated strings
    pub string_reference_table: Vec<String>,

    /// The table used to cache repeated trait definitions
    pub trait_reference_table: Vec<ClassDefinition>,

    /// The table used to cache repeated objects, entries are `None` while the object is being read
    object_reference_table: Vec<Option<Rc<Value>>>,

    /// Decoders used for handling externalized types
    pub external_decoders: HashMap<String, ExternalDecoderFn>,

    /// How deeply compound values may nest before decoding fails
    pub max_nest_level: usize,

    /// Current nesting of compound values
    depth: usize,
}

impl Default for AMF3Decoder {
    fn default() -> Self {
        Self {
            string_reference_table: Vec::new(),
            trait_reference_table: Vec::new(),
            object_reference_table: Vec::new(),
            external_decoders: HashMap::new(),
            max_nest_level: DEFAULT_MAX_NEST_LEVEL,
            depth: 0,
        }
    }
}

fn parse_element_number(i: &[u8]) -> AMFResult<'_, Rc<Value>> {
    let (i, v) = map(be_f64, Value::Number)(i)?;
    Ok((i, Rc::new(v)))
}

fn parse_element_int(i: &[u8]) -> AMFResult<'_, Rc<Value>> {
    let (i, s) = map(read_int_signed, Value::Integer)(i)?;
    Ok((i, Rc::new(s)))
}

impl AMF3Decoder {
    /// Forget every string, trait and object read so far
    pub fn reset(&mut self) {
        self.string_reference_table.clear();
        self.trait_reference_table.clear();
        self.object_reference_table.clear();
        self.depth = 0;
    }

    fn enter(&mut self) -> Result<(), nom::Err<Error<'static>>> {
        self.depth += 1;
        if self.depth > self.max_nest_level {
            return Err(nom::Err::Error(Error::NestingTooDeep(self.max_nest_level)));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    #[cfg(fuzzing)]
    /// For fuzzing
    pub fn fuzz_parse_string<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, String> {
        self.parse_string(i)
    }

    /// Read a string, empty strings are never added to the reference table
    pub(crate) fn parse_string<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, String> {
        let (i, len) = read_length(i)?;

        match len {
            Length::Size(0) => Ok((i, String::new())),
            Length::Size(len) => {
                let (j, bytes) = take(len)(i)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| nom::Err::Error(Error::Nom(i, ErrorKind::Char)))?
                    .to_string();
                self.string_reference_table.push(s.clone());
                Ok((j, s))
            }
            Length::Reference(index) => match self.string_reference_table.get(index) {
                Some(s) => Ok((i, s.clone())),
                None => fail_with(Error::InvalidReference(index)),
            },
        }
    }

    fn parse_element_string<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, s) = self.parse_string(i)?;
        Ok((i, Rc::new(Value::String(s))))
    }

    /// Read the traits of an object, `header` is the U29O value with the object reference bit removed
    fn parse_class_def<'a>(&mut self, header: u32, i: &'a [u8]) -> AMFResult<'a, ClassDefinition> {
        if header & INLINE_FLAG == 0 {
            let index = (header >> 1) as usize;
            return match self.trait_reference_table.get(index) {
                Some(def) => Ok((i, def.clone())),
                None => fail_with(Error::InvalidReference(index)),
            };
        }
        let header = header >> 1;

        let (i, name) = self.parse_string(i)?;

        let encoding = header & 0x03;
        let (i, attributes_count) = to_usize(i, header >> 2)?;

        let is_external = encoding & 0b01 == 0b01;
        let is_dynamic = encoding & 0b10 == 0b10;

        // Each static property name is at least one byte, this prevents OOM errors with v.large counts
        if i.len() < attributes_count {
            return fail(i, ErrorKind::TooLarge);
        }

        // Read static attributes if they exist
        let mut static_properties = Vec::with_capacity(attributes_count);
        let mut i = i;
        for _ in 0..attributes_count {
            let (j, prop) = self.parse_string(i)?;
            static_properties.push(prop);
            i = j;
        }

        let mut attributes = EnumSet::empty();
        if is_external {
            attributes |= Attribute::External;
        }
        if is_dynamic {
            attributes |= Attribute::Dynamic;
        }

        let class_def = ClassDefinition {
            name,
            attributes,
            static_properties,
        };

        self.trait_reference_table.push(class_def.clone());
        Ok((i, class_def))
    }

    fn lookup_object<'a>(&self, i: &'a [u8], index: usize) -> AMFResult<'a, Rc<Value>> {
        match self.object_reference_table.get(index) {
            Some(Some(v)) => Ok((i, Rc::clone(v))),
            Some(None) => fail_with(Error::CyclicReference(index)),
            None => fail_with(Error::InvalidReference(index)),
        }
    }

    fn reserve_object(&mut self) -> usize {
        self.object_reference_table.push(None);
        self.object_reference_table.len() - 1
    }

    fn complete_object(&mut self, index: usize, value: Value) -> Rc<Value> {
        let value = Rc::new(value);
        self.object_reference_table[index] = Some(Rc::clone(&value));
        value
    }

    /// Read either a reference into the object table or a new value with the given parser
    fn parse_reference_or_val<'a>(
        &mut self,
        i: &'a [u8],
        parser: impl FnOnce(&mut Self, &'a [u8], usize) -> AMFResult<'a, Value>,
    ) -> AMFResult<'a, Rc<Value>> {
        let (i, len) = read_length(i)?;

        match len {
            Length::Reference(index) => self.lookup_object(i, index),
            Length::Size(len) => {
                let (i, len_usize) = to_usize(i, len)?;
                let index = self.reserve_object();
                let (i, res) = parser(self, i, len_usize)?;
                Ok((i, self.complete_object(index, res)))
            }
        }
    }

    fn parse_object_static<'a>(
        &mut self,
        i: &'a [u8],
        class_def: &ClassDefinition,
    ) -> AMFResult<'a, Vec<Element>> {
        let mut elements = Vec::with_capacity(class_def.static_properties.len());
        let mut i = i;

        for name in class_def.static_properties.iter() {
            let (j, value) = self.parse_single_element(i)?;
            elements.push(Element {
                name: name.clone(),
                value,
            });
            i = j;
        }

        Ok((i, elements))
    }

    fn parse_object_dynamic<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Vec<Element>> {
        let mut elements = Vec::new();
        let (mut i, mut name) = self.parse_string(i)?;
        while !name.is_empty() {
            let (j, value) = self.parse_single_element(i)?;
            elements.push(Element { name, value });
            let (j, next) = self.parse_string(j)?;
            i = j;
            name = next;
        }
        Ok((i, elements))
    }

    pub(crate) fn parse_element_object<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, header) = read_int(i)?;

        if header & INLINE_FLAG == 0 {
            return self.lookup_object(i, (header >> 1) as usize);
        }

        let index = self.reserve_object();
        let (i, class_def) = self.parse_class_def(header >> 1, i)?;

        if class_def.is_external() {
            let Some(decoder) = self.external_decoders.get(&class_def.name).copied() else {
                return fail_with(Error::UnknownExternalClass(class_def.name));
            };
            let (i, external_elements) = decoder(i, self)?;
            let value = Value::Custom(external_elements, Vec::new(), Some(class_def));
            return Ok((i, self.complete_object(index, value)));
        }

        let (mut i, mut elements) = self.parse_object_static(i, &class_def)?;
        if class_def.is_dynamic() {
            let (j, dynamic) = self.parse_object_dynamic(i)?;
            elements.extend(dynamic);
            i = j;
        }

        // Anonymous objects carry no information in their traits
        let class_def = if class_def.is_anonymous()
            && class_def.is_dynamic()
            && class_def.static_properties.is_empty()
        {
            None
        } else {
            Some(class_def)
        };

        Ok((i, self.complete_object(index, Value::Object(elements, class_def))))
    }

    fn parse_element_byte_array<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, bytes) = take(len)(i)?;
            Ok((i, Value::ByteArray(bytes.to_vec())))
        })
    }

    fn parse_element_vector_int<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, fixed_length) = be_u8(i)?;

            // There must be at least `len * 4` (i32 = 4 bytes) bytes to read this, this prevents OOM errors with v.large vecs
            if i.len() / 4 < len {
                return fail(i, ErrorKind::TooLarge);
            }

            let mut ints = Vec::with_capacity(len);
            let mut i = i;
            for _ in 0..len {
                let (j, v) = be_i32(i)?;
                ints.push(v);
                i = j;
            }

            Ok((i, Value::VectorInt(ints, fixed_length == 1)))
        })
    }

    fn parse_element_vector_uint<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, fixed_length) = be_u8(i)?;

            // There must be at least `len * 4` (u32 = 4 bytes) bytes to read this, this prevents OOM errors with v.large vecs
            if i.len() / 4 < len {
                return fail(i, ErrorKind::TooLarge);
            }

            let mut ints = Vec::with_capacity(len);
            let mut i = i;
            for _ in 0..len {
                let (j, v) = be_u32(i)?;
                ints.push(v);
                i = j;
            }

            Ok((i, Value::VectorUInt(ints, fixed_length == 1)))
        })
    }

    fn parse_element_vector_double<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, fixed_length) = be_u8(i)?;

            // There must be at least `len * 8` (f64 = 8 bytes) bytes to read this, this prevents OOM errors with v.large vecs
            if i.len() / 8 < len {
                return fail(i, ErrorKind::TooLarge);
            }

            let mut numbers = Vec::with_capacity(len);
            let mut i = i;
            for _ in 0..len {
                let (j, v) = be_f64(i)?;
                numbers.push(v);
                i = j;
            }

            Ok((i, Value::VectorDouble(numbers, fixed_length == 1)))
        })
    }

    fn parse_values<'a>(&mut self, i: &'a [u8], count: usize) -> AMFResult<'a, Vec<Rc<Value>>> {
        // Every value is at least one byte, this prevents OOM errors with v.large counts
        if i.len() < count {
            return fail(i, ErrorKind::TooLarge);
        }

        let mut values = Vec::with_capacity(count);
        let mut i = i;
        for _ in 0..count {
            let (j, v) = self.parse_single_element(i)?;
            values.push(v);
            i = j;
        }
        Ok((i, values))
    }

    fn parse_element_object_vector<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, len| {
            let (i, fixed_length) = be_u8(i)?;
            let (i, object_type_name) = this.parse_string(i)?;
            let (i, elems) = this.parse_values(i, len)?;

            Ok((
                i,
                Value::VectorObject(elems, object_type_name, fixed_length == 1),
            ))
        })
    }

    fn parse_element_array<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, length_usize| {
            let (i, assoc) = this.parse_object_dynamic(i)?;
            let (i, dense) = this.parse_values(i, length_usize)?;

            if assoc.is_empty() {
                Ok((i, Value::StrictArray(dense)))
            } else {
                let assoc_len = u32::try_from(assoc.len()).unwrap_or(u32::MAX);
                Ok((i, Value::ECMAArray(dense, assoc, assoc_len)))
            }
        })
    }

    fn parse_element_dict<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, len| {
            let (i, weak_keys) = be_u8(i)?;

            // There must be at least `len * 2` bytes (due to (key,val) pairs) to read this, this prevents OOM errors with v.large dicts
            if i.len() / 2 < len {
                return fail(i, ErrorKind::TooLarge);
            }

            let (i, flat) = this.parse_values(i, len * 2)?;
            let pairs = flat
                .chunks_exact(2)
                .map(|chunk| (Rc::clone(&chunk[0]), Rc::clone(&chunk[1])))
                .collect::<Vec<_>>();

            Ok((i, Value::Dictionary(pairs, weak_keys == 1)))
        })
    }

    fn parse_element_date<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, _len| {
            let (i, ms) = be_f64(i)?;
            Ok((i, Value::Date(ms, None)))
        })
    }

    fn parse_element_xml<'a>(&mut self, i: &'a [u8], string: bool) -> AMFResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (j, data) = take(len)(i)?;
            let data = std::str::from_utf8(data)
                .map_err(|_| nom::Err::Error(Error::Nom(i, ErrorKind::Char)))?;
            Ok((j, Value::XML(data.to_string(), string)))
        })
    }

    fn read_type_marker<'a>(&self, i: &'a [u8]) -> AMFResult<'a, TypeMarker> {
        let (i, type_) = be_u8(i)?;
        match TypeMarker::try_from(type_) {
            Ok(type_) => Ok((i, type_)),
            Err(()) => fail_with(Error::UnsupportedType(type_)),
        }
    }

    fn parse_compound<'a>(&mut self, i: &'a [u8], type_: TypeMarker) -> AMFResult<'a, Rc<Value>> {
        self.enter()?;
        let res = match type_ {
            TypeMarker::Array => self.parse_element_array(i),
            TypeMarker::Object => self.parse_element_object(i),
            TypeMarker::VectorObject => self.parse_element_object_vector(i),
            _ => self.parse_element_dict(i),
        };
        self.leave();
        res
    }

    /// Parse a single AMF3 element from the input
    pub fn parse_single_element<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, type_) = self.read_type_marker(i)?;

        match type_ {
            TypeMarker::Undefined => Ok((i, Rc::new(Value::Undefined))),
            TypeMarker::Null => Ok((i, Rc::new(Value::Null))),
            TypeMarker::False => Ok((i, Rc::new(Value::Bool(false)))),
            TypeMarker::True => Ok((i, Rc::new(Value::Bool(true)))),
            TypeMarker::Integer => parse_element_int(i),
            TypeMarker::Number => parse_element_number(i),
            TypeMarker::String => self.parse_element_string(i),
            TypeMarker::Xml => self.parse_element_xml(i, false),
            TypeMarker::Date => self.parse_element_date(i),
            TypeMarker::XmlString => self.parse_element_xml(i, true),
            TypeMarker::ByteArray => self.parse_element_byte_array(i),
            TypeMarker::VectorInt => self.parse_element_vector_int(i),
            TypeMarker::VectorUInt => self.parse_element_vector_uint(i),
            TypeMarker::VectorDouble => self.parse_element_vector_double(i),
            TypeMarker::Array
            | TypeMarker::Object
            | TypeMarker::VectorObject
            | TypeMarker::Dictionary => self.parse_compound(i, type_),
        }
    }
}

#[cfg(test)]
mod read_number_tests {
    use crate::amf3::read::{read_int, read_int_signed};

    #[test]
    fn test_read_1byte_number() {
        assert_eq!(0b00101011, read_int_signed(&[0b00101011]).unwrap().1)
    }

    #[test]
    fn test_read_4byte_number() {
        let i = &[0b10000000, 0b11000000, 0b10000000, 0b10000000];
        assert_eq!(2097280, read_int_signed(i).unwrap().1);
    }

    #[test]
    fn read_neg_number() {
        assert_eq!(-268435455, read_int_signed(&[192, 128, 128, 1]).unwrap().1);
    }

    #[test]
    fn test_read_2byte_number_unsigned() {
        assert_eq!(200, read_int(&[0x81, 0x48]).unwrap().1)
    }

    #[test]
    fn truncated_number_is_an_error() {
        assert!(read_int(&[0x81]).is_err());
    }
}

#[cfg(test)]
mod read_value_tests {
    use super::AMF3Decoder;
    use crate::errors::Error;
    use crate::types::{Element, Value};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn decode(bytes: &[u8]) -> Rc<Value> {
        let (rest, v) = AMF3Decoder::default()
            .parse_single_element(bytes)
            .expect("decode");
        assert!(rest.is_empty(), "unparsed bytes: {rest:?}");
        v
    }

    #[test]
    fn string_references_resolve() {
        let bytes = [
            0x09, 0x05, 0x01, // strict array of 2, no assoc part
            0x06, 0x07, b'a', b'b', b'c', // "abc"
            0x06, 0x00, // reference to string 0
        ];
        assert_eq!(
            *decode(&bytes),
            Value::array([Value::from("abc"), Value::from("abc")])
        );
    }

    #[test]
    fn sealed_typed_object() {
        let bytes = [
            0x0A, 0x13, // object, inline traits, sealed, 1 member
            0x09, b'a', b'.', b'B', b'C', // class "a.BC"
            0x05, b'i', b'd', // member "id"
            0x04, 0x01, // id: 1
        ];
        let v = decode(&bytes);
        assert_eq!(v.class_name(), Some("a.BC"));
        assert_eq!(v.get("id").map(|v| v.as_ref().clone()), Some(Value::Integer(1)));
    }

    #[test]
    fn anonymous_dynamic_object_has_no_class() {
        let bytes = [
            0x0A, 0x0B, 0x01, // object, inline dynamic traits, anonymous
            0x03, b'k', 0x02, // k: false
            0x01, // end of dynamic members
        ];
        assert_eq!(
            *decode(&bytes),
            Value::Object(vec![Element::new("k", false)], None)
        );
    }

    #[test]
    fn unknown_external_class_fails() {
        let bytes = [0x0A, 0x07, 0x07, b'D', b'S', b'K'];
        let res = AMF3Decoder::default().parse_single_element(&bytes);
        assert_eq!(
            res.unwrap_err(),
            nom::Err::Error(Error::UnknownExternalClass("DSK".into()))
        );
    }

    #[test]
    fn invalid_string_reference_fails() {
        let res = AMF3Decoder::default().parse_single_element(&[0x06, 0x04]);
        assert_eq!(res.unwrap_err(), nom::Err::Error(Error::InvalidReference(2)));
    }

    #[test]
    fn associative_array() {
        let bytes = [
            0x09, 0x03, // array, 1 dense value
            0x03, b'k', 0x04, 0x02, // k: 2
            0x01, // end of assoc part
            0x01, // null
        ];
        assert_eq!(
            *decode(&bytes),
            Value::ECMAArray(vec![Rc::new(Value::Null)], vec![Element::new("k", 2)], 1)
        );
    }
}
