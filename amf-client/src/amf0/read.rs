//! Support for decoding AMF0 data
use crate::amf0::type_marker::TypeMarker;
use crate::amf3::read::AMF3Decoder;
use crate::errors::Error;
use crate::nom_utils::{AMFResult, fail, fail_with, take_str};
use crate::types::{ClassDefinition, Element, Value};
use nom::combinator::map;
use nom::error::ErrorKind;
use nom::number::complete::{be_f64, be_i16, be_u16, be_u32, be_u8};
use std::rc::Rc;

/// The default limit on how deeply objects may nest
pub const DEFAULT_MAX_NEST_LEVEL: usize = 512;

pub(crate) fn parse_string(i: &[u8]) -> AMFResult<'_, &str> {
    let (i, length) = be_u16(i)?;
    take_str(i, u32::from(length))
}

fn parse_long_string(i: &[u8]) -> AMFResult<'_, &str> {
    let (i, length) = be_u32(i)?;
    take_str(i, length)
}

fn parse_element_number(i: &[u8]) -> AMFResult<'_, Value> {
    map(be_f64, Value::Number)(i)
}

fn parse_element_bool(i: &[u8]) -> AMFResult<'_, Value> {
    map(be_u8, |num: u8| Value::Bool(num > 0))(i)
}

fn parse_element_date(i: &[u8]) -> AMFResult<'_, Value> {
    let (i, millis) = be_f64(i)?;
    // The timezone is a signed offset in minutes, kept as its raw bits
    let (i, time_zone) = be_i16(i)?;

    Ok((i, Value::Date(millis, Some(time_zone as u16))))
}

fn read_type_marker(i: &[u8]) -> AMFResult<'_, TypeMarker> {
    let (j, type_) = be_u8(i)?;
    match TypeMarker::try_from(type_) {
        Ok(marker) => Ok((j, marker)),
        Err(()) => fail_with(Error::UnsupportedType(type_)),
    }
}

/// Handles decoding AMF0
///
/// Complex values (objects, typed objects and arrays) are tracked so that later references
/// to them can be resolved. Values switched to AMF3 share a single AMF3 decoder, so its
/// reference tables span every switch until the next call to [`AMF0Decoder::reset`].
#[derive(Default)]
pub struct AMF0Decoder {
    /// The table used to resolve references, entries are `None` while the value is being read
    reference_table: Vec<Option<Rc<Value>>>,

    /// Handles reading values embedded with the AMF3 switch marker
    pub amf3_decoder: AMF3Decoder,

    /// Current nesting of compound values
    depth: usize,
}

impl AMF0Decoder {
    /// Create a decoder that reads embedded AMF3 values with the given decoder
    pub fn new(amf3_decoder: AMF3Decoder) -> Self {
        Self {
            reference_table: Vec::new(),
            amf3_decoder,
            depth: 0,
        }
    }

    /// Forget every reference read so far, including those of the AMF3 decoder
    pub fn reset(&mut self) {
        self.reference_table.clear();
        self.depth = 0;
        self.amf3_decoder.reset();
    }

    fn enter<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, ()> {
        self.depth += 1;
        let limit = self.amf3_decoder.max_nest_level;
        if self.depth > limit {
            return fail_with(Error::NestingTooDeep(limit));
        }
        Ok((i, ()))
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Reserve a slot in the reference table for a complex value about to be read
    fn reserve_reference(&mut self) -> usize {
        self.reference_table.push(None);
        self.reference_table.len() - 1
    }

    fn complete_reference(&mut self, index: usize, value: Value) -> Rc<Value> {
        let value = Rc::new(value);
        self.reference_table[index] = Some(Rc::clone(&value));
        value
    }

    fn parse_element_reference<'a>(&self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, index) = be_u16(i)?;
        let index = usize::from(index);
        match self.reference_table.get(index) {
            Some(Some(v)) => Ok((i, Rc::clone(v))),
            Some(None) => fail_with(Error::CyclicReference(index)),
            None => fail_with(Error::InvalidReference(index)),
        }
    }

    /// Read name / value pairs until the empty name followed by the object end marker
    fn parse_properties<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Vec<Element>> {
        let mut out = Vec::new();

        let mut i = i;
        loop {
            let (k, name) = parse_string(i)?;
            if name.is_empty() {
                let (k, next_type) = read_type_marker(k)?;
                if next_type == TypeMarker::ObjectEnd {
                    i = k;
                    break;
                }
            }

            let (j, value) = self.parse_single_element(k)?;
            out.push(Element {
                name: name.to_string(),
                value,
            });
            i = j;
        }

        Ok((i, out))
    }

    fn parse_element_object<'a>(
        &mut self,
        i: &'a [u8],
        class_def: Option<ClassDefinition>,
    ) -> AMFResult<'a, Rc<Value>> {
        let index = self.reserve_reference();
        let (i, elements) = self.parse_properties(i)?;
        Ok((i, self.complete_reference(index, Value::Object(elements, class_def))))
    }

    fn parse_element_typed_object<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, name) = parse_string(i)?;
        let index = self.reserve_reference();
        let (i, elements) = self.parse_properties(i)?;
        let static_properties = elements.iter().map(|e| e.name.clone()).collect();
        let class_def = ClassDefinition::sealed(name, static_properties);
        Ok((
            i,
            self.complete_reference(index, Value::Object(elements, Some(class_def))),
        ))
    }

    fn parse_element_mixed_array<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, array_length) = be_u32(i)?;
        let index = self.reserve_reference();
        let (i, elements) = self.parse_properties(i)?;
        Ok((
            i,
            self.complete_reference(index, Value::ECMAArray(Vec::new(), elements, array_length)),
        ))
    }

    fn parse_element_array<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, length) = be_u32(i)?;

        let length_usize: usize = length
            .try_into()
            .map_err(|_| nom::Err::Error(Error::ValueTooLarge))?;

        // There must be at least `length_usize` bytes (u8) to read this, this prevents OOM errors with v.large arrays
        if i.len() < length_usize {
            return fail(i, ErrorKind::TooLarge);
        }

        let index = self.reserve_reference();
        let mut elements = Vec::with_capacity(length_usize);
        let mut i = i;
        for _ in 0..length_usize {
            let (j, e) = self.parse_single_element(i)?;
            elements.push(e);
            i = j;
        }

        Ok((i, self.complete_reference(index, Value::StrictArray(elements))))
    }

    fn parse_element_amf3<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, x) = self.amf3_decoder.parse_single_element(i)?;
        Ok((i, Rc::new(Value::AMF3(x))))
    }

    /// Parse a single AMF0 element from the input
    pub fn parse_single_element<'a>(&mut self, i: &'a [u8]) -> AMFResult<'a, Rc<Value>> {
        let (i, type_) = read_type_marker(i)?;

        let simple = |r: AMFResult<'a, Value>| r.map(|(i, v)| (i, Rc::new(v)));

        match type_ {
            TypeMarker::Number => simple(parse_element_number(i)),
            TypeMarker::Boolean => simple(parse_element_bool(i)),
            TypeMarker::String => simple(map(parse_string, |s: &str| {
                Value::String(s.to_string())
            })(i)),
            TypeMarker::Null => Ok((i, Rc::new(Value::Null))),
            TypeMarker::Undefined => Ok((i, Rc::new(Value::Undefined))),
            TypeMarker::Reference => self.parse_element_reference(i),
            TypeMarker::Date => simple(parse_element_date(i)),
            TypeMarker::LongString => simple(map(parse_long_string, |s: &str| {
                Value::String(s.to_string())
            })(i)),
            TypeMarker::Unsupported => Ok((i, Rc::new(Value::Unsupported))),
            TypeMarker::Xml => simple(map(parse_long_string, |s: &str| {
                Value::XML(s.to_string(), true)
            })(i)),
            TypeMarker::Object
            | TypeMarker::TypedObject
            | TypeMarker::MixedArrayStart
            | TypeMarker::Array
            | TypeMarker::AMF3 => {
                let (i, _) = self.enter(i)?;
                let res = match type_ {
                    TypeMarker::Object => self.parse_element_object(i, None),
                    TypeMarker::TypedObject => self.parse_element_typed_object(i),
                    TypeMarker::MixedArrayStart => self.parse_element_mixed_array(i),
                    TypeMarker::Array => self.parse_element_array(i),
                    _ => self.parse_element_amf3(i),
                };
                self.leave();
                res
            }
            TypeMarker::MovieClip | TypeMarker::RecordSet | TypeMarker::ObjectEnd => {
                fail_with(Error::UnsupportedType(type_ as u8))
            }
        }
    }
}
