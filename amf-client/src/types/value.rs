use super::{ClassDefinition, Element};
use std::rc::Rc;

//TODO: should amf3 assoc arrays be their own type with a dense and assoc section
/// A single or compound value
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Represent the type number (amf0) and double (amf3)
    Number(f64),

    /// Represents the type boolean (amf0) and both the true/false type (amf3)
    Bool(bool),

    /// Represent both the string (amf0/3) and long string type (amf0)
    String(String),

    /// Represents the object type in both amf0 and amf3.
    /// A class definition is present for typed objects, and for every amf3 object
    Object(Vec<Element>, Option<ClassDefinition>),

    /// Represent the null type
    Null,

    /// Represent the undefined type
    Undefined,

    /// Represent ECMA-Arrays (amf0) and associative arrays (amf3, even if they contain a dense part)
    /// Final value represents the length of the array in amf0, this can differ from the actual number of elements
    ECMAArray(Vec<Rc<Value>>, Vec<Element>, u32),

    /// Represent a strict array (amf0) or a dense array (amf3)
    StrictArray(Vec<Rc<Value>>),

    /// Represent a date in the format (milliseconds since epoch, timezone or UTC if missing (amf3))
    Date(f64, Option<u16>),

    /// Represent the unsupported type
    Unsupported,

    /// Represent the XML type, (value, is_string)
    XML(String, bool),

    /// Represent an amf3 element embedded in an AMF0 stream
    AMF3(Rc<Value>),

    // AMF3
    /// Represent the integer type (u29) (amf3)
    Integer(i32),

    /// Represent the bytearray type (amf3)
    ByteArray(Vec<u8>),

    /// Represent the int vector type (amf3)
    /// Format is (values, is_fixed_length)
    VectorInt(Vec<i32>, bool),

    /// Represent the unsigned int vector type (amf3)
    /// Format is (values, is_fixed_length)
    VectorUInt(Vec<u32>, bool),

    /// Represent the double vector type (amf3)
    /// Format is (values, is_fixed_length)
    VectorDouble(Vec<f64>, bool),

    /// Represent the object vector type (amf3)
    /// Format is (values, type_name, is_fixed_length)
    VectorObject(Vec<Rc<Value>>, String, bool),

    /// Represent the dictionary type (amf3)
    /// Format is ((key, value), has_weak_keys)
    Dictionary(Vec<(Rc<Value>, Rc<Value>)>, bool),

    /// Represent an externalized object, such as a flex message
    /// (custom_elements, regular elements, class def)
    Custom(Vec<Element>, Vec<Element>, Option<ClassDefinition>),
}

impl Value {
    /// Build an anonymous object from the given elements
    pub fn object(elements: Vec<Element>) -> Self {
        Value::Object(elements, None)
    }

    /// Build a typed object with the given class name
    pub fn typed_object(class_name: impl Into<String>, elements: Vec<Element>) -> Self {
        let class_name = class_name.into();
        let static_properties = elements.iter().map(|e| e.name.clone()).collect();
        Value::Object(
            elements,
            Some(ClassDefinition::sealed(class_name, static_properties)),
        )
    }

    /// Build a strict array from the given values
    pub fn array(values: impl IntoIterator<Item = Value>) -> Self {
        Value::StrictArray(values.into_iter().map(Rc::new).collect())
    }

    /// The class name of a typed object, `None` for anything else (including anonymous objects)
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Value::Object(_, Some(def)) | Value::Custom(_, _, Some(def)) if !def.is_anonymous() => {
                Some(def.name.as_str())
            }
            Value::AMF3(inner) => inner.class_name(),
            _ => None,
        }
    }

    /// Look up a named member of an object-like value
    pub fn get(&self, name: &str) -> Option<&Rc<Value>> {
        let find = |elements: &'_ [Element]| -> Option<usize> {
            elements.iter().position(|e| e.name == name)
        };
        match self {
            Value::Object(elements, _) | Value::ECMAArray(_, elements, _) => {
                find(elements).map(|i| &elements[i].value)
            }
            Value::Custom(custom, elements, _) => find(custom)
                .map(|i| &custom[i].value)
                .or_else(|| find(elements).map(|i| &elements[i].value)),
            Value::AMF3(inner) => inner.get(name),
            _ => None,
        }
    }

    /// The contents of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            Value::AMF3(inner) => inner.as_str(),
            _ => None,
        }
    }

    /// The numeric contents of a number or integer value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(f64::from(*i)),
            Value::AMF3(inner) => inner.as_f64(),
            _ => None,
        }
    }

    /// The contents of a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::AMF3(inner) => inner.as_bool(),
            _ => None,
        }
    }

    /// Is this null or undefined
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null | Value::Undefined => true,
            Value::AMF3(inner) => inner.is_null(),
            _ => false,
        }
    }

    /// Strip any number of amf3 embedding layers
    pub fn unwrap_amf3(self: &Rc<Self>) -> Rc<Value> {
        match self.as_ref() {
            Value::AMF3(inner) => inner.unwrap_amf3(),
            _ => Rc::clone(self),
        }
    }
}

impl FromIterator<Value> for Vec<Rc<Value>> {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        iter.into_iter().map(Rc::new).collect()
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::ByteArray(bytes)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
