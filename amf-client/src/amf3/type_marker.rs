/// Type markers used in AMF3
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
#[repr(u8)]
pub(crate) enum TypeMarker {
    /// Undefined
    Undefined = 0x00,

    /// Null
    Null = 0x01,

    /// Boolean false
    False = 0x02,

    /// Boolean true
    True = 0x03,

    /// Variable length integer
    Integer = 0x04,

    /// Floating point number
    Number = 0x05,

    /// String
    String = 0x06,

    /// Legacy XML document
    Xml = 0x07,

    /// Date (always UTC)
    Date = 0x08,

    /// Array
    Array = 0x09,

    /// Object
    Object = 0x0A,

    /// XML string
    XmlString = 0x0B,

    /// Byte array
    ByteArray = 0x0C,

    /// Vector<Int>
    VectorInt = 0x0D,

    /// Vector<UInt>
    VectorUInt = 0x0E,

    /// Vector<Double>
    VectorDouble = 0x0F,

    /// Vector<Object>
    VectorObject = 0x10,

    /// Dictionary
    Dictionary = 0x11,
}

impl TryFrom<u8> for TypeMarker {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Undefined,
            0x01 => Self::Null,
            0x02 => Self::False,
            0x03 => Self::True,
            0x04 => Self::Integer,
            0x05 => Self::Number,
            0x06 => Self::String,
            0x07 => Self::Xml,
            0x08 => Self::Date,
            0x09 => Self::Array,
            0x0A => Self::Object,
            0x0B => Self::XmlString,
            0x0C => Self::ByteArray,
            0x0D => Self::VectorInt,
            0x0E => Self::VectorUInt,
            0x0F => Self::VectorDouble,
            0x10 => Self::VectorObject,
            0x11 => Self::Dictionary,
            _ => return Err(()),
        })
    }
}
