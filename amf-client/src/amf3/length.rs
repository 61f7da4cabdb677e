use crate::amf3::write::write_u29;

/// The low bit of a U29 length, set when the value is inline rather than a reference
pub(crate) const INLINE_FLAG: u32 = 0x01;

#[derive(Copy, Clone, Debug, Eq, Ord, PartialOrd, PartialEq)]
pub(crate) enum Length {
    Size(u32),
    Reference(usize),
}

impl Length {
    pub(crate) fn from_u29(val: u32) -> Self {
        if val & INLINE_FLAG == 0 {
            Length::Reference(val as usize >> 1)
        } else {
            Length::Size(val >> 1)
        }
    }

    pub(crate) fn is_reference(&self) -> bool {
        matches!(self, Length::Reference(_))
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        match self {
            // With the last bit set
            Length::Size(x) => write_u29(out, (x << 1) | INLINE_FLAG),
            Length::Reference(x) => write_u29(out, (*x as u32) << 1),
        }
    }
}
