use core::fmt;

/// The version of AMF being used
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Eq, PartialEq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum AMFVersion {
    /// AMF0
    AMF0 = 0,

    /// AMF3
    AMF3 = 3,
}

impl TryFrom<u8> for AMFVersion {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AMF0),
            3 => Ok(Self::AMF3),
            _ => Err(()),
        }
    }
}

impl From<AMFVersion> for u8 {
    fn from(version: AMFVersion) -> Self {
        version as u8
    }
}

impl fmt::Display for AMFVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AMFVersion::AMF0 => f.write_str("AMF0"),
            AMFVersion::AMF3 => f.write_str("AMF3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AMFVersion;

    #[test]
    fn version_from_wire_byte() {
        assert_eq!(AMFVersion::try_from(0), Ok(AMFVersion::AMF0));
        assert_eq!(AMFVersion::try_from(3), Ok(AMFVersion::AMF3));
        assert_eq!(AMFVersion::try_from(1), Err(()));
        assert_eq!(u8::from(AMFVersion::AMF3), 3);
    }
}
