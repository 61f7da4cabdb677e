use super::Attribute;
use enumset::EnumSet;

/// A class definition (trait) used in AMF3, and the class name of typed objects in AMF0
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClassDefinition {
    /// The name of the class definition, empty for anonymous objects
    pub name: String,

    /// The attributes on this trait
    pub attributes: EnumSet<Attribute>,

    /// The name of the static properties defined in this definition
    pub static_properties: Vec<String>,
}

impl Default for ClassDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            attributes: Attribute::Dynamic.into(),
            static_properties: Vec::new(),
        }
    }
}

impl ClassDefinition {
    /// Creates a new ClassDefinition with the given name, and no attributes or properties
    pub fn default_with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: EnumSet::empty(),
            static_properties: Vec::new(),
        }
    }

    /// Creates a sealed ClassDefinition with the given name and static properties
    pub fn sealed(name: impl Into<String>, static_properties: Vec<String>) -> Self {
        Self {
            name: name.into(),
            attributes: EnumSet::empty(),
            static_properties,
        }
    }

    /// Is this the definition of an anonymous (untyped) object
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Is this definition externalizable
    #[inline]
    pub fn is_external(&self) -> bool {
        self.attributes.contains(Attribute::External)
    }

    /// Is this definition dynamic
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.attributes.contains(Attribute::Dynamic)
    }

    /// The same definition under another class name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}
