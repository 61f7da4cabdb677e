mod amf_version;
mod attribute;
mod class_definition;
mod element;
mod value;

pub use amf_version::AMFVersion;
pub use attribute::Attribute;
pub use class_definition::ClassDefinition;
pub use element::Element;
pub use value::Value;
