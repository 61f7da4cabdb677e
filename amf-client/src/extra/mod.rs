/// Support for Flex messages and collections
pub mod flex;
