use java_string::JavaString;

/// An attribute that isn't decoded, replayed verbatim when writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: JavaString,
	pub bytes: Vec<u8>,
}
