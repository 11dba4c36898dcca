use std::iter::Peekable;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{Chars, JavaCodePoint, JavaStr, JavaString};
use crate::tree::class::ClassName;
use crate::tree::field::FieldDescriptor;
use crate::tree::method::MethodDescriptor;

/// Represents a type.
///
/// In case of an array, use the [`Type::Array`] variant.
///
/// ```
/// use loom::tree::descriptor::{ArrayType, Type};
///
/// // the type of a java `int`
/// let int_type = Type::I;
///
/// // the type of a java `int[][]`
/// let int_array_type = Type::Array(2, ArrayType::I);
///
/// assert_ne!(int_type, int_array_type);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Type {
	/// A `byte`.
	B,
	/// A `char`.
	C,
	/// A `double`.
	D,
	/// A `float`.
	F,
	/// An `int`.
	I,
	/// A `long`.
	J,
	/// A `short`.
	S,
	/// A `boolean`.
	Z,
	/// An instance of the class specified by [`ClassName`].
	Object(ClassName),
	/// An array type, represented by the dimension and the inner [`ArrayType`].
	Array(u8, ArrayType),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ArrayType {
	B,
	C,
	D,
	F,
	I,
	J,
	S,
	Z,
	Object(ClassName),
}

impl Type {
	/// The number of local variable slots (and operand stack words) a value of this type takes up.
	pub fn size(&self) -> u16 {
		match self {
			Type::D | Type::J => 2,
			_ => 1,
		}
	}

	/// The class name used to refer to a reference type, like `java/lang/String` or `[I`.
	///
	/// Returns [`None`] for the primitive types.
	pub fn as_class_name(&self) -> Option<ClassName> {
		match self {
			Type::Object(class_name) => Some(class_name.clone()),
			Type::Array(..) => {
				let mut s = JavaString::new();
				write_field_type(self, &mut s);
				// An array descriptor is also a valid array class name.
				Some(ClassName::from_inner_unchecked(s))
			},
			_ => None,
		}
	}
}

fn read_class_name(chars: &mut Peekable<Chars>) -> Result<ClassName> {
	let mut s = JavaString::new();

	let mut char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	while char != ';' {
		s.push_java(char);

		char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	}

	ClassName::try_from(s)
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	const B: JavaCodePoint = JavaCodePoint::from_char('B');
	const C: JavaCodePoint = JavaCodePoint::from_char('C');
	const D: JavaCodePoint = JavaCodePoint::from_char('D');
	const F: JavaCodePoint = JavaCodePoint::from_char('F');
	const I: JavaCodePoint = JavaCodePoint::from_char('I');
	const J: JavaCodePoint = JavaCodePoint::from_char('J');
	const L: JavaCodePoint = JavaCodePoint::from_char('L');
	const S: JavaCodePoint = JavaCodePoint::from_char('S');
	const Z: JavaCodePoint = JavaCodePoint::from_char('Z');

	let mut array_dimension: u8 = 0;
	while chars.next_if_eq(&'[').is_some() {
		array_dimension = array_dimension.checked_add(1)
			.ok_or_else(|| anyhow!("array descriptor with more than 255 dimensions"))?;
	}

	let char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	let array_type = match char {
		B => ArrayType::B,
		C => ArrayType::C,
		D => ArrayType::D,
		F => ArrayType::F,
		I => ArrayType::I,
		J => ArrayType::J,
		S => ArrayType::S,
		Z => ArrayType::Z,
		L => ArrayType::Object(read_class_name(chars)?),
		x => bail!("unexpected char {x:?} in descriptor"),
	};

	if array_dimension != 0 {
		return Ok(Type::Array(array_dimension, array_type));
	}

	Ok(match array_type {
		ArrayType::B => Type::B,
		ArrayType::C => Type::C,
		ArrayType::D => Type::D,
		ArrayType::F => Type::F,
		ArrayType::I => Type::I,
		ArrayType::J => Type::J,
		ArrayType::S => Type::S,
		ArrayType::Z => Type::Z,
		ArrayType::Object(class_name) => Type::Object(class_name),
	})
}

fn write_field_type(t: &Type, string: &mut JavaString) {
	fn write_object(class_name: &ClassName, string: &mut JavaString) {
		string.push('L');
		string.push_java_str(class_name.as_java_str());
		string.push(';');
	}

	match t {
		Type::B => string.push('B'),
		Type::C => string.push('C'),
		Type::D => string.push('D'),
		Type::F => string.push('F'),
		Type::I => string.push('I'),
		Type::J => string.push('J'),
		Type::S => string.push('S'),
		Type::Z => string.push('Z'),
		Type::Object(class_name) => write_object(class_name, string),
		Type::Array(array_dimension, array_type) => {
			for _ in 0..*array_dimension {
				string.push('[');
			}
			match array_type {
				ArrayType::B => string.push('B'),
				ArrayType::C => string.push('C'),
				ArrayType::D => string.push('D'),
				ArrayType::F => string.push('F'),
				ArrayType::I => string.push('I'),
				ArrayType::J => string.push('J'),
				ArrayType::S => string.push('S'),
				ArrayType::Z => string.push('Z'),
				ArrayType::Object(class_name) => write_object(class_name, string),
			}
		},
	}
}

pub(crate) fn parse_field_descriptor(descriptor: &JavaStr) -> Result<Type> {
	let mut chars = descriptor.chars().peekable();

	let t = read_field_type(&mut chars)
		.with_context(|| anyhow!("failed to read field descriptor {descriptor:?}"))?;

	if chars.peek().is_some() {
		bail!("expected end of field descriptor {descriptor:?}, got {:?} remaining", JavaString::from_iter(chars));
	}

	Ok(t)
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedMethodDescriptor {
	pub parameter_descriptors: Vec<Type>,
	/// [`None`] for `void`.
	pub return_descriptor: Option<Type>,
}

pub(crate) fn parse_method_descriptor(descriptor: &JavaStr) -> Result<ParsedMethodDescriptor> {
	let mut chars = descriptor.chars().peekable();

	if chars.next_if_eq(&'(').is_none() {
		bail!("method descriptor {descriptor:?} doesn't start with '('");
	}

	let mut parameter_descriptors = Vec::new();
	while chars.next_if_eq(&')').is_none() {
		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read parameter descriptor of {descriptor:?}"))?;
		parameter_descriptors.push(t);
	}

	let return_descriptor = if chars.next_if_eq(&'V').is_some() {
		None
	} else {
		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read return descriptor of {descriptor:?}"))?;
		Some(t)
	};

	if chars.peek().is_some() {
		bail!("expected end of method descriptor {descriptor:?}, got {:?} remaining", JavaString::from_iter(chars));
	}

	Ok(ParsedMethodDescriptor { parameter_descriptors, return_descriptor })
}

impl FieldDescriptor {
	/// Parses this field descriptor.
	///
	/// A field descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.2) in the
	/// Java Virtual Machine Specification.
	///
	/// ```
	/// # use pretty_assertions::assert_eq;
	/// use loom::tree::descriptor::{ArrayType, Type};
	/// use loom::tree::field::FieldDescriptor;
	///
	/// assert_eq!(FieldDescriptor::try_from("I").unwrap().parse().unwrap(), Type::I);
	/// assert_eq!(FieldDescriptor::try_from("[[[D").unwrap().parse().unwrap(), Type::Array(3, ArrayType::D));
	/// ```
	pub fn parse(&self) -> Result<Type> {
		parse_field_descriptor(self.as_java_str())
	}

	/// Writes a type as a field descriptor, the inverse of [`FieldDescriptor::parse`].
	pub fn write(t: &Type) -> FieldDescriptor {
		let mut s = JavaString::new();
		write_field_type(t, &mut s);
		FieldDescriptor::from_inner_unchecked(s)
	}
}

impl MethodDescriptor {
	pub fn parse(&self) -> Result<ParsedMethodDescriptor> {
		parse_method_descriptor(self.as_java_str())
	}

	/// Returns the argument size + 1 (for the implicit `this`).
	/// Double and longs count 2 instead of 1.
	///
	/// This is the `count` operand of `invokeinterface`.
	pub(crate) fn arguments_size(&self) -> Result<u8> {
		let size: u16 = 1 + self.parse()?.parameter_descriptors.iter()
			.map(Type::size)
			.sum::<u16>();
		u8::try_from(size)
			.with_context(|| anyhow!("arguments of {self:?} don't fit into 255 slots"))
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::class::ClassName;
	use crate::tree::descriptor::{ArrayType, ParsedMethodDescriptor, Type};
	use crate::tree::field::FieldDescriptor;
	use crate::tree::method::MethodDescriptor;

	#[test]
	fn field_descriptors() -> Result<()> {
		assert_eq!(FieldDescriptor::try_from("J")?.parse()?, Type::J);
		assert_eq!(
			FieldDescriptor::try_from("Ljava/lang/String;")?.parse()?,
			Type::Object(ClassName::try_from("java/lang/String")?)
		);
		assert_eq!(
			FieldDescriptor::try_from("[[Ljava/lang/String;")?.parse()?,
			Type::Array(2, ArrayType::Object(ClassName::try_from("java/lang/String")?))
		);
		assert!(FieldDescriptor::try_from("V").is_err());
		assert!(FieldDescriptor::try_from("II").is_err());
		assert!(FieldDescriptor::try_from("L;").is_err());
		Ok(())
	}

	#[test]
	fn method_descriptors() -> Result<()> {
		let descriptor = MethodDescriptor::try_from("(IJ[DLjava/lang/Object;)V")?;
		assert_eq!(descriptor.parse()?, ParsedMethodDescriptor {
			parameter_descriptors: vec![
				Type::I,
				Type::J,
				Type::Array(1, ArrayType::D),
				Type::Object(ClassName::java_lang_object()),
			],
			return_descriptor: None,
		});
		assert_eq!(descriptor.arguments_size()?, 1 + 1 + 2 + 1 + 1);

		assert_eq!(MethodDescriptor::try_from("()Z")?.parse()?.return_descriptor, Some(Type::Z));
		assert!(MethodDescriptor::try_from("(V)V").is_err());
		assert!(MethodDescriptor::try_from("()").is_err());
		Ok(())
	}

	#[test]
	fn array_class_names() -> Result<()> {
		let t = Type::Array(2, ArrayType::I);
		assert_eq!(t.as_class_name(), Some(ClassName::try_from("[[I")?));
		assert_eq!(Type::I.as_class_name(), None);
		assert_eq!(FieldDescriptor::write(&t), FieldDescriptor::try_from("[[I")?);
		Ok(())
	}
}
