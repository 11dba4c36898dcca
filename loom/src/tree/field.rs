use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_access, make_name};
use crate::tree::annotation::Annotation;
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::type_annotation::{TargetInfoField, TypeAnnotation};

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub access: FieldAccess,
	pub name: FieldName,
	pub descriptor: FieldDescriptor,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub constant_value: Option<ConstantValue>,
	pub signature: Option<FieldSignature>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation<TargetInfoField>>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation<TargetInfoField>>,

	pub attributes: Vec<Attribute>,
}

impl Field {
	pub fn new(access: FieldAccess, name: FieldName, descriptor: FieldDescriptor) -> Field {
		Field {
			access,
			name,
			descriptor,

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			constant_value: None,
			signature: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),

			attributes: Vec::new(),
		}
	}
}

make_access! {
	pub FieldAccess {
		is_public = 0x0001,
		is_private = 0x0002,
		is_protected = 0x0004,
		is_static = 0x0008,
		is_final = 0x0010,
		is_volatile = 0x0040,
		is_transient = 0x0080,
		is_synthetic = 0x1000,
		is_enum = 0x4000,
	}
}

make_name! {
	pub FieldName;
	/// A field descriptor, like `I` or `Ljava/lang/Object;`. Parse it with [`FieldDescriptor::parse`].
	pub FieldDescriptor;
	pub FieldSignature;
}

impl FieldName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if crate::tree::names::is_valid_unqualified_name(inner) {
			Ok(())
		} else {
			bail!("invalid field name: must be non-empty and not contain any of `.`, `;`, `[` and `/`")
		}
	}
}

impl FieldDescriptor {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		crate::tree::descriptor::parse_field_descriptor(inner).map(|_| ())
	}

	pub fn from_class(class: &ClassName) -> FieldDescriptor {
		if class.is_array() {
			FieldDescriptor(class.as_java_str().to_owned())
		} else {
			let mut s = JavaString::with_capacity(class.len() + 2);
			s.push('L');
			s.push_java_str(class.as_java_str());
			s.push(';');
			FieldDescriptor(s)
		}
	}
}

impl FieldSignature {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if inner.is_empty() {
			bail!("field signature must not be empty");
		}
		Ok(())
	}
}

/// A reference to a field, as used by the field instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
	pub class: ClassName,
	pub name: FieldName,
	pub desc: FieldDescriptor,
}

/// The value of a `ConstantValue` attribute.
///
/// Floating point values compare by their bits.
#[derive(Debug, Clone)]
pub enum ConstantValue {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(JavaString),
}

impl PartialEq for ConstantValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(ConstantValue::Integer(a), ConstantValue::Integer(b)) => a == b,
			(ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
			(ConstantValue::Long(a), ConstantValue::Long(b)) => a == b,
			(ConstantValue::Double(a), ConstantValue::Double(b)) => a.to_bits() == b.to_bits(),
			(ConstantValue::String(a), ConstantValue::String(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for ConstantValue {}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::class::ClassName;
	use crate::tree::field::{ConstantValue, FieldDescriptor};

	#[test]
	fn descriptor_from_class() -> Result<()> {
		assert_eq!(FieldDescriptor::from_class(&ClassName::try_from("java/lang/Object")?), FieldDescriptor::try_from("Ljava/lang/Object;")?);
		assert_eq!(FieldDescriptor::from_class(&ClassName::try_from("[I")?), FieldDescriptor::try_from("[I")?);
		assert!(FieldDescriptor::try_from("Ljava/lang/Object").is_err());
		Ok(())
	}

	#[test]
	fn nan_constants_are_equal() {
		assert_eq!(ConstantValue::Float(f32::NAN), ConstantValue::Float(f32::NAN));
		assert_ne!(ConstantValue::Double(0.0), ConstantValue::Double(-0.0));
	}
}
