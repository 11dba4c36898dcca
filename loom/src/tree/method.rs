use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_access, make_name};
use crate::tree::annotation::{Annotation, ElementValue};
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::method::code::Code;
use crate::tree::type_annotation::{TargetInfoMethod, TypeAnnotation};

pub mod code;
pub mod frame;

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
	pub access: MethodAccess,
	pub name: MethodName,
	pub descriptor: MethodDescriptor,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub code: Option<Code>,
	pub exceptions: Option<Vec<ClassName>>,
	pub signature: Option<MethodSignature>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation<TargetInfoMethod>>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation<TargetInfoMethod>>,
	/// One list of annotations per parameter, if the attribute is present.
	pub runtime_visible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub runtime_invisible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub annotation_default: Option<ElementValue>,
	pub method_parameters: Option<Vec<MethodParameter>>,

	pub attributes: Vec<Attribute>,
}

impl Method {
	pub fn new(access: MethodAccess, name: MethodName, descriptor: MethodDescriptor) -> Method {
		Method {
			access,
			name,
			descriptor,

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			code: None,
			exceptions: None,
			signature: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),
			runtime_visible_parameter_annotations: None,
			runtime_invisible_parameter_annotations: None,
			annotation_default: None,
			method_parameters: None,

			attributes: Vec::new(),
		}
	}

	/// Whether this is an instance initialization method, a constructor.
	pub fn is_constructor(&self) -> bool {
		self.name.is_init()
	}
}

make_access! {
	pub MethodAccess {
		is_public = 0x0001,
		is_private = 0x0002,
		is_protected = 0x0004,
		is_static = 0x0008,
		is_final = 0x0010,
		is_synchronized = 0x0020,
		is_bridge = 0x0040,
		is_varargs = 0x0080,
		is_native = 0x0100,
		is_abstract = 0x0400,
		is_strict = 0x0800,
		is_synthetic = 0x1000,
	}
}

make_access! {
	pub ParameterAccess {
		is_final = 0x0010,
		is_synthetic = 0x1000,
		is_mandated = 0x8000,
	}
}

make_name! {
	pub MethodName;
	/// A method descriptor, like `(ILjava/lang/String;)V`. Parse it with [`MethodDescriptor::parse`].
	pub MethodDescriptor;
	pub MethodSignature;
}

impl MethodName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if crate::tree::names::is_valid_method_name(inner) {
			Ok(())
		} else {
			bail!("invalid method name: must be `<init>`, `<clinit>` or non-empty and not contain any of `.`, `;`, `[`, `/`, `<` and `>`")
		}
	}

	pub fn init() -> MethodName {
		MethodName::from_inner_unchecked(JavaString::from("<init>"))
	}

	pub fn is_init(&self) -> bool {
		matches!(self.0.as_str(), Ok("<init>"))
	}

	pub fn is_clinit(&self) -> bool {
		matches!(self.0.as_str(), Ok("<clinit>"))
	}
}

impl MethodDescriptor {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		crate::tree::descriptor::parse_method_descriptor(inner).map(|_| ())
	}
}

impl MethodSignature {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if inner.is_empty() {
			bail!("method signature must not be empty");
		}
		Ok(())
	}
}

/// A reference to a method, as used by the invoke instructions and method handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: MethodName,
	pub desc: MethodDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodParameter {
	pub name: Option<JavaString>,
	pub flags: ParameterAccess,
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use crate::tree::method::MethodName;

	#[test]
	fn special_names() -> Result<()> {
		assert!(MethodName::try_from("<init>")?.is_init());
		assert!(MethodName::init().is_init());
		assert!(MethodName::try_from("<clinit>")?.is_clinit());
		assert!(!MethodName::try_from("init")?.is_init());
		assert!(MethodName::try_from("<main>").is_err());
		Ok(())
	}
}
