use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_access, make_name};
use crate::tree::annotation::Annotation;
use crate::tree::attribute::Attribute;
use crate::tree::field::Field;
use crate::tree::method::{Method, MethodDescriptor, MethodName};
use crate::tree::module::{Module, PackageName};
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::{TargetInfoClass, TypeAnnotation};
use crate::tree::version::Version;

/// A whole class file, with all the attributes this library knows about decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
	pub version: Version,
	pub access: ClassAccess,
	pub name: ClassName,
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,

	pub fields: Vec<Field>,
	pub methods: Vec<Method>,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub inner_classes: Option<Vec<InnerClass>>,
	pub enclosing_method: Option<EnclosingMethod>,
	pub signature: Option<ClassSignature>,

	pub source_file: Option<JavaString>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation<TargetInfoClass>>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation<TargetInfoClass>>,

	pub module: Option<Module>,
	pub module_packages: Option<Vec<PackageName>>,
	pub module_main_class: Option<ClassName>,

	pub nest_host_class: Option<ClassName>,
	pub nest_members: Option<Vec<ClassName>>,
	pub permitted_subclasses: Option<Vec<ClassName>>,

	/// The components of the `Record` attribute, if present.
	pub record_components: Option<Vec<RecordComponent>>,

	pub attributes: Vec<Attribute>,
}

impl ClassFile {
	pub fn new(version: Version, access: ClassAccess, name: ClassName, super_class: Option<ClassName>, interfaces: Vec<ClassName>) -> ClassFile {
		ClassFile {
			version,
			access,
			name,
			super_class,
			interfaces,

			fields: Vec::new(),
			methods: Vec::new(),

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			inner_classes: None,
			enclosing_method: None,
			signature: None,

			source_file: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),

			module: None,
			module_packages: None,
			module_main_class: None,

			nest_host_class: None,
			nest_members: None,
			permitted_subclasses: None,

			record_components: None,

			attributes: Vec::new(),
		}
	}

	pub fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
		self.methods.iter()
			.find(|method| method.name.as_java_str() == JavaStr::from_str(name) && method.descriptor.as_java_str() == JavaStr::from_str(descriptor))
	}

	pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut Method> {
		self.methods.iter_mut()
			.find(|method| method.name.as_java_str() == JavaStr::from_str(name) && method.descriptor.as_java_str() == JavaStr::from_str(descriptor))
	}
}

make_access! {
	pub ClassAccess {
		is_public = 0x0001,
		is_final = 0x0010,
		is_super = 0x0020,
		is_interface = 0x0200,
		is_abstract = 0x0400,
		is_synthetic = 0x1000,
		is_annotation = 0x2000,
		is_enum = 0x4000,
		is_module = 0x8000,
	}
}

make_access! {
	pub InnerClassAccess {
		is_public = 0x0001,
		is_private = 0x0002,
		is_protected = 0x0004,
		is_static = 0x0008,
		is_final = 0x0010,
		is_interface = 0x0200,
		is_abstract = 0x0400,
		is_synthetic = 0x1000,
		is_annotation = 0x2000,
		is_enum = 0x4000,
	}
}

make_name! {
	/// The binary name of a class, like `java/lang/Object`, or the descriptor of an array class, like `[I`.
	pub ClassName;
	pub ClassSignature;
}

impl ClassName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if crate::tree::names::is_valid_class_name(inner) {
			Ok(())
		} else {
			bail!("invalid class name: must be either array field descriptor; or must consist out of `/` separated non-empty parts, and not contain any of `.`, `;`, `[`")
		}
	}

	pub fn java_lang_object() -> ClassName {
		ClassName::from_inner_unchecked(JavaString::from("java/lang/Object"))
	}

	pub fn java_lang_throwable() -> ClassName {
		ClassName::from_inner_unchecked(JavaString::from("java/lang/Throwable"))
	}

	pub fn is_array(&self) -> bool {
		self.0.starts_with('[')
	}
}

impl ClassSignature {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if inner.is_empty() {
			bail!("class signature must not be empty");
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
	pub inner_class: ClassName,
	pub outer_class: Option<ClassName>,
	pub inner_name: Option<JavaString>,
	pub flags: InnerClassAccess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
	pub class: ClassName,
	pub method: Option<(MethodName, MethodDescriptor)>,
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::class::{ClassAccess, ClassName};

	#[test]
	fn access_flags_round_trip() {
		let access = ClassAccess::from(0x0021);
		assert!(access.is_public);
		assert!(access.is_super);
		assert!(!access.is_final);
		assert_eq!(u16::from(access), 0x0021);
		assert_eq!(format!("{access:?}"), "ClassAccess { is_public is_super }");
	}

	#[test]
	fn class_names() -> Result<()> {
		let name = ClassName::try_from("java/lang/String")?;
		assert_eq!(name.to_string(), "java/lang/String");
		assert!(!name.is_array());
		assert!(ClassName::try_from("[Ljava/lang/String;")?.is_array());
		assert!(ClassName::try_from("java.lang.String").is_err());
		assert_eq!(ClassName::java_lang_object(), ClassName::try_from("java/lang/Object")?);
		Ok(())
	}
}
