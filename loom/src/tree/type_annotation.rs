use crate::tree::annotation::Annotation;

/// States exactly on which type the annotation is.
///
/// For the class file structure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetInfoClass {
	/// The annotation is on a type parameter of a generic class or generic interface.
	ClassTypeParameter {
		/// Specifies the index of the type parameter. `0` means the first type parameter.
		index: u8,
	},
	/// The annotation is on the superclass in an `extends` clause.
	Extends,
	/// The annotation is on a super interface, specified by either the `implements` clause (for
	/// classes) or the `extends` clause (for interfaces).
	Implements {
		/// Index into the list of the class' interfaces.
		index: u16
	},
	/// The annotation is on a bound of a type parameter of a generic class or generic interface.
	ClassTypeParameterBound {
		type_parameter_index: u8,
		bound_index: u8,
	},
}

/// States exactly on which type the annotation is.
///
/// For fields and record components.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetInfoField {
	Field,
}

/// States exactly on which type the annotation is.
///
/// For the method info structure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetInfoMethod {
	MethodTypeParameter {
		index: u8,
	},
	MethodTypeParameterBound {
		type_parameter_index: u8,
		bound_index: u8,
	},
	/// The annotation is on the return type of a method or on the type of a newly constructed object.
	Return,
	Receiver,
	/// The annotation is on a type of a formal parameter declaration of a method, constructor or lambda expression.
	FormalParameter {
		index: u8,
	},
	/// The annotation is on the `throws` clause of a method or constructor.
	Throws {
		/// Index into the list of the methods exceptions.
		index: u16,
	},
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypePathKind {
	ArrayDeeper,
	NestedDeeper,
	WildcardBound,
	TypeArgument {
		index: u8,
	}
}

/// Specifies exactly where in the type the annotation is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypePath {
	pub path: Vec<TypePathKind>
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation<T> {
	pub type_reference: T,
	pub type_path: TypePath,
	pub annotation: Annotation,
}

impl<T> TypeAnnotation<T> {
	pub fn new(type_reference: T, type_path: TypePath, annotation: Annotation) -> TypeAnnotation<T> {
		TypeAnnotation { type_reference, type_path, annotation }
	}
}
