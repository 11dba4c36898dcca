use crate::tree::annotation::Annotation;
use crate::tree::attribute::Attribute;
use crate::tree::field::{FieldDescriptor, FieldName, FieldSignature};
use crate::tree::type_annotation::{TargetInfoField, TypeAnnotation};

/// One component of the `Record` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
	pub name: FieldName,
	pub descriptor: FieldDescriptor,

	pub signature: Option<FieldSignature>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation<TargetInfoField>>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation<TargetInfoField>>,

	pub attributes: Vec<Attribute>,
}

impl RecordComponent {
	pub fn new(name: FieldName, descriptor: FieldDescriptor) -> RecordComponent {
		RecordComponent {
			name,
			descriptor,

			signature: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),

			attributes: Vec::new(),
		}
	}
}
