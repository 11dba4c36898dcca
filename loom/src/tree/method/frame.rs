use crate::tree::class::ClassName;
use crate::tree::method::code::Label;

/// One entry of the `locals` or `stack` of a stack map frame.
///
/// In this encoding a `long` or `double` is a single entry, the second slot it takes up is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VerificationTypeInfo {
	Top,
	Integer,
	Float,
	Long,
	Double,
	Null,
	UninitializedThis,
	Object(ClassName),
	/// An object created by the `new` instruction the label points to, before its constructor ran.
	Uninitialized(Label),
}

impl VerificationTypeInfo {
	pub fn is_wide(&self) -> bool {
		matches!(self, VerificationTypeInfo::Long | VerificationTypeInfo::Double)
	}
}

/// A frame of the `StackMapTable` attribute, relative to the frame before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapData {
	Same,
	SameLocals1StackItem {
		stack: VerificationTypeInfo,
	},
	/// The last `k` locals are absent.
	Chop {
		k: u8,
	},
	Append {
		locals: Vec<VerificationTypeInfo>,
	},
	Full {
		locals: Vec<VerificationTypeInfo>,
		stack: Vec<VerificationTypeInfo>,
	},
}

impl VerificationTypeInfo {
	pub(crate) fn map_label(&mut self, f: &mut impl FnMut(Label) -> Label) {
		if let VerificationTypeInfo::Uninitialized(label) = self {
			*label = f(*label);
		}
	}
}

impl StackMapData {
	/// Replaces the labels of all the `Uninitialized` entries.
	pub fn map_labels(&mut self, mut f: impl FnMut(Label) -> Label) {
		match self {
			StackMapData::Same | StackMapData::Chop { .. } => {},
			StackMapData::SameLocals1StackItem { stack } => stack.map_label(&mut f),
			StackMapData::Append { locals } => {
				for local in locals {
					local.map_label(&mut f);
				}
			},
			StackMapData::Full { locals, stack } => {
				for entry in locals.iter_mut().chain(stack.iter_mut()) {
					entry.map_label(&mut f);
				}
			},
		}
	}
}
