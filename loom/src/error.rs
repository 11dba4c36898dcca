//! The typed failures of the library.
//!
//! All functions return [`anyhow::Result`]; the values here are raised as the root cause of such an error and
//! wrapped in context naming the class, member and bytecode offset. Classify a failure with
//! `error.root_cause().downcast_ref::<CodecError>()` (or any of the other types here).

use std::fmt::{Display, Formatter};
use crate::tree::method::code::Label;

/// A failure while decoding or encoding the binary class file format.
///
/// Every decoding failure carries the byte offset into the input it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
	BadMagic { found: u32 },
	UnsupportedVersion { major: u16, minor: u16, offset: u64 },
	Truncated { offset: u64 },
	InvalidTag { tag: u8, offset: u64 },
	InvalidOpcode { opcode: u8, offset: u64 },
	IndexOutOfRange { index: u16, offset: u64 },
	WrongEntryKind { index: u16, expected: &'static str, offset: u64 },
	/// A bytecode offset that is out of bounds or points into the middle of an instruction.
	InvalidOffset { target: i64, offset: u64 },
	/// Some structure that doesn't follow the format, like a negative `lookupswitch` pair count.
	Malformed { reason: &'static str, offset: u64 },
	/// Something doesn't fit the limits of the format when encoding, like a code array exceeding 65535 bytes.
	TooLarge { what: &'static str },
	UnresolvedLabel { label: Label },
	/// The content can't be represented in the class file version it's encoded for.
	IllegalForVersion { what: &'static str, major: u16 },
}

impl CodecError {
	/// The byte offset of the input at which this decoding error occurred, if it's a decoding error.
	pub fn offset(&self) -> Option<u64> {
		match *self {
			CodecError::BadMagic { .. } => Some(0),
			CodecError::UnsupportedVersion { offset, .. } |
			CodecError::Truncated { offset } |
			CodecError::InvalidTag { offset, .. } |
			CodecError::InvalidOpcode { offset, .. } |
			CodecError::IndexOutOfRange { offset, .. } |
			CodecError::WrongEntryKind { offset, .. } |
			CodecError::InvalidOffset { offset, .. } |
			CodecError::Malformed { offset, .. } => Some(offset),
			CodecError::TooLarge { .. } |
			CodecError::UnresolvedLabel { .. } |
			CodecError::IllegalForVersion { .. } => None,
		}
	}
}

impl Display for CodecError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			CodecError::BadMagic { found } => write!(f, "wrong magic: got {found:#x}, expected 0xcafebabe"),
			CodecError::UnsupportedVersion { major, minor, offset } =>
				write!(f, "unsupported class file version {major}.{minor} at byte offset {offset}"),
			CodecError::Truncated { offset } => write!(f, "unexpected end of data at byte offset {offset}"),
			CodecError::InvalidTag { tag, offset } => write!(f, "unknown tag {tag} at byte offset {offset}"),
			CodecError::InvalidOpcode { opcode, offset } => write!(f, "invalid opcode {opcode:#x} at byte offset {offset}"),
			CodecError::IndexOutOfRange { index, offset } =>
				write!(f, "constant pool index {index} out of range at byte offset {offset}"),
			CodecError::WrongEntryKind { index, expected, offset } =>
				write!(f, "constant pool entry {index} is not `{expected}` at byte offset {offset}"),
			CodecError::InvalidOffset { target, offset } =>
				write!(f, "invalid bytecode offset {target} referenced at byte offset {offset}"),
			CodecError::Malformed { reason, offset } => write!(f, "malformed class file at byte offset {offset}: {reason}"),
			CodecError::TooLarge { what } => write!(f, "too large to encode: {what}"),
			CodecError::UnresolvedLabel { label } => write!(f, "label {label:?} was never bound to an instruction"),
			CodecError::IllegalForVersion { what, major } => write!(f, "{what} can't be encoded for major version {major}"),
		}
	}
}

impl std::error::Error for CodecError {}

/// A failure of the symbolic frame analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
	/// The method contains `jsr` or `ret`. Inline the subroutines first.
	UnsupportedConstruct { index: usize },
	StackUnderflow { index: usize },
	/// Two paths reach the same instruction with different operand stack heights.
	StackHeightMismatch { index: usize },
	/// A local variable is read as a type it doesn't hold, or the index is out of bounds.
	InvalidLocal { index: usize, local: u16 },
	/// Execution may run past the last instruction.
	FallsOffEnd,
	/// An operand doesn't have the type the instruction requires.
	TypeMismatch { index: usize },
}

impl Display for AnalysisError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			AnalysisError::UnsupportedConstruct { index } =>
				write!(f, "unsupported `jsr`/`ret` at instruction {index}, inline subroutines first"),
			AnalysisError::StackUnderflow { index } => write!(f, "operand stack underflow at instruction {index}"),
			AnalysisError::StackHeightMismatch { index } => write!(f, "inconsistent operand stack height at instruction {index}"),
			AnalysisError::InvalidLocal { index, local } => write!(f, "invalid use of local variable {local} at instruction {index}"),
			AnalysisError::FallsOffEnd => write!(f, "execution falls off the end of the code"),
			AnalysisError::TypeMismatch { index } => write!(f, "operand type mismatch at instruction {index}"),
		}
	}
}

impl std::error::Error for AnalysisError {}

/// A failure while inlining subroutines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineError {
	/// A subroutine (directly or indirectly) calls itself.
	NonReturningCycle { index: usize },
	/// A `ret` that isn't part of any subroutine.
	RetOutsideSubroutine { index: usize },
}

impl Display for InlineError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			InlineError::NonReturningCycle { index } => write!(f, "recursive subroutine starting at instruction {index}"),
			InlineError::RetOutsideSubroutine { index } => write!(f, "`ret` at instruction {index} is not part of any subroutine"),
		}
	}
}

impl std::error::Error for InlineError {}

/// A failure while weaving advice into a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeaveError {
	/// The method has no code, or it's a constructor that never initializes `this`.
	InvalidAdviceTarget,
	/// A return is reachable while `this` isn't definitely initialized.
	AmbiguousReturn { index: usize },
	/// The advice itself branches, returns or throws.
	InvalidAdvice { index: usize },
}

impl Display for WeaveError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			WeaveError::InvalidAdviceTarget => write!(f, "method is not a valid advice target"),
			WeaveError::AmbiguousReturn { index } =>
				write!(f, "instruction {index} exits while `this` is not definitely initialized"),
			WeaveError::InvalidAdvice { index } =>
				write!(f, "advice instruction {index} branches, returns or throws"),
		}
	}
}

impl std::error::Error for WeaveError {}
