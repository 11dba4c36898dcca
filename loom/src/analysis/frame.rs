use anyhow::{bail, Result};
use java_string::JavaString;
use crate::error::AnalysisError;
use crate::hierarchy::ClassHierarchy;
use crate::tree::class::ClassName;
use crate::tree::descriptor::Type;

/// The type of a single local variable slot or operand stack entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
	/// Unusable, either unset, or the merge of two different types.
	Top,
	Integer,
	Float,
	Long,
	Double,
	Null,
	/// The `this` of a constructor before the super constructor (or another constructor) was called.
	UninitializedThis,
	/// The result of the `new` instruction at the index given, before its constructor was called.
	Uninitialized(usize),
	Object(ClassName),
}

impl Value {
	/// The value a descriptor type gets in a frame.
	pub fn from_type(t: &Type) -> Value {
		match t {
			Type::B | Type::C | Type::I | Type::S | Type::Z => Value::Integer,
			Type::F => Value::Float,
			Type::J => Value::Long,
			Type::D => Value::Double,
			Type::Object(class_name) => Value::Object(class_name.clone()),
			Type::Array(..) => t.as_class_name().map_or(Value::Top, Value::Object),
		}
	}

	/// Whether this is a `long` or `double`, taking up two slots or words.
	pub fn is_wide(&self) -> bool {
		matches!(self, Value::Long | Value::Double)
	}

	pub fn size(&self) -> u16 {
		if self.is_wide() { 2 } else { 1 }
	}

	pub fn is_reference(&self) -> bool {
		matches!(self, Value::Null | Value::UninitializedThis | Value::Uninitialized(_) | Value::Object(_))
	}

	/// The least upper bound of two values.
	///
	/// Two different uninitialized objects merge to [`Value::Top`], and so does an uninitialized object with
	/// anything else.
	pub fn merge(&self, other: &Value, hierarchy: &ClassHierarchy) -> Value {
		match (self, other) {
			(a, b) if a == b => a.clone(),
			(Value::Null, Value::Object(class)) | (Value::Object(class), Value::Null) => Value::Object(class.clone()),
			(Value::Object(a), Value::Object(b)) => Value::Object(hierarchy.common_super_class(a, b)),
			_ => Value::Top,
		}
	}

	/// The component type of an array type. `null` stays `null`.
	pub(crate) fn array_element(&self) -> Value {
		match self {
			Value::Null => Value::Null,
			Value::Object(class) => class.as_java_str()
				.strip_prefix('[')
				.and_then(|element| crate::tree::descriptor::parse_field_descriptor(element).ok())
				.map_or_else(|| Value::Object(ClassName::java_lang_object()), |t| Value::from_type(&t)),
			_ => Value::Object(ClassName::java_lang_object()),
		}
	}
}

/// The array class with elements of the class given.
pub(crate) fn array_of(element: &ClassName) -> ClassName {
	let mut name = JavaString::from("[");
	if element.is_array() {
		name.push_java_str(element.as_java_str());
	} else {
		name.push('L');
		name.push_java_str(element.as_java_str());
		name.push(';');
	}
	ClassName::from_inner_unchecked(name)
}

/// Whether the object under construction has been initialized already.
///
/// Outside of constructors this is always [`InitState::Initialized`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InitState {
	NotInitialized,
	Initialized,
	/// Different paths reaching the instruction disagree.
	Conflict,
}

impl InitState {
	pub fn merge(self, other: InitState) -> InitState {
		if self == other { self } else { InitState::Conflict }
	}
}

/// The state of the locals and the operand stack before an instruction executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	/// One entry per slot, a `long` or `double` is followed by a [`Value::Top`] for its second slot.
	pub locals: Vec<Value>,
	/// One entry per value, a `long` or `double` is a single entry here.
	pub stack: Vec<Value>,
	pub init: InitState,
}

impl Frame {
	/// The number of words the operand stack takes up.
	pub fn stack_size(&self) -> u16 {
		self.stack.iter().map(Value::size).sum()
	}

	/// The number of local slots that hold something, ignoring unset ones at the end.
	pub fn locals_size(&self) -> u16 {
		let used = self.locals.iter().rposition(|value| *value != Value::Top).map_or(0, |i| i + 1);
		// the second slot of a wide value at the end counts too
		let extra = usize::from(used > 0 && self.locals[used - 1].is_wide());
		(used + extra) as u16
	}

	pub(crate) fn push(&mut self, value: Value) {
		self.stack.push(value);
	}

	pub(crate) fn pop(&mut self, index: usize) -> Result<Value> {
		match self.stack.pop() {
			Some(value) => Ok(value),
			None => bail!(AnalysisError::StackUnderflow { index }),
		}
	}

	/// Pops a value, checking that it's of the kind given.
	pub(crate) fn pop_expecting(&mut self, index: usize, expected: &Value) -> Result<Value> {
		let value = self.pop(index)?;
		let fits = match expected {
			Value::Object(_) => value.is_reference(),
			expected => value == *expected,
		};
		if !fits {
			bail!(AnalysisError::TypeMismatch { index });
		}
		Ok(value)
	}

	pub(crate) fn pop_reference(&mut self, index: usize) -> Result<Value> {
		let value = self.pop(index)?;
		if !value.is_reference() {
			bail!(AnalysisError::TypeMismatch { index });
		}
		Ok(value)
	}

	/// Pops values taking up exactly `words` words, returned in the order they were popped.
	///
	/// Fails if a `long` or `double` would be split.
	pub(crate) fn pop_words(&mut self, index: usize, words: u16) -> Result<Vec<Value>> {
		let mut popped = Vec::with_capacity(words as usize);
		let mut size = 0;
		while size < words {
			let value = self.pop(index)?;
			size += value.size();
			popped.push(value);
		}
		if size != words {
			bail!(AnalysisError::TypeMismatch { index });
		}
		Ok(popped)
	}

	/// Pushes values popped by [`Frame::pop_words`] back, restoring their order.
	pub(crate) fn push_words(&mut self, popped: &[Value]) {
		self.stack.extend(popped.iter().rev().cloned());
	}

	pub(crate) fn load(&self, index: usize, local: u16, expected: &Value) -> Result<Value> {
		let value = self.locals.get(local as usize).cloned().unwrap_or(Value::Top);
		let fits = match expected {
			Value::Object(_) => value.is_reference(),
			expected => value == *expected,
		};
		if !fits {
			bail!(AnalysisError::InvalidLocal { index, local });
		}
		Ok(value)
	}

	pub(crate) fn store(&mut self, local: u16, value: Value) {
		let slot = local as usize;
		let needed = slot + value.size() as usize;
		if self.locals.len() < needed {
			self.locals.resize(needed, Value::Top);
		}
		// overwriting the second half of a wide value destroys it
		if slot > 0 && self.locals[slot - 1].is_wide() {
			self.locals[slot - 1] = Value::Top;
		}
		if value.is_wide() {
			self.locals[slot + 1] = Value::Top;
		}
		self.locals[slot] = value;
	}

	/// Replaces every occurrence of an uninitialized value, once its constructor was called.
	pub(crate) fn initialize(&mut self, uninitialized: &Value, initialized: &Value) {
		for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
			if value == uninitialized {
				*value = initialized.clone();
			}
		}
	}

	/// Merges `other` into this frame, returning whether this frame changed.
	///
	/// `index` is the instruction this frame belongs to, for the error of differing stack heights.
	pub fn merge_from(&mut self, other: &Frame, index: usize, hierarchy: &ClassHierarchy) -> Result<bool> {
		if self.stack.len() != other.stack.len() {
			bail!(AnalysisError::StackHeightMismatch { index });
		}
		let mut changed = false;

		let mut stack = Vec::with_capacity(self.stack.len());
		for (a, b) in self.stack.iter().zip(&other.stack) {
			if a.size() != b.size() {
				bail!(AnalysisError::StackHeightMismatch { index });
			}
			let merged = a.merge(b, hierarchy);
			changed |= merged != *a;
			stack.push(merged);
		}

		// a local missing on one side is unset there
		let mut locals = Vec::with_capacity(self.locals.len());
		for (i, a) in self.locals.iter().enumerate() {
			let merged = match other.locals.get(i) {
				Some(b) => a.merge(b, hierarchy),
				None => Value::Top,
			};
			changed |= merged != *a;
			locals.push(merged);
		}
		// a wide value whose second slot got merged into something else isn't usable anymore
		for i in 0..locals.len() {
			if locals[i].is_wide() && locals.get(i + 1) != Some(&Value::Top) {
				locals[i] = Value::Top;
				changed = true;
			}
		}

		let init = self.init.merge(other.init);
		changed |= init != self.init;

		self.stack = stack;
		self.locals = locals;
		self.init = init;
		Ok(changed)
	}

	/// Whether every value of `other` can be used where this frame has its value, so whether this frame
	/// is an upper bound of `other`.
	pub fn includes(&self, other: &Frame, hierarchy: &ClassHierarchy) -> bool {
		fn includes(a: &Value, b: &Value, hierarchy: &ClassHierarchy) -> bool {
			match (a, b) {
				(a, b) if a == b => true,
				(Value::Top, _) => true,
				(Value::Object(_), Value::Null) => true,
				(Value::Object(a), Value::Object(b)) => hierarchy.is_assignable(a, b),
				_ => false,
			}
		}
		self.stack.len() == other.stack.len() &&
			self.stack.iter().zip(&other.stack).all(|(a, b)| includes(a, b, hierarchy)) &&
			self.locals.iter().enumerate().all(|(i, a)| includes(a, other.locals.get(i).unwrap_or(&Value::Top), hierarchy)) &&
			(self.init == other.init || self.init == InitState::Conflict)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::analysis::frame::{array_of, Frame, InitState, Value};
	use crate::error::AnalysisError;
	use crate::hierarchy::ClassHierarchy;
	use crate::tree::class::ClassName;

	fn object(name: &str) -> Result<Value> {
		Ok(Value::Object(ClassName::try_from(name)?))
	}

	fn frame(locals: Vec<Value>, stack: Vec<Value>) -> Frame {
		Frame { locals, stack, init: InitState::Initialized }
	}

	#[test]
	fn value_merges() -> Result<()> {
		let hierarchy = ClassHierarchy::new();
		assert_eq!(Value::Integer.merge(&Value::Integer, &hierarchy), Value::Integer);
		assert_eq!(Value::Integer.merge(&Value::Float, &hierarchy), Value::Top);
		assert_eq!(Value::Null.merge(&object("a/B")?, &hierarchy), object("a/B")?);
		assert_eq!(object("a/B")?.merge(&object("a/C")?, &hierarchy), object("java/lang/Object")?);
		assert_eq!(Value::Uninitialized(1).merge(&Value::Uninitialized(4), &hierarchy), Value::Top);
		assert_eq!(Value::UninitializedThis.merge(&object("a/B")?, &hierarchy), Value::Top);
		Ok(())
	}

	#[test]
	fn frame_merges() -> Result<()> {
		let hierarchy = ClassHierarchy::new();
		let mut a = frame(vec![Value::Integer, Value::Long, Value::Top], vec![Value::Null]);
		let b = frame(vec![Value::Float, Value::Long, Value::Top], vec![object("a/B")?]);

		assert!(a.merge_from(&b, 3, &hierarchy)?);
		assert_eq!(a, frame(vec![Value::Top, Value::Long, Value::Top], vec![object("a/B")?]));
		assert!(a.includes(&b, &hierarchy));
		assert!(!a.merge_from(&b, 3, &hierarchy)?);

		let c = frame(vec![Value::Integer], vec![]);
		let err = a.merge_from(&c, 3, &hierarchy).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::StackHeightMismatch { index: 3 }));
		Ok(())
	}

	#[test]
	fn broken_wide_locals_become_top() -> Result<()> {
		let hierarchy = ClassHierarchy::new();
		let mut a = frame(vec![Value::Long, Value::Top, Value::Integer], vec![]);
		let b = frame(vec![Value::Long, Value::Top, Value::Integer], vec![]);
		assert!(!a.merge_from(&b, 0, &hierarchy)?);

		let mut frame = frame(vec![Value::Long, Value::Top], vec![]);
		frame.store(1, Value::Integer);
		assert_eq!(frame.locals, vec![Value::Top, Value::Integer]);
		frame.store(2, Value::Double);
		assert_eq!(frame.locals, vec![Value::Top, Value::Integer, Value::Double, Value::Top]);
		assert_eq!(frame.locals_size(), 4);
		Ok(())
	}

	#[test]
	fn words() -> Result<()> {
		let mut frame = frame(vec![], vec![Value::Integer, Value::Long, Value::Float]);
		assert_eq!(frame.stack_size(), 4);
		let popped = frame.pop_words(0, 1)?;
		assert_eq!(popped, vec![Value::Float]);
		let err = frame.pop_words(1, 1).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::TypeMismatch { index: 1 }));
		Ok(())
	}

	#[test]
	fn array_types() -> Result<()> {
		assert_eq!(array_of(&ClassName::try_from("a/B")?), ClassName::try_from("[La/B;")?);
		assert_eq!(array_of(&ClassName::try_from("[I")?), ClassName::try_from("[[I")?);
		assert_eq!(object("[[I")?.array_element(), object("[I")?);
		assert_eq!(object("[J")?.array_element(), Value::Long);
		assert_eq!(Value::Null.array_element(), Value::Null);
		Ok(())
	}
}
