use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::class_constants::atype;
use crate::error::CodecError;
use crate::macros::make_name;
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::field::{FieldDescriptor, FieldName, FieldRef, FieldSignature};
use crate::tree::method::{MethodDescriptor, MethodName, MethodRef};
use crate::tree::method::frame::StackMapData;

/// Represents the code of a method.
///
/// Instructions are addressed by their index in [`Code::instructions`]. Everything that refers to a position in
/// the code does so through a [`Label`], which the [`Labels`] arena binds to such an index. The index
/// `instructions.len()` is valid as well, it denotes the end of the code.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Code {
	/// [`None`] if it's unknown, for example after a rewriting pass. The writer then computes it.
	pub max_stack: Option<u16>,
	pub max_locals: Option<u16>,

	pub instructions: Vec<Instruction>,
	pub labels: Labels,
	pub exception_table: Vec<Exception>,

	/// The frames of the `StackMapTable` attribute, if present.
	pub frames: Option<Vec<(Label, StackMapData)>>,
	pub line_numbers: Option<Vec<(Label, u16)>>,
	/// The entries of both the `LocalVariableTable` and the `LocalVariableTypeTable` attribute.
	pub local_variables: Option<Vec<Lv>>,

	pub attributes: Vec<Attribute>,
}

impl Code {
	pub fn new() -> Code {
		Code::default()
	}

	/// Creates a new label bound to the instruction index given.
	pub fn label_at(&mut self, index: usize) -> Label {
		self.labels.create_at(index)
	}

	/// Inserts instructions before the instruction at `index`.
	///
	/// Labels bound to `index` stay there, so they point to the first inserted instruction afterwards.
	/// Labels after it move along with their instructions.
	pub fn insert(&mut self, index: usize, instructions: impl IntoIterator<Item=Instruction>) {
		let before = self.instructions.len();
		self.instructions.splice(index..index, instructions);
		let count = self.instructions.len() - before;
		self.labels.shift_after(index, count);
	}

	/// Whether any `jsr` or `ret` is left in the code.
	pub fn has_subroutines(&self) -> bool {
		self.instructions.iter().any(|i| matches!(i, Instruction::Jsr(_) | Instruction::Ret(_)))
	}

	/// Forgets the frames and the maximum values, since they are invalid after rewriting the code.
	pub fn invalidate_computed(&mut self) {
		self.frames = None;
		self.max_stack = None;
		self.max_locals = None;
	}

	/// Replaces every label used anywhere in this code, leaving the [`Labels`] arena itself alone.
	pub fn map_labels(&mut self, mut f: impl FnMut(Label) -> Label) {
		for instruction in &mut self.instructions {
			instruction.map_targets(&mut f);
		}
		for exception in &mut self.exception_table {
			exception.start = f(exception.start);
			exception.end = f(exception.end);
			exception.handler = f(exception.handler);
		}
		for (label, frame) in self.frames.iter_mut().flatten() {
			*label = f(*label);
			frame.map_labels(&mut f);
		}
		for (label, _) in self.line_numbers.iter_mut().flatten() {
			*label = f(*label);
		}
		for lv in self.local_variables.iter_mut().flatten() {
			lv.start = f(lv.start);
			lv.end = f(lv.end);
		}
	}

	/// Resolves a label of this code to its instruction index.
	pub fn resolve(&self, label: Label) -> Result<usize> {
		let index = self.labels.resolve(label)?;
		if index > self.instructions.len() {
			bail!("label {label:?} bound to {index} is out of bounds for {} instructions", self.instructions.len());
		}
		Ok(index)
	}
}

/// The arena of all the [`Label`]s of one [`Code`].
///
/// A label can be created before knowing its position, and be bound later. Several labels may be bound to
/// the same position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Labels {
	positions: Vec<Option<usize>>,
}

impl Labels {
	pub fn new() -> Labels {
		Labels::default()
	}

	/// Creates a label that isn't bound to any position yet.
	pub fn create(&mut self) -> Label {
		let label = Label { id: self.positions.len() as u32 };
		self.positions.push(None);
		label
	}

	pub fn create_at(&mut self, position: usize) -> Label {
		let label = self.create();
		self.positions[label.id as usize] = Some(position);
		label
	}

	pub fn bind(&mut self, label: Label, position: usize) -> Result<()> {
		let Some(slot) = self.positions.get_mut(label.id as usize) else {
			bail!("label {label:?} doesn't belong to this code");
		};
		*slot = Some(position);
		Ok(())
	}

	pub fn position(&self, label: Label) -> Option<usize> {
		self.positions.get(label.id as usize).copied().flatten()
	}

	/// Like [`Labels::position`], but fails with [`CodecError::UnresolvedLabel`].
	pub fn resolve(&self, label: Label) -> Result<usize> {
		match self.position(label) {
			Some(position) => Ok(position),
			None => bail!(CodecError::UnresolvedLabel { label }),
		}
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item=(Label, Option<usize>)> + '_ {
		self.positions.iter()
			.enumerate()
			.map(|(id, &position)| (Label { id: id as u32 }, position))
	}

	/// Makes room for labels up to and including the one given, so that it can be bound.
	pub(crate) fn grow_to(&mut self, label: Label) {
		let len = label.id as usize + 1;
		if self.positions.len() < len {
			self.positions.resize(len, None);
		}
	}

	/// Moves every label bound after `index` by `count`.
	pub(crate) fn shift_after(&mut self, index: usize, count: usize) {
		for position in self.positions.iter_mut().flatten() {
			if *position > index {
				*position += count;
			}
		}
	}
}

/// A handle into the [`Labels`] arena of a [`Code`].
///
/// The id does **not** correspond to the bytecode offset in any direct way. Labels are only meaningful
/// together with the [`Labels`] they were created by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
	pub(crate) id: u32,
}

make_name! {
	pub LocalVariableName;
}

impl LocalVariableName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if crate::tree::names::is_valid_unqualified_name(inner) {
			Ok(())
		} else {
			bail!("invalid local variable name: must be non-empty and not contain any of `.`, `;`, `[` and `/`")
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
	pub start: Label,
	/// Exclusive.
	pub end: Label,
	pub handler: Label,
	/// [`None`] catches everything.
	pub catch: Option<ClassName>,
}

/// Represents an index of a local variable.
///
/// If the local variable is of type `double` or `long`, it also occupies
/// the [`LvIndex`] with `index = index + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LvIndex {
	pub index: u16,
}

/// An entry of the `LocalVariableTable` (if `descriptor` is set) and of the
/// `LocalVariableTypeTable` (if `signature` is set).
#[derive(Debug, Clone, PartialEq)]
pub struct Lv {
	pub start: Label,
	/// Exclusive.
	pub end: Label,
	pub name: LocalVariableName,
	pub descriptor: Option<FieldDescriptor>,
	pub signature: Option<FieldSignature>,
	pub index: LvIndex,
}

/// Represents an instruction of the JVM.
///
/// Each instruction can either:
/// - hold no additional data, like [`Instruction::Nop`],
/// - hold some immediate value, like [`Instruction::BiPush`],
/// - hold a [local variable index][LvIndex], like [`Instruction::ILoad`] (note that this also represents the `iload_0` and `wide iload` instructions),
/// - hold a [`Label`] for jumps, like [`Instruction::IfEq`] (also representing `goto_w` and `jsr_w` for the unconditional ones),
/// - or hold other data the instruction needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	Nop,
	AConstNull,
	IConstM1, IConst0, IConst1, IConst2, IConst3, IConst4, IConst5,
	LConst0, LConst1,
	FConst0, FConst1, FConst2,
	DConst0, DConst1,
	BiPush(i8),
	SiPush(i16),
	/// `ldc`, `ldc_w` and `ldc2_w`.
	Ldc(Loadable),
	ILoad(LvIndex), LLoad(LvIndex), FLoad(LvIndex), DLoad(LvIndex), ALoad(LvIndex),
	IALoad, LALoad, FALoad, DALoad, AALoad, BALoad, CALoad, SALoad,
	IStore(LvIndex), LStore(LvIndex), FStore(LvIndex), DStore(LvIndex), AStore(LvIndex),
	IAStore, LAStore, FAStore, DAStore, AAStore, BAStore, CAStore, SAStore,
	Pop, Pop2,
	Dup, DupX1, DupX2,
	Dup2, Dup2X1, Dup2X2,
	Swap,
	IAdd, LAdd, FAdd, DAdd,
	ISub, LSub, FSub, DSub,
	IMul, LMul, FMul, DMul,
	IDiv, LDiv, FDiv, DDiv,
	IRem, LRem, FRem, DRem,
	INeg, LNeg, FNeg, DNeg,
	IShl, LShl,
	IShr, LShr,
	IUShr, LUShr,
	IAnd, LAnd,
	IOr, LOr,
	IXor, LXor,
	IInc(LvIndex, i16),
	I2L, I2F, I2D,
	L2I, L2F, L2D,
	F2I, F2L, F2D,
	D2I, D2L, D2F,
	I2B, I2C, I2S,
	LCmp,
	FCmpL, FCmpG,
	DCmpL, DCmpG,
	IfEq(Label), IfNe(Label), IfLt(Label), IfGe(Label), IfGt(Label), IfLe(Label),
	IfICmpEq(Label), IfICmpNe(Label), IfICmpLt(Label), IfICmpGe(Label), IfICmpGt(Label), IfICmpLe(Label),
	IfACmpEq(Label), IfACmpNe(Label),
	Goto(Label),
	Jsr(Label),
	Ret(LvIndex),
	TableSwitch {
		default: Label,
		low: i32,
		high: i32,
		table: Vec<Label>,
	},
	LookupSwitch {
		default: Label,
		/// Note that these must be ordered by key.
		pairs: Vec<(i32, Label)>
	},
	IReturn, LReturn, FReturn, DReturn, AReturn,
	Return,
	GetStatic(FieldRef),
	PutStatic(FieldRef),
	GetField(FieldRef),
	PutField(FieldRef),
	InvokeVirtual(MethodRef),
	/// The bool is `true` iff it's on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeSpecial(MethodRef, bool),
	/// The bool is `true` iff it's on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeStatic(MethodRef, bool),
	/// `invokeinterface` always uses an `InterfaceMethodRef` constant pool entry.
	InvokeInterface(MethodRef),
	InvokeDynamic(InvokeDynamic),
	New(ClassName),
	NewArray(ArrayType),
	ANewArray(ClassName),
	ArrayLength,
	AThrow,
	CheckCast(ClassName),
	InstanceOf(ClassName),
	MonitorEnter, MonitorExit,
	MultiANewArray(ClassName, u8),
	IfNull(Label), IfNonNull(Label),
}

impl Instruction {
	/// Whether this is one of the conditional jumps.
	pub fn is_conditional_jump(&self) -> bool {
		matches!(self,
			Instruction::IfEq(_) | Instruction::IfNe(_) | Instruction::IfLt(_) |
			Instruction::IfGe(_) | Instruction::IfGt(_) | Instruction::IfLe(_) |
			Instruction::IfICmpEq(_) | Instruction::IfICmpNe(_) | Instruction::IfICmpLt(_) |
			Instruction::IfICmpGe(_) | Instruction::IfICmpGt(_) | Instruction::IfICmpLe(_) |
			Instruction::IfACmpEq(_) | Instruction::IfACmpNe(_) |
			Instruction::IfNull(_) | Instruction::IfNonNull(_)
		)
	}

	pub fn is_return(&self) -> bool {
		matches!(self,
			Instruction::IReturn | Instruction::LReturn | Instruction::FReturn |
			Instruction::DReturn | Instruction::AReturn | Instruction::Return
		)
	}

	/// Whether execution can continue with the next instruction after this one.
	///
	/// A `jsr` is treated as falling through, since the subroutine returns to the following instruction.
	pub fn falls_through(&self) -> bool {
		!(self.is_return() || matches!(self,
			Instruction::Goto(_) | Instruction::Ret(_) | Instruction::AThrow |
			Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. }
		))
	}

	/// All the labels this instruction may jump to, in operand order.
	pub fn targets(&self) -> Vec<Label> {
		match self {
			Instruction::IfEq(l) | Instruction::IfNe(l) | Instruction::IfLt(l) |
			Instruction::IfGe(l) | Instruction::IfGt(l) | Instruction::IfLe(l) |
			Instruction::IfICmpEq(l) | Instruction::IfICmpNe(l) | Instruction::IfICmpLt(l) |
			Instruction::IfICmpGe(l) | Instruction::IfICmpGt(l) | Instruction::IfICmpLe(l) |
			Instruction::IfACmpEq(l) | Instruction::IfACmpNe(l) |
			Instruction::IfNull(l) | Instruction::IfNonNull(l) |
			Instruction::Goto(l) | Instruction::Jsr(l) => vec![*l],
			Instruction::TableSwitch { default, table, .. } => {
				let mut vec = Vec::with_capacity(table.len() + 1);
				vec.push(*default);
				vec.extend_from_slice(table);
				vec
			},
			Instruction::LookupSwitch { default, pairs } => {
				let mut vec = Vec::with_capacity(pairs.len() + 1);
				vec.push(*default);
				vec.extend(pairs.iter().map(|&(_, label)| label));
				vec
			},
			_ => Vec::new(),
		}
	}

	/// Replaces every label this instruction jumps to.
	pub fn map_targets(&mut self, mut f: impl FnMut(Label) -> Label) {
		match self {
			Instruction::IfEq(l) | Instruction::IfNe(l) | Instruction::IfLt(l) |
			Instruction::IfGe(l) | Instruction::IfGt(l) | Instruction::IfLe(l) |
			Instruction::IfICmpEq(l) | Instruction::IfICmpNe(l) | Instruction::IfICmpLt(l) |
			Instruction::IfICmpGe(l) | Instruction::IfICmpGt(l) | Instruction::IfICmpLe(l) |
			Instruction::IfACmpEq(l) | Instruction::IfACmpNe(l) |
			Instruction::IfNull(l) | Instruction::IfNonNull(l) |
			Instruction::Goto(l) | Instruction::Jsr(l) => *l = f(*l),
			Instruction::TableSwitch { default, table, .. } => {
				*default = f(*default);
				for label in table {
					*label = f(*label);
				}
			},
			Instruction::LookupSwitch { default, pairs } => {
				*default = f(*default);
				for (_, label) in pairs {
					*label = f(*label);
				}
			},
			_ => {},
		}
	}
}

/// A value loadable by the `ldc` family of instructions, also used as bootstrap method argument.
///
/// Floating point values compare by their bits.
#[derive(Debug, Clone)]
pub enum Loadable {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class(ClassName),
	String(JavaString),
	MethodHandle(Handle),
	MethodType(MethodDescriptor),
	Dynamic(ConstantDynamic),
}

impl Loadable {
	/// Whether this takes up two stack words, and therefore needs `ldc2_w`.
	pub fn is_wide(&self) -> bool {
		match self {
			Loadable::Long(_) | Loadable::Double(_) => true,
			Loadable::Dynamic(dynamic) => matches!(dynamic.descriptor.as_str(), Ok("J" | "D")),
			_ => false,
		}
	}
}

impl PartialEq for Loadable {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Loadable::Integer(a), Loadable::Integer(b)) => a == b,
			(Loadable::Float(a), Loadable::Float(b)) => a.to_bits() == b.to_bits(),
			(Loadable::Long(a), Loadable::Long(b)) => a == b,
			(Loadable::Double(a), Loadable::Double(b)) => a.to_bits() == b.to_bits(),
			(Loadable::Class(a), Loadable::Class(b)) => a == b,
			(Loadable::String(a), Loadable::String(b)) => a == b,
			(Loadable::MethodHandle(a), Loadable::MethodHandle(b)) => a == b,
			(Loadable::MethodType(a), Loadable::MethodType(b)) => a == b,
			(Loadable::Dynamic(a), Loadable::Dynamic(b)) => a == b,
			_ => false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
	GetField(FieldRef),
	GetStatic(FieldRef),
	PutField(FieldRef),
	PutStatic(FieldRef),
	InvokeVirtual(MethodRef),
	/// The bool is `true` iff it refers to an `InterfaceMethodRef`.
	InvokeStatic(MethodRef, bool),
	/// The bool is `true` iff it refers to an `InterfaceMethodRef`.
	InvokeSpecial(MethodRef, bool),
	NewInvokeSpecial(MethodRef),
	InvokeInterface(MethodRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDynamic {
	pub name: FieldName,
	pub descriptor: FieldDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDynamic {
	pub name: MethodName,
	pub descriptor: MethodDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

/// The element type of the `newarray` instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArrayType {
	Boolean,
	Char,
	Float,
	Double,
	Byte,
	Short,
	Int,
	Long,
}

impl ArrayType {
	pub(crate) fn from_atype(atype: u8) -> Option<ArrayType> {
		match atype {
			atype::T_BOOLEAN => Some(ArrayType::Boolean),
			atype::T_CHAR    => Some(ArrayType::Char),
			atype::T_FLOAT   => Some(ArrayType::Float),
			atype::T_DOUBLE  => Some(ArrayType::Double),
			atype::T_BYTE    => Some(ArrayType::Byte),
			atype::T_SHORT   => Some(ArrayType::Short),
			atype::T_INT     => Some(ArrayType::Int),
			atype::T_LONG    => Some(ArrayType::Long),
			_ => None,
		}
	}

	pub(crate) fn to_atype(self) -> u8 {
		match self {
			ArrayType::Boolean => atype::T_BOOLEAN,
			ArrayType::Char    => atype::T_CHAR,
			ArrayType::Float   => atype::T_FLOAT,
			ArrayType::Double  => atype::T_DOUBLE,
			ArrayType::Byte    => atype::T_BYTE,
			ArrayType::Short   => atype::T_SHORT,
			ArrayType::Int     => atype::T_INT,
			ArrayType::Long    => atype::T_LONG,
		}
	}

	/// The class name of a one dimensional array of this type, like `[I`.
	pub fn array_class_name(self) -> ClassName {
		let name = match self {
			ArrayType::Boolean => "[Z",
			ArrayType::Char    => "[C",
			ArrayType::Float   => "[F",
			ArrayType::Double  => "[D",
			ArrayType::Byte    => "[B",
			ArrayType::Short   => "[S",
			ArrayType::Int     => "[I",
			ArrayType::Long    => "[J",
		};
		ClassName::from_inner_unchecked(JavaString::from(name))
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::error::CodecError;
	use crate::tree::method::code::{Code, Exception, Instruction, Labels, Loadable};

	#[test]
	fn labels_bind_late() -> Result<()> {
		let mut labels = Labels::new();
		let a = labels.create();
		let b = labels.create_at(3);
		assert_eq!(labels.position(a), None);
		assert_eq!(labels.position(b), Some(3));

		let err = labels.resolve(a).unwrap_err();
		assert_eq!(err.root_cause().downcast_ref::<CodecError>(), Some(&CodecError::UnresolvedLabel { label: a }));

		labels.bind(a, 3)?;
		assert_eq!(labels.resolve(a)?, 3);
		Ok(())
	}

	#[test]
	fn insert_keeps_labels_at_the_insertion_point() -> Result<()> {
		let mut code = Code::new();
		code.instructions = vec![Instruction::Nop, Instruction::IConst0, Instruction::IReturn];
		let first = code.label_at(0);
		let at = code.label_at(1);
		let after = code.label_at(2);
		let end = code.label_at(3);

		code.insert(1, [Instruction::Nop, Instruction::Nop]);

		assert_eq!(code.instructions.len(), 5);
		assert_eq!(code.resolve(first)?, 0);
		assert_eq!(code.resolve(at)?, 1);
		assert_eq!(code.resolve(after)?, 4);
		assert_eq!(code.resolve(end)?, 5);
		Ok(())
	}

	#[test]
	fn map_labels_reaches_everything() -> Result<()> {
		let mut code = Code::new();
		let start = code.label_at(0);
		let end = code.label_at(1);
		let other = code.labels.create_at(0);
		code.instructions = vec![Instruction::Goto(start)];
		code.exception_table.push(Exception { start, end, handler: start, catch: None });
		code.line_numbers = Some(vec![(start, 7)]);

		code.map_labels(|label| if label == start { other } else { label });

		assert_eq!(code.instructions, vec![Instruction::Goto(other)]);
		assert_eq!(code.exception_table, vec![Exception { start: other, end, handler: other, catch: None }]);
		assert_eq!(code.line_numbers, Some(vec![(other, 7)]));
		Ok(())
	}

	#[test]
	fn control_flow_properties() {
		let mut labels = Labels::new();
		let target = labels.create();
		assert!(Instruction::IfEq(target).falls_through());
		assert!(Instruction::Jsr(target).falls_through());
		assert!(!Instruction::Goto(target).falls_through());
		assert!(!Instruction::AThrow.falls_through());
		assert!(!Instruction::Return.falls_through());
		assert_eq!(Instruction::Goto(target).targets(), vec![target]);
		assert!(Instruction::Nop.targets().is_empty());
	}

	#[test]
	fn wide_loadables() {
		assert!(Loadable::Long(1).is_wide());
		assert!(Loadable::Double(1.0).is_wide());
		assert!(!Loadable::Integer(1).is_wide());
		assert_eq!(Loadable::Float(f32::NAN), Loadable::Float(f32::NAN));
	}
}
