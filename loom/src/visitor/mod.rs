//! The event stream between decoding and encoding.
//!
//! A class is seen as a sequence of [`ClassEvent`]s: the class header, then its fields, then its methods (each with
//! the [`CodeEvent`]s of their code), then the end of the class. A [`ClassSink`] consumes such a sequence and produces
//! something in the end. Sinks that forward events to another sink form a pipeline:
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use loom::visitor::stages::{Inspect, MethodPass};
//! use loom::visitor::ClassEvent;
//!
//! let mut methods = 0;
//! let pipeline = Inspect::new(
//!     |event: &ClassEvent| {
//!         if matches!(event, ClassEvent::BeginMethod(_)) {
//!             methods += 1;
//!         }
//!         Ok(())
//!     },
//!     MethodPass::new(|_, method| {
//!         method.has_synthetic_attribute = true;
//!         Ok(())
//!     }, Vec::new()),
//! );
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```
//!
//! Labels inside code events may be used before the [`CodeEvent::Label`] binding them was seen, sinks resolve them at
//! the end of the method.

use std::collections::HashMap;
use anyhow::{bail, Result};
use crate::error::CodecError;
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassFile;
use crate::tree::field::Field;
use crate::tree::method::code::{Code, Exception, Instruction, Label, Lv};
use crate::tree::method::frame::StackMapData;
use crate::tree::method::Method;

pub mod tree;
pub mod stages;

#[derive(Debug, Clone, PartialEq)]
pub enum ClassEvent {
	/// The header of the class together with its own attributes.
	///
	/// The `fields` and `methods` are always empty, they follow as separate events.
	BeginClass(Box<ClassFile>),
	Field(Box<Field>),
	/// A method without its code.
	///
	/// If the method has code, [`ClassEvent::Code`] events follow, starting with [`CodeEvent::Begin`].
	BeginMethod(Box<Method>),
	Code(CodeEvent),
	EndMethod,
	EndClass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodeEvent {
	Begin {
		max_stack: Option<u16>,
		max_locals: Option<u16>,
	},
	ExceptionRange(Exception),
	/// Binds the label to the position of the next instruction, or the end of the code if none follows.
	Label(Label),
	Frame(Label, StackMapData),
	LineNumber(Label, u16),
	Instruction(Instruction),
	LocalVariable(Lv),
	Attribute(Attribute),
}

/// Consumes the events of a single class.
pub trait ClassSink {
	type Output;

	fn accept(&mut self, event: ClassEvent) -> Result<()>;

	/// Called after [`ClassEvent::EndClass`] was accepted.
	fn finish(self) -> Result<Self::Output>;
}

/// Records all the events.
impl ClassSink for Vec<ClassEvent> {
	type Output = Vec<ClassEvent>;

	fn accept(&mut self, event: ClassEvent) -> Result<()> {
		self.push(event);
		Ok(())
	}

	fn finish(self) -> Result<Self::Output> {
		Ok(self)
	}
}

/// Turns a class tree back into events, in the same order decoding a class file gives them.
pub fn replay<S: ClassSink>(mut class: ClassFile, mut sink: S) -> Result<S::Output> {
	let fields = std::mem::take(&mut class.fields);
	let methods = std::mem::take(&mut class.methods);

	sink.accept(ClassEvent::BeginClass(Box::new(class)))?;
	for field in fields {
		sink.accept(ClassEvent::Field(Box::new(field)))?;
	}
	for method in methods {
		emit_method(method, &mut sink)?;
	}
	sink.accept(ClassEvent::EndClass)?;
	sink.finish()
}

/// Pushes the events of a method, including the ones of its code.
pub fn emit_method<S: ClassSink + ?Sized>(mut method: Method, sink: &mut S) -> Result<()> {
	let code = method.code.take();
	sink.accept(ClassEvent::BeginMethod(Box::new(method)))?;
	if let Some(code) = code {
		emit_code(code, sink)?;
	}
	sink.accept(ClassEvent::EndMethod)
}

/// Pushes the events of the code of a method.
///
/// All exception ranges come first. Then for each position, the labels bound there (in the order they were
/// created), each one followed by its frames and line numbers, and then the instruction. Local variables and
/// raw attributes come last.
fn emit_code<S: ClassSink + ?Sized>(code: Code, sink: &mut S) -> Result<()> {
	let Code {
		max_stack, max_locals, instructions, labels, exception_table, frames, line_numbers, local_variables, attributes,
	} = code;

	sink.accept(ClassEvent::Code(CodeEvent::Begin { max_stack, max_locals }))?;

	for exception in exception_table {
		sink.accept(ClassEvent::Code(CodeEvent::ExceptionRange(exception)))?;
	}

	let mut bound_at: Vec<Vec<Label>> = vec![Vec::new(); instructions.len() + 1];
	for (label, position) in labels.iter() {
		if let Some(position) = position {
			let Some(slot) = bound_at.get_mut(position) else {
				bail!("label {label:?} bound to {position} is out of bounds for {} instructions", instructions.len());
			};
			slot.push(label);
		}
	}

	let mut frames_of: HashMap<Label, Vec<StackMapData>> = HashMap::new();
	for (label, frame) in frames.into_iter().flatten() {
		labels.resolve(label)?;
		frames_of.entry(label).or_default().push(frame);
	}
	let mut lines_of: HashMap<Label, Vec<u16>> = HashMap::new();
	for (label, line) in line_numbers.into_iter().flatten() {
		labels.resolve(label)?;
		lines_of.entry(label).or_default().push(line);
	}

	let mut emit_labels = |sink: &mut S, labels: &[Label]| -> Result<()> {
		for &label in labels {
			sink.accept(ClassEvent::Code(CodeEvent::Label(label)))?;
			for frame in frames_of.remove(&label).into_iter().flatten() {
				sink.accept(ClassEvent::Code(CodeEvent::Frame(label, frame)))?;
			}
			for line in lines_of.remove(&label).into_iter().flatten() {
				sink.accept(ClassEvent::Code(CodeEvent::LineNumber(label, line)))?;
			}
		}
		Ok(())
	};

	for (instruction, labels) in instructions.into_iter().zip(&bound_at) {
		emit_labels(&mut *sink, labels)?;
		sink.accept(ClassEvent::Code(CodeEvent::Instruction(instruction)))?;
	}
	if let Some(end) = bound_at.last() {
		emit_labels(&mut *sink, end)?;
	}

	for lv in local_variables.into_iter().flatten() {
		sink.accept(ClassEvent::Code(CodeEvent::LocalVariable(lv)))?;
	}
	for attribute in attributes {
		sink.accept(ClassEvent::Code(CodeEvent::Attribute(attribute)))?;
	}

	Ok(())
}

/// Assembles code events back into a [`Code`].
#[derive(Debug)]
pub(crate) struct CodeBuilder {
	code: Code,
}

impl CodeBuilder {
	pub(crate) fn new(max_stack: Option<u16>, max_locals: Option<u16>) -> CodeBuilder {
		let mut code = Code::new();
		code.max_stack = max_stack;
		code.max_locals = max_locals;
		CodeBuilder { code }
	}

	pub(crate) fn accept(&mut self, event: CodeEvent) -> Result<()> {
		let code = &mut self.code;
		match event {
			CodeEvent::Begin { .. } => bail!("code may only begin once per method"),
			CodeEvent::ExceptionRange(exception) => code.exception_table.push(exception),
			CodeEvent::Label(label) => {
				if code.labels.position(label).is_some() {
					bail!("label {label:?} is bound twice");
				}
				code.labels.grow_to(label);
				code.labels.bind(label, code.instructions.len())?;
			},
			CodeEvent::Frame(label, frame) => code.frames.get_or_insert_with(Vec::new).push((label, frame)),
			CodeEvent::LineNumber(label, line) => code.line_numbers.get_or_insert_with(Vec::new).push((label, line)),
			CodeEvent::Instruction(instruction) => code.instructions.push(instruction),
			CodeEvent::LocalVariable(lv) => code.local_variables.get_or_insert_with(Vec::new).push(lv),
			CodeEvent::Attribute(attribute) => code.attributes.push(attribute),
		}
		Ok(())
	}

	/// Gives the code, failing with [`CodecError::UnresolvedLabel`] if any label used was never bound.
	pub(crate) fn finish(mut self) -> Result<Code> {
		let mut used = Vec::new();
		self.code.map_labels(|label| {
			used.push(label);
			label
		});
		for label in used {
			if self.code.labels.position(label).is_none() {
				bail!(CodecError::UnresolvedLabel { label });
			}
		}
		Ok(self.code)
	}
}

/// Assembles the events of one method back into a [`Method`].
#[derive(Debug, Default)]
pub(crate) struct MethodBuilder {
	method: Option<Method>,
	code: Option<CodeBuilder>,
}

impl MethodBuilder {
	pub(crate) fn is_active(&self) -> bool {
		self.method.is_some()
	}

	pub(crate) fn begin(&mut self, method: Method) -> Result<()> {
		if let Some(active) = &self.method {
			bail!("method {:?} {:?} began before method {:?} {:?} ended", method.name, method.descriptor, active.name, active.descriptor);
		}
		self.method = Some(method);
		Ok(())
	}

	pub(crate) fn code(&mut self, event: CodeEvent) -> Result<()> {
		if self.method.is_none() {
			bail!("code event {event:?} outside of a method");
		}
		match event {
			CodeEvent::Begin { max_stack, max_locals } => {
				if self.code.is_some() {
					bail!("code may only begin once per method");
				}
				self.code = Some(CodeBuilder::new(max_stack, max_locals));
				Ok(())
			},
			event => match &mut self.code {
				Some(code) => code.accept(event),
				None => bail!("code event {event:?} before the code began"),
			},
		}
	}

	pub(crate) fn end(&mut self) -> Result<Method> {
		let Some(mut method) = self.method.take() else {
			bail!("method ended without beginning");
		};
		if let Some(code) = self.code.take() {
			method.code = Some(code.finish()?);
		}
		Ok(method)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::error::CodecError;
	use crate::tree::class::{ClassAccess, ClassFile, ClassName};
	use crate::tree::method::code::{Code, Exception, Instruction};
	use crate::tree::method::frame::StackMapData;
	use crate::tree::method::{Method, MethodAccess};
	use crate::tree::version::Version;
	use crate::visitor::{emit_method, replay, ClassEvent, CodeEvent, MethodBuilder};

	fn method_with_loop() -> Result<Method> {
		let mut code = Code::new();
		let start = code.labels.create();
		let end = code.labels.create();
		code.instructions = vec![Instruction::Nop, Instruction::Goto(start), Instruction::Return];
		code.labels.bind(end, 3)?;
		code.labels.bind(start, 1)?;
		code.exception_table.push(Exception { start, end, handler: start, catch: None });
		code.frames = Some(vec![(start, StackMapData::Same)]);
		code.line_numbers = Some(vec![(start, 4), (start, 5)]);

		let mut method = Method::new(MethodAccess::from(0x0009), "run".try_into()?, "()V".try_into()?);
		method.code = Some(code);
		Ok(method)
	}

	#[test]
	fn code_event_order() -> Result<()> {
		let method = method_with_loop()?;
		let code = method.code.clone().unwrap();
		let (start, end) = (code.exception_table[0].start, code.exception_table[0].end);

		let mut events = Vec::new();
		emit_method(method, &mut events)?;

		let code_events: Vec<_> = events.into_iter()
			.filter_map(|event| match event {
				ClassEvent::Code(event) => Some(event),
				_ => None,
			})
			.collect();
		assert_eq!(code_events, vec![
			CodeEvent::Begin { max_stack: None, max_locals: None },
			CodeEvent::ExceptionRange(code.exception_table[0].clone()),
			CodeEvent::Instruction(Instruction::Nop),
			CodeEvent::Label(start),
			CodeEvent::Frame(start, StackMapData::Same),
			CodeEvent::LineNumber(start, 4),
			CodeEvent::LineNumber(start, 5),
			CodeEvent::Instruction(Instruction::Goto(start)),
			CodeEvent::Instruction(Instruction::Return),
			CodeEvent::Label(end),
		]);
		Ok(())
	}

	#[test]
	fn methods_assemble_back() -> Result<()> {
		let method = method_with_loop()?;

		let mut events = Vec::new();
		emit_method(method.clone(), &mut events)?;

		let mut builder = MethodBuilder::default();
		for event in events {
			match event {
				ClassEvent::BeginMethod(method) => builder.begin(*method)?,
				ClassEvent::Code(event) => builder.code(event)?,
				ClassEvent::EndMethod => assert_eq!(builder.end()?, method),
				event => panic!("unexpected {event:?}"),
			}
		}
		assert!(!builder.is_active());
		Ok(())
	}

	#[test]
	fn unbound_labels_are_reported() -> Result<()> {
		let mut method = Method::new(MethodAccess::from(0x0009), "run".try_into()?, "()V".try_into()?);
		let mut code = Code::new();
		let nowhere = code.labels.create();
		code.instructions = vec![Instruction::Goto(nowhere)];
		method.code = Some(code);

		let mut builder = MethodBuilder::default();
		let mut events = Vec::new();
		emit_method(method, &mut events)?;
		for event in events {
			match event {
				ClassEvent::BeginMethod(method) => builder.begin(*method)?,
				ClassEvent::Code(event) => builder.code(event)?,
				ClassEvent::EndMethod => {
					let err = builder.end().unwrap_err();
					assert_eq!(err.root_cause().downcast_ref::<CodecError>(), Some(&CodecError::UnresolvedLabel { label: nowhere }));
				},
				event => panic!("unexpected {event:?}"),
			}
		}
		Ok(())
	}

	#[test]
	fn replay_order() -> Result<()> {
		let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new());
		class.methods.push(Method::new(MethodAccess::from(0x0401), "run".try_into()?, "()V".try_into()?));

		let events = replay(class.clone(), Vec::new())?;

		class.methods.clear();
		assert_eq!(events, vec![
			ClassEvent::BeginClass(Box::new(class)),
			ClassEvent::BeginMethod(Box::new(Method::new(MethodAccess::from(0x0401), "run".try_into()?, "()V".try_into()?))),
			ClassEvent::EndMethod,
			ClassEvent::EndClass,
		]);
		Ok(())
	}
}
