//! Symbolic execution of method code, computing the types of the locals and the operand stack before every
//! instruction.
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use loom::analysis::{analyze, frame::Value};
//! use loom::hierarchy::ClassHierarchy;
//! use loom::tree::class::{ClassAccess, ClassFile, ClassName};
//! use loom::tree::method::code::{Code, Instruction, LvIndex};
//! use loom::tree::method::{Method, MethodAccess};
//! use loom::tree::version::Version;
//!
//! let class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new());
//! let mut method = Method::new(MethodAccess::from(0x0009), "twice".try_into()?, "(I)I".try_into()?);
//! let mut code = Code::new();
//! code.instructions = vec![
//!     Instruction::ILoad(LvIndex { index: 0 }),
//!     Instruction::Dup,
//!     Instruction::IAdd,
//!     Instruction::IReturn,
//! ];
//! method.code = Some(code);
//!
//! let analysis = analyze(&class, &method, &ClassHierarchy::new())?;
//! assert_eq!(analysis.max_stack, 2);
//! assert_eq!(analysis.max_locals, 1);
//! assert_eq!(analysis.frames[2].as_ref().map(|frame| frame.stack.clone()), Some(vec![Value::Integer, Value::Integer]));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace};
use crate::error::AnalysisError;
use crate::hierarchy::ClassHierarchy;
use crate::tree::class::{ClassFile, ClassName};
use crate::tree::method::code::{Code, Instruction};
use crate::tree::method::Method;

pub mod frame;
pub(crate) mod interpreter;

use frame::{Frame, InitState, Value};
use interpreter::Interpreter;

/// The result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
	/// The frame before each instruction, [`None`] for instructions that can't be reached.
	pub frames: Vec<Option<Frame>>,
	/// The largest operand stack, in words.
	pub max_stack: u16,
	/// The number of local variable slots used, including the parameters.
	pub max_locals: u16,
}

impl Analysis {
	pub fn is_reachable(&self, index: usize) -> bool {
		self.frames.get(index).is_some_and(Option::is_some)
	}
}

/// An exception table entry with the labels resolved.
#[derive(Debug)]
struct Handler {
	start: usize,
	end: usize,
	handler: usize,
	catch: Value,
}

impl Handler {
	fn covers(&self, index: usize) -> bool {
		self.start <= index && index < self.end
	}
}

fn handlers(code: &Code) -> Result<Vec<Handler>> {
	code.exception_table.iter()
		.map(|exception| -> Result<Handler> { Ok(Handler {
			start: code.resolve(exception.start)?,
			end: code.resolve(exception.end)?,
			handler: code.resolve(exception.handler)?,
			catch: Value::Object(exception.catch.clone().unwrap_or_else(ClassName::java_lang_throwable)),
		}) })
		.collect()
}

/// The instructions execution may continue with after the one at `index`, not counting exception handlers.
pub(crate) fn successors(code: &Code, index: usize) -> Result<Vec<usize>> {
	let instruction = &code.instructions[index];
	let mut successors = Vec::new();
	if instruction.falls_through() {
		successors.push(index + 1);
	}
	for target in instruction.targets() {
		let target = code.resolve(target)?;
		if !successors.contains(&target) {
			successors.push(target);
		}
	}
	if successors.iter().any(|&successor| successor >= code.instructions.len()) {
		bail!(AnalysisError::FallsOffEnd);
	}
	Ok(successors)
}

/// The number of local variable slots the instructions and parameters of a method need.
fn compute_max_locals(method: &Method, code: &Code) -> Result<u16> {
	let parameters: u16 = method.descriptor.parse()?.parameter_descriptors.iter().map(|t| t.size()).sum();
	let mut max_locals = parameters + u16::from(!method.access.is_static);
	for instruction in &code.instructions {
		let (lv, size) = match instruction {
			Instruction::ILoad(lv) | Instruction::FLoad(lv) | Instruction::ALoad(lv) |
			Instruction::IStore(lv) | Instruction::FStore(lv) | Instruction::AStore(lv) |
			Instruction::IInc(lv, _) | Instruction::Ret(lv) => (lv, 1),
			Instruction::LLoad(lv) | Instruction::DLoad(lv) | Instruction::LStore(lv) | Instruction::DStore(lv) => (lv, 2),
			_ => continue,
		};
		max_locals = max_locals.max(lv.index.saturating_add(size));
	}
	Ok(max_locals)
}

fn merge_into(
	frames: &mut [Option<Frame>],
	worklist: &mut VecDeque<usize>,
	queued: &mut [bool],
	index: usize,
	frame: &Frame,
	hierarchy: &ClassHierarchy,
) -> Result<()> {
	let changed = match &mut frames[index] {
		Some(existing) => existing.merge_from(frame, index, hierarchy)?,
		slot @ None => {
			*slot = Some(frame.clone());
			true
		},
	};
	if changed && !queued[index] {
		queued[index] = true;
		worklist.push_back(index);
	}
	Ok(())
}

/// Computes the frames of the code of a method by iterating to a fixed point.
///
/// Fails with [`AnalysisError::UnsupportedConstruct`] if the code contains subroutines. The hierarchy is used
/// to merge object types.
pub fn analyze(class: &ClassFile, method: &Method, hierarchy: &ClassHierarchy) -> Result<Analysis> {
	let code = method.code.as_ref()
		.ok_or_else(|| anyhow!("method {:?} {:?} has no code", method.name, method.descriptor))?;

	if let Some(index) = code.instructions.iter().position(|i| matches!(i, Instruction::Jsr(_) | Instruction::Ret(_))) {
		bail!(AnalysisError::UnsupportedConstruct { index });
	}
	if code.instructions.is_empty() {
		bail!(AnalysisError::FallsOffEnd);
	}

	let handlers = handlers(code)?;
	let interpreter = Interpreter {
		this_class: &class.name,
		instructions: &code.instructions,
	};

	let descriptor = method.descriptor.parse()?;
	let is_constructor = method.is_constructor() && !method.access.is_static;
	let entry = Frame {
		locals: interpreter::entry_locals(&class.name, method.access.is_static, is_constructor, &descriptor.parameter_descriptors),
		stack: Vec::new(),
		init: if is_constructor { InitState::NotInitialized } else { InitState::Initialized },
	};

	let len = code.instructions.len();
	let mut frames: Vec<Option<Frame>> = vec![None; len];
	let mut queued = vec![false; len];
	let mut worklist = VecDeque::new();
	let mut max_stack = 0;
	merge_into(&mut frames, &mut worklist, &mut queued, 0, &entry, hierarchy)?;

	while let Some(index) = worklist.pop_front() {
		queued[index] = false;
		let Some(before) = frames[index].clone() else {
			continue;
		};
		let instruction = &code.instructions[index];

		let mut after = before.clone();
		interpreter.execute(index, instruction, &mut after)?;
		trace!("{index}: {instruction:?} {:?} -> {:?}", before.stack, after.stack);
		max_stack = max_stack.max(before.stack_size()).max(after.stack_size());

		for successor in successors(code, index)? {
			merge_into(&mut frames, &mut worklist, &mut queued, successor, &after, hierarchy)?;
		}

		for handler in handlers.iter().filter(|handler| handler.covers(index)) {
			let frame = Frame {
				locals: before.locals.clone(),
				stack: vec![handler.catch.clone()],
				init: before.init,
			};
			max_stack = max_stack.max(1);
			merge_into(&mut frames, &mut worklist, &mut queued, handler.handler, &frame, hierarchy)?;
		}
	}

	let max_locals = compute_max_locals(method, code)
		.with_context(|| anyhow!("failed to compute max_locals of {:?} {:?}", method.name, method.descriptor))?;
	debug!("analyzed {:?} {:?}: {} of {len} instructions reachable, max_stack {max_stack}, max_locals {max_locals}",
		method.name, method.descriptor, frames.iter().filter(|frame| frame.is_some()).count());

	Ok(Analysis { frames, max_stack, max_locals })
}
