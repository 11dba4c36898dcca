//! Regenerating the `StackMapTable` of a method from the frame analysis.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use crate::analysis::frame::{Frame, InitState, Value};
use crate::analysis::{analyze, interpreter};
use crate::hierarchy::ClassHierarchy;
use crate::tree::class::{ClassFile, ClassName};
use crate::tree::method::Method;
use crate::tree::method::code::{Code, Exception, Instruction, Label};
use crate::tree::method::frame::{StackMapData, VerificationTypeInfo};

/// Creates at most one new label per instruction index.
struct LabelCache<'a> {
	code: &'a mut Code,
	labels: HashMap<usize, Label>,
}

impl LabelCache<'_> {
	fn at(&mut self, index: usize) -> Label {
		if let Some(&label) = self.labels.get(&index) {
			return label;
		}
		let label = self.code.labels.create_at(index);
		self.labels.insert(index, label);
		label
	}
}

/// Converts the locals of a frame to the form used in stack map frames: a wide value is a single entry, and
/// unset locals at the end are left out.
fn compact_locals(locals: &[Value], cache: &mut LabelCache) -> Vec<VerificationTypeInfo> {
	let mut compact = Vec::with_capacity(locals.len());
	let mut i = 0;
	while i < locals.len() {
		compact.push(verification_type(&locals[i], cache));
		i += locals[i].size() as usize;
	}
	while compact.last() == Some(&VerificationTypeInfo::Top) {
		compact.pop();
	}
	compact
}

fn verification_type(value: &Value, cache: &mut LabelCache) -> VerificationTypeInfo {
	match value {
		Value::Top => VerificationTypeInfo::Top,
		Value::Integer => VerificationTypeInfo::Integer,
		Value::Float => VerificationTypeInfo::Float,
		Value::Long => VerificationTypeInfo::Long,
		Value::Double => VerificationTypeInfo::Double,
		Value::Null => VerificationTypeInfo::Null,
		Value::UninitializedThis => VerificationTypeInfo::UninitializedThis,
		Value::Uninitialized(index) => VerificationTypeInfo::Uninitialized(cache.at(*index)),
		Value::Object(class) => VerificationTypeInfo::Object(class.clone()),
	}
}

/// Picks the shortest encoding of a frame, given the locals of the frame before it.
fn compress(previous: &[VerificationTypeInfo], locals: Vec<VerificationTypeInfo>, mut stack: Vec<VerificationTypeInfo>) -> StackMapData {
	if locals == previous {
		match stack.len() {
			0 => return StackMapData::Same,
			1 => if let Some(stack) = stack.pop() {
				return StackMapData::SameLocals1StackItem { stack };
			},
			_ => {},
		}
	} else if stack.is_empty() {
		if locals.len() < previous.len() && previous.len() - locals.len() <= 3 && previous.starts_with(&locals) {
			return StackMapData::Chop { k: (previous.len() - locals.len()) as u8 };
		}
		if locals.len() > previous.len() && locals.len() - previous.len() <= 3 && locals.starts_with(previous) {
			return StackMapData::Append { locals: locals[previous.len()..].to_vec() };
		}
	}
	StackMapData::Full { locals, stack }
}

/// Splits the exception ranges so that they only cover reachable instructions. Ranges that become empty are
/// dropped.
fn reachable_ranges(cache: &mut LabelCache, reachable: &[bool]) -> Result<Vec<Exception>> {
	let exceptions = std::mem::take(&mut cache.code.exception_table);
	let mut split = Vec::with_capacity(exceptions.len());
	for exception in exceptions {
		let start = cache.code.resolve(exception.start)?;
		let end = cache.code.resolve(exception.end)?;

		let mut i = start;
		while i < end {
			if !reachable[i] {
				i += 1;
				continue;
			}
			let run_start = i;
			while i < end && reachable[i] {
				i += 1;
			}
			let (start, end) = if run_start == start && i == end {
				(exception.start, exception.end)
			} else {
				(cache.at(run_start), cache.at(i))
			};
			split.push(Exception { start, end, handler: exception.handler, catch: exception.catch.clone() });
		}
	}
	Ok(split)
}

/// Runs the frame analysis and returns the code with its frames, `max_stack` and `max_locals` filled in.
///
/// Unreachable instructions are replaced by `nop`s followed by an `athrow`, with a frame holding just a
/// `java/lang/Throwable` on the stack, since the verifier checks them even though they never run.
pub(crate) fn compute_frames(class: &ClassFile, method: &Method, hierarchy: &ClassHierarchy) -> Result<Code> {
	let mut code = method.code.clone()
		.ok_or_else(|| anyhow!("method {:?} {:?} has no code", method.name, method.descriptor))?;

	let analysis = analyze(class, method, hierarchy)
		.with_context(|| anyhow!("failed to analyze {:?} {:?} for computing frames", method.name, method.descriptor))?;
	let mut frames = analysis.frames;
	let mut max_stack = analysis.max_stack;

	let len = code.instructions.len();
	let reachable: Vec<bool> = frames.iter().map(Option::is_some).collect();

	let mut needs_frame = BTreeSet::new();
	for (index, instruction) in code.instructions.iter().enumerate() {
		if !reachable[index] {
			continue;
		}
		for target in instruction.targets() {
			needs_frame.insert(code.resolve(target)?);
		}
		if !instruction.falls_through() && index + 1 < len {
			needs_frame.insert(index + 1);
		}
	}

	// Replace the unreachable runs.
	let mut index = 0;
	let mut replaced = 0;
	while index < len {
		if reachable[index] {
			index += 1;
			continue;
		}
		let start = index;
		while index < len && !reachable[index] {
			code.instructions[index] = Instruction::Nop;
			index += 1;
		}
		code.instructions[index - 1] = Instruction::AThrow;
		frames[start] = Some(Frame {
			locals: Vec::new(),
			stack: vec![Value::Object(ClassName::java_lang_throwable())],
			init: InitState::Initialized,
		});
		needs_frame.insert(start);
		max_stack = max_stack.max(1);
		replaced += index - start;
	}
	if replaced > 0 {
		debug!("replaced {replaced} unreachable instructions of {:?} {:?}", method.name, method.descriptor);
	}

	let mut cache = LabelCache { code: &mut code, labels: HashMap::new() };

	let exception_table = reachable_ranges(&mut cache, &reachable)?;
	for exception in &exception_table {
		needs_frame.insert(cache.code.resolve(exception.handler)?);
	}

	let mut previous = entry_frame_locals(class, method, &mut cache)?;

	let mut stack_map = Vec::with_capacity(needs_frame.len());
	for index in needs_frame {
		let Some(frame) = frames.get(index).and_then(Option::as_ref) else {
			continue;
		};
		let locals = compact_locals(&frame.locals, &mut cache);
		let stack = frame.stack.iter().map(|value| verification_type(value, &mut cache)).collect();
		let data = compress(&previous, locals.clone(), stack);
		let label = cache.at(index);
		stack_map.push((label, data));
		previous = locals;
	}

	code.exception_table = exception_table;
	// Straight line code doesn't get a `StackMapTable` attribute at all.
	code.frames = if stack_map.is_empty() { None } else { Some(stack_map) };
	code.max_stack = Some(max_stack);
	code.max_locals = Some(analysis.max_locals);
	Ok(code)
}

/// The locals of the frame a method starts with, in the form used in stack map frames.
fn entry_frame_locals(class: &ClassFile, method: &Method, cache: &mut LabelCache) -> Result<Vec<VerificationTypeInfo>> {
	let descriptor = method.descriptor.parse()?;
	let is_constructor = method.is_constructor() && !method.access.is_static;
	let entry = interpreter::entry_locals(&class.name, method.access.is_static, is_constructor, &descriptor.parameter_descriptors);
	Ok(compact_locals(&entry, cache))
}

/// Adds frames at the instructions given to the frames the code already has, taking them from the frame analysis.
///
/// The existing frames are kept as they are, only their compression may change.
pub(crate) fn add_frames(class: &ClassFile, method: &Method, code: &Code, indices: &BTreeSet<usize>, hierarchy: &ClassHierarchy) -> Result<Code> {
	let analyzed = Method { code: Some(code.clone()), ..method.clone() };
	let analysis = analyze(class, &analyzed, hierarchy)
		.with_context(|| anyhow!("failed to analyze {:?} {:?} for adding frames", method.name, method.descriptor))?;

	let mut code = code.clone();
	let stack_map = code.frames.take().unwrap_or_default();
	let mut cache = LabelCache { code: &mut code, labels: HashMap::new() };
	let entry = entry_frame_locals(class, method, &mut cache)?;

	let mut full = BTreeMap::new();
	let mut locals = entry.clone();
	for (label, data) in stack_map {
		let index = cache.code.resolve(label)?;
		let stack = match data {
			StackMapData::Same => Vec::new(),
			StackMapData::SameLocals1StackItem { stack } => vec![stack],
			StackMapData::Chop { k } => {
				let Some(len) = locals.len().checked_sub(k as usize) else {
					bail!("`chop_frame` at instruction {index} removes {k} locals, but there are only {}", locals.len());
				};
				locals.truncate(len);
				Vec::new()
			},
			StackMapData::Append { locals: appended } => {
				locals.extend(appended);
				Vec::new()
			},
			StackMapData::Full { locals: replaced, stack } => {
				locals = replaced;
				stack
			},
		};
		full.insert(index, (label, locals.clone(), stack));
	}

	for &index in indices {
		if full.contains_key(&index) {
			continue;
		}
		let frame = analysis.frames.get(index).and_then(Option::as_ref)
			.with_context(|| anyhow!("instruction {index} is unreachable, it can't get a frame"))?;
		let locals = compact_locals(&frame.locals, &mut cache);
		let stack = frame.stack.iter().map(|value| verification_type(value, &mut cache)).collect();
		full.insert(index, (cache.at(index), locals, stack));
	}

	let mut previous = entry;
	let mut frames = Vec::with_capacity(full.len());
	for (label, locals, stack) in full.into_values() {
		frames.push((label, compress(&previous, locals.clone(), stack)));
		previous = locals;
	}
	code.frames = Some(frames);
	Ok(code)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use std::collections::BTreeSet;
	use crate::class_writer::frames::{add_frames, compress, compute_frames};
	use crate::hierarchy::ClassHierarchy;
	use crate::tree::class::{ClassAccess, ClassFile, ClassName};
	use crate::tree::method::code::{Code, Exception, Instruction, LvIndex};
	use crate::tree::method::frame::{StackMapData, VerificationTypeInfo as V};
	use crate::tree::method::{Method, MethodAccess};
	use crate::tree::version::Version;

	fn class() -> Result<ClassFile> {
		Ok(ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new()))
	}

	#[test]
	fn compression() {
		assert_eq!(compress(&[V::Integer], vec![V::Integer], vec![]), StackMapData::Same);
		assert_eq!(compress(&[V::Integer], vec![V::Integer], vec![V::Float]), StackMapData::SameLocals1StackItem { stack: V::Float });
		assert_eq!(compress(&[V::Integer, V::Long, V::Float], vec![V::Integer], vec![]), StackMapData::Chop { k: 2 });
		assert_eq!(compress(&[V::Integer], vec![V::Integer, V::Double], vec![]), StackMapData::Append { locals: vec![V::Double] });
		assert_eq!(
			compress(&[V::Integer], vec![V::Float], vec![]),
			StackMapData::Full { locals: vec![V::Float], stack: vec![] }
		);
		assert_eq!(
			compress(&[], vec![V::Integer], vec![V::Integer]),
			StackMapData::Full { locals: vec![V::Integer], stack: vec![V::Integer] }
		);
	}

	#[test]
	fn frames_at_join_points() -> Result<()> {
		// static int f(int x) { int y; if (x == 0) y = 1; else y = 2; return y; }
		let mut method = Method::new(MethodAccess::from(0x0008), "f".try_into()?, "(I)I".try_into()?);
		let mut code = Code::new();
		let else_branch = code.labels.create();
		let join = code.labels.create();
		code.instructions = vec![
			Instruction::ILoad(LvIndex { index: 0 }),
			Instruction::IfNe(else_branch),
			Instruction::IConst1,
			Instruction::IStore(LvIndex { index: 1 }),
			Instruction::Goto(join),
			Instruction::IConst2,
			Instruction::IStore(LvIndex { index: 1 }),
			Instruction::ILoad(LvIndex { index: 1 }),
			Instruction::IReturn,
		];
		code.labels.bind(else_branch, 5)?;
		code.labels.bind(join, 7)?;
		method.code = Some(code);

		let code = compute_frames(&class()?, &method, &ClassHierarchy::new())?;
		let frames = code.frames.clone().unwrap_or_default();
		let at: Vec<_> = frames.iter().map(|(label, _)| code.resolve(*label)).collect::<Result<_>>()?;
		assert_eq!(at, vec![5, 7]);
		assert_eq!(frames[0].1, StackMapData::Same);
		assert_eq!(frames[1].1, StackMapData::Append { locals: vec![V::Integer] });
		assert_eq!(code.max_stack, Some(1));
		assert_eq!(code.max_locals, Some(2));
		Ok(())
	}

	#[test]
	fn added_frames_keep_the_others() -> Result<()> {
		// static int f(int x) { int y = 0; if (x == 0) y = 1; return y; }
		let mut method = Method::new(MethodAccess::from(0x0008), "f".try_into()?, "(I)I".try_into()?);
		let mut code = Code::new();
		let join = code.labels.create();
		code.instructions = vec![
			Instruction::IConst0,
			Instruction::IStore(LvIndex { index: 1 }),
			Instruction::ILoad(LvIndex { index: 0 }),
			Instruction::IfNe(join),
			Instruction::IConst1,
			Instruction::IStore(LvIndex { index: 1 }),
			Instruction::ILoad(LvIndex { index: 1 }),
			Instruction::IReturn,
		];
		code.labels.bind(join, 6)?;
		code.frames = Some(vec![(join, StackMapData::Append { locals: vec![V::Integer] })]);
		method.code = Some(code);
		let code = method.code.clone().unwrap_or_default();

		let code = add_frames(&class()?, &method, &code, &BTreeSet::from([4]), &ClassHierarchy::new())?;
		let frames = code.frames.clone().unwrap_or_default();
		let at: Vec<_> = frames.iter().map(|(label, _)| code.resolve(*label)).collect::<Result<_>>()?;
		assert_eq!(at, vec![4, 6]);
		assert_eq!(frames[0].1, StackMapData::Append { locals: vec![V::Integer] });
		assert_eq!(frames[1].1, StackMapData::Same);
		assert_eq!(code.resolve(frames[1].0)?, code.resolve(join)?);

		// unreachable instructions can't get one
		let mut dead = code.clone();
		dead.instructions[5] = Instruction::Goto(join);
		dead.instructions.insert(6, Instruction::Nop);
		dead.labels.bind(join, 7)?;
		assert!(add_frames(&class()?, &method, &dead, &BTreeSet::from([6]), &ClassHierarchy::new()).is_err());
		Ok(())
	}

	#[test]
	fn unreachable_code_is_replaced() -> Result<()> {
		let mut method = Method::new(MethodAccess::from(0x0008), "f".try_into()?, "()V".try_into()?);
		let mut code = Code::new();
		code.instructions = vec![
			Instruction::Return,
			Instruction::IConst0,
			Instruction::Pop,
			Instruction::Return,
		];
		let start = code.label_at(1);
		let end = code.label_at(3);
		let handler = code.label_at(3);
		code.exception_table.push(Exception { start, end, handler, catch: None });
		method.code = Some(code);

		let code = compute_frames(&class()?, &method, &ClassHierarchy::new())?;
		assert_eq!(code.instructions, vec![Instruction::Return, Instruction::Nop, Instruction::Nop, Instruction::AThrow]);
		let frames = code.frames.clone().unwrap_or_default();
		assert_eq!(frames.len(), 1);
		assert_eq!(code.resolve(frames[0].0)?, 1);
		assert_eq!(frames[0].1, StackMapData::SameLocals1StackItem { stack: V::Object(ClassName::java_lang_throwable()) });
		assert_eq!(code.max_stack, Some(1));

		// the range only covered dead code
		assert!(code.exception_table.is_empty());
		Ok(())
	}
}
