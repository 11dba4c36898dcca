//! Inserting advice at the entry and at the exits of a method.
//!
//! For a constructor the entry is where execution continues after `this` got initialized by a call to another
//! constructor, so the advice never sees an uninitialized `this`. Calls initializing other objects, created by
//! `new`, are ignored. Following `goto`s from the call, several calls may reach the same instruction, and the advice
//! is then inserted only once, before that instruction.
//!
//! The exit advice goes before every return. Exceptions leaving the method once `this` is initialized are caught by
//! a handler covering all of that code, which runs the exit advice and throws them again.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use crate::analysis::analyze;
use crate::analysis::frame::{Frame, InitState, Value};
use crate::error::WeaveError;
use crate::hierarchy::ClassHierarchy;
use crate::tree::class::ClassFile;
use crate::tree::method::code::{Code, Exception, Instruction, Label};
use crate::tree::method::{Method, MethodRef};

/// The result of [`weave`].
#[derive(Debug, Clone, PartialEq)]
pub struct Woven {
	/// The method with the advice inserted. Its frames and maximum values are unset.
	pub method: Method,
	/// The instruction indices the copies of the enter advice start at, in ascending order.
	pub enter_points: Vec<usize>,
	/// The instruction indices the copies of the exit advice before returns start at, in ascending order.
	pub exit_points: Vec<usize>,
	/// The instruction index of the handler running the exit advice for exceptions, at the end of the code.
	///
	/// This is [`None`] if no instruction besides the returns runs with `this` initialized.
	pub exception_exit: Option<usize>,
}

/// Advice must run straight through.
fn check_advice(advice: &[Instruction]) -> Result<()> {
	for (index, instruction) in advice.iter().enumerate() {
		if !instruction.targets().is_empty() || !instruction.falls_through() {
			bail!(WeaveError::InvalidAdvice { index });
		}
	}
	Ok(())
}

/// Whether the call is on the `this` under construction.
fn initializes_this(frame: &Frame, target: &MethodRef) -> Result<bool> {
	let arguments = target.desc.parse()?.parameter_descriptors.len();
	let receiver = frame.stack.len()
		.checked_sub(arguments + 1)
		.and_then(|index| frame.stack.get(index));
	Ok(receiver == Some(&Value::UninitializedThis))
}

/// Follows the `goto`s starting at `index`. Returns the instruction reached, and `index` if it holds a `goto`.
///
/// Only that first `goto` belongs to the path from the call alone, the ones after it may be shared with other paths,
/// like the head of a loop.
fn skip_gotos(code: &Code, start: usize) -> Result<(usize, Option<usize>)> {
	let mut index = start;
	let mut seen = HashSet::new();
	while let Some(Instruction::Goto(target)) = code.instructions.get(index) {
		if !seen.insert(index) {
			break;
		}
		index = code.resolve(*target)?;
	}
	let first = (index != start).then_some(start);
	Ok((index, first))
}

/// What to insert before one instruction.
struct Insertion {
	at: usize,
	/// The label for the start of the enter advice, and the labels to move after it.
	enter: Option<(Label, Vec<Label>)>,
	/// The label for the start of the exit advice.
	exit: Option<Label>,
}

/// Inserts `on_enter` at the entry of the method and `on_exit` before its exits.
///
/// The advice may not contain jumps, returns or `athrow`, otherwise this fails with [`WeaveError::InvalidAdvice`].
/// Only jumps coming from the entry reach the enter advice, jumps to the same instruction from elsewhere (like the
/// back edge of a loop) go past it. Every jump to a return goes through the exit advice.
///
/// The handler for exceptions is registered last, so the handlers of the method itself still come first. Neither
/// copy of the advice is covered by it.
pub fn weave(
	class: &ClassFile,
	method: &Method,
	on_enter: &[Instruction],
	on_exit: &[Instruction],
	hierarchy: &ClassHierarchy,
) -> Result<Woven> {
	check_advice(on_enter).context("invalid enter advice")?;
	check_advice(on_exit).context("invalid exit advice")?;

	let Some(code) = &method.code else {
		bail!(WeaveError::InvalidAdviceTarget);
	};
	let analysis = analyze(class, method, hierarchy)
		.with_context(|| anyhow!("failed to analyze {:?} {:?} for weaving", method.name, method.descriptor))?;

	let is_constructor = method.is_constructor() && !method.access.is_static;

	// From an instruction to the `goto`s arriving there right after `this` got initialized.
	let mut enters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
	let mut exits = BTreeSet::new();
	for (index, (instruction, frame)) in code.instructions.iter().zip(&analysis.frames).enumerate() {
		let Some(frame) = frame else {
			continue;
		};
		match instruction {
			Instruction::InvokeSpecial(target, _) if is_constructor && target.name.is_init() => {
				if initializes_this(frame, target)? {
					let (at, via) = skip_gotos(code, index + 1)?;
					enters.entry(at).or_default().extend(via);
				}
			},
			instruction if instruction.is_return() => {
				if frame.init != InitState::Initialized {
					bail!(WeaveError::AmbiguousReturn { index });
				}
				exits.insert(index);
			},
			_ => {},
		}
	}
	if !is_constructor {
		enters.insert(0, Vec::new());
	}
	if enters.is_empty() {
		bail!(WeaveError::InvalidAdviceTarget);
	}

	let mut woven = method.clone();
	let code = woven.code.as_mut()
		.ok_or(WeaveError::InvalidAdviceTarget)?;

	// The runs of instructions with `this` initialized, split at the enter points so that the advice isn't covered.
	let covered: Vec<bool> = code.instructions.iter().zip(&analysis.frames)
		.map(|(instruction, frame)| {
			frame.as_ref().is_some_and(|frame| frame.init == InitState::Initialized) && !instruction.is_return()
		})
		.collect();
	let len = code.instructions.len();
	let handler = code.label_at(len);
	let mut ranges = 0;
	let mut index = 0;
	while index < len {
		if !covered[index] {
			index += 1;
			continue;
		}
		let start = index;
		index += 1;
		while index < len && covered[index] && !enters.contains_key(&index) {
			index += 1;
		}
		let start = code.label_at(start);
		let end = code.label_at(index);
		code.exception_table.push(Exception { start, end, handler, catch: None });
		ranges += 1;
	}

	// Labels first, while the indices still match the analysis.
	let positions: BTreeSet<usize> = enters.keys().chain(&exits).copied().collect();
	let mut insertions = Vec::with_capacity(positions.len());
	for at in positions {
		let enter = match enters.get(&at) {
			Some(arriving) => {
				let moved: Vec<Label> = code.labels.iter()
					.filter(|&(_, position)| position == Some(at))
					.map(|(label, _)| label)
					.collect();

				// Ranges ending here keep ending before the advice.
				let stay = code.label_at(at);
				for exception in &mut code.exception_table {
					if moved.contains(&exception.end) {
						exception.end = stay;
					}
				}
				for lv in code.local_variables.iter_mut().flatten() {
					if moved.contains(&lv.end) {
						lv.end = stay;
					}
				}

				let entry = code.label_at(at);
				for &index in arriving {
					code.instructions[index] = Instruction::Goto(entry);
				}
				Some((entry, moved))
			},
			None => None,
		};
		let exit = if exits.contains(&at) { Some(code.label_at(at)) } else { None };
		insertions.push(Insertion { at, enter, exit });
	}

	// Back to front, so the indices of the insertions not done yet stay valid.
	for insertion in insertions.iter().rev() {
		let mut advice = Vec::with_capacity(on_enter.len() + on_exit.len());
		if insertion.enter.is_some() {
			advice.extend_from_slice(on_enter);
		}
		if insertion.exit.is_some() {
			advice.extend_from_slice(on_exit);
		}
		code.insert(insertion.at, advice);

		if let Some((_, moved)) = &insertion.enter {
			let after = insertion.at + on_enter.len();
			for &label in moved {
				code.labels.bind(label, after)?;
			}
			if let Some(exit) = insertion.exit {
				code.labels.bind(exit, after)?;
			}
		}
	}

	let exception_exit = if ranges > 0 {
		code.insert(code.instructions.len(), on_exit.iter().cloned().chain([Instruction::AThrow]));
		Some(code.resolve(handler)?)
	} else {
		None
	};

	let mut enter_points = Vec::new();
	let mut exit_points = Vec::new();
	for insertion in &insertions {
		if let Some((entry, _)) = insertion.enter {
			enter_points.push(code.resolve(entry)?);
		}
		if let Some(exit) = insertion.exit {
			exit_points.push(code.resolve(exit)?);
		}
	}
	code.invalidate_computed();

	debug!("wove {} enter and {} exit points into {:?} {:?} of {:?}, with {ranges} ranges for the exception handler",
		enter_points.len(), exit_points.len(), method.name, method.descriptor, class.name);

	Ok(Woven { method: woven, enter_points, exit_points, exception_exit })
}
