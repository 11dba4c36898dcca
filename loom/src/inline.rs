//! Removing `jsr` and `ret` by copying each subroutine into every place it's called from.
//!
//! The main body and every subroutine are found by following the control flow from their first instruction,
//! where a `jsr` continues with the instruction after it and a `ret` ends the path. Exception handlers whose range
//! covers an instruction of a body belong to that body as well.
//!
//! The new code starts with a copy of the main body, followed by one copy of a subroutine for every `jsr` in every
//! copy made so far. Each `jsr` becomes a `goto` to the copy made for it, and each `ret` becomes a `goto` to the
//! instruction after the `jsr` the copy was made for. A subroutine starting with `astore` or `pop` gets that
//! instruction replaced by a `nop`, since no return address is pushed anymore. Other subroutines get an
//! `aconst_null` in front to stand in for it.
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use loom::inline::inline;
//! use loom::tree::method::code::{Code, Instruction, LvIndex};
//!
//! let mut code = Code::new();
//! let subroutine = code.label_at(2);
//! code.instructions = vec![
//!     Instruction::Jsr(subroutine),
//!     Instruction::Return,
//!     Instruction::AStore(LvIndex { index: 0 }),
//!     Instruction::Ret(LvIndex { index: 0 }),
//! ];
//!
//! let inlined = inline(&code)?;
//! assert!(!inlined.has_subroutines());
//! assert_eq!(inlined.instructions.len(), 4);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use crate::error::InlineError;
use crate::tree::method::Method;
use crate::tree::method::code::{Code, Exception, Instruction, Label, Labels, Lv};

/// The instructions of the main body or of one subroutine.
#[derive(Debug)]
struct Body {
	/// The first instruction, `0` for the main body.
	entry: usize,
	members: BTreeSet<usize>,
	node: NodeIndex,
}

/// One copy of a [`Body`] in the new code.
#[derive(Debug)]
struct Instance {
	body: usize,
	/// The instance and the instruction index of the `jsr` this copy was made for.
	caller: Option<(usize, usize)>,
	/// From an instruction index of the original code to the index of its copy.
	positions: HashMap<usize, usize>,
	/// Where the `jsr` calling this copy jumps to.
	call_entry: usize,
	/// Whether the copy starts with an `aconst_null`.
	pushes_return_address: bool,
}

impl Instance {
	fn position(&self, index: usize) -> Result<usize> {
		self.positions.get(&index)
			.copied()
			.with_context(|| anyhow!("instruction {index} isn't part of the copy of this body"))
	}
}

/// Creates at most one label per position of the new code.
#[derive(Debug, Default)]
struct LabelCache {
	labels: Labels,
	cache: HashMap<usize, Label>,
}

impl LabelCache {
	fn at(&mut self, position: usize) -> Label {
		if let Some(&label) = self.cache.get(&position) {
			return label;
		}
		let label = self.labels.create_at(position);
		self.cache.insert(position, label);
		label
	}
}

/// Collects the instructions reachable from `entry` without passing through a `ret`.
fn mark(code: &Code, entry: usize) -> Result<BTreeSet<usize>> {
	let len = code.instructions.len();
	let mut members = BTreeSet::new();
	let mut queue = vec![entry];

	loop {
		while let Some(index) = queue.pop() {
			if !members.insert(index) {
				continue;
			}
			let Some(instruction) = code.instructions.get(index) else {
				bail!("control flow reaches the end of the code at instruction {index}");
			};
			if matches!(instruction, Instruction::Ret(_)) {
				continue;
			}
			if !matches!(instruction, Instruction::Jsr(_)) {
				for target in instruction.targets() {
					queue.push(code.resolve(target)?);
				}
			}
			if instruction.falls_through() {
				if index + 1 >= len {
					bail!("execution falls off the end of the code after instruction {index}");
				}
				queue.push(index + 1);
			}
		}

		for exception in &code.exception_table {
			let start = code.resolve(exception.start)?;
			let end = code.resolve(exception.end)?;
			let handler = code.resolve(exception.handler)?;
			if start < end && !members.contains(&handler) && members.range(start..end).next().is_some() {
				queue.push(handler);
			}
		}
		if queue.is_empty() {
			return Ok(members);
		}
	}
}

/// Returns the code with all subroutines inlined.
///
/// The frames and maximum values of the result are unset. Exception ranges, line numbers and local variables are
/// copied along with the instructions they refer to. Instructions not reachable from the start are left out.
pub fn inline(code: &Code) -> Result<Code> {
	if !code.has_subroutines() {
		return Ok(code.clone());
	}

	let mut graph: DiGraph<usize, ()> = DiGraph::new();
	let mut bodies: Vec<Body> = Vec::new();
	let mut by_entry: HashMap<usize, usize> = HashMap::from([(0, 0)]);
	let mut pending = VecDeque::from([0]);
	while let Some(entry) = pending.pop_front() {
		let members = mark(code, entry)?;
		for &index in &members {
			if let Instruction::Jsr(target) = &code.instructions[index] {
				let target = code.resolve(*target)?;
				if !by_entry.contains_key(&target) {
					by_entry.insert(target, by_entry.len());
					pending.push_back(target);
				}
			}
		}
		let node = graph.add_node(entry);
		bodies.push(Body { entry, members, node });
	}

	let callee_of = |label: Label| -> Result<usize> {
		let target = code.resolve(label)?;
		by_entry.get(&target)
			.copied()
			.with_context(|| anyhow!("no subroutine starts at instruction {target}"))
	};

	for body in &bodies {
		for &index in &body.members {
			if let Instruction::Jsr(target) = &code.instructions[index] {
				let callee = &bodies[callee_of(*target)?];
				graph.update_edge(body.node, callee.node, ());
			}
		}
	}
	if let Err(cycle) = toposort(&graph, None) {
		bail!(InlineError::NonReturningCycle { index: graph[cycle.node_id()] });
	}

	if let Some(&index) = bodies[0].members.iter().find(|&&index| matches!(code.instructions[index], Instruction::Ret(_))) {
		bail!(InlineError::RetOutsideSubroutine { index });
	}

	// Lay out the copies, the call graph being acyclic makes this terminate.
	let mut instances: Vec<Instance> = Vec::new();
	let mut callees: HashMap<(usize, usize), usize> = HashMap::new();
	let mut queue = VecDeque::from([(0, None)]);
	let mut len = 0;
	while let Some((body_index, caller)) = queue.pop_front() {
		let id = instances.len();
		let body = &bodies[body_index];

		let pushes_return_address = caller.is_some()
			&& !matches!(code.instructions[body.entry], Instruction::AStore(_) | Instruction::Pop);
		let start = len;
		if pushes_return_address {
			len += 1;
		}
		let mut positions = HashMap::with_capacity(body.members.len());
		for &index in &body.members {
			positions.insert(index, len);
			len += 1;

			if let Instruction::Jsr(target) = &code.instructions[index] {
				callees.insert((id, index), id + 1 + queue.len());
				queue.push_back((callee_of(*target)?, Some((id, index))));
			}
		}
		let call_entry = if pushes_return_address { start } else { positions.get(&body.entry).copied().unwrap_or(start) };

		trace!("copy {id} of the body at {} placed at {start}", body.entry);
		instances.push(Instance { body: body_index, caller, positions, call_entry, pushes_return_address });
	}

	let mut labels = LabelCache::default();
	let mut instructions = Vec::with_capacity(len);
	for (id, instance) in instances.iter().enumerate() {
		let body = &bodies[instance.body];
		if instance.pushes_return_address {
			instructions.push(Instruction::AConstNull);
		}
		for &index in &body.members {
			let instruction = match &code.instructions[index] {
				Instruction::Jsr(_) => {
					let callee = callees.get(&(id, index))
						.with_context(|| anyhow!("no copy was made for the `jsr` at {index}"))?;
					Instruction::Goto(labels.at(instances[*callee].call_entry))
				},
				Instruction::Ret(_) => {
					let (caller, call) = instance.caller.ok_or(InlineError::RetOutsideSubroutine { index })?;
					Instruction::Goto(labels.at(instances[caller].position(call + 1)?))
				},
				Instruction::AStore(_) | Instruction::Pop if instance.caller.is_some() && index == body.entry => Instruction::Nop,
				instruction => {
					let mut instruction = instruction.clone();
					let mut targets = instruction.targets().into_iter()
						.map(|target| -> Result<Label> { Ok(labels.at(instance.position(code.resolve(target)?)?)) })
						.collect::<Result<Vec<_>>>()?
						.into_iter();
					instruction.map_targets(|label| targets.next().unwrap_or(label));
					instruction
				},
			};
			instructions.push(instruction);
		}
	}

	// The members of a body inside of a range have consecutive copies, so each range is copied at most once per copy.
	let copy_range = |instance: &Instance, start: Label, end: Label| -> Result<Option<(usize, usize)>> {
		let start = code.resolve(start)?;
		let end = code.resolve(end)?;
		if start >= end {
			return Ok(None);
		}
		let members = &bodies[instance.body].members;
		match (members.range(start..end).next(), members.range(start..end).next_back()) {
			(Some(&first), Some(&last)) => Ok(Some((instance.position(first)?, instance.position(last)? + 1))),
			_ => Ok(None),
		}
	};

	let mut exception_table = Vec::new();
	for exception in &code.exception_table {
		for instance in &instances {
			if let Some((start, end)) = copy_range(instance, exception.start, exception.end)? {
				let handler = instance.position(code.resolve(exception.handler)?)?;
				exception_table.push(Exception {
					start: labels.at(start),
					end: labels.at(end),
					handler: labels.at(handler),
					catch: exception.catch.clone(),
				});
			}
		}
	}

	let line_numbers = code.line_numbers.as_ref()
		.map(|line_numbers| -> Result<Vec<(Label, u16)>> {
			let mut copied = Vec::new();
			for &(label, line) in line_numbers {
				let index = code.resolve(label)?;
				for instance in &instances {
					if let Some(&position) = instance.positions.get(&index) {
						copied.push((labels.at(position), line));
					}
				}
			}
			Ok(copied)
		})
		.transpose()?;

	let local_variables = code.local_variables.as_ref()
		.map(|local_variables| -> Result<Vec<Lv>> {
			let mut copied = Vec::new();
			for lv in local_variables {
				for instance in &instances {
					if let Some((start, end)) = copy_range(instance, lv.start, lv.end)? {
						copied.push(Lv { start: labels.at(start), end: labels.at(end), ..lv.clone() });
					}
				}
			}
			Ok(copied)
		})
		.transpose()?;

	debug!("inlined {} subroutines as {} copies, from {} to {} instructions",
		bodies.len() - 1, instances.len() - 1, code.instructions.len(), instructions.len());

	let mut inlined = Code {
		max_stack: None,
		max_locals: None,
		instructions,
		labels: labels.labels,
		exception_table,
		frames: None,
		line_numbers,
		local_variables,
		attributes: code.attributes.clone(),
	};
	inlined.invalidate_computed();
	Ok(inlined)
}

/// Inlines the subroutines of a method in place. Returns whether the method had any.
pub fn inline_method(method: &mut Method) -> Result<bool> {
	let Some(code) = &method.code else {
		return Ok(false);
	};
	if !code.has_subroutines() {
		return Ok(false);
	}
	let inlined = inline(code)
		.with_context(|| anyhow!("failed to inline the subroutines of {:?} {:?}", method.name, method.descriptor))?;
	method.code = Some(inlined);
	Ok(true)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::error::InlineError;
	use crate::inline::inline;
	use crate::tree::method::code::{Code, Exception, Instruction, LvIndex};

	fn lv(index: u16) -> LvIndex {
		LvIndex { index }
	}

	/// Replaces the jump targets by the indices they resolve to, as `goto`s.
	fn listing(code: &Code) -> Result<Vec<(Instruction, Option<usize>)>> {
		code.instructions.iter()
			.map(|instruction| -> Result<(Instruction, Option<usize>)> {
				let target = instruction.targets().first().map(|&label| code.resolve(label)).transpose()?;
				Ok(match target {
					Some(_) => (Instruction::Nop, target),
					None => (instruction.clone(), None),
				})
			})
			.collect()
	}

	#[test]
	fn without_subroutines() -> Result<()> {
		let mut code = Code::new();
		code.instructions = vec![Instruction::Nop, Instruction::Return];
		code.max_stack = Some(0);
		assert_eq!(inline(&code)?, code);
		Ok(())
	}

	#[test]
	fn two_calls_two_copies() -> Result<()> {
		let mut code = Code::new();
		let subroutine = code.label_at(4);
		let line = code.label_at(5);
		code.instructions = vec![
			Instruction::Nop,
			Instruction::Jsr(subroutine),
			Instruction::Jsr(subroutine),
			Instruction::Return,
			Instruction::AStore(lv(0)),
			Instruction::IConst0,
			Instruction::Pop,
			Instruction::Ret(lv(0)),
		];
		code.line_numbers = Some(vec![(line, 7)]);
		code.max_stack = Some(1);

		let inlined = inline(&code)?;
		assert!(!inlined.has_subroutines());
		assert_eq!(inlined.max_stack, None);
		assert_eq!(listing(&inlined)?, vec![
			(Instruction::Nop, None),
			(Instruction::Nop, Some(4)),
			(Instruction::Nop, Some(8)),
			(Instruction::Return, None),
			(Instruction::Nop, None),
			(Instruction::IConst0, None),
			(Instruction::Pop, None),
			(Instruction::Nop, Some(2)),
			(Instruction::Nop, None),
			(Instruction::IConst0, None),
			(Instruction::Pop, None),
			(Instruction::Nop, Some(3)),
		]);

		let lines: Vec<_> = inlined.line_numbers.iter().flatten()
			.map(|&(label, line)| -> Result<(usize, u16)> { Ok((inlined.resolve(label)?, line)) })
			.collect::<Result<_>>()?;
		assert_eq!(lines, vec![(5, 7), (9, 7)]);
		Ok(())
	}

	#[test]
	fn return_address_stand_in() -> Result<()> {
		let mut code = Code::new();
		let subroutine = code.label_at(2);
		code.instructions = vec![
			Instruction::Jsr(subroutine),
			Instruction::Return,
			Instruction::Swap,
			Instruction::AStore(lv(0)),
			Instruction::Ret(lv(0)),
		];

		let inlined = inline(&code)?;
		assert_eq!(inlined.instructions.len(), 6);
		assert_eq!(inlined.instructions[2], Instruction::AConstNull);
		assert_eq!(inlined.instructions[3], Instruction::Swap);
		assert_eq!(inlined.instructions[0].targets().first().map(|&label| inlined.resolve(label)).transpose()?, Some(2));
		Ok(())
	}

	#[test]
	fn exception_ranges_are_copied() -> Result<()> {
		let mut code = Code::new();
		let subroutine = code.label_at(3);
		code.instructions = vec![
			Instruction::Jsr(subroutine),
			Instruction::Jsr(subroutine),
			Instruction::Return,
			Instruction::AStore(lv(0)),
			Instruction::Nop,
			Instruction::Ret(lv(0)),
			Instruction::Pop,
			Instruction::Ret(lv(0)),
		];
		let start = code.label_at(4);
		let end = code.label_at(5);
		let handler = code.label_at(6);
		code.exception_table.push(Exception { start, end, handler, catch: None });

		let inlined = inline(&code)?;
		// main: 3, each copy: 5 (the handler belongs to the subroutine)
		assert_eq!(inlined.instructions.len(), 13);
		let ranges: Vec<_> = inlined.exception_table.iter()
			.map(|e| -> Result<(usize, usize, usize)> { Ok((inlined.resolve(e.start)?, inlined.resolve(e.end)?, inlined.resolve(e.handler)?)) })
			.collect::<Result<_>>()?;
		assert_eq!(ranges, vec![(4, 5, 6), (9, 10, 11)]);
		Ok(())
	}

	#[test]
	fn recursion_is_rejected() -> Result<()> {
		let mut code = Code::new();
		let subroutine = code.label_at(2);
		code.instructions = vec![
			Instruction::Jsr(subroutine),
			Instruction::Return,
			Instruction::AStore(lv(0)),
			Instruction::Jsr(subroutine),
			Instruction::Ret(lv(0)),
		];

		let err = inline(&code).unwrap_err();
		assert_eq!(err.root_cause().downcast_ref::<InlineError>(), Some(&InlineError::NonReturningCycle { index: 2 }));
		Ok(())
	}

	#[test]
	fn stray_ret() -> Result<()> {
		let mut code = Code::new();
		code.instructions = vec![Instruction::Nop, Instruction::Ret(lv(0))];

		let err = inline(&code).unwrap_err();
		assert_eq!(err.root_cause().downcast_ref::<InlineError>(), Some(&InlineError::RetOutsideSubroutine { index: 1 }));
		Ok(())
	}

	#[test]
	fn subroutine_without_ret() -> Result<()> {
		let mut code = Code::new();
		let subroutine = code.label_at(2);
		code.instructions = vec![
			Instruction::Jsr(subroutine),
			Instruction::Return,
			Instruction::Pop,
			Instruction::Return,
		];

		let inlined = inline(&code)?;
		assert_eq!(inlined.instructions.len(), 4);
		assert_eq!(inlined.instructions[2], Instruction::Nop);
		assert_eq!(inlined.instructions[3], Instruction::Return);
		Ok(())
	}
}
