use std::collections::HashMap;
use anyhow::{bail, Result};
use crate::error::CodecError;
use crate::tree::method::code::{Code, Label};

/// Hands out one [`Label`] per referenced bytecode offset while a `Code` attribute is read.
///
/// The ids given out are provisional. [`Labels::bind`] renumbers them in the order of their offsets, so
/// decoding the same code always gives the same labels, no matter in which order the attributes came.
#[derive(Debug)]
pub(super) struct Labels {
	code_length: u32,
	/// bytecode offset -> (label, absolute byte offset of the first reference to it)
	labels: HashMap<u32, (Label, u64)>,
}

impl Labels {
	pub(super) fn new(code_length: u32) -> Labels {
		Labels {
			code_length,
			labels: HashMap::new(),
		}
	}

	fn get_or_create(&mut self, pc: u32, referenced_at: u64) -> Label {
		let next = Label { id: self.labels.len() as u32 };
		self.labels.entry(pc).or_insert((next, referenced_at)).0
	}

	/// Gets the label for the instruction at `pc`, which must be inside the code.
	pub(super) fn at(&mut self, pc: i64, referenced_at: u64) -> Result<Label> {
		match u32::try_from(pc) {
			Ok(pc) if pc < self.code_length => Ok(self.get_or_create(pc, referenced_at)),
			_ => bail!(CodecError::InvalidOffset { target: pc, offset: referenced_at }),
		}
	}

	/// Like [`Labels::at`], but also allows the offset just past the last instruction, like an exclusive end does.
	pub(super) fn at_or_end(&mut self, pc: i64, referenced_at: u64) -> Result<Label> {
		match u32::try_from(pc) {
			Ok(pc) if pc <= self.code_length => Ok(self.get_or_create(pc, referenced_at)),
			_ => bail!(CodecError::InvalidOffset { target: pc, offset: referenced_at }),
		}
	}

	/// Gets the label of a branch target, given as offset relative to the branching instruction at `pc`.
	pub(super) fn branch(&mut self, pc: u32, relative: i32, referenced_at: u64) -> Result<Label> {
		self.at(pc as i64 + relative as i64, referenced_at)
	}

	/// Binds all labels to the instruction starting at their offset, renumbering them in order of the offsets.
	///
	/// `starts` holds the offsets of all the instructions, ascending. Fails with [`CodecError::InvalidOffset`] if
	/// an offset points into the middle of an instruction.
	pub(super) fn bind(self, code: &mut Code, starts: &[u32]) -> Result<()> {
		let mut sorted: Vec<_> = self.labels.into_iter().collect();
		sorted.sort_by_key(|&(pc, _)| pc);

		let mut renumbered = HashMap::with_capacity(sorted.len());
		for (pc, (provisional, referenced_at)) in sorted {
			let index = match starts.binary_search(&pc) {
				Ok(index) => index,
				Err(index) if pc == self.code_length => index,
				Err(_) => bail!(CodecError::InvalidOffset { target: pc as i64, offset: referenced_at }),
			};
			renumbered.insert(provisional, code.labels.create_at(index));
		}

		code.map_labels(|label| renumbered.get(&label).copied().unwrap_or(label));
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::class_reader::labels::Labels;
	use crate::error::CodecError;
	use crate::tree::method::code::{Code, Instruction};

	#[test]
	fn renumbered_by_offset() -> Result<()> {
		// nop; goto -1; return, at offsets 0, 1 and 4
		let mut labels = Labels::new(5);
		let late = labels.at(4, 10)?;
		let early = labels.branch(1, -1, 11)?;
		let end = labels.at_or_end(5, 12)?;
		assert_eq!(labels.at(4, 13)?, late);

		let mut code = Code::new();
		code.instructions = vec![Instruction::Nop, Instruction::Goto(late), Instruction::Goto(early)];
		code.line_numbers = Some(vec![(end, 1)]);
		labels.bind(&mut code, &[0, 1, 4])?;

		let first = code.labels.iter().map(|(label, _)| label).collect::<Vec<_>>();
		assert_eq!(code.labels.iter().map(|(_, position)| position).collect::<Vec<_>>(), vec![Some(0), Some(2), Some(3)]);
		assert_eq!(code.instructions[1], Instruction::Goto(first[1]));
		assert_eq!(code.instructions[2], Instruction::Goto(first[0]));
		assert_eq!(code.line_numbers, Some(vec![(first[2], 1)]));
		Ok(())
	}

	#[test]
	fn offsets_are_checked() -> Result<()> {
		let mut labels = Labels::new(5);
		let err = labels.branch(1, 10, 7).unwrap_err();
		assert_eq!(err.root_cause().downcast_ref::<CodecError>(), Some(&CodecError::InvalidOffset { target: 11, offset: 7 }));
		assert!(labels.at(5, 7).is_err());
		assert!(labels.at(-1, 7).is_err());

		labels.at(2, 20)?;
		let err = labels.bind(&mut Code::new(), &[0, 1, 4]).unwrap_err();
		assert_eq!(err.root_cause().downcast_ref::<CodecError>(), Some(&CodecError::InvalidOffset { target: 2, offset: 20 }));
		Ok(())
	}
}
