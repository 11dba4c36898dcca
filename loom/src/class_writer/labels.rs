use anyhow::{anyhow, Context, Result};
use crate::tree::method::code::{Code, Label};

/// A helper struct for writing [`Label`]s as bytecode offsets.
///
/// Labels are bound to instruction indices, so only the offset of each instruction is recorded. The entry at
/// `instructions.len()` is the length of the code.
#[derive(Debug)]
pub(super) struct Labels {
	/// From an instruction index to its bytecode offset.
	index_to_offset: Vec<Option<u16>>,
}

impl Labels {
	pub(super) fn new(instructions: usize) -> Labels {
		Labels {
			index_to_offset: vec![None; instructions + 1],
		}
	}

	pub(super) fn add_instruction(&mut self, instruction_index: usize, opcode_pos: u16) {
		self.index_to_offset[instruction_index] = Some(opcode_pos);
	}

	/// The offset of the label, if the instruction it's bound to is already written.
	pub(super) fn get(&self, code: &Code, target: Label) -> Result<Option<u16>> {
		let index = code.resolve(target)?;
		Ok(self.index_to_offset[index])
	}

	pub(super) fn try_get(&self, code: &Code, target: Label) -> Result<u16> {
		self.get(code, target)?
			.with_context(|| anyhow!("no bytecode offset for label {target:?}"))
	}

	/// The number of bytes the instruction at the index was written with.
	pub(super) fn length_of(&self, index: usize) -> Option<u16> {
		let start = (*self.index_to_offset.get(index)?)?;
		let end = (*self.index_to_offset.get(index + 1)?)?;
		Some(end - start)
	}

	/// Gets the start offset and the length of the range between the labels.
	pub(super) fn try_get_range(&self, code: &Code, start: Label, end: Label) -> Result<(u16, u16)> {
		let start_offset = self.try_get(code, start)?;
		let end_offset = self.try_get(code, end)?;
		let length = end_offset.checked_sub(start_offset)
			.with_context(|| anyhow!("range from {start:?} to {end:?} ends before it starts"))?;
		Ok((start_offset, length))
	}
}
