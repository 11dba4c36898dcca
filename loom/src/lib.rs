//! A crate for reading, analysing and rewriting [Java Class Files](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html).
//!
//! The entry points are [`decode`], [`read_events`] and [`encode`]. Everything in between is either done on the
//! owned [`tree`], or by a chain of [`visitor::ClassSink`] stages.
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use loom::Options;
//!
//! let options = Options::default().with_compute_frames(true);
//! # let _ = options;
//! # Ok(())
//! # }
//! ```

pub mod tree;
pub mod error;
pub mod options;
pub mod hierarchy;
pub mod visitor;
pub mod analysis;
pub mod inline;
pub mod weave;

mod class_reader;
mod class_writer;
mod jstring;

mod macros;
mod class_constants;

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use anyhow::{anyhow, bail, Context, Result};
use crate::class_writer::ClassWriter;
use crate::error::CodecError;
use crate::tree::class::ClassFile;
use crate::visitor::ClassSink;
use crate::visitor::tree::TreeBuilder;

pub use crate::options::Options;
pub use crate::hierarchy::ClassHierarchy;

/// Decodes a single class file into its tree representation.
pub fn decode(bytes: &[u8], options: &Options) -> Result<ClassFile> {
	read_events(bytes, options, TreeBuilder::new())
}

/// Decodes a single class file, pushing its events into the sink given.
///
/// Returns whatever the sink produces at the end.
pub fn read_events<S: ClassSink>(bytes: &[u8], options: &Options, sink: S) -> Result<S::Output> {
	let mut reader = Cursor::new(bytes);
	class_reader::read(&mut reader, options, sink)
}

/// Encodes a class into the bytes of a class file.
///
/// Nothing is returned unless the whole class could be encoded.
pub fn encode(class: &ClassFile, options: &Options) -> Result<Vec<u8>> {
	let mut writer = ClassWriter::new(class, options)?;
	for field in &class.fields {
		writer.write_field(field)
			.with_context(|| anyhow!("failed to write field {:?} {:?} of class {:?}", field.name, field.descriptor, class.name))?;
	}
	for method in &class.methods {
		writer.write_method(class, method)
			.with_context(|| anyhow!("failed to write method {:?} {:?} of class {:?}", method.name, method.descriptor, class.name))?;
	}
	writer.finish(class)
		.with_context(|| anyhow!("failed to write class {:?}", class.name))
}

trait OptionExpansion<T> {
	/// Stores the value, failing if there's already one. Used for attributes that may only appear once.
	fn insert_if_empty(&mut self, value: T, offset: u64) -> Result<()>;
}
impl<T> OptionExpansion<T> for Option<T> {
	fn insert_if_empty(&mut self, value: T, offset: u64) -> Result<()> {
		if self.is_some() {
			bail!(CodecError::Malformed { reason: "attribute may only appear once", offset });
		}
		*self = Some(value);
		Ok(())
	}
}

trait ClassRead {
	fn marker(&mut self) -> Result<u64>;
	fn skip(&mut self, n: i64) -> Result<()>;
	fn goto(&mut self, pos: u64) -> Result<()>;
	fn with_pos<T>(&mut self, pos: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
		let marker = self.marker()?;
		self.goto(pos)?;
		let r = f(self)?;
		self.goto(marker)?;
		Ok(r)
	}

	/// Reads exactly `N` bytes, failing with [`CodecError::Truncated`] if the data ends before that.
	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]>;
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n().context("couldn't read u8")?))
	}
	fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n().context("couldn't read u16")?))
	}
	fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n().context("couldn't read u32")?))
	}
	fn read_u64(&mut self) -> Result<u64> {
		Ok(u64::from_be_bytes(self.read_n().context("couldn't read u64")?))
	}
	fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_be_bytes(self.read_n().context("couldn't read i8")?))
	}
	fn read_i16(&mut self) -> Result<i16> {
		Ok(i16::from_be_bytes(self.read_n().context("couldn't read i16")?))
	}
	fn read_i32(&mut self) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_n().context("couldn't read i32")?))
	}
	fn read_i64(&mut self) -> Result<i64> {
		Ok(i64::from_be_bytes(self.read_n().context("couldn't read i64")?))
	}

	fn read_u8_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u8()? as usize)
	}
	fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	fn read_u32_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u32()? as usize)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>>;
	fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>>
		where
			S: FnOnce(&mut Self) -> Result<usize>,
			E: FnMut(&mut Self) -> Result<T>
	{
		let size = get_size(self)?;
		// The size comes from the input, so don't trust it for allocating.
		let mut vec = Vec::with_capacity(size.min(1024));
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}
}
impl<T: Read + Seek> ClassRead for T {
	fn marker(&mut self) -> Result<u64> {
		Ok(self.stream_position()?)
	}
	fn skip(&mut self, n: i64) -> Result<()> {
		self.seek(SeekFrom::Current(n))?;
		Ok(())
	}
	fn goto(&mut self, pos: u64) -> Result<()> {
		self.seek(SeekFrom::Start(pos))?;
		Ok(())
	}

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let offset = self.stream_position()?;
		let mut buf = [0u8; N];
		if self.read_exact(&mut buf).is_err() {
			bail!(CodecError::Truncated { offset });
		}
		Ok(buf)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>> {
		let offset = self.stream_position()?;
		let mut vec = Vec::new();
		self.by_ref().take(size as u64).read_to_end(&mut vec)?;
		if vec.len() != size {
			bail!(CodecError::Truncated { offset: offset + vec.len() as u64 });
		}
		Ok(vec)
	}
}

trait ClassWrite {
	fn write_u8(&mut self, a: u8) -> Result<()> {
		self.write_u8_slice(&[a]).context("couldn't write u8")
	}
	fn write_u16(&mut self, value: u16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u16")
	}
	fn write_u32(&mut self, value: u32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u32")
	}
	fn write_u64(&mut self, value: u64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u64")
	}
	fn write_i8(&mut self, value: i8) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i8")
	}
	fn write_i16(&mut self, value: i16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i16")
	}
	fn write_i32(&mut self, value: i32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i32")
	}
	fn write_i64(&mut self, value: i64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i64")
	}

	/// Writes a count or length, failing with [`CodecError::TooLarge`] naming `what` if it doesn't fit.
	fn write_usize_as_u8(&mut self, value: usize, what: &'static str) -> Result<()> {
		let Ok(value) = u8::try_from(value) else {
			bail!(CodecError::TooLarge { what });
		};
		self.write_u8(value)
	}
	fn write_usize_as_u16(&mut self, value: usize, what: &'static str) -> Result<()> {
		let Ok(value) = u16::try_from(value) else {
			bail!(CodecError::TooLarge { what });
		};
		self.write_u16(value)
	}
	fn write_usize_as_u32(&mut self, value: usize, what: &'static str) -> Result<()> {
		let Ok(value) = u32::try_from(value) else {
			bail!(CodecError::TooLarge { what });
		};
		self.write_u32(value)
	}

	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()>;
	fn write_slice<'t, T>(
		&mut self,
		slice: &'t [T],
		put_size: impl FnOnce(&mut Self, usize) -> Result<()>,
		mut put_element: impl FnMut(&mut Self, &'t T) -> Result<()>
	) -> Result<()> {
		put_size(self, slice.len())?;
		for value in slice {
			put_element(self, value)?;
		}
		Ok(())
	}
}

impl<T: Write> ClassWrite for T {
	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()> {
		self.write_all(buf).context("failed to write &[u8]")
	}
}
