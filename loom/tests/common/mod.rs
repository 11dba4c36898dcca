#![allow(dead_code)]

use anyhow::Result;
use loom::tree::class::{ClassAccess, ClassFile, ClassName};
use loom::tree::method::code::{Code, Instruction};
use loom::tree::method::{Method, MethodAccess, MethodRef};
use loom::tree::version::Version;

/// Big endian class file bytes, written by hand.
#[derive(Debug, Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
	pub fn u1(mut self, value: u8) -> Bytes {
		self.0.push(value);
		self
	}

	pub fn u2(mut self, value: u16) -> Bytes {
		self.0.extend_from_slice(&value.to_be_bytes());
		self
	}

	pub fn u4(mut self, value: u32) -> Bytes {
		self.0.extend_from_slice(&value.to_be_bytes());
		self
	}

	pub fn raw(mut self, bytes: &[u8]) -> Bytes {
		self.0.extend_from_slice(bytes);
		self
	}

	/// A `CONSTANT_Utf8` entry.
	pub fn utf8(self, string: &str) -> Bytes {
		self.u1(1).u2(string.len() as u16).raw(string.as_bytes())
	}
}

/// What javac 8 makes out of `public class Hello {}` in `Hello.java`.
pub fn hello_class() -> Vec<u8> {
	Bytes::default()
		.u4(0xCAFE_BABE)
		.u2(0).u2(52)
		.u2(13)
		.u1(10).u2(3).u2(10) // #1 Methodref java/lang/Object.<init>:()V
		.u1(7).u2(11) // #2 Class Hello
		.u1(7).u2(12) // #3 Class java/lang/Object
		.utf8("<init>") // #4
		.utf8("()V") // #5
		.utf8("Code") // #6
		.utf8("LineNumberTable") // #7
		.utf8("SourceFile") // #8
		.utf8("Hello.java") // #9
		.u1(12).u2(4).u2(5) // #10 NameAndType <init>:()V
		.utf8("Hello") // #11
		.utf8("java/lang/Object") // #12
		.u2(0x0021).u2(2).u2(3)
		.u2(0) // interfaces
		.u2(0) // fields
		.u2(1) // methods
		.u2(0x0001).u2(4).u2(5)
		.u2(1)
		.u2(6).u4(29)
		.u2(1).u2(1)
		.u4(5).raw(&[0x2a, 0xb7, 0x00, 0x01, 0xb1])
		.u2(0)
		.u2(1)
		.u2(7).u4(6).u2(1).u2(0).u2(1)
		.u2(1) // attributes
		.u2(8).u4(2).u2(9)
		.0
}

pub fn class(name: &str, super_class: &str) -> Result<ClassFile> {
	Ok(ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from(name)?, Some(ClassName::try_from(super_class)?), Vec::new()))
}

pub fn method(access: u16, name: &str, descriptor: &str, code: Code) -> Result<Method> {
	let mut method = Method::new(MethodAccess::from(access), name.try_into()?, descriptor.try_into()?);
	method.code = Some(code);
	Ok(method)
}

pub fn invoke_special(class: &str, name: &str, descriptor: &str) -> Result<Instruction> {
	Ok(Instruction::InvokeSpecial(MethodRef {
		class: ClassName::try_from(class)?,
		name: name.try_into()?,
		desc: descriptor.try_into()?,
	}, false))
}

pub fn invoke_static(class: &str, name: &str, descriptor: &str) -> Result<Instruction> {
	Ok(Instruction::InvokeStatic(MethodRef {
		class: ClassName::try_from(class)?,
		name: name.try_into()?,
		desc: descriptor.try_into()?,
	}, false))
}

/// The instructions, with every jump target replaced by the instruction index it resolves to.
pub fn listing(code: &Code) -> Result<Vec<String>> {
	code.instructions.iter()
		.map(|instruction| -> Result<String> {
			let targets = instruction.targets().into_iter()
				.map(|label| code.resolve(label))
				.collect::<Result<Vec<_>>>()?;
			Ok(if targets.is_empty() {
				format!("{instruction:?}")
			} else {
				let name = format!("{instruction:?}");
				let name = name.split('(').next().unwrap_or_default().split(' ').next().unwrap_or_default().to_owned();
				format!("{name} -> {targets:?}")
			})
		})
		.collect()
}
