//! Building a [`ClassFile`] out of events.

use anyhow::{anyhow, bail, Result};
use crate::tree::class::ClassFile;
use crate::visitor::{ClassEvent, ClassSink, MethodBuilder};

/// A sink assembling the events back into a class tree.
///
/// This is what [`decode`](crate::decode) uses.
#[derive(Debug, Default)]
pub struct TreeBuilder {
	class: Option<ClassFile>,
	method: MethodBuilder,
	ended: bool,
}

impl TreeBuilder {
	pub fn new() -> TreeBuilder {
		TreeBuilder::default()
	}

	fn class_mut(&mut self) -> Result<&mut ClassFile> {
		if self.ended {
			bail!("event after the end of the class");
		}
		self.class.as_mut().ok_or_else(|| anyhow!("event before the class began"))
	}
}

impl ClassSink for TreeBuilder {
	type Output = ClassFile;

	fn accept(&mut self, event: ClassEvent) -> Result<()> {
		match event {
			ClassEvent::BeginClass(class) => {
				if self.class.is_some() {
					bail!("class {:?} began after another class", class.name);
				}
				self.class = Some(*class);
			},
			ClassEvent::Field(field) => {
				self.class_mut()?.fields.push(*field);
			},
			ClassEvent::BeginMethod(method) => {
				self.class_mut()?;
				self.method.begin(*method)?;
			},
			ClassEvent::Code(event) => self.method.code(event)?,
			ClassEvent::EndMethod => {
				let method = self.method.end()?;
				self.class_mut()?.methods.push(method);
			},
			ClassEvent::EndClass => {
				if self.method.is_active() {
					bail!("class ended inside of a method");
				}
				self.class_mut()?;
				self.ended = true;
			},
		}
		Ok(())
	}

	fn finish(self) -> Result<ClassFile> {
		match self.class {
			Some(class) if self.ended => Ok(class),
			Some(class) => bail!("class {:?} never ended", class.name),
			None => bail!("no class was seen"),
		}
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::class::{ClassAccess, ClassFile, ClassName};
	use crate::tree::field::{Field, FieldAccess};
	use crate::tree::method::code::{Code, Instruction};
	use crate::tree::method::{Method, MethodAccess};
	use crate::tree::version::Version;
	use crate::visitor::tree::TreeBuilder;
	use crate::visitor::{replay, ClassEvent, ClassSink};

	#[test]
	fn replayed_class_is_equal() -> Result<()> {
		let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new());
		class.source_file = Some("B.java".into());
		class.fields.push(Field::new(FieldAccess::from(0x0002), "x".try_into()?, "I".try_into()?));

		let mut method = Method::new(MethodAccess::from(0x0001), "get".try_into()?, "()I".try_into()?);
		let mut code = Code::new();
		code.max_stack = Some(1);
		code.max_locals = Some(1);
		code.instructions = vec![Instruction::IConst0, Instruction::IReturn];
		let start = code.label_at(0);
		code.line_numbers = Some(vec![(start, 3)]);
		method.code = Some(code);
		class.methods.push(method);

		assert_eq!(replay(class.clone(), TreeBuilder::new())?, class);
		Ok(())
	}

	#[test]
	fn protocol_errors() -> Result<()> {
		let class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, None, Vec::new());

		let mut builder = TreeBuilder::new();
		assert!(builder.accept(ClassEvent::EndMethod).is_err());
		assert!(builder.accept(ClassEvent::EndClass).is_err());

		let mut builder = TreeBuilder::new();
		builder.accept(ClassEvent::BeginClass(Box::new(class.clone())))?;
		assert!(builder.accept(ClassEvent::BeginClass(Box::new(class))).is_err());
		assert!(builder.finish().is_err());
		Ok(())
	}
}
