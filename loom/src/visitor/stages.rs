//! Ready made sinks for building pipelines.

use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use crate::class_writer::ClassWriter;
use crate::options::Options;
use crate::tree::class::ClassFile;
use crate::tree::method::Method;
use crate::visitor::{emit_method, ClassEvent, ClassSink, MethodBuilder};

/// A sink writing the class file bytes directly from the events.
///
/// Fields and methods are encoded as soon as they end, so the class never exists as a whole tree. The output is the
/// same as the one of [`encode`](crate::encode) for the same class.
pub struct EncodeSink<'a> {
	options: &'a Options,
	/// The header of the class, as given by [`ClassEvent::BeginClass`], and the writer for it.
	writer: Option<(ClassFile, ClassWriter<'a>)>,
	method: MethodBuilder,
	ended: bool,
}

impl<'a> EncodeSink<'a> {
	pub fn new(options: &'a Options) -> EncodeSink<'a> {
		EncodeSink {
			options,
			writer: None,
			method: MethodBuilder::default(),
			ended: false,
		}
	}

	fn writer(&mut self) -> Result<(&ClassFile, &mut ClassWriter<'a>)> {
		if self.ended {
			bail!("event after the end of the class");
		}
		match &mut self.writer {
			Some((class, writer)) => Ok((class, writer)),
			None => bail!("event before the class began"),
		}
	}
}

impl ClassSink for EncodeSink<'_> {
	type Output = Vec<u8>;

	fn accept(&mut self, event: ClassEvent) -> Result<()> {
		match event {
			ClassEvent::BeginClass(class) => {
				if self.writer.is_some() {
					bail!("class {:?} began after another class", class.name);
				}
				let writer = ClassWriter::new(&class, self.options)?;
				self.writer = Some((*class, writer));
			},
			ClassEvent::Field(field) => {
				let (class, writer) = self.writer()?;
				writer.write_field(&field)
					.with_context(|| anyhow!("failed to write field {:?} {:?} of class {:?}", field.name, field.descriptor, class.name))?;
			},
			ClassEvent::BeginMethod(method) => {
				self.writer()?;
				self.method.begin(*method)?;
			},
			ClassEvent::Code(event) => self.method.code(event)?,
			ClassEvent::EndMethod => {
				let method = self.method.end()?;
				let (class, writer) = self.writer()?;
				writer.write_method(class, &method)
					.with_context(|| anyhow!("failed to write method {:?} {:?} of class {:?}", method.name, method.descriptor, class.name))?;
			},
			ClassEvent::EndClass => {
				if self.method.is_active() {
					bail!("class ended inside of a method");
				}
				self.writer()?;
				self.ended = true;
			},
		}
		Ok(())
	}

	fn finish(self) -> Result<Vec<u8>> {
		match self.writer {
			Some((class, writer)) if self.ended => writer.finish(&class)
				.with_context(|| anyhow!("failed to write class {:?}", class.name)),
			Some((class, _)) => bail!("class {:?} never ended", class.name),
			None => bail!("no class was seen"),
		}
	}
}

/// A stage that collects each method including its code, hands it to a function that may change it, and then
/// forwards the events of the changed method.
///
/// All other events pass through unchanged.
pub struct MethodPass<F, S> {
	f: F,
	next: S,
	/// The header of the class the methods belong to.
	class: Option<ClassFile>,
	method: MethodBuilder,
}

impl<F, S> MethodPass<F, S>
where
	F: FnMut(&ClassFile, &mut Method) -> Result<()>,
	S: ClassSink,
{
	pub fn new(f: F, next: S) -> MethodPass<F, S> {
		MethodPass { f, next, class: None, method: MethodBuilder::default() }
	}
}

impl<F, S> ClassSink for MethodPass<F, S>
where
	F: FnMut(&ClassFile, &mut Method) -> Result<()>,
	S: ClassSink,
{
	type Output = S::Output;

	fn accept(&mut self, event: ClassEvent) -> Result<()> {
		match event {
			ClassEvent::BeginClass(class) => {
				self.class = Some((*class).clone());
				self.next.accept(ClassEvent::BeginClass(class))
			},
			ClassEvent::BeginMethod(method) => self.method.begin(*method),
			ClassEvent::Code(event) => self.method.code(event),
			ClassEvent::EndMethod => {
				let mut method = self.method.end()?;
				let class = self.class.as_ref()
					.ok_or_else(|| anyhow!("method {:?} {:?} outside of a class", method.name, method.descriptor))?;
				trace!("passing method {:?} {:?} of class {:?}", method.name, method.descriptor, class.name);
				(self.f)(class, &mut method)
					.with_context(|| anyhow!("failed to transform method {:?} {:?} of class {:?}", method.name, method.descriptor, class.name))?;
				emit_method(method, &mut self.next)
			},
			event => self.next.accept(event),
		}
	}

	fn finish(self) -> Result<S::Output> {
		if self.method.is_active() {
			bail!("the events ended inside of a method");
		}
		self.next.finish()
	}
}

/// A stage that shows every event to a function before forwarding it.
///
/// An error from the function stops the pipeline.
pub struct Inspect<F, S> {
	f: F,
	next: S,
}

impl<F, S> Inspect<F, S>
where
	F: FnMut(&ClassEvent) -> Result<()>,
	S: ClassSink,
{
	pub fn new(f: F, next: S) -> Inspect<F, S> {
		Inspect { f, next }
	}
}

impl<F, S> ClassSink for Inspect<F, S>
where
	F: FnMut(&ClassEvent) -> Result<()>,
	S: ClassSink,
{
	type Output = S::Output;

	fn accept(&mut self, event: ClassEvent) -> Result<()> {
		(self.f)(&event)?;
		self.next.accept(event)
	}

	fn finish(self) -> Result<S::Output> {
		self.next.finish()
	}
}

#[cfg(test)]
mod testing {
	use anyhow::{bail, Result};
	use pretty_assertions::assert_eq;
	use crate::options::Options;
	use crate::tree::class::{ClassAccess, ClassFile, ClassName};
	use crate::tree::field::{Field, FieldAccess};
	use crate::tree::method::code::{Code, Instruction};
	use crate::tree::method::{Method, MethodAccess};
	use crate::tree::version::Version;
	use crate::visitor::stages::{EncodeSink, Inspect, MethodPass};
	use crate::visitor::tree::TreeBuilder;
	use crate::visitor::{replay, ClassEvent};

	fn class() -> Result<ClassFile> {
		let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new());
		class.fields.push(Field::new(FieldAccess::from(0x0002), "x".try_into()?, "I".try_into()?));

		let mut method = Method::new(MethodAccess::from(0x0009), "run".try_into()?, "()V".try_into()?);
		let mut code = Code::new();
		code.max_stack = Some(0);
		code.max_locals = Some(0);
		code.instructions = vec![Instruction::Return];
		method.code = Some(code);
		class.methods.push(method);
		Ok(class)
	}

	#[test]
	fn encode_sink_matches_encode() -> Result<()> {
		let options = Options::default();
		let class = class()?;
		let expected = crate::encode(&class, &options)?;
		let actual = replay(class, EncodeSink::new(&options))?;
		assert_eq!(actual, expected);
		Ok(())
	}

	#[test]
	fn encode_sink_wants_a_whole_class() -> Result<()> {
		let options = Options::default();
		let mut events = replay(class()?, Vec::new())?;
		events.pop();

		let mut sink = EncodeSink::new(&options);
		for event in events {
			crate::visitor::ClassSink::accept(&mut sink, event)?;
		}
		assert!(crate::visitor::ClassSink::finish(sink).is_err());
		Ok(())
	}

	#[test]
	fn method_pass_changes_methods() -> Result<()> {
		let class = class()?;
		let pipeline = MethodPass::new(|class: &ClassFile, method: &mut Method| {
			assert_eq!(class.name, ClassName::try_from("a/B")?);
			if let Some(code) = &mut method.code {
				code.insert(0, [Instruction::Nop]);
			}
			method.has_deprecated_attribute = true;
			Ok(())
		}, TreeBuilder::new());
		let result = replay(class.clone(), pipeline)?;

		assert_eq!(result.fields, class.fields);
		let code = result.methods[0].code.as_ref().map(|code| code.instructions.clone());
		assert_eq!(code, Some(vec![Instruction::Nop, Instruction::Return]));
		assert!(result.methods[0].has_deprecated_attribute);
		Ok(())
	}

	#[test]
	fn method_pass_errors_stop_the_pipeline() -> Result<()> {
		let pipeline = MethodPass::new(|_: &ClassFile, _: &mut Method| bail!("nope"), TreeBuilder::new());
		let err = replay(class()?, pipeline).unwrap_err();
		assert!(format!("{err:?}").contains("nope"));
		Ok(())
	}

	#[test]
	fn inspect_sees_everything() -> Result<()> {
		let mut seen = Vec::new();
		let pipeline = Inspect::new(|event: &ClassEvent| {
			seen.push(event.clone());
			Ok(())
		}, Vec::new());
		let forwarded = replay(class()?, pipeline)?;
		assert_eq!(seen, forwarded);
		assert_eq!(seen.len(), 7);
		Ok(())
	}
}
