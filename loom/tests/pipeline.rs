mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use loom::inline::inline_method;
use loom::tree::class::ClassFile;
use loom::tree::method::code::{Code, Instruction, LvIndex};
use loom::tree::method::Method;
use loom::tree::version::Version;
use loom::visitor::stages::{EncodeSink, Inspect, MethodPass};
use loom::visitor::tree::TreeBuilder;
use loom::visitor::{ClassEvent, CodeEvent};
use loom::{decode, encode, read_events, Options};

#[test]
fn events_of_a_javac_class() -> Result<()> {
	let bytes = common::hello_class();
	let options = Options::default();

	let events = read_events(&bytes, &options, Vec::new())?;
	let kinds: Vec<_> = events.iter()
		.map(|event| match event {
			ClassEvent::BeginClass(_) => "class",
			ClassEvent::Field(_) => "field",
			ClassEvent::BeginMethod(_) => "method",
			ClassEvent::Code(CodeEvent::Begin { .. }) => "code",
			ClassEvent::Code(CodeEvent::Label(_)) => "label",
			ClassEvent::Code(CodeEvent::LineNumber(..)) => "line",
			ClassEvent::Code(CodeEvent::Instruction(_)) => "instruction",
			ClassEvent::Code(_) => "other",
			ClassEvent::EndMethod => "end method",
			ClassEvent::EndClass => "end class",
		})
		.collect();
	assert_eq!(kinds, vec![
		"class", "method", "code", "label", "line", "instruction", "instruction", "instruction", "end method", "end class",
	]);

	// straight from the events to bytes gives the same as going through the tree
	let direct = read_events(&bytes, &options, EncodeSink::new(&options))?;
	let tree = read_events(&bytes, &options, TreeBuilder::new())?;
	assert_eq!(direct, encode(&tree, &options)?);
	Ok(())
}

#[test]
fn inlining_while_upgrading() -> Result<()> {
	let mut code = Code::new();
	let subroutine = code.label_at(3);
	code.instructions = vec![
		Instruction::Jsr(subroutine),
		Instruction::Jsr(subroutine),
		Instruction::Return,
		Instruction::AStore(LvIndex { index: 0 }),
		Instruction::Ret(LvIndex { index: 0 }),
	];
	code.max_stack = Some(1);
	code.max_locals = Some(1);
	let mut class = common::class("a/Old", "java/lang/Object")?;
	class.version = Version::V1_4;
	class.methods.push(common::method(0x0009, "f", "()V", code)?);
	let old = encode(&class, &Options::default())?;

	let options = Options::default()
		.with_target_version(Version::V1_8)
		.with_compute_frames(true);

	let mut methods = 0;
	let mut inlined = Vec::new();
	let pipeline = Inspect::new(
		|event: &ClassEvent| {
			if matches!(event, ClassEvent::BeginMethod(_)) {
				methods += 1;
			}
			Ok(())
		},
		MethodPass::new(
			|_: &ClassFile, method: &mut Method| {
				if inline_method(method)? {
					inlined.push(method.name.clone());
				}
				Ok(())
			},
			EncodeSink::new(&options),
		),
	);
	let new = read_events(&old, &Options::default(), pipeline)?;
	assert_eq!(methods, 1);
	assert_eq!(inlined.len(), 1);

	let decoded = decode(&new, &Options::default())?;
	assert_eq!(decoded.version, Version::V1_8);
	let code = decoded.methods[0].code.clone().unwrap_or_default();
	assert!(!code.has_subroutines());
	assert_eq!(code.instructions.len(), 7);
	Ok(())
}

#[test]
fn failing_stages_name_the_method() -> Result<()> {
	let mut code = Code::new();
	code.instructions = vec![Instruction::Ret(LvIndex { index: 0 })];
	code.max_stack = Some(0);
	code.max_locals = Some(1);
	let mut class = common::class("a/Bad", "java/lang/Object")?;
	class.version = Version::V1_4;
	class.methods.push(common::method(0x0009, "broken", "()V", code)?);
	let bytes = encode(&class, &Options::default())?;

	let options = Options::default();
	let pipeline = MethodPass::new(|_: &ClassFile, method: &mut Method| inline_method(method).map(|_| ()), EncodeSink::new(&options));
	let err = read_events(&bytes, &options, pipeline).unwrap_err();
	let message = format!("{err:?}");
	assert!(message.contains("broken"), "{message}");
	assert!(message.contains("a/Bad"), "{message}");
	Ok(())
}
