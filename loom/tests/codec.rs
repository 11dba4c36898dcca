mod common;

use anyhow::Result;
use java_string::JavaString;
use pretty_assertions::assert_eq;
use loom::error::CodecError;
use loom::tree::class::ClassName;
use loom::tree::field::{ConstantValue, Field, FieldAccess};
use loom::tree::method::code::{Code, Exception, Instruction, LvIndex};
use loom::tree::method::frame::StackMapData;
use loom::tree::version::Version;
use loom::{decode, encode, Options};

fn codec_error(result: Result<impl std::fmt::Debug>) -> Option<CodecError> {
	result.err().and_then(|err| err.root_cause().downcast_ref::<CodecError>().cloned())
}

#[test]
fn javac_class_is_written_back_the_same() -> Result<()> {
	let bytes = common::hello_class();
	let options = Options::default();

	let class = decode(&bytes, &options)?;
	assert_eq!(class.name, ClassName::try_from("Hello")?);
	assert_eq!(class.source_file, Some(JavaString::from("Hello.java")));
	let code = class.methods[0].code.clone().unwrap_or_default();
	assert_eq!((code.max_stack, code.max_locals), (Some(1), Some(1)));
	assert_eq!(code.instructions, vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		common::invoke_special("java/lang/Object", "<init>", "()V")?,
		Instruction::Return,
	]);

	let written = encode(&class, &options)?;
	assert_eq!(written.len(), bytes.len());

	let again = decode(&written, &options)?;
	let again_code = again.methods[0].code.clone().unwrap_or_default();
	assert_eq!(common::listing(&again_code)?, common::listing(&code)?);
	assert_eq!(again, class);
	assert_eq!(encode(&again, &options)?, written);
	Ok(())
}

#[test]
fn computed_frames_survive_a_round_trip() -> Result<()> {
	let mut class = common::class("a/Calc", "java/lang/Object")?;

	let mut field = Field::new(FieldAccess::from(0x0019), "LIMIT".try_into()?, "J".try_into()?);
	field.constant_value = Some(ConstantValue::Long(1 << 40));
	class.fields.push(field);

	// static int f(int x) { try { return 10 / x; } catch (ArithmeticException e) { return x > 0 ? 1 : -1; } }
	let mut code = Code::new();
	let start = code.label_at(0);
	let end = code.label_at(3);
	let handler = code.label_at(3);
	let negative = code.label_at(9);
	code.instructions = vec![
		Instruction::BiPush(10),
		Instruction::ILoad(LvIndex { index: 0 }),
		Instruction::IDiv,
		Instruction::IReturn,
		Instruction::AStore(LvIndex { index: 1 }),
		Instruction::ILoad(LvIndex { index: 0 }),
		Instruction::IfLe(negative),
		Instruction::IConst1,
		Instruction::IReturn,
		Instruction::IConstM1,
		Instruction::IReturn,
	];
	code.labels.bind(end, 3)?;
	code.labels.bind(handler, 4)?;
	code.exception_table.push(Exception { start, end, handler, catch: Some(ClassName::try_from("java/lang/ArithmeticException")?) });
	class.methods.push(common::method(0x0009, "f", "(I)I", code)?);

	let options = Options::default().with_compute_frames(true);
	let bytes = encode(&class, &options)?;
	let decoded = decode(&bytes, &Options::default())?;

	assert_eq!(decoded.fields, class.fields);
	let code = decoded.methods[0].code.clone().unwrap_or_default();
	assert_eq!(code.max_stack, Some(2));
	assert_eq!(code.max_locals, Some(2));
	let frames: Vec<_> = code.frames.iter().flatten()
		.map(|(label, _)| code.resolve(*label))
		.collect::<Result<_>>()?;
	assert_eq!(frames, vec![4, 9]);

	// the frames are kept as they are now
	assert_eq!(encode(&decoded, &Options::default())?, bytes);
	Ok(())
}

#[test]
fn decoding_failures_are_classified() -> Result<()> {
	let bytes = common::hello_class();
	let options = Options::default();

	let mut bad_magic = bytes.clone();
	bad_magic[0] = 0xCB;
	assert_eq!(codec_error(decode(&bad_magic, &options)), Some(CodecError::BadMagic { found: 0xCBFE_BABE }));

	let truncated = &bytes[..bytes.len() - 3];
	assert!(matches!(codec_error(decode(truncated, &options)), Some(CodecError::Truncated { .. })));

	let old_options = Options::default().with_max_version(Version::V1_7);
	assert_eq!(
		codec_error(decode(&bytes, &old_options)),
		Some(CodecError::UnsupportedVersion { major: 52, minor: 0, offset: 4 })
	);

	let code_start = bytes.windows(5)
		.position(|window| window == [0x2a, 0xb7, 0x00, 0x01, 0xb1])
		.unwrap_or_default();
	let mut bad_opcode = bytes.clone();
	bad_opcode[code_start + 4] = 0xcb;
	assert!(matches!(codec_error(decode(&bad_opcode, &options)), Some(CodecError::InvalidOpcode { opcode: 0xcb, .. })));

	let mut bad_index = bytes.clone();
	bad_index[code_start + 3] = 0x30;
	assert!(matches!(codec_error(decode(&bad_index, &options)), Some(CodecError::IndexOutOfRange { index: 0x30, .. })));

	let mut wrong_kind = bytes;
	wrong_kind[code_start + 3] = 0x02;
	assert!(matches!(codec_error(decode(&wrong_kind, &options)), Some(CodecError::WrongEntryKind { index: 2, .. })));
	Ok(())
}

#[test]
fn opaque_attributes_are_kept_verbatim() -> Result<()> {
	let bytes = common::hello_class();
	let options = Options::default().with_opaque_attribute("LineNumberTable");

	let class = decode(&bytes, &options)?;
	let code = class.methods[0].code.clone().unwrap_or_default();
	assert_eq!(code.line_numbers, None);
	assert_eq!(code.attributes.len(), 1);
	assert_eq!(code.attributes[0].bytes, vec![0, 1, 0, 0, 0, 1]);

	let written = encode(&class, &options)?;
	assert_eq!(written.len(), bytes.len());
	assert_eq!(decode(&written, &options)?, class);
	Ok(())
}

#[test]
fn encoding_is_all_or_nothing() -> Result<()> {
	let mut class = common::class("a/Broken", "java/lang/Object")?;
	let mut code = Code::new();
	let nowhere = code.labels.create();
	code.instructions = vec![Instruction::Goto(nowhere)];
	code.max_stack = Some(0);
	code.max_locals = Some(0);
	class.methods.push(common::method(0x0009, "f", "()V", code)?);

	let err = encode(&class, &Options::default().with_target_version(Version::V1_6)).unwrap_err();
	assert_eq!(err.root_cause().downcast_ref::<CodecError>(), Some(&CodecError::UnresolvedLabel { label: nowhere }));
	Ok(())
}

/// `static void f(int x)` jumping over 33000 `nop`s if `x` is zero.
fn far_jump() -> Result<Code> {
	let mut code = Code::new();
	let end = code.labels.create();
	code.instructions.push(Instruction::ILoad(LvIndex { index: 0 }));
	code.instructions.push(Instruction::IfEq(end));
	code.instructions.extend(std::iter::repeat(Instruction::Nop).take(33000));
	code.instructions.push(Instruction::Return);
	code.labels.bind(end, 33002)?;
	Ok(code)
}

fn frame_positions(bytes: &[u8]) -> Result<(Vec<Instruction>, Vec<usize>)> {
	let decoded = decode(bytes, &Options::default())?;
	let code = decoded.methods[0].code.clone().unwrap_or_default();
	let frames = code.frames.iter().flatten()
		.map(|(label, _)| code.resolve(*label))
		.collect::<Result<_>>()?;
	Ok((code.instructions[..3].to_vec(), frames))
}

#[test]
fn far_conditional_jumps_get_a_frame_after_the_goto_w() -> Result<()> {
	let mut class = common::class("a/Far", "java/lang/Object")?;
	class.methods.push(common::method(0x0009, "f", "(I)V", far_jump()?)?);

	// `ifeq` is written as `ifne` over a `goto_w`, so the first `nop` is a jump target now
	let options = Options::default().with_compute_frames(true);
	let (start, frames) = frame_positions(&encode(&class, &options)?)?;
	assert!(matches!(start[1], Instruction::IfNe(_)), "{start:?}");
	assert!(matches!(start[2], Instruction::Goto(_)), "{start:?}");
	assert_eq!(frames, vec![3, 33003]);

	// the same with frames that are only kept
	let mut code = far_jump()?;
	let end = code.label_at(33002);
	code.frames = Some(vec![(end, StackMapData::Same)]);
	code.max_stack = Some(1);
	code.max_locals = Some(1);
	class.methods[0].code = Some(code);
	let (_, frames) = frame_positions(&encode(&class, &Options::default())?)?;
	assert_eq!(frames, vec![3, 33003]);
	Ok(())
}
