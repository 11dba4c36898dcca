mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use loom::analysis::analyze;
use loom::error::{AnalysisError, CodecError};
use loom::inline::{inline, inline_method};
use loom::tree::method::code::{Code, Exception, Instruction, LvIndex};
use loom::tree::version::Version;
use loom::{decode, encode, ClassHierarchy, Options};

fn lv(index: u16) -> LvIndex {
	LvIndex { index }
}

#[test]
fn nested_subroutines() -> Result<()> {
	let mut code = Code::new();
	let outer = code.label_at(3);
	let inner = code.label_at(6);
	code.instructions = vec![
		Instruction::Jsr(outer),
		Instruction::Jsr(outer),
		Instruction::Return,
		Instruction::AStore(lv(0)),
		Instruction::Jsr(inner),
		Instruction::Ret(lv(0)),
		Instruction::AStore(lv(1)),
		Instruction::IConst0,
		Instruction::Pop,
		Instruction::Ret(lv(1)),
	];

	let inlined = inline(&code)?;
	assert!(!inlined.has_subroutines());
	// the main body, plus two copies of each subroutine
	assert_eq!(inlined.instructions.len(), 3 + 2 * 3 + 2 * 4);
	assert_eq!(inlined.instructions.iter().filter(|&i| *i == Instruction::IConst0).count(), 2);

	assert_eq!(common::listing(&inlined)?, vec![
		"Goto -> [3]", "Goto -> [6]", "Return",
		"Nop", "Goto -> [9]", "Goto -> [1]",
		"Nop", "Goto -> [13]", "Goto -> [2]",
		"Nop", "IConst0", "Pop", "Goto -> [5]",
		"Nop", "IConst0", "Pop", "Goto -> [8]",
	]);
	Ok(())
}

#[test]
fn try_finally_of_old_compilers() -> Result<()> {
	// static void f() { try { a(); } finally { b(); } }, as javac 1.4 compiles it
	let mut code = Code::new();
	let start = code.label_at(0);
	let end = code.label_at(1);
	let handler = code.label_at(3);
	let finally = code.label_at(7);
	code.instructions = vec![
		common::invoke_static("a/C", "a", "()V")?,
		Instruction::Jsr(finally),
		Instruction::Return,
		Instruction::AStore(lv(0)),
		Instruction::Jsr(finally),
		Instruction::ALoad(lv(0)),
		Instruction::AThrow,
		Instruction::AStore(lv(1)),
		common::invoke_static("a/C", "b", "()V")?,
		Instruction::Ret(lv(1)),
	];
	code.exception_table.push(Exception { start, end, handler, catch: None });
	code.line_numbers = Some(vec![(start, 1), (finally, 3)]);
	code.max_stack = Some(1);
	code.max_locals = Some(2);

	let mut class = common::class("a/C", "java/lang/Object")?;
	class.version = Version::V1_4;
	class.methods.push(common::method(0x0008, "f", "()V", code)?);

	// frames can't be computed for subroutines
	let err = analyze(&class, &class.methods[0], &ClassHierarchy::new()).unwrap_err();
	assert_eq!(err.root_cause().downcast_ref::<AnalysisError>(), Some(&AnalysisError::UnsupportedConstruct { index: 1 }));

	// and they can't be written for newer versions
	let err = encode(&class, &Options::default().with_target_version(Version::V1_8)).unwrap_err();
	assert!(matches!(err.root_cause().downcast_ref::<CodecError>(), Some(CodecError::IllegalForVersion { major: 52, .. })));

	assert!(inline_method(&mut class.methods[0])?);
	assert!(!inline_method(&mut class.methods[0])?);
	let code = class.methods[0].code.clone().unwrap_or_default();
	assert_eq!(code.instructions.len(), 7 + 2 * 3);
	assert_eq!(code.exception_table.len(), 1);
	let lines: Vec<_> = code.line_numbers.iter().flatten()
		.map(|&(label, line)| -> Result<(usize, u16)> { Ok((code.resolve(label)?, line)) })
		.collect::<Result<_>>()?;
	assert_eq!(lines, vec![(0, 1), (7, 3), (10, 3)]);

	// the return address isn't stored anymore
	let analysis = analyze(&class, &class.methods[0], &ClassHierarchy::new())?;
	assert_eq!(analysis.max_locals, 1);

	let options = Options::default()
		.with_target_version(Version::V1_8)
		.with_compute_frames(true);
	let bytes = encode(&class, &options)?;
	let decoded = decode(&bytes, &Options::default())?;
	assert_eq!(decoded.version, Version::V1_8);
	let decoded_code = decoded.methods[0].code.clone().unwrap_or_default();
	assert!(!decoded_code.has_subroutines());
	assert!(decoded_code.frames.is_some());
	Ok(())
}
