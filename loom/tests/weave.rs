mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use loom::analysis::analyze;
use loom::tree::class::ClassName;
use loom::tree::method::code::{Code, Instruction, LvIndex};
use loom::tree::method::MethodRef;
use loom::weave::weave;
use loom::{decode, encode, ClassHierarchy, Options};

/// The start, end and handler of every entry of the exception table.
fn ranges(code: &Code) -> Result<Vec<(usize, usize, usize)>> {
	code.exception_table.iter()
		.map(|exception| -> Result<(usize, usize, usize)> {
			Ok((code.resolve(exception.start)?, code.resolve(exception.end)?, code.resolve(exception.handler)?))
		})
		.collect()
}

#[test]
fn two_super_calls_reaching_one_return() -> Result<()> {
	// B(boolean x) { if (x) super(); else super(1); }
	let mut code = Code::new();
	let other = code.label_at(5);
	let end = code.label_at(8);
	code.instructions = vec![
		Instruction::ILoad(LvIndex { index: 1 }),
		Instruction::IfEq(other),
		Instruction::ALoad(LvIndex { index: 0 }),
		common::invoke_special("a/A", "<init>", "()V")?,
		Instruction::Goto(end),
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::IConst1,
		common::invoke_special("a/A", "<init>", "(I)V")?,
		Instruction::Return,
	];
	let mut class = common::class("a/B", "a/A")?;
	class.methods.push(common::method(0x0001, "<init>", "(Z)V", code)?);

	let on_enter = [Instruction::ALoad(LvIndex { index: 0 }), common::invoke_static("a/Hooks", "enter", "(Ljava/lang/Object;)V")?];
	let on_exit = [common::invoke_static("a/Hooks", "exit", "()V")?];
	let woven = weave(&class, &class.methods[0], &on_enter, &on_exit, &ClassHierarchy::new())?;

	assert_eq!(woven.enter_points, vec![8]);
	assert_eq!(woven.exit_points, vec![10]);

	let code = woven.method.code.clone().unwrap_or_default();
	assert_eq!(common::listing(&code)?[4], "Goto -> [8]");
	assert_eq!(code.instructions[8..12], [on_enter[0].clone(), on_enter[1].clone(), on_exit[0].clone(), Instruction::Return]);
	assert_eq!(code.instructions.iter().filter(|&i| *i == on_enter[1]).count(), 1);
	// once before the return, once in the handler for exceptions
	assert_eq!(code.instructions.iter().filter(|&i| *i == on_exit[0]).count(), 2);
	assert_eq!(woven.exception_exit, Some(12));

	// the woven method is still valid, and can be written with new frames
	class.methods[0] = woven.method;
	analyze(&class, &class.methods[0], &ClassHierarchy::new())?;
	let bytes = encode(&class, &Options::default().with_compute_frames(true))?;
	let decoded = decode(&bytes, &Options::default())?;
	assert_eq!(decoded.methods[0].code.as_ref().map(|code| code.instructions.len()), Some(14));
	Ok(())
}

#[test]
fn athrow_after_initialization_goes_through_the_handler() -> Result<()> {
	// B(int x) { super(); if (x == 0) throw null; }
	let mut code = Code::new();
	let end = code.label_at(6);
	code.instructions = vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		common::invoke_special("a/A", "<init>", "()V")?,
		Instruction::ILoad(LvIndex { index: 1 }),
		Instruction::IfNe(end),
		Instruction::AConstNull,
		Instruction::AThrow,
		Instruction::Return,
	];
	let mut class = common::class("a/B", "a/A")?;
	class.methods.push(common::method(0x0001, "<init>", "(I)V", code)?);

	let on_exit = [Instruction::Nop];
	let woven = weave(&class, &class.methods[0], &[], &on_exit, &ClassHierarchy::new())?;
	assert_eq!(woven.enter_points, vec![2]);
	assert_eq!(woven.exit_points, vec![6]);
	assert_eq!(woven.exception_exit, Some(8));

	let code = woven.method.code.clone().unwrap_or_default();
	assert_eq!(code.instructions.len(), 10);
	assert_eq!(ranges(&code)?, vec![(2, 6, 8)]);
	Ok(())
}

#[test]
fn loop_behind_a_goto_chain_runs_the_enter_advice_once() -> Result<()> {
	// B(int n) { super(); do { n--; } while (n != 0); }, with the jump into the loop going through its head
	let mut code = Code::new();
	let head = code.label_at(3);
	let body = code.label_at(4);
	code.instructions = vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		common::invoke_special("a/A", "<init>", "()V")?,
		Instruction::Goto(head),
		Instruction::Goto(body),
		Instruction::IInc(LvIndex { index: 1 }, -1),
		Instruction::ILoad(LvIndex { index: 1 }),
		Instruction::IfNe(head),
		Instruction::Return,
	];
	let mut class = common::class("a/B", "a/A")?;
	class.methods.push(common::method(0x0001, "<init>", "(I)V", code)?);

	let on_enter = [common::invoke_static("a/Hooks", "enter", "()V")?];
	let on_exit = [common::invoke_static("a/Hooks", "exit", "()V")?];
	let woven = weave(&class, &class.methods[0], &on_enter, &on_exit, &ClassHierarchy::new())?;
	assert_eq!(woven.enter_points, vec![4]);
	assert_eq!(woven.exit_points, vec![8]);

	let code = woven.method.code.clone().unwrap_or_default();
	let listing = common::listing(&code)?;
	// only the jump right after the call reaches the advice, the loop goes back past it
	assert_eq!(listing[2], "Goto -> [4]");
	assert_eq!(listing[3], "Goto -> [5]");
	assert_eq!(listing[7], "IfNe -> [3]");
	assert_eq!(code.instructions[4], on_enter[0]);
	assert_eq!(code.instructions.iter().filter(|&i| *i == on_enter[0]).count(), 1);
	// the handler covers the loop, but neither copy of the advice
	assert_eq!(woven.exception_exit, Some(10));
	assert_eq!(ranges(&code)?, vec![(2, 4, 10), (5, 8, 10)]);

	class.methods[0] = woven.method;
	analyze(&class, &class.methods[0], &ClassHierarchy::new())?;
	Ok(())
}

#[test]
fn calls_after_initialization_run_the_exit_advice_when_they_throw() -> Result<()> {
	// B(int x) { super(); run(); }
	let mut code = Code::new();
	let original = code.labels.create();
	code.instructions = vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		common::invoke_special("a/A", "<init>", "()V")?,
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::InvokeVirtual(MethodRef {
			class: ClassName::try_from("a/B")?,
			name: "run".try_into()?,
			desc: "()V".try_into()?,
		}),
		Instruction::Return,
		Instruction::AStore(LvIndex { index: 2 }),
		Instruction::ALoad(LvIndex { index: 2 }),
		Instruction::AThrow,
	];
	// a handler of the method itself, for the call
	let start = code.label_at(3);
	let end = code.label_at(4);
	code.labels.bind(original, 5)?;
	code.exception_table.push(loom::tree::method::code::Exception {
		start,
		end,
		handler: original,
		catch: Some(ClassName::try_from("java/lang/IllegalStateException")?),
	});
	let mut class = common::class("a/B", "a/A")?;
	class.methods.push(common::method(0x0001, "<init>", "(I)V", code)?);

	let on_enter = [common::invoke_static("a/Hooks", "enter", "()V")?];
	let on_exit = [common::invoke_static("a/Hooks", "exit", "()V")?];
	let woven = weave(&class, &class.methods[0], &on_enter, &on_exit, &ClassHierarchy::new())?;
	assert_eq!(woven.enter_points, vec![2]);
	assert_eq!(woven.exit_points, vec![5]);
	assert_eq!(woven.exception_exit, Some(10));

	let code = woven.method.code.clone().unwrap_or_default();
	assert_eq!(code.instructions[10..], [on_exit[0].clone(), Instruction::AThrow]);
	// the call is covered by the handler of the method first, everything but the advice by the new one
	assert_eq!(ranges(&code)?, vec![(4, 5, 7), (3, 5, 10), (7, 10, 10)]);
	assert_eq!(code.exception_table.last().and_then(|exception| exception.catch.clone()), None);

	class.methods[0] = woven.method;
	let bytes = encode(&class, &Options::default().with_compute_frames(true))?;
	let decoded = decode(&bytes, &Options::default())?;
	let decoded_code = decoded.methods[0].code.clone().unwrap_or_default();
	assert_eq!(ranges(&decoded_code)?, ranges(&code)?);
	Ok(())
}
