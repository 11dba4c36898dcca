use anyhow::{bail, Result};
use java_string::JavaString;
use crate::analysis::frame::{array_of, Frame, InitState, Value};
use crate::error::AnalysisError;
use crate::tree::class::ClassName;
use crate::tree::descriptor::Type;
use crate::tree::method::code::{Instruction, Loadable};
use crate::tree::method::MethodRef;

/// The values of the different kinds of operands, used as the expected value of a pop.
const INT: Value = Value::Integer;
const FLOAT: Value = Value::Float;
const LONG: Value = Value::Long;
const DOUBLE: Value = Value::Double;

fn reference() -> Value {
	Value::Object(ClassName::java_lang_object())
}

fn object(name: &str) -> Value {
	Value::Object(ClassName::from_inner_unchecked(JavaString::from(name)))
}

fn loadable_value(loadable: &Loadable) -> Result<Value> {
	Ok(match loadable {
		Loadable::Integer(_) => Value::Integer,
		Loadable::Float(_) => Value::Float,
		Loadable::Long(_) => Value::Long,
		Loadable::Double(_) => Value::Double,
		Loadable::Class(_) => object("java/lang/Class"),
		Loadable::String(_) => object("java/lang/String"),
		Loadable::MethodHandle(_) => object("java/lang/invoke/MethodHandle"),
		Loadable::MethodType(_) => object("java/lang/invoke/MethodType"),
		Loadable::Dynamic(dynamic) => Value::from_type(&dynamic.descriptor.parse()?),
	})
}

/// Executes the instructions of one method on frames, following the type rules of the JVM.
pub(crate) struct Interpreter<'a> {
	/// The class the method is in, the type of an initialized `this`.
	pub(crate) this_class: &'a ClassName,
	/// All instructions of the code, to find the class of a `new` instruction.
	pub(crate) instructions: &'a [Instruction],
}

impl Interpreter<'_> {
	fn invoke(&self, index: usize, frame: &mut Frame, method: &MethodRef, has_receiver: bool, is_special: bool) -> Result<()> {
		let descriptor = method.desc.parse()?;
		for parameter in descriptor.parameter_descriptors.iter().rev() {
			frame.pop_expecting(index, &Value::from_type(parameter))?;
		}
		if has_receiver {
			let receiver = frame.pop_reference(index)?;
			if is_special && method.name.is_init() {
				let initialized = match &receiver {
					Value::UninitializedThis => {
						frame.init = InitState::Initialized;
						Value::Object(self.this_class.clone())
					},
					Value::Uninitialized(site) => match self.instructions.get(*site) {
						Some(Instruction::New(class)) => Value::Object(class.clone()),
						_ => Value::Object(method.class.clone()),
					},
					_ => bail!(AnalysisError::TypeMismatch { index }),
				};
				frame.initialize(&receiver, &initialized);
			}
		}
		if let Some(return_type) = &descriptor.return_descriptor {
			frame.push(Value::from_type(return_type));
		}
		Ok(())
	}

	fn binary(index: usize, frame: &mut Frame, kind: &Value) -> Result<()> {
		frame.pop_expecting(index, kind)?;
		frame.pop_expecting(index, kind)?;
		frame.push(kind.clone());
		Ok(())
	}

	fn convert(index: usize, frame: &mut Frame, from: &Value, to: Value) -> Result<()> {
		frame.pop_expecting(index, from)?;
		frame.push(to);
		Ok(())
	}

	fn array_load(index: usize, frame: &mut Frame, element: Value) -> Result<()> {
		frame.pop_expecting(index, &INT)?;
		frame.pop_reference(index)?;
		frame.push(element);
		Ok(())
	}

	fn array_store(index: usize, frame: &mut Frame, element: &Value) -> Result<()> {
		frame.pop_expecting(index, element)?;
		frame.pop_expecting(index, &INT)?;
		frame.pop_reference(index)?;
		Ok(())
	}

	/// Changes the frame given from the state before to the state after the instruction at `index`.
	pub(crate) fn execute(&self, index: usize, instruction: &Instruction, frame: &mut Frame) -> Result<()> {
		use Instruction as I;
		match instruction {
			I::Nop => {},
			I::AConstNull => frame.push(Value::Null),
			I::IConstM1 | I::IConst0 | I::IConst1 | I::IConst2 | I::IConst3 | I::IConst4 | I::IConst5 |
			I::BiPush(_) | I::SiPush(_) => frame.push(Value::Integer),
			I::LConst0 | I::LConst1 => frame.push(Value::Long),
			I::FConst0 | I::FConst1 | I::FConst2 => frame.push(Value::Float),
			I::DConst0 | I::DConst1 => frame.push(Value::Double),
			I::Ldc(loadable) => frame.push(loadable_value(loadable)?),

			I::ILoad(lv) => frame.push(frame.load(index, lv.index, &INT)?),
			I::LLoad(lv) => frame.push(frame.load(index, lv.index, &LONG)?),
			I::FLoad(lv) => frame.push(frame.load(index, lv.index, &FLOAT)?),
			I::DLoad(lv) => frame.push(frame.load(index, lv.index, &DOUBLE)?),
			I::ALoad(lv) => frame.push(frame.load(index, lv.index, &reference())?),

			I::IALoad | I::BALoad | I::CALoad | I::SALoad => Self::array_load(index, frame, Value::Integer)?,
			I::LALoad => Self::array_load(index, frame, Value::Long)?,
			I::FALoad => Self::array_load(index, frame, Value::Float)?,
			I::DALoad => Self::array_load(index, frame, Value::Double)?,
			I::AALoad => {
				frame.pop_expecting(index, &INT)?;
				let array = frame.pop_reference(index)?;
				frame.push(array.array_element());
			},

			I::IStore(lv) => {
				let value = frame.pop_expecting(index, &INT)?;
				frame.store(lv.index, value);
			},
			I::LStore(lv) => {
				let value = frame.pop_expecting(index, &LONG)?;
				frame.store(lv.index, value);
			},
			I::FStore(lv) => {
				let value = frame.pop_expecting(index, &FLOAT)?;
				frame.store(lv.index, value);
			},
			I::DStore(lv) => {
				let value = frame.pop_expecting(index, &DOUBLE)?;
				frame.store(lv.index, value);
			},
			I::AStore(lv) => {
				let value = frame.pop_reference(index)?;
				frame.store(lv.index, value);
			},

			I::IAStore | I::BAStore | I::CAStore | I::SAStore => Self::array_store(index, frame, &INT)?,
			I::LAStore => Self::array_store(index, frame, &LONG)?,
			I::FAStore => Self::array_store(index, frame, &FLOAT)?,
			I::DAStore => Self::array_store(index, frame, &DOUBLE)?,
			I::AAStore => Self::array_store(index, frame, &reference())?,

			I::Pop => { frame.pop_words(index, 1)?; },
			I::Pop2 => { frame.pop_words(index, 2)?; },
			I::Dup => {
				let a = frame.pop_words(index, 1)?;
				frame.push_words(&a);
				frame.push_words(&a);
			},
			I::DupX1 => {
				let a = frame.pop_words(index, 1)?;
				let b = frame.pop_words(index, 1)?;
				frame.push_words(&a);
				frame.push_words(&b);
				frame.push_words(&a);
			},
			I::DupX2 => {
				let a = frame.pop_words(index, 1)?;
				let b = frame.pop_words(index, 2)?;
				frame.push_words(&a);
				frame.push_words(&b);
				frame.push_words(&a);
			},
			I::Dup2 => {
				let a = frame.pop_words(index, 2)?;
				frame.push_words(&a);
				frame.push_words(&a);
			},
			I::Dup2X1 => {
				let a = frame.pop_words(index, 2)?;
				let b = frame.pop_words(index, 1)?;
				frame.push_words(&a);
				frame.push_words(&b);
				frame.push_words(&a);
			},
			I::Dup2X2 => {
				let a = frame.pop_words(index, 2)?;
				let b = frame.pop_words(index, 2)?;
				frame.push_words(&a);
				frame.push_words(&b);
				frame.push_words(&a);
			},
			I::Swap => {
				let a = frame.pop_words(index, 1)?;
				let b = frame.pop_words(index, 1)?;
				frame.push_words(&a);
				frame.push_words(&b);
			},

			I::IAdd | I::ISub | I::IMul | I::IDiv | I::IRem | I::IAnd | I::IOr | I::IXor |
			I::IShl | I::IShr | I::IUShr => Self::binary(index, frame, &INT)?,
			I::LAdd | I::LSub | I::LMul | I::LDiv | I::LRem | I::LAnd | I::LOr | I::LXor => Self::binary(index, frame, &LONG)?,
			I::FAdd | I::FSub | I::FMul | I::FDiv | I::FRem => Self::binary(index, frame, &FLOAT)?,
			I::DAdd | I::DSub | I::DMul | I::DDiv | I::DRem => Self::binary(index, frame, &DOUBLE)?,
			I::LShl | I::LShr | I::LUShr => {
				frame.pop_expecting(index, &INT)?;
				frame.pop_expecting(index, &LONG)?;
				frame.push(Value::Long);
			},
			I::INeg => Self::convert(index, frame, &INT, Value::Integer)?,
			I::LNeg => Self::convert(index, frame, &LONG, Value::Long)?,
			I::FNeg => Self::convert(index, frame, &FLOAT, Value::Float)?,
			I::DNeg => Self::convert(index, frame, &DOUBLE, Value::Double)?,
			I::IInc(lv, _) => {
				frame.load(index, lv.index, &INT)?;
			},

			I::I2L => Self::convert(index, frame, &INT, Value::Long)?,
			I::I2F => Self::convert(index, frame, &INT, Value::Float)?,
			I::I2D => Self::convert(index, frame, &INT, Value::Double)?,
			I::L2I => Self::convert(index, frame, &LONG, Value::Integer)?,
			I::L2F => Self::convert(index, frame, &LONG, Value::Float)?,
			I::L2D => Self::convert(index, frame, &LONG, Value::Double)?,
			I::F2I => Self::convert(index, frame, &FLOAT, Value::Integer)?,
			I::F2L => Self::convert(index, frame, &FLOAT, Value::Long)?,
			I::F2D => Self::convert(index, frame, &FLOAT, Value::Double)?,
			I::D2I => Self::convert(index, frame, &DOUBLE, Value::Integer)?,
			I::D2L => Self::convert(index, frame, &DOUBLE, Value::Long)?,
			I::D2F => Self::convert(index, frame, &DOUBLE, Value::Float)?,
			I::I2B | I::I2C | I::I2S => Self::convert(index, frame, &INT, Value::Integer)?,

			I::LCmp => {
				frame.pop_expecting(index, &LONG)?;
				frame.pop_expecting(index, &LONG)?;
				frame.push(Value::Integer);
			},
			I::FCmpL | I::FCmpG => {
				frame.pop_expecting(index, &FLOAT)?;
				frame.pop_expecting(index, &FLOAT)?;
				frame.push(Value::Integer);
			},
			I::DCmpL | I::DCmpG => {
				frame.pop_expecting(index, &DOUBLE)?;
				frame.pop_expecting(index, &DOUBLE)?;
				frame.push(Value::Integer);
			},

			I::IfEq(_) | I::IfNe(_) | I::IfLt(_) | I::IfGe(_) | I::IfGt(_) | I::IfLe(_) |
			I::TableSwitch { .. } | I::LookupSwitch { .. } => {
				frame.pop_expecting(index, &INT)?;
			},
			I::IfICmpEq(_) | I::IfICmpNe(_) | I::IfICmpLt(_) | I::IfICmpGe(_) | I::IfICmpGt(_) | I::IfICmpLe(_) => {
				frame.pop_expecting(index, &INT)?;
				frame.pop_expecting(index, &INT)?;
			},
			I::IfACmpEq(_) | I::IfACmpNe(_) => {
				frame.pop_reference(index)?;
				frame.pop_reference(index)?;
			},
			I::IfNull(_) | I::IfNonNull(_) => {
				frame.pop_reference(index)?;
			},
			I::Goto(_) => {},
			I::Jsr(_) | I::Ret(_) => bail!(AnalysisError::UnsupportedConstruct { index }),

			I::IReturn => { frame.pop_expecting(index, &INT)?; },
			I::LReturn => { frame.pop_expecting(index, &LONG)?; },
			I::FReturn => { frame.pop_expecting(index, &FLOAT)?; },
			I::DReturn => { frame.pop_expecting(index, &DOUBLE)?; },
			I::AReturn => { frame.pop_reference(index)?; },
			I::Return => {},

			I::GetStatic(field) => frame.push(Value::from_type(&field.desc.parse()?)),
			I::PutStatic(field) => {
				frame.pop_expecting(index, &Value::from_type(&field.desc.parse()?))?;
			},
			I::GetField(field) => {
				frame.pop_reference(index)?;
				frame.push(Value::from_type(&field.desc.parse()?));
			},
			I::PutField(field) => {
				frame.pop_expecting(index, &Value::from_type(&field.desc.parse()?))?;
				frame.pop_reference(index)?;
			},

			I::InvokeVirtual(method) | I::InvokeInterface(method) => self.invoke(index, frame, method, true, false)?,
			I::InvokeSpecial(method, _) => self.invoke(index, frame, method, true, true)?,
			I::InvokeStatic(method, _) => self.invoke(index, frame, method, false, false)?,
			I::InvokeDynamic(dynamic) => {
				let descriptor = dynamic.descriptor.parse()?;
				for parameter in descriptor.parameter_descriptors.iter().rev() {
					frame.pop_expecting(index, &Value::from_type(parameter))?;
				}
				if let Some(return_type) = &descriptor.return_descriptor {
					frame.push(Value::from_type(return_type));
				}
			},

			I::New(_) => frame.push(Value::Uninitialized(index)),
			I::NewArray(array_type) => {
				frame.pop_expecting(index, &INT)?;
				frame.push(Value::Object(array_type.array_class_name()));
			},
			I::ANewArray(class) => {
				frame.pop_expecting(index, &INT)?;
				frame.push(Value::Object(array_of(class)));
			},
			I::MultiANewArray(class, dimensions) => {
				for _ in 0..*dimensions {
					frame.pop_expecting(index, &INT)?;
				}
				frame.push(Value::Object(class.clone()));
			},
			I::ArrayLength => {
				frame.pop_reference(index)?;
				frame.push(Value::Integer);
			},
			I::AThrow | I::MonitorEnter | I::MonitorExit => {
				frame.pop_reference(index)?;
			},
			I::CheckCast(class) => {
				frame.pop_reference(index)?;
				frame.push(Value::Object(class.clone()));
			},
			I::InstanceOf(_) => {
				frame.pop_reference(index)?;
				frame.push(Value::Integer);
			},
		}
		Ok(())
	}
}

/// The value the local variables of a method start with.
pub(crate) fn entry_locals(this_class: &ClassName, is_static: bool, is_constructor: bool, parameters: &[Type]) -> Vec<Value> {
	let mut locals = Vec::new();
	if !is_static {
		locals.push(if is_constructor {
			Value::UninitializedThis
		} else {
			Value::Object(this_class.clone())
		});
	}
	for parameter in parameters {
		let value = Value::from_type(parameter);
		let wide = value.is_wide();
		locals.push(value);
		if wide {
			locals.push(Value::Top);
		}
	}
	locals
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::analysis::frame::{Frame, InitState, Value};
	use crate::analysis::interpreter::Interpreter;
	use crate::error::AnalysisError;
	use crate::tree::class::ClassName;
	use crate::tree::method::code::{Instruction, LvIndex};
	use crate::tree::method::MethodRef;

	fn run(instructions: &[Instruction], this: &ClassName, mut frame: Frame) -> Result<Frame> {
		let interpreter = Interpreter { this_class: this, instructions };
		for (index, instruction) in instructions.iter().enumerate() {
			interpreter.execute(index, instruction, &mut frame)?;
		}
		Ok(frame)
	}

	#[test]
	fn new_and_constructor() -> Result<()> {
		let this = ClassName::try_from("a/B")?;
		let sb = ClassName::try_from("java/lang/StringBuilder")?;
		let instructions = vec![
			Instruction::New(sb.clone()),
			Instruction::Dup,
			Instruction::InvokeSpecial(MethodRef {
				class: sb.clone(),
				name: "<init>".try_into()?,
				desc: "()V".try_into()?,
			}, false),
			Instruction::AStore(LvIndex { index: 1 }),
		];
		let frame = run(&instructions, &this, Frame { locals: vec![Value::Object(this.clone())], stack: vec![], init: InitState::Initialized })?;
		assert_eq!(frame.locals, vec![Value::Object(this), Value::Object(sb)]);
		assert!(frame.stack.is_empty());
		Ok(())
	}

	#[test]
	fn super_constructor_initializes_this() -> Result<()> {
		let this = ClassName::try_from("a/B")?;
		let instructions = vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeSpecial(MethodRef {
				class: ClassName::java_lang_object(),
				name: "<init>".try_into()?,
				desc: "()V".try_into()?,
			}, false),
		];
		let frame = run(&instructions, &this, Frame { locals: vec![Value::UninitializedThis], stack: vec![], init: InitState::NotInitialized })?;
		assert_eq!(frame.locals, vec![Value::Object(this)]);
		assert_eq!(frame.init, InitState::Initialized);
		Ok(())
	}

	#[test]
	fn stack_shuffling() -> Result<()> {
		let this = ClassName::try_from("a/B")?;
		let instructions = vec![Instruction::LConst1, Instruction::IConst0, Instruction::DupX2, Instruction::Pop, Instruction::Dup2X1];
		let frame = run(&instructions, &this, Frame { locals: vec![], stack: vec![], init: InitState::Initialized })?;
		assert_eq!(frame.stack, vec![Value::Long, Value::Integer, Value::Long]);
		assert_eq!(frame.stack_size(), 5);
		Ok(())
	}

	#[test]
	fn type_errors() -> Result<()> {
		let this = ClassName::try_from("a/B")?;
		let empty = Frame { locals: vec![], stack: vec![], init: InitState::Initialized };

		let err = run(&[Instruction::IAdd], &this, empty.clone()).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::StackUnderflow { index: 0 }));

		let err = run(&[Instruction::FConst0, Instruction::IConst0, Instruction::IAdd], &this, empty.clone()).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::TypeMismatch { index: 2 }));

		let err = run(&[Instruction::ILoad(LvIndex { index: 3 })], &this, empty.clone()).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::InvalidLocal { index: 0, local: 3 }));

		let err = run(&[Instruction::LConst0, Instruction::Pop], &this, empty).unwrap_err();
		assert_eq!(err.downcast_ref::<AnalysisError>(), Some(&AnalysisError::TypeMismatch { index: 1 }));
		Ok(())
	}
}
