use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaStr;
use log::debug;
use crate::class_constants::{attribute, opcode, type_annotation, verification_type};
use crate::class_reader::labels::Labels;
use crate::class_reader::pool::{BootstrapMethodRead, PoolIndex, PoolRead, ReadPoolIndex};
use crate::{class_constants, ClassRead, OptionExpansion};
use crate::error::CodecError;
use crate::options::Options;
use crate::tree::annotation::{Annotation, ElementValue, ElementValuePair, Object};
use crate::tree::attribute::Attribute;
use crate::tree::class::{ClassAccess, ClassFile, EnclosingMethod, InnerClass};
use crate::tree::field::{Field, FieldAccess};
use crate::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName, MethodParameter};
use crate::tree::method::code::{ArrayType, Code, Exception, Instruction, Label, Lv, LvIndex};
use crate::tree::method::frame::{StackMapData, VerificationTypeInfo};
use crate::tree::module::{Module, ModuleExports, ModuleOpens, ModuleProvides, ModuleRequires};
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::{TargetInfoClass, TargetInfoField, TargetInfoMethod, TypeAnnotation, TypePath, TypePathKind};
use crate::tree::version::Version;
use crate::visitor::{self, ClassEvent, ClassSink};

pub(crate) mod pool;
mod labels;

/// How deep annotations may be nested inside each other.
const MAX_ANNOTATION_DEPTH: u32 = 64;

/// Skips the `attributes_count` and `attributes` items of the structs.
///
/// This is needed whenever we skip reading something, like a field or method.
fn skip_attributes(reader: &mut impl ClassRead) -> Result<()> {
	let attributes_count = reader.read_u16()?;

	for _ in 0..attributes_count {
		let _attribute_name_index = reader.read_u16()?;
		let attribute_length = reader.read_u32()?;

		reader.skip(attribute_length as i64)?;
	}

	Ok(())
}

/// Reads the `attributes_count` and `attributes` items.
///
/// For each attribute `decode` gets called with the reader placed at the start of the attribute body, the
/// attribute name, the attribute length and the byte offset of the attribute. It returns `false` without reading
/// anything if it doesn't know the attribute. Such attributes, and the ones configured as opaque, are returned as
/// raw bytes.
fn read_attributes<R: ClassRead>(
	reader: &mut R,
	pool: &PoolRead,
	options: &Options,
	mut decode: impl FnMut(&mut R, &JavaStr, u32, u64) -> Result<bool>,
) -> Result<Vec<Attribute>> {
	let mut raw = Vec::new();

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let offset = reader.marker()?;
		let name = pool.get_utf8_ref(reader.read_pool_index()?)?;
		let length = reader.read_u32()?;
		let start = reader.marker()?;

		let opaque = options.is_opaque(name) && !matches!(name.as_str(), Ok(attribute::BOOTSTRAP_METHODS));
		if opaque || !decode(reader, name, length, offset)? {
			let bytes = reader.read_u8_vec(length as usize)?;
			raw.push(Attribute { name: name.to_owned(), bytes });
		}

		if reader.marker()? != start + length as u64 {
			bail!(CodecError::Malformed { reason: "attribute length doesn't match its contents", offset });
		}
	}

	Ok(raw)
}

/// Reads a class file, pushing its events into the sink.
pub(crate) fn read<S: ClassSink>(reader: &mut impl ClassRead, options: &Options, mut sink: S) -> Result<S::Output> {
	let magic = reader.read_u32()?;
	if magic != class_constants::MAGIC {
		bail!(CodecError::BadMagic { found: magic });
	}

	let minor = reader.read_u16()?;
	let major = reader.read_u16()?;
	let version = Version::new(major, minor);

	if version > options.max_version {
		bail!(CodecError::UnsupportedVersion { major, minor, offset: 4 });
	}

	let mut pool = PoolRead::read(reader)?;

	let access = ClassAccess::from(reader.read_u16()?);
	let name = pool.get_class(reader.read_pool_index()?)?;
	let super_class = pool.get_optional(reader.read_pool_index()?, PoolRead::get_class)?;
	let interfaces = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| pool.get_class(r.read_pool_index()?)
	)?;

	// The bootstrap methods are a class attribute, but are needed to read the code and the constant values of fields.
	// So we skip the fields and methods, read the attributes of the class itself and come back afterward.
	let fields_start = reader.marker()?;

	for _ in 0..reader.read_u16()? {
		// access flags, name and descriptor
		reader.skip(2 + 2 + 2)?;
		skip_attributes(reader)?;
	}
	// Methods have the same structure as fields.
	for _ in 0..reader.read_u16()? {
		reader.skip(2 + 2 + 2)?;
		skip_attributes(reader)?;
	}

	let mut class = ClassFile::new(version, access, name.clone(), super_class, interfaces);
	let mut bootstrap_methods = None;
	class.attributes = read_class_attributes(reader, &pool, options, &mut class, &mut bootstrap_methods)
		.with_context(|| anyhow!("failed to read attributes of class {name:?}"))?;
	pool.bootstrap_methods = bootstrap_methods;

	let end = reader.marker()?;
	if reader.read_u8().is_ok() {
		bail!(CodecError::Malformed { reason: "unexpected data after the end of the class", offset: end });
	}

	sink.accept(ClassEvent::BeginClass(Box::new(class)))?;

	reader.with_pos(fields_start, |reader| {
		let fields_count = reader.read_u16()?;
		for _ in 0..fields_count {
			let field = read_field(reader, &pool, options)
				.with_context(|| anyhow!("failed to read field of class {name:?}"))?;
			sink.accept(ClassEvent::Field(Box::new(field)))?;
		}

		let methods_count = reader.read_u16()?;
		for _ in 0..methods_count {
			let method = read_method(reader, &pool, options)
				.with_context(|| anyhow!("failed to read method of class {name:?}"))?;
			let (method_name, descriptor) = (method.name.clone(), method.descriptor.clone());
			visitor::emit_method(method, &mut sink)
				.with_context(|| anyhow!("failed to visit method {method_name:?} {descriptor:?} of class {name:?}"))?;
		}

		Ok(())
	})?;

	sink.accept(ClassEvent::EndClass)?;
	sink.finish()
}

fn read_class_attributes<R: ClassRead>(
	reader: &mut R,
	pool: &PoolRead,
	options: &Options,
	class: &mut ClassFile,
	bootstrap_methods: &mut Option<Vec<BootstrapMethodRead>>,
) -> Result<Vec<Attribute>> {
	read_attributes(reader, pool, options, |reader, name, _, offset| {
		match name.as_str() {
			Ok(attribute::DEPRECATED) => class.has_deprecated_attribute = true,
			Ok(attribute::SYNTHETIC) => class.has_synthetic_attribute = true,
			Ok(attribute::INNER_CLASSES) => {
				let inner_classes = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| Ok(InnerClass {
						inner_class: pool.get_class(r.read_pool_index()?)?,
						outer_class: pool.get_optional(r.read_pool_index()?, PoolRead::get_class)?,
						inner_name: pool.get_optional(r.read_pool_index()?, PoolRead::get_utf8)?,
						flags: r.read_u16()?.into(),
					})
				)?;
				class.inner_classes.insert_if_empty(inner_classes, offset)?;
			},
			Ok(attribute::ENCLOSING_METHOD) => {
				let enclosing_method = EnclosingMethod {
					class: pool.get_class(reader.read_pool_index()?)?,
					method: pool.get_optional(reader.read_pool_index()?, PoolRead::get_name_and_type::<MethodName, MethodDescriptor>)?,
				};
				class.enclosing_method.insert_if_empty(enclosing_method, offset)?;
			},
			Ok(attribute::SIGNATURE) => {
				let signature = pool.get_name(reader.read_pool_index()?, "invalid class signature")?;
				class.signature.insert_if_empty(signature, offset)?;
			},
			Ok(attribute::SOURCE_FILE) => {
				let source_file = pool.get_utf8(reader.read_pool_index()?)?;
				class.source_file.insert_if_empty(source_file, offset)?;
			},
			Ok(attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
				class.runtime_visible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_ANNOTATIONS) => {
				class.runtime_invisible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS) => {
				class.runtime_visible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS) => {
				class.runtime_invisible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::MODULE) => {
				let module = read_module(reader, pool)?;
				class.module.insert_if_empty(module, offset)?;
			},
			Ok(attribute::MODULE_PACKAGES) => {
				let module_packages = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_package(r.read_pool_index()?)
				)?;
				class.module_packages.insert_if_empty(module_packages, offset)?;
			},
			Ok(attribute::MODULE_MAIN_CLASS) => {
				let module_main_class = pool.get_class(reader.read_pool_index()?)?;
				class.module_main_class.insert_if_empty(module_main_class, offset)?;
			},
			Ok(attribute::NEST_HOST) => {
				let nest_host_class = pool.get_class(reader.read_pool_index()?)?;
				class.nest_host_class.insert_if_empty(nest_host_class, offset)?;
			},
			Ok(attribute::NEST_MEMBERS) => {
				let nest_members = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_pool_index()?)
				)?;
				class.nest_members.insert_if_empty(nest_members, offset)?;
			},
			Ok(attribute::PERMITTED_SUBCLASSES) => {
				let permitted_subclasses = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_pool_index()?)
				)?;
				class.permitted_subclasses.insert_if_empty(permitted_subclasses, offset)?;
			},
			Ok(attribute::RECORD) => {
				let components = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| read_record_component(r, pool, options)
				)?;
				class.record_components.insert_if_empty(components, offset)?;
			},
			Ok(attribute::BOOTSTRAP_METHODS) => {
				let methods = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| Ok(BootstrapMethodRead {
						handle: pool.get_method_handle(r.read_pool_index()?)?,
						arguments: r.read_vec(|r| r.read_u16_as_usize(), |r| r.read_pool_index())?,
					})
				)?;
				bootstrap_methods.insert_if_empty(methods, offset)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	})
}

fn read_field(reader: &mut impl ClassRead, pool: &PoolRead, options: &Options) -> Result<Field> {
	let access = FieldAccess::from(reader.read_u16()?);
	let name = pool.get_name(reader.read_pool_index()?, "invalid field name")?;
	let descriptor = pool.get_name(reader.read_pool_index()?, "invalid field descriptor")?;

	let mut field = Field::new(access, name, descriptor);

	let attributes = read_attributes(reader, pool, options, |reader, name, _, offset| {
		match name.as_str() {
			Ok(attribute::DEPRECATED) => field.has_deprecated_attribute = true,
			Ok(attribute::SYNTHETIC) => field.has_synthetic_attribute = true,
			Ok(attribute::CONSTANT_VALUE) => {
				let constant_value = pool.get_constant_value(reader.read_pool_index()?)?;
				field.constant_value.insert_if_empty(constant_value, offset)?;
			},
			Ok(attribute::SIGNATURE) => {
				let signature = pool.get_name(reader.read_pool_index()?, "invalid field signature")?;
				field.signature.insert_if_empty(signature, offset)?;
			},
			Ok(attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
				field.runtime_visible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_ANNOTATIONS) => {
				field.runtime_invisible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS) => {
				field.runtime_visible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS) => {
				field.runtime_invisible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			_ => return Ok(false),
		}
		Ok(true)
	}).with_context(|| anyhow!("failed to read attributes of field {:?} {:?}", field.name, field.descriptor))?;
	field.attributes = attributes;

	Ok(field)
}

fn read_method(reader: &mut impl ClassRead, pool: &PoolRead, options: &Options) -> Result<Method> {
	let access = MethodAccess::from(reader.read_u16()?);
	let name: MethodName = pool.get_name(reader.read_pool_index()?, "invalid method name")?;
	let descriptor: MethodDescriptor = pool.get_name(reader.read_pool_index()?, "invalid method descriptor")?;

	let mut method = Method::new(access, name.clone(), descriptor.clone());

	let attributes = read_attributes(reader, pool, options, |reader, attribute_name, _, offset| {
		match attribute_name.as_str() {
			Ok(attribute::DEPRECATED) => method.has_deprecated_attribute = true,
			Ok(attribute::SYNTHETIC) => method.has_synthetic_attribute = true,
			Ok(attribute::CODE) => {
				let code = read_code(reader, pool, options)
					.with_context(|| anyhow!("failed to read code of method {name:?} {descriptor:?}"))?;
				method.code.insert_if_empty(code, offset)?;
			},
			Ok(attribute::EXCEPTIONS) => {
				let exceptions = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_pool_index()?)
				)?;
				method.exceptions.insert_if_empty(exceptions, offset)?;
			},
			Ok(attribute::SIGNATURE) => {
				let signature = pool.get_name(reader.read_pool_index()?, "invalid method signature")?;
				method.signature.insert_if_empty(signature, offset)?;
			},
			Ok(attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
				method.runtime_visible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_ANNOTATIONS) => {
				method.runtime_invisible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS) => {
				method.runtime_visible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS) => {
				method.runtime_invisible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS) => {
				let annotations = read_parameter_annotations_attribute(reader, pool)?;
				method.runtime_visible_parameter_annotations.insert_if_empty(annotations, offset)?;
			},
			Ok(attribute::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS) => {
				let annotations = read_parameter_annotations_attribute(reader, pool)?;
				method.runtime_invisible_parameter_annotations.insert_if_empty(annotations, offset)?;
			},
			Ok(attribute::ANNOTATION_DEFAULT) => {
				let value = read_element_value(reader, pool, 0)?;
				method.annotation_default.insert_if_empty(value, offset)?;
			},
			Ok(attribute::METHOD_PARAMETERS) => {
				let parameters = reader.read_vec(
					|r| r.read_u8_as_usize(),
					|r| Ok(MethodParameter {
						name: pool.get_optional(r.read_pool_index()?, PoolRead::get_utf8)?,
						flags: r.read_u16()?.into(),
					})
				)?;
				method.method_parameters.insert_if_empty(parameters, offset)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	}).with_context(|| anyhow!("failed to read attributes of method {:?} {:?}", method.name, method.descriptor))?;
	method.attributes = attributes;

	Ok(method)
}

trait CodeReadHelper: ClassRead {
	fn read_u8_as_lv_index(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u8()? as u16 })
	}

	fn read_u16_as_lv_index(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u16()? })
	}

	fn read_i16_as_branch_target(&mut self, labels: &mut Labels, pc: u32) -> Result<Label> {
		let at = self.marker()?;
		let branch = self.read_i16()?;
		labels.branch(pc, branch as i32, at)
	}

	fn read_i32_as_branch_target(&mut self, labels: &mut Labels, pc: u32) -> Result<Label> {
		let at = self.marker()?;
		let branch = self.read_i32()?;
		labels.branch(pc, branch, at)
	}

	/// Skips the zero to three bytes of padding after a `tableswitch` or `lookupswitch` at `pc`.
	fn skip_switch_padding(&mut self, pc: u32) -> Result<()> {
		let padding = (4 - (pc + 1) % 4) % 4;
		for _ in 0..padding {
			self.read_u8()?;
		}
		Ok(())
	}
}

impl<T: ClassRead> CodeReadHelper for T {}

fn read_code(reader: &mut impl ClassRead, pool: &PoolRead, options: &Options) -> Result<Code> {
	let mut code = Code::new();
	code.max_stack = Some(reader.read_u16()?);
	code.max_locals = Some(reader.read_u16()?);

	let length_offset = reader.marker()?;
	let code_length = reader.read_u32()?;

	// The limit is defined by the Java Virtual Machine Specification.
	if code_length == 0 || code_length > u16::MAX as u32 {
		bail!(CodecError::Malformed { reason: "`code_length` must be greater than zero and less than 65536", offset: length_offset });
	}

	let code_start = reader.marker()?;
	let code_end = code_start + code_length as u64;

	let mut labels = Labels::new(code_length);
	let mut starts = Vec::new();

	while reader.marker()? < code_end {
		let pc = (reader.marker()? - code_start) as u32;
		starts.push(pc);

		let instruction = read_instruction(reader, pool, &mut labels, pc)
			.with_context(|| anyhow!("at bytecode offset {pc}"))?;
		code.instructions.push(instruction);
	}
	if reader.marker()? != code_end {
		bail!(CodecError::Malformed { reason: "the last instruction exceeds `code_length`", offset: code_end });
	}

	code.exception_table = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let at = r.marker()?;
			let start = labels.at(r.read_u16()? as i64, at)?;
			let end = labels.at_or_end(r.read_u16()? as i64, at + 2)?;
			let handler = labels.at(r.read_u16()? as i64, at + 4)?;
			let catch = pool.get_optional(r.read_pool_index()?, PoolRead::get_class)?;
			Ok(Exception { start, end, handler, catch })
		}
	)?;

	let attributes = read_attributes(reader, pool, options, |reader, name, length, offset| {
		match name.as_str() {
			Ok(attribute::STACK_MAP_TABLE) => {
				let frames = read_stack_map_table(reader, pool, &mut labels)?;
				code.frames.insert_if_empty(frames, offset)?;
			},
			Ok(attribute::LINE_NUMBER_TABLE) => {
				let table = code.line_numbers.get_or_insert_with(Vec::new);
				for _ in 0..reader.read_u16()? {
					let at = reader.marker()?;
					let start = labels.at(reader.read_u16()? as i64, at)?;
					let line_number = reader.read_u16()?;
					table.push((start, line_number));
				}
			},
			Ok(attribute::LOCAL_VARIABLE_TABLE) => {
				let table = code.local_variables.get_or_insert_with(Vec::new);
				for _ in 0..reader.read_u16()? {
					let (start, end) = read_range(reader, &mut labels)?;
					table.push(Lv {
						start,
						end,
						name: pool.get_name(reader.read_pool_index()?, "invalid local variable name")?,
						descriptor: Some(pool.get_name(reader.read_pool_index()?, "invalid local variable descriptor")?),
						signature: None,
						index: reader.read_u16_as_lv_index()?,
					});
				}
			},
			Ok(attribute::LOCAL_VARIABLE_TYPE_TABLE) => {
				let table = code.local_variables.get_or_insert_with(Vec::new);
				for _ in 0..reader.read_u16()? {
					let (start, end) = read_range(reader, &mut labels)?;
					table.push(Lv {
						start,
						end,
						name: pool.get_name(reader.read_pool_index()?, "invalid local variable name")?,
						descriptor: None,
						signature: Some(pool.get_name(reader.read_pool_index()?, "invalid local variable signature")?),
						index: reader.read_u16_as_lv_index()?,
					});
				}
			},
			Ok(attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS | attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS) => {
				// These refer to bytecode offsets and constant pool entries, so they can't be kept as raw bytes.
				debug!("dropping {name:?} attribute of code at byte offset {offset}");
				reader.skip(length as i64)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	})?;
	code.attributes = attributes;

	labels.bind(&mut code, &starts)?;

	Ok(code)
}

/// Reads the `start_pc` and `length` items of a local variable table entry.
fn read_range(reader: &mut impl ClassRead, labels: &mut Labels) -> Result<(Label, Label)> {
	let at = reader.marker()?;
	let start_pc = reader.read_u16()? as i64;
	let length = reader.read_u16()? as i64;
	Ok((labels.at(start_pc, at)?, labels.at_or_end(start_pc + length, at)?))
}

fn read_instruction(reader: &mut impl ClassRead, pool: &PoolRead, labels: &mut Labels, pc: u32) -> Result<Instruction> {
	let opcode_offset = reader.marker()?;
	Ok(match reader.read_u8()? {
		opcode::NOP         => Instruction::Nop,
		opcode::ACONST_NULL => Instruction::AConstNull,
		opcode::ICONST_M1   => Instruction::IConstM1,
		opcode::ICONST_0    => Instruction::IConst0,
		opcode::ICONST_1    => Instruction::IConst1,
		opcode::ICONST_2    => Instruction::IConst2,
		opcode::ICONST_3    => Instruction::IConst3,
		opcode::ICONST_4    => Instruction::IConst4,
		opcode::ICONST_5    => Instruction::IConst5,
		opcode::LCONST_0    => Instruction::LConst0,
		opcode::LCONST_1    => Instruction::LConst1,
		opcode::FCONST_0    => Instruction::FConst0,
		opcode::FCONST_1    => Instruction::FConst1,
		opcode::FCONST_2    => Instruction::FConst2,
		opcode::DCONST_0    => Instruction::DConst0,
		opcode::DCONST_1    => Instruction::DConst1,
		opcode::BIPUSH      => Instruction::BiPush(reader.read_i8()?),
		opcode::SIPUSH      => Instruction::SiPush(reader.read_i16()?),
		opcode::LDC => {
			let offset = reader.marker()?;
			let index = reader.read_u8()? as u16;
			read_ldc(pool, PoolIndex { index, offset }, false)?
		},
		opcode::LDC_W  => read_ldc(pool, reader.read_pool_index()?, false)?,
		opcode::LDC2_W => read_ldc(pool, reader.read_pool_index()?, true)?,
		opcode::ILOAD  => Instruction::ILoad(reader.read_u8_as_lv_index()?),
		opcode::LLOAD  => Instruction::LLoad(reader.read_u8_as_lv_index()?),
		opcode::FLOAD  => Instruction::FLoad(reader.read_u8_as_lv_index()?),
		opcode::DLOAD  => Instruction::DLoad(reader.read_u8_as_lv_index()?),
		opcode::ALOAD  => Instruction::ALoad(reader.read_u8_as_lv_index()?),
		op @ opcode::ILOAD_0..=opcode::ALOAD_3 => {
			let shifted = op - opcode::ILOAD_0; // 0..=19
			let index = LvIndex { index: (shifted & 0b11) as u16 };

			match shifted >> 2 {
				0 => Instruction::ILoad(index),
				1 => Instruction::LLoad(index),
				2 => Instruction::FLoad(index),
				3 => Instruction::DLoad(index),
				_ => Instruction::ALoad(index),
			}
		},
		opcode::IALOAD => Instruction::IALoad,
		opcode::LALOAD => Instruction::LALoad,
		opcode::FALOAD => Instruction::FALoad,
		opcode::DALOAD => Instruction::DALoad,
		opcode::AALOAD => Instruction::AALoad,
		opcode::BALOAD => Instruction::BALoad,
		opcode::CALOAD => Instruction::CALoad,
		opcode::SALOAD => Instruction::SALoad,
		opcode::ISTORE => Instruction::IStore(reader.read_u8_as_lv_index()?),
		opcode::LSTORE => Instruction::LStore(reader.read_u8_as_lv_index()?),
		opcode::FSTORE => Instruction::FStore(reader.read_u8_as_lv_index()?),
		opcode::DSTORE => Instruction::DStore(reader.read_u8_as_lv_index()?),
		opcode::ASTORE => Instruction::AStore(reader.read_u8_as_lv_index()?),
		op @ opcode::ISTORE_0..=opcode::ASTORE_3 => {
			let shifted = op - opcode::ISTORE_0; // 0..=19
			let index = LvIndex { index: (shifted & 0b11) as u16 };

			match shifted >> 2 {
				0 => Instruction::IStore(index),
				1 => Instruction::LStore(index),
				2 => Instruction::FStore(index),
				3 => Instruction::DStore(index),
				_ => Instruction::AStore(index),
			}
		},
		opcode::IASTORE => Instruction::IAStore,
		opcode::LASTORE => Instruction::LAStore,
		opcode::FASTORE => Instruction::FAStore,
		opcode::DASTORE => Instruction::DAStore,
		opcode::AASTORE => Instruction::AAStore,
		opcode::BASTORE => Instruction::BAStore,
		opcode::CASTORE => Instruction::CAStore,
		opcode::SASTORE => Instruction::SAStore,
		opcode::POP     => Instruction::Pop,
		opcode::POP2    => Instruction::Pop2,
		opcode::DUP     => Instruction::Dup,
		opcode::DUP_X1  => Instruction::DupX1,
		opcode::DUP_X2  => Instruction::DupX2,
		opcode::DUP2    => Instruction::Dup2,
		opcode::DUP2_X1 => Instruction::Dup2X1,
		opcode::DUP2_X2 => Instruction::Dup2X2,
		opcode::SWAP    => Instruction::Swap,
		opcode::IADD    => Instruction::IAdd,
		opcode::LADD    => Instruction::LAdd,
		opcode::FADD    => Instruction::FAdd,
		opcode::DADD    => Instruction::DAdd,
		opcode::ISUB    => Instruction::ISub,
		opcode::LSUB    => Instruction::LSub,
		opcode::FSUB    => Instruction::FSub,
		opcode::DSUB    => Instruction::DSub,
		opcode::IMUL    => Instruction::IMul,
		opcode::LMUL    => Instruction::LMul,
		opcode::FMUL    => Instruction::FMul,
		opcode::DMUL    => Instruction::DMul,
		opcode::IDIV    => Instruction::IDiv,
		opcode::LDIV    => Instruction::LDiv,
		opcode::FDIV    => Instruction::FDiv,
		opcode::DDIV    => Instruction::DDiv,
		opcode::IREM    => Instruction::IRem,
		opcode::LREM    => Instruction::LRem,
		opcode::FREM    => Instruction::FRem,
		opcode::DREM    => Instruction::DRem,
		opcode::INEG    => Instruction::INeg,
		opcode::LNEG    => Instruction::LNeg,
		opcode::FNEG    => Instruction::FNeg,
		opcode::DNEG    => Instruction::DNeg,
		opcode::ISHL    => Instruction::IShl,
		opcode::LSHL    => Instruction::LShl,
		opcode::ISHR    => Instruction::IShr,
		opcode::LSHR    => Instruction::LShr,
		opcode::IUSHR   => Instruction::IUShr,
		opcode::LUSHR   => Instruction::LUShr,
		opcode::IAND    => Instruction::IAnd,
		opcode::LAND    => Instruction::LAnd,
		opcode::IOR     => Instruction::IOr,
		opcode::LOR     => Instruction::LOr,
		opcode::IXOR    => Instruction::IXor,
		opcode::LXOR    => Instruction::LXor,
		opcode::IINC => {
			let index = reader.read_u8_as_lv_index()?;
			let value = reader.read_i8()?;
			Instruction::IInc(index, value as i16)
		},
		opcode::I2L   => Instruction::I2L,
		opcode::I2F   => Instruction::I2F,
		opcode::I2D   => Instruction::I2D,
		opcode::L2I   => Instruction::L2I,
		opcode::L2F   => Instruction::L2F,
		opcode::L2D   => Instruction::L2D,
		opcode::F2I   => Instruction::F2I,
		opcode::F2L   => Instruction::F2L,
		opcode::F2D   => Instruction::F2D,
		opcode::D2I   => Instruction::D2I,
		opcode::D2L   => Instruction::D2L,
		opcode::D2F   => Instruction::D2F,
		opcode::I2B   => Instruction::I2B,
		opcode::I2C   => Instruction::I2C,
		opcode::I2S   => Instruction::I2S,
		opcode::LCMP  => Instruction::LCmp,
		opcode::FCMPL => Instruction::FCmpL,
		opcode::FCMPG => Instruction::FCmpG,
		opcode::DCMPL => Instruction::DCmpL,
		opcode::DCMPG => Instruction::DCmpG,
		opcode::IFEQ      => Instruction::IfEq(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFNE      => Instruction::IfNe(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFLT      => Instruction::IfLt(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFGE      => Instruction::IfGe(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFGT      => Instruction::IfGt(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFLE      => Instruction::IfLe(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPEQ => Instruction::IfICmpEq(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPNE => Instruction::IfICmpNe(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPLT => Instruction::IfICmpLt(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPGE => Instruction::IfICmpGe(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPGT => Instruction::IfICmpGt(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ICMPLE => Instruction::IfICmpLe(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ACMPEQ => Instruction::IfACmpEq(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IF_ACMPNE => Instruction::IfACmpNe(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::GOTO      => Instruction::Goto(    reader.read_i16_as_branch_target(labels, pc)?),
		opcode::JSR       => Instruction::Jsr(     reader.read_i16_as_branch_target(labels, pc)?),
		opcode::RET       => Instruction::Ret(reader.read_u8_as_lv_index()?),
		opcode::TABLESWITCH => {
			reader.skip_switch_padding(pc)?;

			let default = reader.read_i32_as_branch_target(labels, pc)?;
			let bounds_offset = reader.marker()?;
			let low = reader.read_i32()?;
			let high = reader.read_i32()?;

			if low > high {
				bail!(CodecError::Malformed { reason: "`tableswitch` with `low` greater than `high`", offset: bounds_offset });
			}

			let n = high as i64 - low as i64 + 1;
			let mut table = Vec::with_capacity(n.min(1024) as usize);
			for _ in 0..n {
				table.push(reader.read_i32_as_branch_target(labels, pc)?);
			}

			Instruction::TableSwitch { default, low, high, table }
		},
		opcode::LOOKUPSWITCH => {
			reader.skip_switch_padding(pc)?;

			let default = reader.read_i32_as_branch_target(labels, pc)?;

			let npairs_offset = reader.marker()?;
			let npairs = reader.read_i32()?;
			if npairs < 0 {
				bail!(CodecError::Malformed { reason: "`lookupswitch` with negative `npairs`", offset: npairs_offset });
			}

			let mut pairs: Vec<(i32, Label)> = Vec::with_capacity((npairs as usize).min(1024));
			for _ in 0..npairs {
				let key_offset = reader.marker()?;
				let key = reader.read_i32()?;
				if pairs.last().is_some_and(|&(last, _)| last >= key) {
					bail!(CodecError::Malformed { reason: "`lookupswitch` keys aren't sorted", offset: key_offset });
				}
				let target = reader.read_i32_as_branch_target(labels, pc)?;
				pairs.push((key, target));
			}

			Instruction::LookupSwitch { default, pairs }
		},
		opcode::IRETURN => Instruction::IReturn,
		opcode::LRETURN => Instruction::LReturn,
		opcode::FRETURN => Instruction::FReturn,
		opcode::DRETURN => Instruction::DReturn,
		opcode::ARETURN => Instruction::AReturn,
		opcode::RETURN  => Instruction::Return,
		opcode::GETSTATIC => Instruction::GetStatic(pool.get_field_ref(reader.read_pool_index()?)?),
		opcode::PUTSTATIC => Instruction::PutStatic(pool.get_field_ref(reader.read_pool_index()?)?),
		opcode::GETFIELD  => Instruction::GetField(pool.get_field_ref(reader.read_pool_index()?)?),
		opcode::PUTFIELD  => Instruction::PutField(pool.get_field_ref(reader.read_pool_index()?)?),
		opcode::INVOKEVIRTUAL => Instruction::InvokeVirtual(pool.get_method_ref(reader.read_pool_index()?)?),
		opcode::INVOKESPECIAL => {
			let (method_ref, is_interface) = pool.get_method_ref_or_interface_method_ref(reader.read_pool_index()?)?;
			Instruction::InvokeSpecial(method_ref, is_interface)
		},
		opcode::INVOKESTATIC => {
			let (method_ref, is_interface) = pool.get_method_ref_or_interface_method_ref(reader.read_pool_index()?)?;
			Instruction::InvokeStatic(method_ref, is_interface)
		},
		opcode::INVOKEINTERFACE => {
			let method_ref = pool.get_interface_method_ref(reader.read_pool_index()?)?;
			// The count is redundant with the descriptor, the writer computes it again.
			let _count = reader.read_u8()?;
			let zero_offset = reader.marker()?;
			if reader.read_u8()? != 0 {
				bail!(CodecError::Malformed { reason: "fourth operand byte of `invokeinterface` must be zero", offset: zero_offset });
			}
			Instruction::InvokeInterface(method_ref)
		},
		opcode::INVOKEDYNAMIC => {
			let invoke_dynamic = pool.get_invoke_dynamic(reader.read_pool_index()?)?;
			let zero_offset = reader.marker()?;
			if reader.read_u16()? != 0 {
				bail!(CodecError::Malformed { reason: "third and fourth operand bytes of `invokedynamic` must be zero", offset: zero_offset });
			}
			Instruction::InvokeDynamic(invoke_dynamic)
		},
		opcode::NEW => Instruction::New(pool.get_class(reader.read_pool_index()?)?),
		opcode::NEWARRAY => {
			let atype_offset = reader.marker()?;
			let atype = reader.read_u8()?;
			let Some(array_type) = ArrayType::from_atype(atype) else {
				bail!(CodecError::InvalidTag { tag: atype, offset: atype_offset });
			};
			Instruction::NewArray(array_type)
		},
		opcode::ANEWARRAY    => Instruction::ANewArray(pool.get_class(reader.read_pool_index()?)?),
		opcode::ARRAYLENGTH  => Instruction::ArrayLength,
		opcode::ATHROW       => Instruction::AThrow,
		opcode::CHECKCAST    => Instruction::CheckCast(pool.get_class(reader.read_pool_index()?)?),
		opcode::INSTANCEOF   => Instruction::InstanceOf(pool.get_class(reader.read_pool_index()?)?),
		opcode::MONITORENTER => Instruction::MonitorEnter,
		opcode::MONITOREXIT  => Instruction::MonitorExit,
		opcode::WIDE => {
			let wide_offset = reader.marker()?;
			match reader.read_u8()? {
				opcode::ILOAD  => Instruction::ILoad( reader.read_u16_as_lv_index()?),
				opcode::LLOAD  => Instruction::LLoad( reader.read_u16_as_lv_index()?),
				opcode::FLOAD  => Instruction::FLoad( reader.read_u16_as_lv_index()?),
				opcode::DLOAD  => Instruction::DLoad( reader.read_u16_as_lv_index()?),
				opcode::ALOAD  => Instruction::ALoad( reader.read_u16_as_lv_index()?),
				opcode::ISTORE => Instruction::IStore(reader.read_u16_as_lv_index()?),
				opcode::LSTORE => Instruction::LStore(reader.read_u16_as_lv_index()?),
				opcode::FSTORE => Instruction::FStore(reader.read_u16_as_lv_index()?),
				opcode::DSTORE => Instruction::DStore(reader.read_u16_as_lv_index()?),
				opcode::ASTORE => Instruction::AStore(reader.read_u16_as_lv_index()?),
				opcode::RET    => Instruction::Ret(   reader.read_u16_as_lv_index()?),
				opcode::IINC => {
					let index = reader.read_u16_as_lv_index()?;
					let value = reader.read_i16()?;
					Instruction::IInc(index, value)
				},
				wide_opcode => bail!(CodecError::InvalidOpcode { opcode: wide_opcode, offset: wide_offset }),
			}
		},
		opcode::MULTIANEWARRAY => {
			let class = pool.get_class(reader.read_pool_index()?)?;
			let dimensions_offset = reader.marker()?;
			let dimensions = reader.read_u8()?;
			if dimensions == 0 {
				bail!(CodecError::Malformed { reason: "`multianewarray` with zero dimensions", offset: dimensions_offset });
			}
			Instruction::MultiANewArray(class, dimensions)
		},
		opcode::IFNULL    => Instruction::IfNull(   reader.read_i16_as_branch_target(labels, pc)?),
		opcode::IFNONNULL => Instruction::IfNonNull(reader.read_i16_as_branch_target(labels, pc)?),
		opcode::GOTO_W    => Instruction::Goto(     reader.read_i32_as_branch_target(labels, pc)?),
		opcode::JSR_W     => Instruction::Jsr(      reader.read_i32_as_branch_target(labels, pc)?),

		// Includes the reserved `breakpoint`, `impdep1` and `impdep2`, which may not appear in class files.
		op => bail!(CodecError::InvalidOpcode { opcode: op, offset: opcode_offset }),
	})
}

/// Reads the constant of an `ldc`, `ldc_w` or `ldc2_w`, checking that it has the right size for it.
fn read_ldc(pool: &PoolRead, at: PoolIndex, wide: bool) -> Result<Instruction> {
	let loadable = pool.get_loadable(at)?;
	if loadable.is_wide() != wide {
		let reason = if wide {
			"`ldc2_w` must load a `long` or `double`"
		} else {
			"`ldc` and `ldc_w` can't load a `long` or `double`"
		};
		bail!(CodecError::Malformed { reason, offset: at.offset });
	}
	Ok(Instruction::Ldc(loadable))
}

fn read_stack_map_table(reader: &mut impl ClassRead, pool: &PoolRead, labels: &mut Labels) -> Result<Vec<(Label, StackMapData)>> {
	let number_of_entries = reader.read_u16_as_usize()?;
	let mut frames = Vec::with_capacity(number_of_entries.min(1024));

	let mut pc: i64 = -1;
	for _ in 0..number_of_entries {
		let frame_offset = reader.marker()?;
		let (offset_delta, frame) = match reader.read_u8()? {
			offset_delta @ 0..=63 => (offset_delta as u16, StackMapData::Same),
			frame_type @ 64..=127 => ((frame_type - 64) as u16, StackMapData::SameLocals1StackItem {
				stack: read_verification_type_info(reader, pool, labels)?,
			}),
			frame_type @ 128..=246 => bail!(CodecError::InvalidTag { tag: frame_type, offset: frame_offset }),
			247 => (reader.read_u16()?, StackMapData::SameLocals1StackItem {
				stack: read_verification_type_info(reader, pool, labels)?,
			}),
			frame_type @ 248..=250 => (reader.read_u16()?, StackMapData::Chop {
				k: 251 - frame_type,
			}),
			251 => (reader.read_u16()?, StackMapData::Same),
			frame_type @ 252..=254 => {
				let offset_delta = reader.read_u16()?;
				let locals = reader.read_vec(
					|_| Ok((frame_type - 251) as usize),
					|r| read_verification_type_info(r, pool, labels),
				)?;
				(offset_delta, StackMapData::Append { locals })
			},
			255 => {
				let offset_delta = reader.read_u16()?;
				let locals = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| read_verification_type_info(r, pool, labels),
				)?;
				let stack = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| read_verification_type_info(r, pool, labels),
				)?;
				(offset_delta, StackMapData::Full { locals, stack })
			},
		};

		// The first frame is at `offset_delta`, each further one at `offset_delta + 1` after the one before.
		pc += offset_delta as i64 + 1;
		frames.push((labels.at(pc, frame_offset)?, frame));
	}

	Ok(frames)
}

fn read_verification_type_info(reader: &mut impl ClassRead, pool: &PoolRead, labels: &mut Labels) -> Result<VerificationTypeInfo> {
	let offset = reader.marker()?;
	Ok(match reader.read_u8()? {
		verification_type::TOP => VerificationTypeInfo::Top,
		verification_type::INTEGER => VerificationTypeInfo::Integer,
		verification_type::FLOAT => VerificationTypeInfo::Float,
		verification_type::DOUBLE => VerificationTypeInfo::Double,
		verification_type::LONG => VerificationTypeInfo::Long,
		verification_type::NULL => VerificationTypeInfo::Null,
		verification_type::UNINITIALIZED_THIS => VerificationTypeInfo::UninitializedThis,
		verification_type::OBJECT => VerificationTypeInfo::Object(pool.get_class(reader.read_pool_index()?)?),
		verification_type::UNINITIALIZED => {
			let at = reader.marker()?;
			VerificationTypeInfo::Uninitialized(labels.at(reader.read_u16()? as i64, at)?)
		},
		tag => bail!(CodecError::InvalidTag { tag, offset }),
	})
}

fn read_record_component(reader: &mut impl ClassRead, pool: &PoolRead, options: &Options) -> Result<RecordComponent> {
	let name = pool.get_name(reader.read_pool_index()?, "invalid record component name")?;
	let descriptor = pool.get_name(reader.read_pool_index()?, "invalid record component descriptor")?;

	let mut component = RecordComponent::new(name, descriptor);

	let attributes = read_attributes(reader, pool, options, |reader, name, _, offset| {
		match name.as_str() {
			Ok(attribute::SIGNATURE) => {
				let signature = pool.get_name(reader.read_pool_index()?, "invalid record component signature")?;
				component.signature.insert_if_empty(signature, offset)?;
			},
			Ok(attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
				component.runtime_visible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_ANNOTATIONS) => {
				component.runtime_invisible_annotations.extend(read_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS) => {
				component.runtime_visible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			Ok(attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS) => {
				component.runtime_invisible_type_annotations.extend(read_type_annotations_attribute(reader, pool)?);
			},
			_ => return Ok(false),
		}
		Ok(true)
	})?;
	component.attributes = attributes;

	Ok(component)
}

fn read_annotations_attribute(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<Annotation>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_annotation(r, pool, 0)
	)
}

fn read_parameter_annotations_attribute(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<Vec<Annotation>>> {
	reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| read_annotations_attribute(r, pool)
	)
}

fn read_annotation(reader: &mut impl ClassRead, pool: &PoolRead, depth: u32) -> Result<Annotation> {
	let annotation_type = pool.get_name(reader.read_pool_index()?, "invalid annotation type")?;
	let element_value_pairs = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(ElementValuePair {
			name: pool.get_utf8(r.read_pool_index()?)?,
			value: read_element_value(r, pool, depth)?,
		})
	)?;
	Ok(Annotation { annotation_type, element_value_pairs })
}

fn read_element_value(reader: &mut impl ClassRead, pool: &PoolRead, depth: u32) -> Result<ElementValue> {
	let offset = reader.marker()?;
	if depth > MAX_ANNOTATION_DEPTH {
		bail!(CodecError::Malformed { reason: "annotations nest too deep", offset });
	}

	Ok(match reader.read_u8()? {
		b'B' => ElementValue::Object(Object::Byte(pool.get_integer_as_byte(reader.read_pool_index()?)?)),
		b'C' => ElementValue::Object(Object::Char(pool.get_integer_as_char(reader.read_pool_index()?)?)),
		b'D' => ElementValue::Object(Object::Double(pool.get_double(reader.read_pool_index()?)?)),
		b'F' => ElementValue::Object(Object::Float(pool.get_float(reader.read_pool_index()?)?)),
		b'I' => ElementValue::Object(Object::Integer(pool.get_integer(reader.read_pool_index()?)?)),
		b'J' => ElementValue::Object(Object::Long(pool.get_long(reader.read_pool_index()?)?)),
		b'S' => ElementValue::Object(Object::Short(pool.get_integer_as_short(reader.read_pool_index()?)?)),
		b'Z' => ElementValue::Object(Object::Boolean(pool.get_integer_as_boolean(reader.read_pool_index()?)?)),
		b's' => ElementValue::Object(Object::String(pool.get_utf8(reader.read_pool_index()?)?)),
		b'e' => ElementValue::Enum {
			type_name: pool.get_name(reader.read_pool_index()?, "invalid enum type")?,
			const_name: pool.get_utf8(reader.read_pool_index()?)?,
		},
		b'c' => ElementValue::Class(pool.get_utf8(reader.read_pool_index()?)?),
		b'@' => ElementValue::AnnotationInterface(read_annotation(reader, pool, depth + 1)?),
		b'[' => ElementValue::ArrayType(reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| read_element_value(r, pool, depth + 1)
		)?),
		tag => bail!(CodecError::InvalidTag { tag, offset }),
	})
}

/// The `target_type` and `target_info` items of a type annotation, for one kind of structure.
trait TargetInfoRead: Sized {
	fn read_target_info(reader: &mut impl ClassRead, target_type: u8, offset: u64) -> Result<Self>;
}

impl TargetInfoRead for TargetInfoClass {
	fn read_target_info(reader: &mut impl ClassRead, target_type: u8, offset: u64) -> Result<Self> {
		Ok(match target_type {
			type_annotation::CLASS_TYPE_PARAMETER => TargetInfoClass::ClassTypeParameter { index: reader.read_u8()? },
			type_annotation::CLASS_EXTENDS => match reader.read_u16()? {
				u16::MAX => TargetInfoClass::Extends,
				index => TargetInfoClass::Implements { index },
			},
			type_annotation::CLASS_TYPE_PARAMETER_BOUND => TargetInfoClass::ClassTypeParameterBound {
				type_parameter_index: reader.read_u8()?,
				bound_index: reader.read_u8()?,
			},
			tag => bail!(CodecError::InvalidTag { tag, offset }),
		})
	}
}

impl TargetInfoRead for TargetInfoField {
	fn read_target_info(_: &mut impl ClassRead, target_type: u8, offset: u64) -> Result<Self> {
		match target_type {
			type_annotation::FIELD => Ok(TargetInfoField::Field),
			tag => bail!(CodecError::InvalidTag { tag, offset }),
		}
	}
}

impl TargetInfoRead for TargetInfoMethod {
	fn read_target_info(reader: &mut impl ClassRead, target_type: u8, offset: u64) -> Result<Self> {
		Ok(match target_type {
			type_annotation::METHOD_TYPE_PARAMETER => TargetInfoMethod::MethodTypeParameter { index: reader.read_u8()? },
			type_annotation::METHOD_TYPE_PARAMETER_BOUND => TargetInfoMethod::MethodTypeParameterBound {
				type_parameter_index: reader.read_u8()?,
				bound_index: reader.read_u8()?,
			},
			type_annotation::METHOD_RETURN => TargetInfoMethod::Return,
			type_annotation::METHOD_RECEIVER => TargetInfoMethod::Receiver,
			type_annotation::METHOD_FORMAL_PARAMETER => TargetInfoMethod::FormalParameter { index: reader.read_u8()? },
			type_annotation::THROWS => TargetInfoMethod::Throws { index: reader.read_u16()? },
			tag => bail!(CodecError::InvalidTag { tag, offset }),
		})
	}
}

fn read_type_annotations_attribute<T: TargetInfoRead>(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<TypeAnnotation<T>>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let offset = r.marker()?;
			let target_type = r.read_u8()?;
			let type_reference = T::read_target_info(r, target_type, offset)?;
			let type_path = read_type_path(r)?;
			let annotation = read_annotation(r, pool, 0)?;
			Ok(TypeAnnotation::new(type_reference, type_path, annotation))
		}
	)
}

fn read_type_path(reader: &mut impl ClassRead) -> Result<TypePath> {
	let path = reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| {
			let offset = r.marker()?;
			let type_path_kind = r.read_u8()?;
			let type_argument_index = r.read_u8()?;
			let kind = match type_path_kind {
				0 => TypePathKind::ArrayDeeper,
				1 => TypePathKind::NestedDeeper,
				2 => TypePathKind::WildcardBound,
				3 => return Ok(TypePathKind::TypeArgument { index: type_argument_index }),
				tag => bail!(CodecError::InvalidTag { tag, offset }),
			};
			if type_argument_index != 0 {
				bail!(CodecError::Malformed { reason: "`type_argument_index` must be zero for this `type_path_kind`", offset: offset + 1 });
			}
			Ok(kind)
		}
	)?;
	Ok(TypePath { path })
}

fn read_module(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Module> {
	Ok(Module {
		name: pool.get_module(reader.read_pool_index()?)?,
		flags: reader.read_u16()?.into(),
		version: pool.get_optional(reader.read_pool_index()?, PoolRead::get_utf8)?,
		requires: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleRequires {
				name: pool.get_module(r.read_pool_index()?)?,
				flags: r.read_u16()?.into(),
				version: pool.get_optional(r.read_pool_index()?, PoolRead::get_utf8)?,
			})
		)?,
		exports: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleExports {
				name: pool.get_package(r.read_pool_index()?)?,
				flags: r.read_u16()?.into(),
				exports_to: r.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_module(r.read_pool_index()?)
				)?,
			})
		)?,
		opens: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleOpens {
				name: pool.get_package(r.read_pool_index()?)?,
				flags: r.read_u16()?.into(),
				opens_to: r.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_module(r.read_pool_index()?)
				)?,
			})
		)?,
		uses: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| pool.get_class(r.read_pool_index()?)
		)?,
		provides: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleProvides {
				name: pool.get_class(r.read_pool_index()?)?,
				provides_with: r.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_pool_index()?)
				)?,
			})
		)?,
	})
}
