use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace, warn};
use crate::analysis::analyze;
use crate::class_constants::{attribute, opcode, type_annotation, verification_type};
use crate::class_writer::labels::Labels;
use crate::class_writer::pool::PoolWrite;
use crate::{class_constants, ClassWrite};
use crate::error::CodecError;
use crate::hierarchy::ClassHierarchy;
use crate::options::Options;
use crate::tree::annotation::{Annotation, ElementValue, Object};
use crate::tree::attribute::Attribute;
use crate::tree::class::{ClassFile, ClassName};
use crate::tree::field::Field;
use crate::tree::method::Method;
use crate::tree::method::code::{Code, Instruction, Label, LvIndex};
use crate::tree::method::frame::{StackMapData, VerificationTypeInfo};
use crate::tree::module::Module;
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::{TargetInfoClass, TargetInfoField, TargetInfoMethod, TypeAnnotation, TypePath, TypePathKind};
use crate::tree::version::Version;

mod pool;
mod labels;
mod frames;

/// Writes one class, member by member.
///
/// The constant pool is only known once everything is written, so fields and methods go into buffers, and
/// [`ClassWriter::finish`] puts the pieces together.
pub(crate) struct ClassWriter<'a> {
	options: &'a Options,
	version: Version,
	pool: PoolWrite,
	/// `access_flags`, `this_class`, `super_class` and `interfaces`.
	header: Vec<u8>,
	fields_count: usize,
	fields: Vec<u8>,
	methods_count: usize,
	methods: Vec<u8>,
}

impl<'a> ClassWriter<'a> {
	pub(crate) fn new(class: &ClassFile, options: &'a Options) -> Result<ClassWriter<'a>> {
		let version = options.output_version(class.version);
		if version != class.version {
			debug!("writing class {:?} of version {}.{} as {}.{}",
				class.name, class.version.major, class.version.minor, version.major, version.minor);
		}

		let mut pool = PoolWrite::new();
		let mut header = Vec::new();
		header.write_u16(class.access.into())?;
		header.write_u16(pool.put_class(&class.name)?)?;
		header.write_u16(pool.put_optional(class.super_class.as_ref(), PoolWrite::put_class)?)?;
		header.write_slice(&class.interfaces,
			|w, size| w.write_usize_as_u16(size, "interfaces"),
			|w, interface| w.write_u16(pool.put_class(interface)?)
		)?;

		Ok(ClassWriter {
			options,
			version,
			pool,
			header,
			fields_count: 0,
			fields: Vec::new(),
			methods_count: 0,
			methods: Vec::new(),
		})
	}

	pub(crate) fn write_field(&mut self, field: &Field) -> Result<()> {
		let pool = &mut self.pool;
		let w = &mut self.fields;

		w.write_u16(field.access.into())?;
		w.write_u16(pool.put_utf8(&field.name)?)?;
		w.write_u16(pool.put_utf8(&field.descriptor)?)?;

		let mut attributes = AttributesWrite::new();
		if field.has_deprecated_attribute {
			attributes.add(pool, attribute::DEPRECATED, |_, _| Ok(()))?;
		}
		if field.has_synthetic_attribute {
			attributes.add(pool, attribute::SYNTHETIC, |_, _| Ok(()))?;
		}
		if let Some(constant_value) = &field.constant_value {
			attributes.add(pool, attribute::CONSTANT_VALUE, |w, pool| w.write_u16(pool.put_constant_value(constant_value)?))?;
		}
		if let Some(signature) = &field.signature {
			attributes.add(pool, attribute::SIGNATURE, |w, pool| w.write_u16(pool.put_utf8(signature)?))?;
		}
		attributes.add_annotations(pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, &field.runtime_visible_annotations)?;
		attributes.add_annotations(pool, attribute::RUNTIME_INVISIBLE_ANNOTATIONS, &field.runtime_invisible_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, &field.runtime_visible_type_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, &field.runtime_invisible_type_annotations)?;
		attributes.add_raw(pool, &field.attributes)?;
		attributes.write(w)?;

		self.fields_count += 1;
		Ok(())
	}

	/// Writes a method. The class is needed for computing frames and maximum values.
	pub(crate) fn write_method(&mut self, class: &ClassFile, method: &Method) -> Result<()> {
		let code = match &method.code {
			Some(code) => Some(self.prepare_code(class, method, code)
				.with_context(|| anyhow!("failed to prepare the code of {:?} {:?} for writing", method.name, method.descriptor))?),
			None => None,
		};

		let hierarchy = &self.options.hierarchy;
		let pool = &mut self.pool;
		let w = &mut self.methods;

		w.write_u16(method.access.into())?;
		w.write_u16(pool.put_utf8(&method.name)?)?;
		w.write_u16(pool.put_utf8(&method.descriptor)?)?;

		let mut attributes = AttributesWrite::new();
		if method.has_deprecated_attribute {
			attributes.add(pool, attribute::DEPRECATED, |_, _| Ok(()))?;
		}
		if method.has_synthetic_attribute {
			attributes.add(pool, attribute::SYNTHETIC, |_, _| Ok(()))?;
		}
		if let Some(code) = &code {
			attributes.add(pool, attribute::CODE, |w, pool| write_code(w, pool, class, method, code, hierarchy))?;
		}
		if let Some(exceptions) = &method.exceptions {
			attributes.add(pool, attribute::EXCEPTIONS, |w, pool| write_classes(w, pool, exceptions, "exceptions"))?;
		}
		if let Some(signature) = &method.signature {
			attributes.add(pool, attribute::SIGNATURE, |w, pool| w.write_u16(pool.put_utf8(signature)?))?;
		}
		attributes.add_annotations(pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, &method.runtime_visible_annotations)?;
		attributes.add_annotations(pool, attribute::RUNTIME_INVISIBLE_ANNOTATIONS, &method.runtime_invisible_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, &method.runtime_visible_type_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, &method.runtime_invisible_type_annotations)?;
		if let Some(parameters) = &method.runtime_visible_parameter_annotations {
			attributes.add(pool, attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS, |w, pool| write_parameter_annotations(w, pool, parameters))?;
		}
		if let Some(parameters) = &method.runtime_invisible_parameter_annotations {
			attributes.add(pool, attribute::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS, |w, pool| write_parameter_annotations(w, pool, parameters))?;
		}
		if let Some(annotation_default) = &method.annotation_default {
			attributes.add(pool, attribute::ANNOTATION_DEFAULT, |w, pool| write_element_value(w, pool, annotation_default))?;
		}
		if let Some(parameters) = &method.method_parameters {
			attributes.add(pool, attribute::METHOD_PARAMETERS, |w, pool| {
				w.write_slice(parameters,
					|w, size| w.write_usize_as_u8(size, "method parameters"),
					|w, parameter| {
						w.write_u16(pool.put_optional(parameter.name.as_deref(), PoolWrite::put_utf8)?)?;
						w.write_u16(parameter.flags.into())
					}
				)
			})?;
		}
		attributes.add_raw(pool, &method.attributes)?;
		attributes.write(w)?;

		self.methods_count += 1;
		Ok(())
	}

	/// Checks the code against the version written, and fills in what's missing of the frames and maximum values.
	fn prepare_code<'c>(&self, class: &ClassFile, method: &'c Method, code: &'c Code) -> Result<Cow<'c, Code>> {
		let major = self.version.major;

		let has_subroutines = code.has_subroutines();
		if has_subroutines && !self.version.allows_subroutines() {
			bail!(CodecError::IllegalForVersion { what: "`jsr` and `ret`", major });
		}

		let rewritten = code.max_stack.is_none() || code.max_locals.is_none();
		if rewritten && !code.attributes.is_empty() {
			let names: Vec<_> = code.attributes.iter().map(|attribute| &attribute.name).collect();
			warn!("keeping the raw code attributes {names:?} of the rewritten method {:?} {:?}, they may not match the new code",
				method.name, method.descriptor);
		}

		let code = if self.options.compute_frames && self.version >= Version::V1_6 && !has_subroutines {
			Cow::Owned(frames::compute_frames(class, method, &self.options.hierarchy)?)
		} else if rewritten {
			if self.options.compute_frames {
				debug!("not computing frames of {:?} {:?}", method.name, method.descriptor);
			}
			let analysis = analyze(class, method, &self.options.hierarchy)
				.context("failed to compute `max_stack` and `max_locals`")?;
			let mut code = code.clone();
			code.max_stack.get_or_insert(analysis.max_stack);
			code.max_locals.get_or_insert(analysis.max_locals);
			Cow::Owned(code)
		} else {
			Cow::Borrowed(code)
		};

		if self.version.requires_stack_map_frames() && code.frames.is_none() && needs_frames(&code) {
			bail!(CodecError::IllegalForVersion { what: "code with jumps or exception handlers but without stack map frames", major });
		}

		Ok(code)
	}

	/// Writes the class attributes and assembles the class file.
	pub(crate) fn finish(mut self, class: &ClassFile) -> Result<Vec<u8>> {
		let pool = &mut self.pool;

		let mut attributes = AttributesWrite::new();
		if class.has_deprecated_attribute {
			attributes.add(pool, attribute::DEPRECATED, |_, _| Ok(()))?;
		}
		if class.has_synthetic_attribute {
			attributes.add(pool, attribute::SYNTHETIC, |_, _| Ok(()))?;
		}
		if let Some(inner_classes) = &class.inner_classes {
			attributes.add(pool, attribute::INNER_CLASSES, |w, pool| {
				w.write_slice(inner_classes,
					|w, size| w.write_usize_as_u16(size, "inner classes"),
					|w, inner_class| {
						w.write_u16(pool.put_class(&inner_class.inner_class)?)?;
						w.write_u16(pool.put_optional(inner_class.outer_class.as_ref(), PoolWrite::put_class)?)?;
						w.write_u16(pool.put_optional(inner_class.inner_name.as_deref(), PoolWrite::put_utf8)?)?;
						w.write_u16(inner_class.flags.into())
					}
				)
			})?;
		}
		if let Some(enclosing_method) = &class.enclosing_method {
			attributes.add(pool, attribute::ENCLOSING_METHOD, |w, pool| {
				w.write_u16(pool.put_class(&enclosing_method.class)?)?;
				let method = match &enclosing_method.method {
					Some((name, descriptor)) => pool.put_name_and_type(name, descriptor)?,
					None => 0,
				};
				w.write_u16(method)
			})?;
		}
		if let Some(signature) = &class.signature {
			attributes.add(pool, attribute::SIGNATURE, |w, pool| w.write_u16(pool.put_utf8(signature)?))?;
		}
		if let Some(source_file) = &class.source_file {
			attributes.add(pool, attribute::SOURCE_FILE, |w, pool| w.write_u16(pool.put_utf8(source_file)?))?;
		}
		attributes.add_annotations(pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, &class.runtime_visible_annotations)?;
		attributes.add_annotations(pool, attribute::RUNTIME_INVISIBLE_ANNOTATIONS, &class.runtime_invisible_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, &class.runtime_visible_type_annotations)?;
		attributes.add_type_annotations(pool, attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, &class.runtime_invisible_type_annotations)?;
		if let Some(module) = &class.module {
			attributes.add(pool, attribute::MODULE, |w, pool| write_module(w, pool, module))?;
		}
		if let Some(module_packages) = &class.module_packages {
			attributes.add(pool, attribute::MODULE_PACKAGES, |w, pool| {
				w.write_slice(module_packages,
					|w, size| w.write_usize_as_u16(size, "module packages"),
					|w, package| w.write_u16(pool.put_package(package)?)
				)
			})?;
		}
		if let Some(module_main_class) = &class.module_main_class {
			attributes.add(pool, attribute::MODULE_MAIN_CLASS, |w, pool| w.write_u16(pool.put_class(module_main_class)?))?;
		}
		if let Some(nest_host_class) = &class.nest_host_class {
			attributes.add(pool, attribute::NEST_HOST, |w, pool| w.write_u16(pool.put_class(nest_host_class)?))?;
		}
		if let Some(nest_members) = &class.nest_members {
			attributes.add(pool, attribute::NEST_MEMBERS, |w, pool| write_classes(w, pool, nest_members, "nest members"))?;
		}
		if let Some(permitted_subclasses) = &class.permitted_subclasses {
			attributes.add(pool, attribute::PERMITTED_SUBCLASSES, |w, pool| write_classes(w, pool, permitted_subclasses, "permitted subclasses"))?;
		}
		if let Some(record_components) = &class.record_components {
			attributes.add(pool, attribute::RECORD, |w, pool| {
				w.write_slice(record_components,
					|w, size| w.write_usize_as_u16(size, "record components"),
					|w, component| write_record_component(w, pool, component)
				)
			})?;
		}

		// Writing the other attributes only adds bootstrap methods through `invokedynamic` and dynamic constants
		// in code, so this comes after all of them.
		let bootstrap_methods = pool.take_bootstrap_methods();
		if !bootstrap_methods.is_empty() {
			attributes.add(pool, attribute::BOOTSTRAP_METHODS, |w, pool| {
				w.write_slice(&bootstrap_methods,
					|w, size| w.write_usize_as_u16(size, "bootstrap methods"),
					|w, method| {
						w.write_u16(pool.put_method_handle(&method.handle)?)?;
						w.write_slice(&method.arguments,
							|w, size| w.write_usize_as_u16(size, "bootstrap method arguments"),
							|w, &argument| w.write_u16(argument)
						)
					}
				)
			})?;
		}
		attributes.add_raw(pool, &class.attributes)?;

		let mut bytes = Vec::new();
		bytes.write_u32(class_constants::MAGIC)?;
		bytes.write_u16(self.version.minor)?;
		bytes.write_u16(self.version.major)?;
		self.pool.write(&mut bytes)?;
		bytes.write_u8_slice(&self.header)?;
		bytes.write_usize_as_u16(self.fields_count, "fields")?;
		bytes.write_u8_slice(&self.fields)?;
		bytes.write_usize_as_u16(self.methods_count, "methods")?;
		bytes.write_u8_slice(&self.methods)?;
		attributes.write(&mut bytes)?;

		debug!("wrote class {:?} with {} fields and {} methods into {} bytes", class.name, self.fields_count, self.methods_count, bytes.len());
		Ok(bytes)
	}
}

/// Whether the verifier of version 51 and later needs a `StackMapTable` for this code.
fn needs_frames(code: &Code) -> bool {
	let len = code.instructions.len();
	!code.exception_table.is_empty() || code.instructions.iter().enumerate()
		.any(|(index, instruction)| !instruction.targets().is_empty() || (!instruction.falls_through() && index + 1 < len))
}

/// Collects the attributes of one structure, so that `attributes_count` can be written before them.
struct AttributesWrite {
	count: usize,
	buffer: Vec<u8>,
}

impl AttributesWrite {
	fn new() -> AttributesWrite {
		AttributesWrite { count: 0, buffer: Vec::new() }
	}

	/// Adds an attribute whose body `f` writes. The `attribute_length` is filled in afterwards.
	fn add(&mut self, pool: &mut PoolWrite, name: &'static str, f: impl FnOnce(&mut Vec<u8>, &mut PoolWrite) -> Result<()>) -> Result<()> {
		let name_index = pool.put_str(name)?;

		let mut body = Vec::new();
		f(&mut body, pool).with_context(|| anyhow!("failed to write {name} attribute"))?;

		self.buffer.write_u16(name_index)?;
		self.buffer.write_usize_as_u32(body.len(), "attribute length")?;
		self.buffer.write_u8_slice(&body)?;
		self.count += 1;
		Ok(())
	}

	fn add_annotations(&mut self, pool: &mut PoolWrite, name: &'static str, annotations: &[Annotation]) -> Result<()> {
		if annotations.is_empty() {
			return Ok(());
		}
		self.add(pool, name, |w, pool| write_annotations(w, pool, annotations))
	}

	fn add_type_annotations<T: TargetInfoWrite>(&mut self, pool: &mut PoolWrite, name: &'static str, annotations: &[TypeAnnotation<T>]) -> Result<()> {
		if annotations.is_empty() {
			return Ok(());
		}
		self.add(pool, name, |w, pool| {
			w.write_slice(annotations,
				|w, size| w.write_usize_as_u16(size, "type annotations"),
				|w, annotation| {
					annotation.type_reference.write_target_info(w)?;
					write_type_path(w, &annotation.type_path)?;
					write_annotation(w, pool, &annotation.annotation)
				}
			)
		})
	}

	fn add_raw(&mut self, pool: &mut PoolWrite, attributes: &[Attribute]) -> Result<()> {
		for attribute in attributes {
			self.buffer.write_u16(pool.put_utf8(&attribute.name)?)?;
			self.buffer.write_usize_as_u32(attribute.bytes.len(), "attribute length")?;
			self.buffer.write_u8_slice(&attribute.bytes)?;
			self.count += 1;
		}
		Ok(())
	}

	fn write(self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_usize_as_u16(self.count, "attributes")?;
		writer.write_u8_slice(&self.buffer)
	}
}

fn write_classes(w: &mut Vec<u8>, pool: &mut PoolWrite, classes: &[ClassName], what: &'static str) -> Result<()> {
	w.write_slice(classes,
		|w, size| w.write_usize_as_u16(size, what),
		|w, class| w.write_u16(pool.put_class(class)?)
	)
}

/// A jump whose offset isn't known yet, since it goes forward.
#[derive(Debug)]
struct UnwrittenLabel {
	/// The offset the jump is relative to. For `if<cond>` written as `if<!cond>` and `goto_w` this is the offset of
	/// the `goto_w`.
	opcode_pos: u16,
	instruction_index: usize,
	label: Label,
	label_write_pos: usize,
	/// Whether the offset is an `i32`.
	wide: bool,
}

/// Offsets into the code array must fit an `u16`, since `code_length` is less than 65536.
fn code_offset(len: usize) -> Result<u16> {
	u16::try_from(len).map_err(|_| CodecError::TooLarge { what: "code" }.into())
}

fn align_to_4_byte_boundary(w: &mut Vec<u8>) -> Result<()> {
	while w.len() & 3 != 0 {
		w.write_u8(0)?;
	}
	Ok(())
}

fn put_i16_at(w: &mut [u8], pos: usize, value: i16) {
	w[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
}

fn put_i32_at(w: &mut [u8], pos: usize, value: i32) {
	w[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
}

/// The conditional jump with the negated condition.
fn inverted(opcode: u8) -> Result<u8> {
	Ok(match opcode {
		opcode::IFEQ => opcode::IFNE,
		opcode::IFNE => opcode::IFEQ,
		opcode::IFLT => opcode::IFGE,
		opcode::IFGE => opcode::IFLT,
		opcode::IFGT => opcode::IFLE,
		opcode::IFLE => opcode::IFGT,
		opcode::IF_ICMPEQ => opcode::IF_ICMPNE,
		opcode::IF_ICMPNE => opcode::IF_ICMPEQ,
		opcode::IF_ICMPLT => opcode::IF_ICMPGE,
		opcode::IF_ICMPGE => opcode::IF_ICMPLT,
		opcode::IF_ICMPGT => opcode::IF_ICMPLE,
		opcode::IF_ICMPLE => opcode::IF_ICMPGT,
		opcode::IF_ACMPEQ => opcode::IF_ACMPNE,
		opcode::IF_ACMPNE => opcode::IF_ACMPEQ,
		opcode::IFNULL => opcode::IFNONNULL,
		opcode::IFNONNULL => opcode::IFNULL,
		opcode => bail!("opcode {opcode:#x} isn't a conditional jump"),
	})
}

/// The state of one attempt at writing the instructions.
struct CodeWrite<'c> {
	code: &'c Code,
	w: Vec<u8>,
	/// The offsets of the instructions written so far.
	labels: Labels,
	/// Indices of the jumps that need the wide form.
	wide: &'c HashSet<usize>,
	unwritten: Vec<UnwrittenLabel>,
}

impl CodeWrite<'_> {
	fn reserve(&mut self, opcode_pos: u16, instruction_index: usize, label: Label, wide: bool) -> Result<()> {
		self.unwritten.push(UnwrittenLabel { opcode_pos, instruction_index, label, label_write_pos: self.w.len(), wide });
		if wide {
			self.w.write_i32(i32::MAX)
		} else {
			self.w.write_i16(i16::MAX)
		}
	}

	fn if_helper(&mut self, index: usize, pos: u16, opcode: u8, label: Label) -> Result<()> {
		match self.labels.get(self.code, label)? {
			Some(target) => {
				let offset = target as i32 - pos as i32;
				if let Ok(offset) = i16::try_from(offset) {
					self.w.write_u8(opcode)?;
					self.w.write_i16(offset)?;
				} else {
					// `if<!cond> +8; goto_w target`
					self.w.write_u8(inverted(opcode)?)?;
					self.w.write_i16(8)?;
					self.w.write_u8(opcode::GOTO_W)?;
					self.w.write_i32(offset - 3)?;
				}
			},
			None if self.wide.contains(&index) => {
				self.w.write_u8(inverted(opcode)?)?;
				self.w.write_i16(8)?;
				self.w.write_u8(opcode::GOTO_W)?;
				self.reserve(pos + 3, index, label, true)?;
			},
			None => {
				self.w.write_u8(opcode)?;
				self.reserve(pos, index, label, false)?;
			},
		}
		Ok(())
	}

	/// Writes `goto` or `jsr`, in their wide form if needed.
	fn goto_helper(&mut self, index: usize, pos: u16, opcode: u8, opcode_wide: u8, label: Label) -> Result<()> {
		match self.labels.get(self.code, label)? {
			Some(target) => {
				let offset = target as i32 - pos as i32;
				if let Ok(offset) = i16::try_from(offset) {
					self.w.write_u8(opcode)?;
					self.w.write_i16(offset)?;
				} else {
					self.w.write_u8(opcode_wide)?;
					self.w.write_i32(offset)?;
				}
			},
			None if self.wide.contains(&index) => {
				self.w.write_u8(opcode_wide)?;
				self.reserve(pos, index, label, true)?;
			},
			None => {
				self.w.write_u8(opcode)?;
				self.reserve(pos, index, label, false)?;
			},
		}
		Ok(())
	}

	fn switch_helper(&mut self, index: usize, pos: u16, label: Label) -> Result<()> {
		match self.labels.get(self.code, label)? {
			Some(target) => self.w.write_i32(target as i32 - pos as i32),
			None => self.reserve(pos, index, label, true),
		}
	}

	/// Writes a load, store or `ret`, using the short form (like `iload_0`) if there's one, and `wide` if needed.
	fn local_helper(&mut self, opcode: u8, short: Option<u8>, lv: LvIndex) -> Result<()> {
		match (lv.index, short) {
			(index @ 0..=3, Some(first)) => self.w.write_u8(first + index as u8),
			(index @ 0..=255, _) => {
				self.w.write_u8(opcode)?;
				self.w.write_u8(index as u8)
			},
			(index, _) => {
				self.w.write_u8(opcode::WIDE)?;
				self.w.write_u8(opcode)?;
				self.w.write_u16(index)
			},
		}
	}

	fn load(&mut self, opcode: u8, kind: u8, lv: LvIndex) -> Result<()> {
		self.local_helper(opcode, Some(opcode::ILOAD_0 + 4 * kind), lv)
	}

	fn store(&mut self, opcode: u8, kind: u8, lv: LvIndex) -> Result<()> {
		self.local_helper(opcode, Some(opcode::ISTORE_0 + 4 * kind), lv)
	}

	fn write_instruction(&mut self, pool: &mut PoolWrite, index: usize, pos: u16, instruction: &Instruction) -> Result<()> {
		let w = &mut self.w;
		match instruction {
			Instruction::Nop => w.write_u8(opcode::NOP)?,
			Instruction::AConstNull => w.write_u8(opcode::ACONST_NULL)?,
			Instruction::IConstM1 => w.write_u8(opcode::ICONST_M1)?,
			Instruction::IConst0 => w.write_u8(opcode::ICONST_0)?,
			Instruction::IConst1 => w.write_u8(opcode::ICONST_1)?,
			Instruction::IConst2 => w.write_u8(opcode::ICONST_2)?,
			Instruction::IConst3 => w.write_u8(opcode::ICONST_3)?,
			Instruction::IConst4 => w.write_u8(opcode::ICONST_4)?,
			Instruction::IConst5 => w.write_u8(opcode::ICONST_5)?,
			Instruction::LConst0 => w.write_u8(opcode::LCONST_0)?,
			Instruction::LConst1 => w.write_u8(opcode::LCONST_1)?,
			Instruction::FConst0 => w.write_u8(opcode::FCONST_0)?,
			Instruction::FConst1 => w.write_u8(opcode::FCONST_1)?,
			Instruction::FConst2 => w.write_u8(opcode::FCONST_2)?,
			Instruction::DConst0 => w.write_u8(opcode::DCONST_0)?,
			Instruction::DConst1 => w.write_u8(opcode::DCONST_1)?,
			Instruction::BiPush(value) => {
				w.write_u8(opcode::BIPUSH)?;
				w.write_i8(*value)?;
			},
			Instruction::SiPush(value) => {
				w.write_u8(opcode::SIPUSH)?;
				w.write_i16(*value)?;
			},
			Instruction::Ldc(loadable) => {
				let constant = pool.put_loadable(loadable)?;
				if loadable.is_wide() {
					w.write_u8(opcode::LDC2_W)?;
					w.write_u16(constant)?;
				} else if let Ok(constant) = u8::try_from(constant) {
					w.write_u8(opcode::LDC)?;
					w.write_u8(constant)?;
				} else {
					w.write_u8(opcode::LDC_W)?;
					w.write_u16(constant)?;
				}
			},
			Instruction::ILoad(lv) => self.load(opcode::ILOAD, 0, *lv)?,
			Instruction::LLoad(lv) => self.load(opcode::LLOAD, 1, *lv)?,
			Instruction::FLoad(lv) => self.load(opcode::FLOAD, 2, *lv)?,
			Instruction::DLoad(lv) => self.load(opcode::DLOAD, 3, *lv)?,
			Instruction::ALoad(lv) => self.load(opcode::ALOAD, 4, *lv)?,
			Instruction::IALoad => w.write_u8(opcode::IALOAD)?,
			Instruction::LALoad => w.write_u8(opcode::LALOAD)?,
			Instruction::FALoad => w.write_u8(opcode::FALOAD)?,
			Instruction::DALoad => w.write_u8(opcode::DALOAD)?,
			Instruction::AALoad => w.write_u8(opcode::AALOAD)?,
			Instruction::BALoad => w.write_u8(opcode::BALOAD)?,
			Instruction::CALoad => w.write_u8(opcode::CALOAD)?,
			Instruction::SALoad => w.write_u8(opcode::SALOAD)?,
			Instruction::IStore(lv) => self.store(opcode::ISTORE, 0, *lv)?,
			Instruction::LStore(lv) => self.store(opcode::LSTORE, 1, *lv)?,
			Instruction::FStore(lv) => self.store(opcode::FSTORE, 2, *lv)?,
			Instruction::DStore(lv) => self.store(opcode::DSTORE, 3, *lv)?,
			Instruction::AStore(lv) => self.store(opcode::ASTORE, 4, *lv)?,
			Instruction::IAStore => w.write_u8(opcode::IASTORE)?,
			Instruction::LAStore => w.write_u8(opcode::LASTORE)?,
			Instruction::FAStore => w.write_u8(opcode::FASTORE)?,
			Instruction::DAStore => w.write_u8(opcode::DASTORE)?,
			Instruction::AAStore => w.write_u8(opcode::AASTORE)?,
			Instruction::BAStore => w.write_u8(opcode::BASTORE)?,
			Instruction::CAStore => w.write_u8(opcode::CASTORE)?,
			Instruction::SAStore => w.write_u8(opcode::SASTORE)?,
			Instruction::Pop => w.write_u8(opcode::POP)?,
			Instruction::Pop2 => w.write_u8(opcode::POP2)?,
			Instruction::Dup => w.write_u8(opcode::DUP)?,
			Instruction::DupX1 => w.write_u8(opcode::DUP_X1)?,
			Instruction::DupX2 => w.write_u8(opcode::DUP_X2)?,
			Instruction::Dup2 => w.write_u8(opcode::DUP2)?,
			Instruction::Dup2X1 => w.write_u8(opcode::DUP2_X1)?,
			Instruction::Dup2X2 => w.write_u8(opcode::DUP2_X2)?,
			Instruction::Swap => w.write_u8(opcode::SWAP)?,
			Instruction::IAdd => w.write_u8(opcode::IADD)?,
			Instruction::LAdd => w.write_u8(opcode::LADD)?,
			Instruction::FAdd => w.write_u8(opcode::FADD)?,
			Instruction::DAdd => w.write_u8(opcode::DADD)?,
			Instruction::ISub => w.write_u8(opcode::ISUB)?,
			Instruction::LSub => w.write_u8(opcode::LSUB)?,
			Instruction::FSub => w.write_u8(opcode::FSUB)?,
			Instruction::DSub => w.write_u8(opcode::DSUB)?,
			Instruction::IMul => w.write_u8(opcode::IMUL)?,
			Instruction::LMul => w.write_u8(opcode::LMUL)?,
			Instruction::FMul => w.write_u8(opcode::FMUL)?,
			Instruction::DMul => w.write_u8(opcode::DMUL)?,
			Instruction::IDiv => w.write_u8(opcode::IDIV)?,
			Instruction::LDiv => w.write_u8(opcode::LDIV)?,
			Instruction::FDiv => w.write_u8(opcode::FDIV)?,
			Instruction::DDiv => w.write_u8(opcode::DDIV)?,
			Instruction::IRem => w.write_u8(opcode::IREM)?,
			Instruction::LRem => w.write_u8(opcode::LREM)?,
			Instruction::FRem => w.write_u8(opcode::FREM)?,
			Instruction::DRem => w.write_u8(opcode::DREM)?,
			Instruction::INeg => w.write_u8(opcode::INEG)?,
			Instruction::LNeg => w.write_u8(opcode::LNEG)?,
			Instruction::FNeg => w.write_u8(opcode::FNEG)?,
			Instruction::DNeg => w.write_u8(opcode::DNEG)?,
			Instruction::IShl => w.write_u8(opcode::ISHL)?,
			Instruction::LShl => w.write_u8(opcode::LSHL)?,
			Instruction::IShr => w.write_u8(opcode::ISHR)?,
			Instruction::LShr => w.write_u8(opcode::LSHR)?,
			Instruction::IUShr => w.write_u8(opcode::IUSHR)?,
			Instruction::LUShr => w.write_u8(opcode::LUSHR)?,
			Instruction::IAnd => w.write_u8(opcode::IAND)?,
			Instruction::LAnd => w.write_u8(opcode::LAND)?,
			Instruction::IOr => w.write_u8(opcode::IOR)?,
			Instruction::LOr => w.write_u8(opcode::LOR)?,
			Instruction::IXor => w.write_u8(opcode::IXOR)?,
			Instruction::LXor => w.write_u8(opcode::LXOR)?,
			Instruction::IInc(lv, value) => {
				match (u8::try_from(lv.index), i8::try_from(*value)) {
					(Ok(index), Ok(value)) => {
						w.write_u8(opcode::IINC)?;
						w.write_u8(index)?;
						w.write_i8(value)?;
					},
					_ => {
						w.write_u8(opcode::WIDE)?;
						w.write_u8(opcode::IINC)?;
						w.write_u16(lv.index)?;
						w.write_i16(*value)?;
					},
				}
			},
			Instruction::I2L => w.write_u8(opcode::I2L)?,
			Instruction::I2F => w.write_u8(opcode::I2F)?,
			Instruction::I2D => w.write_u8(opcode::I2D)?,
			Instruction::L2I => w.write_u8(opcode::L2I)?,
			Instruction::L2F => w.write_u8(opcode::L2F)?,
			Instruction::L2D => w.write_u8(opcode::L2D)?,
			Instruction::F2I => w.write_u8(opcode::F2I)?,
			Instruction::F2L => w.write_u8(opcode::F2L)?,
			Instruction::F2D => w.write_u8(opcode::F2D)?,
			Instruction::D2I => w.write_u8(opcode::D2I)?,
			Instruction::D2L => w.write_u8(opcode::D2L)?,
			Instruction::D2F => w.write_u8(opcode::D2F)?,
			Instruction::I2B => w.write_u8(opcode::I2B)?,
			Instruction::I2C => w.write_u8(opcode::I2C)?,
			Instruction::I2S => w.write_u8(opcode::I2S)?,
			Instruction::LCmp => w.write_u8(opcode::LCMP)?,
			Instruction::FCmpL => w.write_u8(opcode::FCMPL)?,
			Instruction::FCmpG => w.write_u8(opcode::FCMPG)?,
			Instruction::DCmpL => w.write_u8(opcode::DCMPL)?,
			Instruction::DCmpG => w.write_u8(opcode::DCMPG)?,
			Instruction::IfEq(label) => self.if_helper(index, pos, opcode::IFEQ, *label)?,
			Instruction::IfNe(label) => self.if_helper(index, pos, opcode::IFNE, *label)?,
			Instruction::IfLt(label) => self.if_helper(index, pos, opcode::IFLT, *label)?,
			Instruction::IfGe(label) => self.if_helper(index, pos, opcode::IFGE, *label)?,
			Instruction::IfGt(label) => self.if_helper(index, pos, opcode::IFGT, *label)?,
			Instruction::IfLe(label) => self.if_helper(index, pos, opcode::IFLE, *label)?,
			Instruction::IfICmpEq(label) => self.if_helper(index, pos, opcode::IF_ICMPEQ, *label)?,
			Instruction::IfICmpNe(label) => self.if_helper(index, pos, opcode::IF_ICMPNE, *label)?,
			Instruction::IfICmpLt(label) => self.if_helper(index, pos, opcode::IF_ICMPLT, *label)?,
			Instruction::IfICmpGe(label) => self.if_helper(index, pos, opcode::IF_ICMPGE, *label)?,
			Instruction::IfICmpGt(label) => self.if_helper(index, pos, opcode::IF_ICMPGT, *label)?,
			Instruction::IfICmpLe(label) => self.if_helper(index, pos, opcode::IF_ICMPLE, *label)?,
			Instruction::IfACmpEq(label) => self.if_helper(index, pos, opcode::IF_ACMPEQ, *label)?,
			Instruction::IfACmpNe(label) => self.if_helper(index, pos, opcode::IF_ACMPNE, *label)?,
			Instruction::Goto(label) => self.goto_helper(index, pos, opcode::GOTO, opcode::GOTO_W, *label)?,
			Instruction::Jsr(label) => self.goto_helper(index, pos, opcode::JSR, opcode::JSR_W, *label)?,
			Instruction::Ret(lv) => self.local_helper(opcode::RET, None, *lv)?,
			Instruction::TableSwitch { default, low, high, table } => {
				if low > high || table.len() as i64 != *high as i64 - *low as i64 + 1 {
					bail!("`tableswitch` with {} targets for the keys {low} to {high}", table.len());
				}
				w.write_u8(opcode::TABLESWITCH)?;
				align_to_4_byte_boundary(w)?;
				self.switch_helper(index, pos, *default)?;
				self.w.write_i32(*low)?;
				self.w.write_i32(*high)?;
				for &label in table {
					self.switch_helper(index, pos, label)?;
				}
			},
			Instruction::LookupSwitch { default, pairs } => {
				if pairs.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
					bail!("`lookupswitch` keys must be sorted and unique");
				}
				w.write_u8(opcode::LOOKUPSWITCH)?;
				align_to_4_byte_boundary(w)?;
				self.switch_helper(index, pos, *default)?;
				let npairs = i32::try_from(pairs.len()).map_err(|_| CodecError::TooLarge { what: "`lookupswitch` pairs" })?;
				self.w.write_i32(npairs)?;
				for &(key, label) in pairs {
					self.w.write_i32(key)?;
					self.switch_helper(index, pos, label)?;
				}
			},
			Instruction::IReturn => w.write_u8(opcode::IRETURN)?,
			Instruction::LReturn => w.write_u8(opcode::LRETURN)?,
			Instruction::FReturn => w.write_u8(opcode::FRETURN)?,
			Instruction::DReturn => w.write_u8(opcode::DRETURN)?,
			Instruction::AReturn => w.write_u8(opcode::ARETURN)?,
			Instruction::Return => w.write_u8(opcode::RETURN)?,
			Instruction::GetStatic(field) => {
				w.write_u8(opcode::GETSTATIC)?;
				w.write_u16(pool.put_field_ref(field)?)?;
			},
			Instruction::PutStatic(field) => {
				w.write_u8(opcode::PUTSTATIC)?;
				w.write_u16(pool.put_field_ref(field)?)?;
			},
			Instruction::GetField(field) => {
				w.write_u8(opcode::GETFIELD)?;
				w.write_u16(pool.put_field_ref(field)?)?;
			},
			Instruction::PutField(field) => {
				w.write_u8(opcode::PUTFIELD)?;
				w.write_u16(pool.put_field_ref(field)?)?;
			},
			Instruction::InvokeVirtual(method) => {
				w.write_u8(opcode::INVOKEVIRTUAL)?;
				w.write_u16(pool.put_method_ref(method)?)?;
			},
			Instruction::InvokeSpecial(method, is_interface) => {
				w.write_u8(opcode::INVOKESPECIAL)?;
				w.write_u16(pool.put_method_ref_or_interface_method_ref(method, *is_interface)?)?;
			},
			Instruction::InvokeStatic(method, is_interface) => {
				w.write_u8(opcode::INVOKESTATIC)?;
				w.write_u16(pool.put_method_ref_or_interface_method_ref(method, *is_interface)?)?;
			},
			Instruction::InvokeInterface(method) => {
				w.write_u8(opcode::INVOKEINTERFACE)?;
				w.write_u16(pool.put_interface_method_ref(method)?)?;
				w.write_u8(method.desc.arguments_size()?)?;
				w.write_u8(0)?;
			},
			Instruction::InvokeDynamic(invoke_dynamic) => {
				w.write_u8(opcode::INVOKEDYNAMIC)?;
				w.write_u16(pool.put_invoke_dynamic(invoke_dynamic)?)?;
				w.write_u16(0)?;
			},
			Instruction::New(class) => {
				w.write_u8(opcode::NEW)?;
				w.write_u16(pool.put_class(class)?)?;
			},
			Instruction::NewArray(array_type) => {
				w.write_u8(opcode::NEWARRAY)?;
				w.write_u8(array_type.to_atype())?;
			},
			Instruction::ANewArray(class) => {
				w.write_u8(opcode::ANEWARRAY)?;
				w.write_u16(pool.put_class(class)?)?;
			},
			Instruction::ArrayLength => w.write_u8(opcode::ARRAYLENGTH)?,
			Instruction::AThrow => w.write_u8(opcode::ATHROW)?,
			Instruction::CheckCast(class) => {
				w.write_u8(opcode::CHECKCAST)?;
				w.write_u16(pool.put_class(class)?)?;
			},
			Instruction::InstanceOf(class) => {
				w.write_u8(opcode::INSTANCEOF)?;
				w.write_u16(pool.put_class(class)?)?;
			},
			Instruction::MonitorEnter => w.write_u8(opcode::MONITORENTER)?,
			Instruction::MonitorExit => w.write_u8(opcode::MONITOREXIT)?,
			Instruction::MultiANewArray(class, dimensions) => {
				if *dimensions == 0 {
					bail!("`multianewarray` needs at least one dimension");
				}
				w.write_u8(opcode::MULTIANEWARRAY)?;
				w.write_u16(pool.put_class(class)?)?;
				w.write_u8(*dimensions)?;
			},
			Instruction::IfNull(label) => self.if_helper(index, pos, opcode::IFNULL, *label)?,
			Instruction::IfNonNull(label) => self.if_helper(index, pos, opcode::IFNONNULL, *label)?,
		}
		Ok(())
	}
}

/// Writes the instructions into a code array, picking the short form of each jump unless its offset doesn't fit
/// an `i16`.
///
/// Forward jumps are reserved and patched at the end. If one of them doesn't fit, it's marked as wide and the
/// whole code is written again. Jumps only ever get longer, so this terminates.
fn write_instructions(code: &Code, pool: &mut PoolWrite) -> Result<(Vec<u8>, Labels)> {
	let mut wide = HashSet::new();

	'attempt: loop {
		let mut state = CodeWrite {
			code,
			w: Vec::new(),
			labels: Labels::new(code.instructions.len()),
			wide: &wide,
			unwritten: Vec::new(),
		};

		for (index, instruction) in code.instructions.iter().enumerate() {
			let pos = code_offset(state.w.len())?;
			state.labels.add_instruction(index, pos);
			state.write_instruction(pool, index, pos, instruction)
				.with_context(|| anyhow!("while writing the instruction {instruction:?} at index {index}"))?;
		}
		let CodeWrite { mut w, mut labels, unwritten, .. } = state;
		labels.add_instruction(code.instructions.len(), code_offset(w.len())?);

		for unwritten in unwritten {
			let target = labels.try_get(code, unwritten.label)?;
			let offset = target as i32 - unwritten.opcode_pos as i32;
			if unwritten.wide {
				put_i32_at(&mut w, unwritten.label_write_pos, offset);
			} else if let Ok(offset) = i16::try_from(offset) {
				put_i16_at(&mut w, unwritten.label_write_pos, offset);
			} else {
				trace!("jump at index {} with offset {offset} needs its wide form", unwritten.instruction_index);
				wide.insert(unwritten.instruction_index);
				continue 'attempt;
			}
		}

		return Ok((w, labels));
	}
}

/// Adds the frames needed after conditional jumps written as `if<!cond> +8; goto_w`. The inverted jump targets the
/// instruction after the `goto_w`, which then needs a frame like any other jump target.
///
/// Code without frames stays as it is.
fn with_frames_after_wide_jumps<'c>(
	class: &ClassFile,
	method: &Method,
	code: &'c Code,
	labels: &Labels,
	hierarchy: &ClassHierarchy,
) -> Result<Cow<'c, Code>> {
	let Some(stack_map) = &code.frames else {
		return Ok(Cow::Borrowed(code));
	};
	let framed: HashSet<usize> = stack_map.iter()
		.map(|(label, _)| code.resolve(*label))
		.collect::<Result<_>>()?;

	let missing: BTreeSet<usize> = code.instructions.iter().enumerate()
		.filter(|&(index, instruction)| {
			instruction.is_conditional_jump() && labels.length_of(index) == Some(8) &&
				index + 1 < code.instructions.len() && !framed.contains(&(index + 1))
		})
		.map(|(index, _)| index + 1)
		.collect();
	if missing.is_empty() {
		return Ok(Cow::Borrowed(code));
	}

	debug!("adding frames at {missing:?} of {:?} {:?}, after wide conditional jumps", method.name, method.descriptor);
	Ok(Cow::Owned(frames::add_frames(class, method, code, &missing, hierarchy)?))
}

/// Writes the body of the `Code` attribute. The maximum values must be known by now.
fn write_code(w: &mut Vec<u8>, pool: &mut PoolWrite, class: &ClassFile, method: &Method, code: &Code, hierarchy: &ClassHierarchy) -> Result<()> {
	let max_stack = code.max_stack.context("`max_stack` isn't known")?;
	let max_locals = code.max_locals.context("`max_locals` isn't known")?;

	let (bytes, labels) = write_instructions(code, pool)?;
	if bytes.is_empty() {
		bail!("code must contain at least one instruction");
	}
	let code = with_frames_after_wide_jumps(class, method, code, &labels, hierarchy)?;
	let code = &*code;

	w.write_u16(max_stack)?;
	w.write_u16(max_locals)?;
	w.write_usize_as_u32(bytes.len(), "code")?;
	w.write_u8_slice(&bytes)?;

	let mut exception_table = Vec::with_capacity(code.exception_table.len());
	for exception in &code.exception_table {
		let (start, length) = labels.try_get_range(code, exception.start, exception.end)?;
		if length == 0 {
			debug!("dropping exception table entry with empty range at bytecode offset {start}");
			continue;
		}
		let handler = labels.try_get(code, exception.handler)?;
		let catch = pool.put_optional(exception.catch.as_ref(), PoolWrite::put_class)?;
		exception_table.push([start, start + length, handler, catch]);
	}
	w.write_slice(&exception_table,
		|w, size| w.write_usize_as_u16(size, "exception table"),
		|w, entry| entry.iter().try_for_each(|&item| w.write_u16(item))
	)?;

	let mut attributes = AttributesWrite::new();
	if let Some(line_numbers) = &code.line_numbers {
		attributes.add(pool, attribute::LINE_NUMBER_TABLE, |w, _| {
			w.write_slice(line_numbers,
				|w, size| w.write_usize_as_u16(size, "line numbers"),
				|w, &(label, line_number)| {
					w.write_u16(labels.try_get(code, label)?)?;
					w.write_u16(line_number)
				}
			)
		})?;
	}
	if let Some(local_variables) = &code.local_variables {
		let with_descriptor: Vec<_> = local_variables.iter()
			.filter_map(|lv| lv.descriptor.as_ref().map(|descriptor| (lv, descriptor.as_java_str())))
			.collect();
		let with_signature: Vec<_> = local_variables.iter()
			.filter_map(|lv| lv.signature.as_ref().map(|signature| (lv, signature.as_java_str())))
			.collect();

		for (name, table) in [(attribute::LOCAL_VARIABLE_TABLE, with_descriptor), (attribute::LOCAL_VARIABLE_TYPE_TABLE, with_signature)] {
			if table.is_empty() {
				continue;
			}
			attributes.add(pool, name, |w, pool| {
				w.write_slice(&table,
					|w, size| w.write_usize_as_u16(size, "local variables"),
					|w, &(lv, descriptor)| {
						let (start, length) = labels.try_get_range(code, lv.start, lv.end)?;
						w.write_u16(start)?;
						w.write_u16(length)?;
						w.write_u16(pool.put_utf8(&lv.name)?)?;
						w.write_u16(pool.put_utf8(descriptor)?)?;
						w.write_u16(lv.index.index)
					}
				)
			})?;
		}
	}
	if let Some(frames) = &code.frames {
		attributes.add(pool, attribute::STACK_MAP_TABLE, |w, pool| write_stack_map_table(w, pool, code, &labels, frames))?;
	}
	attributes.add_raw(pool, &code.attributes)?;
	attributes.write(w)
}

fn write_stack_map_table(w: &mut Vec<u8>, pool: &mut PoolWrite, code: &Code, labels: &Labels, frames: &[(Label, StackMapData)]) -> Result<()> {
	w.write_usize_as_u16(frames.len(), "stack map frames")?;

	let mut previous: Option<u16> = None;
	for (label, frame) in frames {
		let offset = labels.try_get(code, *label)?;
		// The first frame is at `offset_delta`, each further one at `offset_delta + 1` after the one before.
		let offset_delta = match previous {
			None => offset,
			Some(previous) if offset > previous => offset - previous - 1,
			Some(previous) => bail!("stack map frame at bytecode offset {offset} doesn't come after the one at {previous}"),
		};
		previous = Some(offset);

		match frame {
			StackMapData::Same => {
				if offset_delta <= 63 {
					w.write_u8(offset_delta as u8)?;
				} else {
					w.write_u8(251)?;
					w.write_u16(offset_delta)?;
				}
			},
			StackMapData::SameLocals1StackItem { stack } => {
				if offset_delta <= 63 {
					w.write_u8(64 + offset_delta as u8)?;
				} else {
					w.write_u8(247)?;
					w.write_u16(offset_delta)?;
				}
				write_verification_type_info(w, pool, code, labels, stack)?;
			},
			StackMapData::Chop { k } => {
				if !(1..=3).contains(k) {
					bail!("`chop_frame` can only remove one to three locals, not {k}");
				}
				w.write_u8(251 - k)?;
				w.write_u16(offset_delta)?;
			},
			StackMapData::Append { locals } => {
				if !(1..=3).contains(&locals.len()) {
					bail!("`append_frame` can only add one to three locals, not {}", locals.len());
				}
				w.write_u8(251 + locals.len() as u8)?;
				w.write_u16(offset_delta)?;
				for local in locals {
					write_verification_type_info(w, pool, code, labels, local)?;
				}
			},
			StackMapData::Full { locals, stack } => {
				w.write_u8(255)?;
				w.write_u16(offset_delta)?;
				w.write_slice(locals,
					|w, size| w.write_usize_as_u16(size, "frame locals"),
					|w, local| write_verification_type_info(w, pool, code, labels, local)
				)?;
				w.write_slice(stack,
					|w, size| w.write_usize_as_u16(size, "frame stack"),
					|w, value| write_verification_type_info(w, pool, code, labels, value)
				)?;
			},
		}
	}
	Ok(())
}

fn write_verification_type_info(w: &mut Vec<u8>, pool: &mut PoolWrite, code: &Code, labels: &Labels, info: &VerificationTypeInfo) -> Result<()> {
	match info {
		VerificationTypeInfo::Top => w.write_u8(verification_type::TOP),
		VerificationTypeInfo::Integer => w.write_u8(verification_type::INTEGER),
		VerificationTypeInfo::Float => w.write_u8(verification_type::FLOAT),
		VerificationTypeInfo::Double => w.write_u8(verification_type::DOUBLE),
		VerificationTypeInfo::Long => w.write_u8(verification_type::LONG),
		VerificationTypeInfo::Null => w.write_u8(verification_type::NULL),
		VerificationTypeInfo::UninitializedThis => w.write_u8(verification_type::UNINITIALIZED_THIS),
		VerificationTypeInfo::Object(class) => {
			w.write_u8(verification_type::OBJECT)?;
			w.write_u16(pool.put_class(class)?)
		},
		VerificationTypeInfo::Uninitialized(label) => {
			w.write_u8(verification_type::UNINITIALIZED)?;
			w.write_u16(labels.try_get(code, *label)?)
		},
	}
}

fn write_record_component(w: &mut Vec<u8>, pool: &mut PoolWrite, component: &RecordComponent) -> Result<()> {
	w.write_u16(pool.put_utf8(&component.name)?)?;
	w.write_u16(pool.put_utf8(&component.descriptor)?)?;

	let mut attributes = AttributesWrite::new();
	if let Some(signature) = &component.signature {
		attributes.add(pool, attribute::SIGNATURE, |w, pool| w.write_u16(pool.put_utf8(signature)?))?;
	}
	attributes.add_annotations(pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, &component.runtime_visible_annotations)?;
	attributes.add_annotations(pool, attribute::RUNTIME_INVISIBLE_ANNOTATIONS, &component.runtime_invisible_annotations)?;
	attributes.add_type_annotations(pool, attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, &component.runtime_visible_type_annotations)?;
	attributes.add_type_annotations(pool, attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, &component.runtime_invisible_type_annotations)?;
	attributes.add_raw(pool, &component.attributes)?;
	attributes.write(w)
}

fn write_annotations(w: &mut Vec<u8>, pool: &mut PoolWrite, annotations: &[Annotation]) -> Result<()> {
	w.write_slice(annotations,
		|w, size| w.write_usize_as_u16(size, "annotations"),
		|w, annotation| write_annotation(w, pool, annotation)
	)
}

fn write_parameter_annotations(w: &mut Vec<u8>, pool: &mut PoolWrite, parameters: &[Vec<Annotation>]) -> Result<()> {
	w.write_slice(parameters,
		|w, size| w.write_usize_as_u8(size, "annotated parameters"),
		|w, annotations| write_annotations(w, pool, annotations)
	)
}

fn write_annotation(w: &mut Vec<u8>, pool: &mut PoolWrite, annotation: &Annotation) -> Result<()> {
	w.write_u16(pool.put_utf8(&annotation.annotation_type)?)?;
	w.write_slice(&annotation.element_value_pairs,
		|w, size| w.write_usize_as_u16(size, "element value pairs"),
		|w, pair| {
			w.write_u16(pool.put_utf8(&pair.name)?)?;
			write_element_value(w, pool, &pair.value)
		}
	)
}

fn write_element_value(w: &mut Vec<u8>, pool: &mut PoolWrite, value: &ElementValue) -> Result<()> {
	match value {
		ElementValue::Object(object) => {
			let (tag, index) = match object {
				Object::Byte(value) => (b'B', pool.put_integer(i32::from(*value))?),
				Object::Char(value) => (b'C', pool.put_integer(i32::from(*value))?),
				Object::Double(value) => (b'D', pool.put_double(*value)?),
				Object::Float(value) => (b'F', pool.put_float(*value)?),
				Object::Integer(value) => (b'I', pool.put_integer(*value)?),
				Object::Long(value) => (b'J', pool.put_long(*value)?),
				Object::Short(value) => (b'S', pool.put_integer(i32::from(*value))?),
				Object::Boolean(value) => (b'Z', pool.put_integer(i32::from(*value))?),
				Object::String(value) => (b's', pool.put_utf8(value)?),
			};
			w.write_u8(tag)?;
			w.write_u16(index)
		},
		ElementValue::Enum { type_name, const_name } => {
			w.write_u8(b'e')?;
			w.write_u16(pool.put_utf8(type_name)?)?;
			w.write_u16(pool.put_utf8(const_name)?)
		},
		ElementValue::Class(class) => {
			w.write_u8(b'c')?;
			w.write_u16(pool.put_utf8(class)?)
		},
		ElementValue::AnnotationInterface(annotation) => {
			w.write_u8(b'@')?;
			write_annotation(w, pool, annotation)
		},
		ElementValue::ArrayType(values) => {
			w.write_u8(b'[')?;
			w.write_slice(values,
				|w, size| w.write_usize_as_u16(size, "element values"),
				|w, value| write_element_value(w, pool, value)
			)
		},
	}
}

/// The `target_type` and `target_info` items of a type annotation.
trait TargetInfoWrite {
	fn write_target_info(&self, w: &mut Vec<u8>) -> Result<()>;
}

impl TargetInfoWrite for TargetInfoClass {
	fn write_target_info(&self, w: &mut Vec<u8>) -> Result<()> {
		match *self {
			TargetInfoClass::ClassTypeParameter { index } => {
				w.write_u8(type_annotation::CLASS_TYPE_PARAMETER)?;
				w.write_u8(index)
			},
			TargetInfoClass::Extends => {
				w.write_u8(type_annotation::CLASS_EXTENDS)?;
				w.write_u16(u16::MAX)
			},
			TargetInfoClass::Implements { index } => {
				w.write_u8(type_annotation::CLASS_EXTENDS)?;
				w.write_u16(index)
			},
			TargetInfoClass::ClassTypeParameterBound { type_parameter_index, bound_index } => {
				w.write_u8(type_annotation::CLASS_TYPE_PARAMETER_BOUND)?;
				w.write_u8(type_parameter_index)?;
				w.write_u8(bound_index)
			},
		}
	}
}

impl TargetInfoWrite for TargetInfoField {
	fn write_target_info(&self, w: &mut Vec<u8>) -> Result<()> {
		match self {
			TargetInfoField::Field => w.write_u8(type_annotation::FIELD),
		}
	}
}

impl TargetInfoWrite for TargetInfoMethod {
	fn write_target_info(&self, w: &mut Vec<u8>) -> Result<()> {
		match *self {
			TargetInfoMethod::MethodTypeParameter { index } => {
				w.write_u8(type_annotation::METHOD_TYPE_PARAMETER)?;
				w.write_u8(index)
			},
			TargetInfoMethod::MethodTypeParameterBound { type_parameter_index, bound_index } => {
				w.write_u8(type_annotation::METHOD_TYPE_PARAMETER_BOUND)?;
				w.write_u8(type_parameter_index)?;
				w.write_u8(bound_index)
			},
			TargetInfoMethod::Return => w.write_u8(type_annotation::METHOD_RETURN),
			TargetInfoMethod::Receiver => w.write_u8(type_annotation::METHOD_RECEIVER),
			TargetInfoMethod::FormalParameter { index } => {
				w.write_u8(type_annotation::METHOD_FORMAL_PARAMETER)?;
				w.write_u8(index)
			},
			TargetInfoMethod::Throws { index } => {
				w.write_u8(type_annotation::THROWS)?;
				w.write_u16(index)
			},
		}
	}
}

fn write_type_path(w: &mut Vec<u8>, type_path: &TypePath) -> Result<()> {
	w.write_slice(&type_path.path,
		|w, size| w.write_usize_as_u8(size, "type path"),
		|w, kind| {
			let (type_path_kind, type_argument_index) = match *kind {
				TypePathKind::ArrayDeeper => (0, 0),
				TypePathKind::NestedDeeper => (1, 0),
				TypePathKind::WildcardBound => (2, 0),
				TypePathKind::TypeArgument { index } => (3, index),
			};
			w.write_u8(type_path_kind)?;
			w.write_u8(type_argument_index)
		}
	)
}

fn write_module(w: &mut Vec<u8>, pool: &mut PoolWrite, module: &Module) -> Result<()> {
	w.write_u16(pool.put_module(&module.name)?)?;
	w.write_u16(module.flags.into())?;
	w.write_u16(pool.put_optional(module.version.as_deref(), PoolWrite::put_utf8)?)?;

	w.write_slice(&module.requires,
		|w, size| w.write_usize_as_u16(size, "module requires"),
		|w, requires| {
			w.write_u16(pool.put_module(&requires.name)?)?;
			w.write_u16(requires.flags.into())?;
			w.write_u16(pool.put_optional(requires.version.as_deref(), PoolWrite::put_utf8)?)
		}
	)?;
	w.write_slice(&module.exports,
		|w, size| w.write_usize_as_u16(size, "module exports"),
		|w, exports| {
			w.write_u16(pool.put_package(&exports.name)?)?;
			w.write_u16(exports.flags.into())?;
			w.write_slice(&exports.exports_to,
				|w, size| w.write_usize_as_u16(size, "module exports_to"),
				|w, module| w.write_u16(pool.put_module(module)?)
			)
		}
	)?;
	w.write_slice(&module.opens,
		|w, size| w.write_usize_as_u16(size, "module opens"),
		|w, opens| {
			w.write_u16(pool.put_package(&opens.name)?)?;
			w.write_u16(opens.flags.into())?;
			w.write_slice(&opens.opens_to,
				|w, size| w.write_usize_as_u16(size, "module opens_to"),
				|w, module| w.write_u16(pool.put_module(module)?)
			)
		}
	)?;
	write_classes(w, pool, &module.uses, "module uses")?;
	w.write_slice(&module.provides,
		|w, size| w.write_usize_as_u16(size, "module provides"),
		|w, provides| {
			w.write_u16(pool.put_class(&provides.name)?)?;
			write_classes(w, pool, &provides.provides_with, "module provides_with")
		}
	)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::class_writer::pool::PoolWrite;
	use crate::class_writer::{write_instructions, write_stack_map_table};
	use crate::error::CodecError;
	use crate::options::Options;
	use crate::tree::class::{ClassAccess, ClassFile, ClassName};
	use crate::tree::method::code::{Code, Instruction, LvIndex};
	use crate::tree::method::frame::{StackMapData, VerificationTypeInfo};
	use crate::tree::method::{Method, MethodAccess};
	use crate::tree::version::Version;

	fn instructions(instructions: Vec<Instruction>) -> Code {
		let mut code = Code::new();
		code.instructions = instructions;
		code
	}

	#[test]
	fn local_variable_forms() -> Result<()> {
		let code = instructions(vec![
			Instruction::ILoad(LvIndex { index: 0 }),
			Instruction::AStore(LvIndex { index: 3 }),
			Instruction::ILoad(LvIndex { index: 4 }),
			Instruction::ILoad(LvIndex { index: 300 }),
			Instruction::IInc(LvIndex { index: 1 }, 1),
			Instruction::IInc(LvIndex { index: 1 }, 200),
			Instruction::Return,
		]);
		let (bytes, _) = write_instructions(&code, &mut PoolWrite::new())?;
		assert_eq!(bytes, vec![
			0x1a,
			0x4e,
			0x15, 4,
			0xc4, 0x15, 0x01, 0x2c,
			0x84, 1, 1,
			0xc4, 0x84, 0, 1, 0, 200,
			0xb1,
		]);
		Ok(())
	}

	#[test]
	fn switch_padding() -> Result<()> {
		let mut code = Code::new();
		let end = code.label_at(2);
		code.instructions = vec![
			Instruction::IConst0,
			Instruction::TableSwitch { default: end, low: 0, high: 0, table: vec![end] },
			Instruction::Return,
		];
		let (bytes, labels) = write_instructions(&code, &mut PoolWrite::new())?;
		assert_eq!(bytes, vec![
			0x03,
			0xaa, 0, 0,
			0, 0, 0, 19,
			0, 0, 0, 0,
			0, 0, 0, 0,
			0, 0, 0, 19,
			0xb1,
		]);
		assert_eq!(labels.try_get(&code, end)?, 20);
		Ok(())
	}

	#[test]
	fn long_jumps_become_wide() -> Result<()> {
		let mut code = Code::new();
		let end = code.labels.create();
		code.instructions.push(Instruction::Goto(end));
		code.instructions.extend(std::iter::repeat(Instruction::Nop).take(33000));
		code.instructions.push(Instruction::Return);
		code.labels.bind(end, 33001)?;

		let (bytes, _) = write_instructions(&code, &mut PoolWrite::new())?;
		assert_eq!(&bytes[..5], &[0xc8, 0, 0, 0x80, 0xed]);
		assert_eq!(bytes.len(), 5 + 33000 + 1);

		// a conditional jump turns into the inverted condition skipping over a `goto_w`
		let mut code = Code::new();
		let end = code.labels.create();
		code.instructions.push(Instruction::IConst0);
		code.instructions.push(Instruction::IfEq(end));
		code.instructions.extend(std::iter::repeat(Instruction::Nop).take(33000));
		code.instructions.push(Instruction::Return);
		code.labels.bind(end, 33002)?;

		let (bytes, labels) = write_instructions(&code, &mut PoolWrite::new())?;
		assert_eq!(&bytes[..9], &[0x03, 0x9a, 0, 8, 0xc8, 0, 0, 0x80, 0xed]);
		assert_eq!(labels.try_get(&code, end)?, 33009);
		Ok(())
	}

	#[test]
	fn stack_map_table() -> Result<()> {
		let mut code = Code::new();
		let target = code.labels.create();
		code.instructions = vec![
			Instruction::IConst0,
			Instruction::IfEq(target),
			Instruction::IConst1,
			Instruction::Return,
		];
		code.labels.bind(target, 3)?;
		let at_two = code.label_at(2);
		let mut pool = PoolWrite::new();
		let (_, labels) = write_instructions(&code, &mut pool)?;

		let frames = vec![
			(at_two, StackMapData::SameLocals1StackItem { stack: VerificationTypeInfo::Integer }),
			(target, StackMapData::Chop { k: 1 }),
		];
		let mut bytes = Vec::new();
		write_stack_map_table(&mut bytes, &mut pool, &code, &labels, &frames)?;
		assert_eq!(bytes, vec![0, 2, 64 + 4, 1, 250, 0, 0]);

		let reversed: Vec<_> = frames.into_iter().rev().collect();
		assert!(write_stack_map_table(&mut Vec::new(), &mut pool, &code, &labels, &reversed).is_err());
		Ok(())
	}

	fn class_with(version: Version, code: Code) -> Result<ClassFile> {
		let mut class = ClassFile::new(version, ClassAccess::from(0x0021), ClassName::try_from("a/B")?, Some(ClassName::java_lang_object()), Vec::new());
		let mut method = Method::new(MethodAccess::from(0x0009), "f".try_into()?, "(I)V".try_into()?);
		method.code = Some(code);
		class.methods.push(method);
		Ok(class)
	}

	fn subroutine() -> Code {
		let mut code = Code::new();
		let body = code.label_at(2);
		code.instructions = vec![
			Instruction::Jsr(body),
			Instruction::Return,
			Instruction::AStore(LvIndex { index: 1 }),
			Instruction::Ret(LvIndex { index: 1 }),
		];
		code.max_stack = Some(1);
		code.max_locals = Some(2);
		code
	}

	#[test]
	fn subroutines_depend_on_the_version() -> Result<()> {
		let code = subroutine();

		let bytes = crate::encode(&class_with(Version::V1_6, code.clone())?, &Options::default())?;
		let decoded = crate::decode(&bytes, &Options::default())?;
		let decoded_code = decoded.methods[0].code.as_ref().map(|code| code.instructions.len());
		assert_eq!(decoded_code, Some(4));

		let err = crate::encode(&class_with(Version::V1_8, code.clone())?, &Options::default()).unwrap_err();
		assert_eq!(
			err.root_cause().downcast_ref::<CodecError>(),
			Some(&CodecError::IllegalForVersion { what: "`jsr` and `ret`", major: 52 })
		);

		let options = Options::default().with_target_version(Version::V1_7);
		let err = crate::encode(&class_with(Version::V1_6, code)?, &options).unwrap_err();
		assert_eq!(
			err.root_cause().downcast_ref::<CodecError>(),
			Some(&CodecError::IllegalForVersion { what: "`jsr` and `ret`", major: 51 })
		);
		Ok(())
	}

	#[test]
	fn frames_are_required_from_version_51() -> Result<()> {
		let mut code = Code::new();
		let end = code.labels.create();
		code.instructions = vec![
			Instruction::ILoad(LvIndex { index: 0 }),
			Instruction::IfEq(end),
			Instruction::Nop,
			Instruction::Return,
		];
		code.labels.bind(end, 3)?;
		code.max_stack = Some(1);
		code.max_locals = Some(1);
		let class = class_with(Version::V1_8, code)?;

		let err = crate::encode(&class, &Options::default()).unwrap_err();
		assert!(matches!(err.root_cause().downcast_ref::<CodecError>(), Some(CodecError::IllegalForVersion { major: 52, .. })));

		let bytes = crate::encode(&class, &Options::default().with_compute_frames(true))?;
		let decoded = crate::decode(&bytes, &Options::default())?;
		let code = decoded.methods[0].code.as_ref().expect("method has code");
		let frames = code.frames.clone().unwrap_or_default();
		assert_eq!(frames.len(), 1);
		assert_eq!(code.resolve(frames[0].0)?, 3);
		assert_eq!(frames[0].1, StackMapData::Same);
		Ok(())
	}
}
