use std::fmt::{Debug, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::class_constants::pool;
use crate::class_constants::pool::method_handle_reference;
use crate::{ClassRead, jstring};
use crate::error::CodecError;
use crate::tree::class::ClassName;
use crate::tree::field::{ConstantValue, FieldRef};
use crate::tree::method::MethodRef;
use crate::tree::method::code::{ConstantDynamic, Handle, InvokeDynamic, Loadable};
use crate::tree::module::{ModuleName, PackageName};

/// How deep the arguments of bootstrap methods may refer to other dynamic constants.
const MAX_BOOTSTRAP_DEPTH: u32 = 32;

/// A constant pool index together with the byte offset it was read from, for error reporting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PoolIndex {
	pub(crate) index: u16,
	pub(crate) offset: u64,
}

impl PoolIndex {
	pub(crate) fn is_zero(self) -> bool {
		self.index == 0
	}
}

pub(crate) trait ReadPoolIndex: ClassRead {
	fn read_pool_index(&mut self) -> Result<PoolIndex> {
		let offset = self.marker()?;
		let index = self.read_u16()?;
		Ok(PoolIndex { index, offset })
	}
}
impl<T: ClassRead> ReadPoolIndex for T {}

/// A small helper struct for reading. Represents a bootstrap method, but doesn't resolve the arguments yet.
#[derive(Debug, PartialEq)]
pub(crate) struct BootstrapMethodRead {
	pub(crate) handle: Handle,
	/// The arguments, as raw constant pool indices, since an argument may be a dynamic constant using another
	/// bootstrap method.
	pub(crate) arguments: Vec<PoolIndex>,
}

#[derive(Debug, Clone, PartialEq)]
enum PoolEntry {
	Class { name_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	String { string_index: u16 },
	Integer { bytes: i32 },
	Float { bytes: u32 },
	Long { bytes: i64 },
	Double { bytes: u64 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	Utf8 { string: JavaString },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

/// An entry looked up by its index, remembering where it was asked for and where it's stored.
struct Entry<'a> {
	entry: &'a PoolEntry,
	at: PoolIndex,
	/// The byte offset of the entry itself.
	offset: u64,
}

impl Entry<'_> {
	fn wrong_kind(&self, expected: &'static str) -> CodecError {
		CodecError::WrongEntryKind { index: self.at.index, expected, offset: self.at.offset }
	}

	/// An index stored inside this entry.
	fn nested(&self, index: u16) -> PoolIndex {
		PoolIndex { index, offset: self.offset }
	}
}

/// Converts a string into one of the checked name types, failing with [`CodecError::Malformed`].
pub(crate) fn checked<T>(value: JavaString, reason: &'static str, offset: u64) -> Result<T>
	where T: TryFrom<JavaString, Error = anyhow::Error>
{
	T::try_from(value)
		.map_err(|e| anyhow::Error::new(CodecError::Malformed { reason, offset }).context(format!("{e:#}")))
}

pub(crate) struct PoolRead {
	/// We store a [`None`] for the zero index, as well as for the upper indices of [`PoolEntry::Double`] and [`PoolEntry::Long`].
	inner: Vec<Option<(PoolEntry, u64)>>,
	pub(crate) bootstrap_methods: Option<Vec<BootstrapMethodRead>>,
}

impl PoolRead {
	/// Reads the constant pool from the specified reader. The first thing read is an `u16` specifying the size of the constant pool.
	///
	/// Afterward all references between the entries are checked to point to entries of the right kind.
	pub(crate) fn read(reader: &mut impl ClassRead) -> Result<PoolRead> {
		let mut pool = vec![None];

		let constant_pool_count = reader.read_u16_as_usize()?;
		while pool.len() < constant_pool_count {
			let offset = reader.marker()?;
			let entry = match reader.read_u8()? {
				pool::UTF8 => {
					let length = reader.read_u16_as_usize()?;
					let vec = reader.read_u8_vec(length)?;
					let string = jstring::from_vec_to_string(vec)
						.map_err(|e| anyhow::Error::new(CodecError::Malformed { reason: "invalid modified utf8", offset }).context(format!("{e:#}")))?;
					PoolEntry::Utf8 { string }
				},
				pool::INTEGER => PoolEntry::Integer { bytes: reader.read_i32()? },
				pool::FLOAT => PoolEntry::Float { bytes: reader.read_u32()? },
				pool::LONG => PoolEntry::Long { bytes: reader.read_i64()? },
				pool::DOUBLE => PoolEntry::Double { bytes: reader.read_u64()? },
				pool::CLASS => PoolEntry::Class { name_index: reader.read_u16()? },
				pool::STRING => PoolEntry::String { string_index: reader.read_u16()? },
				pool::FIELD_REF => PoolEntry::FieldRef { class_index: reader.read_u16()?, name_and_type_index: reader.read_u16()? },
				pool::METHOD_REF => PoolEntry::MethodRef { class_index: reader.read_u16()?, name_and_type_index: reader.read_u16()? },
				pool::INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef { class_index: reader.read_u16()?, name_and_type_index: reader.read_u16()? },
				pool::NAME_AND_TYPE => PoolEntry::NameAndType { name_index: reader.read_u16()?, descriptor_index: reader.read_u16()? },
				pool::METHOD_HANDLE => PoolEntry::MethodHandle { reference_kind: reader.read_u8()?, reference_index: reader.read_u16()? },
				pool::METHOD_TYPE => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
				pool::DYNAMIC => PoolEntry::Dynamic { bootstrap_method_attribute_index: reader.read_u16()?, name_and_type_index: reader.read_u16()? },
				pool::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic { bootstrap_method_attribute_index: reader.read_u16()?, name_and_type_index: reader.read_u16()? },
				pool::MODULE => PoolEntry::Module { name_index: reader.read_u16()? },
				pool::PACKAGE => PoolEntry::Package { name_index: reader.read_u16()? },
				tag => bail!(CodecError::InvalidTag { tag, offset }),
			};

			let wide = matches!(entry, PoolEntry::Long { .. } | PoolEntry::Double { .. });
			pool.push(Some((entry, offset)));
			if wide {
				if pool.len() >= constant_pool_count {
					bail!(CodecError::Malformed { reason: "`Long` or `Double` entry in the last constant pool slot", offset });
				}
				pool.push(None); // long and double take up two pool slots
			}
		}

		let pool = PoolRead { inner: pool, bootstrap_methods: None };
		pool.check_references()?;
		Ok(pool)
	}

	/// Checks that every index stored in an entry points to an entry of the kind it needs.
	fn check_references(&self) -> Result<()> {
		fn expect(pool: &PoolRead, at: PoolIndex, expected: &'static str, is: fn(&PoolEntry) -> bool) -> Result<()> {
			let entry = pool.get(at)?;
			if is(entry.entry) { Ok(()) } else { bail!(entry.wrong_kind(expected)) }
		}
		let utf8 = |e: &PoolEntry| matches!(e, PoolEntry::Utf8 { .. });
		let class = |e: &PoolEntry| matches!(e, PoolEntry::Class { .. });
		let name_and_type = |e: &PoolEntry| matches!(e, PoolEntry::NameAndType { .. });

		for (entry, offset) in self.inner.iter().flatten() {
			let at = |index: u16| PoolIndex { index, offset: *offset };
			match *entry {
				PoolEntry::Class { name_index: i } |
				PoolEntry::String { string_index: i } |
				PoolEntry::MethodType { descriptor_index: i } |
				PoolEntry::Module { name_index: i } |
				PoolEntry::Package { name_index: i } => expect(self, at(i), "Utf8", utf8)?,
				PoolEntry::FieldRef { class_index, name_and_type_index } |
				PoolEntry::MethodRef { class_index, name_and_type_index } |
				PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
					expect(self, at(class_index), "Class", class)?;
					expect(self, at(name_and_type_index), "NameAndType", name_and_type)?;
				},
				PoolEntry::NameAndType { name_index, descriptor_index } => {
					expect(self, at(name_index), "Utf8", utf8)?;
					expect(self, at(descriptor_index), "Utf8", utf8)?;
				},
				PoolEntry::MethodHandle { reference_kind, reference_index } => {
					let target = self.get(at(reference_index))?;
					let (expected, matching) = match reference_kind {
						method_handle_reference::GET_FIELD..=method_handle_reference::PUT_STATIC =>
							("FieldRef", matches!(target.entry, PoolEntry::FieldRef { .. })),
						method_handle_reference::INVOKE_VIRTUAL | method_handle_reference::NEW_INVOKE_SPECIAL =>
							("MethodRef", matches!(target.entry, PoolEntry::MethodRef { .. })),
						method_handle_reference::INVOKE_STATIC | method_handle_reference::INVOKE_SPECIAL =>
							("MethodRef` or `InterfaceMethodRef", matches!(target.entry, PoolEntry::MethodRef { .. } | PoolEntry::InterfaceMethodRef { .. })),
						method_handle_reference::INVOKE_INTERFACE =>
							("InterfaceMethodRef", matches!(target.entry, PoolEntry::InterfaceMethodRef { .. })),
						_ => bail!(CodecError::Malformed { reason: "unknown `MethodHandle` reference kind", offset: *offset }),
					};
					if !matching {
						bail!(target.wrong_kind(expected));
					}
				},
				PoolEntry::Dynamic { name_and_type_index, .. } |
				PoolEntry::InvokeDynamic { name_and_type_index, .. } => {
					expect(self, at(name_and_type_index), "NameAndType", name_and_type)?;
				},
				PoolEntry::Integer { .. } | PoolEntry::Float { .. } | PoolEntry::Long { .. } |
				PoolEntry::Double { .. } | PoolEntry::Utf8 { .. } => {},
			}
		}
		Ok(())
	}

	fn get(&self, at: PoolIndex) -> Result<Entry> {
		match self.inner.get(at.index as usize) {
			Some(Some((entry, offset))) => Ok(Entry { entry, at, offset: *offset }),
			// also the zero index and the upper half of a long or double
			_ => bail!(CodecError::IndexOutOfRange { index: at.index, offset: at.offset }),
		}
	}

	/// Returns [`None`] if the index is zero, otherwise returns [`Some`] of the result of the function `f`.
	pub(crate) fn get_optional<'a, T: 'a>(&'a self, at: PoolIndex, f: impl Fn(&'a PoolRead, PoolIndex) -> Result<T>) -> Result<Option<T>> {
		if at.is_zero() {
			Ok(None)
		} else {
			Ok(Some(f(self, at)?))
		}
	}

	pub(crate) fn get_utf8_ref(&self, at: PoolIndex) -> Result<&JavaStr> {
		let entry = self.get(at)?;
		let PoolEntry::Utf8 { string } = entry.entry else {
			bail!(entry.wrong_kind("Utf8"));
		};
		Ok(string)
	}

	pub(crate) fn get_utf8(&self, at: PoolIndex) -> Result<JavaString> {
		self.get_utf8_ref(at).map(JavaStr::to_owned)
	}

	/// Gets a `Utf8` entry and converts it into one of the checked name types.
	pub(crate) fn get_name<T>(&self, at: PoolIndex, reason: &'static str) -> Result<T>
		where T: TryFrom<JavaString, Error = anyhow::Error>
	{
		checked(self.get_utf8(at)?, reason, at.offset)
	}

	fn get_string(&self, at: PoolIndex) -> Result<JavaString> {
		let entry = self.get(at)?;
		let PoolEntry::String { string_index } = *entry.entry else {
			bail!(entry.wrong_kind("String"));
		};
		self.get_utf8(entry.nested(string_index))
	}

	pub(crate) fn get_class(&self, at: PoolIndex) -> Result<ClassName> {
		let entry = self.get(at)?;
		let PoolEntry::Class { name_index } = *entry.entry else {
			bail!(entry.wrong_kind("Class"));
		};
		checked(self.get_utf8(entry.nested(name_index))?, "invalid class name", entry.offset)
	}

	pub(crate) fn get_package(&self, at: PoolIndex) -> Result<PackageName> {
		let entry = self.get(at)?;
		let PoolEntry::Package { name_index } = *entry.entry else {
			bail!(entry.wrong_kind("Package"));
		};
		checked(self.get_utf8(entry.nested(name_index))?, "invalid package name", entry.offset)
	}

	pub(crate) fn get_module(&self, at: PoolIndex) -> Result<ModuleName> {
		let entry = self.get(at)?;
		let PoolEntry::Module { name_index } = *entry.entry else {
			bail!(entry.wrong_kind("Module"));
		};
		checked(self.get_utf8(entry.nested(name_index))?, "invalid module name", entry.offset)
	}

	pub(crate) fn get_name_and_type<A, B>(&self, at: PoolIndex) -> Result<(A, B)>
		where
			A: TryFrom<JavaString, Error = anyhow::Error>,
			B: TryFrom<JavaString, Error = anyhow::Error>,
	{
		let entry = self.get(at)?;
		let PoolEntry::NameAndType { name_index, descriptor_index } = *entry.entry else {
			bail!(entry.wrong_kind("NameAndType"));
		};
		let name = checked(self.get_utf8(entry.nested(name_index))?, "invalid member name", entry.offset)?;
		let descriptor = checked(self.get_utf8(entry.nested(descriptor_index))?, "invalid descriptor", entry.offset)?;
		Ok((name, descriptor))
	}

	fn get_member(&self, entry: &Entry, class_index: u16, name_and_type_index: u16) -> Result<MethodRef> {
		let class = self.get_class(entry.nested(class_index))?;
		let (name, desc) = self.get_name_and_type(entry.nested(name_and_type_index))?;
		Ok(MethodRef { class, name, desc })
	}

	pub(crate) fn get_field_ref(&self, at: PoolIndex) -> Result<FieldRef> {
		let entry = self.get(at)?;
		let PoolEntry::FieldRef { class_index, name_and_type_index } = *entry.entry else {
			bail!(entry.wrong_kind("FieldRef"));
		};
		let class = self.get_class(entry.nested(class_index))?;
		let (name, desc) = self.get_name_and_type(entry.nested(name_and_type_index))?;
		Ok(FieldRef { class, name, desc })
	}

	pub(crate) fn get_method_ref(&self, at: PoolIndex) -> Result<MethodRef> {
		let entry = self.get(at)?;
		let PoolEntry::MethodRef { class_index, name_and_type_index } = *entry.entry else {
			bail!(entry.wrong_kind("MethodRef"));
		};
		self.get_member(&entry, class_index, name_and_type_index)
	}

	pub(crate) fn get_interface_method_ref(&self, at: PoolIndex) -> Result<MethodRef> {
		let entry = self.get(at)?;
		let PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } = *entry.entry else {
			bail!(entry.wrong_kind("InterfaceMethodRef"));
		};
		self.get_member(&entry, class_index, name_and_type_index)
	}

	/// `true` indicates it was an `InterfaceMethodRef`, `false` that it was a `MethodRef`.
	pub(crate) fn get_method_ref_or_interface_method_ref(&self, at: PoolIndex) -> Result<(MethodRef, bool)> {
		let entry = self.get(at)?;
		let (class_index, name_and_type_index, is_interface) = match *entry.entry {
			PoolEntry::MethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, false),
			PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, true),
			_ => bail!(entry.wrong_kind("MethodRef` or `InterfaceMethodRef")),
		};
		Ok((self.get_member(&entry, class_index, name_and_type_index)?, is_interface))
	}

	pub(crate) fn get_integer(&self, at: PoolIndex) -> Result<i32> {
		let entry = self.get(at)?;
		let PoolEntry::Integer { bytes } = *entry.entry else {
			bail!(entry.wrong_kind("Integer"));
		};
		Ok(bytes)
	}
	pub(crate) fn get_integer_as_byte(&self, at: PoolIndex) -> Result<i8> {
		i8::try_from(self.get_integer(at)?)
			.map_err(|_| anyhow!(CodecError::Malformed { reason: "byte constant out of range", offset: at.offset }))
	}
	pub(crate) fn get_integer_as_char(&self, at: PoolIndex) -> Result<u16> {
		u16::try_from(self.get_integer(at)?)
			.map_err(|_| anyhow!(CodecError::Malformed { reason: "char constant out of range", offset: at.offset }))
	}
	pub(crate) fn get_integer_as_short(&self, at: PoolIndex) -> Result<i16> {
		i16::try_from(self.get_integer(at)?)
			.map_err(|_| anyhow!(CodecError::Malformed { reason: "short constant out of range", offset: at.offset }))
	}
	pub(crate) fn get_integer_as_boolean(&self, at: PoolIndex) -> Result<bool> {
		match self.get_integer(at)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => bail!(CodecError::Malformed { reason: "boolean constant neither 0 nor 1", offset: at.offset }),
		}
	}
	pub(crate) fn get_double(&self, at: PoolIndex) -> Result<f64> {
		let entry = self.get(at)?;
		let PoolEntry::Double { bytes } = *entry.entry else {
			bail!(entry.wrong_kind("Double"));
		};
		Ok(f64::from_bits(bytes))
	}
	pub(crate) fn get_float(&self, at: PoolIndex) -> Result<f32> {
		let entry = self.get(at)?;
		let PoolEntry::Float { bytes } = *entry.entry else {
			bail!(entry.wrong_kind("Float"));
		};
		Ok(f32::from_bits(bytes))
	}
	pub(crate) fn get_long(&self, at: PoolIndex) -> Result<i64> {
		let entry = self.get(at)?;
		let PoolEntry::Long { bytes } = *entry.entry else {
			bail!(entry.wrong_kind("Long"));
		};
		Ok(bytes)
	}

	pub(crate) fn get_method_handle(&self, at: PoolIndex) -> Result<Handle> {
		let entry = self.get(at)?;
		let PoolEntry::MethodHandle { reference_kind, reference_index } = *entry.entry else {
			bail!(entry.wrong_kind("MethodHandle"));
		};
		let reference = entry.nested(reference_index);

		let handle = match reference_kind {
			method_handle_reference::GET_FIELD => Handle::GetField(self.get_field_ref(reference)?),
			method_handle_reference::GET_STATIC => Handle::GetStatic(self.get_field_ref(reference)?),
			method_handle_reference::PUT_FIELD => Handle::PutField(self.get_field_ref(reference)?),
			method_handle_reference::PUT_STATIC => Handle::PutStatic(self.get_field_ref(reference)?),
			method_handle_reference::INVOKE_VIRTUAL => Handle::InvokeVirtual(self.get_method_ref(reference)?),
			method_handle_reference::INVOKE_STATIC => {
				let (method_ref, is_interface) = self.get_method_ref_or_interface_method_ref(reference)?;
				Handle::InvokeStatic(method_ref, is_interface)
			},
			method_handle_reference::INVOKE_SPECIAL => {
				let (method_ref, is_interface) = self.get_method_ref_or_interface_method_ref(reference)?;
				Handle::InvokeSpecial(method_ref, is_interface)
			},
			method_handle_reference::NEW_INVOKE_SPECIAL => Handle::NewInvokeSpecial(self.get_method_ref(reference)?),
			method_handle_reference::INVOKE_INTERFACE => Handle::InvokeInterface(self.get_interface_method_ref(reference)?),
			_ => bail!(CodecError::Malformed { reason: "unknown `MethodHandle` reference kind", offset: entry.offset }),
		};

		Ok(handle)
	}

	fn get_method_type(&self, at: PoolIndex) -> Result<crate::tree::method::MethodDescriptor> {
		let entry = self.get(at)?;
		let PoolEntry::MethodType { descriptor_index } = *entry.entry else {
			bail!(entry.wrong_kind("MethodType"));
		};
		checked(self.get_utf8(entry.nested(descriptor_index))?, "invalid method descriptor", entry.offset)
	}

	/// Looks up the bootstrap method and resolves its arguments.
	fn get_bootstrap_method(&self, entry: &Entry, bootstrap_method_attribute_index: u16, depth: u32) -> Result<(Handle, Vec<Loadable>)> {
		let Some(method) = self.bootstrap_methods.as_ref()
			.and_then(|methods| methods.get(bootstrap_method_attribute_index as usize)) else {
			bail!(CodecError::Malformed { reason: "missing bootstrap method", offset: entry.offset });
		};
		let mut arguments = Vec::with_capacity(method.arguments.len());
		for &argument in &method.arguments {
			let value = self.get_loadable_nested(argument, depth + 1)
				.with_context(|| anyhow!("while getting argument of bootstrap method {bootstrap_method_attribute_index} {:?}", method.handle))?;
			arguments.push(value);
		}
		Ok((method.handle.clone(), arguments))
	}

	fn get_dynamic(&self, at: PoolIndex, depth: u32) -> Result<ConstantDynamic> {
		let entry = self.get(at)?;
		let PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index } = *entry.entry else {
			bail!(entry.wrong_kind("Dynamic"));
		};
		let (name, descriptor) = self.get_name_and_type(entry.nested(name_and_type_index))?;
		let (handle, arguments) = self.get_bootstrap_method(&entry, bootstrap_method_attribute_index, depth)?;
		Ok(ConstantDynamic { name, descriptor, handle, arguments })
	}

	pub(crate) fn get_invoke_dynamic(&self, at: PoolIndex) -> Result<InvokeDynamic> {
		let entry = self.get(at)?;
		let PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index } = *entry.entry else {
			bail!(entry.wrong_kind("InvokeDynamic"));
		};
		let (name, descriptor) = self.get_name_and_type(entry.nested(name_and_type_index))?;
		let (handle, arguments) = self.get_bootstrap_method(&entry, bootstrap_method_attribute_index, 0)?;
		Ok(InvokeDynamic { name, descriptor, handle, arguments })
	}

	/// Gets a loadable constant pool entry.
	///
	/// Loadable entries are `Integer`, `Float`, `Long`, `Double`, `Class`, `String`, `MethodHandle`, `MethodType`
	/// and `Dynamic`.
	pub(crate) fn get_loadable(&self, at: PoolIndex) -> Result<Loadable> {
		self.get_loadable_nested(at, 0)
	}

	fn get_loadable_nested(&self, at: PoolIndex, depth: u32) -> Result<Loadable> {
		if depth > MAX_BOOTSTRAP_DEPTH {
			bail!(CodecError::Malformed { reason: "dynamic constants nest too deep", offset: at.offset });
		}
		let entry = self.get(at)?;
		Ok(match entry.entry {
			PoolEntry::Integer { .. } => Loadable::Integer(self.get_integer(at)?),
			PoolEntry::Float { .. } => Loadable::Float(self.get_float(at)?),
			PoolEntry::Long { .. } => Loadable::Long(self.get_long(at)?),
			PoolEntry::Double { .. } => Loadable::Double(self.get_double(at)?),
			PoolEntry::Class { .. } => Loadable::Class(self.get_class(at)?),
			PoolEntry::String { .. } => Loadable::String(self.get_string(at)?),
			PoolEntry::MethodHandle { .. } => Loadable::MethodHandle(self.get_method_handle(at)?),
			PoolEntry::MethodType { .. } => Loadable::MethodType(self.get_method_type(at)?),
			PoolEntry::Dynamic { .. } => Loadable::Dynamic(self.get_dynamic(at, depth)?),
			_ => bail!(entry.wrong_kind("loadable constant")),
		})
	}

	pub(crate) fn get_constant_value(&self, at: PoolIndex) -> Result<ConstantValue> {
		let entry = self.get(at)?;
		Ok(match entry.entry {
			PoolEntry::Integer { .. } => ConstantValue::Integer(self.get_integer(at)?),
			PoolEntry::Float { .. } => ConstantValue::Float(self.get_float(at)?),
			PoolEntry::Long { .. } => ConstantValue::Long(self.get_long(at)?),
			PoolEntry::Double { .. } => ConstantValue::Double(self.get_double(at)?),
			PoolEntry::String { .. } => ConstantValue::String(self.get_string(at)?),
			_ => bail!(entry.wrong_kind("Integer`, `Float`, `Long`, `Double` or `String")),
		})
	}
}

impl Debug for PoolRead {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let mut d = f.debug_map();
		for (i, slot) in self.inner.iter().enumerate() {
			if let Some((entry, offset)) = slot {
				d.entry(&i, &format_args!("{entry:?} at {offset}"));
			}
		}
		d.finish()
	}
}

#[cfg(test)]
mod testing {
	use std::io::Cursor;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::class_reader::pool::{PoolIndex, PoolRead};
	use crate::error::CodecError;
	use crate::tree::field::ConstantValue;
	use crate::tree::method::code::Loadable;

	fn at(index: u16) -> PoolIndex {
		PoolIndex { index, offset: 100 }
	}

	fn codec_error(err: &anyhow::Error) -> Option<&CodecError> {
		err.root_cause().downcast_ref::<CodecError>()
	}

	#[test]
	fn read_entries() -> Result<()> {
		let bytes = vec![
			0, 7, // count
			1, 0, 3, b'F', b'o', b'o', // 1: Utf8 "Foo"
			7, 0, 1, // 2: Class #1
			5, 0, 0, 0, 0, 0, 0, 0, 42, // 3, 4: Long 42
			8, 0, 1, // 5: String #1
			3, 0xff, 0xff, 0xff, 0xfe, // 6: Integer -2
		];
		let pool = PoolRead::read(&mut Cursor::new(bytes))?;

		assert_eq!(pool.get_class(at(2))?.to_string(), "Foo");
		assert_eq!(pool.get_loadable(at(3))?, Loadable::Long(42));
		assert_eq!(pool.get_constant_value(at(5))?, ConstantValue::String("Foo".into()));
		assert_eq!(pool.get_integer(at(6))?, -2);
		assert_eq!(pool.get_optional(at(0), PoolRead::get_class)?, None);

		let err = pool.get_class(at(4)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::IndexOutOfRange { index: 4, offset: 100 }));
		let err = pool.get_class(at(7)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::IndexOutOfRange { index: 7, offset: 100 }));
		let err = pool.get_class(at(1)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::WrongEntryKind { index: 1, expected: "Class", offset: 100 }));
		assert_eq!(pool.get_integer_as_byte(at(6))?, -2);
		Ok(())
	}

	#[test]
	fn unknown_tag() {
		let bytes = vec![0, 2, 2, 0, 0];
		let err = PoolRead::read(&mut Cursor::new(bytes)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::InvalidTag { tag: 2, offset: 2 }));
	}

	#[test]
	fn references_are_checked_eagerly() {
		let bytes = vec![
			0, 3,
			3, 0, 0, 0, 1, // 1: Integer 1
			7, 0, 1, // 2: Class #1, which is wrong
		];
		let err = PoolRead::read(&mut Cursor::new(bytes)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::WrongEntryKind { index: 1, expected: "Utf8", offset: 7 }));
	}

	#[test]
	fn truncated_pool() {
		let bytes = vec![0, 2, 1, 0, 10, b'a'];
		let err = PoolRead::read(&mut Cursor::new(bytes)).unwrap_err();
		assert_eq!(codec_error(&err), Some(&CodecError::Truncated { offset: 6 }));
	}
}
