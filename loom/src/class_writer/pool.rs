use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::class_constants::pool;
use crate::class_constants::pool::method_handle_reference;
use crate::ClassWrite;
use crate::error::CodecError;
use crate::jstring;
use crate::tree::class::ClassName;
use crate::tree::field::{ConstantValue, FieldRef};
use crate::tree::method::MethodRef;
use crate::tree::method::code::{ConstantDynamic, Handle, InvokeDynamic, Loadable};
use crate::tree::module::{ModuleName, PackageName};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
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

impl PoolEntry {
	/// Whether the entry takes up two indices.
	fn is_wide(&self) -> bool {
		matches!(self, PoolEntry::Long { .. } | PoolEntry::Double { .. })
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		match self {
			PoolEntry::Class { name_index } => {
				writer.write_u8(pool::CLASS)?;
				writer.write_u16(*name_index)?;
			},
			PoolEntry::FieldRef { class_index, name_and_type_index } => {
				writer.write_u8(pool::FIELD_REF)?;
				writer.write_u16(*class_index)?;
				writer.write_u16(*name_and_type_index)?;
			},
			PoolEntry::MethodRef { class_index, name_and_type_index } => {
				writer.write_u8(pool::METHOD_REF)?;
				writer.write_u16(*class_index)?;
				writer.write_u16(*name_and_type_index)?;
			},
			PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
				writer.write_u8(pool::INTERFACE_METHOD_REF)?;
				writer.write_u16(*class_index)?;
				writer.write_u16(*name_and_type_index)?;
			},
			PoolEntry::String { string_index } => {
				writer.write_u8(pool::STRING)?;
				writer.write_u16(*string_index)?;
			},
			PoolEntry::Integer { bytes } => {
				writer.write_u8(pool::INTEGER)?;
				writer.write_i32(*bytes)?;
			},
			PoolEntry::Float { bytes } => {
				writer.write_u8(pool::FLOAT)?;
				writer.write_u32(*bytes)?;
			},
			PoolEntry::Long { bytes } => {
				writer.write_u8(pool::LONG)?;
				writer.write_i64(*bytes)?;
			},
			PoolEntry::Double { bytes } => {
				writer.write_u8(pool::DOUBLE)?;
				writer.write_u64(*bytes)?;
			},
			PoolEntry::NameAndType { name_index, descriptor_index } => {
				writer.write_u8(pool::NAME_AND_TYPE)?;
				writer.write_u16(*name_index)?;
				writer.write_u16(*descriptor_index)?;
			},
			PoolEntry::Utf8 { string } => {
				writer.write_u8(pool::UTF8)?;
				let vec = jstring::from_string_to_vec(string);
				writer.write_usize_as_u16(vec.len(), "`Utf8` constant pool entry")?;
				writer.write_u8_slice(&vec)?;
			},
			PoolEntry::MethodHandle { reference_kind, reference_index } => {
				writer.write_u8(pool::METHOD_HANDLE)?;
				writer.write_u8(*reference_kind)?;
				writer.write_u16(*reference_index)?;
			},
			PoolEntry::MethodType { descriptor_index } => {
				writer.write_u8(pool::METHOD_TYPE)?;
				writer.write_u16(*descriptor_index)?;
			},
			PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index } => {
				writer.write_u8(pool::DYNAMIC)?;
				writer.write_u16(*bootstrap_method_attribute_index)?;
				writer.write_u16(*name_and_type_index)?;
			},
			PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index } => {
				writer.write_u8(pool::INVOKE_DYNAMIC)?;
				writer.write_u16(*bootstrap_method_attribute_index)?;
				writer.write_u16(*name_and_type_index)?;
			},
			PoolEntry::Module { name_index } => {
				writer.write_u8(pool::MODULE)?;
				writer.write_u16(*name_index)?;
			},
			PoolEntry::Package { name_index } => {
				writer.write_u8(pool::PACKAGE)?;
				writer.write_u16(*name_index)?;
			},
		}
		Ok(())
	}
}

/// One entry of the `BootstrapMethods` attribute. The arguments are already in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BootstrapMethodWrite {
	pub(crate) handle: Handle,
	pub(crate) arguments: Vec<u16>,
}

/// Builds a constant pool, handing out one index per distinct entry.
#[derive(Debug)]
pub(crate) struct PoolWrite {
	/// The index the next entry gets.
	count: u16,
	inner: Vec<PoolEntry>,
	map: HashMap<PoolEntry, u16>,
	bootstrap_methods: Vec<BootstrapMethodWrite>,
	bootstrap_methods_map: HashMap<BootstrapMethodWrite, u16>,
}

impl PoolWrite {
	pub(crate) fn new() -> PoolWrite {
		PoolWrite {
			count: 1,
			inner: Vec::new(),
			map: HashMap::new(),
			bootstrap_methods: Vec::new(),
			bootstrap_methods_map: HashMap::new(),
		}
	}

	/// Writes the `constant_pool_count` and the `constant_pool` items.
	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.count)?;
		for entry in &self.inner {
			entry.write(writer)?;
		}
		Ok(())
	}

	/// Takes out the bootstrap methods collected so far, for writing the `BootstrapMethods` attribute.
	pub(crate) fn take_bootstrap_methods(&mut self) -> Vec<BootstrapMethodWrite> {
		self.bootstrap_methods_map.clear();
		std::mem::take(&mut self.bootstrap_methods)
	}

	fn put(&mut self, entry: PoolEntry) -> Result<u16> {
		if let Some(&index) = self.map.get(&entry) {
			return Ok(index);
		}

		let index = self.count;
		let width = if entry.is_wide() { 2 } else { 1 };
		// Indices go up to 65534, since the count is stored as an u16 too.
		self.count = self.count.checked_add(width)
			.ok_or(CodecError::TooLarge { what: "constant pool" })?;

		self.inner.push(entry.clone());
		self.map.insert(entry, index);
		Ok(index)
	}

	fn put_bootstrap_method(&mut self, handle: &Handle, arguments: &[Loadable]) -> Result<u16> {
		let arguments = arguments.iter()
			.map(|argument| self.put_loadable(argument))
			.collect::<Result<Vec<_>>>()?;
		let method = BootstrapMethodWrite { handle: handle.clone(), arguments };

		if let Some(&index) = self.bootstrap_methods_map.get(&method) {
			return Ok(index);
		}
		let index = u16::try_from(self.bootstrap_methods.len())
			.map_err(|_| CodecError::TooLarge { what: "bootstrap methods" })?;
		self.bootstrap_methods.push(method.clone());
		self.bootstrap_methods_map.insert(method, index);
		Ok(index)
	}

	/// Puts the value, or returns the index zero if there's none.
	pub(crate) fn put_optional<T: ?Sized>(&mut self, value: Option<&T>, f: impl FnOnce(&mut Self, &T) -> Result<u16>) -> Result<u16> {
		match value {
			Some(value) => f(self, value),
			None => Ok(0),
		}
	}

	pub(crate) fn put_utf8(&mut self, string: &JavaStr) -> Result<u16> {
		self.put(PoolEntry::Utf8 { string: string.to_owned() })
	}

	pub(crate) fn put_str(&mut self, string: &str) -> Result<u16> {
		self.put_utf8(JavaStr::from_str(string))
	}

	pub(crate) fn put_class(&mut self, class: &ClassName) -> Result<u16> {
		let name_index = self.put_utf8(class)?;
		self.put(PoolEntry::Class { name_index })
	}

	pub(crate) fn put_module(&mut self, module: &ModuleName) -> Result<u16> {
		let name_index = self.put_utf8(module)?;
		self.put(PoolEntry::Module { name_index })
	}

	pub(crate) fn put_package(&mut self, package: &PackageName) -> Result<u16> {
		let name_index = self.put_utf8(package)?;
		self.put(PoolEntry::Package { name_index })
	}

	pub(crate) fn put_name_and_type(&mut self, name: &JavaStr, descriptor: &JavaStr) -> Result<u16> {
		let name_index = self.put_utf8(name)?;
		let descriptor_index = self.put_utf8(descriptor)?;
		self.put(PoolEntry::NameAndType { name_index, descriptor_index })
	}

	pub(crate) fn put_field_ref(&mut self, field: &FieldRef) -> Result<u16> {
		let class_index = self.put_class(&field.class)?;
		let name_and_type_index = self.put_name_and_type(&field.name, &field.desc)?;
		self.put(PoolEntry::FieldRef { class_index, name_and_type_index })
	}

	pub(crate) fn put_method_ref(&mut self, method: &MethodRef) -> Result<u16> {
		let class_index = self.put_class(&method.class)?;
		let name_and_type_index = self.put_name_and_type(&method.name, &method.desc)?;
		self.put(PoolEntry::MethodRef { class_index, name_and_type_index })
	}

	pub(crate) fn put_interface_method_ref(&mut self, method: &MethodRef) -> Result<u16> {
		let class_index = self.put_class(&method.class)?;
		let name_and_type_index = self.put_name_and_type(&method.name, &method.desc)?;
		self.put(PoolEntry::InterfaceMethodRef { class_index, name_and_type_index })
	}

	pub(crate) fn put_method_ref_or_interface_method_ref(&mut self, method: &MethodRef, is_interface: bool) -> Result<u16> {
		if is_interface {
			self.put_interface_method_ref(method)
		} else {
			self.put_method_ref(method)
		}
	}

	pub(crate) fn put_integer(&mut self, value: i32) -> Result<u16> {
		self.put(PoolEntry::Integer { bytes: value })
	}

	pub(crate) fn put_float(&mut self, value: f32) -> Result<u16> {
		self.put(PoolEntry::Float { bytes: value.to_bits() })
	}

	pub(crate) fn put_long(&mut self, value: i64) -> Result<u16> {
		self.put(PoolEntry::Long { bytes: value })
	}

	pub(crate) fn put_double(&mut self, value: f64) -> Result<u16> {
		self.put(PoolEntry::Double { bytes: value.to_bits() })
	}

	pub(crate) fn put_string(&mut self, string: &JavaStr) -> Result<u16> {
		let string_index = self.put_utf8(string)?;
		self.put(PoolEntry::String { string_index })
	}

	pub(crate) fn put_method_handle(&mut self, handle: &Handle) -> Result<u16> {
		let (reference_kind, reference_index) = match handle {
			Handle::GetField(field) => (method_handle_reference::GET_FIELD, self.put_field_ref(field)?),
			Handle::GetStatic(field) => (method_handle_reference::GET_STATIC, self.put_field_ref(field)?),
			Handle::PutField(field) => (method_handle_reference::PUT_FIELD, self.put_field_ref(field)?),
			Handle::PutStatic(field) => (method_handle_reference::PUT_STATIC, self.put_field_ref(field)?),
			Handle::InvokeVirtual(method) => (method_handle_reference::INVOKE_VIRTUAL, self.put_method_ref(method)?),
			Handle::InvokeStatic(method, is_interface) =>
				(method_handle_reference::INVOKE_STATIC, self.put_method_ref_or_interface_method_ref(method, *is_interface)?),
			Handle::InvokeSpecial(method, is_interface) =>
				(method_handle_reference::INVOKE_SPECIAL, self.put_method_ref_or_interface_method_ref(method, *is_interface)?),
			Handle::NewInvokeSpecial(method) => (method_handle_reference::NEW_INVOKE_SPECIAL, self.put_method_ref(method)?),
			Handle::InvokeInterface(method) => (method_handle_reference::INVOKE_INTERFACE, self.put_interface_method_ref(method)?),
		};
		self.put(PoolEntry::MethodHandle { reference_kind, reference_index })
	}

	fn put_method_type(&mut self, descriptor: &JavaStr) -> Result<u16> {
		let descriptor_index = self.put_utf8(descriptor)?;
		self.put(PoolEntry::MethodType { descriptor_index })
	}

	fn put_dynamic(&mut self, dynamic: &ConstantDynamic) -> Result<u16> {
		let bootstrap_method_attribute_index = self.put_bootstrap_method(&dynamic.handle, &dynamic.arguments)?;
		let name_and_type_index = self.put_name_and_type(&dynamic.name, &dynamic.descriptor)?;
		self.put(PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index })
	}

	pub(crate) fn put_invoke_dynamic(&mut self, invoke_dynamic: &InvokeDynamic) -> Result<u16> {
		let bootstrap_method_attribute_index = self.put_bootstrap_method(&invoke_dynamic.handle, &invoke_dynamic.arguments)
			.with_context(|| anyhow!("failed to put bootstrap method of `invokedynamic` {:?}", invoke_dynamic.name))?;
		let name_and_type_index = self.put_name_and_type(&invoke_dynamic.name, &invoke_dynamic.descriptor)?;
		self.put(PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index })
	}

	pub(crate) fn put_loadable(&mut self, loadable: &Loadable) -> Result<u16> {
		match loadable {
			Loadable::Integer(value) => self.put_integer(*value),
			Loadable::Float(value) => self.put_float(*value),
			Loadable::Long(value) => self.put_long(*value),
			Loadable::Double(value) => self.put_double(*value),
			Loadable::Class(class) => self.put_class(class),
			Loadable::String(string) => self.put_string(string),
			Loadable::MethodHandle(handle) => self.put_method_handle(handle),
			Loadable::MethodType(descriptor) => self.put_method_type(descriptor),
			Loadable::Dynamic(dynamic) => self.put_dynamic(dynamic),
		}
	}

	pub(crate) fn put_constant_value(&mut self, constant_value: &ConstantValue) -> Result<u16> {
		match constant_value {
			ConstantValue::Integer(value) => self.put_integer(*value),
			ConstantValue::Float(value) => self.put_float(*value),
			ConstantValue::Long(value) => self.put_long(*value),
			ConstantValue::Double(value) => self.put_double(*value),
			ConstantValue::String(string) => self.put_string(string),
		}
	}
}

impl Default for PoolWrite {
	fn default() -> Self {
		PoolWrite::new()
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::class_writer::pool::PoolWrite;
	use crate::tree::class::ClassName;

	#[test]
	fn entries_are_shared() -> Result<()> {
		let mut pool = PoolWrite::new();
		let object = ClassName::java_lang_object();

		let a = pool.put_class(&object)?;
		let b = pool.put_class(&object)?;
		assert_eq!(a, b);
		assert_eq!(a, 2); // the utf8 comes first
		assert_eq!(pool.put_utf8(JavaStr::from_str("java/lang/Object"))?, 1);
		Ok(())
	}

	#[test]
	fn wide_entries_take_two_indices() -> Result<()> {
		let mut pool = PoolWrite::new();
		assert_eq!(pool.put_long(7)?, 1);
		assert_eq!(pool.put_integer(7)?, 3);
		assert_eq!(pool.put_double(f64::NAN)?, 4);
		assert_eq!(pool.put_double(f64::NAN)?, 4);

		let mut bytes = Vec::new();
		pool.write(&mut bytes)?;
		assert_eq!(&bytes[..2], &[0, 6]);
		Ok(())
	}
}
