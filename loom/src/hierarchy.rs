//! What the frame analysis knows about classes it doesn't see the code of.

use indexmap::{IndexMap, IndexSet};
use java_string::{JavaStr, JavaString};
use log::trace;
use crate::tree::class::{ClassFile, ClassName};

/// The super class and interfaces of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
	pub super_class: Option<ClassName>,
	pub interfaces: IndexSet<ClassName>,
	pub is_interface: bool,
}

/// A set of classes and their super types, used to find the common super class of two object types.
///
/// Classes not in here are treated as direct subclasses of `java/lang/Object`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassHierarchy {
	classes: IndexMap<ClassName, ClassInfo>,
}

impl ClassHierarchy {
	pub fn new() -> ClassHierarchy {
		ClassHierarchy::default()
	}

	pub fn insert(&mut self, name: ClassName, info: ClassInfo) {
		self.classes.insert(name, info);
	}

	/// Adds the class given, with its super class and interfaces.
	pub fn add_class(&mut self, class: &ClassFile) {
		self.insert(class.name.clone(), ClassInfo {
			super_class: class.super_class.clone(),
			interfaces: class.interfaces.iter().cloned().collect(),
			is_interface: class.access.is_interface,
		});
	}

	pub fn get(&self, name: &ClassName) -> Option<&ClassInfo> {
		self.classes.get(name)
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	fn is_interface(&self, name: &ClassName) -> bool {
		self.get(name).is_some_and(|info| info.is_interface)
	}

	/// The chain of super classes, starting with the class itself and ending with `java/lang/Object`.
	fn super_classes(&self, name: &ClassName) -> Vec<ClassName> {
		let object = ClassName::java_lang_object();
		let mut chain = vec![name.clone()];
		let mut current = name.clone();
		while current != object {
			let next = match self.get(&current) {
				Some(ClassInfo { super_class: Some(super_class), .. }) => super_class.clone(),
				Some(ClassInfo { super_class: None, .. }) => break,
				None => {
					trace!("class {current} is unknown, assuming it extends java/lang/Object");
					object.clone()
				},
			};
			// a broken hierarchy could have a loop in it
			if chain.contains(&next) {
				break;
			}
			chain.push(next.clone());
			current = next;
		}
		if chain.last() != Some(&object) {
			chain.push(object);
		}
		chain
	}

	/// Whether a value of type `from` can be stored where a `to` is expected, as far as this hierarchy knows.
	///
	/// Arrays of references are covariant in their element type. Arrays of primitives are only assignable to
	/// themselves and to the super types of all arrays.
	pub fn is_assignable(&self, to: &ClassName, from: &ClassName) -> bool {
		if to == from || *to == ClassName::java_lang_object() {
			return true;
		}
		match (to.is_array(), from.is_array()) {
			(true, true) => match (array_element(to), array_element(from)) {
				(Some(to), Some(from)) => self.is_assignable(&to, &from),
				_ => false,
			},
			(false, true) => {
				let to = to.as_java_str();
				to == JavaStr::from_str("java/lang/Cloneable") || to == JavaStr::from_str("java/io/Serializable")
			},
			(true, false) => false,
			(false, false) => self.is_interface(to) || self.super_classes(from).contains(to),
		}
	}

	/// The most specific common super class of two classes.
	///
	/// Interfaces merge to `java/lang/Object`, like the verifier treats them. Arrays of references merge
	/// element wise, everything else involving arrays gives `java/lang/Object`.
	pub fn common_super_class(&self, a: &ClassName, b: &ClassName) -> ClassName {
		if a == b {
			return a.clone();
		}
		if a.is_array() || b.is_array() {
			return self.common_array_class(a, b);
		}
		if self.is_interface(a) || self.is_interface(b) {
			return ClassName::java_lang_object();
		}
		let of_a = self.super_classes(a);
		self.super_classes(b)
			.into_iter()
			.find(|class| of_a.contains(class))
			.unwrap_or_else(ClassName::java_lang_object)
	}

	fn common_array_class(&self, a: &ClassName, b: &ClassName) -> ClassName {
		match (array_element(a), array_element(b)) {
			(Some(x), Some(y)) => {
				let common = self.common_super_class(&x, &y);
				let mut name = JavaString::from("[");
				if common.is_array() {
					name.push_java_str(common.as_java_str());
				} else {
					name.push('L');
					name.push_java_str(common.as_java_str());
					name.push(';');
				}
				ClassName::try_from(name).unwrap_or_else(|_| ClassName::java_lang_object())
			},
			_ => ClassName::java_lang_object(),
		}
	}
}

/// The element type of an array of references. `[Lfoo;` has element `foo`, and `[[I` has element `[I`.
///
/// This is [`None`] for arrays of primitives and for anything not an array.
fn array_element(name: &ClassName) -> Option<ClassName> {
	let inner = name.as_java_str().strip_prefix('[')?;
	let element = if let Some(object) = inner.strip_prefix('L') {
		object.strip_suffix(';')?
	} else if inner.starts_with('[') {
		inner
	} else {
		return None;
	};
	ClassName::try_from(element.to_owned()).ok()
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use indexmap::IndexSet;
	use pretty_assertions::assert_eq;
	use crate::hierarchy::{ClassHierarchy, ClassInfo};
	use crate::tree::class::ClassName;

	fn hierarchy() -> Result<ClassHierarchy> {
		let mut hierarchy = ClassHierarchy::new();
		let mut add = |name: &str, super_class: &str, is_interface: bool| -> Result<()> {
			hierarchy.insert(ClassName::try_from(name)?, ClassInfo {
				super_class: Some(ClassName::try_from(super_class)?),
				interfaces: IndexSet::new(),
				is_interface,
			});
			Ok(())
		};
		add("java/lang/Throwable", "java/lang/Object", false)?;
		add("java/lang/Exception", "java/lang/Throwable", false)?;
		add("java/lang/RuntimeException", "java/lang/Exception", false)?;
		add("java/io/IOException", "java/lang/Exception", false)?;
		add("java/lang/Runnable", "java/lang/Object", true)?;
		Ok(hierarchy)
	}

	fn name(s: &str) -> Result<ClassName> {
		ClassName::try_from(s)
	}

	#[test]
	fn common_super_classes() -> Result<()> {
		let hierarchy = hierarchy()?;
		assert_eq!(
			hierarchy.common_super_class(&name("java/lang/RuntimeException")?, &name("java/io/IOException")?),
			name("java/lang/Exception")?
		);
		assert_eq!(
			hierarchy.common_super_class(&name("java/lang/Exception")?, &name("java/lang/RuntimeException")?),
			name("java/lang/Exception")?
		);
		assert_eq!(
			hierarchy.common_super_class(&name("java/lang/Runnable")?, &name("java/lang/Exception")?),
			name("java/lang/Object")?
		);
		assert_eq!(
			hierarchy.common_super_class(&name("a/Unknown")?, &name("java/lang/Exception")?),
			name("java/lang/Object")?
		);
		Ok(())
	}

	#[test]
	fn arrays() -> Result<()> {
		let hierarchy = hierarchy()?;
		assert_eq!(
			hierarchy.common_super_class(&name("[Ljava/io/IOException;")?, &name("[Ljava/lang/RuntimeException;")?),
			name("[Ljava/lang/Exception;")?
		);
		assert_eq!(hierarchy.common_super_class(&name("[I")?, &name("[J")?), name("java/lang/Object")?);
		assert_eq!(hierarchy.common_super_class(&name("[I")?, &name("java/lang/Exception")?), name("java/lang/Object")?);
		Ok(())
	}

	#[test]
	fn assignability() -> Result<()> {
		let hierarchy = hierarchy()?;
		assert!(hierarchy.is_assignable(&name("java/lang/Throwable")?, &name("java/io/IOException")?));
		assert!(!hierarchy.is_assignable(&name("java/io/IOException")?, &name("java/lang/Throwable")?));
		assert!(hierarchy.is_assignable(&name("java/lang/Runnable")?, &name("java/lang/Exception")?));
		Ok(())
	}

	#[test]
	fn array_assignability() -> Result<()> {
		let hierarchy = hierarchy()?;
		assert!(hierarchy.is_assignable(&name("[Ljava/lang/Object;")?, &name("[Ljava/lang/String;")?));
		assert!(hierarchy.is_assignable(&name("[Ljava/lang/Throwable;")?, &name("[Ljava/io/IOException;")?));
		assert!(!hierarchy.is_assignable(&name("[Ljava/io/IOException;")?, &name("[Ljava/lang/Throwable;")?));
		assert!(hierarchy.is_assignable(&name("[[Ljava/lang/Exception;")?, &name("[[Ljava/lang/RuntimeException;")?));
		// `[I` is an object, but not an array of them
		assert!(hierarchy.is_assignable(&name("[Ljava/lang/Object;")?, &name("[[I")?));
		assert!(!hierarchy.is_assignable(&name("[Ljava/lang/Object;")?, &name("[I")?));
		assert!(!hierarchy.is_assignable(&name("[J")?, &name("[I")?));

		assert!(hierarchy.is_assignable(&name("java/lang/Object")?, &name("[I")?));
		assert!(hierarchy.is_assignable(&name("java/lang/Cloneable")?, &name("[Ljava/lang/String;")?));
		assert!(hierarchy.is_assignable(&name("java/io/Serializable")?, &name("[D")?));
		assert!(!hierarchy.is_assignable(&name("java/lang/Runnable")?, &name("[Ljava/lang/String;")?));
		assert!(!hierarchy.is_assignable(&name("[Ljava/lang/String;")?, &name("java/lang/Object")?));
		Ok(())
	}
}
