//! The owned representation of a class file.
//!
//! Constant pool indices never appear here: every reference is resolved to the value it points to, and
//! the writer builds a fresh constant pool from it.

pub mod class;
pub mod field;
pub mod method;
pub mod attribute;
pub mod version;
pub mod module;
pub mod annotation;
pub mod descriptor;
pub mod record;
pub mod type_annotation;

mod names {
	use java_string::JavaStr;

	/// Checks if a class name is valid according to JVMS 4.2.1 (also accepting array class names).
	pub(super) fn is_valid_class_name(x: &JavaStr) -> bool {
		if x.starts_with('[') {
			// at most 255 dimensions, and it needs to be followed by some field type
			let dimensions = x.chars().take_while(|&c| c == '[').count();
			dimensions <= 255 && x.len() > dimensions
		} else {
			// a list of identifiers split by /
			// each identifier must be an unqualified name
			x.split('/').all(is_valid_unqualified_name)
		}
	}

	/// Checks if a name is an unqualified name according to JVMS 4.2.2
	///
	/// This is used for field names, formal parameter names, local variable names.
	pub(super) fn is_valid_unqualified_name(x: &JavaStr) -> bool {
		// must contain at least one unicode codepoint
		!x.is_empty() &&
			// must not contain any of . ; [ /
			x.chars().all(|c| !matches!(c.as_char(), Some('.' | ';' | '[' | '/')))
	}

	/// Checks if a method name is valid according to JVMS 4.2.2
	pub(super) fn is_valid_method_name(x: &JavaStr) -> bool {
		// either one of the special names or an unqualified name with special < > restriction
		matches!(x.as_str(), Ok("<init>" | "<clinit>")) || (
			!x.is_empty() &&
				x.chars().all(|c| !matches!(c.as_char(), Some('.' | ';' | '[' | '/' | '<' | '>')))
		)
	}

	/// Checks if a module name is valid according to JVMS 4.2.3
	pub(super) fn is_valid_module_name(x: &JavaStr) -> bool {
		!x.is_empty() && x.chars().all(|c| !matches!(c.as_char(), Some('\0'..='\u{1f}')))
	}

	#[cfg(test)]
	mod testing {
		use java_string::JavaStr;
		use crate::tree::names::*;

		fn class(s: &str) -> bool {
			is_valid_class_name(JavaStr::from_str(s))
		}

		fn unqualified(s: &str) -> bool {
			is_valid_unqualified_name(JavaStr::from_str(s))
		}

		fn method(s: &str) -> bool {
			is_valid_method_name(JavaStr::from_str(s))
		}

		#[test]
		fn class_names() {
			assert!(class("java/lang/Object"));
			assert!(class("java/lang/Thread"));
			assert!(class("[[[D"));
			assert!(class("An$Inner$Class"));

			assert!(!class("")); // an empty class name is not valid
			assert!(!class("["));
			assert!(!class("/"));
			assert!(!class("/a"));
			assert!(!class("a/"));
			assert!(!class("//a"));
			assert!(!class("a.b"));
			assert!(!class("a;b"));
			assert!(!class("a[b"));
		}

		#[test]
		fn unqualified_names() {
			assert!(unqualified("foo"));
			assert!(unqualified("1234567")); // valid here, but not in java source code
			assert!(unqualified("a$name"));

			assert!(!unqualified(""));
			assert!(!unqualified("."));
			assert!(!unqualified(";"));
			assert!(!unqualified("["));
			assert!(!unqualified("/"));
		}

		#[test]
		fn method_names() {
			assert!(method("foo"));
			assert!(method("<init>"));
			assert!(method("<clinit>"));
			assert!(method("---"));

			assert!(!method(""));
			assert!(!method("."));
			assert!(!method("<NotClinit>"));
			assert!(!method("<>"));
			assert!(!method(">"));
		}
	}
}
