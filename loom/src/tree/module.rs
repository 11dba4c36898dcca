use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_access, make_name};
use crate::tree::class::ClassName;

/// The contents of the `Module` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
	pub name: ModuleName,
	pub flags: ModuleFlags,
	pub version: Option<JavaString>,
	pub requires: Vec<ModuleRequires>,
	pub exports: Vec<ModuleExports>,
	pub opens: Vec<ModuleOpens>,
	pub uses: Vec<ClassName>,
	pub provides: Vec<ModuleProvides>,
}

make_name! {
	/// A module name, like `java.base`.
	pub ModuleName;
	/// A package name in internal form, like `java/lang`.
	pub PackageName;
}

impl ModuleName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if crate::tree::names::is_valid_module_name(inner) {
			Ok(())
		} else {
			bail!("invalid module name: must be non-empty and not contain control characters")
		}
	}
}

impl PackageName {
	fn check_valid(inner: &JavaStr) -> Result<()> {
		if inner.split('/').all(crate::tree::names::is_valid_unqualified_name) {
			Ok(())
		} else {
			bail!("invalid package name: must consist out of `/` separated non-empty parts, and not contain any of `.`, `;`, `[`")
		}
	}
}

make_access! {
	pub ModuleFlags {
		is_open = 0x0020,
		is_synthetic = 0x1000,
		is_mandated = 0x8000,
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequires {
	pub name: ModuleName,
	pub flags: ModuleRequiresFlags,
	pub version: Option<JavaString>,
}

make_access! {
	pub ModuleRequiresFlags {
		is_transitive = 0x0020,
		is_static_phase = 0x0040,
		is_synthetic = 0x1000,
		is_mandated = 0x8000,
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleExports {
	pub name: PackageName,
	pub flags: ModuleExportsFlags,
	pub exports_to: Vec<ModuleName>,
}

make_access! {
	pub ModuleExportsFlags {
		is_synthetic = 0x1000,
		is_mandated = 0x8000,
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOpens {
	pub name: PackageName,
	pub flags: ModuleOpensFlags,
	pub opens_to: Vec<ModuleName>,
}

make_access! {
	pub ModuleOpensFlags {
		is_synthetic = 0x1000,
		is_mandated = 0x8000,
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProvides {
	pub name: ClassName,
	pub provides_with: Vec<ClassName>,
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::tree::module::{ModuleFlags, ModuleName, ModuleRequiresFlags, PackageName};

	#[test]
	fn names() -> Result<()> {
		assert_eq!(ModuleName::try_from("java.base")?.to_string(), "java.base");
		assert!(ModuleName::try_from("").is_err());
		assert!(PackageName::try_from("java/lang").is_ok());
		assert!(PackageName::try_from("java//lang").is_err());
		Ok(())
	}

	#[test]
	fn flags() {
		assert_eq!(u16::from(ModuleFlags { is_open: true, ..ModuleFlags::default() }), 0x0020);
		let requires = ModuleRequiresFlags::from(0x8040);
		assert!(requires.is_static_phase);
		assert!(requires.is_mandated);
		assert!(!requires.is_transitive);
	}
}
