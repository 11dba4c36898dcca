/// Creates owned [`JavaString`](java_string::JavaString) wrappers that only hold valid contents.
///
/// You need to have a function
/// ```no_run
/// # struct Owned;
/// impl Owned {
///     fn check_valid(inner: &java_string::JavaStr) -> anyhow::Result<()> {
///         // ...
/// # Ok(())
///     }
/// }
/// ```
/// that checks if the contents are valid.
macro_rules! make_name {
	(
		$(
			$( #[$doc:meta] )*
			$vis:vis $name:ident;
		)*
	) => {
		$(
			$( #[$doc] )*
			#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
			$vis struct $name(java_string::JavaString);

			impl $name {
				pub fn as_java_str(&self) -> &java_string::JavaStr {
					&self.0
				}

				pub fn into_inner(self) -> java_string::JavaString {
					self.0
				}

				/// Constructs this without checking any content. Only used where the contents are known to be valid.
				pub(crate) fn from_inner_unchecked(inner: java_string::JavaString) -> $name {
					$name(inner)
				}

				/// Checks if a given value is valid for being represented by this type.
				pub fn is_valid(inner: &java_string::JavaStr) -> bool {
					Self::check_valid(inner).is_ok()
				}
			}

			impl std::ops::Deref for $name {
				type Target = java_string::JavaStr;

				fn deref(&self) -> &Self::Target {
					&self.0
				}
			}

			impl TryFrom<java_string::JavaString> for $name {
				type Error = anyhow::Error;

				fn try_from(value: java_string::JavaString) -> anyhow::Result<$name> {
					use anyhow::Context;
					$name::check_valid(&value)
						.with_context(|| anyhow::anyhow!("on value {value:?}"))?;
					Ok($name(value))
				}
			}

			impl TryFrom<&str> for $name {
				type Error = anyhow::Error;

				fn try_from(value: &str) -> anyhow::Result<$name> {
					$name::try_from(java_string::JavaString::from(value))
				}
			}

			impl From<$name> for java_string::JavaString {
				fn from(value: $name) -> Self {
					value.0
				}
			}

			impl std::fmt::Display for $name {
				fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
					self.0.as_str()
						.map_err(|_| std::fmt::Error)
						.and_then(|s| f.write_str(s))
				}
			}
		)*
	}
}

/// Creates a struct of `bool`s for access flags, together with conversions from and to the `u16` stored in the class file.
///
/// Bits not named are lost when converting.
macro_rules! make_access {
	(
		$( #[$doc:meta] )*
		$vis:vis $name:ident {
			$( $field:ident = $bit:literal, )*
		}
	) => {
		$( #[$doc] )*
		#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
		$vis struct $name {
			$( pub $field: bool, )*
		}

		impl std::fmt::Debug for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(concat!(stringify!($name), " { "))?;
				$(
					if self.$field {
						f.write_str(stringify!($field))?;
						f.write_str(" ")?;
					}
				)*
				f.write_str("}")
			}
		}

		impl From<u16> for $name {
			fn from(value: u16) -> Self {
				$name {
					$( $field: value & $bit != 0, )*
				}
			}
		}

		impl From<$name> for u16 {
			fn from(value: $name) -> Self {
				0 $( | (if value.$field { $bit } else { 0 }) )*
			}
		}
	}
}

pub(crate) use {make_access, make_name};
