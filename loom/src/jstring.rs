//! Conversion between the modified UTF-8 encoding used by `Utf8` constant pool entries and [`JavaString`].
//!
//! The format stores `\0` using two bytes and encodes supplementary characters as surrogate pairs of
//! three bytes each.

use std::borrow::Cow;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};

/// Takes in a vec of data, tries to read it into a [`JavaString`].
pub(crate) fn from_vec_to_string(vec: Vec<u8>) -> Result<JavaString> {
	JavaString::from_modified_utf8(vec)
		.with_context(|| anyhow!("invalid modified utf8 contents"))
}

/// Takes in a string and gives back the bytes it's stored as.
pub(crate) fn from_string_to_vec(string: &JavaStr) -> Cow<[u8]> {
	string.to_modified_utf8()
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::jstring::{from_string_to_vec, from_vec_to_string};

	fn check(raw: &[u8], string: &str) -> Result<()> {
		let str = JavaStr::from_str(string);
		assert_eq!(from_string_to_vec(str), raw);
		assert_eq!(from_vec_to_string(raw.to_owned())?, str);
		Ok(())
	}

	#[test]
	fn ascii() -> Result<()> {
		check(b"java/lang/Object", "java/lang/Object")?;
		check(b"<init>", "<init>")
	}

	#[test]
	fn nul_takes_two_bytes() -> Result<()> {
		check(&[0b1100_0000, 0b1000_0000], "\0")?;
		check(&[b'a', 0b1100_0000, 0b1000_0000, b'b'], "a\0b")
	}

	#[test]
	fn supplementary_is_surrogate_pair() -> Result<()> {
		// U+1F600 is D83D DE00
		check(&[0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80], "\u{1F600}")
	}

	#[test]
	fn rejects_plain_nul_byte() {
		assert!(from_vec_to_string(vec![b'a', 0, b'b']).is_err());
	}
}
