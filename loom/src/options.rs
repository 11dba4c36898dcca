//! The knobs of decoding and encoding.

use indexmap::IndexSet;
use java_string::JavaStr;
use crate::hierarchy::ClassHierarchy;
use crate::tree::version::Version;

/// Configures [`decode`](crate::decode), [`read_events`](crate::read_events) and [`encode`](crate::encode).
///
/// ```
/// use loom::Options;
/// use loom::tree::version::Version;
///
/// let options = Options::default()
///     .with_opaque_attribute("RuntimeInvisibleAnnotations")
///     .with_target_version(Version::V1_8)
///     .with_compute_frames(true);
///
/// assert!(options.is_opaque(java_string::JavaStr::from_str("RuntimeInvisibleAnnotations")));
/// assert!(!options.is_opaque(java_string::JavaStr::from_str("Signature")));
/// ```
#[derive(Debug, Clone)]
pub struct Options {
	/// Names of attributes that are kept as raw bytes instead of being decoded.
	pub opaque_attributes: IndexSet<String>,
	/// Whether the encoder runs the frame analysis to regenerate the `StackMapTable`, `max_stack` and `max_locals`
	/// of every method.
	///
	/// If this is `false`, the maximum values are still computed for code that doesn't have them.
	pub compute_frames: bool,
	/// The version the encoder writes. [`None`] keeps the version of the class.
	pub target_version: Option<Version>,
	/// The newest version the decoder accepts.
	pub max_version: Version,
	/// Used for merging object types when computing frames.
	pub hierarchy: ClassHierarchy,
}

impl Default for Options {
	fn default() -> Options {
		Options {
			opaque_attributes: IndexSet::new(),
			compute_frames: false,
			target_version: None,
			max_version: Version::V23,
			hierarchy: ClassHierarchy::new(),
		}
	}
}

impl Options {
	pub fn with_opaque_attribute(mut self, name: impl Into<String>) -> Options {
		self.opaque_attributes.insert(name.into());
		self
	}

	pub fn with_compute_frames(mut self, compute_frames: bool) -> Options {
		self.compute_frames = compute_frames;
		self
	}

	pub fn with_target_version(mut self, version: Version) -> Options {
		self.target_version = Some(version);
		self
	}

	pub fn with_max_version(mut self, version: Version) -> Options {
		self.max_version = version;
		self
	}

	pub fn with_hierarchy(mut self, hierarchy: ClassHierarchy) -> Options {
		self.hierarchy = hierarchy;
		self
	}

	/// Whether an attribute of that name should be kept as raw bytes.
	pub fn is_opaque(&self, name: &JavaStr) -> bool {
		name.as_str().is_ok_and(|name| self.opaque_attributes.contains(name))
	}

	/// The version to encode a class of the given version with.
	pub fn output_version(&self, class_version: Version) -> Version {
		self.target_version.unwrap_or(class_version)
	}
}
