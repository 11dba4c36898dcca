use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, LevelFilter};
use loom::analysis::analyze;
use loom::inline::inline_method;
use loom::tree::class::ClassFile;
use loom::tree::version::Version;
use loom::visitor::stages::{EncodeSink, MethodPass};
use loom::{decode, read_events, ClassHierarchy, Options};

#[derive(Debug, Parser)]
#[command(name = "classweave", version, about = "Checks and rewrites java class files")]
struct Cli {
	/// Be verbose.
	#[arg(short = 'v', long = "verbose")]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Decodes the classes and analyzes the code of every method
	Check {
		#[command(flatten)]
		decoding: Decoding,

		/// The class files to check, they're also used to merge types with each other
		#[arg(required = true)]
		classes: Vec<PathBuf>,
	},
	/// Decodes a class, optionally inlines subroutines, and writes it again
	Rewrite {
		#[command(flatten)]
		decoding: Decoding,

		/// Replace `jsr` and `ret` by copies of the subroutines
		#[arg(long = "inline")]
		inline: bool,

		/// Recompute the stack map frames and the maximum stack and locals of every method
		#[arg(long = "compute-frames")]
		compute_frames: bool,

		/// The major version to write, defaults to the version of the input
		#[arg(long = "target", value_parser = clap::value_parser!(u16).range(45..))]
		target: Option<u16>,

		/// Other classes to use for merging types when computing frames
		#[arg(long = "classpath")]
		classpath: Vec<PathBuf>,

		input: PathBuf,

		#[arg(short = 'o', long = "output")]
		output: PathBuf,
	},
}

#[derive(Debug, Args)]
struct Decoding {
	/// An attribute to keep as raw bytes, may be given several times
	#[arg(long = "opaque")]
	opaque: Vec<String>,

	/// The newest major version to accept
	#[arg(long = "max-version", default_value_t = Version::V23.major)]
	max_version: u16,
}

impl Decoding {
	fn options(&self) -> Options {
		self.opaque.iter()
			.fold(Options::default(), |options, name| options.with_opaque_attribute(name.as_str()))
			.with_max_version(Version::new(self.max_version, u16::MAX))
	}
}

fn setup_logging(verbose: bool) -> Result<()> {
	let level = if verbose { LevelFilter::Trace } else { LevelFilter::Info };
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

fn read_class(path: &Path, options: &Options) -> Result<ClassFile> {
	let bytes = fs::read(path)
		.with_context(|| anyhow!("failed to read {path:?}"))?;
	decode(&bytes, options)
		.with_context(|| anyhow!("failed to decode {path:?}"))
}

/// Analyzes every method of the class. Subroutines are inlined first, on a copy.
fn check_class(class: &ClassFile, hierarchy: &ClassHierarchy) -> Result<usize> {
	let mut checked = 0;
	for method in &class.methods {
		if method.code.is_none() {
			continue;
		}
		let mut method = method.clone();
		if inline_method(&mut method)? {
			debug!("inlined the subroutines of {:?} {:?} for checking it", method.name, method.descriptor);
		}
		let analysis = analyze(class, &method, hierarchy)
			.with_context(|| anyhow!("failed to analyze method {:?} {:?} of class {:?}", method.name, method.descriptor, class.name))?;
		debug!("{:?} {:?}: max_stack {}, max_locals {}", method.name, method.descriptor, analysis.max_stack, analysis.max_locals);
		checked += 1;
	}
	Ok(checked)
}

fn check(decoding: &Decoding, paths: &[PathBuf]) -> Result<()> {
	let options = decoding.options();

	let mut classes = Vec::with_capacity(paths.len());
	let mut failed = 0;
	for path in paths {
		match read_class(path, &options) {
			Ok(class) => classes.push((path, class)),
			Err(err) => {
				error!("{err:?}");
				failed += 1;
			},
		}
	}

	let mut hierarchy = ClassHierarchy::new();
	for (_, class) in &classes {
		hierarchy.add_class(class);
	}

	for (path, class) in &classes {
		match check_class(class, &hierarchy).with_context(|| anyhow!("failed to check {path:?}")) {
			Ok(methods) => info!("{:?}: {methods} methods ok", class.name),
			Err(err) => {
				error!("{err:?}");
				failed += 1;
			},
		}
	}

	if failed > 0 {
		bail!("{failed} of {} classes failed the check", paths.len());
	}
	Ok(())
}

#[allow(clippy::too_many_arguments)]
fn rewrite(
	decoding: &Decoding,
	inline: bool,
	compute_frames: bool,
	target: Option<u16>,
	classpath: &[PathBuf],
	input: &Path,
	output: &Path,
) -> Result<()> {
	let decode_options = decoding.options();

	let mut hierarchy = ClassHierarchy::new();
	for path in classpath {
		hierarchy.add_class(&read_class(path, &decode_options)?);
	}

	let bytes = fs::read(input)
		.with_context(|| anyhow!("failed to read {input:?}"))?;
	hierarchy.add_class(&decode(&bytes, &decode_options).with_context(|| anyhow!("failed to decode {input:?}"))?);

	let mut encode_options = decode_options.clone()
		.with_compute_frames(compute_frames)
		.with_hierarchy(hierarchy);
	if let Some(major) = target {
		encode_options = encode_options.with_target_version(Version::new(major, 0));
	}

	let mut inlined = 0;
	let pipeline = MethodPass::new(
		|_: &ClassFile, method: &mut loom::tree::method::Method| {
			if inline && inline_method(method)? {
				inlined += 1;
			}
			Ok(())
		},
		EncodeSink::new(&encode_options),
	);
	let written = read_events(&bytes, &decode_options, pipeline)
		.with_context(|| anyhow!("failed to rewrite {input:?}"))?;

	fs::write(output, &written)
		.with_context(|| anyhow!("failed to write {output:?}"))?;
	info!("wrote {output:?} ({} bytes, inlined the subroutines of {inlined} methods)", written.len());
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logging(cli.verbose)?;

	match &cli.command {
		Command::Check { decoding, classes } => check(decoding, classes),
		Command::Rewrite { decoding, inline, compute_frames, target, classpath, input, output } =>
			rewrite(decoding, *inline, *compute_frames, *target, classpath, input, output),
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use clap::Parser;
	use pretty_assertions::assert_eq;
	use loom::tree::version::Version;
	use crate::{Cli, Command};

	#[test]
	fn rewrite_arguments() -> Result<()> {
		let cli = Cli::try_parse_from([
			"classweave", "-v", "rewrite", "--inline", "--target", "52", "--opaque", "Signature", "--opaque", "Deprecated",
			"A.class", "-o", "B.class",
		])?;
		assert!(cli.verbose);
		let Command::Rewrite { decoding, inline, compute_frames, target, input, output, .. } = cli.command else {
			anyhow::bail!("expected the rewrite command");
		};
		assert!(inline);
		assert!(!compute_frames);
		assert_eq!(target, Some(52));
		assert_eq!((input.to_str(), output.to_str()), (Some("A.class"), Some("B.class")));

		let options = decoding.options();
		assert_eq!(options.opaque_attributes.iter().collect::<Vec<_>>(), vec!["Signature", "Deprecated"]);
		assert_eq!(options.max_version.major, Version::V23.major);
		Ok(())
	}

	#[test]
	fn targets_older_than_java_1_are_rejected() {
		assert!(Cli::try_parse_from(["classweave", "rewrite", "--target", "44", "A.class", "-o", "B.class"]).is_err());
		assert!(Cli::try_parse_from(["classweave", "check"]).is_err());
	}
}
