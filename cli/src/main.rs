//! The `chi` driver: `compile` prints backend IR for a module, `interpret`
//! executes IR from stdin, `run` does both in one step.
//!
//! stdout carries compiled IR or the program's own output; every diagnostic
//! goes to stderr. Exit code 0 is success, 1 a tool failure, anything else
//! is the interpreted program's own return code.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{Parser, Subcommand, ValueEnum};

use chi_core::{Context, Report};
use chi_ir as ir;

#[derive(Parser)]
#[clap(name = "chi", version, about = "Compiler and interpreter for chi graph modules")]
struct Cli {
	#[arg(short, long, action = clap::ArgAction::Count, help = "More verbose logging (repeatable)")]
	verbose: u8,

	#[arg(short, long, help = "Only log errors")]
	quiet: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Lower a module and write backend IR to stdout
	Compile {
		/// Module name in the workspace, or a path to a .chimod file
		module: String,

		/// Output format
		#[arg(short = 't', long = "target", value_enum, default_value = "ll")]
		target: Target,

		/// Write bitcode; shorthand for `-t bc`
		#[arg(long = "emit-bitcode", conflicts_with = "target")]
		emit_bitcode: bool,
	},
	/// Read textual IR or bitcode from stdin and execute its main function
	Interpret,
	/// Compile a module and immediately execute it
	Run {
		/// Module name in the workspace, or a path to a .chimod file
		module: String,
	},
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
	/// Textual IR
	Ll,
	/// Binary bitcode
	Bc,
}

fn init_logger(level: log::LevelFilter) {
	let colors = fern::colors::ColoredLevelConfig::new();
	fern::Dispatch::new()
		.format(move |out, message, record| {
			out.finish(format_args!(
				"[{} {} {}] {}",
				chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
				colors.color(record.level()),
				record.target(),
				message
			))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.ok();
}

fn main() {
	let cli = Cli::parse();
	let level = if cli.quiet {
		log::LevelFilter::Error
	} else {
		match cli.verbose {
			0 => log::LevelFilter::Warn,
			1 => log::LevelFilter::Info,
			2 => log::LevelFilter::Debug,
			_ => log::LevelFilter::Trace,
		}
	};
	init_logger(level);

	let code = match cli.command {
		Command::Compile {
			module,
			target,
			emit_bitcode,
		} => {
			let target = if emit_bitcode { Target::Bc } else { target };
			compile(&module, target)
		}
		Command::Interpret => interpret(),
		Command::Run { module } => run(&module),
	};
	exit(code);
}

fn fail(report: &Report) -> i32 {
	eprintln!("{report}");
	1
}

/// Load a module into a fresh context. The argument is either a module name
/// resolved against the current directory as workspace, or a direct path to
/// a `.chimod` file (whose parent — or grandparent when the file sits in a
/// `src/` directory — becomes the workspace, so sibling dependencies still
/// resolve).
fn load(module_arg: &str) -> Result<(Context, String), Report> {
	let mut report = Report::new();
	let path = Path::new(module_arg);

	if path.extension().is_some_and(|ext| ext == "chimod") && path.is_file() {
		let parent = path.parent().unwrap_or_else(|| Path::new("."));
		let stem = path.file_stem().unwrap_or_default().to_string_lossy().to_string();

		// A file somewhere under a `src/` directory belongs to that
		// workspace; its module name is the path relative to `src/`.
		let mut parts = vec![stem.clone()];
		let mut dir = parent;
		loop {
			if dir.file_name().is_some_and(|name| name == "src") {
				let workspace = dir.parent().unwrap_or_else(|| Path::new("."));
				parts.reverse();
				let full_name = parts.join("/");
				let mut ctx = Context::new(workspace);
				if ctx.load_module(&full_name, &mut report) {
					return Ok((ctx, full_name));
				}
				return Err(report);
			}
			match (dir.file_name(), dir.parent()) {
				(Some(component), Some(up)) => {
					parts.push(component.to_string_lossy().to_string());
					dir = up;
				}
				_ => break,
			}
		}

		// Free-standing file: load its JSON directly.
		let mut ctx = Context::new(parent);
		let text = std::fs::read_to_string(path).map_err(|error| {
			Report::error(
				"EUKN",
				"Failed to read module file",
				serde_json::json!({ "Module File": module_arg, "Error": error.to_string() }),
			)
		})?;
		let value: serde_json::Value = serde_json::from_str(&text).map_err(|error| {
			Report::error(
				"EUKN",
				"Module file is not valid JSON",
				serde_json::json!({ "Module File": module_arg, "Error": error.to_string() }),
			)
		})?;
		if ctx.load_module_json(&stem, &value, &mut report) {
			if !report.is_empty() {
				log::warn!("{report}");
			}
			return Ok((ctx, stem));
		}
		return Err(report);
	}

	let workspace: PathBuf = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	let name = module_arg.strip_suffix(".chimod").unwrap_or(module_arg);
	let mut ctx = Context::new(workspace);
	if ctx.load_module(name, &mut report) {
		if !report.is_empty() {
			log::warn!("{report}");
		}
		return Ok((ctx, name.to_string()));
	}
	Err(report)
}

fn compile_to_ir(module_arg: &str) -> Result<ir::Module, Report> {
	let (ctx, name) = load(module_arg)?;
	let mut report = Report::new();
	match ctx.compile_module(&name, &mut report) {
		Some(module) => {
			if !report.is_empty() {
				log::warn!("{report}");
			}
			Ok(module)
		}
		None => Err(report),
	}
}

fn compile(module_arg: &str, target: Target) -> i32 {
	let module = match compile_to_ir(module_arg) {
		Ok(module) => module,
		Err(report) => return fail(&report),
	};
	match target {
		Target::Ll => print!("{module}"),
		Target::Bc => {
			let bytes = ir::binary::encode(&module);
			if let Err(error) = std::io::stdout().write_all(&bytes) {
				eprintln!("failed to write bitcode: {error}");
				return 1;
			}
		}
	}
	0
}

fn execute(module: &ir::Module) -> i32 {
	let mut stdout = std::io::stdout();
	match ir::interp::run_main(module, &mut stdout) {
		Ok(code) => code,
		Err(trap) => {
			eprintln!("trap: {trap}");
			1
		}
	}
}

fn interpret() -> i32 {
	let mut input = Vec::new();
	if let Err(error) = std::io::stdin().read_to_end(&mut input) {
		eprintln!("failed to read stdin: {error}");
		return 1;
	}

	let module = if ir::binary::is_binary(&input) {
		match ir::binary::decode(&input) {
			Ok(module) => module,
			Err(error) => {
				eprintln!("malformed bitcode: {error}");
				return 1;
			}
		}
	} else {
		let text = match String::from_utf8(input) {
			Ok(text) => text,
			Err(_) => {
				eprintln!("stdin is neither bitcode nor UTF-8 IR");
				return 1;
			}
		};
		match ir::parse::parse_module(&text) {
			Ok(module) => module,
			Err(error) => {
				eprintln!("malformed IR: {error}");
				return 1;
			}
		}
	};
	execute(&module)
}

fn run(module_arg: &str) -> i32 {
	match compile_to_ir(module_arg) {
		Ok(module) => execute(&module),
		Err(report) => fail(&report),
	}
}
