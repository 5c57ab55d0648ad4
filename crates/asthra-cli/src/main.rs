//! Asthra compiler CLI.
//!
//! Provides the `asthra` binary with subcommands that wire together the
//! four pipeline crates: `compile` lowers a typed AST to LLVM IR and drives
//! it through the toolchain to IR/assembly/object/executable, and
//! `emit-object` drives the standalone ELF/Mach-O writer directly, for
//! producing an object carrying the Asthra-specific metadata sections that
//! `llc`'s own object emission knows nothing about.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use inkwell::context::Context;

use asthra_ast::{Module as AstModule, TypeRegistry};
use asthra_object::elf::{ElfMachine, ElfWriter};
use asthra_object::{Symbol, SymbolBinding, SymbolType};
use asthra_toolchain::{compile_pipeline, DriverError, PipelineOptions};

/// Asthra compiler and tools.
#[derive(Parser)]
#[command(name = "asthra", about = "Asthra compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a typed-AST program to IR/assembly/object/executable.
    Compile {
        /// Path to the JSON-serialized compilation unit (`{"module": ..., "types": ...}`).
        #[arg(short, long)]
        input: PathBuf,

        /// Output path.
        #[arg(short, long)]
        output: PathBuf,

        /// Path to the JSON-serialized `PipelineOptions` (default: `OptLevel::None`, `OutputFormat::Executable`).
        #[arg(long)]
        options: Option<PathBuf>,

        /// Emit debug info while lowering.
        #[arg(long)]
        debug_info: bool,

        /// Echo toolchain invocations to stderr.
        #[arg(long)]
        verbose: bool,
    },
    /// Build a relocatable object directly from a symbol/metadata
    /// description, bypassing the LLVM toolchain entirely.
    EmitObject {
        /// Path to the JSON-serialized `ObjectSpec`.
        #[arg(short, long)]
        input: PathBuf,

        /// Output object-file path.
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Wire-format compilation unit: the typed AST plus the type arena it
/// references, as a semantic analyzer (out of scope here) would hand off.
#[derive(serde::Deserialize)]
struct CompilationUnit {
    module: AstModule,
    types: TypeRegistry,
}

/// Wire-format input to `emit-object`: the function symbols to record and
/// the Asthra metadata entries to attach.
#[derive(serde::Deserialize, Default)]
struct ObjectSpec {
    #[serde(default)]
    functions: Vec<ObjectFunction>,
    #[serde(default)]
    gc_roots: Vec<asthra_object::metadata::GcEntry>,
}

#[derive(serde::Deserialize)]
struct ObjectFunction {
    name: String,
    address: u64,
}

fn main() {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Compile { input, output, options, debug_info, verbose } => {
            run_compile(input, output, options, debug_info, verbose)
        }
        Commands::EmitObject { input, output } => run_emit_object(input, output),
    };
    process::exit(exit_code);
}

/// Exit codes: 0 success, 1 codegen error, 2 I/O error, 3 toolchain-driver
/// error.
fn run_compile(
    input: PathBuf,
    output: PathBuf,
    options_path: Option<PathBuf>,
    debug_info: bool,
    verbose: bool,
) -> i32 {
    let unit_text = match fs::read_to_string(&input) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            return 2;
        }
    };
    let unit: CompilationUnit = match serde_json::from_str(&unit_text) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("Error: malformed compilation unit: {}", e);
            return 2;
        }
    };

    let mut pipeline_options = match options_path {
        Some(path) => match fs::read_to_string(&path).ok().and_then(|text| serde_json::from_str::<PipelineOptions>(&text).ok()) {
            Some(opts) => opts,
            None => {
                eprintln!("Error: failed to read or parse pipeline options at '{}'", path.display());
                return 2;
            }
        },
        None => PipelineOptions::default(),
    };
    pipeline_options.debug_info = debug_info || pipeline_options.debug_info;
    pipeline_options.verbose = verbose || pipeline_options.verbose;

    let context = Context::create();
    let lowered = match asthra_codegen::lower_module(&context, &unit.module, &unit.types, pipeline_options.debug_info, &input) {
        Ok(lowered) => lowered,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return 1;
        }
    };

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: failed to create scratch directory: {}", e);
            return 2;
        }
    };
    let ir_path = scratch.path().join("module.ll");
    if let Err(e) = lowered.module.print_to_file(&ir_path) {
        eprintln!("Error: failed to write intermediate IR: {}", e);
        return 2;
    }

    match compile_pipeline(&ir_path, &output, &pipeline_options) {
        Ok(result) => {
            println!("{}", serde_json::json!({ "output": result.output_path, "steps": result.steps.len() }));
            0
        }
        Err(DriverError::ToolNotFound(tool)) => {
            eprintln!("Error: required tool '{}' was not found on PATH", tool);
            3
        }
        Err(DriverError::ToolFailed { tool, code, stderr }) => {
            eprintln!("Error: '{}' exited with code {}:\n{}", tool, code, stderr);
            3
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            3
        }
    }
}

/// Exit codes: 0 success, 2 I/O error, 4 object-writer error.
fn run_emit_object(input: PathBuf, output: PathBuf) -> i32 {
    let spec_text = match fs::read_to_string(&input) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            return 2;
        }
    };
    let spec: ObjectSpec = match serde_json::from_str(&spec_text) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Error: malformed object spec: {}", e);
            return 2;
        }
    };

    let mut writer = ElfWriter::new(ElfMachine::X86_64);
    for function in &spec.functions {
        writer.symbols.push(Symbol {
            name: function.name.clone(),
            value: function.address,
            size: 0,
            section_index: 1,
            binding: SymbolBinding::Global,
            sym_type: SymbolType::Func,
        });
    }
    if !spec.gc_roots.is_empty() {
        writer.add_metadata_section(asthra_object::metadata::build_gc_section(&spec.gc_roots));
    }

    let bytes = match writer.write() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: object write failed: {}", e);
            return 4;
        }
    };

    if let Err(e) = fs::write(&output, &bytes) {
        eprintln!("Error: failed to write '{}': {}", output.display(), e);
        return 2;
    }
    0
}
