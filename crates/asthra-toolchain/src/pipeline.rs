//! `compile_pipeline`: the single entry point composing opt/llc/clang steps.
//! Mirrors `lmlang_codegen::compiler::compile`'s numbered-step orchestration
//! style, but shells out to the real LLVM toolchain binaries instead of
//! driving `inkwell`'s in-process pass manager and target machine.

use std::path::{Path, PathBuf};

use crate::error::DriverError;
use crate::options::{OutputFormat, PipelineOptions};
use crate::process::{run_checked, ToolResult};
use crate::tool_cache;

pub struct PipelineResult {
    pub output_path: PathBuf,
    pub steps: Vec<ToolResult>,
}

/// Runs `ir_file` (`.ll`) through the pipeline described by `options`,
/// producing `output_file` in `options.output_format`.
pub fn compile_pipeline(
    ir_file: &Path,
    output_file: &Path,
    options: &PipelineOptions,
) -> Result<PipelineResult, DriverError> {
    let mut steps = Vec::new();
    let scratch = tempfile::tempdir()?;

    // Coverage instrumentation must survive intact, so the optimizer is
    // skipped entirely and IR goes straight to `clang` to preserve instrumentation").
    if options.coverage && options.output_format == OutputFormat::Executable {
        let result = invoke_clang_direct(ir_file, output_file, options)?;
        steps.push(result);
        return Ok(PipelineResult {
            output_path: output_file.to_path_buf(),
            steps,
        });
    }

    // 1. `llvm_ir` with no optimization is a byte-for-byte copy.
    if options.output_format == OutputFormat::LlvmIr && options.opt_level == crate::options::OptLevel::None {
        std::fs::copy(ir_file, output_file)?;
        return Ok(PipelineResult {
            output_path: output_file.to_path_buf(),
            steps,
        });
    }

    // 2. Run `opt` when optimization was requested, producing bitcode.
    let optimized_path = scratch.path().join("optimized.bc");
    let working_ir = if options.opt_level != crate::options::OptLevel::None || options.pass_pipeline.is_some() {
        let result = invoke_opt(ir_file, &optimized_path, options)?;
        steps.push(result);
        optimized_path.clone()
    } else {
        ir_file.to_path_buf()
    };

    match options.output_format {
        OutputFormat::LlvmIr | OutputFormat::LlvmBc => {
            // 3. Already in the requested shape; move into place.
            std::fs::copy(&working_ir, output_file)?;
        }
        OutputFormat::Assembly | OutputFormat::Object => {
            // `llc` applies no further optimization; it was already done above.
            let result = invoke_llc(&working_ir, output_file, options)?;
            steps.push(result);
        }
        OutputFormat::Executable => {
            let result = invoke_clang_link(&working_ir, output_file, options)?;
            steps.push(result);
        }
    }

    // Scratch directory (and anything left in it) is removed on drop.
    Ok(PipelineResult {
        output_path: output_file.to_path_buf(),
        steps,
    })
}

fn invoke_opt(input: &Path, output: &Path, options: &PipelineOptions) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("opt")?;
    let mut args = vec![input.display().to_string()];
    if let Some(passes) = &options.pass_pipeline {
        args.push(format!("-passes={passes}"));
    } else {
        args.push(options.opt_level.as_opt_flag().to_string());
    }
    if options.debug_info {
        args.push("-debugify".to_string());
    }
    args.push("-o".to_string());
    args.push(output.display().to_string());
    run_checked("opt", &tool_path, &args, options.verbose)
}

fn invoke_llc(input: &Path, output: &Path, options: &PipelineOptions) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("llc")?;
    let mut args = vec![input.display().to_string()];
    if let Some(triple) = options.target_arch.triple() {
        args.push(format!("-mtriple={triple}"));
    }
    if options.output_format == OutputFormat::Object {
        args.push("-filetype=obj".to_string());
    } else {
        args.push("-filetype=asm".to_string());
    }
    args.push("-o".to_string());
    args.push(output.display().to_string());
    run_checked("llc", &tool_path, &args, options.verbose)
}

fn invoke_clang_link(input: &Path, output: &Path, options: &PipelineOptions) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("clang")?;
    let mut args = common_clang_args(options);
    args.push(input.display().to_string());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    append_runtime_lib_flags(&mut args, options);
    run_checked("clang", &tool_path, &args, options.verbose)
}

fn invoke_clang_direct(ir_file: &Path, output: &Path, options: &PipelineOptions) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("clang")?;
    let mut args = common_clang_args(options);
    args.push("-fprofile-instr-generate".to_string());
    args.push("-fcoverage-mapping".to_string());
    args.push(ir_file.display().to_string());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    append_runtime_lib_flags(&mut args, options);
    run_checked("clang", &tool_path, &args, options.verbose)
}

fn common_clang_args(options: &PipelineOptions) -> Vec<String> {
    let mut args = vec![options.opt_level.as_opt_flag().to_string()];
    if let Some(triple) = options.target_arch.triple() {
        args.push(format!("--target={triple}"));
    }
    if options.debug_info {
        args.push("-g".to_string());
    }
    match options.pie_mode {
        crate::options::PieMode::Default => {}
        crate::options::PieMode::ForceOn => {
            args.push("-pie".to_string());
            args.push("-fPIE".to_string());
        }
        crate::options::PieMode::ForceOff => {
            args.push("-no-pie".to_string());
            args.push("-fno-PIE".to_string());
        }
    }
    args
}

fn append_runtime_lib_flags(args: &mut Vec<String>, options: &PipelineOptions) {
    for dir in &options.runtime_lib_search_paths {
        args.push(format!("-L{}", dir.display()));
    }
    args.push("-lasthra_runtime".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptLevel;

    #[test]
    fn llvm_ir_with_no_optimization_is_a_plain_copy() {
        let dir = tempfile::tempdir().unwrap();
        let ir_path = dir.path().join("in.ll");
        std::fs::write(&ir_path, "; ModuleID = 't'\n").unwrap();
        let out_path = dir.path().join("out.ll");
        let options = PipelineOptions {
            opt_level: OptLevel::None,
            output_format: OutputFormat::LlvmIr,
            ..Default::default()
        };
        let result = compile_pipeline(&ir_path, &out_path, &options).unwrap();
        assert_eq!(result.output_path, out_path);
        assert!(result.steps.is_empty());
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "; ModuleID = 't'\n");
    }
}
