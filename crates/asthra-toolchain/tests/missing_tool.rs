//! End-to-end scenario: toolchain driver error surface. With every LLVM
//! tool absent from `PATH`, the pipeline must fail with an error
//! identifying the missing tool, and must not produce an output file.

use std::path::PathBuf;

use asthra_toolchain::{compile_pipeline, DriverError, OutputFormat, PipelineOptions};

#[test]
fn pipeline_fails_cleanly_when_required_tools_are_absent() {
    let empty_path_dir = tempfile::tempdir().unwrap();
    let original_path = std::env::var_os("PATH");
    std::env::set_var("PATH", empty_path_dir.path());

    let workdir = tempfile::tempdir().unwrap();
    let ir_path = workdir.path().join("in.ll");
    std::fs::write(&ir_path, "; ModuleID = 't'\n").unwrap();
    let output_path: PathBuf = workdir.path().join("out");

    let options = PipelineOptions {
        output_format: OutputFormat::Executable,
        coverage: true,
        ..Default::default()
    };

    let result = compile_pipeline(&ir_path, &output_path, &options);

    if let Some(path) = original_path {
        std::env::set_var("PATH", path);
    } else {
        std::env::remove_var("PATH");
    }

    assert!(matches!(result, Err(DriverError::ToolNotFound("clang"))));
    assert!(!output_path.exists());
}
