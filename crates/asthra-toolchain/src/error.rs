//! `DriverError`: the toolchain driver's error taxonomy.

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// One of the required tools (`opt`, `llc`, `clang`, `llvm-cov`,
    /// `llvm-profdata`) could not be found on `PATH` or any versioned
    /// fallback name.
    #[error("required tool '{0}' not found on PATH")]
    ToolNotFound(&'static str),

    /// A subprocess exited non-zero; stderr is surfaced verbatim.
    #[error("'{tool}' exited with status {code}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    /// The coverage summary parser could not find a `TOTAL` row.
    #[error("llvm-cov report had no TOTAL row")]
    MissingCoverageSummary,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
