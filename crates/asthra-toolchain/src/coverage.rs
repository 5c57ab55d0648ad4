//! Coverage sub-driver: `.profraw` merge, `llvm-cov` report generation, and
//! the `TOTAL` row summary parser.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::DriverError;
use crate::process::{run_checked, ToolResult};
use crate::tool_cache;

/// Paths excluded from coverage reports: tests, third-party code, and
/// build-output trees.
const IGNORE_REGEX: &str = r"(^|/)(tests?|third_party|vendor|target|build)(/|$)";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportFormat {
    Text,
    Html,
    Lcov,
    Json,
}

/// Percentages extracted from `llvm-cov report`'s `TOTAL` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSummary {
    pub lines_pct: f64,
    pub functions_pct: f64,
    pub regions_pct: f64,
}

/// Merges a set of `.profraw` profiles into a single `.profdata` file via
/// `llvm-profdata merge -sparse`.
pub fn merge_profiles(profraw_files: &[PathBuf], output: &Path, verbose: bool) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("llvm-profdata")?;
    let mut args = vec!["merge".to_string(), "-sparse".to_string()];
    args.extend(profraw_files.iter().map(|p| p.display().to_string()));
    args.push("-o".to_string());
    args.push(output.display().to_string());
    run_checked("llvm-profdata", &tool_path, &args, verbose)
}

/// Runs `llvm-cov show`/`export` against `binary` using `profdata`,
/// producing a report in `format`.
pub fn report(
    binary: &Path,
    profdata: &Path,
    format: ReportFormat,
    verbose: bool,
) -> Result<ToolResult, DriverError> {
    let tool_path = tool_cache::resolve("llvm-cov")?;
    let subcommand = match format {
        ReportFormat::Text | ReportFormat::Html => "show",
        ReportFormat::Lcov | ReportFormat::Json => "export",
    };
    let mut args = vec![
        subcommand.to_string(),
        binary.display().to_string(),
        format!("-instr-profile={}", profdata.display()),
        format!("-ignore-filename-regex={IGNORE_REGEX}"),
    ];
    match format {
        ReportFormat::Html => args.push("-format=html".to_string()),
        ReportFormat::Lcov => args.push("-format=lcov".to_string()),
        _ => {}
    }
    run_checked("llvm-cov", &tool_path, &args, verbose)
}

/// Invokes `llvm-cov report` and parses its `TOTAL` row for the three
/// summary percentages").
pub fn summarize(binary: &Path, profdata: &Path, verbose: bool) -> Result<CoverageSummary, DriverError> {
    let tool_path = tool_cache::resolve("llvm-cov")?;
    let args = vec![
        "report".to_string(),
        binary.display().to_string(),
        format!("-instr-profile={}", profdata.display()),
        format!("-ignore-filename-regex={IGNORE_REGEX}"),
    ];
    let result = run_checked("llvm-cov", &tool_path, &args, verbose)?;
    parse_total_row(&result.stdout).ok_or(DriverError::MissingCoverageSummary)
}

/// Parses a `TOTAL` row from `llvm-cov report` text output. The row layout
/// is `TOTAL <region counts> <region%> <function counts> <function%> <line
/// counts> <line%> ...`; this extracts every `NN.NN%` token and assigns
/// them positionally (regions, functions, lines), matching the column order
/// `llvm-cov report` always emits.
fn parse_total_row(report_text: &str) -> Option<CoverageSummary> {
    let total_line = report_text.lines().find(|line| line.trim_start().starts_with("TOTAL"))?;
    let pct_re = Regex::new(r"(\d+(?:\.\d+)?)%").expect("static regex is valid");
    let percentages: Vec<f64> = pct_re
        .captures_iter(total_line)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .collect();
    if percentages.len() < 3 {
        return None;
    }
    Some(CoverageSummary {
        regions_pct: percentages[0],
        functions_pct: percentages[1],
        lines_pct: percentages[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_representative_total_row() {
        let report = "\
Filename                      Regions    Missed Regions     Cover   Functions  Missed Functions  Executed       Lines      Missed Lines     Cover
-----------------------------------------------------------------------------------------------------------------------------------------------
src/lib.rs                         10                 2    80.00%           3                 0   100.00%          42                 5    88.10%
-----------------------------------------------------------------------------------------------------------------------------------------------
TOTAL                               10                 2    80.00%           3                 0   100.00%          42                 5    88.10%
";
        let summary = parse_total_row(report).unwrap();
        assert_eq!(summary.regions_pct, 80.00);
        assert_eq!(summary.functions_pct, 100.00);
        assert_eq!(summary.lines_pct, 88.10);
    }

    #[test]
    fn missing_total_row_returns_none() {
        assert!(parse_total_row("nothing to see here").is_none());
    }

    #[test]
    fn ignore_regex_excludes_conventional_noise_dirs() {
        let re = Regex::new(IGNORE_REGEX).unwrap();
        assert!(re.is_match("tests/foo.rs"));
        assert!(re.is_match("third_party/lib/x.rs"));
        assert!(!re.is_match("src/lib.rs"));
    }
}
