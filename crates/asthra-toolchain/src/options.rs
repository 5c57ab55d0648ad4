//! Pipeline configuration types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OptLevel {
    #[default]
    None,
    Basic,
    Standard,
    Aggressive,
}

impl OptLevel {
    pub fn as_opt_flag(self) -> &'static str {
        match self {
            OptLevel::None => "-O0",
            OptLevel::Basic => "-O1",
            OptLevel::Standard => "-O2",
            OptLevel::Aggressive => "-O3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetArch {
    X86_64,
    Arm64,
    Wasm32,
    #[default]
    Native,
}

impl TargetArch {
    /// The target triple to pass to `llc`/`clang`, or `None` for `native`
    /// (let the tool pick the host triple).
    pub fn triple(self) -> Option<&'static str> {
        match self {
            TargetArch::X86_64 => Some("x86_64-pc-linux-gnu"),
            TargetArch::Arm64 => Some("aarch64-unknown-linux-gnu"),
            TargetArch::Wasm32 => Some("wasm32-unknown-unknown"),
            TargetArch::Native => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    LlvmIr,
    LlvmBc,
    Assembly,
    Object,
    #[default]
    Executable,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::LlvmIr => "ll",
            OutputFormat::LlvmBc => "bc",
            OutputFormat::Assembly => "s",
            OutputFormat::Object => "o",
            OutputFormat::Executable => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PieMode {
    #[default]
    Default,
    ForceOn,
    ForceOff,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineOptions {
    pub opt_level: OptLevel,
    pub target_arch: TargetArch,
    pub output_format: OutputFormat,
    pub debug_info: bool,
    pub pie_mode: PieMode,
    pub coverage: bool,
    pub verbose: bool,
    pub pass_pipeline: Option<String>,
    /// Candidate directories to search for the Asthra runtime library when
    /// linking an executable.
    pub runtime_lib_search_paths: Vec<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_level_maps_to_flags() {
        assert_eq!(OptLevel::None.as_opt_flag(), "-O0");
        assert_eq!(OptLevel::Aggressive.as_opt_flag(), "-O3");
    }

    #[test]
    fn native_arch_has_no_explicit_triple() {
        assert_eq!(TargetArch::Native.triple(), None);
        assert!(TargetArch::X86_64.triple().is_some());
    }

    #[test]
    fn serde_roundtrip() {
        let opts = PipelineOptions {
            opt_level: OptLevel::Standard,
            coverage: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: PipelineOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.opt_level, OptLevel::Standard);
        assert!(back.coverage);
    }
}
