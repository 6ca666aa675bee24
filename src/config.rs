// ABOUTME: Configuration and constants for the Mini-C compiler

use std::path::PathBuf;

pub const VERSION: &str = "0.1.0";
pub const BANNER: &str = "Mini-C Compiler";

/// Optimization level, gating which optimizer passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    O0,
    O1,
    O2,
}

impl OptLevel {
    pub fn constant_folding_enabled(self) -> bool {
        self >= OptLevel::O1
    }

    pub fn dead_temp_elimination_enabled(self) -> bool {
        self >= OptLevel::O1
    }

    pub fn strength_reduction_enabled(self) -> bool {
        self >= OptLevel::O2
    }
}

impl Default for OptLevel {
    fn default() -> Self {
        OptLevel::O2
    }
}

impl std::str::FromStr for OptLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "O0" => Ok(OptLevel::O0),
            "1" | "O1" => Ok(OptLevel::O1),
            "2" | "O2" => Ok(OptLevel::O2),
            other => Err(format!("unknown optimization level '{}'", other)),
        }
    }
}

/// Compilation target, chosen by `--target=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    C,
    X86,
}

impl Target {
    pub fn output_extension(self) -> &'static str {
        match self {
            Target::C => "c",
            Target::X86 => "asm",
        }
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Target::C),
            "x86" => Ok(Target::X86),
            other => Err(format!("unknown target '{}'", other)),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::X86
    }
}

/// Resolved configuration for a single compilation run, built in `main.rs`
/// from the parsed CLI arguments.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub source: PathBuf,
    pub optimization: OptLevel,
    pub target: Target,
    pub dump_ast: bool,
    pub dump_ir: bool,
    pub dump_all: bool,
    pub run_after_compile: bool,
}

impl CompilerConfig {
    pub fn wants_ast_dump(&self) -> bool {
        self.dump_ast || self.dump_all
    }

    pub fn wants_ir_dump(&self) -> bool {
        self.dump_ir || self.dump_all
    }

    /// Output artifact path: source path with the target's extension.
    pub fn output_path(&self) -> PathBuf {
        self.source.with_extension(self.target.output_extension())
    }
}
