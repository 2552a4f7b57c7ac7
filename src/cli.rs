//! CLI argument parsing for the test generator.
//!
//! The CLI is intentionally thin: it names the template, the output, and which
//! registry to draw cases from. Generation policy lives in `codegen`.
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::cases::ParamShape;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "generate",
    version,
    about = "Generate LNURL signer tests from a marker template",
    after_help = "Markers:\n  // {{DO_NOT_MODIFY}}     auto-generated banner\n  // {{SIGNER_TESTS}}      generated test routines\n  // {{SIGNER_RUN_TESTS}}  generated RUN_TEST registrations\n\nExamples:\n  generate test/templates/main.cpp test/main.cpp\n  generate --shape plain test/templates/main.cpp test/main.cpp\n  generate --check test/templates/main.cpp test/main.cpp"
)]
pub struct RootArgs {
    /// Template containing `// {{KEY}}` markers (never modified)
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// Destination for the generated source file (overwritten)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Parameter shape of the signer API under test
    #[arg(long, value_enum)]
    pub shape: Option<ShapeArg>,

    /// JSON case file replacing the built-in registry
    #[arg(long, value_name = "PATH")]
    pub cases: Option<PathBuf>,

    /// Compare against the existing output instead of writing it
    #[arg(long)]
    pub check: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ShapeArg {
    Plain,
    Scaled,
}

impl From<ShapeArg> for ParamShape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Plain => ParamShape::Plain,
            ShapeArg::Scaled => ParamShape::Scaled,
        }
    }
}
