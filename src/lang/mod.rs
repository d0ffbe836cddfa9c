//! Language strategies.
//!
//! The pipeline stays language-agnostic; strategies define the file
//! extension and the compile/run stages for each supported language.
//! The registry is closed: adding a language is a code change.

pub mod cpp;
pub mod python;

use crate::runner::CancelToken;
use crate::types::{ExecutionResult, ResourceLimits, Result, SandboxError};
use std::path::Path;

/// Chunk callback fed by both stages; one side is populated per call.
pub type OutputSink<'a> = &'a mut dyn FnMut(&[u8], &[u8]);

/// Language-specific compile/run stages.
///
/// Compile stages run unsandboxed (the toolchain is trusted); run stages
/// are sandboxed with the supplied limits. Both forward the same sink, so
/// compiler diagnostics reach the client as stderr chunks.
pub trait LanguageStrategy: Send + Sync {
    fn tag(&self) -> &'static str;

    /// Source file extension, dot included.
    fn extension(&self) -> &'static str;

    /// Output artifact name for compiled languages; `None` means the run
    /// stage executes the source file itself.
    fn binary_name(&self) -> Option<&'static str>;

    fn compile(
        &self,
        source: &Path,
        binary: &Path,
        sink: OutputSink<'_>,
        cancel: &CancelToken,
    ) -> ExecutionResult;

    fn run(
        &self,
        program: &Path,
        sink: OutputSink<'_>,
        limits: &ResourceLimits,
        cancel: &CancelToken,
    ) -> ExecutionResult;
}

/// Resolves a strategy for a language tag.
pub fn strategy_for(language: &str) -> Result<&'static dyn LanguageStrategy> {
    match language {
        "cpp" => Ok(&cpp::CppStrategy),
        "python" => Ok(&python::PythonStrategy),
        _ => Err(SandboxError::UnsupportedLanguage(language.to_string())),
    }
}
