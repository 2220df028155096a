//! Test support: drive source strings through the pipeline and hand
//! back the stage results, with errors flattened to strings so tests
//! read cleanly.

use crate::codegen::CompileOutput;
use crate::loader;
use crate::program::Program;

/// Compile a single-file main package to its outputs.
pub fn compile_source(src: &str) -> Result<CompileOutput, String> {
    compile_sources(&[("main.gx", src)])
}

/// Compile a multi-file (and multi-package) program; paths with a
/// directory component form packages, e.g. `person/person.gx`.
pub fn compile_sources(sources: &[(&str, &str)]) -> Result<CompileOutput, String> {
    let loaded = loader::load_sources(sources).map_err(join_load_errors)?;
    crate::compile(loaded).map_err(|diags| diags.to_string())
}

/// Parse and check without generating code.
pub fn check_source(src: &str) -> Result<Program, String> {
    check_sources(&[("main.gx", src)])
}

pub fn check_sources(sources: &[(&str, &str)]) -> Result<Program, String> {
    let loaded = loader::load_sources(sources).map_err(join_load_errors)?;
    let (program, diagnostics) = crate::check_loaded(loaded);
    if diagnostics.is_empty() {
        Ok(program)
    } else {
        Err(diagnostics.to_string())
    }
}

fn join_load_errors(errors: Vec<loader::LoadError>) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
