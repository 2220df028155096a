//! gx — a whole-program compiler from a disciplined Go-shaped source
//! subset to C++17/20, plus GLSL fragment shaders for tagged entry
//! functions.
//!
//! Pipeline: load (discover and parse packages) → check (resolve and
//! type) → collect directives → hoist declarations → generate code.
//! The backend walks typed trees and streams text; it never mutates the
//! program.

pub mod ast;
pub mod check;
pub mod codegen;
pub mod directives;
pub mod errors;
pub mod hoist;
pub mod lexer;
pub mod loader;
pub mod output;
pub mod parser;
pub mod program;
pub mod runtime;
pub mod test_support;
pub mod types;

pub use codegen::{CompileOutput, Compiler};
pub use errors::Diagnostics;
pub use program::Program;

/// Check a loaded program and run the backend. All diagnostics — from
/// the checker or from the generators — abort the compilation; no
/// partial output escapes.
pub fn compile(loaded: loader::Loaded) -> Result<CompileOutput, Diagnostics> {
    let (program, diagnostics) = check_loaded(loaded);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    let directives = directives::collect(&program);
    let hoisted = hoist::hoist(&program, &directives);
    let out = codegen::compile(&program, &directives, &hoisted);
    if out.diagnostics.is_empty() {
        Ok(out)
    } else {
        Err(out.diagnostics)
    }
}

/// Run the checker over loaded sources, converting checker errors into
/// positioned diagnostics.
pub fn check_loaded(loaded: loader::Loaded) -> (Program, Diagnostics) {
    let checker = check::Checker::new(loaded.files, loaded.packages, loaded.main_pkg);
    let (program, errors) = checker.run();
    let mut diagnostics = Diagnostics::new();
    for err in errors {
        let pos = program.position(err.span());
        diagnostics.report(&pos, &err);
    }
    (program, diagnostics)
}
