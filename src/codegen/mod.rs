//! Backend: typed trees in, C++ and GLSL text out.
//!
//! The pipeline behind this module:
//! 1. Type generator — expressions, declarations, definitions, metadata
//! 2. Signature generator — including the field-tag method rewrite
//! 3. Expression/statement writer — bodies, with pointer/value coercion
//! 4. Emitter — assembles the `.cc`/`.hh` pair and one GLSL file per
//!    shader entry
//!
//! All generators memoize into the `Compiler` value and are free of
//! emission side effects; the writer streams into the current output
//! buffer with automatic indentation. Determinism is load-bearing: the
//! same program must produce byte-identical output on every run.

pub mod emit;
pub mod expr;
pub mod func_gen;
pub mod glsl;
pub mod stmt;
pub mod type_gen;

pub use emit::{compile, CompileOutput};

use crate::ast::Span;
use crate::directives::{Directives, Target};
use crate::errors::Diagnostics;
use crate::hoist::Hoisted;
use crate::program::Program;
use crate::types::{ObjId, Type, TypeId};
use std::collections::HashMap;
use std::fmt;

pub struct Compiler<'a> {
    pub(crate) program: &'a Program,
    pub(crate) directives: &'a Directives,
    pub(crate) hoisted: &'a Hoisted,
    pub(crate) target: Target,

    // Memoized generators. Type expressions are per-target; declaration,
    // definition and metadata strings are target-independent.
    pub(crate) type_exprs: HashMap<(Target, TypeId), String>,
    pub(crate) type_decls: HashMap<ObjId, String>,
    pub(crate) type_defns: HashMap<ObjId, String>,
    pub(crate) type_metas: HashMap<ObjId, String>,
    pub(crate) func_sigs: HashMap<(Target, ObjId), String>,

    // Field-tag method rewrite results, filled by the signature
    // generator and read at call sites.
    pub(crate) method_renames: HashMap<ObjId, String>,
    pub(crate) method_field_tags: HashMap<ObjId, String>,

    pub(crate) indent: usize,
    pub(crate) output: String,
    pub(crate) at_block_end: bool,
    pub(crate) diagnostics: Diagnostics,
}

impl<'a> Compiler<'a> {
    pub fn new(program: &'a Program, directives: &'a Directives, hoisted: &'a Hoisted) -> Self {
        Compiler {
            program,
            directives,
            hoisted,
            target: Target::Cpp,
            type_exprs: HashMap::new(),
            type_decls: HashMap::new(),
            type_defns: HashMap::new(),
            type_metas: HashMap::new(),
            func_sigs: HashMap::new(),
            method_renames: HashMap::new(),
            method_field_tags: HashMap::new(),
            indent: 0,
            output: String::new(),
            at_block_end: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Append to the current output buffer, padding a fresh line with
    /// the current indentation.
    pub(crate) fn write(&mut self, s: &str) {
        self.at_block_end = false;
        if self.output.ends_with('\n') {
            for _ in 0..2 * self.indent {
                self.output.push(' ');
            }
        }
        self.output.push_str(s);
    }

    pub(crate) fn errorf(&mut self, span: Span, message: impl fmt::Display) {
        let pos = self.program.position(span);
        self.diagnostics.report(&pos, message);
    }

    pub(crate) fn errored(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Whether a type is (or points at) a pointer, for coercion checks.
    pub(crate) fn is_pointer(&self, ty: TypeId) -> bool {
        matches!(self.program.ty(ty), Type::Pointer(_))
    }

    /// The field objects of a struct type, chasing named types to their
    /// underlying.
    pub(crate) fn underlying_struct(&self, ty: TypeId) -> Option<Vec<ObjId>> {
        match self.program.ty(ty) {
            Type::Named { obj, .. } => {
                let under = self.program.info.underlying.get(obj)?;
                match self.program.ty(*under) {
                    Type::Struct { fields } => Some(fields.clone()),
                    _ => None,
                }
            }
            Type::Struct { fields } => Some(fields.clone()),
            _ => None,
        }
    }
}

/// Type expressions carry a trailing space so a following identifier
/// never fuses with them; trim it inside template argument lists.
pub(crate) fn trim_final_space(s: &str) -> &str {
    s.strip_suffix(' ').unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_final_space_only_trims_one() {
        assert_eq!(trim_final_space("int "), "int");
        assert_eq!(trim_final_space("int"), "int");
        assert_eq!(trim_final_space("int  "), "int ");
        assert_eq!(trim_final_space(""), "");
    }
}
