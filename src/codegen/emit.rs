//! Output assembly.
//!
//! The source stream carries everything; the header stream carries the
//! subset reachable from behavior-marked types, and each shader entry
//! becomes its own GLSL stream. Nothing is written to disk here; the
//! driver owns file IO and refuses to write when diagnostics exist.

use super::Compiler;
use crate::ast;
use crate::directives::{Directives, Target};
use crate::errors::Diagnostics;
use crate::hoist::Hoisted;
use crate::program::Program;
use crate::types::ObjKind;

/// The assembled outputs of one compilation.
#[derive(Debug)]
pub struct CompileOutput {
    pub cc: String,
    pub hh: String,
    /// `(entry function name, shader source)` pairs, in entry order.
    pub glsls: Vec<(String, String)>,
    pub diagnostics: Diagnostics,
}

pub fn compile(program: &Program, directives: &Directives, hoisted: &Hoisted) -> CompileOutput {
    let mut compiler = Compiler::new(program, directives, hoisted);
    let includes = includes_block(directives);
    let cc = compiler.emit_cc(&includes);
    let hh = compiler.emit_hh(&includes);
    let glsls = compiler.emit_glsls();
    CompileOutput {
        cc,
        hh,
        glsls,
        diagnostics: compiler.diagnostics,
    }
}

fn includes_block(directives: &Directives) -> String {
    let mut out = String::new();
    for include in &directives.includes {
        out.push_str("#include ");
        out.push_str(include);
        out.push('\n');
    }
    out.push_str("#include \"gx.hh\"\n");
    out
}

impl Compiler<'_> {
    fn emit_cc(&mut self, includes: &str) -> String {
        self.target = Target::Cpp;
        self.output = String::new();
        self.indent = 0;

        self.write(includes);

        self.write("\n\n");
        self.write("//\n// Types\n//\n\n");
        for &type_obj in &self.hoisted.types.clone() {
            let decl = self.gen_type_decl(type_obj);
            if !decl.is_empty() {
                self.write(&decl);
                self.write(";\n");
            }
        }
        for &type_obj in &self.hoisted.types.clone() {
            let defn = self.gen_type_defn(type_obj);
            if !defn.is_empty() {
                self.write("\n");
                if self.hoisted.behaviors.contains(&type_obj) {
                    self.write("ComponentTypeListAdd(");
                    self.write(&self.program.obj(type_obj).name.clone());
                    self.write(");\n");
                }
                self.write(&defn);
                self.write(";\n");
            }
        }

        self.write("\n\n");
        self.write("//\n// Meta\n//\n");
        for &type_obj in &self.hoisted.types.clone() {
            if self.gen_type_decl(type_obj).is_empty() {
                continue;
            }
            let meta = self.gen_type_meta(type_obj);
            if !meta.is_empty() {
                self.write("\n");
                self.write(&meta);
                self.write("\n");
            }
        }

        self.write("\n\n");
        self.write("//\n// Function declarations\n//\n\n");
        for &func_obj in &self.hoisted.funcs.clone() {
            let sig = self.gen_func_sig(func_obj);
            self.write(&sig);
            self.write(";\n");
        }

        self.write("\n\n");
        self.write("//\n// Variables\n//\n\n");
        for loc in self.hoisted.values.clone() {
            let spec = self.program.value_spec(loc).clone();
            for (i, name) in spec.names.iter().enumerate() {
                let obj = match self.program.def_of(name.id) {
                    Some(obj) => obj,
                    None => continue,
                };
                self.write("inline ");
                if self.program.obj(obj).kind == ObjKind::Const {
                    self.write("constexpr ");
                }
                let type_expr = self.gen_type_expr(self.program.obj(obj).ty, name.span);
                self.write(&type_expr);
                self.write_ident(name);
                if let Some(value) = spec.values.get(i) {
                    self.write(" = ");
                    self.write_expr(value);
                }
                self.write(";\n");
            }
        }

        self.write("\n\n");
        self.write("//\n// Function definitions\n//\n");
        for &func_obj in &self.hoisted.funcs.clone() {
            let loc = match self.program.info.func_decls.get(&func_obj) {
                Some(loc) => *loc,
                None => continue,
            };
            let decl = self.program.func_decl(loc).clone();
            if let Some(body) = &decl.body {
                self.write("\n");
                let sig = self.gen_func_sig(func_obj);
                self.write(&sig);
                self.write(" ");
                self.write_block(body);
                self.write("\n");
            }
        }

        std::mem::take(&mut self.output)
    }

    fn emit_hh(&mut self, includes: &str) -> String {
        self.target = Target::Cpp;
        let mut out = String::new();

        out.push_str("#pragma once\n\n");
        out.push_str(includes);

        out.push_str("\n\n");
        out.push_str("//\n// Types\n//\n\n");
        for &type_obj in &self.hoisted.types.clone() {
            if !self.hoisted.exports.contains(&type_obj) {
                continue;
            }
            let decl = self.gen_type_decl(type_obj);
            if !decl.is_empty() {
                out.push_str(&decl);
                out.push_str(";\n");
            }
        }
        for &type_obj in &self.hoisted.types.clone() {
            if !self.hoisted.exports.contains(&type_obj) {
                continue;
            }
            let defn = self.gen_type_defn(type_obj);
            if !defn.is_empty() {
                out.push('\n');
                if self.hoisted.behaviors.contains(&type_obj) {
                    out.push_str("ComponentTypeListAdd(");
                    out.push_str(&self.program.obj(type_obj).name);
                    out.push_str(");\n");
                }
                out.push_str(&defn);
                out.push_str(";\n");
            }
        }

        out.push_str("\n\n");
        out.push_str("//\n// Meta\n//\n");
        for &type_obj in &self.hoisted.types.clone() {
            if !self.hoisted.exports.contains(&type_obj) {
                continue;
            }
            if self.gen_type_decl(type_obj).is_empty() {
                continue;
            }
            let meta = self.gen_type_meta(type_obj);
            if !meta.is_empty() {
                out.push('\n');
                out.push_str(&meta);
                out.push('\n');
            }
        }

        out.push_str("\n\n");
        out.push_str("//\n// Function declarations\n//\n\n");
        for &func_obj in &self.hoisted.funcs.clone() {
            let loc = match self.program.info.func_decls.get(&func_obj) {
                Some(loc) => *loc,
                None => continue,
            };
            let decl = self.program.func_decl(loc);
            let recv = match &decl.recv {
                Some(recv) => recv,
                None => continue,
            };
            // A method is exported when its receiver type is.
            let mut exported = false;
            ast::walk_expr_idents(&recv.ty, &mut |ident| {
                if let Some(obj) = self.program.use_of(ident.id) {
                    if self.hoisted.exports.contains(&obj) {
                        exported = true;
                    }
                }
            });
            if exported {
                let sig = self.gen_func_sig(func_obj);
                out.push_str(&sig);
                out.push_str(";\n");
            }
        }

        out
    }

    fn emit_glsls(&mut self) -> Vec<(String, String)> {
        let mut outputs = Vec::new();
        self.target = Target::Glsl;
        for &entry in &self.hoisted.entries.clone() {
            self.output = String::new();
            self.indent = 0;
            self.emit_shader(entry);
            let name = self.program.obj(entry).name.clone();
            outputs.push((name, std::mem::take(&mut self.output)));
        }
        self.target = Target::Cpp;
        outputs
    }
}
