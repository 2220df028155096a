//! GLSL sub-emitter.
//!
//! Each entry function becomes one fragment shader: a version pragma
//! and precision declaration, one global per field of the entry's
//! storage-class parameters, every transitively-used function in
//! reverse-dependency order, then the entry body as `void main()`.

use super::Compiler;
use crate::ast;
use crate::directives::{lower_first, Target};
use crate::types::ObjId;
use std::collections::HashSet;

/// Storage-class parameters are recognized by name and lose their
/// trailing `s`: `attributes`, `uniforms`, `varyings`.
pub(crate) fn storage_class(name: &str) -> Option<&str> {
    match name {
        "attributes" | "uniforms" | "varyings" => Some(&name[..name.len() - 1]),
        _ => None,
    }
}

impl Compiler<'_> {
    /// Emit one shader; the caller has already switched the target to
    /// GLSL and cleared the output buffer.
    pub(crate) fn emit_shader(&mut self, entry: ObjId) {
        self.write("#version 100\nprecision mediump float;\n\n");

        let loc = match self.program.info.func_decls.get(&entry) {
            Some(loc) => *loc,
            None => return,
        };
        let decl = self.program.func_decl(loc).clone();
        let sig = match self.program.signature_of(entry) {
            Some(sig) => sig.clone(),
            None => return,
        };

        // Storage-class globals.
        for param in &sig.params {
            let class = match storage_class(&param.name) {
                Some(class) => class.to_string(),
                None => continue,
            };
            let fields = match self.underlying_struct(param.ty) {
                Some(fields) => fields,
                None => continue,
            };
            for field in &fields {
                let field_name = self.program.obj(*field).name.clone();
                let field_ty = self.program.obj(*field).ty;
                let type_expr = self.gen_type_expr(field_ty, decl.span);
                self.write(&class);
                self.write(" ");
                self.write(&type_expr);
                self.write(&lower_first(&field_name));
                self.write(";\n");
            }
            if !fields.is_empty() {
                self.write("\n");
            }
        }

        // Transitive function dependencies, dependencies first.
        let mut visited = HashSet::new();
        let mut deps = Vec::new();
        self.collect_shader_deps(entry, entry, &mut visited, &mut deps);
        for dep in deps {
            let dep_loc = match self.program.info.func_decls.get(&dep) {
                Some(loc) => *loc,
                None => continue,
            };
            let dep_decl = self.program.func_decl(dep_loc).clone();
            let body = match &dep_decl.body {
                Some(body) => body.clone(),
                None => continue,
            };
            let sig_text = self.gen_func_sig(dep);
            self.write(&sig_text);
            self.write(" ");
            self.write_block(&body);
            self.write("\n\n");
        }

        // The entry itself.
        if let Some(body) = decl.body.clone() {
            self.write("void main() ");
            self.write_block(&body);
            self.write("\n");
        }
    }

    /// Post-order walk over the functions an entry reaches. Functions
    /// with a shader extern mapping and body-less declarations are not
    /// part of the module.
    fn collect_shader_deps(
        &self,
        func: ObjId,
        entry: ObjId,
        visited: &mut HashSet<ObjId>,
        deps: &mut Vec<ObjId>,
    ) {
        if visited.contains(&func) {
            return;
        }
        if self.directives.is_extern(Target::Glsl, func) {
            return;
        }
        let loc = match self.program.info.func_decls.get(&func) {
            Some(loc) => *loc,
            None => return,
        };
        let decl = self.program.func_decl(loc);
        if decl.body.is_none() {
            return;
        }
        visited.insert(func);

        let mut referenced = Vec::new();
        ast::walk_func_decl_idents(decl, &mut |ident| {
            if let Some(target) = self.program.use_of(ident.id) {
                if self.program.info.func_decls.contains_key(&target) {
                    referenced.push(target);
                }
            }
        });
        for target in referenced {
            self.collect_shader_deps(target, entry, visited, deps);
        }

        if func != entry {
            deps.push(func);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_classes_lose_trailing_s() {
        assert_eq!(storage_class("uniforms"), Some("uniform"));
        assert_eq!(storage_class("varyings"), Some("varying"));
        assert_eq!(storage_class("attributes"), Some("attribute"));
        assert_eq!(storage_class("params"), None);
    }
}
