//! Declaration hoisting: linearize top-level specs so every semantic
//! dependency of an emitted declaration appears earlier in the output,
//! compute the export closure seeded by behavior-marked structs, and
//! split functions from shader entry points.
//!
//! The walk is depth-first post-order over identifier references.
//! Extern-tagged specs are pruned (they never appear in outputs). A spec
//! already on the list may be revisited with the export flag raised; the
//! revisit promotes it and its dependencies without duplicating them.

use crate::ast;
use crate::directives::{Directives, Target};
use crate::program::Program;
use crate::types::{DeclLoc, ObjId};
use std::collections::HashSet;

/// The marker type name that opts a struct into export and component
/// registration.
pub const BEHAVIOR_MARKER: &str = "Behavior";

#[derive(Debug, Default)]
pub struct Hoisted {
    /// Named types in emission order.
    pub types: Vec<ObjId>,
    /// Value specs in emission order.
    pub values: Vec<DeclLoc>,
    /// Functions (and methods) in source order, shader entries excluded.
    pub funcs: Vec<ObjId>,
    /// Shader entry functions in source order.
    pub entries: Vec<ObjId>,
    pub exports: HashSet<ObjId>,
    pub behaviors: HashSet<ObjId>,
}

struct Hoister<'a> {
    program: &'a Program,
    directives: &'a Directives,
    out: Hoisted,
    type_visited: HashSet<ObjId>,
    value_visited: HashSet<DeclLoc>,
}

pub fn hoist(program: &Program, directives: &Directives) -> Hoisted {
    let mut hoister = Hoister {
        program,
        directives,
        out: Hoisted::default(),
        type_visited: HashSet::new(),
        value_visited: HashSet::new(),
    };
    hoister.run();
    hoister.out
}

impl<'a> Hoister<'a> {
    fn run(&mut self) {
        for pkg in &self.program.packages {
            for &file_idx in &pkg.files {
                let file = &self.program.files[file_idx].ast;
                for decl in &file.decls {
                    match decl {
                        ast::Decl::Gen { specs, .. } => {
                            for spec in specs {
                                match spec {
                                    ast::Spec::Type(spec) => {
                                        if let Some(obj) = self.program.def_of(spec.name.id) {
                                            self.visit_type(obj, false);
                                        }
                                    }
                                    ast::Spec::Value(spec) => {
                                        if let Some(obj) = spec
                                            .names
                                            .first()
                                            .and_then(|n| self.program.def_of(n.id))
                                        {
                                            if let Some(loc) =
                                                self.program.info.value_specs.get(&obj)
                                            {
                                                self.visit_value(*loc);
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        ast::Decl::Func(func) => {
                            let obj = match self.program.def_of(func.name.id) {
                                Some(obj) => obj,
                                None => continue,
                            };
                            if self.directives.is_extern(Target::Cpp, obj) {
                                continue;
                            }
                            if self.directives.glsl_entries.contains(&obj) {
                                self.out.entries.push(obj);
                            } else {
                                self.out.funcs.push(obj);
                            }
                        }
                    }
                }
            }
        }
    }

    fn visit_type(&mut self, obj: ObjId, export: bool) {
        if self.directives.is_extern(Target::Cpp, obj) {
            return;
        }
        let loc = match self.program.info.type_specs.get(&obj) {
            Some(loc) => *loc,
            None => return,
        };

        let visited = self.type_visited.contains(&obj);
        if visited && !(export && !self.out.exports.contains(&obj)) {
            return;
        }

        let mut export = export;
        if !visited {
            self.type_visited.insert(obj);
            let spec = self.program.type_spec(loc);
            if let ast::ExprKind::StructType { fields } = &spec.ty.kind {
                for field in fields {
                    if field.names.is_empty() {
                        if let ast::ExprKind::Name(ident) = &field.ty.kind {
                            if ident.name == BEHAVIOR_MARKER {
                                self.out.behaviors.insert(obj);
                                export = true;
                            }
                        }
                    }
                }
            }
        }
        if export {
            self.out.exports.insert(obj);
        }

        // Follow every identifier in the spec's type that resolves to
        // another hoistable type.
        let mut referenced: Vec<ObjId> = Vec::new();
        {
            let spec = self.program.type_spec(loc);
            ast::walk_expr_idents(&spec.ty, &mut |ident| {
                if let Some(target) = self.program.use_of(ident.id) {
                    if self.program.info.type_specs.contains_key(&target) {
                        referenced.push(target);
                    }
                }
            });
        }
        for target in referenced {
            self.visit_type(target, export);
        }

        if !visited {
            self.out.types.push(obj);
        }
    }

    fn visit_value(&mut self, loc: DeclLoc) {
        if self.value_visited.contains(&loc) {
            return;
        }
        self.value_visited.insert(loc);

        let mut referenced: Vec<DeclLoc> = Vec::new();
        {
            let spec = self.program.value_spec(loc);
            ast::walk_value_spec_idents(spec, &mut |ident| {
                if let Some(target) = self.program.use_of(ident.id) {
                    if let Some(dep) = self.program.info.value_specs.get(&target) {
                        referenced.push(*dep);
                    }
                }
            });
        }
        for dep in referenced {
            self.visit_value(dep);
        }

        let spec = self.program.value_spec(loc);
        let any_extern = spec.names.iter().any(|name| {
            self.program
                .def_of(name.id)
                .map_or(false, |obj| self.directives.is_extern(Target::Cpp, obj))
        });
        if !any_extern {
            self.out.values.push(loc);
        }
    }
}
