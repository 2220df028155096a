//! Type generators: expression, declaration, definition, metadata.
//!
//! All four memoize and never write to the output buffer; the emitter
//! decides where their strings land.

use super::{trim_final_space, Compiler};
use crate::ast::{self, ExprKind, Span};
use crate::directives::{lower_first, Target, INVALID_EXTERN};
use crate::types::{ObjId, ObjKind, Type, TypeId};

impl Compiler<'_> {
    /// Render a type as a target-language expression. The string ends
    /// with a trailing space whenever the next token may be an
    /// identifier; callers inside template argument lists trim it.
    pub fn gen_type_expr(&mut self, ty: TypeId, span: Span) -> String {
        if let Some(cached) = self.type_exprs.get(&(self.target, ty)) {
            return cached.clone();
        }

        let mut out = String::new();
        match self.program.ty(ty).clone() {
            Type::Bool => out.push_str("bool "),
            Type::Int => match self.target {
                Target::Cpp => out.push_str("int "),
                Target::Glsl => out.push_str("float "),
            },
            Type::Float => out.push_str("float "),
            Type::Byte => out.push_str("std::uint8_t "),
            Type::String => out.push_str("gx::String "),
            Type::Pointer(elem) => {
                out.push_str(&self.gen_type_expr(elem, span));
                out.push('*');
            }
            Type::Named { obj, args } => {
                out.push_str(&self.named_type_name(obj, span));
                if !args.is_empty() {
                    out.push('<');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        let arg_expr = self.gen_type_expr(*arg, span);
                        out.push_str(trim_final_space(&arg_expr));
                    }
                    out.push('>');
                }
                out.push(' ');
            }
            Type::TypeParam(obj) => {
                out.push_str(&self.program.obj(obj).name);
                out.push(' ');
            }
            Type::Array { elem, len } => {
                out.push_str("gx::Array<");
                let elem_expr = self.gen_type_expr(elem, span);
                out.push_str(trim_final_space(&elem_expr));
                out.push_str(", ");
                out.push_str(&len.to_string());
                out.push_str("> ");
            }
            Type::Slice { elem } => {
                out.push_str("gx::Slice<");
                let elem_expr = self.gen_type_expr(elem, span);
                out.push_str(trim_final_space(&elem_expr));
                out.push_str("> ");
            }
            _ => {
                let shown = self.program.type_string(ty);
                self.errorf(span, format_args!("{} not supported", shown));
            }
        }

        self.type_exprs.insert((self.target, ty), out.clone());
        out
    }

    /// The emitted name of a named type: its extern mapping when one
    /// exists, otherwise the source name.
    fn named_type_name(&mut self, obj: ObjId, span: Span) -> String {
        match self.directives.extern_for(self.target, obj) {
            Some(ext) if ext == INVALID_EXTERN => {
                let name = self.program.obj(obj).name.clone();
                self.errorf(
                    span,
                    format_args!("{} not usable from this target", name),
                );
                name
            }
            Some(ext) => ext.to_string(),
            None => self.program.obj(obj).name.clone(),
        }
    }

    /// The opening clause of a type's emission: a possibly templated
    /// `struct Name`, a `using` alias, or nothing for interface
    /// constraints.
    pub fn gen_type_decl(&mut self, type_obj: ObjId) -> String {
        if let Some(cached) = self.type_decls.get(&type_obj) {
            return cached.clone();
        }

        let loc = match self.program.info.type_specs.get(&type_obj) {
            Some(loc) => *loc,
            None => return String::new(),
        };
        let spec = self.program.type_spec(loc).clone();

        let mut out = String::new();
        if !spec.type_params.is_empty() {
            out.push_str("template<");
            for (i, param) in spec.type_params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str("typename ");
                out.push_str(&param.name.name);
            }
            out.push_str(">\n");
        }
        match &spec.ty.kind {
            ExprKind::StructType { .. } => {
                out.push_str("struct ");
                out.push_str(&spec.name.name);
            }
            ExprKind::InterfaceType { .. } => {
                // Consumed as a generic constraint during checking.
                out.clear();
            }
            _ => {
                out.push_str("using ");
                out.push_str(&spec.name.name);
                out.push_str(" = ");
                let under = self
                    .program
                    .info
                    .underlying
                    .get(&type_obj)
                    .copied()
                    .unwrap_or_else(|| self.program.arena.invalid());
                let expr = self.gen_type_expr(under, spec.ty.span);
                out.push_str(trim_final_space(&expr));
            }
        }

        self.type_decls.insert(type_obj, out.clone());
        out
    }

    /// The full definition: declaration plus field list for structs,
    /// empty for interfaces and aliases (the declaration is the
    /// definition).
    pub fn gen_type_defn(&mut self, type_obj: ObjId) -> String {
        if let Some(cached) = self.type_defns.get(&type_obj) {
            return cached.clone();
        }

        let loc = match self.program.info.type_specs.get(&type_obj) {
            Some(loc) => *loc,
            None => return String::new(),
        };
        let spec = self.program.type_spec(loc).clone();

        let mut out = String::new();
        if let ExprKind::StructType { fields } = &spec.ty.kind {
            out.push_str(&self.gen_type_decl(type_obj));
            out.push_str(" {\n");
            for field in fields {
                if field.names.is_empty() {
                    // Embedded marker fields carry no storage.
                    continue;
                }
                let default_val = field.tag_value("default");
                for name in &field.names {
                    let field_obj = match self.program.def_of(name.id) {
                        Some(obj) => obj,
                        None => continue,
                    };
                    let field_ty = self.program.obj(field_obj).ty;
                    let type_expr = self.gen_type_expr(field_ty, field.ty.span);
                    out.push_str("  ");
                    out.push_str(&type_expr);
                    out.push_str(&name.name);
                    if let Some(default_val) = &default_val {
                        out.push_str(" = ");
                        out.push_str(default_val);
                    }
                    out.push_str(";\n");
                }
            }
            out.push('}');
        }

        self.type_defns.insert(type_obj, out.clone());
        out
    }

    /// Compile-time field metadata for structs: one `gx::FieldTag`
    /// specialization per exported field, and a `forEachField` visitor.
    pub fn gen_type_meta(&mut self, type_obj: ObjId) -> String {
        if let Some(cached) = self.type_metas.get(&type_obj) {
            return cached.clone();
        }

        let loc = match self.program.info.type_specs.get(&type_obj) {
            Some(loc) => *loc,
            None => return String::new(),
        };
        let spec = self.program.type_spec(loc).clone();

        let mut out = String::new();
        if let ExprKind::StructType { fields } = &spec.ty.kind {
            let type_params = Self::meta_type_params(&spec);
            let type_expr = Self::meta_type_expr(&spec);

            let mut tag_index = 0usize;
            for field in fields {
                for name in &field.names {
                    if !name.is_exported() {
                        continue;
                    }
                    out.push_str("template<");
                    out.push_str(&type_params);
                    out.push_str(">\nstruct gx::FieldTag<");
                    out.push_str(&type_expr);
                    out.push_str(", ");
                    out.push_str(&tag_index.to_string());
                    out.push_str("> {\n");
                    out.push_str("  inline static constexpr gx::FieldAttribs attribs { .name = \"");
                    out.push_str(&lower_first(&name.name));
                    out.push('"');
                    if let Some(attribs) = field.tag_value("attribs") {
                        for key in attribs.split(',') {
                            out.push_str(", .");
                            out.push_str(key.trim());
                            out.push_str(" = true");
                        }
                    }
                    out.push_str(" };\n};\n");
                    tag_index += 1;
                }
            }

            if !type_params.is_empty() {
                out.push_str("template<");
                out.push_str(&type_params);
                out.push_str(">\n");
            }
            out.push_str("inline void forEachField(");
            out.push_str(&type_expr);
            out.push_str(" &val, auto &&func) {\n");
            let mut tag_index = 0usize;
            for field in fields {
                for name in &field.names {
                    if !name.is_exported() {
                        continue;
                    }
                    out.push_str("  func(gx::FieldTag<");
                    out.push_str(&type_expr);
                    out.push_str(", ");
                    out.push_str(&tag_index.to_string());
                    out.push_str(">(), val.");
                    out.push_str(&name.name);
                    out.push_str(");\n");
                    tag_index += 1;
                }
            }
            out.push('}');
        }

        self.type_metas.insert(type_obj, out.clone());
        out
    }

    fn meta_type_params(spec: &ast::TypeSpec) -> String {
        let mut out = String::new();
        for (i, param) in spec.type_params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str("typename ");
            out.push_str(&param.name.name);
        }
        out
    }

    fn meta_type_expr(spec: &ast::TypeSpec) -> String {
        let mut out = spec.name.name.clone();
        if !spec.type_params.is_empty() {
            out.push('<');
            for (i, param) in spec.type_params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&param.name.name);
            }
            out.push('>');
        }
        out
    }

    /// Names of a receiver's type parameters, for template clauses.
    pub(crate) fn named_type_param_names(&self, ty: TypeId) -> Vec<String> {
        let named = match self.program.ty(ty) {
            Type::Pointer(elem) => *elem,
            _ => ty,
        };
        match self.program.ty(named) {
            Type::Named { args, .. } => args
                .iter()
                .filter_map(|arg| match self.program.ty(*arg) {
                    Type::TypeParam(obj) => Some(self.program.obj(*obj).name.clone()),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// The named-type object behind a receiver, through a pointer.
    pub(crate) fn receiver_named_obj(&self, ty: TypeId) -> Option<ObjId> {
        let named = match self.program.ty(ty) {
            Type::Pointer(elem) => *elem,
            _ => ty,
        };
        match self.program.ty(named) {
            Type::Named { obj, .. } => Some(*obj),
            _ => None,
        }
    }

    /// Exported-field ordinal used by field tags: the position among
    /// exported, non-embedded fields.
    pub(crate) fn exported_field_ordinal(&self, type_obj: ObjId, field_name: &str) -> Option<usize> {
        let fields = self.program.info.struct_fields.get(&type_obj)?;
        let mut tag_index = 0usize;
        for field in fields {
            match &self.program.obj(*field).kind {
                ObjKind::Field {
                    exported, embedded, ..
                } if *exported && !*embedded => {
                    if self.program.obj(*field).name == field_name {
                        return Some(tag_index);
                    }
                    tag_index += 1;
                }
                _ => {}
            }
        }
        None
    }
}
