//! Function signature generation.
//!
//! A signature is `[template<…>\n][return-type ]Name(params)`. Methods
//! take their receiver as the first parameter. Methods whose source name
//! matches `Base_FieldName`, where `FieldName` is an exported field of
//! the receiver struct, are rewritten: the suffix is stripped and a
//! `gx::FieldTag<Recv, ordinal>` dispatch parameter is spliced in front
//! of the receiver. Call sites add the matching `gx::FieldTag<…>{}`
//! argument.

use super::{trim_final_space, Compiler};
use crate::ast::Span;
use crate::types::{ObjId, ParamInfo, Type};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FIELD_TAG_METHOD_RE: Regex = Regex::new(r"^(.+)_([^_]+)$").unwrap();
}

impl Compiler<'_> {
    pub fn gen_func_sig(&mut self, func_obj: ObjId) -> String {
        if let Some(cached) = self.func_sigs.get(&(self.target, func_obj)) {
            return cached.clone();
        }

        let loc = match self.program.info.func_decls.get(&func_obj) {
            Some(loc) => *loc,
            None => return String::new(),
        };
        let decl = self.program.func_decl(loc).clone();
        let sig = match self.program.signature_of(func_obj) {
            Some(sig) => sig.clone(),
            None => return String::new(),
        };

        let mut out = String::new();

        // Template clause: the receiver's type parameters first, then
        // the function's own.
        if let Some(recv) = &sig.recv {
            let names = self.named_type_param_names(recv.ty);
            Self::push_template_clause(&mut out, &names);
        }
        let own: Vec<String> = sig
            .type_params
            .iter()
            .map(|p| self.program.obj(*p).name.clone())
            .collect();
        Self::push_template_clause(&mut out, &own);

        // Return type.
        match sig.result {
            Some(result) => {
                let expr = self.gen_type_expr(result, decl.span);
                out.push_str(&expr);
            }
            None => {
                let pkg_is_main = self
                    .program
                    .obj(func_obj)
                    .pkg
                    .map_or(false, |p| self.program.package(p).name == "main");
                if pkg_is_main && decl.name.name == "main" && sig.recv.is_none() {
                    out.push_str("int ");
                } else {
                    out.push_str("void ");
                }
            }
        }

        // Field-tag method rewrite.
        let mut name = decl.name.name.clone();
        let mut field_tag = String::new();
        if let Some(recv) = &sig.recv {
            if let Some(recv_obj) = self.receiver_named_obj(recv.ty) {
                if self.program.info.struct_fields.contains_key(&recv_obj) {
                    let source_name = name.clone();
                    if let Some(captures) = FIELD_TAG_METHOD_RE.captures(&source_name) {
                        let base = captures[1].to_string();
                        let field_name = captures[2].to_string();
                        let recv_named = match self.program.ty(recv.ty) {
                            Type::Pointer(elem) => *elem,
                            _ => recv.ty,
                        };
                        let type_expr = {
                            let expr = self.gen_type_expr(recv_named, decl.span);
                            trim_final_space(&expr).to_string()
                        };
                        match self.exported_field_ordinal(recv_obj, &field_name) {
                            Some(ordinal) => {
                                field_tag =
                                    format!("gx::FieldTag<{}, {}>", type_expr, ordinal);
                                name = base;
                                self.method_renames.insert(func_obj, name.clone());
                                self.method_field_tags
                                    .insert(func_obj, field_tag.clone());
                            }
                            None => {
                                self.errorf(
                                    decl.name.span,
                                    format_args!(
                                        "struct {} has no field named {}",
                                        type_expr, field_name
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }

        out.push_str(&name);

        // Parameters: field tag, receiver, then declared parameters.
        out.push('(');
        let mut first = true;
        if let Some(recv) = &sig.recv {
            if !field_tag.is_empty() {
                out.push_str(&field_tag);
                out.push_str(", ");
            }
            let rendered = self.render_param(recv, decl.span, false);
            out.push_str(&rendered);
            first = false;
        }
        for param in &sig.params {
            if !first {
                out.push_str(", ");
            }
            first = false;
            let rendered = self.render_param(param, decl.span, true);
            out.push_str(&rendered);
        }
        out.push(')');

        self.func_sigs.insert((self.target, func_obj), out.clone());
        out
    }

    fn push_template_clause(out: &mut String, names: &[String]) {
        if names.is_empty() {
            return;
        }
        out.push_str("template<");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str("typename ");
            out.push_str(name);
        }
        out.push_str(">\n");
    }

    fn render_param(&mut self, param: &ParamInfo, span: Span, reject_by_value: bool) -> String {
        let mut out = String::new();
        match self.program.ty(param.ty) {
            Type::Func(_) => out.push_str("auto &&"),
            Type::Array { .. } | Type::Slice { .. } if reject_by_value => {
                let shown = self.program.type_string(param.ty);
                self.errorf(
                    span,
                    format_args!(
                        "cannot pass {} by value, use pointer to {} instead",
                        shown, shown
                    ),
                );
                out.push_str(&self.gen_type_expr(param.ty, span));
            }
            _ => out.push_str(&self.gen_type_expr(param.ty, span)),
        }
        out.push_str(&param.name);
        out
    }
}
