//! Expression writing.
//!
//! Streams target text for expression trees, handling the semantic
//! impedance mismatches at the boundaries: pointer/value coercion at
//! method call sites, `gx::deref` instead of `->` so operator-overloaded
//! pointer-likes keep working, struct-literal field ordering, and the
//! shader target's operator externs.

use super::{trim_final_space, Compiler};
use crate::ast::{self, Expr, ExprKind, LitKind, UnaryOp};
use crate::directives::{lower_first, Target, INVALID_EXTERN};
use crate::types::{ObjKind, Type};

impl Compiler<'_> {
    pub(crate) fn write_expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Name(ident) => self.write_ident(ident),
            ExprKind::BasicLit { kind, value } => self.write_basic_lit(*kind, value),
            ExprKind::FuncLit(lit) => self.write_func_lit(e, lit),
            ExprKind::CompositeLit { ty, elems } => {
                self.write_composite_lit(e, ty.as_deref(), elems)
            }
            ExprKind::KeyValue { key, value } => self.write_key_value(key, value),
            ExprKind::Paren(inner) => {
                self.write("(");
                self.write_expr(inner);
                self.write(")");
            }
            ExprKind::Selector { x, sel } => self.write_selector(x, sel),
            ExprKind::Index { x, index } => self.write_index_expr(x, index),
            ExprKind::Call { func, args } => self.write_call(func, args),
            ExprKind::Star(inner) => {
                self.write("gx::deref(");
                self.write_expr(inner);
                self.write(")");
            }
            ExprKind::Unary { op, x } => self.write_unary(e, *op, x),
            ExprKind::Binary { op, x, y } => self.write_binary(*op, x, y),
            _ => self.errorf(e.span, "unsupported expression type"),
        }
    }

    pub(crate) fn write_ident(&mut self, ident: &ast::Ident) {
        let obj = self.program.use_of(ident.id);
        if let Some(obj) = obj {
            match self.program.obj(obj).kind {
                ObjKind::Nil => {
                    self.write("nullptr");
                    return;
                }
                ObjKind::Builtin => {
                    self.write("gx::");
                }
                _ => {}
            }
            if let Some(ext) = self.directives.extern_for(self.target, obj) {
                let ext = ext.to_string();
                if ext == INVALID_EXTERN {
                    self.errorf(
                        ident.span,
                        format_args!("{} not usable from this target", ident.name),
                    );
                }
                self.write(&ext);
                return;
            }
        }
        self.write(&ident.name.clone());
    }

    fn write_basic_lit(&mut self, kind: LitKind, value: &str) {
        let value = value.to_string();
        match kind {
            LitKind::Int => {
                self.write(&value);
                if self.target == Target::Glsl {
                    self.write(".0");
                }
            }
            LitKind::Float => {
                self.write(&value);
                if self.target == Target::Cpp {
                    self.write("f");
                }
            }
            LitKind::Str | LitKind::Char => self.write(&value),
        }
    }

    fn write_func_lit(&mut self, e: &Expr, lit: &ast::FuncLit) {
        if self.indent == 0 {
            self.write("[](");
        } else {
            self.write("[&](");
        }
        let sig = match self.program.ty(self.program.expr_info(e.id).ty) {
            Type::Func(sig) => sig.clone(),
            _ => return,
        };
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if matches!(self.program.ty(param.ty), Type::Func(_)) {
                self.write("auto &&");
            } else {
                let expr = self.gen_type_expr(param.ty, e.span);
                self.write(&expr);
            }
            self.write(&param.name.clone());
        }
        self.write(") ");
        self.write_block(&lit.body);
        self.at_block_end = false;
    }

    fn write_composite_lit(&mut self, e: &Expr, _ty: Option<&Expr>, elems: &[Expr]) {
        let use_parens = self.target == Target::Glsl;
        let lit_ty = self.program.expr_info(e.id).ty;
        let type_expr = self.gen_type_expr(lit_ty, e.span);
        let type_expr = trim_final_space(&type_expr).to_string();
        self.write(&type_expr);
        self.write(if use_parens { "(" } else { "{" });

        if !elems.is_empty() {
            if matches!(elems[0].kind, ExprKind::KeyValue { .. }) {
                self.check_keyed_order(e, elems);
            }
            let single_line =
                self.program.line_of(e.span) == self.program.line_of(elems[0].span);
            if single_line {
                if !use_parens {
                    self.write(" ");
                }
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_expr(elem);
                }
                if !use_parens {
                    self.write(" ");
                }
            } else {
                self.write("\n");
                self.indent += 1;
                for elem in elems {
                    self.write_expr(elem);
                    self.write(",\n");
                }
                self.indent -= 1;
            }
        }

        if use_parens {
            self.write(")");
        } else {
            self.write("}");
        }
    }

    /// Keyed struct literals must list fields in definition order
    /// (monotonically non-decreasing ordinals).
    fn check_keyed_order(&mut self, e: &Expr, elems: &[Expr]) {
        if self.underlying_struct(self.program.expr_info(e.id).ty).is_none() {
            return;
        }
        let mut last_index = 0usize;
        for elem in elems {
            let key = match &elem.kind {
                ExprKind::KeyValue { key, .. } => key,
                _ => continue,
            };
            let field_obj = match &key.kind {
                ExprKind::Name(ident) => self.program.use_of(ident.id),
                _ => None,
            };
            let index = match field_obj.map(|o| &self.program.obj(o).kind) {
                Some(ObjKind::Field { index, .. }) => *index,
                _ => continue,
            };
            if index < last_index {
                self.errorf(e.span, "struct literal fields must appear in definition order");
                break;
            }
            last_index = index;
        }
    }

    fn write_key_value(&mut self, key: &Expr, value: &Expr) {
        match &key.kind {
            ExprKind::Name(ident) => {
                let ident = ident.clone();
                self.write(".");
                self.write_ident(&ident);
                self.write(" = ");
                self.write_expr(value);
            }
            _ => self.errorf(key.span, "unsupported literal key"),
        }
    }

    fn write_selector(&mut self, x: &Expr, sel: &ast::Ident) {
        if self.target == Target::Glsl {
            if let ExprKind::Name(base) = &x.kind {
                if super::glsl::storage_class(&base.name).is_some() {
                    self.write(&lower_first(&sel.name));
                    return;
                }
            }
        }
        let x_ty = self.program.expr_info(x.id).ty;
        if !matches!(self.program.ty(x_ty), Type::Invalid) {
            if self.is_pointer(x_ty) {
                self.write("gx::deref(");
                self.write_expr(x);
                self.write(")");
            } else {
                self.write_expr(x);
            }
            self.write(".");
        }
        self.write_ident(sel);
    }

    fn write_index_expr(&mut self, x: &Expr, index: &Expr) {
        let x_ty = self.program.expr_info(x.id).ty;
        if self.is_pointer(x_ty) {
            self.write("gx::deref(");
            self.write_expr(x);
            self.write(")");
        } else {
            self.write_expr(x);
        }
        self.write("[");
        self.write_expr(index);
        self.write("]");
    }

    fn write_call(&mut self, func: &Expr, args: &[Expr]) {
        let fn_info = self.program.expr_info(func.id);
        let fn_is_func = matches!(self.program.ty(fn_info.ty), Type::Func(_));

        if fn_is_func || fn_info.is_builtin {
            let mut method = false;
            if let ExprKind::Selector { x, sel } = &func.kind {
                if let Some(obj) = self.program.use_of(sel.id) {
                    let sig = self.program.signature_of(obj).cloned();
                    if let Some(sig) = sig.filter(|s| s.recv.is_some()) {
                        if self.target == Target::Glsl {
                            if let Some(ext) = self.directives.extern_for(Target::Glsl, obj) {
                                let ext = ext.to_string();
                                if ext
                                    .chars()
                                    .next()
                                    .map_or(false, |c| !c.is_alphabetic() && c != '_')
                                {
                                    self.write_shader_operator(&ext, func.span, x, args);
                                    return;
                                }
                            }
                        }
                        let recv = sig.recv.as_ref().unwrap();
                        if matches!(self.program.ty(recv.ty), Type::Invalid) {
                            // A constraint-interface method on a
                            // type-parameter receiver keeps the member
                            // form, receiver parenthesized; template
                            // dispatch resolves it at instantiation.
                            self.write("(");
                            self.write_expr(x);
                            self.write(").");
                            self.write_ident(sel);
                            self.write("(");
                            for (i, arg) in args.iter().enumerate() {
                                if i > 0 {
                                    self.write(", ");
                                }
                                self.write_expr(arg);
                            }
                            self.write(")");
                            return;
                        }
                        method = true;
                        match self.method_renames.get(&obj).cloned() {
                            Some(rename) => self.write(&rename),
                            None => self.write_ident(sel),
                        }
                        self.write("(");
                        if let Some(tag) = self.method_field_tags.get(&obj).cloned() {
                            self.write(&tag);
                            self.write("{}, ");
                        }
                        let recv_ptr = self.is_pointer(recv.ty);
                        let x_ptr = self.is_pointer(self.program.expr_info(x.id).ty);
                        if x_ptr == recv_ptr {
                            self.write_expr(x);
                        } else if x_ptr {
                            self.write("gx::deref(");
                            self.write_expr(x);
                            self.write(")");
                        } else {
                            self.write("&(");
                            self.write_expr(x);
                            self.write(")");
                        }
                    }
                }
            }
            if !method {
                let targs = match &func.kind {
                    ExprKind::Name(ident) => {
                        let ident = ident.clone();
                        self.write_ident(&ident);
                        self.program.info.instances.get(&ident.id).cloned()
                    }
                    ExprKind::Selector { sel, .. } => {
                        let sel = sel.clone();
                        self.write_ident(&sel);
                        self.program.info.instances.get(&sel.id).cloned()
                    }
                    ExprKind::Index { x, .. } | ExprKind::IndexList { x, .. } => {
                        match &x.kind {
                            ExprKind::Name(ident) => {
                                let ident = ident.clone();
                                self.write_ident(&ident);
                                self.program.info.instances.get(&ident.id).cloned()
                            }
                            ExprKind::Selector { sel, .. } => {
                                let sel = sel.clone();
                                self.write_ident(&sel);
                                self.program.info.instances.get(&sel.id).cloned()
                            }
                            _ => {
                                self.write_expr(x);
                                None
                            }
                        }
                    }
                    _ => {
                        self.write_expr(func);
                        None
                    }
                };
                if let Some(targs) = targs {
                    self.write("<");
                    for (i, targ) in targs.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        let expr = self.gen_type_expr(*targ, func.span);
                        self.write(trim_final_space(&expr).to_string().as_str());
                    }
                    self.write(">");
                }
                self.write("(");
            }
            for (i, arg) in args.iter().enumerate() {
                if i > 0 || method {
                    self.write(", ");
                }
                self.write_expr(arg);
            }
            self.write(")");
            return;
        }

        // Conversion: the callee denotes a type.
        if fn_info.is_type && !matches!(self.program.ty(fn_info.ty), Type::Invalid) {
            let type_expr = self.gen_type_expr(fn_info.ty, func.span);
            let type_expr = trim_final_space(&type_expr).to_string();
            if matches!(func.kind, ExprKind::Paren(_)) {
                self.write("(");
                self.write(&type_expr);
                self.write(")");
            } else {
                self.write(&type_expr);
            }
        } else {
            // Recovery path: an earlier error already covers this node.
            self.write_expr(func);
        }
        self.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write_expr(arg);
        }
        self.write(")");
    }

    /// Shader operator externs inline as unary or binary applications.
    fn write_shader_operator(
        &mut self,
        op: &str,
        span: crate::ast::Span,
        recv: &Expr,
        args: &[Expr],
    ) {
        match args.len() {
            0 => {
                self.write(op);
                self.write("(");
                self.write_expr(recv);
                self.write(")");
            }
            1 => {
                self.write("(");
                self.write_expr(recv);
                self.write(") ");
                self.write(op);
                self.write(" (");
                self.write_expr(&args[0]);
                self.write(")");
            }
            _ => self.errorf(span, "shader operators must be unary or binary"),
        }
    }

    fn write_unary(&mut self, e: &Expr, op: UnaryOp, x: &Expr) {
        if op == UnaryOp::Addr && !Self::addressable(x) {
            self.errorf(e.span, "cannot take address of a temporary object");
        }
        self.write(op.symbol());
        self.write_expr(x);
    }

    /// Syntactic addressability: names, fields, elements and targets of
    /// a dereference.
    fn addressable(e: &Expr) -> bool {
        match &e.kind {
            ExprKind::Name(_)
            | ExprKind::Selector { .. }
            | ExprKind::Index { .. }
            | ExprKind::Star(_) => true,
            ExprKind::Paren(inner) => Self::addressable(inner),
            _ => false,
        }
    }

    fn write_binary(&mut self, op: ast::BinaryOp, x: &Expr, y: &Expr) {
        let need_parens = matches!(
            op,
            ast::BinaryOp::BitAnd | ast::BinaryOp::BitOr | ast::BinaryOp::BitXor
        );
        if need_parens {
            self.write("(");
        }
        self.write_expr(x);
        self.write(" ");
        self.write(op.symbol());
        self.write(" ");
        self.write_expr(y);
        if need_parens {
            self.write(")");
        }
    }
}
