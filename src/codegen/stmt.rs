//! Statement writing.
//!
//! Indentation is automatic: each emitted `{` raises the level, each
//! `}` lowers it. A statement is terminated with `;` unless the writer
//! just closed a brace.

use super::Compiler;
use crate::ast::{self, AssignOp, Block, Expr, ExprKind, Stmt, StmtKind};
use crate::directives::Target;
use crate::types::Type;

impl Compiler<'_> {
    pub(crate) fn write_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.write_expr(e),
            StmtKind::IncDec { x, inc } => {
                self.write("(");
                self.write_expr(x);
                self.write(")");
                self.write(if *inc { "++" } else { "--" });
            }
            StmtKind::Assign { op, lhs, rhs } => self.write_assign(stmt, *op, lhs, rhs),
            StmtKind::Return(results) => match results.len() {
                0 => self.write("return"),
                1 => {
                    self.write("return ");
                    self.write_expr(&results[0]);
                }
                _ => self.errorf(results[0].span, "multiple return values not supported"),
            },
            StmtKind::Break => self.write("break"),
            StmtKind::Continue => self.write("continue"),
            StmtKind::Block(block) => self.write_block(block),
            StmtKind::If {
                init,
                cond,
                body,
                els,
            } => {
                self.write("if (");
                if let Some(init) = init {
                    self.write_stmt(init);
                    self.write("; ");
                }
                self.write_expr(cond);
                self.write(") ");
                self.write_block(body);
                if let Some(els) = els {
                    self.write(" else ");
                    self.write_stmt(els);
                }
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.write("for (");
                if let Some(init) = init {
                    self.write_stmt(init);
                }
                self.write("; ");
                if let Some(cond) = cond {
                    self.write_expr(cond);
                }
                self.write("; ");
                if let Some(post) = post {
                    self.write_stmt(post);
                }
                self.write(") ");
                self.write_block(body);
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => self.write_range(stmt, key.as_ref(), value.as_ref(), *define, x, body),
        }
    }

    fn write_assign(&mut self, stmt: &Stmt, op: AssignOp, lhs: &[Expr], rhs: &[Expr]) {
        if lhs.len() != 1 || rhs.len() != 1 {
            self.errorf(stmt.span, "multi-value assignment unsupported");
            return;
        }
        if op == AssignOp::Define {
            let rhs_ty = self.program.expr_info(rhs[0].id).ty;
            match self.target {
                Target::Cpp => {
                    if matches!(self.program.ty(rhs_ty), Type::String) {
                        self.write("gx::String ");
                    } else {
                        self.write("auto ");
                    }
                }
                Target::Glsl => {
                    let expr = self.gen_type_expr(rhs_ty, stmt.span);
                    self.write(&expr);
                }
            }
        }
        self.write_expr(&lhs[0]);
        self.write(" ");
        self.write(op.symbol());
        self.write(" ");
        self.write_expr(&rhs[0]);
    }

    fn write_range(
        &mut self,
        stmt: &Stmt,
        key: Option<&Expr>,
        value: Option<&Expr>,
        define: bool,
        x: &Expr,
        body: &Block,
    ) {
        if !define {
            self.errorf(stmt.span, "must use := in range statement");
        }
        let key_ident = key.and_then(|k| match &k.kind {
            ExprKind::Name(ident) if ident.name != "_" => Some(ident.clone()),
            _ => None,
        });

        self.write("for (");
        if let Some(key_ident) = &key_ident {
            self.write("auto ");
            self.write_ident(key_ident);
            self.write(" = -1; ");
        }
        self.write("auto &");
        match value.map(|v| &v.kind) {
            Some(ExprKind::Name(ident)) if ident.name != "_" => {
                let ident = ident.clone();
                self.write_ident(&ident);
            }
            _ => self.write("_ [[maybe_unused]]"),
        }
        self.write(" : ");
        self.write_expr(x);
        self.write(") {\n");
        self.indent += 1;
        if let Some(key_ident) = &key_ident {
            self.write("++");
            self.write_ident(key_ident);
            self.write(";\n");
        }
        self.write_stmt_list(&body.stmts);
        self.indent -= 1;
        self.write("}");
        self.at_block_end = true;
    }

    pub(crate) fn write_block(&mut self, block: &Block) {
        self.write("{\n");
        self.indent += 1;
        self.write_stmt_list(&block.stmts);
        self.indent -= 1;
        self.write("}");
        self.at_block_end = true;
    }

    pub(crate) fn write_stmt_list(&mut self, stmts: &[ast::Stmt]) {
        for stmt in stmts {
            self.write_stmt(stmt);
            if !self.at_block_end {
                self.write(";");
            }
            self.write("\n");
        }
    }
}
