//! Recursive descent parser for gx source files.
//!
//! Comments are tokens here: the parser groups consecutive comment lines
//! and attaches them as doc comments to the declaration, spec or field
//! that follows on the next line, because directives ride on doc
//! comments. Trailing comments on a field's own line attach to that
//! field.

use crate::ast::*;
use crate::lexer::{SpannedToken, Token};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: String,
        found: Token,
        span: Span,
    },
    #[error("{what} not supported")]
    Unsupported { what: String, span: Span },
    #[error("unexpected end of file")]
    UnexpectedEof { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => *span,
            ParseError::Unsupported { span, .. } => *span,
            ParseError::UnexpectedEof { span } => *span,
        }
    }
}

/// Allocates `NodeId`s; shared across all files of a program.
#[derive(Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        NodeIds { next: 0 }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

pub struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    ids: &'a mut NodeIds,
    /// Comment group on the lines immediately above the current token.
    pending: Vec<Comment>,
    pending_last_line: u32,
    /// Comment(s) on the same line as already-consumed code.
    trailing: Vec<Comment>,
    /// Line of the last consumed non-comment token.
    prev_line: u32,
    /// First comment group of the file (file-scope directives).
    file_doc: Option<CommentGroup>,
    /// Set once the package clause is parsed; later floating groups are
    /// ordinary comments, not file directives.
    file_doc_closed: bool,
    /// Composite literals are suspended inside if/for headers so that the
    /// opening `{` of the body is not swallowed as a literal.
    allow_composite: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<SpannedToken>, ids: &'a mut NodeIds) -> Self {
        Self {
            tokens,
            pos: 0,
            ids,
            pending: Vec::new(),
            pending_last_line: 0,
            trailing: Vec::new(),
            prev_line: 0,
            file_doc: None,
            file_doc_closed: false,
            allow_composite: true,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    /// Consume comment tokens at the cursor, sorting them into the
    /// pending doc group or the trailing set.
    fn sync(&mut self) {
        while let Token::Comment(text) = &self.tokens[self.pos].token {
            let tok = &self.tokens[self.pos];
            let comment = Comment {
                text: text.clone(),
                span: tok.span,
                line: tok.line,
            };
            if comment.line == self.prev_line && self.prev_line != 0 {
                self.trailing.push(comment);
            } else if !self.pending.is_empty() && comment.line == self.pending_last_line + 1 {
                self.pending_last_line = comment.line;
                self.pending.push(comment);
            } else {
                // A gap starts a new group; the old one was floating.
                self.finish_floating_group();
                self.pending_last_line = comment.line;
                self.pending = vec![comment];
            }
            self.pos += 1;
        }
    }

    /// The first comment group of the file carries file-scope directives
    /// even when a blank line separates it from the package clause.
    fn finish_floating_group(&mut self) {
        if !self.file_doc_closed && self.file_doc.is_none() && !self.pending.is_empty() {
            self.file_doc = Some(CommentGroup {
                comments: std::mem::take(&mut self.pending),
            });
        } else {
            self.pending.clear();
        }
    }

    fn peek(&mut self) -> &Token {
        self.sync();
        &self.tokens[self.pos].token
    }

    fn peek_span(&mut self) -> Span {
        self.sync();
        self.tokens[self.pos].span
    }

    fn peek_line(&mut self) -> u32 {
        self.sync();
        self.tokens[self.pos].line
    }

    /// Look ahead `n` non-comment tokens past the cursor (0 = current).
    fn peek_ahead(&self, n: usize) -> &Token {
        let mut seen = 0;
        let mut i = self.pos;
        while i + 1 < self.tokens.len() {
            match &self.tokens[i].token {
                Token::Comment(_) => i += 1,
                tok => {
                    if seen == n {
                        return tok;
                    }
                    seen += 1;
                    i += 1;
                }
            }
        }
        &self.tokens[self.tokens.len() - 1].token
    }

    fn advance(&mut self) -> SpannedToken {
        self.sync();
        let tok = self.tokens[self.pos].clone();
        if tok.token != Token::Eof {
            self.pos += 1;
        }
        self.prev_line = tok.line;
        self.trailing.clear();
        tok
    }

    fn check(&mut self, token: &Token) -> bool {
        self.peek() == token
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, expected: Token, what: &str) -> Result<SpannedToken, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&mut self, expected: &str) -> ParseError {
        let span = self.peek_span();
        let found = self.peek().clone();
        if found == Token::Eof {
            ParseError::UnexpectedEof { span }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found,
                span,
            }
        }
    }

    /// Take the pending comment group if it sits directly above the
    /// current token.
    fn take_doc(&mut self) -> Option<CommentGroup> {
        self.sync();
        let line = self.tokens[self.pos].line;
        if !self.pending.is_empty() && self.pending_last_line + 1 >= line {
            Some(CommentGroup {
                comments: std::mem::take(&mut self.pending),
            })
        } else {
            self.finish_floating_group();
            None
        }
    }

    fn take_trailing(&mut self) -> Option<CommentGroup> {
        if self.trailing.is_empty() {
            None
        } else {
            Some(CommentGroup {
                comments: std::mem::take(&mut self.trailing),
            })
        }
    }

    fn ident(&mut self) -> Result<Ident, ParseError> {
        match self.peek() {
            Token::Ident(_) => {
                let tok = self.advance();
                let name = match tok.token {
                    Token::Ident(name) => name,
                    _ => unreachable!(),
                };
                Ok(Ident {
                    id: self.ids.fresh(),
                    name,
                    span: tok.span,
                })
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.fresh(),
            span,
            kind,
        }
    }

    // ------------------------------------------------------------------
    // File structure
    // ------------------------------------------------------------------

    pub fn parse_file(&mut self, file_id: FileId, path: PathBuf) -> Result<File, ParseError> {
        self.consume(Token::Package, "package clause")?;
        let package = self.ident()?;
        self.finish_floating_group();
        self.file_doc_closed = true;
        self.match_token(&Token::Semi);

        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            self.advance();
            if self.match_token(&Token::LParen) {
                while !self.check(&Token::RParen) {
                    imports.push(self.parse_import_spec()?);
                    self.match_token(&Token::Semi);
                }
                self.consume(Token::RParen, "`)`")?;
            } else {
                imports.push(self.parse_import_spec()?);
            }
            self.match_token(&Token::Semi);
        }

        let mut decls = Vec::new();
        while !self.check(&Token::Eof) {
            decls.push(self.parse_decl()?);
        }

        Ok(File {
            file_id,
            path,
            doc: self.file_doc.take(),
            package,
            imports,
            decls,
        })
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        match self.peek() {
            Token::Str(_) => {
                let tok = self.advance();
                let raw = match tok.token {
                    Token::Str(s) => s,
                    _ => unreachable!(),
                };
                Ok(ImportSpec {
                    path: raw.trim_matches('"').to_string(),
                    span: tok.span,
                })
            }
            _ => Err(self.unexpected("import path string")),
        }
    }

    fn parse_decl(&mut self) -> Result<Decl, ParseError> {
        let doc = self.take_doc();
        match self.peek() {
            Token::Func => self.parse_func_decl(doc).map(Decl::Func),
            Token::Type | Token::Var | Token::Const => self.parse_gen_decl(doc),
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn parse_gen_decl(&mut self, doc: Option<CommentGroup>) -> Result<Decl, ParseError> {
        let keyword = self.advance().token;
        let value_kind = match keyword {
            Token::Var => Some(ValueKind::Var),
            Token::Const => Some(ValueKind::Const),
            _ => None,
        };

        let mut specs = Vec::new();
        if self.match_token(&Token::LParen) {
            while !self.check(&Token::RParen) {
                let spec_doc = self.take_doc();
                specs.push(self.parse_spec(value_kind, spec_doc)?);
                self.match_token(&Token::Semi);
            }
            self.consume(Token::RParen, "`)`")?;
        } else {
            specs.push(self.parse_spec(value_kind, None)?);
        }
        self.match_token(&Token::Semi);

        Ok(Decl::Gen { doc, specs })
    }

    fn parse_spec(
        &mut self,
        value_kind: Option<ValueKind>,
        doc: Option<CommentGroup>,
    ) -> Result<Spec, ParseError> {
        match value_kind {
            Some(kind) => {
                let mut names = vec![self.ident()?];
                while self.match_token(&Token::Comma) {
                    names.push(self.ident()?);
                }
                let ty = if !self.check(&Token::Assign)
                    && !self.check(&Token::Semi)
                    && !self.check(&Token::RParen)
                {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let mut values = Vec::new();
                if self.match_token(&Token::Assign) {
                    values.push(self.parse_expr()?);
                    while self.match_token(&Token::Comma) {
                        values.push(self.parse_expr()?);
                    }
                }
                Ok(Spec::Value(ValueSpec {
                    doc,
                    kind,
                    names,
                    ty,
                    values,
                }))
            }
            None => {
                let name = self.ident()?;
                let type_params = if self.looks_like_type_params() {
                    self.parse_type_params()?
                } else {
                    Vec::new()
                };
                let ty = self.parse_type()?;
                Ok(Spec::Type(TypeSpec {
                    doc,
                    name,
                    type_params,
                    ty,
                }))
            }
        }
    }

    /// Disambiguate `type Seq[T any] []T` from `type Arr [4]int`: a type
    /// parameter list opens with an identifier whose constraint follows
    /// before `]` or `,`.
    fn looks_like_type_params(&mut self) -> bool {
        self.sync();
        if self.peek_ahead(0) != &Token::LBracket {
            return false;
        }
        matches!(self.peek_ahead(1), Token::Ident(_))
            && !matches!(self.peek_ahead(2), Token::RBracket | Token::Comma)
            && !matches!(
                self.peek_ahead(2),
                Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Char(_)
            )
    }

    fn parse_type_params(&mut self) -> Result<Vec<TypeParam>, ParseError> {
        self.consume(Token::LBracket, "`[`")?;
        let mut params = Vec::new();
        loop {
            let name = self.ident()?;
            let constraint = self.parse_type()?;
            params.push(TypeParam { name, constraint });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(Token::RBracket, "`]`")?;
        Ok(params)
    }

    fn parse_func_decl(&mut self, doc: Option<CommentGroup>) -> Result<FuncDecl, ParseError> {
        let start = self.peek_span();
        self.consume(Token::Func, "`func`")?;

        let recv = if self.match_token(&Token::LParen) {
            let name = self.ident()?;
            let ty = self.parse_type()?;
            self.consume(Token::RParen, "`)`")?;
            Some(Receiver { name, ty })
        } else {
            None
        };

        let name = self.ident()?;
        let type_params = if self.check(&Token::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let params = self.parse_params()?;
        let result = self.parse_result()?;
        let body = if self.check(&Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        let end = self.peek_span();
        self.match_token(&Token::Semi);

        Ok(FuncDecl {
            doc,
            recv,
            name,
            type_params,
            params,
            result,
            body,
            span: start.merge(&end),
        })
    }

    fn parse_result(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.check(&Token::LBrace) || self.check(&Token::Semi) || self.check(&Token::Eof) {
            return Ok(None);
        }
        if self.check(&Token::LParen) {
            let span = self.peek_span();
            let groups = self.parse_params()?;
            let total: usize = groups.iter().map(|g| g.names.len().max(1)).sum();
            if total > 1 {
                return Err(ParseError::Unsupported {
                    what: "multiple return values".into(),
                    span,
                });
            }
            return Ok(groups.into_iter().next().map(|g| g.ty));
        }
        Ok(Some(self.parse_type()?))
    }

    /// Parse a parenthesized parameter list, grouping `a, b T` names and
    /// recognizing name-less lists (function types).
    fn parse_params(&mut self) -> Result<Vec<ParamGroup>, ParseError> {
        self.consume(Token::LParen, "`(`")?;
        let mut entries: Vec<(Option<Ident>, Expr)> = Vec::new();
        while !self.check(&Token::RParen) {
            let first = self.parse_type()?;
            if self.type_starts_here() {
                // `name Type`
                let name = match first.kind {
                    ExprKind::Name(ident) => ident,
                    _ => return Err(self.unexpected("parameter name")),
                };
                let ty = self.parse_type()?;
                entries.push((Some(name), ty));
            } else {
                entries.push((None, first));
            }
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(Token::RParen, "`)`")?;

        let named = entries.iter().any(|(name, _)| name.is_some());
        let mut groups = Vec::new();
        if named {
            let mut names: Vec<Ident> = Vec::new();
            for (name, ty) in entries {
                match name {
                    Some(ident) => {
                        names.push(ident);
                        groups.push(ParamGroup {
                            names: std::mem::take(&mut names),
                            ty,
                        });
                    }
                    None => match ty.kind {
                        ExprKind::Name(ident) => names.push(ident),
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "parameter name".into(),
                                found: Token::Semi,
                                span: ty.span,
                            })
                        }
                    },
                }
            }
            if !names.is_empty() {
                return Err(ParseError::UnexpectedToken {
                    expected: "parameter type".into(),
                    found: Token::RParen,
                    span: names.last().unwrap().span,
                });
            }
        } else {
            for (_, ty) in entries {
                groups.push(ParamGroup {
                    names: Vec::new(),
                    ty,
                });
            }
        }
        Ok(groups)
    }

    fn type_starts_here(&mut self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::Star
                | Token::LBracket
                | Token::Func
                | Token::Struct
                | Token::Interface
                | Token::LParen
        )
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_type(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        match self.peek().clone() {
            Token::Ident(_) => {
                let ident = self.ident()?;
                let mut x = self.expr(ident.span, ExprKind::Name(ident));
                if self.check(&Token::Dot) {
                    self.advance();
                    let sel = self.ident()?;
                    let span = start.merge(&sel.span);
                    x = self.expr(
                        span,
                        ExprKind::Selector {
                            x: Box::new(x),
                            sel,
                        },
                    );
                }
                if self.check(&Token::LBracket) {
                    self.advance();
                    let mut args = vec![self.parse_type()?];
                    while self.match_token(&Token::Comma) {
                        args.push(self.parse_type()?);
                    }
                    let end = self.consume(Token::RBracket, "`]`")?.span;
                    let span = start.merge(&end);
                    x = if args.len() == 1 {
                        self.expr(
                            span,
                            ExprKind::Index {
                                x: Box::new(x),
                                index: Box::new(args.pop().unwrap()),
                            },
                        )
                    } else {
                        self.expr(
                            span,
                            ExprKind::IndexList {
                                x: Box::new(x),
                                indices: args,
                            },
                        )
                    };
                }
                Ok(x)
            }
            Token::Star => {
                self.advance();
                let elem = self.parse_type()?;
                let span = start.merge(&elem.span);
                Ok(self.expr(span, ExprKind::Star(Box::new(elem))))
            }
            Token::LBracket => {
                self.advance();
                let len = if self.match_token(&Token::RBracket) {
                    let elem = self.parse_type()?;
                    let span = start.merge(&elem.span);
                    return Ok(self.expr(
                        span,
                        ExprKind::SliceType {
                            elem: Box::new(elem),
                        },
                    ));
                } else if self.match_token(&Token::Ellipsis) {
                    self.consume(Token::RBracket, "`]`")?;
                    None
                } else {
                    let len = self.parse_expr()?;
                    self.consume(Token::RBracket, "`]`")?;
                    Some(Box::new(len))
                };
                let elem = self.parse_type()?;
                let span = start.merge(&elem.span);
                Ok(self.expr(
                    span,
                    ExprKind::ArrayType {
                        len,
                        elem: Box::new(elem),
                    },
                ))
            }
            Token::Func => {
                self.advance();
                let params = self.parse_params()?;
                let result = if self.type_starts_here() {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let end = self.peek_span();
                let span = start.merge(&end);
                Ok(self.expr(
                    span,
                    ExprKind::FuncType(Box::new(FuncTypeExpr { params, result })),
                ))
            }
            Token::Struct => {
                self.advance();
                let fields = self.parse_struct_fields()?;
                let end = self.peek_span();
                let span = start.merge(&end);
                Ok(self.expr(span, ExprKind::StructType { fields }))
            }
            Token::Interface => {
                self.advance();
                let (methods, unions) = self.parse_interface_body()?;
                let end = self.peek_span();
                let span = start.merge(&end);
                Ok(self.expr(span, ExprKind::InterfaceType { methods, unions }))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                let end = self.consume(Token::RParen, "`)`")?.span;
                let span = start.merge(&end);
                Ok(self.expr(span, ExprKind::Paren(Box::new(inner))))
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn parse_struct_fields(&mut self) -> Result<Vec<Field>, ParseError> {
        self.consume(Token::LBrace, "`{`")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let doc = self.take_doc();
            let mut names = vec![self.ident()?];
            while self.match_token(&Token::Comma) {
                names.push(self.ident()?);
            }
            let (names, ty) = if names.len() == 1 && !self.type_starts_here() {
                // Embedded marker field: a bare type name on its own line.
                let ident = names.pop().unwrap();
                let span = ident.span;
                (Vec::new(), self.expr(span, ExprKind::Name(ident)))
            } else {
                (names, self.parse_type()?)
            };
            let tag = match self.peek() {
                Token::RawStr(_) => match self.advance().token {
                    Token::RawStr(s) => Some(s),
                    _ => unreachable!(),
                },
                _ => None,
            };
            self.sync();
            let line_comment = self.take_trailing();
            fields.push(Field {
                doc,
                names,
                ty,
                tag,
                line_comment,
            });
            if !self.match_token(&Token::Semi) && !self.check(&Token::RBrace) {
                return Err(self.unexpected("`;` or `}`"));
            }
        }
        self.consume(Token::RBrace, "`}`")?;
        Ok(fields)
    }

    fn parse_interface_body(&mut self) -> Result<(Vec<MethodSig>, Vec<Expr>), ParseError> {
        self.consume(Token::LBrace, "`{`")?;
        let mut methods = Vec::new();
        let mut unions = Vec::new();
        while !self.check(&Token::RBrace) {
            self.take_doc();
            if matches!(self.peek(), Token::Ident(_)) && self.peek_ahead(1) == &Token::LParen {
                let name = self.ident()?;
                let params = self.parse_params()?;
                let result = if self.type_starts_here() {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                methods.push(MethodSig {
                    name,
                    params,
                    result,
                });
            } else {
                unions.push(self.parse_type()?);
                while self.match_token(&Token::Pipe) {
                    unions.push(self.parse_type()?);
                }
            }
            if !self.match_token(&Token::Semi) && !self.check(&Token::RBrace) {
                return Err(self.unexpected("`;` or `}`"));
            }
        }
        self.consume(Token::RBrace, "`}`")?;
        Ok((methods, unions))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(1)
    }

    fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
        let entry = match token {
            Token::OrOr => (BinaryOp::LogOr, 1),
            Token::AndAnd => (BinaryOp::LogAnd, 2),
            Token::Eq => (BinaryOp::Eq, 3),
            Token::Neq => (BinaryOp::Neq, 3),
            Token::Lt => (BinaryOp::Lt, 3),
            Token::Le => (BinaryOp::Le, 3),
            Token::Gt => (BinaryOp::Gt, 3),
            Token::Ge => (BinaryOp::Ge, 3),
            Token::Plus => (BinaryOp::Add, 4),
            Token::Minus => (BinaryOp::Sub, 4),
            Token::Pipe => (BinaryOp::BitOr, 4),
            Token::Caret => (BinaryOp::BitXor, 4),
            Token::Star => (BinaryOp::Mul, 5),
            Token::Slash => (BinaryOp::Div, 5),
            Token::Percent => (BinaryOp::Rem, 5),
            Token::Shl => (BinaryOp::Shl, 5),
            Token::Shr => (BinaryOp::Shr, 5),
            Token::Amp => (BinaryOp::BitAnd, 5),
            _ => return None,
        };
        Some(entry)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut x = self.parse_unary()?;
        while let Some((op, prec)) = Self::binary_op(self.peek()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let y = self.parse_binary(prec + 1)?;
            let span = x.span.merge(&y.span);
            x = self.expr(
                span,
                ExprKind::Binary {
                    op,
                    x: Box::new(x),
                    y: Box::new(y),
                },
            );
        }
        Ok(x)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let op = match self.peek() {
            Token::Plus => Some(UnaryOp::Pos),
            Token::Minus => Some(UnaryOp::Neg),
            Token::Not => Some(UnaryOp::Not),
            Token::Amp => Some(UnaryOp::Addr),
            Token::Star => {
                self.advance();
                let x = self.parse_unary()?;
                let span = start.merge(&x.span);
                return Ok(self.expr(span, ExprKind::Star(Box::new(x))));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let x = self.parse_unary()?;
            let span = start.merge(&x.span);
            return Ok(self.expr(span, ExprKind::Unary { op, x: Box::new(x) }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut x = self.parse_operand()?;
        loop {
            match self.peek().clone() {
                Token::Dot => {
                    self.advance();
                    let sel = self.ident()?;
                    let span = x.span.merge(&sel.span);
                    x = self.expr(
                        span,
                        ExprKind::Selector {
                            x: Box::new(x),
                            sel,
                        },
                    );
                }
                Token::LParen => {
                    self.advance();
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let mut args = Vec::new();
                    while !self.check(&Token::RParen) {
                        args.push(self.parse_expr()?);
                        if !self.match_token(&Token::Comma) {
                            break;
                        }
                    }
                    self.allow_composite = saved;
                    let end = self.consume(Token::RParen, "`)`")?.span;
                    let span = x.span.merge(&end);
                    x = self.expr(
                        span,
                        ExprKind::Call {
                            func: Box::new(x),
                            args,
                        },
                    );
                }
                Token::LBracket => {
                    self.advance();
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let mut indices = vec![self.parse_expr()?];
                    while self.match_token(&Token::Comma) {
                        indices.push(self.parse_expr()?);
                    }
                    self.allow_composite = saved;
                    let end = self.consume(Token::RBracket, "`]`")?.span;
                    let span = x.span.merge(&end);
                    x = if indices.len() == 1 {
                        self.expr(
                            span,
                            ExprKind::Index {
                                x: Box::new(x),
                                index: Box::new(indices.pop().unwrap()),
                            },
                        )
                    } else {
                        self.expr(
                            span,
                            ExprKind::IndexList {
                                x: Box::new(x),
                                indices,
                            },
                        )
                    };
                }
                Token::LBrace if self.allow_composite && Self::can_start_literal(&x) => {
                    let elems = self.parse_literal_body()?;
                    let end = self.peek_span();
                    let span = x.span.merge(&end);
                    x = self.expr(
                        span,
                        ExprKind::CompositeLit {
                            ty: Some(Box::new(x)),
                            elems,
                        },
                    );
                }
                _ => break,
            }
        }
        Ok(x)
    }

    /// A `{` forms a composite literal only after type-shaped operands.
    fn can_start_literal(x: &Expr) -> bool {
        matches!(
            x.kind,
            ExprKind::Name(_)
                | ExprKind::Selector { .. }
                | ExprKind::Index { .. }
                | ExprKind::IndexList { .. }
                | ExprKind::ArrayType { .. }
                | ExprKind::SliceType { .. }
        )
    }

    fn parse_literal_body(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.consume(Token::LBrace, "`{`")?;
        let saved = self.allow_composite;
        self.allow_composite = true;
        let mut elems = Vec::new();
        while !self.check(&Token::RBrace) {
            let elem = self.parse_literal_elem()?;
            if self.match_token(&Token::Colon) {
                let value = self.parse_literal_elem()?;
                let span = elem.span.merge(&value.span);
                let kv = self.expr(
                    span,
                    ExprKind::KeyValue {
                        key: Box::new(elem),
                        value: Box::new(value),
                    },
                );
                elems.push(kv);
            } else {
                elems.push(elem);
            }
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.allow_composite = saved;
        self.consume(Token::RBrace, "`}`")?;
        Ok(elems)
    }

    /// A literal element: an expression, or a nested type-elided literal
    /// `{…}`.
    fn parse_literal_elem(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::LBrace) {
            let start = self.peek_span();
            let elems = self.parse_literal_body()?;
            let end = self.peek_span();
            let span = start.merge(&end);
            return Ok(self.expr(span, ExprKind::CompositeLit { ty: None, elems }));
        }
        self.parse_expr()
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        match self.peek().clone() {
            Token::Ident(_) => {
                let ident = self.ident()?;
                Ok(self.expr(ident.span, ExprKind::Name(ident)))
            }
            Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Char(_) => {
                let tok = self.advance();
                let (kind, value) = match tok.token {
                    Token::Int(v) => (LitKind::Int, v),
                    Token::Float(v) => (LitKind::Float, v),
                    Token::Str(v) => (LitKind::Str, v),
                    Token::Char(v) => (LitKind::Char, v),
                    _ => unreachable!(),
                };
                Ok(self.expr(tok.span, ExprKind::BasicLit { kind, value }))
            }
            Token::LParen => {
                self.advance();
                let saved = self.allow_composite;
                self.allow_composite = true;
                let inner = self.parse_expr()?;
                self.allow_composite = saved;
                let end = self.consume(Token::RParen, "`)`")?.span;
                let span = start.merge(&end);
                Ok(self.expr(span, ExprKind::Paren(Box::new(inner))))
            }
            Token::Func => {
                self.advance();
                let params = self.parse_params()?;
                let result = if self.type_starts_here() {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                if self.check(&Token::LBrace) {
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let body = self.parse_block()?;
                    self.allow_composite = saved;
                    let span = start.merge(&body.span);
                    Ok(self.expr(
                        span,
                        ExprKind::FuncLit(Box::new(FuncLit {
                            params,
                            result,
                            body,
                        })),
                    ))
                } else {
                    let end = self.peek_span();
                    let span = start.merge(&end);
                    Ok(self.expr(
                        span,
                        ExprKind::FuncType(Box::new(FuncTypeExpr { params, result })),
                    ))
                }
            }
            Token::LBracket => {
                // `[]T{…}`, `[N]T{…}`, `[...]T{…}` in operand position.
                let ty = self.parse_type()?;
                Ok(ty)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.consume(Token::LBrace, "`{`")?.span;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            let stmt = self.parse_stmt()?;
            stmts.push(stmt);
            if !self.match_token(&Token::Semi) && !self.check(&Token::RBrace) {
                return Err(self.unexpected("`;` or `}`"));
            }
        }
        let end = self.consume(Token::RBrace, "`}`")?.span;
        Ok(Block {
            stmts,
            span: start.merge(&end),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.take_doc();
        let start = self.peek_span();
        match self.peek().clone() {
            Token::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Stmt {
                    span,
                    kind: StmtKind::Block(block),
                })
            }
            Token::Return => {
                self.advance();
                let mut results = Vec::new();
                if !self.check(&Token::Semi) && !self.check(&Token::RBrace) {
                    results.push(self.parse_expr()?);
                    while self.match_token(&Token::Comma) {
                        results.push(self.parse_expr()?);
                    }
                }
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Return(results),
                })
            }
            Token::Break => {
                self.advance();
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Break,
                })
            }
            Token::Continue => {
                self.advance();
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Continue,
                })
            }
            Token::If => self.parse_if_stmt(),
            Token::For => self.parse_for_stmt(),
            Token::Ident(name) if name == "defer" || name == "go" || name == "switch" => {
                Err(ParseError::Unsupported {
                    what: name,
                    span: start,
                })
            }
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        let mut lhs = vec![self.parse_expr()?];
        while self.match_token(&Token::Comma) {
            lhs.push(self.parse_expr()?);
        }

        let op = match self.peek() {
            Token::Define => Some(AssignOp::Define),
            Token::Assign => Some(AssignOp::Assign),
            Token::PlusAssign => Some(AssignOp::Add),
            Token::MinusAssign => Some(AssignOp::Sub),
            Token::StarAssign => Some(AssignOp::Mul),
            Token::SlashAssign => Some(AssignOp::Div),
            Token::PercentAssign => Some(AssignOp::Rem),
            Token::AmpAssign => Some(AssignOp::BitAnd),
            Token::PipeAssign => Some(AssignOp::BitOr),
            Token::CaretAssign => Some(AssignOp::BitXor),
            Token::ShlAssign => Some(AssignOp::Shl),
            Token::ShrAssign => Some(AssignOp::Shr),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let mut rhs = vec![self.parse_expr()?];
            while self.match_token(&Token::Comma) {
                rhs.push(self.parse_expr()?);
            }
            let span = start.merge(&rhs.last().unwrap().span);
            return Ok(Stmt {
                span,
                kind: StmtKind::Assign { op, lhs, rhs },
            });
        }

        if self.check(&Token::Inc) || self.check(&Token::Dec) {
            let inc = self.check(&Token::Inc);
            self.advance();
            if lhs.len() != 1 {
                return Err(self.unexpected("single expression"));
            }
            let x = lhs.pop().unwrap();
            let span = start.merge(&x.span);
            return Ok(Stmt {
                span,
                kind: StmtKind::IncDec { x, inc },
            });
        }

        if lhs.len() != 1 {
            return Err(self.unexpected("assignment"));
        }
        let x = lhs.pop().unwrap();
        let span = x.span;
        Ok(Stmt {
            span,
            kind: StmtKind::Expr(x),
        })
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.consume(Token::If, "`if`")?.span;
        let saved = self.allow_composite;
        self.allow_composite = false;
        let first = self.parse_simple_stmt()?;
        let (init, cond) = if self.match_token(&Token::Semi) {
            let cond = self.parse_expr()?;
            (Some(Box::new(first)), cond)
        } else {
            match first.kind {
                StmtKind::Expr(cond) => (None, cond),
                _ => {
                    self.allow_composite = saved;
                    return Err(self.unexpected("condition"));
                }
            }
        };
        self.allow_composite = saved;
        let body = self.parse_block()?;
        let els = if self.match_token(&Token::Else) {
            if self.check(&Token::If) {
                Some(Box::new(self.parse_if_stmt()?))
            } else {
                let block = self.parse_block()?;
                let span = block.span;
                Some(Box::new(Stmt {
                    span,
                    kind: StmtKind::Block(block),
                }))
            }
        } else {
            None
        };
        let span = start.merge(&body.span);
        Ok(Stmt {
            span,
            kind: StmtKind::If {
                init,
                cond,
                body,
                els,
            },
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.consume(Token::For, "`for`")?.span;
        let saved = self.allow_composite;
        self.allow_composite = false;

        // `for { … }`
        if self.check(&Token::LBrace) {
            self.allow_composite = saved;
            let body = self.parse_block()?;
            let span = start.merge(&body.span);
            return Ok(Stmt {
                span,
                kind: StmtKind::For {
                    init: None,
                    cond: None,
                    post: None,
                    body,
                },
            });
        }

        // `for range x { … }`
        if self.match_token(&Token::Range) {
            let x = self.parse_expr()?;
            self.allow_composite = saved;
            let body = self.parse_block()?;
            let span = start.merge(&body.span);
            return Ok(Stmt {
                span,
                kind: StmtKind::Range {
                    key: None,
                    value: None,
                    define: true,
                    x,
                    body,
                },
            });
        }

        // A range clause hides behind the assignment operator:
        // `for k, v := range x { … }`.
        let mut lhs = vec![self.parse_expr()?];
        while self.match_token(&Token::Comma) {
            lhs.push(self.parse_expr()?);
        }
        let assign_op = match self.peek() {
            Token::Define => Some(AssignOp::Define),
            Token::Assign => Some(AssignOp::Assign),
            _ => None,
        };
        if let Some(op) = assign_op {
            if self.peek_ahead(1) == &Token::Range {
                self.advance();
                self.advance();
                let x = self.parse_expr()?;
                self.allow_composite = saved;
                let body = self.parse_block()?;
                let span = start.merge(&body.span);
                let mut iter = lhs.into_iter();
                let key = iter.next();
                let value = iter.next();
                return Ok(Stmt {
                    span,
                    kind: StmtKind::Range {
                        key,
                        value,
                        define: op == AssignOp::Define,
                        x,
                        body,
                    },
                });
            }
        }

        let first = self.finish_simple_stmt(lhs)?;
        if self.match_token(&Token::Semi) {
            // Three-clause loop.
            let cond = if !self.check(&Token::Semi) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.consume(Token::Semi, "`;`")?;
            let post = if !self.check(&Token::LBrace) {
                Some(Box::new(self.parse_simple_stmt()?))
            } else {
                None
            };
            self.allow_composite = saved;
            let body = self.parse_block()?;
            let span = start.merge(&body.span);
            return Ok(Stmt {
                span,
                kind: StmtKind::For {
                    init: Some(Box::new(first)),
                    cond,
                    post,
                    body,
                },
            });
        }

        // Condition-only loop.
        self.allow_composite = saved;
        let cond = match first.kind {
            StmtKind::Expr(cond) => cond,
            _ => return Err(self.unexpected("loop condition")),
        };
        let body = self.parse_block()?;
        let span = start.merge(&body.span);
        Ok(Stmt {
            span,
            kind: StmtKind::For {
                init: None,
                cond: Some(cond),
                post: None,
                body,
            },
        })
    }

    /// Complete a simple statement whose left-hand side list has already
    /// been parsed (used by the for-header, which looks for `range`
    /// first).
    fn finish_simple_stmt(&mut self, mut lhs: Vec<Expr>) -> Result<Stmt, ParseError> {
        let start = lhs[0].span;
        let op = match self.peek() {
            Token::Define => Some(AssignOp::Define),
            Token::Assign => Some(AssignOp::Assign),
            Token::PlusAssign => Some(AssignOp::Add),
            Token::MinusAssign => Some(AssignOp::Sub),
            Token::StarAssign => Some(AssignOp::Mul),
            Token::SlashAssign => Some(AssignOp::Div),
            Token::PercentAssign => Some(AssignOp::Rem),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let mut rhs = vec![self.parse_expr()?];
            while self.match_token(&Token::Comma) {
                rhs.push(self.parse_expr()?);
            }
            let span = start.merge(&rhs.last().unwrap().span);
            return Ok(Stmt {
                span,
                kind: StmtKind::Assign { op, lhs, rhs },
            });
        }
        if self.check(&Token::Inc) || self.check(&Token::Dec) {
            let inc = self.check(&Token::Inc);
            self.advance();
            let x = lhs.pop().unwrap();
            let span = start.merge(&x.span);
            return Ok(Stmt {
                span,
                kind: StmtKind::IncDec { x, inc },
            });
        }
        if lhs.len() != 1 {
            return Err(self.unexpected("assignment"));
        }
        let x = lhs.pop().unwrap();
        let span = x.span;
        Ok(Stmt {
            span,
            kind: StmtKind::Expr(x),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> File {
        let tokens = Lexer::new(FileId(0), src).tokenize().unwrap();
        let mut ids = NodeIds::new();
        Parser::new(tokens, &mut ids)
            .parse_file(FileId(0), PathBuf::from("test.gx"))
            .unwrap()
    }

    #[test]
    fn parse_package_and_imports() {
        let file = parse("package main\n\nimport (\n\t\"foo\"\n\t\"bar\"\n)\n");
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].path, "foo");
    }

    #[test]
    fn parse_func_with_body() {
        let file = parse("package main\n\nfunc fib(n int) int {\n\tif n <= 1 {\n\t\treturn n\n\t}\n\treturn fib(n-1) + fib(n-2)\n}\n");
        assert_eq!(file.decls.len(), 1);
        match &file.decls[0] {
            Decl::Func(f) => {
                assert_eq!(f.name.name, "fib");
                assert!(f.body.is_some());
                assert_eq!(f.params.len(), 1);
            }
            _ => panic!("expected func"),
        }
    }

    #[test]
    fn parse_struct_with_tags_and_embedded() {
        let file = parse(
            "package main\n\ntype Nums struct {\n\tBehavior\n\tA, B int\n\tD int `attribs:\"twice\"`\n}\n",
        );
        match &file.decls[0] {
            Decl::Gen { specs, .. } => match &specs[0] {
                Spec::Type(spec) => match &spec.ty.kind {
                    ExprKind::StructType { fields } => {
                        assert_eq!(fields.len(), 3);
                        assert!(fields[0].names.is_empty());
                        assert_eq!(fields[1].names.len(), 2);
                        assert_eq!(fields[2].tag_value("attribs").as_deref(), Some("twice"));
                    }
                    _ => panic!("expected struct"),
                },
                _ => panic!("expected type spec"),
            },
            _ => panic!("expected gen decl"),
        }
    }

    #[test]
    fn parse_generic_type_and_method() {
        let file = parse(
            "package main\n\ntype Holder[T any] struct {\n\tItem T\n}\n\nfunc (h Holder[T]) get() T {\n\treturn h.Item\n}\n",
        );
        assert_eq!(file.decls.len(), 2);
        match &file.decls[0] {
            Decl::Gen { specs, .. } => match &specs[0] {
                Spec::Type(spec) => assert_eq!(spec.type_params.len(), 1),
                _ => panic!(),
            },
            _ => panic!(),
        }
        match &file.decls[1] {
            Decl::Func(f) => assert!(f.recv.is_some()),
            _ => panic!(),
        }
    }

    #[test]
    fn array_type_is_not_type_params() {
        let file = parse("package main\n\ntype Arr [4]int\n");
        match &file.decls[0] {
            Decl::Gen { specs, .. } => match &specs[0] {
                Spec::Type(spec) => {
                    assert!(spec.type_params.is_empty());
                    assert!(matches!(spec.ty.kind, ExprKind::ArrayType { .. }));
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn doc_comments_attach_to_decl() {
        let file = parse("package main\n\n//gx:extern rect::Rect\ntype Rect struct {\n}\n");
        match &file.decls[0] {
            Decl::Gen { doc, .. } => {
                let doc = doc.as_ref().expect("doc comment");
                assert_eq!(doc.comments[0].text, "//gx:extern rect::Rect");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn file_doc_survives_blank_line() {
        let file = parse("//gx:include <string.h>\n//gx:externs pkg::\n\npackage main\n");
        let doc = file.doc.expect("file doc");
        assert_eq!(doc.comments.len(), 2);
    }

    #[test]
    fn field_line_comment_attaches() {
        let file = parse("package main\n\ntype Person struct {\n\tGXValue int //gx:extern cppValue\n}\n");
        match &file.decls[0] {
            Decl::Gen { specs, .. } => match &specs[0] {
                Spec::Type(spec) => match &spec.ty.kind {
                    ExprKind::StructType { fields } => {
                        let lc = fields[0].line_comment.as_ref().expect("line comment");
                        assert_eq!(lc.comments[0].text, "//gx:extern cppValue");
                    }
                    _ => panic!(),
                },
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn if_header_does_not_eat_body_brace() {
        let file = parse("package main\n\nfunc f(cond bool) {\n\tif cond {\n\t\treturn\n\t}\n}\n");
        match &file.decls[0] {
            Decl::Func(f) => {
                let body = f.body.as_ref().unwrap();
                assert!(matches!(body.stmts[0].kind, StmtKind::If { .. }));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn composite_literals_in_statements() {
        let file = parse(
            "package main\n\nfunc f() {\n\ts := Outer{x: 2, y: 3, inner: Inner{z: 4}}\n\ta := [...]int{1, 2, 3}\n\tb := []int{}\n\t_ = s\n\t_ = a\n\t_ = b\n}\n",
        );
        match &file.decls[0] {
            Decl::Func(f) => {
                let body = f.body.as_ref().unwrap();
                assert!(matches!(
                    body.stmts[0].kind,
                    StmtKind::Assign {
                        op: AssignOp::Define,
                        ..
                    }
                ));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn range_forms() {
        let src = "package main\n\nfunc f(stuff []int) {\n\tfor i, elem := range stuff {\n\t\t_ = i\n\t\t_ = elem\n\t}\n\tfor i := range stuff {\n\t\t_ = i\n\t}\n\tfor range stuff {\n\t}\n}\n";
        let file = parse(src);
        match &file.decls[0] {
            Decl::Func(f) => {
                let body = f.body.as_ref().unwrap();
                assert_eq!(body.stmts.len(), 3);
                assert!(matches!(
                    body.stmts[0].kind,
                    StmtKind::Range {
                        key: Some(_),
                        value: Some(_),
                        ..
                    }
                ));
                assert!(matches!(
                    body.stmts[2].kind,
                    StmtKind::Range {
                        key: None,
                        value: None,
                        ..
                    }
                ));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn extern_func_without_body() {
        let file = parse("package main\n\nfunc NewPerson(age int, health float32) Person\n");
        match &file.decls[0] {
            Decl::Func(f) => assert!(f.body.is_none()),
            _ => panic!(),
        }
    }

    #[test]
    fn defer_is_rejected() {
        let tokens = Lexer::new(FileId(0), "package main\n\nfunc f() {\n\tdefer g()\n}\n")
            .tokenize()
            .unwrap();
        let mut ids = NodeIds::new();
        let err = Parser::new(tokens, &mut ids)
            .parse_file(FileId(0), PathBuf::from("test.gx"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { .. }));
    }

    #[test]
    fn generic_call_and_instantiation() {
        let file = parse(
            "package main\n\nfunc f() {\n\ti := Holder[int]{42}\n\tx := add[float64](1.2, 2.0)\n\t_ = i\n\t_ = x\n}\n",
        );
        match &file.decls[0] {
            Decl::Func(f) => {
                let body = f.body.as_ref().unwrap();
                match &body.stmts[0].kind {
                    StmtKind::Assign { rhs, .. } => {
                        assert!(matches!(rhs[0].kind, ExprKind::CompositeLit { .. }));
                    }
                    _ => panic!(),
                }
            }
            _ => panic!(),
        }
    }
}
