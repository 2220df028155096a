//! Syntax tree for the gx source subset.
//!
//! The tree is produced by the parser and never mutated afterwards. Every
//! expression and every identifier carries a `NodeId` so the checker can
//! attach semantic information (definitions, uses, types, instantiations)
//! without storing it in the tree itself.

use std::path::PathBuf;

/// Identifies a source file within the loaded program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Byte range within a single source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: usize, end: usize) -> Self {
        Span {
            file,
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Identity of an expression or identifier node, unique per program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// An identifier occurrence. The `NodeId` keys the checker's def/use maps.
#[derive(Debug, Clone)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().map_or(false, |c| c.is_uppercase())
    }
}

// ============================================================================
// Comments
// ============================================================================

/// One `// …` comment, text stored verbatim including the slashes.
#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: Span,
    pub line: u32,
}

/// A run of comments on consecutive lines.
#[derive(Debug, Clone, Default)]
pub struct CommentGroup {
    pub comments: Vec<Comment>,
}

impl CommentGroup {
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Str,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,  // +
    Neg,  // -
    Not,  // !
    Addr, // &
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Addr => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Comparison operators produce bool regardless of operand type.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Identifier reference (or `nil`).
    Name(Ident),

    /// Literal; `value` is the source text verbatim, quotes included.
    BasicLit { kind: LitKind, value: String },

    /// `func(params) result { body }` in expression position.
    FuncLit(Box<FuncLit>),

    /// `T{elems}` or element-typed `{elems}` inside another literal.
    CompositeLit {
        ty: Option<Box<Expr>>,
        elems: Vec<Expr>,
    },

    /// `key: value` inside a composite literal.
    KeyValue { key: Box<Expr>, value: Box<Expr> },

    /// `(x)`
    Paren(Box<Expr>),

    /// `x.sel`
    Selector { x: Box<Expr>, sel: Ident },

    /// `x[index]`; a single index may be an element index or one type
    /// argument, the checker decides.
    Index { x: Box<Expr>, index: Box<Expr> },

    /// `x[a, b, …]`; always explicit type arguments.
    IndexList { x: Box<Expr>, indices: Vec<Expr> },

    /// `f(args)`, also conversions `T(x)`.
    Call { func: Box<Expr>, args: Vec<Expr> },

    /// `*x`: dereference in value position, pointer type in type position.
    Star(Box<Expr>),

    /// `+x`, `-x`, `!x`, `&x`.
    Unary { op: UnaryOp, x: Box<Expr> },

    /// `x op y`
    Binary {
        op: BinaryOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },

    // ------------------------------------------------------------------
    // Type syntax; these appear wherever a type is written, and the first
    // two also occur as composite literal types.
    // ------------------------------------------------------------------
    /// `[len]elem` or `[...]elem` (len `None`).
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },

    /// `[]elem`
    SliceType { elem: Box<Expr> },

    /// `func(params) result`
    FuncType(Box<FuncTypeExpr>),

    /// `struct { fields }`
    StructType { fields: Vec<Field> },

    /// `interface { elems }`
    InterfaceType {
        methods: Vec<MethodSig>,
        unions: Vec<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct FuncLit {
    pub params: Vec<ParamGroup>,
    pub result: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct FuncTypeExpr {
    pub params: Vec<ParamGroup>,
    pub result: Option<Expr>,
}

/// One method element of an interface: `incr()` or `Val() int`.
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: Ident,
    pub params: Vec<ParamGroup>,
    pub result: Option<Expr>,
}

// ============================================================================
// Declarations
// ============================================================================

/// `a, b T` — one group of parameters sharing a type. Unnamed groups
/// (function types) have an empty name list.
#[derive(Debug, Clone)]
pub struct ParamGroup {
    pub names: Vec<Ident>,
    pub ty: Expr,
}

/// `[T any, PT Increr[T]]`
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: Ident,
    pub constraint: Expr,
}

/// A struct field group, possibly multi-name, possibly an embedded marker
/// field (empty name list), with an optional backtick tag.
#[derive(Debug, Clone)]
pub struct Field {
    pub doc: Option<CommentGroup>,
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<String>,
    pub line_comment: Option<CommentGroup>,
}

impl Field {
    /// Look up a backtick-tag entry such as `default:"42"`.
    pub fn tag_value(&self, key: &str) -> Option<String> {
        let tag = self.tag.as_deref()?;
        let needle = format!("{}:\"", key);
        let at = tag.find(&needle)?;
        let rest = &tag[at + needle.len()..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Var,
    Const,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub doc: Option<CommentGroup>,
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub doc: Option<CommentGroup>,
    pub kind: ValueKind,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Spec {
    Type(TypeSpec),
    Value(ValueSpec),
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Ident,
    /// `Point`, `*Point`, `Holder[T]`, `*Seq[T]` — pointer-ness and the
    /// receiver's own type parameter names are recovered from this.
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub doc: Option<CommentGroup>,
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<ParamGroup>,
    pub result: Option<Expr>,
    /// `None` for body-less (extern) declarations.
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    /// `type (…)`, `var (…)`, `const (…)` or their single-spec forms; the
    /// group doc comment applies to specs lacking their own.
    Gen {
        doc: Option<CommentGroup>,
        specs: Vec<Spec>,
    },
    Func(FuncDecl),
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Define, // :=
    Assign, // =
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Define => "=",
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),

    /// `x++` / `x--`
    IncDec { x: Expr, inc: bool },

    /// `lhs op rhs`; multi-element sides parse but are rejected at
    /// emission.
    Assign {
        op: AssignOp,
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
    },

    /// `return` with zero or more results; more than one is rejected at
    /// emission.
    Return(Vec<Expr>),

    Break,
    Continue,

    Block(Block),

    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        els: Option<Box<Stmt>>,
    },

    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },

    /// `for key, value := range x { … }` and its elided forms. `define`
    /// is false for plain `=` range clauses, which the subset rejects.
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub path: String,
    pub span: Span,
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub file_id: FileId,
    pub path: PathBuf,
    /// First comment group of the file when it precedes the package
    /// clause; file-scope directives (`gx:include`, `gx:externs`) live
    /// here.
    pub doc: Option<CommentGroup>,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

// ============================================================================
// Walkers
// ============================================================================

/// Visit every identifier in an expression, including type syntax.
pub fn walk_expr_idents(e: &Expr, f: &mut impl FnMut(&Ident)) {
    match &e.kind {
        ExprKind::Name(ident) => f(ident),
        ExprKind::BasicLit { .. } => {}
        ExprKind::FuncLit(lit) => {
            for group in &lit.params {
                walk_expr_idents(&group.ty, f);
            }
            if let Some(result) = &lit.result {
                walk_expr_idents(result, f);
            }
            walk_block_idents(&lit.body, f);
        }
        ExprKind::CompositeLit { ty, elems } => {
            if let Some(ty) = ty {
                walk_expr_idents(ty, f);
            }
            for elem in elems {
                walk_expr_idents(elem, f);
            }
        }
        ExprKind::KeyValue { key, value } => {
            walk_expr_idents(key, f);
            walk_expr_idents(value, f);
        }
        ExprKind::Paren(inner) | ExprKind::Star(inner) => walk_expr_idents(inner, f),
        ExprKind::Selector { x, sel } => {
            walk_expr_idents(x, f);
            f(sel);
        }
        ExprKind::Index { x, index } => {
            walk_expr_idents(x, f);
            walk_expr_idents(index, f);
        }
        ExprKind::IndexList { x, indices } => {
            walk_expr_idents(x, f);
            for index in indices {
                walk_expr_idents(index, f);
            }
        }
        ExprKind::Call { func, args } => {
            walk_expr_idents(func, f);
            for arg in args {
                walk_expr_idents(arg, f);
            }
        }
        ExprKind::Unary { x, .. } => walk_expr_idents(x, f),
        ExprKind::Binary { x, y, .. } => {
            walk_expr_idents(x, f);
            walk_expr_idents(y, f);
        }
        ExprKind::ArrayType { len, elem } => {
            if let Some(len) = len {
                walk_expr_idents(len, f);
            }
            walk_expr_idents(elem, f);
        }
        ExprKind::SliceType { elem } => walk_expr_idents(elem, f),
        ExprKind::FuncType(fn_ty) => {
            for group in &fn_ty.params {
                walk_expr_idents(&group.ty, f);
            }
            if let Some(result) = &fn_ty.result {
                walk_expr_idents(result, f);
            }
        }
        ExprKind::StructType { fields } => {
            for field in fields {
                walk_expr_idents(&field.ty, f);
            }
        }
        ExprKind::InterfaceType { methods, unions } => {
            for sig in methods {
                for group in &sig.params {
                    walk_expr_idents(&group.ty, f);
                }
                if let Some(result) = &sig.result {
                    walk_expr_idents(result, f);
                }
            }
            for union in unions {
                walk_expr_idents(union, f);
            }
        }
    }
}

pub fn walk_stmt_idents(stmt: &Stmt, f: &mut impl FnMut(&Ident)) {
    match &stmt.kind {
        StmtKind::Expr(e) => walk_expr_idents(e, f),
        StmtKind::IncDec { x, .. } => walk_expr_idents(x, f),
        StmtKind::Assign { lhs, rhs, .. } => {
            for e in lhs {
                walk_expr_idents(e, f);
            }
            for e in rhs {
                walk_expr_idents(e, f);
            }
        }
        StmtKind::Return(results) => {
            for e in results {
                walk_expr_idents(e, f);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Block(block) => walk_block_idents(block, f),
        StmtKind::If {
            init,
            cond,
            body,
            els,
        } => {
            if let Some(init) = init {
                walk_stmt_idents(init, f);
            }
            walk_expr_idents(cond, f);
            walk_block_idents(body, f);
            if let Some(els) = els {
                walk_stmt_idents(els, f);
            }
        }
        StmtKind::For {
            init,
            cond,
            post,
            body,
        } => {
            if let Some(init) = init {
                walk_stmt_idents(init, f);
            }
            if let Some(cond) = cond {
                walk_expr_idents(cond, f);
            }
            if let Some(post) = post {
                walk_stmt_idents(post, f);
            }
            walk_block_idents(body, f);
        }
        StmtKind::Range {
            key,
            value,
            x,
            body,
            ..
        } => {
            if let Some(key) = key {
                walk_expr_idents(key, f);
            }
            if let Some(value) = value {
                walk_expr_idents(value, f);
            }
            walk_expr_idents(x, f);
            walk_block_idents(body, f);
        }
    }
}

pub fn walk_block_idents(block: &Block, f: &mut impl FnMut(&Ident)) {
    for stmt in &block.stmts {
        walk_stmt_idents(stmt, f);
    }
}

/// Visit every identifier of a function declaration: signature, receiver
/// and body.
pub fn walk_func_decl_idents(decl: &FuncDecl, f: &mut impl FnMut(&Ident)) {
    if let Some(recv) = &decl.recv {
        walk_expr_idents(&recv.ty, f);
    }
    for param in &decl.type_params {
        walk_expr_idents(&param.constraint, f);
    }
    for group in &decl.params {
        walk_expr_idents(&group.ty, f);
    }
    if let Some(result) = &decl.result {
        walk_expr_idents(result, f);
    }
    if let Some(body) = &decl.body {
        walk_block_idents(body, f);
    }
}

pub fn walk_value_spec_idents(spec: &ValueSpec, f: &mut impl FnMut(&Ident)) {
    if let Some(ty) = &spec.ty {
        walk_expr_idents(ty, f);
    }
    for value in &spec.values {
        walk_expr_idents(value, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_covers_both() {
        let a = Span::new(FileId(0), 4, 10);
        let b = Span::new(FileId(0), 8, 20);
        let m = a.merge(&b);
        assert_eq!((m.start, m.end), (4, 20));
    }

    #[test]
    fn field_tag_lookup() {
        let f = Field {
            doc: None,
            names: vec![],
            ty: Expr {
                id: NodeId(0),
                span: Span::default(),
                kind: ExprKind::BasicLit {
                    kind: LitKind::Int,
                    value: "0".into(),
                },
            },
            tag: Some(r#"default:"42" attribs:"twice,thrice""#.into()),
            line_comment: None,
        };
        assert_eq!(f.tag_value("default").as_deref(), Some("42"));
        assert_eq!(f.tag_value("attribs").as_deref(), Some("twice,thrice"));
        assert_eq!(f.tag_value("missing"), None);
    }

    #[test]
    fn exported_idents() {
        let mk = |name: &str| Ident {
            id: NodeId(0),
            name: name.into(),
            span: Span::default(),
        };
        assert!(mk("Age").is_exported());
        assert!(!mk("age").is_exported());
        assert!(!mk("_x").is_exported());
    }
}
