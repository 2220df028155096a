//! Name resolution and type computation for the source subset.
//!
//! Runs in three passes over the packages (which arrive in topological
//! order, leaves first): collect package-scope objects, resolve declared
//! types and signatures, then check initializers and bodies. The result
//! is the semantic info store the backend walks; nothing here emits
//! code.
//!
//! The checker is deliberately permissive about what it types — the
//! writer still enforces the emittable subset — but everything the
//! backend reads (defs, uses, expression facts, instantiations) must be
//! recorded here.

use crate::ast::{self, Expr, ExprKind, LitKind, NodeId, Span, Stmt, StmtKind};
use crate::program::{Package, Program, SourceFile};
use crate::types::{
    DeclLoc, ExprInfo, Info, InterfaceMethod, ObjId, ObjKind, Object, ParamInfo, PkgId, Signature,
    Type, TypeArena, TypeId,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("undefined: {name}")]
    Undefined { name: String, span: Span },
    #[error("{name} redeclared")]
    Redeclared { name: String, span: Span },
    #[error("{name} is not a type")]
    NotAType { name: String, span: Span },
    #[error("type {ty} has no field or method {name}")]
    NoFieldOrMethod { ty: String, name: String, span: Span },
    #[error("cannot infer type arguments for {name}")]
    CannotInfer { name: String, span: Span },
    #[error("cannot call non-function value")]
    NotCallable { span: Span },
    #[error("cannot indirect non-pointer value")]
    BadDeref { span: Span },
    #[error("cannot index {ty}")]
    BadIndex { ty: String, span: Span },
    #[error("cannot range over {ty}")]
    BadRange { ty: String, span: Span },
    #[error("array length must be a constant integer")]
    BadArrayLen { span: Span },
    #[error("initialization cycle for {name}")]
    InitCycle { name: String, span: Span },
    #[error("missing initializer for {name}")]
    MissingInit { name: String, span: Span },
    #[error("undefined receiver type {name}")]
    UndefinedReceiver { name: String, span: Span },
    #[error("{what} not supported")]
    Unsupported { what: String, span: Span },
    #[error("wrong number of arguments in call to {name}")]
    WrongArgCount { name: String, span: Span },
}

impl CheckError {
    pub fn span(&self) -> Span {
        match self {
            CheckError::Undefined { span, .. }
            | CheckError::Redeclared { span, .. }
            | CheckError::NotAType { span, .. }
            | CheckError::NoFieldOrMethod { span, .. }
            | CheckError::CannotInfer { span, .. }
            | CheckError::NotCallable { span }
            | CheckError::BadDeref { span }
            | CheckError::BadIndex { span, .. }
            | CheckError::BadRange { span, .. }
            | CheckError::BadArrayLen { span }
            | CheckError::InitCycle { span, .. }
            | CheckError::MissingInit { span, .. }
            | CheckError::UndefinedReceiver { span, .. }
            | CheckError::Unsupported { span, .. }
            | CheckError::WrongArgCount { span, .. } => *span,
        }
    }
}

pub struct Checker {
    files: Vec<SourceFile>,
    packages: Vec<Package>,
    main_pkg: PkgId,
    arena: TypeArena,
    objects: Vec<Object>,
    info: Info,
    errors: Vec<CheckError>,

    /// Package-scope names, one map per package.
    pkg_scopes: Vec<HashMap<String, ObjId>>,
    /// Import bindings, one map per file.
    file_imports: Vec<HashMap<String, ObjId>>,
    universe: HashMap<String, ObjId>,
    /// Local scopes, innermost last; type parameters live here too.
    locals: Vec<HashMap<String, ObjId>>,

    /// Value specs currently being inferred (cycle guard).
    value_in_progress: HashSet<ObjId>,

    cur_pkg: PkgId,
    cur_file: usize,
    cur_result: Option<TypeId>,
}

impl Checker {
    pub fn new(files: Vec<SourceFile>, packages: Vec<Package>, main_pkg: PkgId) -> Self {
        let n_pkgs = packages.len();
        let n_files = files.len();
        Checker {
            files,
            packages,
            main_pkg,
            arena: TypeArena::new(),
            objects: Vec::new(),
            info: Info::default(),
            errors: Vec::new(),
            pkg_scopes: vec![HashMap::new(); n_pkgs],
            file_imports: vec![HashMap::new(); n_files],
            universe: HashMap::new(),
            locals: Vec::new(),
            value_in_progress: HashSet::new(),
            cur_pkg: main_pkg,
            cur_file: 0,
            cur_result: None,
        }
    }

    pub fn run(mut self) -> (Program, Vec<CheckError>) {
        self.setup_universe();
        self.collect();
        self.register_methods();
        self.resolve_decls();
        self.check_bodies();

        let program = Program {
            files: self.files,
            packages: self.packages,
            main_pkg: self.main_pkg,
            arena: self.arena,
            objects: self.objects,
            info: self.info,
        };
        (program, self.errors)
    }

    // ------------------------------------------------------------------
    // Object and scope plumbing
    // ------------------------------------------------------------------

    fn new_object(&mut self, name: &str, kind: ObjKind, pkg: Option<PkgId>, span: Span) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(Object {
            name: name.to_string(),
            kind,
            pkg,
            ty: self.arena.invalid(),
            span,
        });
        id
    }

    fn obj(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    fn set_obj_type(&mut self, id: ObjId, ty: TypeId) {
        self.objects[id.0 as usize].ty = ty;
    }

    fn error(&mut self, err: CheckError) {
        self.errors.push(err);
    }

    fn setup_universe(&mut self) {
        let basics: &[(&str, TypeId)] = &[
            ("bool", self.arena.bool()),
            ("int", self.arena.int()),
            ("float32", self.arena.float()),
            ("float64", self.arena.float()),
            ("byte", self.arena.byte()),
            ("uint8", self.arena.byte()),
            ("rune", self.arena.int()),
            ("string", self.arena.string()),
        ];
        for (name, ty) in basics {
            let obj = self.new_object(name, ObjKind::TypeName, None, Span::default());
            self.set_obj_type(obj, *ty);
            self.universe.insert(name.to_string(), obj);
        }

        let any_ty = self.arena.intern(Type::Interface { methods: vec![] });
        let any = self.new_object("any", ObjKind::TypeName, None, Span::default());
        self.set_obj_type(any, any_ty);
        self.universe.insert("any".into(), any);

        for name in ["true", "false"] {
            let obj = self.new_object(name, ObjKind::Const, None, Span::default());
            self.set_obj_type(obj, self.arena.bool());
            self.universe.insert(name.into(), obj);
        }

        let nil = self.new_object("nil", ObjKind::Nil, None, Span::default());
        self.universe.insert("nil".into(), nil);

        let blank = self.new_object("_", ObjKind::Var, None, Span::default());
        self.universe.insert("_".into(), blank);

        for name in ["len", "cap", "append", "copy", "print", "println", "check"] {
            let obj = self.new_object(name, ObjKind::Builtin, None, Span::default());
            self.universe.insert(name.into(), obj);
        }
    }

    fn lookup(&self, name: &str) -> Option<ObjId> {
        for scope in self.locals.iter().rev() {
            if let Some(obj) = scope.get(name) {
                return Some(*obj);
            }
        }
        if let Some(obj) = self.pkg_scopes[self.cur_pkg.0 as usize].get(name) {
            return Some(*obj);
        }
        if let Some(obj) = self.file_imports[self.cur_file].get(name) {
            return Some(*obj);
        }
        self.universe.get(name).copied()
    }

    fn declare_local(&mut self, ident: &ast::Ident, kind: ObjKind, ty: TypeId) -> ObjId {
        let obj = self.new_object(&ident.name, kind, Some(self.cur_pkg), ident.span);
        self.set_obj_type(obj, ty);
        self.info.defs.insert(ident.id, obj);
        if ident.name != "_" {
            if let Some(scope) = self.locals.last_mut() {
                scope.insert(ident.name.clone(), obj);
            }
        }
        obj
    }

    // ------------------------------------------------------------------
    // Pass 1: collect package-scope objects
    // ------------------------------------------------------------------

    fn collect(&mut self) {
        for p in 0..self.packages.len() {
            let pkg_id = self.packages[p].id;
            for f in 0..self.packages[p].files.len() {
                let file_idx = self.packages[p].files[f];
                self.collect_file(pkg_id, file_idx);
            }
        }
        // Import bindings, now that every package scope exists.
        for p in 0..self.packages.len() {
            for f in 0..self.packages[p].files.len() {
                let file_idx = self.packages[p].files[f];
                self.bind_imports(file_idx);
            }
        }
    }

    fn collect_file(&mut self, pkg: PkgId, file_idx: usize) {
        enum Item {
            Type(ast::Ident),
            Value(ObjKind, Vec<ast::Ident>),
            Func(ast::Ident, bool),
        }
        let mut items: Vec<(DeclLoc, Item)> = Vec::new();
        for (d, decl) in self.files[file_idx].ast.decls.iter().enumerate() {
            match decl {
                ast::Decl::Gen { specs, .. } => {
                    for (s, spec) in specs.iter().enumerate() {
                        let loc = DeclLoc {
                            file: file_idx,
                            decl: d,
                            spec: s,
                        };
                        match spec {
                            ast::Spec::Type(spec) => {
                                items.push((loc, Item::Type(spec.name.clone())));
                            }
                            ast::Spec::Value(spec) => {
                                let kind = match spec.kind {
                                    ast::ValueKind::Var => ObjKind::Var,
                                    ast::ValueKind::Const => ObjKind::Const,
                                };
                                items.push((loc, Item::Value(kind, spec.names.clone())));
                            }
                        }
                    }
                }
                ast::Decl::Func(func) => {
                    let loc = DeclLoc {
                        file: file_idx,
                        decl: d,
                        spec: 0,
                    };
                    items.push((loc, Item::Func(func.name.clone(), func.recv.is_some())));
                }
            }
        }

        for (loc, item) in items {
            match item {
                Item::Type(name) => {
                    let obj = self.new_object(&name.name, ObjKind::TypeName, Some(pkg), name.span);
                    let named = self.arena.intern(Type::Named { obj, args: vec![] });
                    self.set_obj_type(obj, named);
                    self.info.defs.insert(name.id, obj);
                    self.info.type_specs.insert(obj, loc);
                    self.declare_pkg(pkg, &name, obj);
                }
                Item::Value(kind, names) => {
                    for name in names {
                        let obj = self.new_object(&name.name, kind.clone(), Some(pkg), name.span);
                        self.info.defs.insert(name.id, obj);
                        self.info.value_specs.insert(obj, loc);
                        self.declare_pkg(pkg, &name, obj);
                    }
                }
                Item::Func(name, is_method) => {
                    let obj = self.new_object(&name.name, ObjKind::Func, Some(pkg), name.span);
                    self.info.defs.insert(name.id, obj);
                    self.info.func_decls.insert(obj, loc);
                    if !is_method {
                        self.declare_pkg(pkg, &name, obj);
                    }
                }
            }
        }
    }

    fn declare_pkg(&mut self, pkg: PkgId, name: &ast::Ident, obj: ObjId) {
        let scope = &mut self.pkg_scopes[pkg.0 as usize];
        if name.name != "_" && scope.insert(name.name.clone(), obj).is_some() {
            self.error(CheckError::Redeclared {
                name: name.name.clone(),
                span: name.span,
            });
        }
    }

    fn bind_imports(&mut self, file_idx: usize) {
        let imports: Vec<ast::ImportSpec> = self.files[file_idx].ast.imports.clone();
        for import in imports {
            let key = crate::loader::import_key(&import.path);
            let found = self
                .packages
                .iter()
                .find(|p| p.path == key)
                .map(|p| (p.id, p.name.clone()));
            match found {
                Some((pkg_id, pkg_name)) => {
                    let obj = self.new_object(
                        &pkg_name,
                        ObjKind::Package(pkg_id),
                        None,
                        import.span,
                    );
                    self.file_imports[file_idx].insert(pkg_name, obj);
                }
                None => self.error(CheckError::Undefined {
                    name: import.path.clone(),
                    span: import.span,
                }),
            }
        }
    }

    /// The receiver's base type name: `Point`, `*Point`, `Holder[T]`,
    /// `*Seq[T]`.
    fn receiver_base<'e>(ty: &'e Expr) -> Option<&'e ast::Ident> {
        match &ty.kind {
            ExprKind::Name(ident) => Some(ident),
            ExprKind::Star(inner) => Self::receiver_base(inner),
            ExprKind::Index { x, .. } | ExprKind::IndexList { x, .. } => Self::receiver_base(x),
            ExprKind::Paren(inner) => Self::receiver_base(inner),
            _ => None,
        }
    }

    fn register_methods(&mut self) {
        let mut pending: Vec<(PkgId, ObjId)> = Vec::new();
        for (obj_idx, obj) in self.objects.iter().enumerate() {
            if obj.kind == ObjKind::Func {
                if let Some(pkg) = obj.pkg {
                    pending.push((pkg, ObjId(obj_idx as u32)));
                }
            }
        }
        for (pkg, func_obj) in pending {
            let loc = match self.info.func_decls.get(&func_obj) {
                Some(loc) => *loc,
                None => continue,
            };
            let (base, method_name, name_span) = {
                let decl = match &self.files[loc.file].ast.decls[loc.decl] {
                    ast::Decl::Func(decl) => decl,
                    _ => continue,
                };
                let recv = match &decl.recv {
                    Some(recv) => recv,
                    None => continue,
                };
                match Self::receiver_base(&recv.ty) {
                    Some(ident) => (ident.name.clone(), decl.name.name.clone(), decl.name.span),
                    None => continue,
                }
            };
            match self.pkg_scopes[pkg.0 as usize].get(&base).copied() {
                Some(type_obj) if self.obj(type_obj).kind == ObjKind::TypeName => {
                    let key = (type_obj, method_name.clone());
                    if self.info.methods.insert(key, func_obj).is_some() {
                        self.error(CheckError::Redeclared {
                            name: method_name,
                            span: name_span,
                        });
                    }
                }
                _ => self.error(CheckError::UndefinedReceiver {
                    name: base,
                    span: name_span,
                }),
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: declared types and signatures
    // ------------------------------------------------------------------

    fn resolve_decls(&mut self) {
        for p in 0..self.packages.len() {
            let pkg_id = self.packages[p].id;
            for f in 0..self.packages[p].files.len() {
                let file_idx = self.packages[p].files[f];
                self.cur_pkg = pkg_id;
                self.cur_file = file_idx;
                let mut work: Vec<(DeclLoc, bool)> = Vec::new();
                for (d, decl) in self.files[file_idx].ast.decls.iter().enumerate() {
                    match decl {
                        ast::Decl::Gen { specs, .. } => {
                            for (s, spec) in specs.iter().enumerate() {
                                if matches!(spec, ast::Spec::Type(_)) {
                                    work.push((
                                        DeclLoc {
                                            file: file_idx,
                                            decl: d,
                                            spec: s,
                                        },
                                        true,
                                    ));
                                }
                            }
                        }
                        ast::Decl::Func(_) => work.push((
                            DeclLoc {
                                file: file_idx,
                                decl: d,
                                spec: 0,
                            },
                            false,
                        )),
                    }
                }
                for (loc, is_type) in work {
                    if is_type {
                        self.resolve_type_spec(loc);
                    } else {
                        self.resolve_func_decl(loc);
                    }
                }
            }
        }
    }

    fn resolve_type_spec(&mut self, loc: DeclLoc) {
        let spec = match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Gen { specs, .. } => match &specs[loc.spec] {
                ast::Spec::Type(spec) => spec.clone(),
                _ => return,
            },
            _ => return,
        };
        let type_obj = match self.info.defs.get(&spec.name.id).copied() {
            Some(obj) => obj,
            None => return,
        };

        self.locals.push(HashMap::new());
        let params = self.declare_type_params(&spec.type_params);
        self.info.spec_params.insert(type_obj, params);

        let underlying = match &spec.ty.kind {
            ExprKind::StructType { fields } => {
                let mut field_objs = Vec::new();
                let mut index = 0usize;
                for field in fields {
                    if field.names.is_empty() {
                        // Embedded marker field; occupies a slot but has
                        // no object.
                        index += 1;
                        continue;
                    }
                    let ty = self.resolve_type(&field.ty);
                    for name in &field.names {
                        let exported = name.is_exported();
                        let obj = self.new_object(
                            &name.name,
                            ObjKind::Field {
                                parent: type_obj,
                                index,
                                exported,
                                embedded: false,
                            },
                            Some(self.cur_pkg),
                            name.span,
                        );
                        self.set_obj_type(obj, ty);
                        self.info.defs.insert(name.id, obj);
                        field_objs.push(obj);
                        index += 1;
                    }
                }
                self.info.struct_fields.insert(type_obj, field_objs.clone());
                self.arena.intern(Type::Struct { fields: field_objs })
            }
            ExprKind::InterfaceType { methods, .. } => {
                let mut iface_methods = Vec::new();
                for sig in methods {
                    let obj =
                        self.new_object(&sig.name.name, ObjKind::Func, Some(self.cur_pkg), sig.name.span);
                    let params = self.resolve_param_groups(&sig.params);
                    let result = sig.result.as_ref().map(|r| self.resolve_type(r));
                    let fn_ty = self.arena.intern(Type::Func(Signature {
                        recv: Some(ParamInfo {
                            name: String::new(),
                            ty: self.arena.invalid(),
                        }),
                        type_params: vec![],
                        params,
                        result,
                    }));
                    self.set_obj_type(obj, fn_ty);
                    self.info.defs.insert(sig.name.id, obj);
                    iface_methods.push(InterfaceMethod {
                        name: sig.name.name.clone(),
                        obj,
                    });
                }
                self.arena.intern(Type::Interface {
                    methods: iface_methods,
                })
            }
            _ => self.resolve_type(&spec.ty),
        };

        self.locals.pop();
        self.info.underlying.insert(type_obj, underlying);
    }

    fn declare_type_params(&mut self, params: &[ast::TypeParam]) -> Vec<ObjId> {
        // Bind the names first so constraints may refer to each other
        // (`[T any, PT Increr[T]]`).
        let mut objs = Vec::new();
        for param in params {
            let obj = self.new_object(
                &param.name.name,
                ObjKind::TypeParam { constraint: None },
                Some(self.cur_pkg),
                param.name.span,
            );
            let ty = self.arena.intern(Type::TypeParam(obj));
            self.set_obj_type(obj, ty);
            self.info.defs.insert(param.name.id, obj);
            if let Some(scope) = self.locals.last_mut() {
                scope.insert(param.name.name.clone(), obj);
            }
            objs.push(obj);
        }
        for (param, obj) in params.iter().zip(objs.iter()) {
            let constraint = self.resolve_type(&param.constraint);
            if let ObjKind::TypeParam { constraint: slot } = &mut self.objects[obj.0 as usize].kind
            {
                *slot = Some(constraint);
            }
        }
        objs
    }

    fn resolve_func_decl(&mut self, loc: DeclLoc) {
        let decl = match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Func(decl) => decl.clone(),
            _ => return,
        };
        let func_obj = match self.info.defs.get(&decl.name.id).copied() {
            Some(obj) => obj,
            None => return,
        };

        self.locals.push(HashMap::new());

        // Receiver type parameters are declared by the receiver clause:
        // `func (h Holder[T]) get() T`.
        let recv = decl.recv.as_ref().map(|recv| {
            let recv_params = Self::receiver_param_names(&recv.ty);
            for ident in &recv_params {
                let obj = self.new_object(
                    &ident.name,
                    ObjKind::TypeParam { constraint: None },
                    Some(self.cur_pkg),
                    ident.span,
                );
                let ty = self.arena.intern(Type::TypeParam(obj));
                self.set_obj_type(obj, ty);
                self.info.defs.insert(ident.id, obj);
                if let Some(scope) = self.locals.last_mut() {
                    scope.insert(ident.name.clone(), obj);
                }
            }
            let ty = self.resolve_type(&recv.ty);
            ParamInfo {
                name: recv.name.name.clone(),
                ty,
            }
        });

        let type_params = self.declare_type_params(&decl.type_params);
        let params = self.resolve_param_groups(&decl.params);
        let result = decl.result.as_ref().map(|r| self.resolve_type(r));

        self.locals.pop();

        let sig = Signature {
            recv,
            type_params,
            params,
            result,
        };
        let fn_ty = self.arena.intern(Type::Func(sig));
        self.set_obj_type(func_obj, fn_ty);
    }

    fn receiver_param_names(ty: &Expr) -> Vec<ast::Ident> {
        match &ty.kind {
            ExprKind::Star(inner) | ExprKind::Paren(inner) => Self::receiver_param_names(inner),
            ExprKind::Index { index, .. } => match &index.kind {
                ExprKind::Name(ident) => vec![ident.clone()],
                _ => vec![],
            },
            ExprKind::IndexList { indices, .. } => indices
                .iter()
                .filter_map(|ix| match &ix.kind {
                    ExprKind::Name(ident) => Some(ident.clone()),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    fn resolve_param_groups(&mut self, groups: &[ast::ParamGroup]) -> Vec<ParamInfo> {
        let mut params = Vec::new();
        for group in groups {
            let ty = self.resolve_type(&group.ty);
            if group.names.is_empty() {
                params.push(ParamInfo {
                    name: String::new(),
                    ty,
                });
            } else {
                for name in &group.names {
                    params.push(ParamInfo {
                        name: name.name.clone(),
                        ty,
                    });
                }
            }
        }
        params
    }

    // ------------------------------------------------------------------
    // Type expression resolution
    // ------------------------------------------------------------------

    fn resolve_type(&mut self, e: &Expr) -> TypeId {
        let ty = self.resolve_type_inner(e);
        self.info.exprs.insert(
            e.id,
            ExprInfo {
                ty,
                is_nil: false,
                is_type: true,
                is_builtin: false,
            },
        );
        ty
    }

    fn resolve_type_inner(&mut self, e: &Expr) -> TypeId {
        match &e.kind {
            ExprKind::Name(ident) => self.resolve_type_name(ident),
            ExprKind::Paren(inner) => self.resolve_type_inner(inner),
            ExprKind::Star(inner) => {
                let elem = self.resolve_type(inner);
                self.arena.intern(Type::Pointer(elem))
            }
            ExprKind::SliceType { elem } => {
                let elem = self.resolve_type(elem);
                self.arena.intern(Type::Slice { elem })
            }
            ExprKind::ArrayType { len, elem } => {
                let elem_ty = self.resolve_type(elem);
                let len = match len {
                    Some(len_expr) => match Self::const_int(len_expr) {
                        Some(n) => n,
                        None => {
                            self.error(CheckError::BadArrayLen {
                                span: len_expr.span,
                            });
                            0
                        }
                    },
                    // `[...]T` only makes sense with a literal; the
                    // composite path supplies the length.
                    None => {
                        self.error(CheckError::BadArrayLen { span: e.span });
                        0
                    }
                };
                self.arena.intern(Type::Array { elem: elem_ty, len })
            }
            ExprKind::FuncType(fn_ty) => {
                let params = self.resolve_param_groups(&fn_ty.params);
                let result = fn_ty.result.as_ref().map(|r| self.resolve_type(r));
                self.arena.intern(Type::Func(Signature {
                    recv: None,
                    type_params: vec![],
                    params,
                    result,
                }))
            }
            ExprKind::InterfaceType { methods, .. } => {
                if methods.is_empty() {
                    self.arena.intern(Type::Interface { methods: vec![] })
                } else {
                    // Inline constraint with methods; resolved like a
                    // declared one but anonymous.
                    let mut iface_methods = Vec::new();
                    for sig in methods {
                        let obj = self.new_object(
                            &sig.name.name,
                            ObjKind::Func,
                            Some(self.cur_pkg),
                            sig.name.span,
                        );
                        let params = self.resolve_param_groups(&sig.params);
                        let result = sig.result.as_ref().map(|r| self.resolve_type(r));
                        let fn_ty = self.arena.intern(Type::Func(Signature {
                            recv: Some(ParamInfo {
                                name: String::new(),
                                ty: self.arena.invalid(),
                            }),
                            type_params: vec![],
                            params,
                            result,
                        }));
                        self.set_obj_type(obj, fn_ty);
                        iface_methods.push(InterfaceMethod {
                            name: sig.name.name.clone(),
                            obj,
                        });
                    }
                    self.arena.intern(Type::Interface {
                        methods: iface_methods,
                    })
                }
            }
            ExprKind::Index { x, index } => {
                let args = vec![self.resolve_type(index)];
                self.resolve_type_instance(e, x, args)
            }
            ExprKind::IndexList { x, indices } => {
                let args = indices.iter().map(|ix| self.resolve_type(ix)).collect();
                self.resolve_type_instance(e, x, args)
            }
            ExprKind::Selector { x, sel } => {
                // Qualified type: pkg.Type
                if let ExprKind::Name(pkg_ident) = &x.kind {
                    if let Some(obj) = self.lookup(&pkg_ident.name) {
                        if let ObjKind::Package(pkg_id) = self.obj(obj).kind {
                            self.info.uses.insert(pkg_ident.id, obj);
                            self.info.exprs.insert(
                                x.id,
                                ExprInfo::value(self.arena.invalid()),
                            );
                            if let Some(type_obj) =
                                self.pkg_scopes[pkg_id.0 as usize].get(&sel.name).copied()
                            {
                                if self.obj(type_obj).kind == ObjKind::TypeName {
                                    self.info.uses.insert(sel.id, type_obj);
                                    return self.obj(type_obj).ty;
                                }
                            }
                            self.error(CheckError::Undefined {
                                name: format!("{}.{}", pkg_ident.name, sel.name),
                                span: sel.span,
                            });
                            return self.arena.invalid();
                        }
                    }
                }
                self.error(CheckError::NotAType {
                    name: "selector expression".into(),
                    span: e.span,
                });
                self.arena.invalid()
            }
            _ => {
                self.error(CheckError::NotAType {
                    name: "expression".into(),
                    span: e.span,
                });
                self.arena.invalid()
            }
        }
    }

    fn resolve_type_name(&mut self, ident: &ast::Ident) -> TypeId {
        match self.lookup(&ident.name) {
            Some(obj) => {
                self.info.uses.insert(ident.id, obj);
                match &self.obj(obj).kind {
                    ObjKind::TypeName => self.obj(obj).ty,
                    ObjKind::TypeParam { .. } => self.obj(obj).ty,
                    _ => {
                        self.error(CheckError::NotAType {
                            name: ident.name.clone(),
                            span: ident.span,
                        });
                        self.arena.invalid()
                    }
                }
            }
            None => {
                self.error(CheckError::Undefined {
                    name: ident.name.clone(),
                    span: ident.span,
                });
                self.arena.invalid()
            }
        }
    }

    fn resolve_type_instance(&mut self, whole: &Expr, base: &Expr, args: Vec<TypeId>) -> TypeId {
        let base_ty = self.resolve_type_inner(base);
        self.info.exprs.insert(
            base.id,
            ExprInfo {
                ty: base_ty,
                is_nil: false,
                is_type: true,
                is_builtin: false,
            },
        );
        match self.arena.get(base_ty).clone() {
            Type::Named { obj, .. } => self.arena.intern(Type::Named { obj, args }),
            Type::Invalid => self.arena.invalid(),
            _ => {
                self.error(CheckError::NotAType {
                    name: "instantiation".into(),
                    span: whole.span,
                });
                self.arena.invalid()
            }
        }
    }

    fn const_int(e: &Expr) -> Option<i64> {
        match &e.kind {
            ExprKind::BasicLit {
                kind: LitKind::Int,
                value,
            } => {
                if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                    i64::from_str_radix(hex, 16).ok()
                } else {
                    value.parse().ok()
                }
            }
            ExprKind::Paren(inner) => Self::const_int(inner),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Pass 3: initializers and bodies
    // ------------------------------------------------------------------

    fn check_bodies(&mut self) {
        // Global initializers first, in source order; references to
        // later globals force their spec on demand.
        for p in 0..self.packages.len() {
            for f in 0..self.packages[p].files.len() {
                let file_idx = self.packages[p].files[f];
                let mut value_locs: Vec<DeclLoc> = Vec::new();
                for (d, decl) in self.files[file_idx].ast.decls.iter().enumerate() {
                    if let ast::Decl::Gen { specs, .. } = decl {
                        for (s, spec) in specs.iter().enumerate() {
                            if matches!(spec, ast::Spec::Value(_)) {
                                value_locs.push(DeclLoc {
                                    file: file_idx,
                                    decl: d,
                                    spec: s,
                                });
                            }
                        }
                    }
                }
                for loc in value_locs {
                    self.ensure_value_spec(loc);
                }
            }
        }

        for p in 0..self.packages.len() {
            let pkg_id = self.packages[p].id;
            for f in 0..self.packages[p].files.len() {
                let file_idx = self.packages[p].files[f];
                self.cur_pkg = pkg_id;
                self.cur_file = file_idx;
                let mut func_locs: Vec<DeclLoc> = Vec::new();
                for (d, decl) in self.files[file_idx].ast.decls.iter().enumerate() {
                    if matches!(decl, ast::Decl::Func(_)) {
                        func_locs.push(DeclLoc {
                            file: file_idx,
                            decl: d,
                            spec: 0,
                        });
                    }
                }
                for loc in func_locs {
                    self.check_func_body(loc);
                }
            }
        }
    }

    fn pkg_of_file(&self, file_idx: usize) -> PkgId {
        for pkg in &self.packages {
            if pkg.files.contains(&file_idx) {
                return pkg.id;
            }
        }
        self.main_pkg
    }

    fn ensure_value_spec(&mut self, loc: DeclLoc) {
        let spec = match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Gen { specs, .. } => match &specs[loc.spec] {
                ast::Spec::Value(spec) => spec.clone(),
                _ => return,
            },
            _ => return,
        };
        let first_obj = match spec.names.first().and_then(|n| self.info.defs.get(&n.id)) {
            Some(obj) => *obj,
            None => return,
        };
        if self.obj(first_obj).ty != self.arena.invalid() {
            return;
        }
        if !self.value_in_progress.insert(first_obj) {
            self.error(CheckError::InitCycle {
                name: spec.names[0].name.clone(),
                span: spec.names[0].span,
            });
            return;
        }

        let saved_pkg = self.cur_pkg;
        let saved_file = self.cur_file;
        let saved_locals = std::mem::take(&mut self.locals);
        self.cur_file = loc.file;
        self.cur_pkg = self.pkg_of_file(loc.file);

        let declared = spec.ty.as_ref().map(|t| self.resolve_type(t));
        if let Some(ty) = declared {
            for value in &spec.values {
                self.check_expr(value, Some(ty));
            }
            for name in &spec.names {
                if let Some(obj) = self.info.defs.get(&name.id).copied() {
                    self.set_obj_type(obj, ty);
                }
            }
        } else if spec.values.len() == spec.names.len() {
            for (name, value) in spec.names.iter().zip(spec.values.iter()) {
                let ty = self.check_expr(value, None);
                if let Some(obj) = self.info.defs.get(&name.id).copied() {
                    self.set_obj_type(obj, ty);
                }
            }
        } else if spec.values.is_empty() {
            self.error(CheckError::MissingInit {
                name: spec.names[0].name.clone(),
                span: spec.names[0].span,
            });
        } else {
            self.error(CheckError::Unsupported {
                what: "multi-value initialization".into(),
                span: spec.names[0].span,
            });
        }

        self.locals = saved_locals;
        self.cur_pkg = saved_pkg;
        self.cur_file = saved_file;
        self.value_in_progress.remove(&first_obj);
    }

    fn check_func_body(&mut self, loc: DeclLoc) {
        let decl = match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Func(decl) => decl.clone(),
            _ => return,
        };
        let body = match &decl.body {
            Some(body) => body.clone(),
            None => return,
        };
        let func_obj = match self.info.defs.get(&decl.name.id).copied() {
            Some(obj) => obj,
            None => return,
        };
        let sig = match self.arena.get(self.obj(func_obj).ty).clone() {
            Type::Func(sig) => sig,
            _ => return,
        };

        self.locals.push(HashMap::new());

        // Receiver clause type parameters and the function's own ones
        // were declared during signature resolution; rebind them here by
        // walking the AST again so body lookups see them.
        if let Some(recv) = &decl.recv {
            for ident in Self::receiver_param_names(&recv.ty) {
                if let Some(obj) = self.info.defs.get(&ident.id).copied() {
                    if let Some(scope) = self.locals.last_mut() {
                        scope.insert(ident.name.clone(), obj);
                    }
                }
            }
        }
        for param in &decl.type_params {
            if let Some(obj) = self.info.defs.get(&param.name.id).copied() {
                if let Some(scope) = self.locals.last_mut() {
                    scope.insert(param.name.name.clone(), obj);
                }
            }
        }

        if let (Some(recv), Some(recv_info)) = (&decl.recv, &sig.recv) {
            self.declare_local(&recv.name, ObjKind::Var, recv_info.ty);
        }
        let mut param_idents: Vec<ast::Ident> = Vec::new();
        for group in &decl.params {
            param_idents.extend(group.names.iter().cloned());
        }
        for (ident, info) in param_idents.iter().zip(sig.params.iter()) {
            self.declare_local(ident, ObjKind::Var, info.ty);
        }

        let saved_result = self.cur_result;
        self.cur_result = sig.result;
        self.check_block(&body);
        self.cur_result = saved_result;

        self.locals.pop();
    }

    fn check_block(&mut self, block: &ast::Block) {
        self.locals.push(HashMap::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.locals.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.check_expr(e, None);
            }
            StmtKind::IncDec { x, .. } => {
                self.check_expr(x, None);
            }
            StmtKind::Assign { op, lhs, rhs } => {
                if *op == ast::AssignOp::Define {
                    if lhs.len() == rhs.len() {
                        for (l, r) in lhs.iter().zip(rhs.iter()) {
                            let ty = self.check_expr(r, None);
                            if let ExprKind::Name(ident) = &l.kind {
                                let obj = self.declare_local(ident, ObjKind::Var, ty);
                                self.info.exprs.insert(l.id, ExprInfo::value(ty));
                                self.info.uses.insert(ident.id, obj);
                            } else {
                                self.check_expr(l, None);
                            }
                        }
                    } else {
                        for r in rhs {
                            self.check_expr(r, None);
                        }
                        for l in lhs {
                            if let ExprKind::Name(ident) = &l.kind {
                                self.declare_local(ident, ObjKind::Var, self.arena.invalid());
                            }
                        }
                    }
                } else {
                    for l in lhs {
                        self.check_expr(l, None);
                    }
                    let expected = if lhs.len() == 1 {
                        Some(self.program_expr_ty(lhs[0].id))
                    } else {
                        None
                    };
                    for r in rhs {
                        self.check_expr(r, expected);
                    }
                }
            }
            StmtKind::Return(results) => {
                let expected = self.cur_result;
                for r in results {
                    self.check_expr(r, expected);
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::If {
                init,
                cond,
                body,
                els,
            } => {
                self.locals.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                self.check_expr(cond, Some(self.arena.bool()));
                self.check_block(body);
                if let Some(els) = els {
                    self.check_stmt(els);
                }
                self.locals.pop();
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.locals.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond, Some(self.arena.bool()));
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.check_block(body);
                self.locals.pop();
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                self.locals.push(HashMap::new());
                let seq_ty = self.check_expr(x, None);
                let elem = self.range_elem(seq_ty, x.span);
                if *define {
                    if let Some(key) = key {
                        if let ExprKind::Name(ident) = &key.kind {
                            let int = self.arena.int();
                            let obj = self.declare_local(ident, ObjKind::Var, int);
                            self.info.uses.insert(ident.id, obj);
                            self.info.exprs.insert(key.id, ExprInfo::value(int));
                        }
                    }
                    if let Some(value) = value {
                        if let ExprKind::Name(ident) = &value.kind {
                            let obj = self.declare_local(ident, ObjKind::Var, elem);
                            self.info.uses.insert(ident.id, obj);
                            self.info.exprs.insert(value.id, ExprInfo::value(elem));
                        }
                    }
                } else {
                    if let Some(key) = key {
                        self.check_expr(key, None);
                    }
                    if let Some(value) = value {
                        self.check_expr(value, None);
                    }
                }
                self.check_block(body);
                self.locals.pop();
            }
        }
    }

    fn program_expr_ty(&self, id: NodeId) -> TypeId {
        self.info
            .exprs
            .get(&id)
            .map(|i| i.ty)
            .unwrap_or(self.arena.invalid())
    }

    fn range_elem(&mut self, seq_ty: TypeId, span: Span) -> TypeId {
        let resolved = self.underlying_of(seq_ty);
        match self.arena.get(resolved).clone() {
            Type::Array { elem, .. } => elem,
            Type::Slice { elem } => elem,
            Type::String => self.arena.byte(),
            Type::Invalid => self.arena.invalid(),
            _ => {
                let ty = self.type_str(seq_ty);
                self.error(CheckError::BadRange { ty, span });
                self.arena.invalid()
            }
        }
    }

    fn type_str(&self, id: TypeId) -> String {
        crate::types::type_string(&self.arena, &self.objects, id)
    }

    /// Chase a named type (instantiating its parameters) to a structural
    /// type; pointers are not followed.
    fn underlying_of(&mut self, ty: TypeId) -> TypeId {
        match self.arena.get(ty).clone() {
            Type::Named { obj, args } => {
                let under = match self.info.underlying.get(&obj) {
                    Some(u) => *u,
                    None => return self.arena.invalid(),
                };
                if args.is_empty() {
                    under
                } else {
                    let params = self.info.spec_params.get(&obj).cloned().unwrap_or_default();
                    let map: HashMap<ObjId, TypeId> =
                        params.into_iter().zip(args.into_iter()).collect();
                    let substituted = self.subst(under, &map);
                    self.underlying_of(substituted)
                }
            }
            _ => ty,
        }
    }

    fn subst(&mut self, ty: TypeId, map: &HashMap<ObjId, TypeId>) -> TypeId {
        if map.is_empty() {
            return ty;
        }
        match self.arena.get(ty).clone() {
            Type::TypeParam(obj) => map.get(&obj).copied().unwrap_or(ty),
            Type::Pointer(elem) => {
                let elem = self.subst(elem, map);
                self.arena.intern(Type::Pointer(elem))
            }
            Type::Array { elem, len } => {
                let elem = self.subst(elem, map);
                self.arena.intern(Type::Array { elem, len })
            }
            Type::Slice { elem } => {
                let elem = self.subst(elem, map);
                self.arena.intern(Type::Slice { elem })
            }
            Type::Named { obj, args } => {
                let args = args.into_iter().map(|a| self.subst(a, map)).collect();
                self.arena.intern(Type::Named { obj, args })
            }
            Type::Func(sig) => {
                let sig = self.subst_signature(&sig, map);
                self.arena.intern(Type::Func(sig))
            }
            _ => ty,
        }
    }

    fn subst_signature(&mut self, sig: &Signature, map: &HashMap<ObjId, TypeId>) -> Signature {
        Signature {
            recv: sig.recv.as_ref().map(|p| ParamInfo {
                name: p.name.clone(),
                ty: self.subst(p.ty, map),
            }),
            type_params: sig
                .type_params
                .iter()
                .filter(|p| !map.contains_key(*p))
                .copied()
                .collect(),
            params: sig
                .params
                .iter()
                .map(|p| ParamInfo {
                    name: p.name.clone(),
                    ty: self.subst(p.ty, map),
                })
                .collect(),
            result: sig.result.map(|r| self.subst(r, map)),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn record(&mut self, e: &Expr, info: ExprInfo) -> TypeId {
        self.info.exprs.insert(e.id, info);
        info.ty
    }

    fn check_expr(&mut self, e: &Expr, expected: Option<TypeId>) -> TypeId {
        match &e.kind {
            ExprKind::Name(ident) => self.check_name(e, ident),
            ExprKind::BasicLit { kind, .. } => {
                let ty = match kind {
                    LitKind::Int => {
                        // Integer literals adapt to an expected float
                        // context.
                        match expected.map(|t| self.arena.get(t).clone()) {
                            Some(Type::Float) => self.arena.float(),
                            Some(Type::Byte) => self.arena.byte(),
                            _ => self.arena.int(),
                        }
                    }
                    LitKind::Float => self.arena.float(),
                    LitKind::Str => self.arena.string(),
                    LitKind::Char => self.arena.byte(),
                };
                self.record(e, ExprInfo::value(ty))
            }
            ExprKind::FuncLit(lit) => {
                let params = self.resolve_param_groups(&lit.params);
                let result = lit.result.as_ref().map(|r| self.resolve_type(r));
                let sig = Signature {
                    recv: None,
                    type_params: vec![],
                    params: params.clone(),
                    result,
                };

                self.locals.push(HashMap::new());
                let mut idents: Vec<ast::Ident> = Vec::new();
                for group in &lit.params {
                    idents.extend(group.names.iter().cloned());
                }
                for (ident, info) in idents.iter().zip(params.iter()) {
                    self.declare_local(ident, ObjKind::Var, info.ty);
                }
                let saved_result = self.cur_result;
                self.cur_result = sig.result;
                self.check_block(&lit.body);
                self.cur_result = saved_result;
                self.locals.pop();

                let ty = self.arena.intern(Type::Func(sig));
                self.record(e, ExprInfo::value(ty))
            }
            ExprKind::CompositeLit { ty, elems } => self.check_composite(e, ty.as_deref(), elems, expected),
            ExprKind::KeyValue { value, .. } => {
                // Only reached for non-struct keyed literals; type the
                // value side and let the writer reject the form.
                let ty = self.check_expr(value, None);
                self.record(e, ExprInfo::value(ty))
            }
            ExprKind::Paren(inner) => {
                let ty = self.check_expr(inner, expected);
                let info = self.info.exprs.get(&inner.id).copied().unwrap_or(ExprInfo::value(ty));
                self.record(e, info)
            }
            ExprKind::Selector { x, sel } => self.check_selector(e, x, sel),
            ExprKind::Index { x, index } => self.check_index(e, x, index),
            ExprKind::IndexList { x, indices } => self.check_index_list(e, x, indices),
            ExprKind::Call { func, args } => self.check_call(e, func, args),
            ExprKind::Star(inner) => {
                let inner_ty = self.check_expr(inner, None);
                let inner_info = self.info.exprs.get(&inner.id).copied();
                if inner_info.map_or(false, |i| i.is_type) {
                    let ptr = self.arena.intern(Type::Pointer(inner_ty));
                    return self.record(
                        e,
                        ExprInfo {
                            ty: ptr,
                            is_nil: false,
                            is_type: true,
                            is_builtin: false,
                        },
                    );
                }
                match self.arena.get(inner_ty).clone() {
                    Type::Pointer(elem) => self.record(e, ExprInfo::value(elem)),
                    Type::Invalid => self.record(e, ExprInfo::value(self.arena.invalid())),
                    _ => {
                        self.error(CheckError::BadDeref { span: e.span });
                        self.record(e, ExprInfo::value(self.arena.invalid()))
                    }
                }
            }
            ExprKind::Unary { op, x } => {
                let ty = self.check_expr(x, expected);
                let result = match op {
                    ast::UnaryOp::Not => self.arena.bool(),
                    ast::UnaryOp::Addr => self.arena.intern(Type::Pointer(ty)),
                    ast::UnaryOp::Pos | ast::UnaryOp::Neg => ty,
                };
                self.record(e, ExprInfo::value(result))
            }
            ExprKind::Binary { op, x, y } => {
                let xt = self.check_expr(x, expected);
                let hint = if matches!(self.arena.get(xt), Type::Invalid) {
                    expected
                } else {
                    Some(xt)
                };
                self.check_expr(y, hint);
                let result = if op.is_comparison()
                    || matches!(op, ast::BinaryOp::LogAnd | ast::BinaryOp::LogOr)
                {
                    self.arena.bool()
                } else {
                    xt
                };
                self.record(e, ExprInfo::value(result))
            }
            // Type syntax reached in expression position: a conversion
            // callee or an instantiation argument.
            ExprKind::ArrayType { .. }
            | ExprKind::SliceType { .. }
            | ExprKind::FuncType(_)
            | ExprKind::StructType { .. }
            | ExprKind::InterfaceType { .. } => {
                let ty = self.resolve_type_inner(e);
                self.record(
                    e,
                    ExprInfo {
                        ty,
                        is_nil: false,
                        is_type: true,
                        is_builtin: false,
                    },
                )
            }
        }
    }

    fn check_name(&mut self, e: &Expr, ident: &ast::Ident) -> TypeId {
        let obj = match self.lookup(&ident.name) {
            Some(obj) => obj,
            None => {
                self.error(CheckError::Undefined {
                    name: ident.name.clone(),
                    span: ident.span,
                });
                return self.record(e, ExprInfo::value(self.arena.invalid()));
            }
        };
        self.info.uses.insert(ident.id, obj);
        let info = match &self.obj(obj).kind {
            ObjKind::Nil => ExprInfo {
                ty: self.arena.invalid(),
                is_nil: true,
                is_type: false,
                is_builtin: false,
            },
            ObjKind::Builtin => ExprInfo {
                ty: self.arena.invalid(),
                is_nil: false,
                is_type: false,
                is_builtin: true,
            },
            ObjKind::TypeName | ObjKind::TypeParam { .. } => ExprInfo {
                ty: self.obj(obj).ty,
                is_nil: false,
                is_type: true,
                is_builtin: false,
            },
            ObjKind::Package(_) => ExprInfo::value(self.arena.invalid()),
            ObjKind::Var | ObjKind::Const | ObjKind::Func | ObjKind::Field { .. } => {
                let mut ty = self.obj(obj).ty;
                if ty == self.arena.invalid() {
                    // A global referenced before its spec was reached.
                    if let Some(loc) = self.info.value_specs.get(&obj).copied() {
                        self.ensure_value_spec(loc);
                        ty = self.obj(obj).ty;
                    }
                }
                ExprInfo::value(ty)
            }
        };
        self.record(e, info)
    }

    fn check_selector(&mut self, e: &Expr, x: &Expr, sel: &ast::Ident) -> TypeId {
        // Package-qualified reference?
        if let ExprKind::Name(pkg_ident) = &x.kind {
            if let Some(obj) = self.lookup(&pkg_ident.name) {
                if let ObjKind::Package(pkg_id) = self.obj(obj).kind {
                    self.info.uses.insert(pkg_ident.id, obj);
                    self.info
                        .exprs
                        .insert(x.id, ExprInfo::value(self.arena.invalid()));
                    match self.pkg_scopes[pkg_id.0 as usize].get(&sel.name).copied() {
                        Some(target) => {
                            self.info.uses.insert(sel.id, target);
                            let info = match &self.obj(target).kind {
                                ObjKind::TypeName => ExprInfo {
                                    ty: self.obj(target).ty,
                                    is_nil: false,
                                    is_type: true,
                                    is_builtin: false,
                                },
                                _ => {
                                    let mut ty = self.obj(target).ty;
                                    if ty == self.arena.invalid() {
                                        if let Some(loc) =
                                            self.info.value_specs.get(&target).copied()
                                        {
                                            self.ensure_value_spec(loc);
                                            ty = self.obj(target).ty;
                                        }
                                    }
                                    ExprInfo::value(ty)
                                }
                            };
                            return self.record(e, info);
                        }
                        None => {
                            self.error(CheckError::Undefined {
                                name: format!("{}.{}", pkg_ident.name, sel.name),
                                span: sel.span,
                            });
                            return self.record(e, ExprInfo::value(self.arena.invalid()));
                        }
                    }
                }
            }
        }

        let x_ty = self.check_expr(x, None);
        let mut base = x_ty;
        if let Type::Pointer(elem) = self.arena.get(base).clone() {
            base = elem;
        }

        match self.arena.get(base).clone() {
            Type::Named { obj, args } => {
                let map: HashMap<ObjId, TypeId> = if args.is_empty() {
                    HashMap::new()
                } else {
                    self.info.spec_params
                        .get(&obj)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .zip(args.into_iter())
                        .collect()
                };
                // Field?
                if let Some(fields) = self.info.struct_fields.get(&obj).cloned() {
                    for field in fields {
                        if self.obj(field).name == sel.name {
                            self.info.uses.insert(sel.id, field);
                            let ty = self.obj(field).ty;
                            let ty = self.subst(ty, &map);
                            return self.record(e, ExprInfo::value(ty));
                        }
                    }
                }
                // Method?
                if let Some(method) = self.info.methods.get(&(obj, sel.name.clone())).copied() {
                    self.info.uses.insert(sel.id, method);
                    let sig = match self.arena.get(self.obj(method).ty).clone() {
                        Type::Func(sig) => sig,
                        _ => {
                            return self.record(e, ExprInfo::value(self.arena.invalid()));
                        }
                    };
                    // Bind the receiver's type parameters to the actual
                    // instantiation.
                    let recv_map: HashMap<ObjId, TypeId> = {
                        let mut m = HashMap::new();
                        if let Some(recv) = &sig.recv {
                            // Pointer receivers nest the named type.
                            let named = match self.arena.get(recv.ty).clone() {
                                Type::Pointer(elem) => elem,
                                _ => recv.ty,
                            };
                            if let Type::Named { args: declared, .. } =
                                self.arena.get(named).clone()
                            {
                                let actual: Vec<TypeId> = match self.arena.get(base).clone() {
                                    Type::Named { args, .. } => args,
                                    _ => vec![],
                                };
                                for (d, a) in declared.iter().zip(actual.iter()) {
                                    if let Type::TypeParam(p) = self.arena.get(*d).clone() {
                                        m.insert(p, *a);
                                    }
                                }
                            }
                        }
                        m
                    };
                    let sig = self.subst_signature(&sig, &recv_map);
                    let ty = self.arena.intern(Type::Func(sig));
                    return self.record(e, ExprInfo::value(ty));
                }
                let ty_str = self.type_str(x_ty);
                self.error(CheckError::NoFieldOrMethod {
                    ty: ty_str,
                    name: sel.name.clone(),
                    span: sel.span,
                });
                self.record(e, ExprInfo::value(self.arena.invalid()))
            }
            Type::TypeParam(param_obj) => {
                // Dispatch through the constraint interface.
                let constraint = match &self.obj(param_obj).kind {
                    ObjKind::TypeParam { constraint } => *constraint,
                    _ => None,
                };
                let method = constraint.and_then(|c| {
                    let resolved = self.constraint_interface(c);
                    match self.arena.get(resolved).clone() {
                        Type::Interface { methods } => methods
                            .into_iter()
                            .find(|m| m.name == sel.name)
                            .map(|m| m.obj),
                        _ => None,
                    }
                });
                match method {
                    Some(method) => {
                        self.info.uses.insert(sel.id, method);
                        let ty = self.obj(method).ty;
                        self.record(e, ExprInfo::value(ty))
                    }
                    None => {
                        let ty_str = self.type_str(x_ty);
                        self.error(CheckError::NoFieldOrMethod {
                            ty: ty_str,
                            name: sel.name.clone(),
                            span: sel.span,
                        });
                        self.record(e, ExprInfo::value(self.arena.invalid()))
                    }
                }
            }
            Type::Invalid => self.record(e, ExprInfo::value(self.arena.invalid())),
            _ => {
                let ty_str = self.type_str(x_ty);
                self.error(CheckError::NoFieldOrMethod {
                    ty: ty_str,
                    name: sel.name.clone(),
                    span: sel.span,
                });
                self.record(e, ExprInfo::value(self.arena.invalid()))
            }
        }
    }

    /// Resolve a constraint type to its interface, through named
    /// constraints like `Increr[T]`.
    fn constraint_interface(&mut self, constraint: TypeId) -> TypeId {
        match self.arena.get(constraint).clone() {
            Type::Interface { .. } => constraint,
            Type::Named { .. } => self.underlying_of(constraint),
            _ => self.arena.invalid(),
        }
    }

    fn check_index(&mut self, e: &Expr, x: &Expr, index: &Expr) -> TypeId {
        let x_ty = self.check_expr(x, None);
        let x_info = self.info.exprs.get(&x.id).copied();

        // Explicit instantiation of a generic function or type.
        if let Some(info) = x_info {
            if info.is_type {
                let arg = self.resolve_type(index);
                let inst = match self.arena.get(x_ty).clone() {
                    Type::Named { obj, .. } => self.arena.intern(Type::Named {
                        obj,
                        args: vec![arg],
                    }),
                    _ => self.arena.invalid(),
                };
                return self.record(
                    e,
                    ExprInfo {
                        ty: inst,
                        is_nil: false,
                        is_type: true,
                        is_builtin: false,
                    },
                );
            }
            if let Type::Func(sig) = self.arena.get(x_ty).clone() {
                if !sig.type_params.is_empty() {
                    let arg = self.resolve_type(index);
                    return self.instantiate_func(e, x, sig, vec![arg]);
                }
            }
        }

        self.check_expr(index, Some(self.arena.int()));
        let mut base = x_ty;
        if let Type::Pointer(elem) = self.arena.get(base).clone() {
            base = elem;
        }
        let resolved = self.underlying_of(base);
        let elem = match self.arena.get(resolved).clone() {
            Type::Array { elem, .. } => elem,
            Type::Slice { elem } => elem,
            Type::String => self.arena.byte(),
            Type::Invalid => self.arena.invalid(),
            _ => {
                let ty = self.type_str(x_ty);
                self.error(CheckError::BadIndex { ty, span: e.span });
                self.arena.invalid()
            }
        };
        self.record(e, ExprInfo::value(elem))
    }

    fn check_index_list(&mut self, e: &Expr, x: &Expr, indices: &[Expr]) -> TypeId {
        let x_ty = self.check_expr(x, None);
        let x_info = self.info.exprs.get(&x.id).copied();
        let args: Vec<TypeId> = indices.iter().map(|ix| self.resolve_type(ix)).collect();

        if let Some(info) = x_info {
            if info.is_type {
                let inst = match self.arena.get(x_ty).clone() {
                    Type::Named { obj, .. } => self.arena.intern(Type::Named { obj, args }),
                    _ => self.arena.invalid(),
                };
                return self.record(
                    e,
                    ExprInfo {
                        ty: inst,
                        is_nil: false,
                        is_type: true,
                        is_builtin: false,
                    },
                );
            }
            if let Type::Func(sig) = self.arena.get(x_ty).clone() {
                if !sig.type_params.is_empty() {
                    return self.instantiate_func(e, x, sig, args);
                }
            }
        }
        self.record(e, ExprInfo::value(self.arena.invalid()))
    }

    fn instantiate_func(
        &mut self,
        e: &Expr,
        callee: &Expr,
        sig: Signature,
        args: Vec<TypeId>,
    ) -> TypeId {
        let map: HashMap<ObjId, TypeId> = sig
            .type_params
            .iter()
            .copied()
            .zip(args.iter().copied())
            .collect();
        if let Some(ident_id) = Self::callee_ident(callee) {
            self.info.instances.insert(ident_id, args);
        }
        let instantiated = self.subst_signature(&sig, &map);
        let ty = self.arena.intern(Type::Func(instantiated));
        self.record(e, ExprInfo::value(ty))
    }

    fn callee_ident(e: &Expr) -> Option<NodeId> {
        match &e.kind {
            ExprKind::Name(ident) => Some(ident.id),
            ExprKind::Selector { sel, .. } => Some(sel.id),
            ExprKind::Paren(inner) => Self::callee_ident(inner),
            _ => None,
        }
    }

    fn check_call(&mut self, e: &Expr, func: &Expr, args: &[Expr]) -> TypeId {
        let fn_ty = self.check_expr(func, None);
        let fn_info = self
            .info
            .exprs
            .get(&func.id)
            .copied()
            .unwrap_or(ExprInfo::value(self.arena.invalid()));

        // Conversion: the callee denotes a type.
        if fn_info.is_type {
            if args.len() != 1 {
                self.error(CheckError::WrongArgCount {
                    name: self.type_str(fn_ty),
                    span: e.span,
                });
            }
            for arg in args {
                self.check_expr(arg, Some(fn_ty));
            }
            return self.record(e, ExprInfo::value(fn_ty));
        }

        // Built-in.
        if fn_info.is_builtin {
            return self.check_builtin_call(e, func, args);
        }

        match self.arena.get(fn_ty).clone() {
            Type::Func(sig) => {
                let sig = if sig.type_params.is_empty() {
                    sig
                } else {
                    // Structural inference of the type arguments.
                    let arg_tys: Vec<TypeId> =
                        args.iter().map(|a| self.check_expr(a, None)).collect();
                    let mut bind: HashMap<ObjId, TypeId> = HashMap::new();
                    let n = sig.params.len().min(arg_tys.len());
                    for i in 0..n {
                        let p = sig.params[i].ty;
                        let a = arg_tys[i];
                        self.unify(p, a, &sig.type_params, &mut bind);
                    }
                    if sig.type_params.iter().any(|p| !bind.contains_key(p)) {
                        let name = Self::callee_name(func);
                        self.error(CheckError::CannotInfer {
                            name,
                            span: e.span,
                        });
                        return self.record(e, ExprInfo::value(self.arena.invalid()));
                    }
                    let ordered: Vec<TypeId> =
                        sig.type_params.iter().map(|p| bind[p]).collect();
                    if let Some(ident_id) = Self::callee_ident(func) {
                        self.info.instances.insert(ident_id, ordered);
                    }
                    let inst = self.subst_signature(&sig, &bind);
                    // Arguments were already checked for inference.
                    let result = inst.result.unwrap_or(self.arena.void());
                    return self.record(e, ExprInfo::value(result));
                };

                for (i, arg) in args.iter().enumerate() {
                    let expected = sig.params.get(i).map(|p| p.ty);
                    self.check_expr(arg, expected);
                }
                let result = sig.result.unwrap_or(self.arena.void());
                self.record(e, ExprInfo::value(result))
            }
            Type::Invalid => {
                for arg in args {
                    self.check_expr(arg, None);
                }
                self.record(e, ExprInfo::value(self.arena.invalid()))
            }
            _ => {
                self.error(CheckError::NotCallable { span: e.span });
                for arg in args {
                    self.check_expr(arg, None);
                }
                self.record(e, ExprInfo::value(self.arena.invalid()))
            }
        }
    }

    fn callee_name(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Name(ident) => ident.name.clone(),
            ExprKind::Selector { sel, .. } => sel.name.clone(),
            ExprKind::Paren(inner) => Self::callee_name(inner),
            ExprKind::Index { x, .. } | ExprKind::IndexList { x, .. } => Self::callee_name(x),
            _ => "function".into(),
        }
    }

    fn check_builtin_call(&mut self, e: &Expr, func: &Expr, args: &[Expr]) -> TypeId {
        let name = Self::callee_name(func);
        let result = match name.as_str() {
            "len" | "cap" | "copy" => {
                for arg in args {
                    self.check_expr(arg, None);
                }
                self.arena.int()
            }
            "append" => {
                let slice_ty = args
                    .first()
                    .map(|a| self.check_expr(a, None))
                    .unwrap_or(self.arena.invalid());
                let elem = {
                    let resolved = self.underlying_of(slice_ty);
                    match self.arena.get(resolved).clone() {
                        Type::Slice { elem } => Some(elem),
                        _ => None,
                    }
                };
                for arg in args.iter().skip(1) {
                    self.check_expr(arg, elem);
                }
                slice_ty
            }
            _ => {
                // print, println, check: anything goes, result is void.
                for arg in args {
                    self.check_expr(arg, None);
                }
                self.arena.void()
            }
        };
        self.record(e, ExprInfo::value(result))
    }

    fn check_composite(
        &mut self,
        e: &Expr,
        ty_expr: Option<&Expr>,
        elems: &[Expr],
        expected: Option<TypeId>,
    ) -> TypeId {
        let lit_ty = match ty_expr {
            Some(t) => match &t.kind {
                // `[...]T{…}` takes its length from the literal.
                ExprKind::ArrayType { len: None, elem } => {
                    let elem_ty = self.resolve_type(elem);
                    let ty = self.arena.intern(Type::Array {
                        elem: elem_ty,
                        len: elems.len() as i64,
                    });
                    self.info.exprs.insert(
                        t.id,
                        ExprInfo {
                            ty,
                            is_nil: false,
                            is_type: true,
                            is_builtin: false,
                        },
                    );
                    ty
                }
                _ => self.resolve_type(t),
            },
            None => expected.unwrap_or(self.arena.invalid()),
        };

        let resolved = self.underlying_of(lit_ty);
        match self.arena.get(resolved).clone() {
            Type::Struct { fields } => {
                let map = self.instantiation_map(lit_ty);
                let keyed = elems
                    .first()
                    .map_or(false, |e| matches!(e.kind, ExprKind::KeyValue { .. }));
                if keyed {
                    for elem in elems {
                        if let ExprKind::KeyValue { key, value } = &elem.kind {
                            let field = match &key.kind {
                                ExprKind::Name(ident) => {
                                    let found = fields
                                        .iter()
                                        .copied()
                                        .find(|f| self.obj(*f).name == ident.name);
                                    if let Some(f) = found {
                                        self.info.uses.insert(ident.id, f);
                                        self.info
                                            .exprs
                                            .insert(key.id, ExprInfo::value(self.obj(f).ty));
                                    } else {
                                        self.error(CheckError::NoFieldOrMethod {
                                            ty: self.type_str(lit_ty),
                                            name: ident.name.clone(),
                                            span: ident.span,
                                        });
                                    }
                                    found
                                }
                                _ => None,
                            };
                            let expected_ty = field.map(|f| {
                                let ty = self.obj(f).ty;
                                self.subst(ty, &map)
                            });
                            let vt = self.check_expr(value, expected_ty);
                            self.info.exprs.insert(elem.id, ExprInfo::value(vt));
                        } else {
                            self.check_expr(elem, None);
                        }
                    }
                } else {
                    for (i, elem) in elems.iter().enumerate() {
                        let expected_ty = fields.get(i).map(|f| {
                            let ty = self.obj(*f).ty;
                            self.subst(ty, &map)
                        });
                        self.check_expr(elem, expected_ty);
                    }
                }
            }
            Type::Array { elem, .. } | Type::Slice { elem } => {
                for item in elems {
                    self.check_expr(item, Some(elem));
                }
            }
            Type::Invalid => {
                for item in elems {
                    self.check_expr(item, None);
                }
            }
            _ => {
                for item in elems {
                    self.check_expr(item, None);
                }
            }
        }

        self.record(e, ExprInfo::value(lit_ty))
    }

    /// The parameter→argument map of an instantiated named type.
    fn instantiation_map(&mut self, ty: TypeId) -> HashMap<ObjId, TypeId> {
        match self.arena.get(ty).clone() {
            Type::Named { obj, args } if !args.is_empty() => self
                .info
                .spec_params
                .get(&obj)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .zip(args.into_iter())
                .collect(),
            _ => HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Unification for generic-call inference
    // ------------------------------------------------------------------

    fn unify(
        &mut self,
        param: TypeId,
        arg: TypeId,
        open: &[ObjId],
        bind: &mut HashMap<ObjId, TypeId>,
    ) -> bool {
        if param == arg {
            return true;
        }
        let p = self.arena.get(param).clone();
        let a = self.arena.get(arg).clone();
        match (p, a) {
            (Type::TypeParam(obj), _) if open.contains(&obj) => {
                match bind.get(&obj).copied() {
                    Some(existing) => {
                        if existing == arg {
                            true
                        } else {
                            // Numeric literal widening: int adapts to an
                            // established float binding and vice versa.
                            let ex = self.arena.get(existing).clone();
                            let at = self.arena.get(arg).clone();
                            match (ex, at) {
                                (Type::Float, Type::Int) => true,
                                (Type::Int, Type::Float) => {
                                    bind.insert(obj, arg);
                                    true
                                }
                                _ => false,
                            }
                        }
                    }
                    None => {
                        bind.insert(obj, arg);
                        true
                    }
                }
            }
            (Type::Pointer(pe), Type::Pointer(ae)) => self.unify(pe, ae, open, bind),
            (Type::Slice { elem: pe }, Type::Slice { elem: ae }) => self.unify(pe, ae, open, bind),
            (Type::Array { elem: pe, len: pl }, Type::Array { elem: ae, len: al }) => {
                pl == al && self.unify(pe, ae, open, bind)
            }
            (
                Type::Named {
                    obj: po,
                    args: pargs,
                },
                Type::Named {
                    obj: ao,
                    args: aargs,
                },
            ) => {
                po == ao
                    && pargs.len() == aargs.len()
                    && pargs
                        .into_iter()
                        .zip(aargs.into_iter())
                        .all(|(p, a)| self.unify(p, a, open, bind))
            }
            (Type::Float, Type::Int) => true,
            (Type::Func(_), Type::Func(_)) => true,
            (Type::Interface { .. }, _) => true,
            (_, Type::Invalid) => true,
            _ => false,
        }
    }
}

