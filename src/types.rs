//! Semantic model: interned types, the object table, and the info store
//! the checker fills in for the backend.
//!
//! Types are interned into an arena so that identity comparison and cache
//! keying are integer comparisons; structurally equal types share one
//! `TypeId`.

use crate::ast::{NodeId, Span};
use std::collections::HashMap;

/// Index into the type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Index into the object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub u32);

/// Index into the package list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PkgId(pub u32);

/// One parameter of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeId,
}

/// A function or method signature. Methods carry their receiver as an
/// explicit leading parameter; constraint-interface methods have a
/// receiver of invalid type (no coercion applies).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub recv: Option<ParamInfo>,
    pub type_params: Vec<ObjId>,
    pub params: Vec<ParamInfo>,
    pub result: Option<TypeId>,
}

/// One method of an interface constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    pub name: String,
    pub obj: ObjId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Placeholder for unresolved or erroneous expressions; also the type
    /// of package qualifiers, which the writer elides.
    Invalid,
    /// The absence of a result.
    Void,
    Bool,
    Int,
    Float,
    Byte,
    String,
    Pointer(TypeId),
    /// A declared named type, possibly instantiated.
    Named { obj: ObjId, args: Vec<TypeId> },
    /// A type parameter in scope.
    TypeParam(ObjId),
    Array { elem: TypeId, len: i64 },
    Slice { elem: TypeId },
    Func(Signature),
    /// Interface, used only as a generic constraint.
    Interface { methods: Vec<InterfaceMethod> },
    /// Struct underlying of a named type; fields are objects so tags and
    /// ordinals stay attached.
    Struct { fields: Vec<ObjId> },
}

/// Interning arena for types.
#[derive(Debug, Default)]
pub struct TypeArena {
    types: Vec<Type>,
    dedup: HashMap<Type, TypeId>,
}

impl TypeArena {
    pub fn new() -> Self {
        let mut arena = TypeArena {
            types: Vec::new(),
            dedup: HashMap::new(),
        };
        // Pin the common types so well-known ids exist.
        arena.intern(Type::Invalid);
        arena.intern(Type::Void);
        arena.intern(Type::Bool);
        arena.intern(Type::Int);
        arena.intern(Type::Float);
        arena.intern(Type::Byte);
        arena.intern(Type::String);
        arena
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.dedup.get(&ty) {
            return *id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.dedup.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn invalid(&self) -> TypeId {
        TypeId(0)
    }

    pub fn void(&self) -> TypeId {
        TypeId(1)
    }

    pub fn bool(&self) -> TypeId {
        TypeId(2)
    }

    pub fn int(&self) -> TypeId {
        TypeId(3)
    }

    pub fn float(&self) -> TypeId {
        TypeId(4)
    }

    pub fn byte(&self) -> TypeId {
        TypeId(5)
    }

    pub fn string(&self) -> TypeId {
        TypeId(6)
    }
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    /// A declared type name (or a universe basic type).
    TypeName,
    Var,
    Const,
    Func,
    /// Struct field; `index` is the position among all fields of the
    /// struct, `tag_index` the position among exported non-embedded
    /// fields.
    Field {
        parent: ObjId,
        index: usize,
        exported: bool,
        embedded: bool,
    },
    /// A compiler built-in such as `len` or `append`.
    Builtin,
    /// An import binding; selecting through it reaches another package's
    /// scope.
    Package(PkgId),
    /// A generic type parameter with an optional constraint interface.
    TypeParam { constraint: Option<TypeId> },
    /// The `nil` sentinel.
    Nil,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    pub pkg: Option<PkgId>,
    /// For `TypeName`s the named type itself; for values their type; for
    /// functions the signature type. `Invalid` until the checker gets
    /// there.
    pub ty: TypeId,
    pub span: Span,
}

// ============================================================================
// Semantic info store
// ============================================================================

/// What the checker learned about one expression node.
#[derive(Debug, Clone, Copy)]
pub struct ExprInfo {
    pub ty: TypeId,
    pub is_nil: bool,
    /// The expression denotes a type (conversions, instantiations).
    pub is_type: bool,
    pub is_builtin: bool,
}

impl ExprInfo {
    pub fn value(ty: TypeId) -> Self {
        ExprInfo {
            ty,
            is_nil: false,
            is_type: false,
            is_builtin: false,
        }
    }
}

/// Location of a spec or declaration inside the program's file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclLoc {
    pub file: usize,
    pub decl: usize,
    pub spec: usize,
}

/// Semantic facts keyed by syntax-node identity, the interface between
/// the front end and the backend.
#[derive(Debug, Default)]
pub struct Info {
    /// Identifier that declares an object.
    pub defs: HashMap<NodeId, ObjId>,
    /// Identifier that references an object.
    pub uses: HashMap<NodeId, ObjId>,
    /// Expression facts.
    pub exprs: HashMap<NodeId, ExprInfo>,
    /// Explicit or inferred type arguments at a generic callee.
    pub instances: HashMap<NodeId, Vec<TypeId>>,
    /// Top-level type specs by their object.
    pub type_specs: HashMap<ObjId, DeclLoc>,
    /// Top-level value specs by each declared object.
    pub value_specs: HashMap<ObjId, DeclLoc>,
    /// Function declarations by their object.
    pub func_decls: HashMap<ObjId, DeclLoc>,
    /// Fields of each named struct type, in declaration order.
    pub struct_fields: HashMap<ObjId, Vec<ObjId>>,
    /// Methods of named types, by receiver type object and name.
    pub methods: HashMap<(ObjId, String), ObjId>,
    /// Underlying type of each declared named type.
    pub underlying: HashMap<ObjId, TypeId>,
    /// Declared type parameters of generic named types.
    pub spec_params: HashMap<ObjId, Vec<ObjId>>,
}

/// Human-oriented rendering of a type in source syntax, for diagnostics.
pub fn type_string(arena: &TypeArena, objects: &[Object], id: TypeId) -> String {
    match arena.get(id) {
        Type::Invalid => "invalid".to_string(),
        Type::Void => "()".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Int => "int".to_string(),
        Type::Float => "float".to_string(),
        Type::Byte => "byte".to_string(),
        Type::String => "string".to_string(),
        Type::Pointer(elem) => format!("*{}", type_string(arena, objects, *elem)),
        Type::Named { obj, args } => {
            let name = &objects[obj.0 as usize].name;
            if args.is_empty() {
                name.clone()
            } else {
                let args = args
                    .iter()
                    .map(|a| type_string(arena, objects, *a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}[{}]", name, args)
            }
        }
        Type::TypeParam(obj) => objects[obj.0 as usize].name.clone(),
        Type::Array { elem, len } => format!("[{}]{}", len, type_string(arena, objects, *elem)),
        Type::Slice { elem } => format!("[]{}", type_string(arena, objects, *elem)),
        Type::Func(sig) => {
            let params = sig
                .params
                .iter()
                .map(|p| type_string(arena, objects, p.ty))
                .collect::<Vec<_>>()
                .join(", ");
            match sig.result {
                Some(result) => {
                    format!("func({}) {}", params, type_string(arena, objects, result))
                }
                None => format!("func({})", params),
            }
        }
        Type::Interface { .. } => "interface".to_string(),
        Type::Struct { .. } => "struct".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_structural_equals() {
        let mut arena = TypeArena::new();
        let a = arena.intern(Type::Pointer(arena.int()));
        let b = arena.intern(Type::Pointer(arena.int()));
        assert_eq!(a, b);
        let c = arena.intern(Type::Pointer(arena.float()));
        assert_ne!(a, c);
    }

    #[test]
    fn well_known_ids_are_stable() {
        let arena = TypeArena::new();
        assert_eq!(arena.get(arena.int()), &Type::Int);
        assert_eq!(arena.get(arena.string()), &Type::String);
        assert_eq!(arena.get(arena.invalid()), &Type::Invalid);
    }

    #[test]
    fn type_strings() {
        let mut arena = TypeArena::new();
        let objects = vec![Object {
            name: "Point".into(),
            kind: ObjKind::TypeName,
            pkg: None,
            ty: arena.invalid(),
            span: Span::default(),
        }];
        let named = arena.intern(Type::Named {
            obj: ObjId(0),
            args: vec![],
        });
        let ptr = arena.intern(Type::Pointer(named));
        let slice = arena.intern(Type::Slice { elem: ptr });
        assert_eq!(type_string(&arena, &objects, slice), "[]*Point");
    }
}
