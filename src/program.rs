//! The checked program handed to the backend: parsed files, packages in
//! topological order, the type arena and object table, and the semantic
//! info store. Read-only once built.

use crate::ast;
use crate::ast::{FileId, Span};
use crate::errors::Position;
use crate::types::{
    DeclLoc, ExprInfo, Info, ObjId, Object, PkgId, Signature, Type, TypeArena, TypeId,
};
use std::path::PathBuf;

/// One loaded source file with its parse tree and line table.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub src: String,
    /// Byte offset of each line start; index 0 is line 1.
    pub line_starts: Vec<u32>,
    pub ast: ast::File,
}

impl SourceFile {
    pub fn line_starts_of(src: &str) -> Vec<u32> {
        let mut starts = vec![0u32];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        starts
    }
}

/// A package: a directory of source files sharing one name.
#[derive(Debug)]
pub struct Package {
    pub id: PkgId,
    pub name: String,
    /// Import path, `""` for the main package.
    pub path: String,
    /// Indices into `Program::files`.
    pub files: Vec<usize>,
}

#[derive(Debug)]
pub struct Program {
    pub files: Vec<SourceFile>,
    /// Topological order, leaves first; the main package is last.
    pub packages: Vec<Package>,
    pub main_pkg: PkgId,
    pub arena: TypeArena,
    pub objects: Vec<Object>,
    pub info: Info,
}

impl Program {
    pub fn obj(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        self.arena.get(id)
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id.0 as usize]
    }

    /// Resolve a span to `file:line:col`.
    pub fn position(&self, span: Span) -> Position {
        let file = self.file(span.file);
        let (line, col) = Self::line_col(&file.line_starts, span.start);
        Position {
            path: file.path.display().to_string(),
            line,
            col,
        }
    }

    /// 1-based line of a span start, for literal layout decisions.
    pub fn line_of(&self, span: Span) -> u32 {
        let file = self.file(span.file);
        Self::line_col(&file.line_starts, span.start).0
    }

    fn line_col(line_starts: &[u32], offset: u32) -> (u32, u32) {
        let line = match line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line as u32 + 1, offset - line_starts[line] + 1)
    }

    /// Expression facts for a node; unresolved nodes read as invalid.
    pub fn expr_info(&self, id: ast::NodeId) -> ExprInfo {
        self.info
            .exprs
            .get(&id)
            .copied()
            .unwrap_or(ExprInfo::value(self.arena.invalid()))
    }

    pub fn use_of(&self, id: ast::NodeId) -> Option<ObjId> {
        self.info.uses.get(&id).copied()
    }

    pub fn def_of(&self, id: ast::NodeId) -> Option<ObjId> {
        self.info.defs.get(&id).copied()
    }

    /// Signature of a function object, if it has one.
    pub fn signature_of(&self, obj: ObjId) -> Option<&Signature> {
        match self.ty(self.obj(obj).ty) {
            Type::Func(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn type_spec(&self, loc: DeclLoc) -> &ast::TypeSpec {
        match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Gen { specs, .. } => match &specs[loc.spec] {
                ast::Spec::Type(spec) => spec,
                _ => panic!("declaration location is not a type spec"),
            },
            _ => panic!("declaration location is not a gen decl"),
        }
    }

    pub fn value_spec(&self, loc: DeclLoc) -> &ast::ValueSpec {
        match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Gen { specs, .. } => match &specs[loc.spec] {
                ast::Spec::Value(spec) => spec,
                _ => panic!("declaration location is not a value spec"),
            },
            _ => panic!("declaration location is not a gen decl"),
        }
    }

    pub fn func_decl(&self, loc: DeclLoc) -> &ast::FuncDecl {
        match &self.files[loc.file].ast.decls[loc.decl] {
            ast::Decl::Func(decl) => decl,
            _ => panic!("declaration location is not a function"),
        }
    }

    /// Render a type for diagnostics.
    pub fn type_string(&self, id: TypeId) -> String {
        crate::types::type_string(&self.arena, &self.objects, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_starts() {
        let starts = SourceFile::line_starts_of("ab\ncd\n\nx");
        assert_eq!(starts, vec![0, 3, 6, 7]);
    }

    #[test]
    fn line_col_lookup() {
        let starts = vec![0u32, 3, 6, 7];
        assert_eq!(Program::line_col(&starts, 0), (1, 1));
        assert_eq!(Program::line_col(&starts, 4), (2, 2));
        assert_eq!(Program::line_col(&starts, 6), (3, 1));
        assert_eq!(Program::line_col(&starts, 7), (4, 1));
    }
}
