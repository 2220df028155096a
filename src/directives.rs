//! Doc-comment directive collection.
//!
//! One pass over every file's comments builds the per-target extern
//! maps, the `#include` preamble, and the set of shader entry points.
//! Unknown `//word:word` comments are ignored so other tools can share
//! the comment space.
//!
//! Recognized forms:
//!
//! | directive              | attaches to            | effect                         |
//! |------------------------|------------------------|--------------------------------|
//! | `//gx:include <arg>`   | file                   | deduplicated include preamble  |
//! | `//gx:externs <prefix>`| file                   | default host prefix            |
//! | `//gx:extern <name>`   | decl, spec, field, func| host symbol mapping            |
//! | `//glsl:extern <name>` | spec, method, field    | shader symbol mapping          |
//! | `//glsl:entry`         | func                   | shader entry point             |
//! | `//glsl:shader`        | func                   | synonym for `glsl:entry`       |

use crate::ast::{self, CommentGroup};
use crate::program::Program;
use crate::types::ObjId;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Which output language a piece of text is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Cpp,
    Glsl,
}

/// The extern marker that forbids emission for a target.
pub const INVALID_EXTERN: &str = "INVALID";

lazy_static! {
    static ref INCLUDE_RE: Regex = Regex::new(r"^//gx:include (.+)$").unwrap();
    static ref EXTERNS_RE: Regex = Regex::new(r"^//gx:externs (.+)$").unwrap();
    static ref EXTERN_RE: Regex = Regex::new(r"^//gx:extern (.+)$").unwrap();
    static ref GLSL_EXTERN_RE: Regex = Regex::new(r"^//glsl:extern (.+)$").unwrap();
    static ref GLSL_ENTRY_RE: Regex = Regex::new(r"^//glsl:(entry|shader)\s*$").unwrap();
}

#[derive(Debug, Default)]
pub struct Directives {
    cpp_externs: HashMap<ObjId, String>,
    glsl_externs: HashMap<ObjId, String>,
    /// Include arguments, deduplicated, in first-seen order.
    pub includes: Vec<String>,
    pub glsl_entries: HashSet<ObjId>,
}

impl Directives {
    pub fn extern_for(&self, target: Target, obj: ObjId) -> Option<&str> {
        match target {
            Target::Cpp => self.cpp_externs.get(&obj).map(|s| s.as_str()),
            Target::Glsl => self.glsl_externs.get(&obj).map(|s| s.as_str()),
        }
    }

    pub fn is_extern(&self, target: Target, obj: ObjId) -> bool {
        self.extern_for(target, obj).is_some()
    }

    fn insert(&mut self, target: Target, obj: ObjId, name: String) {
        match target {
            Target::Cpp => self.cpp_externs.insert(obj, name),
            Target::Glsl => self.glsl_externs.insert(obj, name),
        };
    }
}

fn parse_directive(re: &Regex, doc: Option<&CommentGroup>) -> Option<String> {
    let doc = doc?;
    for comment in &doc.comments {
        if let Some(captures) = re.captures(comment.text.trim_end()) {
            return Some(captures.get(1).map_or(String::new(), |m| {
                m.as_str().trim().to_string()
            }));
        }
    }
    None
}

fn matches_directive(re: &Regex, doc: Option<&CommentGroup>) -> bool {
    doc.map_or(false, |doc| {
        doc.comments
            .iter()
            .any(|c| re.is_match(c.text.trim_end()))
    })
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Field-level extern: the line comment wins over the doc comment.
fn field_extern(field: &ast::Field) -> Option<String> {
    parse_directive(&EXTERN_RE, field.line_comment.as_ref())
        .or_else(|| parse_directive(&EXTERN_RE, field.doc.as_ref()))
}

pub fn collect(program: &Program) -> Directives {
    let mut directives = Directives::default();

    for pkg in &program.packages {
        for &file_idx in &pkg.files {
            let file = &program.files[file_idx].ast;
            let file_doc = file.doc.as_ref();

            if let Some(doc) = file_doc {
                for comment in &doc.comments {
                    if let Some(captures) = INCLUDE_RE.captures(comment.text.trim_end()) {
                        let include = captures[1].trim().to_string();
                        if !directives.includes.contains(&include) {
                            directives.includes.push(include);
                        }
                    }
                }
            }
            let file_prefix = parse_directive(&EXTERNS_RE, file_doc);

            for decl in &file.decls {
                match decl {
                    ast::Decl::Gen { doc, specs } => {
                        let decl_ext = parse_directive(&EXTERN_RE, doc.as_ref());
                        let decl_glsl = parse_directive(&GLSL_EXTERN_RE, doc.as_ref());
                        for spec in specs {
                            match spec {
                                ast::Spec::Type(spec) => collect_type_spec(
                                    program,
                                    &mut directives,
                                    spec,
                                    decl_ext.as_deref(),
                                    decl_glsl.as_deref(),
                                    file_prefix.as_deref(),
                                ),
                                ast::Spec::Value(spec) => {
                                    let spec_ext =
                                        parse_directive(&EXTERN_RE, spec.doc.as_ref());
                                    let spec_glsl =
                                        parse_directive(&GLSL_EXTERN_RE, spec.doc.as_ref());
                                    for name in &spec.names {
                                        let obj = match program.def_of(name.id) {
                                            Some(obj) => obj,
                                            None => continue,
                                        };
                                        if let Some(ext) = spec_ext
                                            .as_deref()
                                            .or(decl_ext.as_deref())
                                        {
                                            directives.insert(
                                                Target::Cpp,
                                                obj,
                                                ext.to_string(),
                                            );
                                        } else if let Some(prefix) = &file_prefix {
                                            directives.insert(
                                                Target::Cpp,
                                                obj,
                                                format!("{}{}", prefix, name.name),
                                            );
                                        }
                                        if let Some(ext) =
                                            spec_glsl.as_deref().or(decl_glsl.as_deref())
                                        {
                                            directives.insert(
                                                Target::Glsl,
                                                obj,
                                                ext.to_string(),
                                            );
                                        }
                                    }
                                }
                            }
                        }
                    }
                    ast::Decl::Func(func) => {
                        let obj = match program.def_of(func.name.id) {
                            Some(obj) => obj,
                            None => continue,
                        };
                        if matches_directive(&GLSL_ENTRY_RE, func.doc.as_ref()) {
                            directives.glsl_entries.insert(obj);
                        } else if let Some(ext) =
                            parse_directive(&EXTERN_RE, func.doc.as_ref())
                        {
                            directives.insert(Target::Cpp, obj, ext);
                        } else if let Some(prefix) = &file_prefix {
                            directives.insert(
                                Target::Cpp,
                                obj,
                                format!("{}{}", prefix, func.name.name),
                            );
                        }
                        if let Some(ext) = parse_directive(&GLSL_EXTERN_RE, func.doc.as_ref())
                        {
                            directives.insert(Target::Glsl, obj, ext);
                        }
                    }
                }
            }
        }
    }

    directives
}

fn collect_type_spec(
    program: &Program,
    directives: &mut Directives,
    spec: &ast::TypeSpec,
    decl_ext: Option<&str>,
    decl_glsl: Option<&str>,
    file_prefix: Option<&str>,
) {
    let obj = match program.def_of(spec.name.id) {
        Some(obj) => obj,
        None => return,
    };

    let spec_ext = parse_directive(&EXTERN_RE, spec.doc.as_ref());
    let chosen = spec_ext
        .as_deref()
        .or(decl_ext)
        .map(|s| s.to_string())
        .or_else(|| file_prefix.map(|p| format!("{}{}", p, spec.name.name)));

    if let Some(ext) = chosen {
        directives.insert(Target::Cpp, obj, ext);
        // Exported fields of an extern struct map to conventional
        // lowercased member names unless overridden.
        if let ast::ExprKind::StructType { fields } = &spec.ty.kind {
            for field in fields {
                let field_ext = field_extern(field);
                for name in &field.names {
                    let field_obj = match program.def_of(name.id) {
                        Some(obj) => obj,
                        None => continue,
                    };
                    if let Some(ext) = &field_ext {
                        directives.insert(Target::Cpp, field_obj, ext.clone());
                    } else if name.is_exported() {
                        directives.insert(Target::Cpp, field_obj, lower_first(&name.name));
                    }
                }
            }
        }
    }

    let spec_glsl = parse_directive(&GLSL_EXTERN_RE, spec.doc.as_ref());
    if let Some(ext) = spec_glsl.as_deref().or(decl_glsl) {
        directives.insert(Target::Glsl, obj, ext.to_string());
        if let ast::ExprKind::StructType { fields } = &spec.ty.kind {
            for field in fields {
                for name in &field.names {
                    if let Some(field_obj) = program.def_of(name.id) {
                        if name.is_exported() {
                            directives.insert(
                                Target::Glsl,
                                field_obj,
                                lower_first(&name.name),
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_first_basic() {
        assert_eq!(lower_first("FragColor"), "fragColor");
        assert_eq!(lower_first("x"), "x");
        assert_eq!(lower_first(""), "");
    }

    #[test]
    fn directive_regexes() {
        assert!(INCLUDE_RE.is_match("//gx:include <string.h>"));
        assert!(EXTERNS_RE.is_match("//gx:externs person::"));
        assert!(EXTERN_RE.is_match("//gx:extern rect::Rect"));
        // `gx:externs` must not be swallowed by the `gx:extern` pattern.
        assert!(!EXTERN_RE.is_match("//gx:externs person::"));
        assert!(GLSL_EXTERN_RE.is_match("//glsl:extern vec4"));
        assert!(GLSL_ENTRY_RE.is_match("//glsl:entry"));
        assert!(GLSL_ENTRY_RE.is_match("//glsl:shader"));
        assert!(!GLSL_ENTRY_RE.is_match("//glsl:extern vec4"));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        assert!(!EXTERN_RE.is_match("//lint:ignore foo"));
        assert!(!GLSL_ENTRY_RE.is_match("//glsl:entrypoint"));
    }
}
