//! Package discovery and loading: find `.gx` sources, parse them, follow
//! imports, reject cycles, and hand the files over in topological
//! package order (leaves first, main package last). That order is
//! load-bearing: the backend emits packages in exactly this order.
//!
//! A package is a directory of `.gx` files. Import paths resolve by
//! their last segment to a sibling directory of the main package's
//! files, so `import "github.com/acme/game/person"` and
//! `import "person"` both reach `<main>/person`.

use crate::ast::FileId;
use crate::lexer::Lexer;
use crate::parser::{NodeIds, Parser};
use crate::program::{Package, SourceFile};
use crate::types::PkgId;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{0}")]
    Io(String),
    #[error("{pos}: {message}")]
    Source { pos: String, message: String },
    #[error("import cycle through package {path}")]
    ImportCycle { path: String },
    #[error("no gx source files in {dir}")]
    NoSources { dir: String },
}

/// Everything the checker needs, in final order.
#[derive(Debug)]
pub struct Loaded {
    pub files: Vec<SourceFile>,
    pub packages: Vec<Package>,
    pub main_pkg: PkgId,
}

/// The directory-name key an import path resolves by.
pub fn import_key(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

struct RawPackage {
    /// Import key (`""` for main).
    key: String,
    name: String,
    files: Vec<usize>,
    imports: Vec<String>,
}

#[derive(Default)]
struct LoadState {
    files: Vec<SourceFile>,
    packages: Vec<RawPackage>,
    by_key: HashMap<String, usize>,
    ids: NodeIds,
    errors: Vec<LoadError>,
}

impl LoadState {
    fn parse_source(&mut self, path: PathBuf, src: String) -> Option<usize> {
        let file_id = FileId(self.files.len() as u32);
        let pos_of = |line_starts: &[u32], offset: u32, path: &Path| {
            let line = match line_starts.binary_search(&offset) {
                Ok(i) => i,
                Err(i) => i - 1,
            };
            format!(
                "{}:{}:{}",
                path.display(),
                line + 1,
                offset - line_starts[line] + 1
            )
        };
        let line_starts = SourceFile::line_starts_of(&src);

        let tokens = match Lexer::new(file_id, &src).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => {
                self.errors.push(LoadError::Source {
                    pos: pos_of(&line_starts, err.span().start, &path),
                    message: err.to_string(),
                });
                return None;
            }
        };
        let ast = match Parser::new(tokens, &mut self.ids).parse_file(file_id, path.clone()) {
            Ok(ast) => ast,
            Err(err) => {
                self.errors.push(LoadError::Source {
                    pos: pos_of(&line_starts, err.span().start, &path),
                    message: err.to_string(),
                });
                return None;
            }
        };

        self.files.push(SourceFile {
            path,
            src,
            line_starts,
            ast,
        });
        Some(self.files.len() - 1)
    }

    /// Load one package directory; returns its index in `packages`.
    fn load_package_dir(&mut self, key: &str, dir: &Path) -> Option<usize> {
        if let Some(idx) = self.by_key.get(key) {
            return Some(*idx);
        }

        let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "gx"))
                .collect(),
            Err(err) => {
                self.errors
                    .push(LoadError::Io(format!("{}: {}", dir.display(), err)));
                return None;
            }
        };
        paths.sort();
        if paths.is_empty() {
            self.errors.push(LoadError::NoSources {
                dir: dir.display().to_string(),
            });
            return None;
        }

        let mut file_indices = Vec::new();
        for path in paths {
            let src = match fs::read_to_string(&path) {
                Ok(src) => src,
                Err(err) => {
                    self.errors
                        .push(LoadError::Io(format!("{}: {}", path.display(), err)));
                    continue;
                }
            };
            if let Some(idx) = self.parse_source(path, src) {
                file_indices.push(idx);
            }
        }
        if file_indices.is_empty() {
            return None;
        }

        self.finish_package(key, file_indices)
    }

    fn finish_package(&mut self, key: &str, file_indices: Vec<usize>) -> Option<usize> {
        let name = self.files[file_indices[0]].ast.package.name.clone();
        let mut imports = Vec::new();
        for &fi in &file_indices {
            for import in &self.files[fi].ast.imports {
                let import_key = import_key(&import.path).to_string();
                if !imports.contains(&import_key) {
                    imports.push(import_key);
                }
            }
        }
        let idx = self.packages.len();
        self.packages.push(RawPackage {
            key: key.to_string(),
            name,
            files: file_indices,
            imports,
        });
        self.by_key.insert(key.to_string(), idx);
        Some(idx)
    }
}

/// Topological ordering over the loaded packages, main last. Cycles are
/// reported once per offending package.
fn topo_order(state: &mut LoadState, main_idx: usize) -> Vec<usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }
    let mut marks = vec![Mark::White; state.packages.len()];
    let mut order = Vec::new();
    let mut cycle_errors = Vec::new();

    fn visit(
        idx: usize,
        packages: &[RawPackage],
        by_key: &HashMap<String, usize>,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
        cycle_errors: &mut Vec<LoadError>,
    ) {
        match marks[idx] {
            Mark::Black => return,
            Mark::Grey => {
                cycle_errors.push(LoadError::ImportCycle {
                    path: packages[idx].name.clone(),
                });
                return;
            }
            Mark::White => {}
        }
        marks[idx] = Mark::Grey;
        for import in &packages[idx].imports {
            if let Some(&dep) = by_key.get(import) {
                visit(dep, packages, by_key, marks, order, cycle_errors);
            }
        }
        marks[idx] = Mark::Black;
        order.push(idx);
    }

    visit(
        main_idx,
        &state.packages,
        &state.by_key,
        &mut marks,
        &mut order,
        &mut cycle_errors,
    );
    state.errors.extend(cycle_errors);
    order
}

fn assemble(mut state: LoadState, main_idx: usize) -> Result<Loaded, Vec<LoadError>> {
    let order = topo_order(&mut state, main_idx);
    if !state.errors.is_empty() {
        return Err(state.errors);
    }

    let mut packages = Vec::new();
    for (new_id, &raw_idx) in order.iter().enumerate() {
        let raw = &state.packages[raw_idx];
        packages.push(Package {
            id: PkgId(new_id as u32),
            name: raw.name.clone(),
            path: raw.key.clone(),
            files: raw.files.clone(),
        });
    }
    let main_pkg = PkgId(packages.len() as u32 - 1);
    Ok(Loaded {
        files: state.files,
        packages,
        main_pkg,
    })
}

/// Load the main package from a directory, following imports into
/// sibling package directories.
pub fn load_dir(main_dir: &Path) -> Result<Loaded, Vec<LoadError>> {
    let mut state = LoadState::default();
    let main_idx = match state.load_package_dir("", main_dir) {
        Some(idx) => idx,
        None => return Err(state.errors),
    };

    // Breadth-first over the import closure.
    let mut queue: Vec<String> = state.packages[main_idx].imports.clone();
    let mut qi = 0;
    while qi < queue.len() {
        let key = queue[qi].clone();
        qi += 1;
        if state.by_key.contains_key(&key) {
            continue;
        }
        let dir = main_dir.join(&key);
        if let Some(idx) = state.load_package_dir(&key, &dir) {
            for import in &state.packages[idx].imports {
                if !queue.contains(import) {
                    queue.push(import.clone());
                }
            }
        }
    }

    assemble(state, main_idx)
}

/// Load from in-memory sources; paths with a directory component become
/// that package, bare paths form the main package. For tests and tools.
pub fn load_sources(sources: &[(&str, &str)]) -> Result<Loaded, Vec<LoadError>> {
    let mut state = LoadState::default();
    let mut grouped: Vec<(String, Vec<usize>)> = Vec::new();

    for (path, src) in sources {
        let key = match path.rfind('/') {
            Some(at) => import_key(&path[..at]).to_string(),
            None => String::new(),
        };
        let idx = match state.parse_source(PathBuf::from(path), src.to_string()) {
            Some(idx) => idx,
            None => continue,
        };
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, files)) => files.push(idx),
            None => grouped.push((key.clone(), vec![idx])),
        }
    }

    let mut main_idx = None;
    for (key, files) in grouped {
        let idx = state.finish_package(&key, files);
        if key.is_empty() {
            main_idx = idx;
        }
    }
    let main_idx = match main_idx {
        Some(idx) => idx,
        None => {
            state.errors.push(LoadError::NoSources {
                dir: "<memory>".into(),
            });
            return Err(state.errors);
        }
    };
    assemble(state, main_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_package_loads() {
        let loaded = load_sources(&[("main.gx", "package main\n\nfunc main() {\n}\n")]).unwrap();
        assert_eq!(loaded.packages.len(), 1);
        assert_eq!(loaded.packages[0].name, "main");
        assert_eq!(loaded.main_pkg, PkgId(0));
    }

    #[test]
    fn imports_order_leaves_first() {
        let loaded = load_sources(&[
            (
                "main.gx",
                "package main\n\nimport \"foo\"\n\nfunc main() {\n}\n",
            ),
            ("foo/foo.gx", "package foo\n\nfunc F() int {\n\treturn 1\n}\n"),
        ])
        .unwrap();
        assert_eq!(loaded.packages.len(), 2);
        assert_eq!(loaded.packages[0].name, "foo");
        assert_eq!(loaded.packages[1].name, "main");
        assert_eq!(loaded.main_pkg, PkgId(1));
    }

    #[test]
    fn long_import_paths_resolve_by_last_segment() {
        let loaded = load_sources(&[
            (
                "main.gx",
                "package main\n\nimport \"github.com/acme/game/person\"\n\nfunc main() {\n}\n",
            ),
            ("person/person.gx", "package person\n\nvar Population int\n"),
        ])
        .unwrap();
        assert_eq!(loaded.packages[0].name, "person");
        assert_eq!(loaded.packages[0].path, "person");
    }

    #[test]
    fn parse_error_carries_position() {
        let errs = load_sources(&[("main.gx", "package main\n\nfunc f() {\n\tdefer g()\n}\n")])
            .unwrap_err();
        let msg = errs[0].to_string();
        assert!(msg.starts_with("main.gx:4:"), "got {}", msg);
        assert!(msg.contains("defer not supported"));
    }

    #[test]
    fn import_cycle_is_an_error() {
        let errs = load_sources(&[
            ("main.gx", "package main\n\nimport \"a\"\n\nfunc main() {\n}\n"),
            ("a/a.gx", "package a\n\nimport \"b\"\n"),
            ("b/b.gx", "package b\n\nimport \"a\"\n"),
        ])
        .unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, LoadError::ImportCycle { .. })));
    }
}
