//! gx command line driver.
//!
//! ```text
//! gx <main-package-path> <output-prefix> [glsl-output-prefix] [glsl-output-suffix]
//! ```
//!
//! Produces `<prefix>.cc`, `<prefix>.hh` and `gx.hh` next to them, plus
//! `<glsl-prefix><func><suffix>` per shader entry. Files are written
//! only when their content changed; nothing is written if any error
//! occurred.

use gx::output::write_if_changed;
use gx::runtime::{RUNTIME_HEADER, RUNTIME_HEADER_NAME};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        eprintln!("usage: gx <main-package-path> <output-prefix> [glsl-output-prefix] [glsl-output-suffix]");
        return 1;
    }
    let main_pkg_path = &args[1];
    let output_prefix = &args[2];
    let glsl_prefix = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| format!("{}_", output_prefix));
    let glsl_suffix = args.get(4).cloned().unwrap_or_else(|| ".glsl".to_string());

    let loaded = match gx::loader::load_dir(Path::new(main_pkg_path)) {
        Ok(loaded) => loaded,
        Err(errors) => {
            for err in errors {
                eprintln!("{}", err);
            }
            return 1;
        }
    };

    let out = match gx::compile(loaded) {
        Ok(out) => out,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            return 1;
        }
    };

    let out_dir = Path::new(output_prefix)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let mut writes: Vec<(std::path::PathBuf, &str)> = Vec::new();
    writes.push((out_dir.join(RUNTIME_HEADER_NAME), RUNTIME_HEADER));
    writes.push((format!("{}.cc", output_prefix).into(), out.cc.as_str()));
    writes.push((format!("{}.hh", output_prefix).into(), out.hh.as_str()));
    for (name, contents) in &out.glsls {
        let path = format!("{}{}{}", glsl_prefix, name, glsl_suffix);
        writes.push((path.into(), contents.as_str()));
    }

    for (path, contents) in writes {
        if let Err(err) = write_if_changed(&path, contents) {
            eprintln!("{}: {}", path.display(), err);
            return 1;
        }
    }

    0
}
