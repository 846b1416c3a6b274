use std::path::Path;
use std::process::Command;

use log::{debug, info};
use serde_json::Value;

use crate::ast::collect_from_ast;
use crate::c_ir::{collect_c_from_ast, parse_macro_defs, without_predefined, CHeaderIR, MacroIR};
use crate::error::ClangExecError;
use crate::ir::HeaderIR;

/// How to invoke clang. Built from the environment, then extended by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangConfig {
    pub program: String,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
    pub extra_args: Vec<String>,
}

impl Default for ClangConfig {
    fn default() -> Self {
        ClangConfig { program: "clang".to_string(), includes: Vec::new(), defines: Vec::new(), extra_args: Vec::new() }
    }
}

fn split_list(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split([' ', ';']).map(str::trim).filter(|it| !it.is_empty()).map(str::to_string)
}

impl ClangConfig {
    /// Reads `CLANG` (program), `CLANG_INCLUDES` and `CLANG_DEFS`.
    ///
    /// The two lists are space- or semicolon-separated; defines may be `NAME` or `NAME=VALUE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = ClangConfig::default();
        if let Some(p) = lookup("CLANG").filter(|p| !p.trim().is_empty()) { cfg.program = p.trim().to_string(); }
        if let Some(inc) = lookup("CLANG_INCLUDES") { cfg.includes.extend(split_list(&inc)); }
        if let Some(defs) = lookup("CLANG_DEFS") { cfg.defines.extend(split_list(&defs)); }
        cfg
    }

    pub fn include(mut self, dir: impl Into<String>) -> Self { self.includes.push(dir.into()); self }
    pub fn define(mut self, def: impl Into<String>) -> Self { self.defines.push(def.into()); self }

    pub fn args_for(&self, path: &Path) -> Vec<String> { self.ast_args("c++", path) }

    /// Same as [`ClangConfig::args_for`], parsing the header as C.
    pub fn c_args_for(&self, path: &Path) -> Vec<String> { self.ast_args("c", path) }

    /// `-dM -E` over an empty input, optionally force-including `header`.
    pub fn macro_args_for(&self, header: Option<&Path>) -> Vec<String> {
        let mut args: Vec<String> = ["-dM", "-E", "-x", "c"].iter().map(|s| s.to_string()).collect();
        if let Some(h) = header {
            args.push("-include".into());
            args.push(h.to_string_lossy().into_owned());
        }
        args.push("/dev/null".into());
        self.push_common(&mut args);
        args
    }

    fn ast_args(&self, lang: &str, path: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-x", lang, "-Xclang", "-ast-dump=json", "-fsyntax-only"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(path.to_string_lossy().into_owned());
        self.push_common(&mut args);
        args
    }

    fn push_common(&self, args: &mut Vec<String>) {
        args.extend(self.includes.iter().map(|i| format!("-I{i}")));
        args.extend(self.defines.iter().map(|d| format!("-D{d}")));
        args.extend(self.extra_args.iter().cloned());
    }

    fn run(&self, args: &[String]) -> Result<Vec<u8>, ClangExecError> {
        debug!("running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| ClangExecError::Exec(format!("{}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(ClangExecError::Status(String::from_utf8_lossy(&output.stderr).into()));
        }
        Ok(output.stdout)
    }
}

fn read_header(path: &Path) -> Result<String, ClangExecError> {
    std::fs::read_to_string(path).map_err(|source| ClangExecError::Io { path: path.display().to_string(), source })
}

/// Analyze a C/C++ header by shelling out to clang and parsing its JSON AST dump.
pub fn analyze_header<P: AsRef<Path>>(path: P, config: &ClangConfig) -> Result<HeaderIR, ClangExecError> {
    let path = path.as_ref();
    let source = read_header(path)?;
    let stdout = config.run(&config.args_for(path))?;
    let ir = analyze_ast_json(&stdout, Some(&source))?;
    info!("{}: {} record(s)", path.display(), ir.structs.len());
    Ok(ir)
}

/// Same as [`analyze_header`] but on a previously saved `-ast-dump=json` output.
pub fn analyze_ast_json(bytes: &[u8], source: Option<&str>) -> Result<HeaderIR, ClangExecError> {
    let v: Value = serde_json::from_slice(bytes).map_err(|e| ClangExecError::Json(e.to_string()))?;
    Ok(collect_from_ast(&v, source))
}

/// Analyze a header as plain C: records, enums, typedefs and function prototypes.
pub fn analyze_header_c<P: AsRef<Path>>(path: P, config: &ClangConfig) -> Result<CHeaderIR, ClangExecError> {
    let path = path.as_ref();
    read_header(path)?;
    let ir = analyze_c_ast_json(&config.run(&config.c_args_for(path))?)?;
    info!(
        "{}: {} record(s), {} enum(s), {} typedef(s), {} function(s)",
        path.display(),
        ir.structs.len(),
        ir.enums.len(),
        ir.typedefs.len(),
        ir.functions.len()
    );
    Ok(ir)
}

pub fn analyze_c_ast_json(bytes: &[u8]) -> Result<CHeaderIR, ClangExecError> {
    let v: Value = serde_json::from_slice(bytes).map_err(|e| ClangExecError::Json(e.to_string()))?;
    Ok(collect_c_from_ast(&v))
}

/// Macros defined by `header` (and what it includes), minus the compiler's
/// predefined ones for the same flags.
pub fn analyze_macros<P: AsRef<Path>>(header: P, config: &ClangConfig) -> Result<Vec<MacroIR>, ClangExecError> {
    let header = header.as_ref();
    read_header(header)?;
    let all = parse_macro_defs(&String::from_utf8_lossy(&config.run(&config.macro_args_for(Some(header)))?));
    let baseline = parse_macro_defs(&String::from_utf8_lossy(&config.run(&config.macro_args_for(None))?));
    let macros = without_predefined(all, &baseline);
    info!("{}: {} macro(s)", header.display(), macros.len());
    Ok(macros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_from_env_lists() {
        let env: HashMap<&str, &str> = [
            ("CLANG_INCLUDES", "/opt/sdk/include; /usr/local/include  "),
            ("CLANG_DEFS", "MK_DEMO=1;NDEBUG"),
        ]
        .into_iter()
        .collect();
        let cfg = ClangConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.program, "clang");
        assert_eq!(cfg.includes, vec!["/opt/sdk/include", "/usr/local/include"]);
        assert_eq!(cfg.defines, vec!["MK_DEMO=1", "NDEBUG"]);
        let args = cfg.args_for(Path::new("demo.hpp"));
        assert_eq!(&args[..6], &["-x", "c++", "-Xclang", "-ast-dump=json", "-fsyntax-only", "demo.hpp"]);
        assert!(args.contains(&"-I/opt/sdk/include".to_string()));
        assert!(args.contains(&"-DNDEBUG".to_string()));
    }

    #[test]
    fn program_override() {
        let cfg = ClangConfig::from_lookup(|k| (k == "CLANG").then(|| "clang-18".to_string()));
        assert_eq!(cfg.program, "clang-18");
        let cfg = cfg.include("inc").define("X");
        assert_eq!(cfg.includes, vec!["inc"]);
        assert_eq!(cfg.defines, vec!["X"]);
    }

    #[test]
    fn c_and_macro_args() {
        let cfg = ClangConfig::default().include("inc").define("X=1");
        let c = cfg.c_args_for(Path::new("scene.h"));
        assert_eq!(&c[..6], &["-x", "c", "-Xclang", "-ast-dump=json", "-fsyntax-only", "scene.h"]);
        assert_eq!(&c[6..], &["-Iinc", "-DX=1"]);
        assert_eq!(
            cfg.macro_args_for(Some(Path::new("scene.h"))),
            vec!["-dM", "-E", "-x", "c", "-include", "scene.h", "/dev/null", "-Iinc", "-DX=1"]
        );
        assert_eq!(cfg.macro_args_for(None), vec!["-dM", "-E", "-x", "c", "/dev/null", "-Iinc", "-DX=1"]);
    }

    #[test]
    fn missing_header_is_io_error() {
        let cfg = ClangConfig::default();
        let missing = std::env::temp_dir().join("mk_reflect_no_such_header.h");
        assert!(matches!(analyze_header_c(&missing, &cfg), Err(ClangExecError::Io { .. })));
        assert!(matches!(analyze_macros(&missing, &cfg), Err(ClangExecError::Io { .. })));
    }

    #[test]
    fn missing_program_is_exec_error() {
        let dir = std::env::temp_dir().join("mk_reflect_missing_clang.hpp");
        std::fs::write(&dir, "struct A { int x; };").unwrap();
        let cfg = ClangConfig { program: "definitely-not-a-clang-binary".into(), ..ClangConfig::default() };
        assert!(matches!(analyze_header(&dir, &cfg), Err(ClangExecError::Exec(_))));
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(matches!(analyze_ast_json(b"not json", None), Err(ClangExecError::Json(_))));
        assert!(matches!(analyze_c_ast_json(b"{"), Err(ClangExecError::Json(_))));
    }
}
