//! mk_reflect: reflection over `mk::` annotations.
//!
//! Records carry annotations such as `mk::vertex(location=1,format=vec3)`,
//! either in a C/C++ header (`__attribute__((annotate("...")))`, read through
//! clang's JSON AST) or on Rust structs via `#[derive(MkStruct)]`. Both paths
//! produce a [`HeaderIR`], which is parsed into typed annotations and then
//! reflected into vertex-input layouts and descriptor bindings.
//!
//! ```no_run
//! use mk_reflect::{analyze_header, parse_all_mk, reflect, ClangConfig};
//!
//! let ir = analyze_header("include/demo.hpp", &ClangConfig::from_env())?;
//! let reflection = reflect(&parse_all_mk(&ir)?)?;
//! print!("{}", mk_reflect::emit::emit_summary(&reflection));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod annotation;
pub mod ast;
pub mod c_ir;
pub mod clang;
pub mod ctype;
pub mod decl;
pub mod emit;
pub mod error;
pub mod ir;
pub mod reflect;

pub use annotation::{parse_mk_annotation, MkAnnotation, MkAnnotationKind};
pub use ast::Scope;
pub use c_ir::{CHeaderIR, MacroIR};
pub use clang::{analyze_ast_json, analyze_c_ast_json, analyze_header, analyze_header_c, analyze_macros, ClangConfig};
pub use decl::{MkReflect, StaticField, StaticStruct};
pub use error::{AnnotationError, ClangExecError, ReflectError};
pub use ir::{parse_all_mk, HeaderIR, ParsedHeaderMk};
pub use reflect::{reflect, Reflection};
