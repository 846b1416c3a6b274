//! Plain C declarations from a header: records, enums, typedefs, function
//! prototypes, and the macros the header defines.
//!
//! Unlike [`crate::ast`], nothing here looks at annotations; this is the
//! shape of the header as a C compiler sees it.

use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::{flag, inner, str_field, FileTracker, Scope};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CHeaderIR {
    pub structs: Vec<CStructIR>,
    pub enums: Vec<CEnumIR>,
    pub typedefs: Vec<CTypedefIR>,
    pub functions: Vec<CFunctionIR>,
}

impl CHeaderIR {
    pub fn find_struct(&self, name: &str) -> Option<&CStructIR> { self.structs.iter().find(|s| s.name == name) }
    pub fn find_enum(&self, name: &str) -> Option<&CEnumIR> { self.enums.iter().find(|e| e.name == name) }
    pub fn find_function(&self, name: &str) -> Option<&CFunctionIR> { self.functions.iter().find(|f| f.name == name) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CStructIR {
    pub name: String,
    pub is_union: bool,
    pub fields: Vec<CFieldIR>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CFieldIR {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CEnumIR {
    pub name: String,
    pub items: Vec<CEnumItemIR>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CEnumItemIR {
    pub name: String,
    /// Explicit or implied (previous + 1) value.
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CTypedefIR {
    pub name: String,
    pub underlying: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CFunctionIR {
    pub name: String,
    pub ret: String,
    pub params: Vec<CParamIR>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CParamIR {
    pub name: String,
    pub type_name: String,
}

/// A `#define` as printed by `clang -dM -E`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroIR {
    pub name: String,
    /// Parameter names of a function-like macro.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    pub value: String,
}

pub fn collect_c_from_ast(v: &Value) -> CHeaderIR { collect_c_from_ast_scoped(v, Scope::MainFile) }

pub fn collect_c_from_ast_scoped(v: &Value, scope: Scope) -> CHeaderIR {
    let mut w = CWalker { scope, files: FileTracker::default(), ir: CHeaderIR::default() };
    w.walk(v);
    w.ir
}

struct CWalker {
    scope: Scope,
    files: FileTracker,
    ir: CHeaderIR,
}

fn qual_type(m: &Map<String, Value>) -> &str {
    m.get("type").and_then(|t| t.get("qualType")).and_then(Value::as_str).unwrap_or("")
}

impl CWalker {
    fn walk(&mut self, v: &Value) {
        match v {
            Value::Object(m) => {
                let in_main = self.files.enter(m);
                let keep = in_main || self.scope == Scope::AllFiles;
                let name = str_field(m, "name").unwrap_or("");
                if name.is_empty() || flag(m, "isImplicit") {
                    for item in inner(m) { self.walk(item); }
                    return;
                }
                match str_field(m, "kind") {
                    Some("RecordDecl") if flag(m, "completeDefinition") => self.record(m, name, keep),
                    Some("EnumDecl") => {
                        let e = self.enum_decl(m, name);
                        if keep { self.ir.enums.push(e); }
                    }
                    Some("TypedefDecl") => {
                        for item in inner(m) { self.files.skip(item); }
                        if keep {
                            self.ir.typedefs.push(CTypedefIR { name: name.to_string(), underlying: qual_type(m).to_string() });
                        }
                    }
                    Some("FunctionDecl") => {
                        let f = self.function(m, name);
                        if keep { self.ir.functions.push(f); }
                    }
                    _ => {
                        for item in inner(m) { self.walk(item); }
                    }
                }
            }
            Value::Array(arr) => {
                for item in arr { self.walk(item); }
            }
            _ => {}
        }
    }

    fn record(&mut self, m: &Map<String, Value>, name: &str, keep: bool) {
        let slot = self.ir.structs.len();
        let mut fields = Vec::new();
        for child in inner(m) {
            match child.as_object() {
                Some(c) if str_field(c, "kind") == Some("FieldDecl") => {
                    self.files.skip(child);
                    fields.push(CFieldIR {
                        name: str_field(c, "name").unwrap_or("").to_string(),
                        type_name: qual_type(c).to_string(),
                    });
                }
                _ => self.walk(child),
            }
        }
        if keep {
            let is_union = str_field(m, "tagUsed") == Some("union");
            trace!("C record {name} ({} field(s))", fields.len());
            self.ir.structs.insert(slot, CStructIR { name: name.to_string(), is_union, fields });
        }
    }

    fn enum_decl(&mut self, m: &Map<String, Value>, name: &str) -> CEnumIR {
        let mut items = Vec::new();
        let mut next = 0i64;
        for child in inner(m) {
            self.files.skip(child);
            let Some(c) = child.as_object() else { continue };
            if str_field(c, "kind") != Some("EnumConstantDecl") { continue; }
            let item = str_field(c, "name").unwrap_or("").to_string();
            let value = match explicit_value(c) {
                Some(v) => v,
                None if c.get("inner").is_some() => {
                    warn!("{name}::{item}: initializer has no folded value; assuming {next}");
                    next
                }
                None => next,
            };
            next = value.wrapping_add(1);
            items.push(CEnumItemIR { name: item, value });
        }
        CEnumIR { name: name.to_string(), items }
    }

    fn function(&mut self, m: &Map<String, Value>, name: &str) -> CFunctionIR {
        let ty = qual_type(m);
        let ret = ty.split_once('(').map(|(r, _)| r.trim()).unwrap_or(ty).to_string();
        let mut params = Vec::new();
        for child in inner(m) {
            self.files.skip(child);
            let Some(c) = child.as_object() else { continue };
            if str_field(c, "kind") == Some("ParmVarDecl") {
                params.push(CParamIR {
                    name: str_field(c, "name").unwrap_or("").to_string(),
                    type_name: qual_type(c).to_string(),
                });
            }
        }
        CFunctionIR { name: name.to_string(), ret, params, variadic: flag(m, "variadic") }
    }
}

/// Clang folds an enumerator's initializer into a `ConstantExpr` carrying `value`.
fn explicit_value(m: &Map<String, Value>) -> Option<i64> {
    fn as_i64(v: &Value) -> Option<i64> {
        v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    }
    m.get("value").and_then(as_i64).or_else(|| inner(m).iter().find_map(|e| e.get("value").and_then(as_i64)))
}

/// Parse the `#define` lines of `clang -dM -E` output.
pub fn parse_macro_defs(text: &str) -> Vec<MacroIR> {
    text.lines()
        .filter_map(|line| line.strip_prefix("#define "))
        .filter_map(|rest| {
            let name_end = rest.find(|c: char| c == '(' || c.is_whitespace()).unwrap_or(rest.len());
            let (name, rest) = rest.split_at(name_end);
            if name.is_empty() { return None; }
            let (params, value) = match rest.strip_prefix('(') {
                Some(after) => {
                    let (list, value) = after.split_once(')')?;
                    let params = list.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
                    (Some(params), value)
                }
                None => (None, rest),
            };
            Some(MacroIR { name: name.to_string(), params, value: value.trim().to_string() })
        })
        .collect()
}

/// Drop macros that are also defined, identically, in `baseline`.
pub fn without_predefined(macros: Vec<MacroIR>, baseline: &[MacroIR]) -> Vec<MacroIR> {
    macros.into_iter().filter(|m| !baseline.contains(m)).collect()
}
