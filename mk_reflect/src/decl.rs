//! Static declarations emitted by `#[derive(MkStruct)]`.
//!
//! The derive renders each `#[mk(...)]` attribute into the same annotation
//! string a C++ header would carry, so Rust records and header records go
//! through one reflection path.

use crate::ctype::CType;
use crate::error::ReflectError;
use crate::ir::{parse_all_mk, AttrIR, FieldIR, HeaderIR, StructIR};
use crate::reflect::{reflect, Reflection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticField {
    pub name: &'static str,
    pub rust_type: &'static str,
    pub annotations: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticStruct {
    pub name: &'static str,
    pub annotations: &'static [&'static str],
    pub fields: &'static [StaticField],
}

pub trait MkReflect {
    fn mk_decl() -> &'static StaticStruct;
}

/// Rust type to clang's spelling; opaque types are kept verbatim.
fn c_spelling(rust_type: &str) -> String {
    match CType::parse_rust(rust_type) {
        Some(t) => t.c_type_name(),
        None => rust_type.split_whitespace().collect(),
    }
}

fn attrs(annotations: &[&str]) -> Vec<AttrIR> {
    annotations.iter().map(|a| AttrIR::annotate(*a)).collect()
}

impl StaticStruct {
    pub fn to_struct_ir(&self) -> StructIR {
        StructIR {
            name: self.name.to_string(),
            attrs: attrs(self.annotations),
            fields: self
                .fields
                .iter()
                .map(|f| FieldIR { name: f.name.to_string(), type_name: c_spelling(f.rust_type), attrs: attrs(f.annotations) })
                .collect(),
        }
    }
}

pub fn header_from_decls(decls: &[&StaticStruct]) -> HeaderIR {
    HeaderIR { structs: decls.iter().map(|d| d.to_struct_ir()).collect() }
}

pub fn reflect_decls(decls: &[&StaticStruct]) -> Result<Reflection, ReflectError> {
    reflect(&parse_all_mk(&header_from_decls(decls))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    static PARTICLE: StaticStruct = StaticStruct {
        name: "Particle",
        annotations: &["mk::struct(tag=instance)"],
        fields: &[
            StaticField { name: "center", rust_type: "[f32 ; 3]", annotations: &["mk::vertex(location=5,format=vec3)"] },
            StaticField { name: "age", rust_type: "f32", annotations: &["mk::vertex(location=6)"] },
            StaticField { name: "params", rust_type: "Params", annotations: &["mk::resource(kind=storage,set=2,binding=1)"] },
        ],
    };

    #[test]
    fn converts_rust_types_to_c_spelling() {
        let ir = PARTICLE.to_struct_ir();
        let types: Vec<_> = ir.fields.iter().map(|f| f.type_name.as_str()).collect();
        assert_eq!(types, vec!["float[3]", "float", "Params"]);
        assert_eq!(ir.attrs[0].annotation.as_deref(), Some("mk::struct(tag=instance)"));
    }

    #[test]
    fn opaque_types_only_matter_for_vertex_structs() {
        // `Params` has no C layout, so the instance struct cannot be laid out.
        let err = reflect_decls(&[&PARTICLE]).unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { ref type_name, .. } if type_name == "Params"));
    }
}
