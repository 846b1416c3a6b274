use log::debug;
use serde::{Deserialize, Serialize};

use crate::annotation::{is_mk_annotation, parse_mk_annotation, MkAnnotation};
use crate::error::ReflectError;

/// Raw declarations as extracted from a header (or from Rust declarations).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderIR { pub structs: Vec<StructIR> }

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StructIR { pub name: String, pub attrs: Vec<AttrIR>, pub fields: Vec<FieldIR> }

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldIR { pub name: String, pub type_name: String, pub attrs: Vec<AttrIR> }

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttrIR {
    /// Clang node kind, e.g. `AnnotateAttr`.
    pub kind: String,
    pub annotation: Option<String>,
}

impl AttrIR {
    pub fn annotate(text: impl Into<String>) -> Self {
        AttrIR { kind: "AnnotateAttr".to_string(), annotation: Some(text.into()) }
    }
}

impl HeaderIR {
    pub fn find(&self, name: &str) -> Option<&StructIR> { self.structs.iter().find(|s| s.name == name) }

    /// Every annotation string, in declaration order.
    pub fn annotations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for s in &self.structs {
            out.extend(s.attrs.iter().filter_map(|a| a.annotation.as_deref()));
            for f in &s.fields {
                out.extend(f.attrs.iter().filter_map(|a| a.annotation.as_deref()));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedHeaderMk { pub structs: Vec<ParsedStructMk> }

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStructMk { pub name: String, pub struct_attrs: Vec<MkAnnotation>, pub fields: Vec<ParsedFieldMk> }

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFieldMk { pub name: String, pub type_name: String, pub field_attrs: Vec<MkAnnotation> }

fn parse_attrs(attrs: &[AttrIR], location: &str, errors: &mut Vec<ReflectError>) -> Vec<MkAnnotation> {
    let mut out = Vec::new();
    for text in attrs.iter().filter_map(|a| a.annotation.as_deref()) {
        if !is_mk_annotation(text) {
            debug!("{location}: skipping foreign annotation {text:?}");
            continue;
        }
        match parse_mk_annotation(text) {
            Ok(a) => out.push(a),
            Err(source) => errors.push(ReflectError::Annotation { location: location.to_string(), source }),
        }
    }
    out
}

/// Parse all mk:: annotations from a HeaderIR into typed forms.
///
/// Every malformed annotation is reported, not only the first.
pub fn parse_all_mk(ir: &HeaderIR) -> Result<ParsedHeaderMk, ReflectError> {
    let mut errors = Vec::new();
    let mut out = ParsedHeaderMk::default();
    for s in &ir.structs {
        let struct_attrs = parse_attrs(&s.attrs, &s.name, &mut errors);
        let fields = s
            .fields
            .iter()
            .map(|f| ParsedFieldMk {
                name: f.name.clone(),
                type_name: f.type_name.clone(),
                field_attrs: parse_attrs(&f.attrs, &format!("{}.{}", s.name, f.name), &mut errors),
            })
            .collect();
        out.structs.push(ParsedStructMk { name: s.name.clone(), struct_attrs, fields });
    }
    match ReflectError::combine(errors) {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::MkAnnotationKind;

    fn material() -> StructIR {
        StructIR {
            name: "Material".into(),
            attrs: vec![],
            fields: vec![FieldIR {
                name: "id".into(),
                type_name: "int".into(),
                attrs: vec![
                    AttrIR::annotate("mk::resource(kind=uniform,set=0,binding=0)"),
                    AttrIR::annotate("other_tool::keep"),
                    AttrIR { kind: "AlignedAttr".into(), annotation: None },
                ],
            }],
        }
    }

    #[test]
    fn keeps_only_mk_annotations() {
        let ir = HeaderIR { structs: vec![material()] };
        let parsed = parse_all_mk(&ir).unwrap();
        let f = &parsed.structs[0].fields[0];
        assert_eq!(f.field_attrs.len(), 1);
        assert_eq!(f.field_attrs[0].kind, MkAnnotationKind::Resource);
        assert_eq!(ir.annotations(), vec!["mk::resource(kind=uniform,set=0,binding=0)", "other_tool::keep"]);
    }

    #[test]
    fn reports_every_malformed_annotation() {
        let mut s = material();
        s.attrs.push(AttrIR::annotate("mk::struct(tag"));
        s.fields[0].attrs.push(AttrIR::annotate("mk::vertex(location=1"));
        let err = parse_all_mk(&HeaderIR { structs: vec![s] }).unwrap_err().to_string();
        assert!(err.starts_with("2 error(s)"), "{err}");
        assert!(err.contains("Material:") && err.contains("Material.id:"), "{err}");
    }
}
