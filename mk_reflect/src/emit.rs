//! Text emitters for the extracted IR and reflection results.

use std::fmt::Write as _;

use crate::annotation::{MkAnnotation, MkAnnotationKind, StageMask, StructTag};
use crate::ctype::CType;
use crate::error::ReflectError;
use crate::ir::{HeaderIR, ParsedHeaderMk};
use crate::reflect::{Reflection, StepMode};

fn split_array_suffix(type_name: &str) -> (&str, &str) {
    match type_name.find('[') {
        Some(i) => (type_name[..i].trim_end(), &type_name[i..]),
        None => (type_name, ""),
    }
}

fn cpp_escape(s: &str) -> String { s.replace('\\', "\\\\").replace('"', "\\\"") }

fn annotate(text: &str) -> String { format!("__attribute__((annotate(\"{}\")))", cpp_escape(text)) }

/// Regenerate a C++ header from the IR. Annotation strings are written back
/// exactly as extracted; attributes other than `annotate` become comments.
pub fn emit_cpp_header(ir: &HeaderIR, ns: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("// Generated by mk_reflect\n#pragma once\n\n");
    if let Some(ns) = ns { let _ = writeln!(out, "namespace {ns} {{\n"); }
    for s in &ir.structs {
        let mut head = String::from("struct ");
        for a in &s.attrs {
            match &a.annotation {
                Some(text) => { head.push_str(&annotate(text)); head.push(' '); }
                None => { let _ = writeln!(out, "// @[{}]", a.kind); }
            }
        }
        let _ = writeln!(out, "{head}{} {{", s.name);
        for f in &s.fields {
            let (base, dims) = split_array_suffix(&f.type_name);
            let mut line = format!("    {base} ");
            for a in &f.attrs {
                match &a.annotation {
                    Some(text) => { line.push_str(&annotate(text)); line.push(' '); }
                    None => { let _ = writeln!(out, "    // @[{}]", a.kind); }
                }
            }
            let _ = writeln!(out, "{line}{}{dims};", f.name);
        }
        out.push_str("};\n\n");
    }
    if let Some(ns) = ns { let _ = writeln!(out, "}} // namespace {ns}"); }
    out
}

const RUST_KEYWORDS: [&str; 12] = ["as", "fn", "impl", "in", "let", "loop", "match", "mod", "move", "ref", "type", "use"];

fn rust_ident(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) { format!("r#{name}") } else { name.to_string() }
}

fn rust_value(v: &str) -> String {
    if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) { v.to_string() } else { format!("{v:?}") }
}

fn rust_args(a: &MkAnnotation) -> String {
    a.args.iter().map(|(k, v)| format!("{k} = {}", rust_value(v))).collect::<Vec<_>>().join(", ")
}

/// `mk::struct(..)` flattens to `#[mk(k = v, ..)]`, carrying every argument,
/// since the derive folds type-level `k = v` pairs back into one `mk::struct`.
fn rust_attr(a: &MkAnnotation) -> String {
    match (&a.kind, a.args.is_empty()) {
        (MkAnnotationKind::Struct, false) => format!("#[mk({})]", rust_args(a)),
        (kind, true) => format!("#[mk({})]", kind.as_str()),
        (kind, false) => format!("#[mk({}({}))]", kind.as_str(), rust_args(a)),
    }
}

/// Rust source declaring every record with `#[derive(MkStruct)]` and
/// `#[mk(...)]` attributes equivalent to the header's annotations.
pub fn emit_rust_module(parsed: &ParsedHeaderMk) -> Result<String, ReflectError> {
    let mut out = String::new();
    out.push_str("// Generated by mk_reflect\nuse mk_reflect_derive::MkStruct;\n");
    for s in &parsed.structs {
        out.push_str("\n#[derive(MkStruct)]\n#[repr(C)]\n");
        for a in &s.struct_attrs { let _ = writeln!(out, "{}", rust_attr(a)); }
        let _ = writeln!(out, "pub struct {} {{", s.name);
        for f in &s.fields {
            for a in &f.field_attrs { let _ = writeln!(out, "    {}", rust_attr(a)); }
            let ty = match CType::parse_c(&f.type_name) {
                Some(t) => t.rust_type(),
                None if f.type_name.contains('[') || f.type_name.contains('*') => {
                    return Err(ReflectError::UnknownType {
                        location: format!("{}.{}", s.name, f.name),
                        type_name: f.type_name.clone(),
                    });
                }
                None => f.type_name.clone(),
            };
            let _ = writeln!(out, "    pub {}: {ty},", rust_ident(&f.name));
        }
        out.push_str("}\n");
    }
    Ok(out)
}

fn stages_str(s: &Option<StageMask>) -> String {
    match s {
        None => "all".to_string(),
        Some(m) => {
            let names: Vec<&str> = [(m.vs, "vs"), (m.fs, "fs"), (m.cs, "cs")].iter().filter(|p| p.0).map(|p| p.1).collect();
            if names.is_empty() { "none".to_string() } else { names.join("|") }
        }
    }
}

fn tag_str(t: &Option<StructTag>) -> &str {
    match t {
        None => "-",
        Some(StructTag::Vertex) => "vertex",
        Some(StructTag::Instance) => "instance",
        Some(StructTag::Other(s)) => s.as_str(),
    }
}

/// Human-readable listing of a reflection result.
pub fn emit_summary(r: &Reflection) -> String {
    let mut out = String::new();
    out.push_str("== Vertex Layouts ==\n");
    for vl in &r.vertex_layouts {
        let step = match vl.buffers.first().map(|b| b.step) {
            Some(StepMode::Instance) => "instance",
            _ => "vertex",
        };
        let _ = writeln!(out, "{} tag={} stride={} step={}", vl.struct_name, tag_str(&vl.tag), vl.layout.size, step);
        for a in &vl.attrs {
            let _ = writeln!(
                out,
                "  field={} location={} binding={} format={} offset={} size={}",
                a.field, a.location, a.binding, a.format, a.offset, a.size
            );
        }
    }
    out.push_str("== Resource Bindings ==\n");
    for b in &r.bindings {
        let _ = writeln!(
            out,
            "{}.{} set={} binding={} kind={} stages={}",
            b.struct_name, b.field, b.set, b.binding, b.kind.as_str(), stages_str(&b.stages)
        );
    }
    if !r.diagnostics.is_empty() {
        out.push_str("== Diagnostics ==\n");
        for d in &r.diagnostics { let _ = writeln!(out, "warning: {}: {}", d.location, d.message); }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_all_mk, AttrIR, FieldIR, StructIR};
    use crate::reflect::reflect;

    fn sample() -> HeaderIR {
        HeaderIR {
            structs: vec![
                StructIR {
                    name: "Quad".into(),
                    attrs: vec![AttrIR::annotate("mk::struct(tag=vertex)"), AttrIR { kind: "PackedAttr".into(), annotation: None }],
                    fields: vec![
                        FieldIR { name: "xy".into(), type_name: "float[2]".into(), attrs: vec![AttrIR::annotate("mk::vertex(location=0,format=vec2)")] },
                        FieldIR { name: "type".into(), type_name: "unsigned int".into(), attrs: vec![] },
                    ],
                },
                StructIR {
                    name: "Globals".into(),
                    attrs: vec![],
                    fields: vec![FieldIR {
                        name: "camera".into(),
                        type_name: "Camera".into(),
                        attrs: vec![AttrIR::annotate("mk::resource(kind=uniform,set=0,binding=0,stages=\"vs|fs\")")],
                    }],
                },
            ],
        }
    }

    #[test]
    fn cpp_header_echoes_annotations() {
        let h = emit_cpp_header(&sample(), Some("gen"));
        assert!(h.contains("namespace gen {"));
        assert!(h.contains("// @[PackedAttr]\nstruct __attribute__((annotate(\"mk::struct(tag=vertex)\"))) Quad {"), "{h}");
        assert!(h.contains("    float __attribute__((annotate(\"mk::vertex(location=0,format=vec2)\"))) xy[2];"), "{h}");
        assert!(h.contains("    unsigned int type;"));
        assert!(h.contains(r#"annotate("mk::resource(kind=uniform,set=0,binding=0,stages=\"vs|fs\")")"#), "{h}");
        assert!(h.trim_end().ends_with("} // namespace gen"));
    }

    #[test]
    fn rust_module_uses_derive_attributes() {
        let parsed = parse_all_mk(&sample()).unwrap();
        let src = emit_rust_module(&parsed).unwrap();
        assert!(src.contains("#[mk(tag = \"vertex\")]\npub struct Quad {"), "{src}");
        assert!(src.contains("    #[mk(vertex(location = 0, format = \"vec2\"))]\n    pub xy: [f32; 2],"), "{src}");
        assert!(src.contains("    pub r#type: u32,"), "{src}");
        assert!(src.contains("#[mk(resource(kind = \"uniform\", set = 0, binding = 0, stages = \"vs|fs\"))]"), "{src}");
        assert!(src.contains("    pub camera: Camera,"));
    }

    #[test]
    fn struct_arguments_beyond_tag_are_kept() {
        let mut ir = sample();
        ir.structs[0].attrs[0] = AttrIR::annotate("mk::struct(tag=vertex,pack=4)");
        ir.structs[1].attrs.push(AttrIR::annotate("mk::cache"));
        let src = emit_rust_module(&parse_all_mk(&ir).unwrap()).unwrap();
        assert!(src.contains("#[mk(tag = \"vertex\", pack = 4)]\npub struct Quad {"), "{src}");
        assert!(src.contains("#[mk(cache)]\npub struct Globals {"), "{src}");
    }

    #[test]
    fn rust_module_rejects_unknown_arrays() {
        let mut ir = sample();
        ir.structs[1].fields[0].type_name = "Camera[2]".into();
        assert!(emit_rust_module(&parse_all_mk(&ir).unwrap()).is_err());
    }

    #[test]
    fn summary_lists_layouts_and_bindings() {
        let r = reflect(&parse_all_mk(&sample()).unwrap()).unwrap();
        let s = emit_summary(&r);
        assert!(s.contains("Quad tag=vertex stride=12 step=vertex"), "{s}");
        assert!(s.contains("  field=xy location=0 binding=0 format=vec2 offset=0 size=8"), "{s}");
        assert!(s.contains("Globals.camera set=0 binding=0 kind=uniform stages=vs|fs"), "{s}");
        assert!(!s.contains("Diagnostics"));
    }
}
