use std::mem::{offset_of, size_of};

use mk_reflect::emit::emit_cpp_header;
use mk_reflect::{analyze_ast_json, MkReflect};
use mk_reflect_demo::{demo_ir, demo_reflection, DemoVertex, Material};

const AST: &str = include_str!("../../mk_reflect/tests/fixtures/demo_ast.json");
const HEADER: &str = include_str!("../../include/demo.hpp");

#[test]
fn rust_declarations_match_the_header() {
    let from_header = analyze_ast_json(AST.as_bytes(), Some(HEADER)).unwrap();
    assert_eq!(demo_ir(), from_header);
}

#[test]
fn annotations_render_like_the_header() {
    assert_eq!(DemoVertex::mk_decl().annotations, &["mk::struct(tag=vertex)"]);
    let fields: Vec<_> = DemoVertex::mk_decl().fields.iter().map(|f| (f.name, f.annotations)).collect();
    assert_eq!(
        fields,
        vec![
            ("pos", &[][..]),
            ("normal", &["mk::vertex(location=1,format=vec3)"][..]),
            ("uv", &["mk::vertex(location=2,format=vec2)"][..]),
        ]
    );
    assert_eq!(Material::mk_decl().fields[0].annotations, &["mk::resource(kind=uniform,set=0,binding=0)"]);
    for d in [DemoVertex::mk_decl(), Material::mk_decl()] {
        for a in d.annotations.iter().chain(d.fields.iter().flat_map(|f| f.annotations.iter())) {
            assert!(HEADER.contains(&format!("annotate(\"{a}\")")), "{a} not in header");
        }
    }
}

#[test]
fn reflected_offsets_match_rust_layout() {
    let r = demo_reflection().unwrap();
    let vl = r.vertex_layout("DemoVertex").unwrap();
    assert_eq!(vl.layout.size as usize, size_of::<DemoVertex>());
    assert_eq!(vl.buffers[0].stride as usize, size_of::<DemoVertex>());
    let offsets: Vec<_> = vl.attrs.iter().map(|a| (a.field.as_str(), a.offset as usize)).collect();
    assert_eq!(offsets, vec![("normal", offset_of!(DemoVertex, normal)), ("uv", offset_of!(DemoVertex, uv))]);
    assert_eq!(vl.layout.field("pos").unwrap().offset as usize, offset_of!(DemoVertex, pos));
}

#[test]
fn material_is_independent_of_the_vertex() {
    let r = demo_reflection().unwrap();
    assert!(r.vertex_layout("Material").is_none());
    assert_eq!(r.bindings.len(), 1);
    assert_eq!(r.bindings[0].struct_name, "Material");
    assert!(r.diagnostics.is_empty());
}

#[test]
fn regenerated_header_round_trips_through_the_rust_side() {
    let text = emit_cpp_header(&demo_ir(), None);
    for line in [
        "struct __attribute__((annotate(\"mk::struct(tag=vertex)\"))) DemoVertex {",
        "    float pos[3];",
        "    float __attribute__((annotate(\"mk::vertex(location=1,format=vec3)\"))) normal[3];",
        "    float __attribute__((annotate(\"mk::vertex(location=2,format=vec2)\"))) uv[2];",
        "struct Material {",
        "    int __attribute__((annotate(\"mk::resource(kind=uniform,set=0,binding=0)\"))) id;",
    ] {
        assert!(text.contains(line), "missing {line:?} in\n{text}");
        assert!(HEADER.contains(line), "header differs at {line:?}");
    }
}
