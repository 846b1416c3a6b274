//! The records from `include/demo.hpp`, declared in Rust.
//!
//! Field order and types match the header exactly, so the derived
//! declarations reflect to the same IR as the clang path.

use mk_reflect::decl::{header_from_decls, reflect_decls};
use mk_reflect::{HeaderIR, MkReflect, ReflectError, Reflection};
use mk_reflect_derive::MkStruct;

#[derive(Debug, Clone, Copy, Default, PartialEq, MkStruct)]
#[repr(C)]
#[mk(tag = "vertex")]
pub struct DemoVertex {
    pub pos: [f32; 3],
    #[mk(vertex(location = 1, format = "vec3"))]
    pub normal: [f32; 3],
    #[mk(vertex(location = 2, format = "vec2"))]
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, MkStruct)]
#[repr(C)]
pub struct Material {
    #[mk(resource(kind = "uniform", set = 0, binding = 0))]
    pub id: i32,
}

/// Both records as raw IR, in header order.
pub fn demo_ir() -> HeaderIR {
    header_from_decls(&[DemoVertex::mk_decl(), Material::mk_decl()])
}

pub fn demo_reflection() -> Result<Reflection, ReflectError> {
    reflect_decls(&[DemoVertex::mk_decl(), Material::mk_decl()])
}
