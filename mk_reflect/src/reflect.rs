//! Turn parsed annotations into vertex-input layouts and resource bindings.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::annotation::{MkAnnotation, MkAnnotationKind, ResourceKind, StageMask, StructTag, VertexFormat};
use crate::ctype::CType;
use crate::error::{AnnotationError, ReflectError};
use crate::ir::{ParsedHeaderMk, ParsedStructMk};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout { pub name: String, pub ctype: CType, pub offset: u32, pub size: u32 }

/// C layout of a record: natural alignment, padding between fields, size rounded to alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructLayout { pub name: String, pub fields: Vec<FieldLayout>, pub size: u32, pub align: u32 }

impl StructLayout {
    /// Fails on unknown field types and on layouts that do not fit in `u32` bytes.
    pub fn compute(st: &ParsedStructMk) -> Result<Self, ReflectError> {
        let mut fields = Vec::with_capacity(st.fields.len());
        let mut offset = 0u32;
        let mut align = 1u32;
        for f in &st.fields {
            let location = || format!("{}.{}", st.name, f.name);
            let ctype = CType::parse_c(&f.type_name)
                .ok_or_else(|| ReflectError::UnknownType { location: location(), type_name: f.type_name.clone() })?;
            let overflow = || ReflectError::LayoutOverflow { location: location() };
            offset = offset.checked_next_multiple_of(ctype.align()).ok_or_else(overflow)?;
            align = align.max(ctype.align());
            let size = ctype.size().ok_or_else(overflow)?;
            fields.push(FieldLayout { name: f.name.clone(), ctype, offset, size });
            offset = offset.checked_add(size).ok_or_else(overflow)?;
        }
        let size = offset
            .checked_next_multiple_of(align)
            .ok_or_else(|| ReflectError::LayoutOverflow { location: st.name.clone() })?;
        Ok(StructLayout { name: st.name.clone(), fields, size, align })
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> { self.fields.iter().find(|f| f.name == name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode { Vertex, Instance }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexBufferDesc { pub binding: u32, pub stride: u32, pub step: StepMode }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAttr {
    pub field: String,
    pub binding: u32,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexLayout {
    pub struct_name: String,
    pub tag: Option<StructTag>,
    pub attrs: Vec<VertexAttr>,
    pub buffers: Vec<VertexBufferDesc>,
    pub layout: StructLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDesc {
    pub struct_name: String,
    pub field: String,
    pub set: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    pub stages: Option<StageMask>,
}

/// A finding that does not stop reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic { pub location: String, pub message: String }

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub vertex_layouts: Vec<VertexLayout>,
    pub bindings: Vec<BindingDesc>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reflection {
    pub fn vertex_layout(&self, struct_name: &str) -> Option<&VertexLayout> {
        self.vertex_layouts.iter().find(|v| v.struct_name == struct_name)
    }
}

struct Ctx {
    errors: Vec<ReflectError>,
    diagnostics: Vec<Diagnostic>,
}

impl Ctx {
    fn warn(&mut self, location: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("{location}: {message}");
        self.diagnostics.push(Diagnostic { location: location.to_string(), message });
    }

    fn annotation<T>(&mut self, location: &str, r: Result<T, AnnotationError>) -> Option<T> {
        r.map_err(|source| self.errors.push(ReflectError::Annotation { location: location.to_string(), source })).ok()
    }
}

fn of_kind<'a>(attrs: &'a [MkAnnotation], kind: &MkAnnotationKind) -> Vec<&'a MkAnnotation> {
    attrs.iter().filter(|a| a.kind == *kind).collect()
}

fn single<'a>(
    ctx: &mut Ctx,
    location: &str,
    attrs: &'a [MkAnnotation],
    kind: MkAnnotationKind,
    name: &'static str,
) -> Option<&'a MkAnnotation> {
    let found = of_kind(attrs, &kind);
    if found.len() > 1 {
        ctx.errors.push(ReflectError::DuplicateAnnotation { location: location.to_string(), kind: name });
        return None;
    }
    found.first().copied()
}

fn note_foreign(ctx: &mut Ctx, location: &str, attrs: &[MkAnnotation], allowed: &[MkAnnotationKind]) {
    for a in attrs.iter().filter(|a| !allowed.contains(&a.kind)) {
        match &a.kind {
            MkAnnotationKind::Other(name) => ctx.warn(location, format!("unknown annotation 'mk::{name}' ignored")),
            _ => ctx.warn(location, format!("'{}' has no meaning here and is ignored", a.raw)),
        }
    }
}

fn reflect_vertex(ctx: &mut Ctx, st: &ParsedStructMk, tag: Option<StructTag>) -> Option<VertexLayout> {
    let layout = match StructLayout::compute(st) {
        Ok(l) => l,
        Err(e) => { ctx.errors.push(e); return None; }
    };
    let mut attrs: Vec<VertexAttr> = Vec::new();
    let mut seen: HashMap<(u32, u32), String> = HashMap::new();
    for (f, fl) in st.fields.iter().zip(&layout.fields) {
        let location = format!("{}.{}", st.name, f.name);
        let Some(a) = single(ctx, &location, &f.field_attrs, MkAnnotationKind::Vertex, "vertex") else {
            debug!("{location}: not a vertex input");
            continue;
        };
        let Some(v) = ctx.annotation(&location, a.as_vertex()) else { continue };
        let format = match v.format {
            Some(fmt) if fmt.size() != fl.size => {
                ctx.errors.push(ReflectError::FormatSizeMismatch {
                    location,
                    format: fmt.to_string(),
                    format_size: fmt.size(),
                    type_name: f.type_name.clone(),
                    type_size: fl.size,
                });
                continue;
            }
            Some(fmt) => fmt,
            None => match fl.ctype.infer_format() {
                Some(fmt) => fmt,
                None => {
                    let missing = AnnotationError::MissingArg { key: "format".to_string(), annotation: a.raw.clone() };
                    ctx.errors.push(ReflectError::Annotation { location, source: missing });
                    continue;
                }
            },
        };
        if let Some(first) = seen.get(&(v.binding, v.location)) {
            ctx.errors.push(ReflectError::DuplicateLocation {
                location,
                binding: v.binding,
                loc: v.location,
                first: first.clone(),
            });
            continue;
        }
        seen.insert((v.binding, v.location), f.name.clone());
        attrs.push(VertexAttr {
            field: f.name.clone(),
            binding: v.binding,
            location: v.location,
            format,
            offset: fl.offset,
            size: fl.size,
        });
    }
    attrs.sort_by_key(|a| (a.binding, a.location));

    let step = if tag == Some(StructTag::Instance) { StepMode::Instance } else { StepMode::Vertex };
    let bindings: BTreeSet<u32> = attrs.iter().map(|a| a.binding).collect();
    let buffers = bindings.into_iter().map(|binding| VertexBufferDesc { binding, stride: layout.size, step }).collect();
    Some(VertexLayout { struct_name: st.name.clone(), tag, attrs, buffers, layout })
}

/// Build vertex layouts and resource bindings for every record in `parsed`.
///
/// All errors are collected before returning; warnings land in
/// [`Reflection::diagnostics`].
pub fn reflect(parsed: &ParsedHeaderMk) -> Result<Reflection, ReflectError> {
    let mut ctx = Ctx { errors: Vec::new(), diagnostics: Vec::new() };
    let mut out = Reflection::default();
    let mut bound: HashMap<(u32, u32), String> = HashMap::new();

    for st in &parsed.structs {
        note_foreign(&mut ctx, &st.name, &st.struct_attrs, &[MkAnnotationKind::Struct]);
        let tag = single(&mut ctx, &st.name, &st.struct_attrs, MkAnnotationKind::Struct, "struct")
            .and_then(|a| ctx.annotation(&st.name, a.as_struct_tag()));
        let is_input = tag.as_ref().is_some_and(StructTag::is_vertex_input);
        let has_vertex_fields = st
            .fields
            .iter()
            .any(|f| f.field_attrs.iter().any(|a| a.kind == MkAnnotationKind::Vertex));

        for f in &st.fields {
            let location = format!("{}.{}", st.name, f.name);
            note_foreign(&mut ctx, &location, &f.field_attrs, &[MkAnnotationKind::Vertex, MkAnnotationKind::Resource]);
            let Some(a) = single(&mut ctx, &location, &f.field_attrs, MkAnnotationKind::Resource, "resource") else {
                continue;
            };
            let Some(r) = ctx.annotation(&location, a.as_resource()) else { continue };
            if let Some(first) = bound.get(&(r.set, r.binding)) {
                ctx.errors.push(ReflectError::DuplicateBinding {
                    set: r.set,
                    binding: r.binding,
                    first: first.clone(),
                    second: location,
                });
                continue;
            }
            bound.insert((r.set, r.binding), location);
            out.bindings.push(BindingDesc {
                struct_name: st.name.clone(),
                field: f.name.clone(),
                set: r.set,
                binding: r.binding,
                kind: r.kind,
                stages: r.stages,
            });
        }

        if has_vertex_fields && !is_input {
            ctx.warn(&st.name, "vertex attributes on a struct not tagged 'mk::struct(tag=vertex)'");
        }
        if is_input && !has_vertex_fields {
            ctx.warn(&st.name, "vertex struct has no 'mk::vertex' fields");
        }
        if has_vertex_fields || is_input {
            if let Some(vl) = reflect_vertex(&mut ctx, st, tag) {
                out.vertex_layouts.push(vl);
            }
        }
    }

    out.bindings.sort_by_key(|b| (b.set, b.binding));
    out.diagnostics = ctx.diagnostics;
    match ReflectError::combine(ctx.errors) {
        Some(e) => Err(e),
        None => Ok(out),
    }
}
