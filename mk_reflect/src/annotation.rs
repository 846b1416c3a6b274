//! The `mk::` annotation grammar.
//!
//! Annotations are plain strings attached to declarations, for example
//! `mk::vertex(location=1,format=vec3)`. Parsing keeps the original text in
//! [`MkAnnotation::raw`] so that tools echoing an annotation reproduce it byte
//! for byte; [`MkAnnotation::canonical`] re-renders the parsed form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

pub const PREFIX: &str = "mk::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MkAnnotationKind { Struct, Vertex, Resource, Other(String) }

impl MkAnnotationKind {
    pub fn as_str(&self) -> &str {
        match self {
            MkAnnotationKind::Struct => "struct",
            MkAnnotationKind::Vertex => "vertex",
            MkAnnotationKind::Resource => "resource",
            MkAnnotationKind::Other(s) => s.as_str(),
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "struct" => MkAnnotationKind::Struct,
            "vertex" => MkAnnotationKind::Vertex,
            "resource" => MkAnnotationKind::Resource,
            other => MkAnnotationKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkAnnotation {
    pub kind: MkAnnotationKind,
    /// Arguments in source order.
    pub args: Vec<(String, String)>,
    pub raw: String,
}

/// Cheap prefix check used to skip annotations that belong to other tools.
pub fn is_mk_annotation(s: &str) -> bool { s.trim_start().starts_with(PREFIX) }

fn is_ident_start(c: u8) -> bool { c.is_ascii_alphabetic() || c == b'_' }
fn is_ident_char(c: u8) -> bool { c.is_ascii_alphanumeric() || c == b'_' }

struct Cursor<'a> { s: &'a str, i: usize }

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> { self.s.as_bytes().get(self.i).copied() }
    fn skip_ws(&mut self) { while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) { self.i += 1; } }
    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) { self.i += 1; true } else { false }
    }
    fn ident(&mut self) -> Option<&'a str> {
        let start = self.i;
        if !matches!(self.peek(), Some(c) if is_ident_start(c)) { return None; }
        self.i += 1;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) { self.i += 1; }
        Some(&self.s[start..self.i])
    }
    fn value(&mut self) -> Result<String, AnnotationError> {
        if self.peek() == Some(b'"') {
            let open = self.i;
            self.i += 1;
            let start = self.i;
            while matches!(self.peek(), Some(c) if c != b'"') { self.i += 1; }
            if self.peek().is_none() { return Err(AnnotationError::UnterminatedString(open)); }
            let v = self.s[start..self.i].to_string();
            self.i += 1;
            Ok(v)
        } else {
            let start = self.i;
            while matches!(self.peek(), Some(c) if c != b',' && c != b')') { self.i += 1; }
            Ok(self.s[start..self.i].trim().to_string())
        }
    }
}

/// Parse strings like `mk::vertex(location=1,format=vec3)` into a typed form.
pub fn parse_mk_annotation(s: &str) -> Result<MkAnnotation, AnnotationError> {
    let s = s.trim();
    let Some(rest) = s.strip_prefix(PREFIX) else {
        return Err(AnnotationError::MissingPrefix(s.to_string()));
    };
    let mut cur = Cursor { s, i: s.len() - rest.len() };
    let name = cur.ident().ok_or(AnnotationError::MissingName(cur.i))?;
    let kind = MkAnnotationKind::from_name(name);

    let mut args: Vec<(String, String)> = Vec::new();
    cur.skip_ws();
    if cur.eat(b'(') {
        loop {
            cur.skip_ws();
            match cur.peek() {
                None => return Err(AnnotationError::UnterminatedArgs),
                Some(b')') if args.is_empty() => { cur.i += 1; break; }
                _ => {}
            }
            let key = cur.ident().ok_or(AnnotationError::MissingKey(cur.i))?.to_string();
            cur.skip_ws();
            if !cur.eat(b'=') {
                return Err(AnnotationError::MissingEquals { key, at: cur.i });
            }
            cur.skip_ws();
            let val = cur.value()?;
            if args.iter().any(|(k, _)| *k == key) {
                return Err(AnnotationError::DuplicateKey(key));
            }
            args.push((key, val));
            cur.skip_ws();
            if cur.eat(b',') { continue; }
            if cur.eat(b')') { break; }
            return Err(AnnotationError::UnterminatedArgs);
        }
        cur.skip_ws();
    }
    if cur.i < s.len() {
        return Err(AnnotationError::TrailingInput(cur.i));
    }
    Ok(MkAnnotation { kind, args, raw: s.to_string() })
}

fn needs_quotes(v: &str) -> bool {
    v.is_empty() || v.bytes().any(|c| matches!(c, b',' | b'(' | b')') || c.is_ascii_whitespace())
}

impl MkAnnotation {
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, AnnotationError> {
        self.arg(key).ok_or_else(|| AnnotationError::MissingArg { key: key.to_string(), annotation: self.raw.clone() })
    }

    pub fn arg_u32(&self, key: &str) -> Result<Option<u32>, AnnotationError> {
        match self.arg(key) {
            None => Ok(None),
            Some(v) => v.parse::<u32>().map(Some).map_err(|_| AnnotationError::NotAnInteger {
                key: key.to_string(),
                value: v.to_string(),
            }),
        }
    }

    pub fn require_u32(&self, key: &str) -> Result<u32, AnnotationError> {
        self.require(key)?;
        self.arg_u32(key).map(|v| v.unwrap_or_default())
    }

    /// Re-render as `mk::name(k=v,...)` with no whitespace, arguments in source order.
    pub fn canonical(&self) -> String {
        let mut out = format!("{}{}", PREFIX, self.kind.as_str());
        if !self.args.is_empty() {
            let args: Vec<String> = self
                .args
                .iter()
                .map(|(k, v)| if needs_quotes(v) { format!("{k}=\"{v}\"") } else { format!("{k}={v}") })
                .collect();
            out.push('(');
            out.push_str(&args.join(","));
            out.push(')');
        }
        out
    }

    fn expect_kind(&self, expected: MkAnnotationKind) -> Result<(), AnnotationError> {
        if self.kind == expected { return Ok(()); }
        let name = match expected {
            MkAnnotationKind::Struct => "struct",
            MkAnnotationKind::Vertex => "vertex",
            MkAnnotationKind::Resource => "resource",
            MkAnnotationKind::Other(_) => "other",
        };
        Err(AnnotationError::WrongKind { expected: name, got: self.raw.clone() })
    }

    pub fn as_struct_tag(&self) -> Result<StructTag, AnnotationError> {
        self.expect_kind(MkAnnotationKind::Struct)?;
        Ok(StructTag::from_name(self.require("tag")?))
    }

    pub fn as_vertex(&self) -> Result<VertexAnnotation, AnnotationError> {
        self.expect_kind(MkAnnotationKind::Vertex)?;
        let location = self.require_u32("location")?;
        let binding = self.arg_u32("binding")?.unwrap_or(0);
        let format = self.arg("format").map(VertexFormat::parse).transpose()?;
        Ok(VertexAnnotation { location, binding, format })
    }

    pub fn as_resource(&self) -> Result<ResourceAnnotation, AnnotationError> {
        self.expect_kind(MkAnnotationKind::Resource)?;
        let kind = ResourceKind::parse(self.require("kind")?)?;
        let set = self.require_u32("set")?;
        let binding = self.require_u32("binding")?;
        let stages = self.arg("stages").map(StageMask::parse).transpose()?;
        Ok(ResourceAnnotation { kind, set, binding, stages })
    }
}

impl fmt::Display for MkAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructTag { Vertex, Instance, Other(String) }

impl StructTag {
    fn from_name(s: &str) -> Self {
        match s {
            "vertex" => StructTag::Vertex,
            "instance" => StructTag::Instance,
            other => StructTag::Other(other.to_string()),
        }
    }

    pub fn is_vertex_input(&self) -> bool { matches!(self, StructTag::Vertex | StructTag::Instance) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexFormat { F32, U32, I32, Vec2, Vec3, Vec4, Mat4, Rgba8Unorm }

impl VertexFormat {
    pub fn parse(s: &str) -> Result<Self, AnnotationError> {
        Ok(match s {
            "f32" => VertexFormat::F32,
            "u32" => VertexFormat::U32,
            "i32" => VertexFormat::I32,
            "vec2" => VertexFormat::Vec2,
            "vec3" => VertexFormat::Vec3,
            "vec4" => VertexFormat::Vec4,
            "mat4" => VertexFormat::Mat4,
            "rgba8_unorm" | "u8x4_norm" => VertexFormat::Rgba8Unorm,
            other => return Err(AnnotationError::UnknownFormat(other.to_string())),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VertexFormat::F32 => "f32",
            VertexFormat::U32 => "u32",
            VertexFormat::I32 => "i32",
            VertexFormat::Vec2 => "vec2",
            VertexFormat::Vec3 => "vec3",
            VertexFormat::Vec4 => "vec4",
            VertexFormat::Mat4 => "mat4",
            VertexFormat::Rgba8Unorm => "rgba8_unorm",
        }
    }

    pub fn size(self) -> u32 {
        match self {
            VertexFormat::F32 | VertexFormat::U32 | VertexFormat::I32 | VertexFormat::Rgba8Unorm => 4,
            VertexFormat::Vec2 => 8,
            VertexFormat::Vec3 => 12,
            VertexFormat::Vec4 => 16,
            VertexFormat::Mat4 => 64,
        }
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind { Uniform, Storage, Texture, Sampler, CombinedImageSampler }

impl ResourceKind {
    pub fn parse(s: &str) -> Result<Self, AnnotationError> {
        Ok(match s {
            "uniform" => ResourceKind::Uniform,
            "storage" => ResourceKind::Storage,
            "texture" => ResourceKind::Texture,
            "sampler" => ResourceKind::Sampler,
            "combined" => ResourceKind::CombinedImageSampler,
            other => return Err(AnnotationError::UnknownResourceKind(other.to_string())),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Uniform => "uniform",
            ResourceKind::Storage => "storage",
            ResourceKind::Texture => "texture",
            ResourceKind::Sampler => "sampler",
            ResourceKind::CombinedImageSampler => "combined",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMask { pub vs: bool, pub fs: bool, pub cs: bool }

impl StageMask {
    /// Parse `vs|fs`, `vertex,fragment`, `comp` and similar lists.
    pub fn parse(s: &str) -> Result<Self, AnnotationError> {
        let mut mask = StageMask::default();
        for part in s.split(['|', ',', ' ']) {
            match part.trim().to_lowercase().as_str() {
                "vs" | "vert" | "vertex" => mask.vs = true,
                "fs" | "frag" | "fragment" => mask.fs = true,
                "cs" | "comp" | "compute" => mask.cs = true,
                "" => {}
                other => return Err(AnnotationError::UnknownStage(other.to_string())),
            }
        }
        Ok(mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAnnotation { pub location: u32, pub binding: u32, pub format: Option<VertexFormat> }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAnnotation { pub kind: ResourceKind, pub set: u32, pub binding: u32, pub stages: Option<StageMask> }
