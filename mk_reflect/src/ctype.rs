//! Minimal model of the C field types that can appear in annotated records.
//!
//! Types come from two places: clang's `qualType` strings (`float[3]`,
//! `const int`, `uint8_t[4]`) and Rust type paths rendered by the derive
//! (`[f32; 3]`, `i32`). Both map onto the same [`CType`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotation::VertexFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar { Bool, Char, I8, U8, I16, U16, I32, U32, Long, ULong, I64, U64, F32, F64 }

impl Scalar {
    pub fn size(self) -> u32 {
        match self {
            Scalar::Bool | Scalar::Char | Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            // LP64
            Scalar::Long | Scalar::ULong | Scalar::I64 | Scalar::U64 | Scalar::F64 => 8,
        }
    }

    pub fn align(self) -> u32 { self.size() }

    fn from_c(name: &str) -> Option<Self> {
        Some(match name {
            "bool" | "_Bool" => Scalar::Bool,
            "char" => Scalar::Char,
            "signed char" | "int8_t" => Scalar::I8,
            "unsigned char" | "uint8_t" => Scalar::U8,
            "short" | "short int" | "signed short" | "int16_t" => Scalar::I16,
            "unsigned short" | "unsigned short int" | "uint16_t" => Scalar::U16,
            "int" | "signed int" | "signed" | "int32_t" => Scalar::I32,
            "unsigned int" | "unsigned" | "uint32_t" => Scalar::U32,
            "long" | "long int" | "signed long" | "signed long int" => Scalar::Long,
            "unsigned long" | "unsigned long int" => Scalar::ULong,
            "long long" | "long long int" | "signed long long" | "int64_t" => Scalar::I64,
            "unsigned long long" | "unsigned long long int" | "uint64_t" => Scalar::U64,
            "float" => Scalar::F32,
            "double" => Scalar::F64,
            _ => return None,
        })
    }

    fn from_rust(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Scalar::Bool,
            "c_char" => Scalar::Char,
            "i8" | "c_schar" => Scalar::I8,
            "u8" | "c_uchar" => Scalar::U8,
            "i16" | "c_short" => Scalar::I16,
            "u16" | "c_ushort" => Scalar::U16,
            "i32" | "c_int" => Scalar::I32,
            "u32" | "c_uint" => Scalar::U32,
            "c_long" => Scalar::Long,
            "c_ulong" => Scalar::ULong,
            "i64" | "c_longlong" => Scalar::I64,
            "u64" | "c_ulonglong" => Scalar::U64,
            "f32" | "c_float" => Scalar::F32,
            "f64" | "c_double" => Scalar::F64,
            _ => return None,
        })
    }

    pub fn c_name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::I8 => "signed char",
            Scalar::U8 => "unsigned char",
            Scalar::I16 => "short",
            Scalar::U16 => "unsigned short",
            Scalar::I32 => "int",
            Scalar::U32 => "unsigned int",
            Scalar::Long => "long",
            Scalar::ULong => "unsigned long",
            Scalar::I64 => "long long",
            Scalar::U64 => "unsigned long long",
            Scalar::F32 => "float",
            Scalar::F64 => "double",
        }
    }

    pub fn rust_name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Char => "core::ffi::c_char",
            Scalar::I8 => "i8",
            Scalar::U8 => "u8",
            Scalar::I16 => "i16",
            Scalar::U16 => "u16",
            Scalar::I32 => "i32",
            Scalar::U32 => "u32",
            Scalar::Long => "core::ffi::c_long",
            Scalar::ULong => "core::ffi::c_ulong",
            Scalar::I64 => "i64",
            Scalar::U64 => "u64",
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
        }
    }
}

/// A scalar with zero or more array dimensions, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CType { pub scalar: Scalar, pub dims: Vec<u32> }

const QUALIFIERS: [&str; 3] = ["const", "volatile", "struct"];

impl CType {
    /// Parse a clang `qualType` such as `const float[2]` or `float[4][4]`.
    pub fn parse_c(qual_type: &str) -> Option<Self> {
        let s = qual_type.trim();
        let (base, dims_src) = match s.find('[') {
            Some(i) => (&s[..i], &s[i..]),
            None => (s, ""),
        };
        let base: Vec<&str> = base.split_whitespace().filter(|w| !QUALIFIERS.contains(w)).collect();
        let scalar = Scalar::from_c(&base.join(" "))?;
        let mut dims = Vec::new();
        let mut rest = dims_src.trim();
        while let Some(r) = rest.strip_prefix('[') {
            let close = r.find(']')?;
            dims.push(r[..close].trim().parse().ok()?);
            rest = r[close + 1..].trim_start();
        }
        if !rest.is_empty() { return None; }
        Some(CType { scalar, dims })
    }

    /// Parse a Rust type as written in source, e.g. `[f32; 3]` or `[[f32; 4]; 4]`.
    pub fn parse_rust(ty: &str) -> Option<Self> {
        let compact: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
        Self::parse_rust_compact(&compact)
    }

    fn parse_rust_compact(s: &str) -> Option<Self> {
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (elem, len) = inner.rsplit_once(';')?;
            let mut ty = Self::parse_rust_compact(elem)?;
            ty.dims.insert(0, len.trim_end_matches("usize").parse().ok()?);
            return Some(ty);
        }
        let last = s.rsplit("::").next().unwrap_or(s);
        Some(CType { scalar: Scalar::from_rust(last)?, dims: Vec::new() })
    }

    /// `None` when the product does not fit in `u32`.
    pub fn element_count(&self) -> Option<u32> {
        self.dims.iter().try_fold(1u32, |n, d| n.checked_mul(*d))
    }

    pub fn size(&self) -> Option<u32> { self.element_count()?.checked_mul(self.scalar.size()) }
    pub fn align(&self) -> u32 { self.scalar.align() }

    /// Clang's spelling, e.g. `float[3]`.
    pub fn c_type_name(&self) -> String {
        let mut s = self.scalar.c_name().to_string();
        for d in &self.dims { s.push_str(&format!("[{d}]")); }
        s
    }

    pub fn rust_type(&self) -> String {
        let mut s = self.scalar.rust_name().to_string();
        for d in self.dims.iter().rev() { s = format!("[{s}; {d}]"); }
        s
    }

    /// Vertex format implied by the type alone.
    pub fn infer_format(&self) -> Option<VertexFormat> {
        Some(match (self.scalar, self.dims.as_slice()) {
            (Scalar::F32, []) | (Scalar::F32, [1]) => VertexFormat::F32,
            (Scalar::F32, [2]) => VertexFormat::Vec2,
            (Scalar::F32, [3]) => VertexFormat::Vec3,
            (Scalar::F32, [4]) => VertexFormat::Vec4,
            (Scalar::F32, [4, 4]) | (Scalar::F32, [16]) => VertexFormat::Mat4,
            (Scalar::U32, []) => VertexFormat::U32,
            (Scalar::I32, []) => VertexFormat::I32,
            (Scalar::U8, [4]) => VertexFormat::Rgba8Unorm,
            _ => return None,
        })
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.c_type_name()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clang_qual_types() {
        let t = CType::parse_c("float[3]").unwrap();
        assert_eq!(t, CType { scalar: Scalar::F32, dims: vec![3] });
        assert_eq!(t.size(), Some(12));
        assert_eq!(CType::parse_c("int").unwrap().size(), Some(4));
        assert_eq!(CType::parse_c("const float [2]").unwrap().dims, vec![2]);
        assert_eq!(CType::parse_c("unsigned int").unwrap().scalar, Scalar::U32);
        let m = CType::parse_c("float[4][4]").unwrap();
        assert_eq!((m.element_count(), m.size()), (Some(16), Some(64)));
        assert_eq!(CType::parse_c("uint8_t[4]").unwrap().infer_format(), Some(VertexFormat::Rgba8Unorm));
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(CType::parse_c("Matrices").is_none());
        assert!(CType::parse_c("float[N]").is_none());
        assert!(CType::parse_c("float[3] x").is_none());
        assert!(CType::parse_rust("Vec3").is_none());
    }

    #[test]
    fn rust_and_c_spellings_agree() {
        let r = CType::parse_rust("[f32 ; 3]").unwrap();
        assert_eq!(r.c_type_name(), "float[3]");
        assert_eq!(r.rust_type(), "[f32; 3]");
        assert_eq!(CType::parse_rust("i32").unwrap().c_type_name(), "int");
        let m = CType::parse_rust("[[f32; 4]; 4]").unwrap();
        assert_eq!(m, CType::parse_c("float[4][4]").unwrap());
        assert_eq!(m.rust_type(), "[[f32; 4]; 4]");
        assert_eq!(CType::parse_rust("::core::primitive::u32").unwrap().scalar, Scalar::U32);
    }

    #[test]
    fn huge_arrays_do_not_wrap() {
        let t = CType::parse_c("float[2000000000]").unwrap();
        assert_eq!(t.element_count(), Some(2_000_000_000));
        assert_eq!(t.size(), None);
        assert_eq!(CType::parse_c("int[65536][65536]").unwrap().element_count(), None);
    }

    #[test]
    fn char_and_long_keep_their_c_spelling() {
        let c = CType::parse_c("char[16]").unwrap();
        assert_eq!(c.rust_type(), "[core::ffi::c_char; 16]");
        assert_eq!(CType::parse_rust(&c.rust_type()).unwrap().c_type_name(), "char[16]");
        assert_eq!(CType::parse_c("signed char").unwrap().rust_type(), "i8");
        assert_eq!(CType::parse_rust("i8").unwrap().c_type_name(), "signed char");

        let l = CType::parse_c("unsigned long").unwrap();
        assert_eq!((l.scalar, l.size()), (Scalar::ULong, Some(8)));
        assert_eq!(CType::parse_rust(&l.rust_type()).unwrap().c_type_name(), "unsigned long");
        assert_eq!(CType::parse_c("long int").unwrap().c_type_name(), "long");
        assert_eq!(CType::parse_rust("std::os::raw::c_long").unwrap().scalar, Scalar::Long);
    }

    #[test]
    fn inferred_formats() {
        assert_eq!(CType::parse_c("float[3]").unwrap().infer_format(), Some(VertexFormat::Vec3));
        assert_eq!(CType::parse_c("float[2]").unwrap().infer_format(), Some(VertexFormat::Vec2));
        assert_eq!(CType::parse_c("double[3]").unwrap().infer_format(), None);
    }
}
