//! Vertex input layouts
//!
//! An input layout describes where each vertex-program input lives in a raw
//! vertex buffer: attribute `i` of vertex `n` is read from byte offset
//! `offset_i + n * stride_i`, as little-endian `f32` components.
//!
//! Layouts are built with an [`InputLayoutBuilder`] and compiled into a blob:
//!
//! | Offset | Value                                        |
//! |--------|----------------------------------------------|
//! | 0      | magic number, `b"SGIL"`                      |
//! | 4      | format version ([`VERSION`])                 |
//! | 8      | attribute count                              |
//!
//! followed by one 12-byte record per attribute: an [`Arity`] byte, three
//! reserved zero bytes, then the byte offset and stride as `u32` values.
use crate::{Error, shader::Arity, vm::Value};
use arrayvec::ArrayVec;
use std::ops::Range;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::U32,
};

/// Magic number at the start of every compiled input layout
pub const MAGIC: [u8; 4] = *b"SGIL";

/// Input layout format version
pub const VERSION: u32 = 1;

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct Header {
    magic: [u8; 4],
    version: U32,
    count: U32,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawAttribute {
    arity: u8,
    reserved: [u8; 3],
    offset: U32,
    stride: U32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<Header>(), 12);
static_assertions::const_assert_eq!(std::mem::size_of::<RawAttribute>(), 12);

/// A single vertex attribute
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Shape of the attribute; never [`Arity::Int`]
    pub arity: Arity,
    /// Byte offset of the attribute for vertex 0
    pub offset: u32,
    /// Distance in bytes between consecutive vertices
    pub stride: u32,
}

impl Attribute {
    /// Returns the byte range occupied by this attribute for a given vertex
    ///
    /// Returns `None` if the range overflows.
    pub fn byte_range(&self, vertex: usize) -> Option<Range<usize>> {
        let start = (self.stride as usize)
            .checked_mul(vertex)?
            .checked_add(self.offset as usize)?;
        let end = start.checked_add(self.arity.width() * 4)?;
        Some(start..end)
    }
}

/// Builder for an [`InputLayout`]
///
/// Attributes are pushed in input-slot order: the first attribute feeds
/// vertex input 0, and so on.
#[derive(Clone, Debug, Default)]
pub struct InputLayoutBuilder {
    attrs: Vec<Attribute>,
}

impl InputLayoutBuilder {
    /// Builds an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attributes pushed so far
    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Appends an attribute with the given arity
    pub fn push(
        &mut self,
        arity: Arity,
        offset: u32,
        stride: u32,
    ) -> Result<(), Error> {
        if !arity.is_float() {
            return Err(Error::BadAttributeArity(arity));
        }
        self.attrs.push(Attribute {
            arity,
            offset,
            stride,
        });
        Ok(())
    }

    /// Appends a scalar attribute
    pub fn push_32(&mut self, offset: u32, stride: u32) -> Result<(), Error> {
        self.push(Arity::Scalar, offset, stride)
    }

    /// Appends a `vec2` attribute
    pub fn push_vec2(&mut self, offset: u32, stride: u32) -> Result<(), Error> {
        self.push(Arity::Vec2, offset, stride)
    }

    /// Appends a `vec3` attribute
    pub fn push_vec3(&mut self, offset: u32, stride: u32) -> Result<(), Error> {
        self.push(Arity::Vec3, offset, stride)
    }

    /// Appends a `vec4` attribute
    pub fn push_vec4(&mut self, offset: u32, stride: u32) -> Result<(), Error> {
        self.push(Arity::Vec4, offset, stride)
    }

    /// Builds the layout, checking that it isn't empty
    pub fn build(&self) -> Result<InputLayout, Error> {
        if self.attrs.is_empty() {
            Err(Error::EmptyLayout)
        } else {
            Ok(InputLayout {
                attrs: self.attrs.clone(),
            })
        }
    }

    /// Compiles the layout into an opaque blob
    pub fn compile(&self) -> Result<Vec<u8>, Error> {
        let layout = self.build()?;
        let out = layout.to_bytes();
        log::debug!(
            "compiled input layout: {} attributes, {} bytes",
            layout.len(),
            out.len()
        );
        Ok(out)
    }
}

/// A validated, non-empty input layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLayout {
    attrs: Vec<Attribute>,
}

#[allow(clippy::len_without_is_empty)]
impl InputLayout {
    /// Returns the number of attributes
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns the attribute list, in input-slot order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Checks whether this layout feeds a program with the given inputs
    pub fn matches(&self, inputs: &[Arity]) -> bool {
        self.attrs.len() == inputs.len()
            && self.attrs.iter().zip(inputs).all(|(a, i)| a.arity == *i)
    }

    /// Serializes the layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = Header {
            magic: MAGIC,
            version: U32::new(VERSION),
            count: U32::new(self.attrs.len() as u32),
        };
        let raw: Vec<RawAttribute> = self
            .attrs
            .iter()
            .map(|a| RawAttribute {
                arity: a.arity as u8,
                reserved: [0; 3],
                offset: U32::new(a.offset),
                stride: U32::new(a.stride),
            })
            .collect();
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(raw.as_slice().as_bytes());
        out
    }

    /// Decodes and validates a serialized layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (header, rest) = Header::read_from_prefix(bytes)
            .map_err(|_| Error::MalformedBlob("truncated header"))?;
        if header.magic != MAGIC {
            return Err(Error::BadMagic("input layout"));
        }
        if header.version.get() != VERSION {
            return Err(Error::VersionMismatch(header.version.get(), VERSION));
        }
        let raw = <[RawAttribute]>::ref_from_bytes_with_elems(
            rest,
            header.count.get() as usize,
        )
        .map_err(|_| Error::MalformedBlob("bad attribute count"))?;

        let mut builder = InputLayoutBuilder::new();
        for r in raw {
            if r.reserved != [0; 3] {
                return Err(Error::MalformedBlob("reserved attribute bits"));
            }
            let arity = Arity::from_repr(r.arity)
                .ok_or(Error::MalformedBlob("bad attribute arity"))?;
            builder.push(arity, r.offset.get(), r.stride.get())?;
        }
        builder.build()
    }

    /// Reads every attribute of a single vertex, appending them to `out`
    pub fn fetch_into(
        &self,
        buffer: &[u8],
        vertex: usize,
        out: &mut Vec<Value>,
    ) -> Result<(), Error> {
        for (attribute, a) in self.attrs.iter().enumerate() {
            let bytes = a
                .byte_range(vertex)
                .and_then(|r| buffer.get(r))
                .ok_or(Error::VertexFetchOutOfBounds { vertex, attribute })?;
            let c: ArrayVec<f32, 4> = bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            let v = Value::from_components(a.arity, &c)
                .ok_or(Error::BadAttributeArity(a.arity))?;
            out.push(v);
        }
        Ok(())
    }

    /// Reads every attribute of a single vertex
    pub fn fetch(
        &self,
        buffer: &[u8],
        vertex: usize,
    ) -> Result<Vec<Value>, Error> {
        let mut out = Vec::with_capacity(self.attrs.len());
        self.fetch_into(buffer, vertex, &mut out)?;
        Ok(out)
    }
}
