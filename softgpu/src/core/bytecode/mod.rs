//! Shader bytecode format
//!
//! Compiled shaders are a packed representation of a [`Program`].  The format
//! is a private contract between the compiler and the interpreter; it is
//! **not stable**, and a version tag in the header makes mismatched blobs fail
//! to load instead of being misread.
//!
//! All multi-byte integers are little-endian.
//!
//! ## Header
//!
//! | Offset | Value                                        |
//! |--------|----------------------------------------------|
//! | 0      | magic number, `b"SGPU"`                      |
//! | 4      | format version ([`VERSION`])                 |
//! | 8      | stage (`0` = fragment, `1` = vertex)         |
//! | 12     | position output slot, or `0xFFFF_FFFF`       |
//! | 16     | register count                               |
//! | 20     | input count                                  |
//! | 24     | output count                                 |
//! | 28     | instruction count                            |
//!
//! The header is followed by one byte per input slot and one byte per output
//! slot, each holding an [`Arity`] value, then by the instructions.
//!
//! ## Instructions
//!
//! Every instruction is 32 bytes:
//!
//! | Offset | Value                                        |
//! |--------|----------------------------------------------|
//! | 0      | opcode (an [`Opcode`] value)                 |
//! | 1..4   | reserved, always zero                        |
//! | 4      | output register (`0xFFFF_FFFF` for `Store`)  |
//! | 8..28  | five operand words                           |
//! | 28..32 | four channel selectors (`0xFF` if unused)    |
//!
//! Operand words hold registers, slot indices, uniform addresses, or the raw
//! bits of immediates, depending on the opcode.  Swizzle operands (used by
//! `Mov4` and `FMulSwizzle`) are always stored in operand words 1-4, with the
//! matching channel selectors in bytes 28-31; for `FMulSwizzle`, operand word
//! 0 is the `vec4` multiplicand.
use crate::{
    Error,
    compiler::{Program, Stage},
    shader::{Arity, Channel, Opcode, ShaderOp, Swizzle},
};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::U32,
};

/// Magic number at the start of every compiled shader
pub const MAGIC: [u8; 4] = *b"SGPU";

/// Bytecode format version
pub const VERSION: u32 = 1;

const NO_POSITION: u32 = u32::MAX;
const NO_CHANNEL: u8 = 0xFF;

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct Header {
    magic: [u8; 4],
    version: U32,
    stage: U32,
    position: U32,
    reg_count: U32,
    input_count: U32,
    output_count: U32,
    op_count: U32,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawOp {
    opcode: u8,
    reserved: [u8; 3],
    out: U32,
    args: [U32; 5],
    channels: [u8; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<Header>(), 32);
static_assertions::const_assert_eq!(std::mem::size_of::<RawOp>(), 32);

fn pack_swizzle(s: &[Swizzle; 4], args: &mut [u32; 5], channels: &mut [u8; 4]) {
    for (i, s) in s.iter().enumerate() {
        args[i + 1] = s.reg;
        channels[i] = s.channel as u8;
    }
}

impl RawOp {
    fn new(op: &ShaderOp) -> Self {
        let mut args = [0u32; 5];
        let mut channels = [NO_CHANNEL; 4];
        let out = match *op {
            ShaderOp::Mov4(out, ref s) => {
                pack_swizzle(s, &mut args, &mut channels);
                out
            }
            ShaderOp::FMulSwizzle(out, a, ref s) => {
                args[0] = a;
                pack_swizzle(s, &mut args, &mut channels);
                out
            }
            ShaderOp::Extract(out, a, c) => {
                args[0] = a;
                channels[0] = c as u8;
                out
            }
            ShaderOp::Sin(out, a)
            | ShaderOp::Input(out, a)
            | ShaderOp::Output(out, a)
            | ShaderOp::ConstInt(out, a)
            | ShaderOp::Copy(out, a)
            | ShaderOp::Sample(out, a) => {
                args[0] = a;
                out
            }
            ShaderOp::FMul(out, a, b)
            | ShaderOp::FAdd(out, a, b)
            | ShaderOp::IAdd(out, a, b)
            | ShaderOp::Uniform(out, a, b) => {
                args[0] = a;
                args[1] = b;
                out
            }
            ShaderOp::ConstVec2(out, v) => {
                for (a, v) in args.iter_mut().zip(v) {
                    *a = v.to_bits();
                }
                out
            }
            ShaderOp::ConstVec4(out, v) => {
                for (a, v) in args.iter_mut().zip(v) {
                    *a = v.to_bits();
                }
                out
            }
            ShaderOp::Store(a, slot) => {
                args[0] = a;
                args[1] = slot;
                u32::MAX
            }
        };
        RawOp {
            opcode: Opcode::from(op) as u8,
            reserved: [0; 3],
            out: U32::new(out),
            args: args.map(U32::new),
            channels,
        }
    }

    /// Decodes a raw operation, checking its encoding (but not its registers)
    fn decode(&self) -> Result<ShaderOp, Error> {
        if self.reserved != [0; 3] {
            return Err(Error::MalformedBlob("reserved instruction bits"));
        }
        let opcode = Opcode::from_repr(self.opcode)
            .ok_or(Error::UnknownOpcode(self.opcode))?;
        let out = self.out.get();
        let a = self.args.map(|a| a.get());
        let channel = |i: usize| {
            Channel::from_repr(self.channels[i])
                .ok_or(Error::MalformedBlob("bad channel selector"))
        };
        let swizzle = || -> Result<[Swizzle; 4], Error> {
            Ok([
                Swizzle::new(a[1], channel(0)?),
                Swizzle::new(a[2], channel(1)?),
                Swizzle::new(a[3], channel(2)?),
                Swizzle::new(a[4], channel(3)?),
            ])
        };

        // Selectors past those used by the opcode must be unset
        let used = match opcode {
            Opcode::Mov4 | Opcode::FMulSwizzle => 4,
            Opcode::Extract => 1,
            _ => 0,
        };
        if self.channels[used..].iter().any(|c| *c != NO_CHANNEL) {
            return Err(Error::MalformedBlob("unexpected channel selector"));
        }
        if opcode != Opcode::Store && out == u32::MAX {
            return Err(Error::MalformedBlob("missing output register"));
        }

        let op = match opcode {
            Opcode::Mov4 => ShaderOp::Mov4(out, swizzle()?),
            Opcode::FMulSwizzle => ShaderOp::FMulSwizzle(out, a[0], swizzle()?),
            Opcode::Extract => ShaderOp::Extract(out, a[0], channel(0)?),
            Opcode::Sin => ShaderOp::Sin(out, a[0]),
            Opcode::FMul => ShaderOp::FMul(out, a[0], a[1]),
            Opcode::FAdd => ShaderOp::FAdd(out, a[0], a[1]),
            Opcode::IAdd => ShaderOp::IAdd(out, a[0], a[1]),
            Opcode::Input => ShaderOp::Input(out, a[0]),
            Opcode::Output => ShaderOp::Output(out, a[0]),
            Opcode::Uniform => ShaderOp::Uniform(out, a[0], a[1]),
            Opcode::ConstInt => ShaderOp::ConstInt(out, a[0]),
            Opcode::ConstVec2 => ShaderOp::ConstVec2(
                out,
                [f32::from_bits(a[0]), f32::from_bits(a[1])],
            ),
            Opcode::ConstVec4 => ShaderOp::ConstVec4(
                out,
                [a[0], a[1], a[2], a[3]].map(f32::from_bits),
            ),
            Opcode::Copy => ShaderOp::Copy(out, a[0]),
            Opcode::Sample => ShaderOp::Sample(out, a[0]),
            Opcode::Store => {
                if out != u32::MAX {
                    return Err(Error::MalformedBlob(
                        "store with an output register",
                    ));
                }
                ShaderOp::Store(a[0], a[1])
            }
        };
        Ok(op)
    }
}

fn decode_arities(bytes: &[u8]) -> Result<Vec<Arity>, Error> {
    bytes
        .iter()
        .map(|b| {
            Arity::from_repr(*b).ok_or(Error::MalformedBlob("bad slot arity"))
        })
        .collect()
}

/// Splits `n` bytes off the front of a slice, failing if it's too short
fn take(bytes: &[u8], n: u32) -> Result<(&[u8], &[u8]), Error> {
    let n = n as usize;
    if bytes.len() < n {
        Err(Error::MalformedBlob("truncated"))
    } else {
        Ok(bytes.split_at(n))
    }
}

impl Program {
    /// Serializes the program using the format described in
    /// [`bytecode`](crate::bytecode)
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = Header {
            magic: MAGIC,
            version: U32::new(VERSION),
            stage: U32::new(match self.stage() {
                Stage::Fragment => 0,
                Stage::Vertex => 1,
            }),
            position: U32::new(self.position().unwrap_or(NO_POSITION)),
            reg_count: U32::new(self.reg_count()),
            input_count: U32::new(self.inputs().len() as u32),
            output_count: U32::new(self.outputs().len() as u32),
            op_count: U32::new(self.ops().len() as u32),
        };
        let ops: Vec<RawOp> = self.ops().iter().map(RawOp::new).collect();

        let mut out = header.as_bytes().to_vec();
        out.extend(self.inputs().iter().map(|a| *a as u8));
        out.extend(self.outputs().iter().map(|a| *a as u8));
        out.extend_from_slice(ops.as_slice().as_bytes());
        out
    }

    /// Decodes and validates a serialized program
    ///
    /// Blobs cross an API boundary, so nothing is trusted: the header, every
    /// instruction encoding, and every register reference are checked, and
    /// trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (header, rest) = Header::read_from_prefix(bytes)
            .map_err(|_| Error::MalformedBlob("truncated header"))?;
        if header.magic != MAGIC {
            return Err(Error::BadMagic("shader"));
        }
        if header.version.get() != VERSION {
            return Err(Error::VersionMismatch(header.version.get(), VERSION));
        }
        let (inputs, rest) = take(rest, header.input_count.get())?;
        let (outputs, rest) = take(rest, header.output_count.get())?;
        let inputs = decode_arities(inputs)?;
        let outputs = decode_arities(outputs)?;

        let raw = <[RawOp]>::ref_from_bytes_with_elems(
            rest,
            header.op_count.get() as usize,
        )
        .map_err(|_| Error::MalformedBlob("bad instruction count"))?;
        let ops = raw
            .iter()
            .map(RawOp::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let position = match header.position.get() {
            NO_POSITION => None,
            p => Some(p),
        };
        let stage = match (header.stage.get(), position) {
            (0, None) => Stage::Fragment,
            (1, Some(_)) => Stage::Vertex,
            _ => return Err(Error::MalformedBlob("bad stage")),
        };
        let reg_count = header.reg_count.get();
        let program = Program::new(inputs, outputs, position, reg_count, ops)?;
        debug_assert_eq!(program.stage(), stage);
        Ok(program)
    }
}
