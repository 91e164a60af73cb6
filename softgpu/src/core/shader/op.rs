use arrayvec::ArrayVec;

/// Shape of the value held by a register or declared by an I/O slot
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::FromRepr,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Arity {
    /// Single `f32`
    Scalar = 0,
    /// Two `f32` channels
    Vec2 = 1,
    /// Three `f32` channels
    Vec3 = 2,
    /// Four `f32` channels
    Vec4 = 3,
    /// Single `u32`
    Int = 4,
}

impl Arity {
    /// Returns the number of 32-bit channels in a value of this arity
    pub fn width(&self) -> usize {
        match self {
            Arity::Scalar | Arity::Int => 1,
            Arity::Vec2 => 2,
            Arity::Vec3 => 3,
            Arity::Vec4 => 4,
        }
    }

    /// Checks whether this is a vector arity (and accepts channel selectors)
    pub fn is_vector(&self) -> bool {
        matches!(self, Arity::Vec2 | Arity::Vec3 | Arity::Vec4)
    }

    /// Checks whether values of this arity hold floating-point data
    pub fn is_float(&self) -> bool {
        !matches!(self, Arity::Int)
    }
}

/// Channel selector within a vector register
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::FromRepr)]
#[repr(u8)]
pub enum Channel {
    /// Channel 0
    X = 0,
    /// Channel 1
    Y = 1,
    /// Channel 2
    Z = 2,
    /// Channel 3
    W = 3,
}

impl Channel {
    /// Returns the channel index (0-3)
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A single channel selected from a register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Swizzle {
    /// Source register
    pub reg: u32,
    /// Selected channel
    pub channel: Channel,
}

impl Swizzle {
    /// Builds a new swizzle operand
    pub fn new(reg: u32, channel: Channel) -> Self {
        Self { reg, channel }
    }
}

/// Operations in a shader program
///
/// The first argument is always the output register, except for
/// [`Store`](ShaderOp::Store), which writes to an output slot and defines no
/// register.
///
/// Registers are identified by a `u32`.  In a
/// [`ShaderBuilder`](crate::shader::ShaderBuilder), this is the caller-chosen
/// id; in a compiled [`Program`](crate::compiler::Program), registers are
/// renumbered densely in definition order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ShaderOp {
    /// Builds a `vec4` from one channel of each of four vector registers
    Mov4(u32, [Swizzle; 4]),

    /// Sine of a scalar register
    Sin(u32, u32),

    /// Elementwise multiplication of two float registers with equal arity
    FMul(u32, u32, u32),

    /// Multiplies a `vec4` register by a `vec4` built from four swizzles
    FMulSwizzle(u32, u32, [Swizzle; 4]),

    /// Elementwise addition of two float registers with equal arity
    FAdd(u32, u32, u32),

    /// Wrapping addition of two integer registers
    IAdd(u32, u32, u32),

    /// Extracts one channel of a vector register as a scalar
    Extract(u32, u32, Channel),

    /// Reads an input slot
    Input(u32, u32),

    /// Reads the current value of an output slot
    Output(u32, u32),

    /// Reads a `vec4` from the uniform buffer at `(group, index)`
    Uniform(u32, u32, u32),

    /// Loads an integer immediate
    ConstInt(u32, u32),

    /// Loads a `vec2` immediate
    ConstVec2(u32, [f32; 2]),

    /// Loads a `vec4` immediate
    ConstVec4(u32, [f32; 4]),

    /// Copies a register
    Copy(u32, u32),

    /// Writes a register (first argument) to an output slot (second argument)
    Store(u32, u32),

    /// Samples the bound texture at a `vec2` coordinate, returning a `vec4`
    Sample(u32, u32),
}

/// Opcode values, one-to-one with [`ShaderOp`] variants
///
/// These are the opcode bytes used in the [bytecode](crate::bytecode).
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    strum::EnumCount,
    strum::EnumIter,
    strum::FromRepr,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Mov4,
    Sin,
    FMul,
    FMulSwizzle,
    FAdd,
    IAdd,
    Extract,
    Input,
    Output,
    Uniform,
    ConstInt,
    ConstVec2,
    ConstVec4,
    Copy,
    Store,
    Sample,
}

impl From<&ShaderOp> for Opcode {
    fn from(op: &ShaderOp) -> Self {
        match op {
            ShaderOp::Mov4(..) => Opcode::Mov4,
            ShaderOp::Sin(..) => Opcode::Sin,
            ShaderOp::FMul(..) => Opcode::FMul,
            ShaderOp::FMulSwizzle(..) => Opcode::FMulSwizzle,
            ShaderOp::FAdd(..) => Opcode::FAdd,
            ShaderOp::IAdd(..) => Opcode::IAdd,
            ShaderOp::Extract(..) => Opcode::Extract,
            ShaderOp::Input(..) => Opcode::Input,
            ShaderOp::Output(..) => Opcode::Output,
            ShaderOp::Uniform(..) => Opcode::Uniform,
            ShaderOp::ConstInt(..) => Opcode::ConstInt,
            ShaderOp::ConstVec2(..) => Opcode::ConstVec2,
            ShaderOp::ConstVec4(..) => Opcode::ConstVec4,
            ShaderOp::Copy(..) => Opcode::Copy,
            ShaderOp::Store(..) => Opcode::Store,
            ShaderOp::Sample(..) => Opcode::Sample,
        }
    }
}

impl ShaderOp {
    /// Returns the output register, or `None` for `Store` instructions
    pub fn output(&self) -> Option<u32> {
        match self {
            ShaderOp::Mov4(out, ..)
            | ShaderOp::Sin(out, ..)
            | ShaderOp::FMul(out, ..)
            | ShaderOp::FMulSwizzle(out, ..)
            | ShaderOp::FAdd(out, ..)
            | ShaderOp::IAdd(out, ..)
            | ShaderOp::Extract(out, ..)
            | ShaderOp::Input(out, ..)
            | ShaderOp::Output(out, ..)
            | ShaderOp::Uniform(out, ..)
            | ShaderOp::ConstInt(out, ..)
            | ShaderOp::ConstVec2(out, ..)
            | ShaderOp::ConstVec4(out, ..)
            | ShaderOp::Copy(out, ..)
            | ShaderOp::Sample(out, ..) => Some(*out),
            ShaderOp::Store(..) => None,
        }
    }

    /// Returns every register read by this instruction
    pub fn sources(&self) -> ArrayVec<u32, 5> {
        let mut out = ArrayVec::new();
        match *self {
            ShaderOp::Mov4(_, s) => out.extend(s.iter().map(|s| s.reg)),
            ShaderOp::FMulSwizzle(_, a, s) => {
                out.push(a);
                out.extend(s.iter().map(|s| s.reg));
            }
            ShaderOp::Sin(_, a)
            | ShaderOp::Extract(_, a, ..)
            | ShaderOp::Copy(_, a)
            | ShaderOp::Store(a, ..)
            | ShaderOp::Sample(_, a) => out.push(a),
            ShaderOp::FMul(_, a, b)
            | ShaderOp::FAdd(_, a, b)
            | ShaderOp::IAdd(_, a, b) => {
                out.push(a);
                out.push(b);
            }
            ShaderOp::Input(..)
            | ShaderOp::Output(..)
            | ShaderOp::Uniform(..)
            | ShaderOp::ConstInt(..)
            | ShaderOp::ConstVec2(..)
            | ShaderOp::ConstVec4(..) => (),
        }
        out
    }

    /// Returns a copy of this instruction with every register renamed
    ///
    /// Slot indices, uniform addresses and immediates are left unchanged.
    pub fn remap<F: Fn(u32) -> u32>(&self, f: F) -> Self {
        let sw = |s: [Swizzle; 4]| s.map(|s| Swizzle::new(f(s.reg), s.channel));
        match *self {
            ShaderOp::Mov4(out, s) => ShaderOp::Mov4(f(out), sw(s)),
            ShaderOp::Sin(out, a) => ShaderOp::Sin(f(out), f(a)),
            ShaderOp::FMul(out, a, b) => ShaderOp::FMul(f(out), f(a), f(b)),
            ShaderOp::FMulSwizzle(out, a, s) => {
                ShaderOp::FMulSwizzle(f(out), f(a), sw(s))
            }
            ShaderOp::FAdd(out, a, b) => ShaderOp::FAdd(f(out), f(a), f(b)),
            ShaderOp::IAdd(out, a, b) => ShaderOp::IAdd(f(out), f(a), f(b)),
            ShaderOp::Extract(out, a, c) => ShaderOp::Extract(f(out), f(a), c),
            ShaderOp::Input(out, slot) => ShaderOp::Input(f(out), slot),
            ShaderOp::Output(out, slot) => ShaderOp::Output(f(out), slot),
            ShaderOp::Uniform(out, g, i) => ShaderOp::Uniform(f(out), g, i),
            ShaderOp::ConstInt(out, v) => ShaderOp::ConstInt(f(out), v),
            ShaderOp::ConstVec2(out, v) => ShaderOp::ConstVec2(f(out), v),
            ShaderOp::ConstVec4(out, v) => ShaderOp::ConstVec4(f(out), v),
            ShaderOp::Copy(out, a) => ShaderOp::Copy(f(out), f(a)),
            ShaderOp::Store(a, slot) => ShaderOp::Store(f(a), slot),
            ShaderOp::Sample(out, uv) => ShaderOp::Sample(f(out), f(uv)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn opcode_values_are_dense() {
        for (i, op) in Opcode::iter().enumerate() {
            assert_eq!(op as usize, i);
            assert_eq!(Opcode::from_repr(i as u8), Some(op));
        }
        assert_eq!(Opcode::from_repr(Opcode::COUNT as u8), None);
    }

    #[test]
    fn channel_selectors() {
        assert_eq!(Channel::from_repr(0), Some(Channel::X));
        assert_eq!(Channel::from_repr(1), Some(Channel::Y));
        assert_eq!(Channel::from_repr(2), Some(Channel::Z));
        assert_eq!(Channel::from_repr(3), Some(Channel::W));
        assert_eq!(Channel::from_repr(4), None);
    }

    #[test]
    fn sources_and_remap() {
        let s = [
            Swizzle::new(1, Channel::X),
            Swizzle::new(2, Channel::Y),
            Swizzle::new(3, Channel::Z),
            Swizzle::new(4, Channel::W),
        ];
        let op = ShaderOp::FMulSwizzle(10, 5, s);
        assert_eq!(op.output(), Some(10));
        assert_eq!(op.sources().as_slice(), &[5, 1, 2, 3, 4]);

        let op = op.remap(|r| r * 2);
        assert_eq!(op.output(), Some(20));
        assert_eq!(op.sources().as_slice(), &[10, 2, 4, 6, 8]);

        let store = ShaderOp::Store(7, 3).remap(|r| r + 1);
        assert_eq!(store, ShaderOp::Store(8, 3));
        assert_eq!(store.output(), None);
    }

    #[test]
    fn arity_display() {
        assert_eq!(Arity::Vec3.to_string(), "vec3");
        assert_eq!(Arity::Int.to_string(), "int");
    }
}
