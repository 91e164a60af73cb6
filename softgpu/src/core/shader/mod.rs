//! Incremental construction of shader programs
//!
//! A [`ShaderBuilder`] holds a program's input and output declarations and
//! its instruction list.  Every instruction defines a new register, chosen by
//! the caller; registers are write-once, and must be defined before they are
//! used.  Each push is checked immediately, and a failed push leaves the
//! builder untouched.
//!
//! ```
//! use softgpu::shader::ShaderBuilder;
//!
//! let mut b = ShaderBuilder::new();
//! b.push_input_vec3()?;
//! b.push_output_vertex_position()?;
//! b.load_input(0, 0)?;
//! b.load_constant_vec4(1, 0.0, 0.0, 0.0, 1.0)?;
//! b.mov4(2, [(0, 0), (0, 1), (0, 2), (1, 3)])?;
//! b.store(2, 0)?;
//!
//! // Register 7 was never defined
//! assert!(b.fadd(3, 2, 7).is_err());
//! # Ok::<(), softgpu::Error>(())
//! ```
mod op;
mod regfile;

pub use op::{Arity, Channel, Opcode, ShaderOp, Swizzle};
pub use regfile::{RegisterFile, RegisterInfo, Slots, UNIFORM_GROUP_SIZE};

use crate::Error;

/// Builder for a single shader program
#[derive(Clone, Debug, Default)]
pub struct ShaderBuilder {
    inputs: Vec<Arity>,
    outputs: Vec<Arity>,
    position: Option<u32>,
    ops: Vec<ShaderOp>,
    regs: RegisterFile,
    finalized: bool,
}

impl ShaderBuilder {
    /// Builds a new empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the declared input arities
    pub fn inputs(&self) -> &[Arity] {
        &self.inputs
    }

    /// Returns the declared output arities
    pub fn outputs(&self) -> &[Arity] {
        &self.outputs
    }

    /// Returns the index of the vertex position output, if one was declared
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Returns the instruction list
    pub fn ops(&self) -> &[ShaderOp] {
        &self.ops
    }

    /// Returns the registers defined so far
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Checks whether this builder was finalized by a successful compile
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Marks the builder as finalized; further pushes will fail
    pub(crate) fn finalize(&mut self) {
        self.finalized = true;
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.finalized {
            Err(Error::AlreadyCompiled)
        } else {
            Ok(())
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Declarations

    /// Declares a new input slot with the given arity
    pub fn push_input(&mut self, arity: Arity) -> Result<(), Error> {
        self.check_open()?;
        self.inputs.push(arity);
        Ok(())
    }

    /// Declares a new output slot with the given arity
    pub fn push_output(&mut self, arity: Arity) -> Result<(), Error> {
        self.check_open()?;
        self.outputs.push(arity);
        Ok(())
    }

    /// Declares a scalar input
    pub fn push_input_32(&mut self) -> Result<(), Error> {
        self.push_input(Arity::Scalar)
    }

    /// Declares a `vec2` input
    pub fn push_input_vec2(&mut self) -> Result<(), Error> {
        self.push_input(Arity::Vec2)
    }

    /// Declares a `vec3` input
    pub fn push_input_vec3(&mut self) -> Result<(), Error> {
        self.push_input(Arity::Vec3)
    }

    /// Declares a `vec4` input
    pub fn push_input_vec4(&mut self) -> Result<(), Error> {
        self.push_input(Arity::Vec4)
    }

    /// Declares a scalar output
    pub fn push_output_32(&mut self) -> Result<(), Error> {
        self.push_output(Arity::Scalar)
    }

    /// Declares a `vec2` output
    pub fn push_output_vec2(&mut self) -> Result<(), Error> {
        self.push_output(Arity::Vec2)
    }

    /// Declares a `vec3` output
    pub fn push_output_vec3(&mut self) -> Result<(), Error> {
        self.push_output(Arity::Vec3)
    }

    /// Declares a `vec4` output
    pub fn push_output_vec4(&mut self) -> Result<(), Error> {
        self.push_output(Arity::Vec4)
    }

    /// Declares the clip-space position output (a `vec4`)
    ///
    /// Declaring a position output makes this a vertex program.  A program
    /// may have at most one.
    pub fn push_output_vertex_position(&mut self) -> Result<(), Error> {
        self.check_open()?;
        if self.position.is_some() {
            return Err(Error::DuplicatePosition);
        }
        self.position = Some(self.outputs.len() as u32);
        self.outputs.push(Arity::Vec4);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Instructions

    /// Appends an instruction after checking it against the register file
    pub fn push(&mut self, op: ShaderOp) -> Result<(), Error> {
        self.check_open()?;
        let slots = Slots {
            inputs: &self.inputs,
            outputs: &self.outputs,
        };
        self.regs.define(&op, slots, self.ops.len())?;
        self.ops.push(op);
        Ok(())
    }

    /// Converts a raw `(register, channel)` pair into a swizzle operand
    fn swizzle(&self, reg: u32, sub: u32) -> Result<Swizzle, Error> {
        let arity = self.regs.arity(reg)?;
        u8::try_from(sub)
            .ok()
            .and_then(Channel::from_repr)
            .map(|c| Swizzle::new(reg, c))
            .ok_or(Error::BadChannel(sub, arity))
    }

    fn swizzles(&self, s: [(u32, u8); 4]) -> Result<[Swizzle; 4], Error> {
        let [x, y, z, w] = s;
        Ok([
            self.swizzle(x.0, x.1.into())?,
            self.swizzle(y.0, y.1.into())?,
            self.swizzle(z.0, z.1.into())?,
            self.swizzle(w.0, w.1.into())?,
        ])
    }

    /// Builds a `vec4` from one channel of each of four registers
    ///
    /// Each `(src, sub)` pair selects channel `sub` (0-3 for x-w) of register
    /// `src`, which must be a vector with at least `sub + 1` channels.
    pub fn mov4(&mut self, id: u32, src: [(u32, u8); 4]) -> Result<(), Error> {
        let s = self.swizzles(src)?;
        self.push(ShaderOp::Mov4(id, s))
    }

    /// Computes the sine of a scalar register
    pub fn fsin(&mut self, id: u32, input: u32) -> Result<(), Error> {
        self.push(ShaderOp::Sin(id, input))
    }

    /// Multiplies two float registers of equal arity, elementwise
    pub fn fmul(&mut self, id: u32, a: u32, b: u32) -> Result<(), Error> {
        self.push(ShaderOp::FMul(id, a, b))
    }

    /// Computes `a * vec4(src...)` without a temporary register
    ///
    /// `a` must be a `vec4`; the swizzle operands follow the same rules as
    /// [`mov4`](Self::mov4).
    pub fn fmul_by_v4_swizzle(
        &mut self,
        id: u32,
        a: u32,
        src: [(u32, u8); 4],
    ) -> Result<(), Error> {
        let s = self.swizzles(src)?;
        self.push(ShaderOp::FMulSwizzle(id, a, s))
    }

    /// Adds two float registers of equal arity, elementwise
    pub fn fadd(&mut self, id: u32, a: u32, b: u32) -> Result<(), Error> {
        self.push(ShaderOp::FAdd(id, a, b))
    }

    /// Adds two integer registers (with wrapping)
    pub fn iadd(&mut self, id: u32, a: u32, b: u32) -> Result<(), Error> {
        self.push(ShaderOp::IAdd(id, a, b))
    }

    /// Binds a new register to the value of an input slot
    pub fn load_input(&mut self, id: u32, input: u32) -> Result<(), Error> {
        self.push(ShaderOp::Input(id, input))
    }

    /// Binds a new register to the current value of an output slot
    ///
    /// Outputs start out as zero and are updated by [`store`](Self::store).
    pub fn load_output(&mut self, id: u32, output: u32) -> Result<(), Error> {
        self.push(ShaderOp::Output(id, output))
    }

    /// Extracts one channel of a vector register as a new scalar register
    pub fn load_channel(
        &mut self,
        id: u32,
        source: u32,
        sub: u32,
    ) -> Result<(), Error> {
        let s = self.swizzle(source, sub)?;
        self.push(ShaderOp::Extract(id, s.reg, s.channel))
    }

    /// Reads a `vec4` from the uniform buffer
    ///
    /// The value is read from byte offset `(group * 16 + index) * 16`; see
    /// [`UNIFORM_GROUP_SIZE`].  `index` must be less than 16.
    pub fn load_ubo_vec4(
        &mut self,
        id: u32,
        group: u32,
        index: u32,
    ) -> Result<(), Error> {
        self.push(ShaderOp::Uniform(id, group, index))
    }

    /// Loads an integer constant
    pub fn load_constant_32(&mut self, id: u32, v: u32) -> Result<(), Error> {
        self.push(ShaderOp::ConstInt(id, v))
    }

    /// Loads a `vec2` constant
    pub fn load_constant_vec2(
        &mut self,
        id: u32,
        x: f32,
        y: f32,
    ) -> Result<(), Error> {
        self.push(ShaderOp::ConstVec2(id, [x, y]))
    }

    /// Loads a `vec4` constant
    pub fn load_constant_vec4(
        &mut self,
        id: u32,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> Result<(), Error> {
        self.push(ShaderOp::ConstVec4(id, [x, y, z, w]))
    }

    /// Copies register `src` into the new register `dest`
    pub fn load(&mut self, src: u32, dest: u32) -> Result<(), Error> {
        self.push(ShaderOp::Copy(dest, src))
    }

    /// Writes register `src` into output slot `dest`
    pub fn store(&mut self, src: u32, dest: u32) -> Result<(), Error> {
        self.push(ShaderOp::Store(src, dest))
    }

    /// Samples the bound sampler texture at a `vec2` coordinate
    ///
    /// Sampling is nearest-neighbor, with coordinates clamped to `[0, 1]`;
    /// `(0, 0)` is the top-left corner of the texture.
    pub fn sample_texture(&mut self, id: u32, uv: u32) -> Result<(), Error> {
        self.push(ShaderOp::Sample(id, uv))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_vec4() -> ShaderBuilder {
        let mut b = ShaderBuilder::new();
        b.load_constant_vec4(0, 1.0, 2.0, 3.0, 4.0).unwrap();
        b
    }

    #[test]
    fn undefined_register() {
        let mut b = with_vec4();
        assert_eq!(b.fadd(1, 0, 5), Err(Error::UndefinedRegister(5)));
        assert_eq!(
            b.mov4(1, [(0, 0), (0, 1), (9, 2), (0, 3)]),
            Err(Error::UndefinedRegister(9))
        );
        assert_eq!(b.ops().len(), 1);
    }

    #[test]
    fn duplicate_register() {
        let mut b = with_vec4();
        assert_eq!(
            b.load_constant_vec2(0, 0.0, 0.0),
            Err(Error::DuplicateRegister(0))
        );
        assert_eq!(b.load(0, 0), Err(Error::DuplicateRegister(0)));
    }

    #[test]
    fn sub_channel_range() {
        let mut b = with_vec4();
        for sub in 0..4 {
            b.mov4(10 + sub as u32, [(0, sub); 4]).unwrap();
        }
        assert_eq!(
            b.mov4(20, [(0, 0), (0, 1), (0, 2), (0, 4)]),
            Err(Error::BadChannel(4, Arity::Vec4))
        );
        assert_eq!(
            b.fmul_by_v4_swizzle(20, 0, [(0, 4), (0, 1), (0, 2), (0, 3)]),
            Err(Error::BadChannel(4, Arity::Vec4))
        );
        assert_eq!(
            b.load_channel(20, 0, 4),
            Err(Error::BadChannel(4, Arity::Vec4))
        );

        // Channels must also fit within the source
        b.load_constant_vec2(30, 1.0, 2.0).unwrap();
        assert_eq!(
            b.mov4(31, [(30, 0), (30, 1), (30, 2), (30, 0)]),
            Err(Error::BadChannel(2, Arity::Vec2))
        );

        // Scalars don't have channels
        b.load_channel(32, 30, 1).unwrap();
        assert_eq!(
            b.mov4(33, [(32, 0), (30, 1), (30, 1), (30, 0)]),
            Err(Error::BadChannel(0, Arity::Scalar))
        );
    }

    #[test]
    fn arity_checks() {
        let mut b = with_vec4();
        b.load_constant_vec2(1, 1.0, 2.0).unwrap();
        b.load_constant_32(2, 7).unwrap();

        assert_eq!(
            b.fmul(3, 0, 1),
            Err(Error::ArityMismatch {
                expected: Arity::Vec4,
                actual: Arity::Vec2
            })
        );
        assert_eq!(
            b.fsin(3, 0),
            Err(Error::ArityMismatch {
                expected: Arity::Scalar,
                actual: Arity::Vec4
            })
        );
        assert_eq!(
            b.iadd(3, 2, 0),
            Err(Error::ArityMismatch {
                expected: Arity::Int,
                actual: Arity::Vec4
            })
        );
        assert_eq!(
            b.fadd(3, 2, 2),
            Err(Error::ArityMismatch {
                expected: Arity::Scalar,
                actual: Arity::Int
            })
        );
        assert_eq!(
            b.fmul_by_v4_swizzle(3, 1, [(0, 0); 4]),
            Err(Error::ArityMismatch {
                expected: Arity::Vec4,
                actual: Arity::Vec2
            })
        );
        b.iadd(3, 2, 2).unwrap();
        b.fmul(4, 0, 0).unwrap();
        b.fmul_by_v4_swizzle(5, 0, [(1, 1), (1, 0), (0, 3), (0, 2)])
            .unwrap();
        assert_eq!(b.registers().arity(5), Ok(Arity::Vec4));
    }

    #[test]
    fn slot_references() {
        let mut b = ShaderBuilder::new();
        b.push_input_vec2().unwrap();
        b.push_output_32().unwrap();
        b.load_input(0, 0).unwrap();
        assert_eq!(b.load_input(1, 1), Err(Error::BadInputSlot(1, 1)));
        assert_eq!(b.load_output(1, 3), Err(Error::BadOutputSlot(3, 1)));
        b.load_output(1, 0).unwrap();
        assert_eq!(b.registers().arity(1), Ok(Arity::Scalar));

        b.load_channel(2, 0, 1).unwrap();
        b.store(2, 0).unwrap();
        assert_eq!(b.store(0, 0).unwrap_err(), Error::ArityMismatch {
            expected: Arity::Scalar,
            actual: Arity::Vec2
        });
        assert_eq!(b.store(2, 1), Err(Error::BadOutputSlot(1, 1)));
    }

    #[test]
    fn single_position() {
        let mut b = ShaderBuilder::new();
        b.push_output_vec2().unwrap();
        b.push_output_vertex_position().unwrap();
        assert_eq!(b.position(), Some(1));
        assert_eq!(
            b.push_output_vertex_position(),
            Err(Error::DuplicatePosition)
        );
        assert_eq!(b.outputs(), &[Arity::Vec2, Arity::Vec4]);
    }

    #[test]
    fn uniform_index() {
        let mut b = ShaderBuilder::new();
        b.load_ubo_vec4(0, 3, 15).unwrap();
        assert_eq!(
            b.load_ubo_vec4(1, 0, 16),
            Err(Error::BadUniformIndex(16, 16))
        );
    }

    #[test]
    fn finalized_rejects_pushes() {
        let mut b = with_vec4();
        b.finalize();
        assert_eq!(b.push_input_vec4(), Err(Error::AlreadyCompiled));
        assert_eq!(b.load(0, 1), Err(Error::AlreadyCompiled));
        assert_eq!(b.ops().len(), 1);
    }
}
