//! Interpreter for compiled shader programs
//!
//! A [`ShaderVm`] owns register and output storage, which is reused between
//! invocations; the render pipeline keeps one VM per worker thread.
//!
//! ```
//! use softgpu::{
//!     compiler::lower,
//!     shader::ShaderBuilder,
//!     vm::{Bindings, ShaderVm, Value},
//! };
//!
//! let mut b = ShaderBuilder::new();
//! b.push_input_32()?;
//! b.push_output_32()?;
//! b.load_input(0, 0)?;
//! b.fsin(1, 0)?;
//! b.store(1, 0)?;
//! let program = lower(&b)?;
//!
//! let mut vm = ShaderVm::new();
//! let out = vm.run(&program, &[Value::Scalar(0.0)], &Bindings::default())?;
//! assert_eq!(out, &[Value::Scalar(0.0)]);
//! # Ok::<(), softgpu::Error>(())
//! ```
use crate::{
    Error,
    compiler::Program,
    resource::TextureRef,
    shader::{Arity, ShaderOp, Swizzle, UNIFORM_GROUP_SIZE},
};

mod value;
pub use value::Value;

/// Resources which may be read by a running program
#[derive(Copy, Clone, Debug, Default)]
pub struct Bindings<'a> {
    /// Raw uniform buffer, read as little-endian `f32` values
    pub uniforms: Option<&'a [u8]>,
    /// Texture read by sampling instructions
    pub sampler: Option<TextureRef<'a>>,
}

impl Bindings<'_> {
    /// Reads the `vec4` at the given uniform address
    fn uniform(&self, group: u32, index: u32) -> Result<[f32; 4], Error> {
        let buf = self.uniforms.ok_or(Error::MissingUniformBuffer)?;
        let oob = Error::UniformOutOfBounds(group, index);
        let start = group
            .checked_mul(UNIFORM_GROUP_SIZE)
            .and_then(|g| g.checked_add(index))
            .and_then(|i| (i as usize).checked_mul(16))
            .ok_or_else(|| oob.clone())?;
        let bytes = start
            .checked_add(16)
            .and_then(|end| buf.get(start..end))
            .ok_or(oob)?;
        let mut out = [0.0; 4];
        for (o, b) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *o = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        }
        Ok(out)
    }
}

/// Helper struct to index registers by `u32`
struct Registers<'a>(&'a mut [Value]);

impl std::ops::Index<u32> for Registers<'_> {
    type Output = Value;
    fn index(&self, i: u32) -> &Self::Output {
        &self.0[i as usize]
    }
}

impl std::ops::IndexMut<u32> for Registers<'_> {
    fn index_mut(&mut self, i: u32) -> &mut Value {
        &mut self.0[i as usize]
    }
}

impl Registers<'_> {
    fn swizzle(&self, s: &[Swizzle; 4]) -> Result<[f32; 4], Error> {
        Ok([
            self[s[0].reg].channel(s[0].channel)?,
            self[s[1].reg].channel(s[1].channel)?,
            self[s[2].reg].channel(s[2].channel)?,
            self[s[3].reg].channel(s[3].channel)?,
        ])
    }
}

/// Reusable interpreter state
#[derive(Default)]
pub struct ShaderVm {
    regs: Vec<Value>,
    outputs: Vec<Value>,
}

impl ShaderVm {
    /// Builds a new interpreter with empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a program on a single set of inputs
    ///
    /// Inputs must match the program's declared input arities.  Outputs start
    /// out zeroed; the returned slice holds the final value of every output
    /// slot, and is valid until the next call to `run`.
    pub fn run(
        &mut self,
        program: &Program,
        inputs: &[Value],
        bindings: &Bindings,
    ) -> Result<&[Value], Error> {
        if inputs.len() != program.inputs().len() {
            return Err(Error::BadInputCount {
                expected: program.inputs().len(),
                actual: inputs.len(),
            });
        }
        for (v, a) in inputs.iter().zip(program.inputs()) {
            if v.arity() != *a {
                return Err(Error::ArityMismatch {
                    expected: *a,
                    actual: v.arity(),
                });
            }
        }

        self.outputs.clear();
        self.outputs
            .extend(program.outputs().iter().map(|a| Value::zero(*a)));
        self.regs.clear();
        self.regs
            .resize(program.reg_count() as usize, Value::Int(0));

        let mut v = Registers(&mut self.regs);
        for op in program.ops() {
            match *op {
                ShaderOp::Mov4(out, ref s) => {
                    v[out] = Value::Vec4(v.swizzle(s)?);
                }
                ShaderOp::Sin(out, a) => {
                    let Value::Scalar(x) = v[a] else {
                        return Err(mismatch(Arity::Scalar, v[a]));
                    };
                    v[out] = Value::Scalar(x.sin());
                }
                ShaderOp::FMul(out, a, b) => {
                    v[out] = v[a].zip_with(&v[b], |a, b| a * b)?;
                }
                ShaderOp::FMulSwizzle(out, a, ref s) => {
                    let rhs = Value::Vec4(v.swizzle(s)?);
                    v[out] = v[a].zip_with(&rhs, |a, b| a * b)?;
                }
                ShaderOp::FAdd(out, a, b) => {
                    v[out] = v[a].zip_with(&v[b], |a, b| a + b)?;
                }
                ShaderOp::IAdd(out, a, b) => {
                    let (Value::Int(x), Value::Int(y)) = (v[a], v[b]) else {
                        return Err(Error::ArityMismatch {
                            expected: v[a].arity(),
                            actual: v[b].arity(),
                        });
                    };
                    v[out] = Value::Int(x.wrapping_add(y));
                }
                ShaderOp::Extract(out, a, c) => {
                    v[out] = Value::Scalar(v[a].channel(c)?);
                }
                ShaderOp::Input(out, slot) => {
                    v[out] = inputs[slot as usize];
                }
                ShaderOp::Output(out, slot) => {
                    v[out] = self.outputs[slot as usize];
                }
                ShaderOp::Uniform(out, group, index) => {
                    v[out] = Value::Vec4(bindings.uniform(group, index)?);
                }
                ShaderOp::ConstInt(out, x) => v[out] = Value::Int(x),
                ShaderOp::ConstVec2(out, x) => v[out] = Value::Vec2(x),
                ShaderOp::ConstVec4(out, x) => v[out] = Value::Vec4(x),
                ShaderOp::Copy(out, a) => v[out] = v[a],
                ShaderOp::Store(a, slot) => {
                    self.outputs[slot as usize] = v[a];
                }
                ShaderOp::Sample(out, uv) => {
                    let Value::Vec2([s, t]) = v[uv] else {
                        return Err(mismatch(Arity::Vec2, v[uv]));
                    };
                    let tex = bindings.sampler.ok_or(Error::MissingSampler)?;
                    v[out] = Value::Vec4(tex.sample_nearest(s, t));
                }
            }
        }
        Ok(&self.outputs)
    }
}

fn mismatch(expected: Arity, v: Value) -> Error {
    Error::ArityMismatch {
        expected,
        actual: v.arity(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{compiler::lower, shader::ShaderBuilder};
    use approx::assert_relative_eq;

    fn run(
        b: &ShaderBuilder,
        inputs: &[Value],
        bindings: &Bindings,
    ) -> Vec<Value> {
        let p = lower(b).unwrap();
        ShaderVm::new().run(&p, inputs, bindings).unwrap().to_vec()
    }

    #[test]
    fn arithmetic() {
        let mut b = ShaderBuilder::new();
        b.push_input_vec3().unwrap();
        b.push_output_vec4().unwrap();
        b.push_output_32().unwrap();
        b.load_input(0, 0).unwrap();
        b.load_constant_vec4(1, 1.0, 2.0, 3.0, 4.0).unwrap();
        b.mov4(2, [(0, 2), (0, 1), (0, 0), (1, 3)]).unwrap();
        b.fadd(3, 2, 1).unwrap();
        b.fmul_by_v4_swizzle(4, 3, [(1, 0), (1, 0), (1, 1), (1, 1)])
            .unwrap();
        b.store(4, 0).unwrap();
        b.load_channel(5, 4, 3).unwrap();
        b.fmul(6, 5, 5).unwrap();
        b.store(6, 1).unwrap();

        let inputs = [Value::Vec3([10.0, 20.0, 30.0])];
        let out = run(&b, &inputs, &Bindings::default());
        // mov4 = (30, 20, 10, 4); + (1, 2, 3, 4) = (31, 22, 13, 8)
        // * (1, 1, 2, 2) = (31, 22, 26, 16)
        assert_eq!(out[0], Value::Vec4([31.0, 22.0, 26.0, 16.0]));
        assert_eq!(out[1], Value::Scalar(256.0));
    }

    #[test]
    fn integers_wrap() {
        let mut b = ShaderBuilder::new();
        b.push_output_vec2().unwrap();
        b.load_constant_32(0, u32::MAX).unwrap();
        b.load_constant_32(1, 2).unwrap();
        b.iadd(2, 0, 1).unwrap();
        b.load_constant_vec2(3, 0.5, 0.5).unwrap();
        b.store(3, 0).unwrap();
        let p = lower(&b).unwrap();
        let mut vm = ShaderVm::new();
        vm.run(&p, &[], &Bindings::default()).unwrap();
        assert_eq!(vm.regs[2], Value::Int(1));
    }

    #[test]
    fn sine() {
        let mut b = ShaderBuilder::new();
        b.push_input_32().unwrap();
        b.push_output_32().unwrap();
        b.load_input(0, 0).unwrap();
        b.fsin(1, 0).unwrap();
        b.store(1, 0).unwrap();
        let out = run(
            &b,
            &[Value::Scalar(std::f32::consts::FRAC_PI_2)],
            &Bindings::default(),
        );
        let Value::Scalar(v) = out[0] else { panic!() };
        assert_relative_eq!(v, 1.0);
    }

    #[test]
    fn outputs_start_zeroed() {
        let mut b = ShaderBuilder::new();
        b.push_output_vec2().unwrap();
        b.push_output_vec2().unwrap();
        b.load_output(0, 0).unwrap();
        b.store(0, 1).unwrap();
        b.load_constant_vec2(1, 3.0, 4.0).unwrap();
        b.store(1, 0).unwrap();
        b.load_output(2, 0).unwrap();
        b.fadd(3, 2, 2).unwrap();
        b.store(3, 0).unwrap();

        let out = run(&b, &[], &Bindings::default());
        assert_eq!(out, vec![Value::Vec2([6.0, 8.0]), Value::Vec2([0.0; 2])]);
    }

    #[test]
    fn uniforms() {
        let mut b = ShaderBuilder::new();
        b.push_output_vec4().unwrap();
        b.load_ubo_vec4(0, 1, 2).unwrap();
        b.store(0, 0).unwrap();
        let p = lower(&b).unwrap();

        let mut ubo = vec![0u8; 16 * 16 * 2];
        let start = (UNIFORM_GROUP_SIZE as usize + 2) * 16;
        for (i, v) in [1.0f32, -2.0, 0.5, 8.0].iter().enumerate() {
            ubo[start + i * 4..][..4].copy_from_slice(&v.to_le_bytes());
        }
        let mut vm = ShaderVm::new();
        let bind = Bindings {
            uniforms: Some(&ubo),
            sampler: None,
        };
        assert_eq!(
            vm.run(&p, &[], &bind).unwrap(),
            &[Value::Vec4([1.0, -2.0, 0.5, 8.0])]
        );

        let bind = Bindings {
            uniforms: Some(&ubo[..start + 8]),
            sampler: None,
        };
        assert_eq!(
            vm.run(&p, &[], &bind),
            Err(Error::UniformOutOfBounds(1, 2))
        );
        assert_eq!(
            vm.run(&p, &[], &Bindings::default()),
            Err(Error::MissingUniformBuffer)
        );
    }

    #[test]
    fn sampling() {
        let mut b = ShaderBuilder::new();
        b.push_input_vec2().unwrap();
        b.push_output_vec4().unwrap();
        b.load_input(0, 0).unwrap();
        b.sample_texture(1, 0).unwrap();
        b.store(1, 0).unwrap();
        let p = lower(&b).unwrap();

        // 2x1 texture: red on the left, blue on the right
        let data = [255, 0, 0, 255, 0, 0, 255, 255];
        let tex = TextureRef::new(2, 1, &data);
        let bind = Bindings {
            uniforms: None,
            sampler: Some(tex),
        };
        let mut vm = ShaderVm::new();
        let out = vm.run(&p, &[Value::Vec2([0.9, 0.5])], &bind).unwrap();
        assert_eq!(out, &[Value::Vec4([0.0, 0.0, 1.0, 1.0])]);
        let out = vm.run(&p, &[Value::Vec2([-3.0, 0.5])], &bind).unwrap();
        assert_eq!(out, &[Value::Vec4([1.0, 0.0, 0.0, 1.0])]);

        assert_eq!(
            vm.run(&p, &[Value::Vec2([0.0; 2])], &Bindings::default()),
            Err(Error::MissingSampler)
        );
    }

    #[test]
    fn input_checks() {
        let mut b = ShaderBuilder::new();
        b.push_input_vec2().unwrap();
        let p = lower(&b).unwrap();
        let mut vm = ShaderVm::new();
        assert_eq!(
            vm.run(&p, &[], &Bindings::default()),
            Err(Error::BadInputCount {
                expected: 1,
                actual: 0
            })
        );
        assert_eq!(
            vm.run(&p, &[Value::Scalar(1.0)], &Bindings::default()),
            Err(Error::ArityMismatch {
                expected: Arity::Vec2,
                actual: Arity::Scalar
            })
        );
    }
}
