//! Compiler infrastructure
//!
//! Compilation runs in two steps:
//! - The instruction list in a [`ShaderBuilder`] is re-validated as a whole
//!   (every operand resolvable, every declared output written), and register
//!   ids are renumbered densely in definition order, producing a
//!   [`Program`].
//! - The [`Program`] is serialized into an opaque blob, using the format
//!   described in the [`bytecode`](crate::bytecode) module.
//!
//! The same validation runs again when a blob is decoded, so the interpreter
//! never sees a program which breaks the register rules.
use crate::{
    Error,
    shader::{Arity, RegisterFile, ShaderBuilder, ShaderOp, Slots},
};
use std::collections::HashMap;

/// Pipeline stage of a program
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Program has a vertex position output
    Vertex,
    /// Program has no vertex position output
    Fragment,
}

/// A validated program with densely-numbered registers
///
/// Registers are numbered `0..reg_count`, and every register is defined by
/// exactly one instruction before any instruction reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    inputs: Vec<Arity>,
    outputs: Vec<Arity>,
    position: Option<u32>,
    reg_count: u32,
    ops: Vec<ShaderOp>,
}

impl Program {
    /// Builds a program, checking every instruction and declaration
    ///
    /// Registers must be exactly `0..reg_count`, each defined once.
    pub fn new(
        inputs: Vec<Arity>,
        outputs: Vec<Arity>,
        position: Option<u32>,
        reg_count: u32,
        ops: Vec<ShaderOp>,
    ) -> Result<Self, Error> {
        let defined = validate(&inputs, &outputs, position, &ops)?;
        if let Some(r) = ops
            .iter()
            .filter_map(|op| op.output())
            .find(|r| *r >= reg_count)
        {
            return Err(Error::UndefinedRegister(r));
        }
        // Registers are write-once and below `reg_count`, so an equal count
        // means they are exactly `0..reg_count`
        if defined != reg_count as usize {
            return Err(Error::RegisterCountMismatch(reg_count, defined));
        }
        Ok(Self {
            inputs,
            outputs,
            position,
            reg_count,
            ops,
        })
    }

    /// Returns the stage of this program, based on its position output
    pub fn stage(&self) -> Stage {
        if self.position.is_some() {
            Stage::Vertex
        } else {
            Stage::Fragment
        }
    }

    /// Returns the declared input arities
    pub fn inputs(&self) -> &[Arity] {
        &self.inputs
    }

    /// Returns the declared output arities
    pub fn outputs(&self) -> &[Arity] {
        &self.outputs
    }

    /// Returns the index of the vertex position output, if present
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Returns the number of registers used by the program
    pub fn reg_count(&self) -> u32 {
        self.reg_count
    }

    /// Returns the instruction list
    pub fn ops(&self) -> &[ShaderOp] {
        &self.ops
    }

    /// Iterates over output slots which are interpolated across triangles
    ///
    /// This is every output except for the vertex position, in slot order.
    pub fn varyings(&self) -> impl Iterator<Item = (usize, Arity)> + '_ {
        self.outputs
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| Some(*i as u32) != self.position)
    }

    /// Checks whether the program reads from the uniform buffer
    pub fn uses_uniforms(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, ShaderOp::Uniform(..)))
    }

    /// Checks whether the program samples from the sampler texture
    pub fn uses_sampler(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, ShaderOp::Sample(..)))
    }
}

/// Whole-program validation
///
/// Every instruction is checked against a fresh register file, every
/// declared output must be stored at least once, and the position output (if
/// any) must be a `vec4` slot.
///
/// Returns the number of registers defined.
fn validate(
    inputs: &[Arity],
    outputs: &[Arity],
    position: Option<u32>,
    ops: &[ShaderOp],
) -> Result<usize, Error> {
    if let Some(p) = position {
        match outputs.get(p as usize) {
            Some(Arity::Vec4) => (),
            Some(a) => {
                return Err(Error::ArityMismatch {
                    expected: Arity::Vec4,
                    actual: *a,
                });
            }
            None => return Err(Error::BadOutputSlot(p, outputs.len())),
        }
    }
    let slots = Slots { inputs, outputs };
    let mut regs = RegisterFile::new();
    let mut written = vec![false; outputs.len()];
    for (i, op) in ops.iter().enumerate() {
        regs.define(op, slots, i)?;
        if let ShaderOp::Store(_, slot) = op {
            written[*slot as usize] = true;
        }
    }
    if let Some(i) = written.iter().position(|w| !*w) {
        return Err(Error::UnwrittenOutput(i));
    }
    Ok(regs.len())
}

/// Opaque compiled shader blob
///
/// The contents are only meaningful to [`Program::from_bytes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledShader(Vec<u8>);

#[allow(clippy::len_without_is_empty)]
impl CompiledShader {
    /// Returns the length of the blob, in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a view of the blob
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps the inner byte vector
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Lowers a builder's instructions into a [`Program`]
///
/// Register ids are renumbered in definition order.  The builder is not
/// modified.
pub fn lower(builder: &ShaderBuilder) -> Result<Program, Error> {
    validate(
        builder.inputs(),
        builder.outputs(),
        builder.position(),
        builder.ops(),
    )?;

    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let mut ops = Vec::with_capacity(builder.ops().len());
    for op in builder.ops() {
        if let Some(out) = op.output() {
            let next = mapping.len() as u32;
            mapping.insert(out, next);
        }
        // Validation guarantees that every register is already mapped
        ops.push(op.remap(|r| mapping.get(&r).copied().unwrap_or(u32::MAX)));
    }
    Program::new(
        builder.inputs().to_vec(),
        builder.outputs().to_vec(),
        builder.position(),
        mapping.len() as u32,
        ops,
    )
}

/// Compiles a shader into an opaque blob
///
/// On success, the builder is finalized and rejects further pushes.  On
/// failure, the builder is left unchanged and may be fixed up and compiled
/// again.
pub fn compile_shader(
    builder: &mut ShaderBuilder,
) -> Result<CompiledShader, Error> {
    if builder.is_finalized() {
        return Err(Error::AlreadyCompiled);
    }
    let program = lower(builder)?;
    let out = CompiledShader(program.to_bytes());
    builder.finalize();
    log::debug!(
        "compiled {:?} shader: {} ops, {} registers, {} bytes",
        program.stage(),
        program.ops().len(),
        program.reg_count(),
        out.len(),
    );
    Ok(out)
}
