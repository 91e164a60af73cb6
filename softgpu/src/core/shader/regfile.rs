use crate::{
    Error,
    shader::{Arity, Channel, ShaderOp, Swizzle},
};
use std::collections::BTreeMap;

/// Number of `vec4` slots in each uniform group
///
/// A `(group, index)` pair addresses the `vec4` at byte offset
/// `(group * UNIFORM_GROUP_SIZE + index) * 16` within the uniform buffer.
pub const UNIFORM_GROUP_SIZE: u32 = 16;

/// Input and output slot declarations of a program
#[derive(Copy, Clone, Debug)]
pub struct Slots<'a> {
    /// Declared input arities, in slot order
    pub inputs: &'a [Arity],
    /// Declared output arities, in slot order
    pub outputs: &'a [Arity],
}

/// Metadata about a defined register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Shape of the value held in this register
    pub arity: Arity,
    /// Index of the instruction which defines this register
    pub producer: usize,
}

/// The set of registers defined so far in a program
///
/// Registers are write-once: each id may be defined by exactly one
/// instruction, and must be defined before any instruction reads it.  This
/// type enforces those rules, along with opcode-specific arity checks, one
/// instruction at a time.
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    regs: BTreeMap<u32, RegisterInfo>,
}

impl RegisterFile {
    /// Builds a new empty register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of defined registers
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Checks whether any register has been defined
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Looks up a defined register
    pub fn get(&self, reg: u32) -> Result<RegisterInfo, Error> {
        self.regs
            .get(&reg)
            .copied()
            .ok_or(Error::UndefinedRegister(reg))
    }

    /// Looks up the arity of a defined register
    pub fn arity(&self, reg: u32) -> Result<Arity, Error> {
        self.get(reg).map(|r| r.arity)
    }

    /// Iterates over `(register, info)` pairs in register order
    pub fn iter(&self) -> impl Iterator<Item = (u32, RegisterInfo)> + '_ {
        self.regs.iter().map(|(k, v)| (*k, *v))
    }

    fn float(&self, reg: u32) -> Result<Arity, Error> {
        let a = self.arity(reg)?;
        if a.is_float() {
            Ok(a)
        } else {
            Err(Error::ArityMismatch {
                expected: Arity::Scalar,
                actual: a,
            })
        }
    }

    fn exactly(&self, reg: u32, expected: Arity) -> Result<(), Error> {
        let actual = self.arity(reg)?;
        if actual == expected {
            Ok(())
        } else {
            Err(Error::ArityMismatch { expected, actual })
        }
    }

    fn channel(&self, reg: u32, channel: Channel) -> Result<(), Error> {
        let a = self.arity(reg)?;
        if a.is_vector() && channel.index() < a.width() {
            Ok(())
        } else {
            Err(Error::BadChannel(channel as u32, a))
        }
    }

    fn swizzle(&self, s: &[Swizzle; 4]) -> Result<(), Error> {
        s.iter().try_for_each(|s| self.channel(s.reg, s.channel))
    }

    /// Checks a single instruction against the registers defined so far
    ///
    /// On success, returns the arity of the register defined by the
    /// instruction (or `None` for a [`Store`](ShaderOp::Store)).  The register
    /// file is not modified.
    pub fn check(
        &self,
        op: &ShaderOp,
        slots: Slots,
    ) -> Result<Option<Arity>, Error> {
        if let Some(out) = op.output() {
            if self.regs.contains_key(&out) {
                return Err(Error::DuplicateRegister(out));
            }
        }
        let input = |slot: u32| {
            slots
                .inputs
                .get(slot as usize)
                .copied()
                .ok_or(Error::BadInputSlot(slot, slots.inputs.len()))
        };
        let output = |slot: u32| {
            slots
                .outputs
                .get(slot as usize)
                .copied()
                .ok_or(Error::BadOutputSlot(slot, slots.outputs.len()))
        };
        let binary_float = |a: u32, b: u32| {
            let ta = self.float(a)?;
            let tb = self.float(b)?;
            if ta == tb {
                Ok(ta)
            } else {
                Err(Error::ArityMismatch {
                    expected: ta,
                    actual: tb,
                })
            }
        };

        let arity = match *op {
            ShaderOp::Mov4(_, ref s) => {
                self.swizzle(s)?;
                Arity::Vec4
            }
            ShaderOp::Sin(_, a) => {
                self.exactly(a, Arity::Scalar)?;
                Arity::Scalar
            }
            ShaderOp::FMul(_, a, b) | ShaderOp::FAdd(_, a, b) => {
                binary_float(a, b)?
            }
            ShaderOp::FMulSwizzle(_, a, ref s) => {
                self.exactly(a, Arity::Vec4)?;
                self.swizzle(s)?;
                Arity::Vec4
            }
            ShaderOp::IAdd(_, a, b) => {
                self.exactly(a, Arity::Int)?;
                self.exactly(b, Arity::Int)?;
                Arity::Int
            }
            ShaderOp::Extract(_, a, c) => {
                self.channel(a, c)?;
                Arity::Scalar
            }
            ShaderOp::Input(_, slot) => input(slot)?,
            ShaderOp::Output(_, slot) => output(slot)?,
            ShaderOp::Uniform(_, _group, index) => {
                if index >= UNIFORM_GROUP_SIZE {
                    return Err(Error::BadUniformIndex(
                        index,
                        UNIFORM_GROUP_SIZE,
                    ));
                }
                Arity::Vec4
            }
            ShaderOp::ConstInt(..) => Arity::Int,
            ShaderOp::ConstVec2(..) => Arity::Vec2,
            ShaderOp::ConstVec4(..) => Arity::Vec4,
            ShaderOp::Copy(_, a) => self.arity(a)?,
            ShaderOp::Store(a, slot) => {
                let expected = output(slot)?;
                self.exactly(a, expected)?;
                return Ok(None);
            }
            ShaderOp::Sample(_, uv) => {
                self.exactly(uv, Arity::Vec2)?;
                Arity::Vec4
            }
        };
        Ok(Some(arity))
    }

    /// Checks an instruction, then records the register that it defines
    ///
    /// `index` is the position of the instruction within its program.  If the
    /// check fails, the register file is left unchanged.
    pub fn define(
        &mut self,
        op: &ShaderOp,
        slots: Slots,
        index: usize,
    ) -> Result<Option<Arity>, Error> {
        let arity = self.check(op, slots)?;
        if let (Some(out), Some(arity)) = (op.output(), arity) {
            self.regs.insert(
                out,
                RegisterInfo {
                    arity,
                    producer: index,
                },
            );
        }
        Ok(arity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const NONE: Slots = Slots {
        inputs: &[],
        outputs: &[],
    };

    #[test]
    fn write_once() {
        let mut r = RegisterFile::new();
        r.define(&ShaderOp::ConstVec4(1, [0.0; 4]), NONE, 0).unwrap();
        assert_eq!(
            r.define(&ShaderOp::ConstVec2(1, [0.0; 2]), NONE, 1),
            Err(Error::DuplicateRegister(1))
        );
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(1).unwrap().producer, 0);
        assert_eq!(r.arity(1), Ok(Arity::Vec4));
    }

    #[test]
    fn undefined_source() {
        let r = RegisterFile::new();
        assert_eq!(
            r.check(&ShaderOp::Copy(2, 1), NONE),
            Err(Error::UndefinedRegister(1))
        );
    }

    #[test]
    fn channel_range() {
        let mut r = RegisterFile::new();
        r.define(&ShaderOp::ConstVec2(0, [1.0, 2.0]), NONE, 0).unwrap();
        assert_eq!(
            r.check(&ShaderOp::Extract(1, 0, Channel::Y), NONE),
            Ok(Some(Arity::Scalar))
        );
        assert_eq!(
            r.check(&ShaderOp::Extract(1, 0, Channel::Z), NONE),
            Err(Error::BadChannel(2, Arity::Vec2))
        );
    }

    #[test]
    fn store_arity() {
        let outputs = [Arity::Vec4];
        let slots = Slots {
            inputs: &[],
            outputs: &outputs,
        };
        let mut r = RegisterFile::new();
        r.define(&ShaderOp::ConstVec2(0, [1.0, 2.0]), slots, 0).unwrap();
        assert_eq!(
            r.check(&ShaderOp::Store(0, 0), slots),
            Err(Error::ArityMismatch {
                expected: Arity::Vec4,
                actual: Arity::Vec2
            })
        );
        assert_eq!(
            r.check(&ShaderOp::Store(0, 1), slots),
            Err(Error::BadOutputSlot(1, 1))
        );
    }
}
