use crate::{
    Error,
    shader::{Arity, Channel},
};

/// A value held by a register, input slot, or output slot
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    /// Single `f32`
    Scalar(f32),
    /// Two-channel vector
    Vec2([f32; 2]),
    /// Three-channel vector
    Vec3([f32; 3]),
    /// Four-channel vector
    Vec4([f32; 4]),
    /// Single `u32`
    Int(u32),
}

impl Value {
    /// Returns an all-zero value of the given arity
    pub fn zero(arity: Arity) -> Self {
        match arity {
            Arity::Scalar => Value::Scalar(0.0),
            Arity::Vec2 => Value::Vec2([0.0; 2]),
            Arity::Vec3 => Value::Vec3([0.0; 3]),
            Arity::Vec4 => Value::Vec4([0.0; 4]),
            Arity::Int => Value::Int(0),
        }
    }

    /// Returns the arity of this value
    pub fn arity(&self) -> Arity {
        match self {
            Value::Scalar(..) => Arity::Scalar,
            Value::Vec2(..) => Arity::Vec2,
            Value::Vec3(..) => Arity::Vec3,
            Value::Vec4(..) => Arity::Vec4,
            Value::Int(..) => Arity::Int,
        }
    }

    /// Builds a float value from its components
    ///
    /// Returns `None` if `arity` is [`Arity::Int`] or if the component count
    /// doesn't match the arity.
    pub fn from_components(arity: Arity, c: &[f32]) -> Option<Self> {
        let v = match (arity, c) {
            (Arity::Scalar, [x]) => Value::Scalar(*x),
            (Arity::Vec2, [x, y]) => Value::Vec2([*x, *y]),
            (Arity::Vec3, [x, y, z]) => Value::Vec3([*x, *y, *z]),
            (Arity::Vec4, [x, y, z, w]) => Value::Vec4([*x, *y, *z, *w]),
            _ => return None,
        };
        Some(v)
    }

    /// Returns the float components of this value
    ///
    /// Integers have no float components, so this returns an empty slice.
    pub fn components(&self) -> &[f32] {
        match self {
            Value::Scalar(x) => std::slice::from_ref(x),
            Value::Vec2(v) => v,
            Value::Vec3(v) => v,
            Value::Vec4(v) => v,
            Value::Int(..) => &[],
        }
    }

    fn components_mut(&mut self) -> &mut [f32] {
        match self {
            Value::Scalar(x) => std::slice::from_mut(x),
            Value::Vec2(v) => v,
            Value::Vec3(v) => v,
            Value::Vec4(v) => v,
            Value::Int(..) => &mut [],
        }
    }

    /// Reads a single channel of a vector value
    pub fn channel(&self, c: Channel) -> Result<f32, Error> {
        match self {
            Value::Vec2(..) | Value::Vec3(..) | Value::Vec4(..) => self
                .components()
                .get(c.index())
                .copied()
                .ok_or(Error::BadChannel(c as u32, self.arity())),
            _ => Err(Error::BadChannel(c as u32, self.arity())),
        }
    }

    /// Applies a binary float operation channel-by-channel
    ///
    /// Both values must have the same float arity.
    pub fn zip_with<F: Fn(f32, f32) -> f32>(
        &self,
        other: &Value,
        f: F,
    ) -> Result<Value, Error> {
        if self.arity() != other.arity() || !self.arity().is_float() {
            return Err(Error::ArityMismatch {
                expected: self.arity(),
                actual: other.arity(),
            });
        }
        let mut out = *self;
        for (o, b) in out.components_mut().iter_mut().zip(other.components()) {
            *o = f(*o, *b);
        }
        Ok(out)
    }

    /// Returns the value as a `vec4`, or an error for any other arity
    pub fn as_vec4(&self) -> Result<[f32; 4], Error> {
        match self {
            Value::Vec4(v) => Ok(*v),
            v => Err(Error::ArityMismatch {
                expected: Arity::Vec4,
                actual: v.arity(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn components() {
        let v = Value::from_components(Arity::Vec3, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(v, Value::Vec3([1.0, 2.0, 3.0]));
        assert_eq!(v.channel(Channel::Z), Ok(3.0));
        assert_eq!(
            v.channel(Channel::W),
            Err(Error::BadChannel(3, Arity::Vec3))
        );
        assert!(Value::from_components(Arity::Vec2, &[1.0]).is_none());
        assert!(Value::from_components(Arity::Int, &[1.0]).is_none());
        assert!(Value::Int(3).components().is_empty());
    }

    #[test]
    fn zip() {
        let a = Value::Vec2([1.0, 2.0]);
        let b = Value::Vec2([3.0, 5.0]);
        assert_eq!(a.zip_with(&b, |a, b| a * b), Ok(Value::Vec2([3.0, 10.0])));
        assert!(a.zip_with(&Value::Scalar(1.0), |a, b| a + b).is_err());
        assert!(Value::Int(1).zip_with(&Value::Int(2), |a, b| a + b).is_err());
    }
}
