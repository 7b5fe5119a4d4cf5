use std::fmt;
use std::sync::Arc;

use crate::error::OperationError;
use crate::object::Object;
use crate::value::{Kind, Value, ValueSet};

/// The closed set of ways a field definition can be merged onto what it
/// inherits. Every combinator has an assignment spelling, and the lexer
/// resolves assignment tokens through [`Combinator::from_operator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    Set,
    Add,
    Subtract,
    Multiply,
    Division,
    Modulo,
    Power,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    RightPaddedShift,
}

impl Combinator {
    pub const ALL: [Combinator; 13] = [
        Combinator::Set,
        Combinator::Add,
        Combinator::Subtract,
        Combinator::Multiply,
        Combinator::Division,
        Combinator::Modulo,
        Combinator::Power,
        Combinator::BitwiseAnd,
        Combinator::BitwiseOr,
        Combinator::BitwiseXor,
        Combinator::LeftShift,
        Combinator::RightShift,
        Combinator::RightPaddedShift,
    ];

    /// The assignment spelling, as written in a field declaration.
    pub fn operator(self) -> &'static str {
        match self {
            Combinator::Set => "=",
            Combinator::Add => "+=",
            Combinator::Subtract => "-=",
            Combinator::Multiply => "*=",
            Combinator::Division => "/=",
            Combinator::Modulo => "%=",
            Combinator::Power => "'=",
            Combinator::BitwiseAnd => "&=",
            Combinator::BitwiseOr => "|=",
            Combinator::BitwiseXor => "^=",
            Combinator::LeftShift => "<<=",
            Combinator::RightShift => ">>=",
            Combinator::RightPaddedShift => ">>>=",
        }
    }

    /// The combinator spelled `operator`, if any.
    pub fn from_operator(operator: &str) -> Option<Combinator> {
        Combinator::ALL
            .into_iter()
            .find(|combinator| combinator.operator() == operator)
    }

    pub fn name(self) -> &'static str {
        match self {
            Combinator::Set => "assignment",
            Combinator::Add => "addition",
            Combinator::Subtract => "subtraction",
            Combinator::Multiply => "multiplication",
            Combinator::Division => "division",
            Combinator::Modulo => "modulo",
            Combinator::Power => "power",
            Combinator::BitwiseAnd => "bitwise-and",
            Combinator::BitwiseOr => "bitwise-or",
            Combinator::BitwiseXor => "bitwise-xor",
            Combinator::LeftShift => "left shift",
            Combinator::RightShift => "right shift",
            Combinator::RightPaddedShift => "right padded shift",
        }
    }

    /// Computes `target OP operand`. An absent or null target makes every
    /// combinator yield a copy of the operand.
    pub fn combine(self, operand: &Value, target: Option<&Value>) -> Result<Value, OperationError> {
        let target = match target {
            None | Some(Value::Null) => return Ok(operand.copy()),
            Some(target) => target,
        };
        match self {
            Combinator::Set => Ok(operand.copy()),
            Combinator::Add => self.add(operand, target),
            Combinator::Subtract => self.subtract(operand, target),
            Combinator::Multiply | Combinator::Division | Combinator::Modulo | Combinator::Power => {
                self.arithmetic(operand, target)
            }
            Combinator::BitwiseAnd | Combinator::BitwiseOr | Combinator::BitwiseXor => {
                self.bitwise(operand, target)
            }
            Combinator::LeftShift | Combinator::RightShift | Combinator::RightPaddedShift => {
                self.shift(operand, target)
            }
        }
    }

    fn mismatch(self, kind: Kind) -> OperationError {
        OperationError::Mismatch {
            operator: self.name(),
            kind,
        }
    }

    // Brings both sides to the same kind by promoting the lower ranked one.
    // Returns (operand, target).
    fn align(self, operand: &Value, target: &Value) -> Result<(Value, Value), OperationError> {
        let (operand_kind, target_kind) = (operand.kind(), target.kind());
        if operand_kind == target_kind {
            return Ok((operand.clone(), target.clone()));
        }
        for kind in [operand_kind, target_kind] {
            if kind.rank().is_none() {
                return Err(self.mismatch(kind));
            }
        }
        if operand_kind.min(target_kind) == Kind::Set && operand_kind.max(target_kind) == Kind::List {
            return Err(self.mismatch(Kind::Set));
        }
        if operand_kind < target_kind {
            Ok((operand.promote_to(target_kind)?, target.clone()))
        } else {
            Ok((operand.clone(), target.promote_to(operand_kind)?))
        }
    }

    fn add(self, operand: &Value, target: &Value) -> Result<Value, OperationError> {
        match self.align(operand, target)? {
            (Value::Boolean(o), Value::Boolean(t)) => Ok(Value::Boolean(t || o)),
            (Value::Integer(o), Value::Integer(t)) => Ok(Value::Integer(t.wrapping_add(o))),
            (Value::Float(o), Value::Float(t)) => Ok(Value::Float(t + o)),
            (Value::String(o), Value::String(t)) => Ok(Value::String(t + &o)),
            (Value::Set(o), Value::Set(t)) => Ok(Value::Set(t.union(&o).cloned().collect())),
            (Value::List(o), Value::List(mut t)) => {
                t.extend(o);
                Ok(Value::List(t))
            }
            (Value::Object(o), Value::Object(t)) => {
                let mut merged = Object::anonymous();
                merged.cascade(&t)?;
                merged.cascade(&o)?;
                Ok(Value::Object(Arc::new(merged)))
            }
            (_, t) => Err(self.mismatch(t.kind())),
        }
    }

    fn subtract(self, operand: &Value, target: &Value) -> Result<Value, OperationError> {
        match self.align(operand, target)? {
            (Value::Boolean(o), Value::Boolean(t)) => Ok(Value::Boolean(t || o)),
            (Value::Integer(o), Value::Integer(t)) => Ok(Value::Integer(t.wrapping_sub(o))),
            (Value::Float(o), Value::Float(t)) => Ok(Value::Float(t - o)),
            (Value::String(o), Value::String(t)) => Ok(Value::String(t.replace(&o, ""))),
            (Value::Set(o), Value::Set(t)) => {
                Ok(Value::Set(t.difference(&o).cloned().collect()))
            }
            (Value::List(o), Value::List(mut t)) => {
                // each operand element removes at most one match
                for element in &o {
                    if let Some(position) = t.iter().position(|v| v == element) {
                        t.remove(position);
                    }
                }
                Ok(Value::List(t))
            }
            (_, t) => Err(self.mismatch(t.kind())),
        }
    }

    fn arithmetic(self, operand: &Value, target: &Value) -> Result<Value, OperationError> {
        for kind in [target.kind(), operand.kind()] {
            if !matches!(kind, Kind::Boolean | Kind::Integer | Kind::Float) {
                return Err(self.mismatch(kind));
            }
        }
        match self.align(operand, target)? {
            (Value::Boolean(o), Value::Boolean(t)) => Ok(Value::Boolean(match self {
                Combinator::Modulo => t || o,
                _ => t && o,
            })),
            (Value::Integer(o), Value::Integer(t)) => match self {
                Combinator::Multiply => Ok(Value::Integer(t.wrapping_mul(o))),
                Combinator::Division if o == 0 => Err(self.divide_by_zero()),
                Combinator::Division => Ok(Value::Integer(t.wrapping_div(o))),
                Combinator::Modulo if o == 0 => Err(self.divide_by_zero()),
                Combinator::Modulo => Ok(Value::Integer(t.wrapping_rem(o))),
                _ => Ok(Value::Integer((t as f64).powf(o as f64) as i64)),
            },
            (Value::Float(o), Value::Float(t)) => match self {
                Combinator::Multiply => Ok(Value::Float(t * o)),
                Combinator::Division if o == 0.0 => Err(self.divide_by_zero()),
                Combinator::Division => Ok(Value::Float(t / o)),
                Combinator::Modulo if o == 0.0 => Err(self.divide_by_zero()),
                Combinator::Modulo => Ok(Value::Float(t % o)),
                _ => Ok(Value::Float(t.powf(o))),
            },
            (_, t) => Err(self.mismatch(t.kind())),
        }
    }

    fn divide_by_zero(self) -> OperationError {
        OperationError::DivideByZero {
            operator: self.name(),
        }
    }

    fn bitwise(self, operand: &Value, target: &Value) -> Result<Value, OperationError> {
        if let (Value::Set(o), Value::Set(t)) = (operand, target) {
            let combined: ValueSet = match self {
                Combinator::BitwiseAnd => t.intersection(o).cloned().collect(),
                Combinator::BitwiseOr => t.union(o).cloned().collect(),
                _ => t.symmetric_difference(o).cloned().collect(),
            };
            return Ok(Value::Set(combined));
        }
        let t = self.bits(target)?;
        let o = self.bits(operand)?;
        let result = match self {
            Combinator::BitwiseAnd => t & o,
            Combinator::BitwiseOr => t | o,
            _ => t ^ o,
        };
        Ok(from_bits(result, target.kind().max(operand.kind())))
    }

    fn bits(self, value: &Value) -> Result<i64, OperationError> {
        match value {
            Value::Boolean(b) => Ok(if *b { -1 } else { 0 }),
            Value::Integer(i) => Ok(*i),
            Value::Float(f) => Ok(f.to_bits() as i64),
            other => Err(self.mismatch(other.kind())),
        }
    }

    fn shift(self, operand: &Value, target: &Value) -> Result<Value, OperationError> {
        if !matches!(
            target,
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::List(_)
        ) {
            return Err(self.mismatch(target.kind()));
        }
        let Value::Integer(amount) = operand else {
            return Err(OperationError::ShiftOperand {
                operator: self.name(),
                kind: operand.kind(),
            });
        };
        if let Value::List(list) = target {
            let dropped = amount.unsigned_abs().min(list.len() as u64) as usize;
            let kept = match self {
                Combinator::LeftShift => list[dropped..].to_vec(),
                _ => list[..list.len() - dropped].to_vec(),
            };
            return Ok(Value::List(kept));
        }
        let bits = self.bits(target)?;
        // the shift distance wraps modulo 64, as on the hardware
        let distance = *amount as u32;
        let shifted = match self {
            Combinator::LeftShift => bits.wrapping_shl(distance),
            Combinator::RightShift => bits.wrapping_shr(distance),
            _ => (bits as u64).wrapping_shr(distance) as i64,
        };
        Ok(from_bits(shifted, target.kind().max(Kind::Integer)))
    }
}

fn from_bits(bits: i64, kind: Kind) -> Value {
    match kind {
        Kind::Boolean => Value::Boolean(bits != 0),
        Kind::Float => Value::Float(f64::from_bits(bits as u64)),
        _ => Value::Integer(bits),
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.operator())
    }
}
