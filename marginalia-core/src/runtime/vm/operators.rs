//! Arithmetic and comparison

use super::{Thrown, VmResult};
use crate::runtime::bytecode::OpCode;
use crate::runtime::value::Value;
use std::cmp::Ordering;

fn symbol(op: OpCode) -> &'static str {
    match op {
        OpCode::Add => "+",
        OpCode::Subtract => "-",
        OpCode::Multiply => "*",
        OpCode::Divide => "/",
        OpCode::Modulo => "%",
        OpCode::Less => "<",
        OpCode::LessEqual => "<=",
        OpCode::Greater => ">",
        OpCode::GreaterEqual => ">=",
        _ => "?",
    }
}

fn unsupported(op: OpCode, left: &Value, right: &Value) -> Thrown {
    Thrown::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol(op),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> Thrown {
    Thrown::new("OverflowError", "integer overflow")
}

fn zero_division() -> Thrown {
    Thrown::new("ZeroDivisionError", "division by zero")
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn structural_eq(left: &Value, right: &Value) -> VmResult<bool> {
    left.try_equals(right).ok_or_else(|| {
        Thrown::new("RecursionError", "maximum recursion depth exceeded in comparison")
    })
}

pub(super) fn binary(op: OpCode, left: &Value, right: &Value) -> VmResult<Value> {
    match op {
        OpCode::Equal => return structural_eq(left, right).map(Value::Bool),
        OpCode::NotEqual => return structural_eq(left, right).map(|eq| Value::Bool(!eq)),
        OpCode::Less | OpCode::LessEqual | OpCode::Greater | OpCode::GreaterEqual => {
            return compare(op, left, right)
        }
        _ => {}
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (as_float(left), as_float(right)) {
                (Some(a), Some(b)) => float_arithmetic(op, a, b),
                _ => Err(unsupported(op, left, right)),
            }
        }
        (Value::Str(a), Value::Str(b)) if op == OpCode::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::str(&joined))
        }
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == OpCode::Multiply => {
            Ok(Value::str(&s.repeat((*n).max(0) as usize)))
        }
        (Value::List(a), Value::List(b)) if op == OpCode::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn int_arithmetic(op: OpCode, a: i64, b: i64) -> VmResult<Value> {
    let result = match op {
        OpCode::Add => a.checked_add(b).ok_or_else(overflow)?,
        OpCode::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
        OpCode::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
        OpCode::Divide => {
            if b == 0 {
                return Err(zero_division());
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        OpCode::Modulo => {
            if b == 0 {
                return Err(zero_division());
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // result takes the sign of the divisor
            if r != 0 && (r < 0) != (b < 0) {
                r + b
            } else {
                r
            }
        }
        _ => return Err(Thrown::type_error("invalid integer operation")),
    };
    Ok(Value::Int(result))
}

fn float_arithmetic(op: OpCode, a: f64, b: f64) -> VmResult<Value> {
    let result = match op {
        OpCode::Add => a + b,
        OpCode::Subtract => a - b,
        OpCode::Multiply => a * b,
        OpCode::Divide => {
            if b == 0.0 {
                return Err(zero_division());
            }
            a / b
        }
        OpCode::Modulo => {
            if b == 0.0 {
                return Err(zero_division());
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        _ => return Err(Thrown::type_error("invalid float operation")),
    };
    Ok(Value::Float(result))
}

fn compare(op: OpCode, left: &Value, right: &Value) -> VmResult<Value> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(Thrown::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    symbol(op),
                    left.type_name(),
                    right.type_name()
                )))
            }
        },
    };
    // NaN compares false both ways
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        OpCode::Less => ordering == Ordering::Less,
        OpCode::LessEqual => ordering != Ordering::Greater,
        OpCode::Greater => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

pub(super) fn negate(operand: &Value) -> VmResult<Value> {
    match operand {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Thrown::type_error(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}
