//! Runtime values for the Lox VM.

use std::fmt;

use super::object::{Heap, ObjRef};

/// A Lox value. Heap data is referenced through an [`ObjRef`] handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Obj(ObjRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Obj(_) => "string",
        }
    }

    /// `nil` and `false` are falsey; everything else is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Format this value the way `print` shows it.
    pub fn display<'h>(&self, heap: &'h Heap) -> ValueDisplay<'h> {
        ValueDisplay { value: *self, heap }
    }
}

/// Equality used by `==`. Different types are never equal; objects compare
/// by handle, which is sound because every string is interned.
pub fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Obj(a), Value::Obj(b)) => a == b,
        _ => false,
    }
}

pub struct ValueDisplay<'h> {
    value: Value,
    heap: &'h Heap,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Obj(obj) => write!(f, "{}", self.heap.string(obj).as_str()),
        }
    }
}
