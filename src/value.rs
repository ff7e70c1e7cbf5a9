//! Trigger parameters
//!
//! A trigger either takes no argument or exactly one argument whose
//! [`ParamType`] is fixed when the trigger is declared. Arguments travel as a
//! [`Value`], so a mismatch is reported as an error instead of a failed
//! downcast inside an action.

use std::fmt;

/// Declared type of a trigger's single parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamType {
    /// `bool` argument
    Bool,
    /// Signed integer argument
    Int,
    /// Floating point argument
    Float,
    /// String argument
    Text,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Argument passed along with a fired trigger
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `bool` argument
    Bool(bool),
    /// Signed integer argument
    Int(i64),
    /// Floating point argument
    Float(f64),
    /// String argument
    Text(String),
}

impl Value {
    /// The parameter type this value satisfies
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Bool(_) => ParamType::Bool,
            Value::Int(_) => ParamType::Int,
            Value::Float(_) => ParamType::Float,
            Value::Text(_) => ParamType::Text,
        }
    }

    /// The `bool` payload, if this is a [`Value::Bool`]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is a [`Value::Int`]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float payload, if this is a [`Value::Float`]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The string payload, if this is a [`Value::Text`]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_of_conversions() {
        assert_eq!(Value::from(true).param_type(), ParamType::Bool);
        assert_eq!(Value::from(11).param_type(), ParamType::Int);
        assert_eq!(Value::from(7u8).param_type(), ParamType::Int);
        assert_eq!(Value::from(0.5).param_type(), ParamType::Float);
        assert_eq!(Value::from("alice").param_type(), ParamType::Text);
        assert_eq!(Value::from(String::from("x")).param_type(), ParamType::Text);
    }

    #[test]
    fn test_typed_accessors() {
        let volume = Value::from(2);
        assert_eq!(volume.as_int(), Some(2));
        assert_eq!(volume.as_text(), None);

        let callee = Value::from("alice");
        assert_eq!(callee.as_text(), Some("alice"));
        assert_eq!(callee.as_bool(), None);
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamType::Text.to_string(), "text");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
    }
}
