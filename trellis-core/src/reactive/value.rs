//! Dynamic values stored in observed containers.

use std::fmt;
use std::rc::Rc;

use super::container::Container;

/// Address of a slot inside a container: a map property or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Prop(Rc<str>),
    Index(usize),
}

impl Key {
    /// The key as a list index, parsing numeric property names.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Prop(name) => name.parse().ok(),
        }
    }

    /// The key as a map property name.
    pub fn as_prop(&self) -> Rc<str> {
        match self {
            Self::Prop(name) => name.clone(),
            Self::Index(index) => Rc::from(index.to_string()),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Prop(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Prop(Rc::from(name))
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Self::Prop(name)
    }
}

impl From<&Rc<str>> for Key {
    fn from(name: &Rc<str>) -> Self {
        Self::Prop(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A value held by a container slot.
///
/// Nested containers are stored as plain [`Container`] handles; observing
/// them happens on read, through the wrapper that read them.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Container(Container),
}

impl Value {
    /// Change detection used by writes.
    ///
    /// Like `==`, except `NaN` is the same as `NaN`, so writing `NaN` over
    /// `NaN` does not notify anyone.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(c) => Some(c),
            _ => None,
        }
    }
}

/// Strict equality: containers compare by identity, `NaN` differs from itself.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Container(a), Self::Container(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Container(c) => write!(f, "[container {}]", c.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Self::Container(c)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
