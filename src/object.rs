use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::Block;

pub mod environment;

use environment::Environment;

pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);
pub const NULL: Object = Object::Null;

#[derive(Clone, Debug)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Null,
    ReturnValue(Box<Object>),
    Error(String),
    Function {
        parameters: Vec<String>,
        body: Block,
        env: Rc<RefCell<Environment>>,
    },
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "INTEGER",
            Self::Boolean(_) => "BOOLEAN",
            Self::Null => "NULL",
            Self::ReturnValue(_) => "RETURN_VALUE",
            Self::Error(_) => "ERROR",
            Self::Function { .. } => "FUNCTION",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            _ => true,
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        if value {
            TRUE
        } else {
            FALSE
        }
    }
}

// Closures compare by captured environment identity; comparing environments
// structurally would recurse forever on a function bound inside its own scope.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(l), Self::Integer(r)) => l == r,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Null, Self::Null) => true,
            (Self::ReturnValue(l), Self::ReturnValue(r)) => l == r,
            (Self::Error(l), Self::Error(r)) => l == r,
            (
                Self::Function {
                    parameters: lp,
                    body: lb,
                    env: le,
                },
                Self::Function {
                    parameters: rp,
                    body: rb,
                    env: re,
                },
            ) => lp == rp && lb == rb && Rc::ptr_eq(le, re),
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Null => f.write_str("null"),
            Self::ReturnValue(value) => write!(f, "{value}"),
            Self::Error(message) => write!(f, "ERROR: {message}"),
            Self::Function {
                parameters, body, ..
            } => write!(f, "fn({}) {body}", parameters.join(", ")),
        }
    }
}
