//! Boolean condition trees and their compilation into predicates.
//!
//! A [`Condition`] is the traversable form of a boolean expression over an entity's
//! properties. It is usually produced by the `condition!` macro from a closure body, but can
//! be assembled by hand. [`compile`] walks the tree exactly as given: nesting is preserved,
//! never re-derived, so `a && b && c` compiles to `(a AND b) AND c`.

use sea_query::Value;

use crate::error::{Error, Result};
use crate::predicate::{Operator, Predicate};

/// A boolean expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
    /// Binary comparison.
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// A boolean property used directly as a condition.
    Property(String),
    /// Method call such as `p.name.contains("x")` or `ids.contains(&p.id)`.
    Call {
        target: Operand,
        method: Method,
        argument: Operand,
    },
    /// An expression the producer could not express as a condition.
    Unsupported(String),
}

/// Comparison operator in a condition tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    // operator that holds with the operands swapped
    const fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Eq | Self::Ne => self,
        }
    }
}

/// Recognized method calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
}

/// Leaf of a comparison or call.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A property of the entity under test.
    Property(String),
    /// A constant or captured value.
    Value(Value),
    /// A captured collection.
    Values(Vec<Value>),
    /// A numeric conversion wrapped around another operand.
    Cast(Box<Self>),
    Unsupported(String),
}

impl Operand {
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    #[must_use]
    pub fn values(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn cast(inner: Self) -> Self {
        Self::Cast(Box::new(inner))
    }

    fn strip_casts(&self) -> &Self {
        let mut operand = self;
        while let Self::Cast(inner) = operand {
            operand = inner;
        }
        operand
    }
}

impl Condition {
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    #[must_use]
    pub const fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Self::Compare { left, op, right }
    }

    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    #[must_use]
    pub const fn call(target: Operand, method: Method, argument: Operand) -> Self {
        Self::Call {
            target,
            method,
            argument,
        }
    }

    /// Compiles the tree into a predicate. See [`compile`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExpressionShape`] for any node the compiler cannot
    /// translate.
    pub fn compile(&self) -> Result<Predicate> {
        compile(self)
    }
}

/// Compiles a condition tree into a predicate.
///
/// * `&&` / `||` become two-child `AND` / `OR` groups, nested as in the tree.
/// * Comparisons become field predicates; `!=` is a negated equality and a value on the
///   left is moved to the right with the operator flipped. Casts are stripped.
/// * `!` toggles a field predicate, or wraps a group or range in a negated group.
/// * A bare boolean property compiles to `property = true`.
/// * `contains` / `starts_with` / `ends_with` on a property become `LIKE` with `%` placed
///   around, after and before the argument; `contains` on a collection with a property
///   argument becomes `IN`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedExpressionShape`] for any other node. Nothing is approximated.
pub fn compile(condition: &Condition) -> Result<Predicate> {
    match condition {
        Condition::And(left, right) => Ok(Predicate::and(vec![compile(left)?, compile(right)?])),
        Condition::Or(left, right) => Ok(Predicate::or(vec![compile(left)?, compile(right)?])),
        Condition::Not(inner) => Ok(compile(inner)?.negate()),
        Condition::Compare { left, op, right } => compile_comparison(left, *op, right),
        Condition::Property(name) => Ok(Predicate::eq(name.as_str(), true)),
        Condition::Call {
            target,
            method,
            argument,
        } => compile_call(target, *method, argument),
        Condition::Unsupported(shape) => Err(Error::unsupported(shape.as_str())),
    }
}

fn compile_comparison(left: &Operand, op: CompareOp, right: &Operand) -> Result<Predicate> {
    let (property, op, value) = match (left.strip_casts(), right.strip_casts()) {
        (Operand::Property(property), Operand::Value(value)) => (property, op, value),
        (Operand::Value(value), Operand::Property(property)) => (property, op.flipped(), value),
        (left, right) => {
            return Err(Error::unsupported(format!("comparison {left:?} {op:?} {right:?}")));
        }
    };

    let operator = match op {
        CompareOp::Eq | CompareOp::Ne => Operator::Eq,
        CompareOp::Gt => Operator::Gt,
        CompareOp::Ge => Operator::Ge,
        CompareOp::Lt => Operator::Lt,
        CompareOp::Le => Operator::Le,
    };
    let predicate = Predicate::field(property.as_str(), operator, value.clone());
    Ok(if op == CompareOp::Ne { predicate.negate() } else { predicate })
}

fn compile_call(target: &Operand, method: Method, argument: &Operand) -> Result<Predicate> {
    match (target.strip_casts(), method, argument.strip_casts()) {
        (Operand::Property(property), Method::Equals, Operand::Value(value))
        | (Operand::Value(value), Method::Equals, Operand::Property(property)) => {
            Ok(Predicate::eq(property.as_str(), value.clone()))
        }
        (Operand::Values(values), Method::Contains, Operand::Property(property)) => {
            Ok(Predicate::r#in(property.as_str(), values.iter().cloned()))
        }
        (Operand::Property(property), Method::Contains | Method::StartsWith | Method::EndsWith, Operand::Value(value)) => {
            let text = match value {
                Value::String(Some(text)) => text.as_str().to_string(),
                Value::Char(Some(ch)) => ch.to_string(),
                other => return Err(Error::unsupported(format!("{method:?} with non-text argument {other:?}"))),
            };
            let pattern = match method {
                Method::StartsWith => format!("{text}%"),
                Method::EndsWith => format!("%{text}"),
                _ => format!("%{text}%"),
            };
            Ok(Predicate::like(property.as_str(), pattern))
        }
        (target, method, argument) => Err(Error::unsupported(format!("call {target:?}.{method:?}({argument:?})"))),
    }
}
