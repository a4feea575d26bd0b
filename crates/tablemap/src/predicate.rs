use std::ops::Not;

use sea_query::{BinOper, ColumnRef, Expr, ExprTrait, Order, SimpleExpr, Value};

use crate::dialect::Dialect;
use crate::entity::is_null;
use crate::error::{Error, Result};
use crate::query::Query;
use crate::registry::ClassMap;

/// Comparison operator of a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`, or `IN` when compared against a list.
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    /// `LIKE` against a pattern.
    Like,
}

impl Operator {
    const fn bin_oper(self) -> BinOper {
        match self {
            Self::Eq => BinOper::Equal,
            Self::Gt => BinOper::GreaterThan,
            Self::Ge => BinOper::GreaterThanOrEqual,
            Self::Lt => BinOper::SmallerThan,
            Self::Le => BinOper::SmallerThanOrEqual,
            Self::Like => BinOper::Like,
        }
    }
}

/// Boolean operator joining the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOperator {
    And,
    Or,
}

impl GroupOperator {
    fn join(self, left: SimpleExpr, right: SimpleExpr) -> SimpleExpr {
        match self {
            Self::And => left.and(right),
            Self::Or => left.or(right),
        }
    }
}

/// Right-hand side of a field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(Value),
    /// Membership test; only valid with [`Operator::Eq`].
    List(Vec<Value>),
}

/// `property <operator> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub property: String,
    pub operator: Operator,
    pub value: FieldValue,
    pub negated: bool,
}

/// Children joined by `AND` or `OR`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateGroup {
    pub operator: GroupOperator,
    pub children: Vec<Predicate>,
    pub negated: bool,
}

/// `property BETWEEN low AND high`.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenPredicate {
    pub property: String,
    pub low: Value,
    pub high: Value,
    pub negated: bool,
}

/// A composable filter condition.
///
/// Built directly with the constructors below, or compiled from a condition tree (see
/// [`crate::condition`]). Property names are resolved against the target entity's class map
/// only when the predicate is rendered.
///
/// # Examples
///
/// ```ignore
/// let predicate = Predicate::and(vec![
///     Predicate::eq("is_active", true),
///     Predicate::like("last_name", "Sm%"),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Field(FieldPredicate),
    Group(PredicateGroup),
    Between(BetweenPredicate),
}

impl Predicate {
    /// A field predicate with an explicit operator.
    #[must_use]
    pub fn field(property: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Field(FieldPredicate {
            property: property.into(),
            operator,
            value: FieldValue::Single(value.into()),
            negated: false,
        })
    }

    /// `property = value` (`IS NULL` for a null value).
    #[must_use]
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(property, Operator::Eq, value)
    }

    /// `property <> value`, represented as a negated equality.
    #[must_use]
    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::eq(property, value).negate()
    }

    #[must_use]
    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(property, Operator::Gt, value)
    }

    #[must_use]
    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(property, Operator::Ge, value)
    }

    #[must_use]
    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(property, Operator::Lt, value)
    }

    #[must_use]
    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(property, Operator::Le, value)
    }

    /// `property LIKE pattern`; the pattern carries its own wildcards.
    #[must_use]
    pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::field(property, Operator::Like, pattern.into())
    }

    #[must_use]
    pub fn not_like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::like(property, pattern).negate()
    }

    /// `property IN (values)`.
    #[must_use]
    pub fn r#in(property: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Field(FieldPredicate {
            property: property.into(),
            operator: Operator::Eq,
            value: FieldValue::List(values.into_iter().map(Into::into).collect()),
            negated: false,
        })
    }

    #[must_use]
    pub fn not_in(property: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::r#in(property, values).negate()
    }

    /// `property IS NULL`.
    #[must_use]
    pub fn is_null(property: impl Into<String>) -> Self {
        Self::eq(property, Value::String(None))
    }

    #[must_use]
    pub fn is_not_null(property: impl Into<String>) -> Self {
        Self::is_null(property).negate()
    }

    #[must_use]
    pub fn between(property: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between(BetweenPredicate {
            property: property.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        })
    }

    #[must_use]
    pub fn not_between(property: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between(BetweenPredicate {
            property: property.into(),
            low: low.into(),
            high: high.into(),
            negated: true,
        })
    }

    /// A group with an explicit operator.
    #[must_use]
    pub const fn group(operator: GroupOperator, children: Vec<Self>) -> Self {
        Self::Group(PredicateGroup {
            operator,
            children,
            negated: false,
        })
    }

    /// All children must hold. An empty list always holds.
    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::group(GroupOperator::And, children)
    }

    /// Any child must hold. An empty list never holds.
    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::group(GroupOperator::Or, children)
    }

    /// Equality on each `(property, value)` pair of a match object.
    ///
    /// A single pair yields a bare field predicate, several pairs an `AND` group.
    #[must_use]
    pub fn matching<P, V>(pairs: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        let mut fields: Vec<Self> = pairs.into_iter().map(|(p, v)| Self::eq(p, v)).collect();
        if fields.len() == 1 {
            fields.remove(0)
        } else {
            Self::and(fields)
        }
    }

    /// Logical negation.
    ///
    /// Toggles a field predicate in place; groups and ranges are wrapped in a negated group
    /// of one child.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Field(mut field) => {
                field.negated = !field.negated;
                Self::Field(field)
            }
            other => Self::Group(PredicateGroup {
                operator: GroupOperator::And,
                children: vec![other],
                negated: true,
            }),
        }
    }

    /// Renders the predicate as a standalone SQL fragment with its bound values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedProperty`] when a property is not mapped on `map`, and
    /// [`Error::InvalidPredicate`] when a node cannot be expressed in SQL.
    pub fn render(&self, dialect: &dyn Dialect, map: &ClassMap) -> Result<Query> {
        let expr = self.to_expr(dialect, map)?;
        Ok(Query::new(dialect, dialect.builder().build_expr(&expr)))
    }

    /// Converts the predicate to a sea-query expression over `map`'s columns.
    ///
    /// # Errors
    ///
    /// Same as [`render`](Self::render).
    pub fn to_expr(&self, dialect: &dyn Dialect, map: &ClassMap) -> Result<SimpleExpr> {
        self.expr(dialect, map, false)
    }

    fn expr(&self, dialect: &dyn Dialect, map: &ClassMap, nested: bool) -> Result<SimpleExpr> {
        match self {
            Self::Field(field) => field.expr(dialect, map),
            Self::Between(between) => between.expr(map),
            Self::Group(group) => group.expr(dialect, map, nested),
        }
    }
}

impl Not for Predicate {
    type Output = Self;

    fn not(self) -> Self {
        self.negate()
    }
}

impl FieldPredicate {
    fn expr(&self, dialect: &dyn Dialect, map: &ClassMap) -> Result<SimpleExpr> {
        let column: SimpleExpr = Expr::col(map.column_ref(&self.property)?).into();

        match (&self.value, self.operator) {
            (FieldValue::List(values), Operator::Eq) => Ok(if values.is_empty() {
                Expr::cust(if self.negated { dialect.always_true() } else { dialect.always_false() })
            } else if self.negated {
                column.is_not_in(values.iter().cloned())
            } else {
                column.is_in(values.iter().cloned())
            }),
            (FieldValue::List(_), operator) => Err(Error::invalid_predicate(
                &self.property,
                format!("a value list requires Eq, found {operator:?}"),
            )),
            (FieldValue::Single(value), Operator::Eq) if is_null(value) => {
                Ok(if self.negated { column.is_not_null() } else { column.is_null() })
            }
            (FieldValue::Single(value), _) if is_null(value) => {
                Err(Error::invalid_predicate(&self.property, "null can only be compared with Eq"))
            }
            (FieldValue::Single(value), Operator::Eq) => {
                Ok(if self.negated { column.ne(value.clone()) } else { column.eq(value.clone()) })
            }
            (FieldValue::Single(value), Operator::Like) => {
                if !matches!(value, Value::String(Some(_)) | Value::Char(Some(_))) {
                    return Err(Error::invalid_predicate(&self.property, "LIKE requires a text pattern"));
                }
                let op = if self.negated { BinOper::NotLike } else { BinOper::Like };
                Ok(column.binary(op, value.clone()))
            }
            (FieldValue::Single(value), operator) => {
                let comparison = column.binary(operator.bin_oper(), value.clone());
                Ok(if self.negated { comparison.not() } else { comparison })
            }
        }
    }
}

impl BetweenPredicate {
    fn expr(&self, map: &ClassMap) -> Result<SimpleExpr> {
        let column: SimpleExpr = Expr::col(map.column_ref(&self.property)?).into();
        if is_null(&self.low) || is_null(&self.high) {
            return Err(Error::invalid_predicate(&self.property, "BETWEEN bounds cannot be null"));
        }
        let (low, high) = (self.low.clone(), self.high.clone());
        Ok(if self.negated { column.not_between(low, high) } else { column.between(low, high) })
    }
}

impl PredicateGroup {
    // Every child is rendered as nested, so a child group keeps its parentheses even when
    // it holds a single predicate.
    fn expr(&self, dialect: &dyn Dialect, map: &ClassMap, nested: bool) -> Result<SimpleExpr> {
        let mut children = self.children.iter().map(|child| child.expr(dialect, map, true));
        let Some(first) = children.next().transpose()? else {
            let empty = match self.operator {
                GroupOperator::And => dialect.always_true(),
                GroupOperator::Or => dialect.always_false(),
            };
            let empty = Expr::cust(empty);
            return Ok(if self.negated { empty.not() } else { empty });
        };
        let joined = children.try_fold(first, |joined, child| Ok(self.operator.join(joined, child?)))?;

        Ok(if self.negated {
            joined.not()
        } else if self.children.len() > 1 || nested {
            SimpleExpr::Tuple(vec![joined])
        } else {
            joined
        })
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Property to order by.
    pub property: String,
    pub ascending: bool,
}

impl Sort {
    #[must_use]
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ascending: true,
        }
    }

    #[must_use]
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ascending: false,
        }
    }
}

/// Resolves a sort list to ORDER BY terms.
pub(crate) fn render_sort(sort: &[Sort], map: &ClassMap) -> Result<Vec<(ColumnRef, Order)>> {
    sort.iter()
        .map(|s| Ok((map.column_ref(&s.property)?, if s.ascending { Order::Asc } else { Order::Desc })))
        .collect()
}
