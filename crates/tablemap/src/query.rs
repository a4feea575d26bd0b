use sea_query::Value;

use crate::dialect::{Built, Dialect};

/// Generated SQL text plus its ordered parameters.
///
/// Parameters appear in the order their markers occur in `sql`, so positional dialects
/// (`?`, `$n`) can bind them as a plain list.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// SQL text with dialect parameter markers.
    pub sql: String,
    /// Bound parameters, in marker order.
    pub params: Vec<Parameter>,
}

impl Query {
    /// Pairs statement text rendered for `dialect` with the markers its values were bound to.
    #[must_use]
    pub fn new(dialect: &dyn Dialect, (sql, values): Built) -> Self {
        let params = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Parameter {
                placeholder: dialect.parameter_marker(i + 1),
                value,
            })
            .collect();
        Self { sql, params }
    }

    /// Parameter values in binding order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }

    /// Looks up a parameter by its marker. Only meaningful for numbered markers.
    #[must_use]
    pub fn param(&self, placeholder: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.placeholder == placeholder)
    }
}

/// A single bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Marker written into the SQL for this parameter (`@P1`, `$1` or `?`).
    pub placeholder: String,
    /// Bound value.
    pub value: Value,
}
