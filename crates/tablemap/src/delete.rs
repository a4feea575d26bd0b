use std::marker::PhantomData;

use sea_query::Value;

use crate::config::{Configuration, KeyValue, entity_key_predicate};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::predicate::Predicate;
use crate::query::Query;
use crate::update::Target;

/// Builder for DELETE statements.
///
/// Exactly one of [`by_key`](Self::by_key), [`entity`](Self::entity),
/// [`where`](Self::where) or [`matching`](Self::matching) must be given; an unfiltered
/// delete is never generated. To mark rows inactive instead, use
/// [`UpdateBuilder::soft_delete`](crate::UpdateBuilder::soft_delete).
pub struct DeleteBuilder<'a, E: Entity> {
    config: &'a Configuration,
    target: Target,
    record: Option<Vec<(&'static str, Value)>>,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> DeleteBuilder<'a, E> {
    /// Creates a new DELETE query builder.
    #[must_use]
    pub const fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            target: Target::new(),
            record: None,
            _marker: PhantomData,
        }
    }

    /// Deletes the row with the given key.
    #[must_use]
    pub fn by_key(mut self, key: impl Into<KeyValue>) -> Self {
        self.target.key = Some(key.into());
        self
    }

    /// Deletes the row identified by a record's key values.
    #[must_use]
    pub fn entity(mut self, entity: &E) -> Self {
        self.record = Some(entity.values());
        self
    }

    /// Deletes rows matching a predicate.
    #[must_use]
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.target.predicate = Some(predicate);
        self
    }

    /// Deletes rows equal to a match object on every given property.
    #[must_use]
    pub fn matching<P, V>(mut self, pairs: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        let pairs: Vec<(String, Value)> = pairs.into_iter().map(|(p, v)| (p.into(), v.into())).collect();
        self.target.matching = (!pairs.is_empty()).then(|| Predicate::matching(pairs));
        self
    }

    /// Build the DELETE query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpdateTarget`] unless exactly one target is given, or an error
    /// when the class map cannot be resolved or the target cannot be rendered.
    pub fn build(self) -> Result<Query> {
        let map = self.config.get_map::<E>()?;

        let supplied = self.target.supplied() + usize::from(self.record.is_some());
        if supplied != 1 {
            return Err(Error::InvalidUpdateTarget {
                statement: "delete",
                supplied,
            });
        }
        let predicate = match self.record {
            Some(values) => entity_key_predicate(&map, &values)?,
            None => self.target.resolve("delete", &map)?.ok_or(Error::InvalidUpdateTarget {
                statement: "delete",
                supplied: 0,
            })?,
        };

        let dialect = self.config.dialect();
        let mut statement = sea_query::Query::delete();
        statement.from_table(map.table_ref()).and_where(predicate.to_expr(dialect, &map)?);

        let query = Query::new(dialect, statement.build(dialect.builder()));
        self.config.emit("DeleteBuilder", &map.table, &query);
        Ok(query)
    }
}
