use std::marker::PhantomData;

use sea_query::{Alias, SimpleExpr, Value};

use crate::config::Configuration;
use crate::entity::{Entity, is_unassigned_guid};
use crate::error::{Error, Result};
use crate::keygen::{self, KeyType};
use crate::query::Query;

/// An INSERT plus what the caller needs to complete the record afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub query: Query,
    /// Keys generated client-side, as `(property, value)`, to write back onto the record.
    pub generated: Vec<(String, Value)>,
    /// Property of the identity key whose value the statement yields, if any.
    pub identity: Option<String>,
}

/// Builder for INSERT statements from an entity.
///
/// Every writable property is inserted except an identity key, which is left to the
/// database and read back by the same statement. An unassigned GUID key is filled with a
/// sequential GUID first.
pub struct InsertBuilder<'a, E: Entity> {
    config: &'a Configuration,
    values: Vec<(&'static str, Value)>,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> InsertBuilder<'a, E> {
    /// Creates an INSERT builder from an entity's values.
    #[must_use]
    pub fn from_entity(config: &'a Configuration, entity: &E) -> Self {
        Self {
            config,
            values: entity.values(),
            _marker: PhantomData,
        }
    }

    /// Overrides one property's value before building.
    #[must_use]
    pub fn set(mut self, property: &'static str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == property) {
            Some(entry) => entry.1 = value,
            None => self.values.push((property, value)),
        }
        self
    }

    /// Build the INSERT statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKeyStrategy`] when the entity has no key, or an error when the
    /// class map cannot be resolved.
    pub fn build(self) -> Result<InsertStatement> {
        let map = self.config.get_map::<E>()?;
        if map.keys().next().is_none() {
            return Err(Error::MissingKeyStrategy {
                entity: map.type_name.clone(),
            });
        }

        let dialect = self.config.dialect();
        let mut columns = Vec::new();
        let mut row: Vec<SimpleExpr> = Vec::new();
        let mut generated = Vec::new();

        for property in map.columns().filter(|p| p.is_writable()) {
            if property.key_type == KeyType::Identity {
                continue;
            }
            let mut value = self
                .values
                .iter()
                .find(|(name, _)| *name == property.name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| Error::unmapped(&map.type_name, &property.name))?;

            if property.key_type == KeyType::Guid
                && is_unassigned_guid(&value)
                && let Some(key) = keygen::generate(KeyType::Guid)
            {
                generated.push((property.name.clone(), key.clone()));
                value = key;
            }

            columns.push(Alias::new(&property.column));
            row.push(value.into());
        }

        let mut statement = sea_query::Query::insert();
        statement.into_table(map.table_ref());
        if columns.is_empty() {
            statement.or_default_values();
        } else {
            statement.columns(columns).values(row).map_err(|e| Error::InvalidMapping {
                entity: map.type_name.clone(),
                reason: e.to_string(),
            })?;
        }

        let builder = dialect.builder();
        let identity = map.identity();
        let built = match identity {
            Some(identity) => dialect.render_key_retrieval(statement, &identity.column, builder),
            None => statement.build(builder),
        };

        let query = Query::new(dialect, built);
        self.config.emit("InsertBuilder", &map.table, &query);

        Ok(InsertStatement {
            query,
            generated,
            identity: identity.map(|p| p.name.clone()),
        })
    }
}
