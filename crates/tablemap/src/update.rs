use std::marker::PhantomData;

use sea_query::{Alias, Value};

use crate::config::{Configuration, KeyValue, entity_key_predicate, id_predicate};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::keygen::KeyType;
use crate::predicate::Predicate;
use crate::query::Query;
use crate::registry::ClassMap;

/// Explicit row selection for UPDATE and DELETE: at most one of these may be given.
#[derive(Debug, Clone, Default)]
pub(crate) struct Target {
    pub(crate) key: Option<KeyValue>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) matching: Option<Predicate>,
}

impl Target {
    pub(crate) const fn new() -> Self {
        Self {
            key: None,
            predicate: None,
            matching: None,
        }
    }

    pub(crate) fn supplied(&self) -> usize {
        usize::from(self.key.is_some()) + usize::from(self.predicate.is_some()) + usize::from(self.matching.is_some())
    }

    // Some(predicate) when exactly one target was given, None when none was
    pub(crate) fn resolve(self, statement: &'static str, map: &ClassMap) -> Result<Option<Predicate>> {
        let supplied = self.supplied();
        if supplied > 1 {
            return Err(Error::InvalidUpdateTarget { statement, supplied });
        }
        match (self.key, self.predicate, self.matching) {
            (Some(key), _, _) => id_predicate(map, key).map(Some),
            (_, Some(predicate), _) | (_, _, Some(predicate)) => Ok(Some(predicate)),
            (None, None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Values of a whole record; keys are the implicit target and never assigned.
    Entity,
    /// Explicit property/value pairs.
    Values,
}

/// Builder for UPDATE statements.
///
/// * [`from_entity`](Self::from_entity) updates every writable, non-key property of a record
///   and targets the record's key; [`only`](Self::only) narrows it to a property subset.
/// * [`new`](Self::new) with [`set`](Self::set) updates a property/value object. Key
///   properties among the values become the target when no explicit one is given.
///
/// Explicit targets are [`by_key`](Self::by_key), [`where`](Self::where) and
/// [`matching`](Self::matching); at most one may be supplied.
pub struct UpdateBuilder<'a, E: Entity> {
    config: &'a Configuration,
    source: Source,
    values: Vec<(String, Value)>,
    only: Option<Vec<String>>,
    target: Target,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> UpdateBuilder<'a, E> {
    /// Creates an UPDATE builder for explicit property/value pairs.
    #[must_use]
    pub const fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            source: Source::Values,
            values: Vec::new(),
            only: None,
            target: Target::new(),
            _marker: PhantomData,
        }
    }

    /// Creates a full UPDATE of a record, targeted at its key.
    #[must_use]
    pub fn from_entity(config: &'a Configuration, entity: &E) -> Self {
        Self {
            source: Source::Entity,
            values: entity.values().into_iter().map(|(name, value)| (name.to_string(), value)).collect(),
            ..Self::new(config)
        }
    }

    /// Marks rows inactive using the configured soft-delete assignments.
    #[must_use]
    pub fn soft_delete(config: &'a Configuration) -> Self {
        Self::new(config).set_all(config.soft_delete_props().iter().cloned())
    }

    /// Reactivates rows using the configured soft-activate assignments.
    #[must_use]
    pub fn soft_activate(config: &'a Configuration) -> Self {
        Self::new(config).set_all(config.soft_activate_props().iter().cloned())
    }

    /// Sets one property's value.
    #[must_use]
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        let property = property.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == property) {
            Some(entry) => entry.1 = value,
            None => self.values.push((property, value)),
        }
        self
    }

    /// Sets several properties.
    #[must_use]
    pub fn set_all<P, V>(self, values: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        values.into_iter().fold(self, |builder, (p, v)| builder.set(p, v))
    }

    /// Restricts the assignments to the named properties.
    #[must_use]
    pub fn only(mut self, properties: &[&str]) -> Self {
        self.only = Some(properties.iter().map(ToString::to_string).collect());
        self
    }

    /// Targets the row with the given key.
    #[must_use]
    pub fn by_key(mut self, key: impl Into<KeyValue>) -> Self {
        self.target.key = Some(key.into());
        self
    }

    /// Targets rows matching a predicate.
    #[must_use]
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.target.predicate = Some(predicate);
        self
    }

    /// Targets rows equal to a match object on every given property.
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

    /// Build the UPDATE statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpdateTarget`] unless exactly one target is supplied or
    /// implied, [`Error::UnmappedProperty`] when an assignment or `only` names an unknown or
    /// ignored property, and [`Error::EmptyUpdate`] when nothing is left to assign.
    pub fn build(self) -> Result<Query> {
        let map = self.config.get_map::<E>()?;
        for name in self.only.iter().flatten() {
            map.mapped(name)?;
        }

        let explicit = self.target.supplied() > 0;
        let predicate = match self.target.clone().resolve("update", &map)? {
            Some(predicate) => predicate,
            None => self.implicit_key(&map)?,
        };

        let dialect = self.config.dialect();
        let mut statement = sea_query::Query::update();
        statement.table(map.table_ref());
        let mut assigned = 0_usize;

        for (name, value) in &self.values {
            if self.only.as_ref().is_some_and(|only| !only.contains(name)) {
                continue;
            }
            // a record carries every field, ignored ones included
            let property = match (map.mapped(name), self.source) {
                (Ok(property), _) => property,
                (Err(_), Source::Entity) => continue,
                (Err(e), Source::Values) => return Err(e),
            };
            let key_excluded = property.key_type.is_key() && (self.source == Source::Entity || !explicit);
            if !property.is_writable() || property.key_type == KeyType::Identity || key_excluded {
                continue;
            }
            statement.value(Alias::new(&property.column), value.clone());
            assigned += 1;
        }

        if assigned == 0 {
            return Err(Error::EmptyUpdate {
                entity: map.type_name.clone(),
            });
        }

        statement.and_where(predicate.to_expr(dialect, &map)?);
        let query = Query::new(dialect, statement.build(dialect.builder()));
        self.config.emit("UpdateBuilder", &map.table, &query);
        Ok(query)
    }

    // target the key properties present among the values
    fn implicit_key(&self, map: &ClassMap) -> Result<Predicate> {
        let has_all_keys = map.keys().next().is_some()
            && map.keys().all(|key| self.values.iter().any(|(name, _)| *name == key.name));
        if !has_all_keys {
            return Err(Error::InvalidUpdateTarget {
                statement: "update",
                supplied: 0,
            });
        }
        entity_key_predicate(map, &self.values)
    }
}
