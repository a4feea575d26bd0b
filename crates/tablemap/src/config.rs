//! Configuration
//!
//! A [`Configuration`] owns everything generation needs beyond the call itself: the active
//! dialect, process-wide flags, soft-delete defaults and the class-map registry. It is an
//! ordinary value; [`Configuration::global`] provides one lazily built process-wide instance.

use std::fmt;
use std::sync::{Arc, LazyLock};

use anyhow::anyhow;
use sea_query::Value;
use uuid::Uuid;

use crate::delete::DeleteBuilder;
use crate::dialect::{self, Dialect, SqlBuilder, SqlServer};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::insert::InsertBuilder;
use crate::keygen;
use crate::options::Options;
use crate::predicate::Predicate;
use crate::query::Query;
use crate::registry::{ClassMap, ClassMapper, DefaultMapper, MappingSource, Registry};
use crate::select::{CountBuilder, SelectBuilder};
use crate::update::UpdateBuilder;

/// Callback receiving every generated SQL string.
pub type SqlHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Property assignments applied by soft delete or soft activate.
pub type PropertySet = Vec<(String, Value)>;

fn default_soft_delete() -> PropertySet {
    vec![("is_active".to_string(), Value::Bool(Some(false)))]
}

fn default_soft_activate() -> PropertySet {
    vec![("is_active".to_string(), Value::Bool(Some(true)))]
}

static GLOBAL: LazyLock<Configuration> = LazyLock::new(|| {
    Configuration::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid tablemap environment configuration, using defaults");
        Configuration::default()
    })
});

/// Generation settings and the class-map registry.
pub struct Configuration {
    dialect: Arc<dyn Dialect>,
    nolock: bool,
    buffered: bool,
    soft_delete: PropertySet,
    soft_activate: PropertySet,
    output_sql: Option<SqlHook>,
    registry: Registry,
}

impl Configuration {
    /// Starts a configuration with default settings.
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Builds a configuration from [`Options`] in the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the options cannot be loaded or name an unknown dialect.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_options(&Options::load()?)
    }

    /// Builds a configuration from already loaded [`Options`].
    ///
    /// # Errors
    ///
    /// Returns an error when the options name an unknown dialect.
    pub fn from_options(options: &Options) -> anyhow::Result<Self> {
        let dialect =
            dialect::from_name(&options.dialect).ok_or_else(|| anyhow!("unknown dialect `{}`", options.dialect))?;
        Ok(Self::builder().dialect_arc(dialect).nolock(options.nolock).buffered(options.buffered).build())
    }

    /// The process-wide configuration, built from the environment on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Whether selects carry the dialect's read-lock hint.
    #[must_use]
    pub const fn nolock(&self) -> bool {
        self.nolock
    }

    /// Advisory buffering flag passed through to executors.
    #[must_use]
    pub const fn buffered(&self) -> bool {
        self.buffered
    }

    /// Default assignments applied by soft delete.
    #[must_use]
    pub fn soft_delete_props(&self) -> &[(String, Value)] {
        &self.soft_delete
    }

    /// Default assignments applied by soft activate.
    #[must_use]
    pub fn soft_activate_props(&self) -> &[(String, Value)] {
        &self.soft_activate
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers an explicit mapper for `E`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousMapper`] when `E` already has one.
    pub fn register<E: Entity>(&self, mapper: impl ClassMapper + 'static) -> Result<()> {
        self.registry.register::<E>(mapper)
    }

    /// The class map for `E`, resolved and cached on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the map cannot be resolved.
    pub fn get_map<E: Entity>(&self) -> Result<Arc<ClassMap>> {
        self.registry.get_map::<E>()
    }

    /// Drops all cached class maps.
    pub fn clear_cache(&self) {
        self.registry.clear_cache();
    }

    /// Predicate selecting the row of `E` with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKeyStrategy`] when `E` has no key, [`Error::InvalidPredicate`]
    /// when the key value does not cover the key properties, and
    /// [`Error::UnmappedProperty`] when a composite key names a non-key property.
    pub fn id_predicate<E: Entity>(&self, key: impl Into<KeyValue>) -> Result<Predicate> {
        let map = self.get_map::<E>()?;
        id_predicate(&map, key.into())
    }

    /// A new sequential GUID.
    #[must_use]
    pub fn next_guid() -> Uuid {
        keygen::next_sequential_guid()
    }

    #[must_use]
    pub const fn select<E: Entity>(&self) -> SelectBuilder<'_, E> {
        SelectBuilder::new(self)
    }

    #[must_use]
    pub const fn count<E: Entity>(&self) -> CountBuilder<'_, E> {
        CountBuilder::new(self)
    }

    #[must_use]
    pub fn insert<'a, E: Entity>(&'a self, entity: &E) -> InsertBuilder<'a, E> {
        InsertBuilder::from_entity(self, entity)
    }

    #[must_use]
    pub const fn update<E: Entity>(&self) -> UpdateBuilder<'_, E> {
        UpdateBuilder::new(self)
    }

    /// Full update of a record, targeted at its key.
    #[must_use]
    pub fn update_entity<'a, E: Entity>(&'a self, entity: &E) -> UpdateBuilder<'a, E> {
        UpdateBuilder::from_entity(self, entity)
    }

    #[must_use]
    pub const fn delete<E: Entity>(&self) -> DeleteBuilder<'_, E> {
        DeleteBuilder::new(self)
    }

    /// Update applying the soft-delete assignments; add a target before building.
    #[must_use]
    pub fn soft_delete<E: Entity>(&self) -> UpdateBuilder<'_, E> {
        UpdateBuilder::soft_delete(self)
    }

    /// Update applying the soft-activate assignments; add a target before building.
    #[must_use]
    pub fn soft_activate<E: Entity>(&self) -> UpdateBuilder<'_, E> {
        UpdateBuilder::soft_activate(self)
    }

    // backend for reads, with the lock hint when enabled
    pub(crate) fn read_builder(&self) -> SqlBuilder {
        self.dialect.builder().read_lock(self.dialect.read_lock_hint().filter(|_| self.nolock))
    }

    pub(crate) fn emit(&self, builder: &'static str, table: &str, query: &Query) {
        tracing::debug!(
            table,
            sql = %query.sql,
            param_count = query.params.len(),
            "{builder} generated SQL"
        );
        if let Some(hook) = &self.output_sql {
            hook(&query.sql);
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("dialect", &self.dialect.name())
            .field("nolock", &self.nolock)
            .field("buffered", &self.buffered)
            .field("soft_delete", &self.soft_delete)
            .field("soft_activate", &self.soft_activate)
            .field("output_sql", &self.output_sql.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Builder for [`Configuration`].
pub struct ConfigurationBuilder {
    default_mapper: DefaultMapper,
    sources: Vec<MappingSource>,
    dialect: Arc<dyn Dialect>,
    nolock: bool,
    buffered: bool,
    soft_delete: PropertySet,
    soft_activate: PropertySet,
    output_sql: Option<SqlHook>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self {
            default_mapper: DefaultMapper::Auto,
            sources: Vec::new(),
            dialect: Arc::new(SqlServer),
            nolock: false,
            buffered: true,
            soft_delete: default_soft_delete(),
            soft_activate: default_soft_activate(),
            output_sql: None,
        }
    }
}

impl ConfigurationBuilder {
    /// Convention used for types with no explicit mapper.
    #[must_use]
    pub const fn default_mapper(mut self, mapper: DefaultMapper) -> Self {
        self.default_mapper = mapper;
        self
    }

    /// Adds a mapping source consulted after explicit registrations.
    #[must_use]
    pub fn mapping_source(mut self, source: MappingSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Sets the SQL dialect. Defaults to SQL Server.
    #[must_use]
    pub fn dialect(self, dialect: impl Dialect + 'static) -> Self {
        self.dialect_arc(Arc::new(dialect))
    }

    #[must_use]
    pub fn dialect_arc(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Adds the dialect's read-lock hint to selects and counts.
    #[must_use]
    pub const fn nolock(mut self, nolock: bool) -> Self {
        self.nolock = nolock;
        self
    }

    #[must_use]
    pub const fn buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    /// Replaces the default soft-delete assignments.
    #[must_use]
    pub fn soft_delete<P, V>(mut self, props: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.soft_delete = props.into_iter().map(|(p, v)| (p.into(), v.into())).collect();
        self
    }

    /// Replaces the default soft-activate assignments.
    #[must_use]
    pub fn soft_activate<P, V>(mut self, props: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.soft_activate = props.into_iter().map(|(p, v)| (p.into(), v.into())).collect();
        self
    }

    /// Receives every generated SQL string.
    #[must_use]
    pub fn output_sql(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.output_sql = Some(Arc::new(hook));
        self
    }

    /// Finishes the configuration with an empty registry.
    #[must_use]
    pub fn build(self) -> Configuration {
        Configuration {
            dialect: self.dialect,
            nolock: self.nolock,
            buffered: self.buffered,
            soft_delete: self.soft_delete,
            soft_activate: self.soft_activate,
            output_sql: self.output_sql,
            registry: Registry::new(self.default_mapper, self.sources),
        }
    }
}

/// A primary-key value: one value for a single key, named values for a composite one.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    /// Value of the only key property.
    Single(Value),
    /// `(property, value)` for every key property.
    Composite(Vec<(String, Value)>),
}

impl KeyValue {
    /// Key of a single-property key.
    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }

    /// Key of a composite key, one value per key property.
    #[must_use]
    pub fn composite<P, V>(values: impl IntoIterator<Item = (P, V)>) -> Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        Self::Composite(values.into_iter().map(|(p, v)| (p.into(), v.into())).collect())
    }
}

macro_rules! key_value_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for KeyValue {
                fn from(value: $ty) -> Self {
                    Self::Single(value.into())
                }
            }
        )+
    };
}

key_value_from!(i32, i64, u32, u64, String, &str, Uuid);

pub(crate) fn id_predicate(map: &ClassMap, key: KeyValue) -> Result<Predicate> {
    let keys: Vec<_> = map.keys().collect();
    if keys.is_empty() {
        return Err(Error::MissingKeyStrategy {
            entity: map.type_name.clone(),
        });
    }

    match key {
        KeyValue::Single(value) => match keys.as_slice() {
            [only] => Ok(Predicate::eq(only.name.as_str(), value)),
            _ => Err(Error::invalid_predicate(
                &map.type_name,
                format!("composite key of {} properties needs a value for each", keys.len()),
            )),
        },
        KeyValue::Composite(values) => {
            if let Some((name, _)) = values.iter().find(|(name, _)| !keys.iter().any(|k| k.name == *name)) {
                return Err(Error::unmapped(&map.type_name, name));
            }
            let fields = keys
                .iter()
                .map(|key| {
                    values
                        .iter()
                        .find(|(name, _)| *name == key.name)
                        .map(|(_, value)| (key.name.clone(), value.clone()))
                        .ok_or_else(|| Error::invalid_predicate(&key.name, "missing key value"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Predicate::matching(fields))
        }
    }
}

/// Key predicate built from an entity's own values.
pub(crate) fn entity_key_predicate<S: AsRef<str>>(map: &ClassMap, values: &[(S, Value)]) -> Result<Predicate> {
    let composite = map
        .keys()
        .map(|key| {
            values
                .iter()
                .find(|(name, _)| name.as_ref() == key.name)
                .map(|(_, value)| (key.name.clone(), value.clone()))
                .ok_or_else(|| Error::invalid_predicate(&key.name, "missing key value"))
        })
        .collect::<Result<Vec<_>>>()?;
    id_predicate(map, KeyValue::Composite(composite))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::dialect::Postgres;
    use crate::registry::ClassMapBuilder;
    use crate::keygen::KeyType;

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Car {
            id: i64,
            name: String,
        }
    }

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Multikey {
            key1: i32,
            key2: String,
            value: String,
        }
    }

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Log {
            message: String,
        }
    }

    fn multikey_config() -> Configuration {
        let config = Configuration::default();
        config
            .register::<Multikey>(
                ClassMapBuilder::new()
                    .key("key1", KeyType::Identity)
                    .key("key2", KeyType::Assigned)
                    .auto_map(),
            )
            .unwrap();
        config
    }

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert_eq!(config.dialect().name(), "sqlserver");
        assert!(!config.nolock());
        assert!(config.buffered());
        assert_eq!(config.soft_delete_props(), [("is_active".to_string(), Value::Bool(Some(false)))]);
        assert_eq!(config.soft_activate_props(), [("is_active".to_string(), Value::Bool(Some(true)))]);
    }

    #[test]
    fn builder_overrides() {
        let config = Configuration::builder()
            .dialect(Postgres)
            .nolock(true)
            .buffered(false)
            .soft_delete([("deleted", true)])
            .default_mapper(DefaultMapper::Pluralized)
            .build();
        assert_eq!(config.dialect().name(), "postgres");
        assert!(config.nolock());
        assert!(!config.buffered());
        assert_eq!(config.soft_delete_props()[0].0, "deleted");
        assert_eq!(config.get_map::<Car>().unwrap().table, "Cars");
    }

    #[test]
    fn read_hint_only_when_enabled() {
        let map = Configuration::default().get_map::<Car>().unwrap();
        let read = |config: &Configuration| {
            let mut select = sea_query::Query::select();
            select.column(map.column_ref("id").unwrap()).from(map.table_ref());
            select.build(config.read_builder()).0
        };
        assert_eq!(read(&Configuration::default()), "SELECT [Car].[id] FROM [Car]");

        let nolock = Configuration::builder().nolock(true).build();
        assert_eq!(read(&nolock), "SELECT [Car].[id] FROM [Car] WITH (NOLOCK)");

        let postgres = Configuration::builder().dialect(Postgres).nolock(true).build();
        assert_eq!(read(&postgres), r#"SELECT "Car"."id" FROM "Car""#);
    }

    #[test]
    fn output_hook_sees_sql() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = Configuration::builder().output_sql(move |sql| sink.lock().unwrap().push(sql.to_string())).build();

        let query = Query {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        };
        config.emit("Test", "t", &query);
        assert_eq!(*seen.lock().unwrap(), ["SELECT 1"]);
    }

    #[test]
    fn single_key_predicate() {
        let config = Configuration::default();
        assert_eq!(config.id_predicate::<Car>(5_i64).unwrap(), Predicate::eq("id", 5_i64));
    }

    #[test]
    fn composite_key_predicate() {
        let config = multikey_config();
        let predicate = config.id_predicate::<Multikey>(KeyValue::composite([("key1", Value::from(1)), ("key2", Value::from("a"))])).unwrap();
        assert_eq!(
            predicate,
            Predicate::and(vec![Predicate::eq("key1", 1), Predicate::eq("key2", "a")])
        );
    }

    #[test]
    fn key_predicate_errors() {
        let config = multikey_config();
        assert!(matches!(config.id_predicate::<Multikey>(1), Err(Error::InvalidPredicate { .. })));
        assert!(matches!(
            config.id_predicate::<Multikey>(KeyValue::composite([("key1", 1)])),
            Err(Error::InvalidPredicate { .. })
        ));
        assert!(matches!(
            config.id_predicate::<Multikey>(KeyValue::composite([("value", "x")])),
            Err(Error::UnmappedProperty { .. })
        ));
        assert!(matches!(config.id_predicate::<Log>(1), Err(Error::MissingKeyStrategy { .. })));
    }

    #[test]
    fn from_options() {
        let options = Options::from_env().dialect("pg".to_string()).nolock(true).buffered(false).finalize().unwrap();
        let config = Configuration::from_options(&options).unwrap();
        assert_eq!(config.dialect().name(), "postgres");
        assert!(config.nolock());
        assert!(!config.buffered());

        let options = Options::from_env().dialect("oracle".to_string()).finalize().unwrap();
        assert!(Configuration::from_options(&options).is_err());
    }

    #[test]
    fn guids_are_distinct() {
        assert_ne!(Configuration::next_guid(), Configuration::next_guid());
    }
}
