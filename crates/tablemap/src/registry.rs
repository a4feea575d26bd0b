//! Class maps and the registry that resolves and caches them.
//!
//! A [`ClassMap`] is built at most once per entity type and shared for the registry's
//! lifetime. Resolution order:
//!
//! 1. a mapper registered explicitly for the type,
//! 2. a mapper found in one of the configured [`MappingSource`]s,
//! 3. the [`DefaultMapper`] convention.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sea_query::{Alias, ColumnRef, IntoIden, TableRef};

use crate::entity::{Entity, EntityDescriptor};
use crate::error::{Error, Result};
use crate::keygen::KeyType;

/// Mapping of a single property to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMap {
    /// Property name on the entity.
    pub name: String,
    /// Column name in the table.
    pub column: String,
    pub key_type: KeyType,
    /// Ignored properties are never read, written or filtered on.
    pub ignored: bool,
    /// Read-only properties are selected but never inserted or updated.
    pub read_only: bool,
}

impl PropertyMap {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column: name.to_string(),
            key_type: KeyType::NotAKey,
            ignored: false,
            read_only: false,
        }
    }

    /// Whether the property is written by INSERT and UPDATE statements.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !self.ignored && !self.read_only
    }
}

/// Table, column and key metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    /// Entity type name, used in error messages.
    pub type_name: String,
    pub schema: Option<String>,
    pub table: String,
    /// Properties in declaration order, ignored ones included.
    pub properties: Vec<PropertyMap>,
}

impl ClassMap {
    /// Looks up a property, ignored or not.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyMap> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up a property that may be referenced by SQL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedProperty`] when the property is unknown or ignored.
    pub fn mapped(&self, name: &str) -> Result<&PropertyMap> {
        self.property(name)
            .filter(|p| !p.ignored)
            .ok_or_else(|| Error::unmapped(&self.type_name, name))
    }

    /// Non-ignored properties, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &PropertyMap> {
        self.properties.iter().filter(|p| !p.ignored)
    }

    /// Key properties, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &PropertyMap> {
        self.columns().filter(|p| p.key_type.is_key())
    }

    /// The database-generated key, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&PropertyMap> {
        self.keys().find(|p| p.key_type == KeyType::Identity)
    }

    /// Schema-qualified table reference.
    #[must_use]
    pub fn table_ref(&self) -> TableRef {
        let table = Alias::new(&self.table).into_iden();
        match &self.schema {
            Some(schema) => TableRef::SchemaTable(Alias::new(schema).into_iden(), table),
            None => TableRef::Table(table),
        }
    }

    /// Table-qualified column for a property.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedProperty`] when the property is unknown or ignored.
    pub fn column_ref(&self, property: &str) -> Result<ColumnRef> {
        let column = Alias::new(&self.mapped(property)?.column).into_iden();
        let table = Alias::new(&self.table).into_iden();
        Ok(match &self.schema {
            Some(schema) => ColumnRef::SchemaTableColumn(Alias::new(schema).into_iden(), table, column),
            None => ColumnRef::TableColumn(table, column),
        })
    }

    fn validate(self) -> Result<Self> {
        if self.columns().next().is_none() {
            return Err(Error::MappingNotFound {
                entity: self.type_name,
            });
        }
        let identities = self.keys().filter(|p| p.key_type == KeyType::Identity).count();
        if identities > 1 {
            return Err(self.invalid(format!("{identities} identity keys; at most one allowed")));
        }
        if let Some(key) = self.properties.iter().find(|p| p.ignored && p.key_type.is_key()) {
            return Err(self.invalid(format!("key property `{}` is ignored", key.name)));
        }
        Ok(self)
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidMapping {
            entity: self.type_name.clone(),
            reason,
        }
    }
}

/// Builds a [`ClassMap`] from an entity's structural description.
pub trait ClassMapper: Send + Sync {
    /// Produces the class map for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error when the mapper references properties the entity does not declare, or
    /// the resulting map is invalid.
    fn map(&self, descriptor: &EntityDescriptor, default: DefaultMapper) -> Result<ClassMap>;
}

/// Convention used when no explicit mapper exists for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultMapper {
    /// Table named after the type.
    #[default]
    Auto,
    /// Table named after the pluralized type name.
    Pluralized,
}

impl DefaultMapper {
    fn table_name(self, type_name: &str) -> String {
        match self {
            Self::Auto => type_name.to_string(),
            Self::Pluralized => pluralize(type_name),
        }
    }
}

impl ClassMapper for DefaultMapper {
    fn map(&self, descriptor: &EntityDescriptor, _default: DefaultMapper) -> Result<ClassMap> {
        ClassMapBuilder::new().auto_map().map(descriptor, *self)
    }
}

/// English plural of a type name, good enough for table names.
#[must_use]
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let ends_with_vowel_y = lower
        .strip_suffix('y')
        .and_then(|stem| stem.chars().last())
        .is_some_and(|c| "aeiou".contains(c));

    if lower.ends_with('y') && !ends_with_vowel_y {
        format!("{}ies", &name[..name.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}

#[derive(Debug, Clone, Default)]
struct PropertyOverride {
    column: Option<String>,
    key: Option<KeyType>,
    ignored: bool,
    read_only: bool,
}

/// Explicit mapper for one entity type.
///
/// Without [`auto_map`](Self::auto_map) only the properties mentioned on the builder are
/// mapped; with it, every declared property is mapped and the mentioned ones are adjusted.
///
/// # Examples
///
/// ```ignore
/// let mapper = ClassMapBuilder::new()
///     .table("Person")
///     .column("first_name", "FirstName")
///     .ignore("full_name")
///     .auto_map();
/// config.register::<Person>(mapper)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClassMapBuilder {
    table: Option<String>,
    schema: Option<String>,
    overrides: Vec<(String, PropertyOverride)>,
    auto: bool,
}

impl ClassMapBuilder {
    /// Creates an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Sets the schema name.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Maps a property to a differently named column.
    #[must_use]
    pub fn column(mut self, property: &str, column: impl Into<String>) -> Self {
        self.entry(property).column = Some(column.into());
        self
    }

    /// Declares a key property and its strategy.
    #[must_use]
    pub fn key(mut self, property: &str, key_type: KeyType) -> Self {
        self.entry(property).key = Some(key_type);
        self
    }

    /// Excludes a property from all SQL.
    #[must_use]
    pub fn ignore(mut self, property: &str) -> Self {
        self.entry(property).ignored = true;
        self
    }

    /// Excludes a property from INSERT and UPDATE.
    #[must_use]
    pub fn read_only(mut self, property: &str) -> Self {
        self.entry(property).read_only = true;
        self
    }

    /// Maps every declared property, applying the key convention when no key was declared.
    #[must_use]
    pub const fn auto_map(mut self) -> Self {
        self.auto = true;
        self
    }

    fn entry(&mut self, property: &str) -> &mut PropertyOverride {
        let index = match self.overrides.iter().position(|(name, _)| name == property) {
            Some(index) => index,
            None => {
                self.overrides.push((property.to_string(), PropertyOverride::default()));
                self.overrides.len() - 1
            }
        };
        &mut self.overrides[index].1
    }

    fn override_for(&self, property: &str) -> Option<&PropertyOverride> {
        self.overrides.iter().find(|(name, _)| name == property).map(|(_, o)| o)
    }
}

impl ClassMapper for ClassMapBuilder {
    fn map(&self, descriptor: &EntityDescriptor, default: DefaultMapper) -> Result<ClassMap> {
        if let Some((unknown, _)) =
            self.overrides.iter().find(|(name, _)| descriptor.property(name).is_none())
        {
            return Err(Error::unmapped(descriptor.type_name, unknown));
        }

        let mut properties: Vec<PropertyMap> = descriptor
            .properties
            .iter()
            .filter(|p| self.auto || self.override_for(p.name).is_some())
            .map(|p| {
                let mut property = PropertyMap::new(p.name);
                if let Some(o) = self.override_for(p.name) {
                    if let Some(column) = &o.column {
                        property.column.clone_from(column);
                    }
                    property.key_type = o.key.unwrap_or_default();
                    property.ignored = o.ignored;
                    property.read_only = o.read_only;
                }
                property
            })
            .collect();

        if self.auto && !properties.iter().any(|p| p.key_type.is_key()) {
            apply_key_convention(descriptor, &mut properties);
        }

        let table = self
            .table
            .clone()
            .or_else(|| descriptor.table.map(ToString::to_string))
            .unwrap_or_else(|| default.table_name(descriptor.type_name));
        let schema = self.schema.clone().or_else(|| descriptor.schema.map(ToString::to_string));

        ClassMap {
            type_name: descriptor.type_name.to_string(),
            schema,
            table,
            properties,
        }
        .validate()
    }
}

// `id` wins; otherwise the first property whose name ends in `id`.
fn apply_key_convention(descriptor: &EntityDescriptor, properties: &mut [PropertyMap]) {
    let candidates = || properties.iter().filter(|p| !p.ignored);
    let key = candidates()
        .position(|p| p.name.eq_ignore_ascii_case("id"))
        .or_else(|| candidates().position(|p| p.name.to_ascii_lowercase().ends_with("id")))
        .and_then(|n| candidates().nth(n).map(|p| p.name.clone()));

    let Some(key) = key else { return };
    let Some(kind) = descriptor.property(&key).map(|p| p.kind) else { return };
    if let Some(property) = properties.iter_mut().find(|p| p.name == key) {
        property.key_type = KeyType::for_kind(kind);
    }
}

/// A named set of mappers consulted after explicit registrations.
#[derive(Clone, Default)]
pub struct MappingSource {
    name: String,
    mappers: Vec<(TypeId, Arc<dyn ClassMapper>)>,
}

impl MappingSource {
    /// Creates an empty source called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mappers: Vec::new(),
        }
    }

    /// Adds a mapper for `E`.
    #[must_use]
    pub fn with<E: Entity>(mut self, mapper: impl ClassMapper + 'static) -> Self {
        self.mappers.push((TypeId::of::<E>(), Arc::new(mapper)));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn mappers_for(&self, type_id: TypeId) -> impl Iterator<Item = &Arc<dyn ClassMapper>> {
        self.mappers.iter().filter(move |(id, _)| *id == type_id).map(|(_, m)| m)
    }
}

impl fmt::Debug for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingSource")
            .field("name", &self.name)
            .field("mappers", &self.mappers.len())
            .finish()
    }
}

/// Resolves and caches class maps by entity type.
///
/// Safe to share across threads. Each type's map is constructed under the cache's write
/// lock, so concurrent first lookups observe a single instance.
pub struct Registry {
    default_mapper: DefaultMapper,
    sources: Vec<MappingSource>,
    mappers: RwLock<HashMap<TypeId, Arc<dyn ClassMapper>>>,
    cache: RwLock<HashMap<TypeId, Arc<ClassMap>>>,
}

impl Registry {
    #[must_use]
    pub fn new(default_mapper: DefaultMapper, sources: Vec<MappingSource>) -> Self {
        Self {
            default_mapper,
            sources,
            mappers: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn default_mapper(&self) -> DefaultMapper {
        self.default_mapper
    }

    /// Registers an explicit mapper for `E`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousMapper`] when `E` already has an explicit mapper.
    pub fn register<E: Entity>(&self, mapper: impl ClassMapper + 'static) -> Result<()> {
        let type_id = TypeId::of::<E>();
        {
            let mut mappers = self.mappers.write();
            if mappers.contains_key(&type_id) {
                return Err(Error::AmbiguousMapper {
                    entity: E::descriptor().type_name.to_string(),
                    count: 2,
                });
            }
            mappers.insert(type_id, Arc::new(mapper));
        }
        // lookups hold the cache lock while reading mappers, so never nest the other way
        self.cache.write().remove(&type_id);
        Ok(())
    }

    /// Returns the class map for `E`, building and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when more than one mapping source maps `E`, or the resolved mapper
    /// fails.
    pub fn get_map<E: Entity>(&self) -> Result<Arc<ClassMap>> {
        let type_id = TypeId::of::<E>();
        if let Some(map) = self.cache.read().get(&type_id) {
            return Ok(Arc::clone(map));
        }

        let mut cache = self.cache.write();
        if let Some(map) = cache.get(&type_id) {
            return Ok(Arc::clone(map));
        }

        let map = Arc::new(self.resolve(type_id, &E::descriptor())?);
        cache.insert(type_id, Arc::clone(&map));
        Ok(map)
    }

    /// Drops every cached class map; explicit registrations are kept.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        tracing::debug!(cached = cache.len(), "class map cache cleared");
        cache.clear();
    }

    fn resolve(&self, type_id: TypeId, descriptor: &EntityDescriptor) -> Result<ClassMap> {
        if let Some(mapper) = self.mappers.read().get(&type_id) {
            tracing::debug!(entity = descriptor.type_name, source = "explicit", "resolving class map");
            return mapper.map(descriptor, self.default_mapper);
        }

        let mut found = self
            .sources
            .iter()
            .flat_map(|source| source.mappers_for(type_id).map(move |m| (source.name(), m)));
        if let Some((source, mapper)) = found.next() {
            let extra = found.count();
            if extra > 0 {
                return Err(Error::AmbiguousMapper {
                    entity: descriptor.type_name.to_string(),
                    count: extra + 1,
                });
            }
            tracing::debug!(entity = descriptor.type_name, source, "resolving class map");
            return mapper.map(descriptor, self.default_mapper);
        }

        tracing::debug!(entity = descriptor.type_name, source = "default", "resolving class map");
        self.default_mapper.map(descriptor, self.default_mapper)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DefaultMapper::default(), Vec::new())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("default_mapper", &self.default_mapper)
            .field("sources", &self.sources)
            .field("mappers", &self.mappers.read().len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use sea_query::Query;

    use super::*;
    use crate::dialect::{Dialect, Postgres};

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Car {
            car_id: i64,
            name: String,
        }
    }

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Category {
            id: Uuid,
            parent_id: Uuid,
            title: String,
        }
    }

    crate::entity! {
        table = "Person",
        schema = "dbo",
        #[derive(Debug, Clone)]
        struct Person {
            id: i64,
            first_name: String,
            full_name: String,
            date_created: chrono::NaiveDateTime,
        }
    }

    crate::entity! {
        #[derive(Debug, Clone)]
        struct Note {
            body: String,
        }
    }

    #[test]
    fn auto_map_uses_type_name_and_key_convention() {
        let registry = Registry::default();
        let map = registry.get_map::<Car>().unwrap();

        assert_eq!(map.table, "Car");
        assert_eq!(map.properties.len(), 2);
        assert_eq!(map.property("car_id").unwrap().key_type, KeyType::Identity);
        assert_eq!(map.identity().unwrap().name, "car_id");
    }

    #[test]
    fn exact_id_wins_and_guid_keys() {
        let map = DefaultMapper::Auto.map(&Category::descriptor(), DefaultMapper::Auto).unwrap();
        let keys: Vec<_> = map.keys().map(|p| (p.name.as_str(), p.key_type)).collect();
        assert_eq!(keys, [("id", KeyType::Guid)]);
    }

    #[test]
    fn no_key_by_convention() {
        let map = DefaultMapper::Auto.map(&Note::descriptor(), DefaultMapper::Auto).unwrap();
        assert_eq!(map.keys().count(), 0);
    }

    #[test]
    fn pluralized_mapper() {
        let registry = Registry::new(DefaultMapper::Pluralized, Vec::new());
        assert_eq!(registry.get_map::<Car>().unwrap().table, "Cars");
        assert_eq!(registry.get_map::<Category>().unwrap().table, "Categories");
        // an explicit table declaration is never pluralized
        assert_eq!(registry.get_map::<Person>().unwrap().table, "Person");
    }

    #[test]
    fn pluralize_rules() {
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Church"), "Churches");
        assert_eq!(pluralize("Status"), "Statuses");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Company"), "Companies");
        assert_eq!(pluralize("Order"), "Orders");
    }

    #[test]
    fn explicit_mapper_renames_and_ignores() {
        let registry = Registry::default();
        registry
            .register::<Person>(
                ClassMapBuilder::new()
                    .column("first_name", "FirstName")
                    .ignore("full_name")
                    .read_only("date_created")
                    .auto_map(),
            )
            .unwrap();

        let map = registry.get_map::<Person>().unwrap();
        assert_eq!(map.schema.as_deref(), Some("dbo"));
        let sql = Query::select()
            .column(map.column_ref("first_name").unwrap())
            .from(map.table_ref())
            .build(Postgres.builder())
            .0;
        assert_eq!(sql, r#"SELECT "dbo"."Person"."FirstName" FROM "dbo"."Person""#);
        assert!(!map.property("date_created").unwrap().is_writable());
        assert_eq!(map.column_ref("full_name"), Err(Error::unmapped("Person", "full_name")));
        assert_eq!(map.identity().unwrap().name, "id");
    }

    #[test]
    fn explicit_mapper_without_auto_map_only_maps_mentioned() {
        let map = ClassMapBuilder::new()
            .table("Cars")
            .key("car_id", KeyType::Assigned)
            .map(&Car::descriptor(), DefaultMapper::Auto)
            .unwrap();
        assert_eq!(map.table, "Cars");
        assert_eq!(map.properties.len(), 1);
        assert_eq!(map.keys().next().unwrap().key_type, KeyType::Assigned);
    }

    #[test]
    fn map_without_columns_is_not_found() {
        let err = ClassMapBuilder::new().table("Cars").map(&Car::descriptor(), DefaultMapper::Auto);
        assert_eq!(err, Err(Error::MappingNotFound { entity: "Car".to_string() }));

        let err = ClassMapBuilder::new()
            .ignore("car_id")
            .ignore("name")
            .map(&Car::descriptor(), DefaultMapper::Auto);
        assert_eq!(err, Err(Error::MappingNotFound { entity: "Car".to_string() }));
    }

    #[test]
    fn unknown_property_in_mapper() {
        let err = ClassMapBuilder::new().column("nope", "Nope").map(&Car::descriptor(), DefaultMapper::Auto);
        assert_eq!(err, Err(Error::unmapped("Car", "nope")));
    }

    #[test]
    fn two_identity_keys_are_invalid() {
        let err = ClassMapBuilder::new()
            .key("car_id", KeyType::Identity)
            .key("name", KeyType::Identity)
            .map(&Car::descriptor(), DefaultMapper::Auto)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMapping { .. }));
    }

    #[test]
    fn duplicate_registration_is_ambiguous() {
        let registry = Registry::default();
        registry.register::<Car>(ClassMapBuilder::new().auto_map()).unwrap();
        let err = registry.register::<Car>(ClassMapBuilder::new().auto_map()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousMapper { count: 2, .. }));
    }

    #[test]
    fn mapping_sources() {
        let source = MappingSource::new("cars").with::<Car>(ClassMapBuilder::new().table("Automobile").auto_map());
        let registry = Registry::new(DefaultMapper::Auto, vec![source.clone()]);
        assert_eq!(registry.get_map::<Car>().unwrap().table, "Automobile");
        assert_eq!(registry.get_map::<Note>().unwrap().table, "Note");

        let other = MappingSource::new("more").with::<Car>(ClassMapBuilder::new().auto_map());
        let registry = Registry::new(DefaultMapper::Auto, vec![source, other]);
        let err = registry.get_map::<Car>().unwrap_err();
        assert!(matches!(err, Error::AmbiguousMapper { count: 2, .. }));
    }

    #[test]
    fn explicit_registration_beats_sources() {
        let source = MappingSource::new("cars").with::<Car>(ClassMapBuilder::new().table("FromSource").auto_map());
        let registry = Registry::new(DefaultMapper::Auto, vec![source]);
        registry.register::<Car>(ClassMapBuilder::new().table("Explicit").auto_map()).unwrap();
        assert_eq!(registry.get_map::<Car>().unwrap().table, "Explicit");
    }

    #[test]
    fn cache_is_shared_until_cleared() {
        let registry = Registry::default();
        let first = registry.get_map::<Car>().unwrap();
        let second = registry.get_map::<Car>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.clear_cache();
        let third = registry.get_map::<Car>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn concurrent_first_lookup_converges() {
        let registry = Registry::default();
        let maps: Vec<Arc<ClassMap>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| registry.get_map::<Person>().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(maps.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
