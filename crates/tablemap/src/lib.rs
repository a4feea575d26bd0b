//! Predicate compiler, class-map registry and dialect-aware SQL generator.
//!
//! tablemap turns filter, sort and paging specifications into parameterized SQL for a
//! chosen dialect, and maps entity structs to table rows. It performs no I/O: every builder
//! returns SQL text plus ordered parameters for an executor to run.
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! use tablemap::entity;
//!
//! entity! {
//!     table = "Person",
//!     #[derive(Debug, Clone)]
//!     pub struct Person {
//!         pub id: i64,
//!         pub first_name: String,
//!         pub last_name: String,
//!         pub is_active: bool,
//!     }
//! }
//! ```
//!
//! `id` becomes an identity key by convention. Use a [`ClassMapBuilder`] to rename columns,
//! ignore properties or choose another key.
//!
//! ## Build Statements
//!
//! ```ignore
//! use tablemap::{Configuration, Predicate, Sort};
//!
//! let config = Configuration::global();
//!
//! // Select with a predicate, sorted, second page of 20
//! let query = config
//!     .select::<Person>()
//!     .r#where(Predicate::and(vec![
//!         Predicate::eq("is_active", true),
//!         Predicate::like("last_name", "Sm%"),
//!     ]))
//!     .order_by(Sort::asc("last_name"))
//!     .page(2, 20)
//!     .build()?;
//!
//! // Insert, reading back the identity key
//! let statement = config.insert(&person).build()?;
//!
//! // Partial update and soft delete
//! config.update_entity(&person).only(&["first_name"]).build()?;
//! config.soft_delete::<Person>().r#where(Predicate::eq("last_name", "Smith")).build()?;
//! ```
//!
//! ## Conditions
//!
//! ```ignore
//! let ids = vec![1, 2, 3];
//! let predicate = tablemap::condition!(|p| p.is_active && !ids.contains(&p.id)).compile()?;
//! // ([Person].[is_active] = @P1 AND [Person].[id] NOT IN (@P2, @P3, @P4))
//! ```

extern crate self as tablemap;

pub mod condition;
mod config;
mod delete;
pub mod dialect;
mod entity;
mod error;
mod insert;
mod keygen;
mod options;
mod predicate;
mod query;
mod registry;
mod select;
mod update;

pub use condition::{Condition, compile as compile_predicate};
pub use config::{Configuration, ConfigurationBuilder, KeyValue, PropertySet, SqlHook};
pub use delete::DeleteBuilder;
pub use dialect::Dialect;
pub use entity::{ColumnType, Entity, EntityDescriptor, PropertyDescriptor, ValueKind};
pub use error::{Error, Result};
pub use insert::{InsertBuilder, InsertStatement};
pub use keygen::{KeyType, next_sequential_guid};
pub use options::Options;
pub use predicate::{
    BetweenPredicate, FieldPredicate, FieldValue, GroupOperator, Operator, Predicate, PredicateGroup, Sort,
};
pub use query::{Parameter, Query};
pub use registry::{ClassMap, ClassMapBuilder, ClassMapper, DefaultMapper, MappingSource, PropertyMap, Registry, pluralize};
pub use sea_query::Value;
pub use select::{CountBuilder, SelectBuilder};
pub use tablemap_macro::condition;
pub use update::UpdateBuilder;

// Re-exports for ``entity`` macro use only.
#[doc(hidden)]
pub mod __private {
    pub use sea_query::Value;
}
