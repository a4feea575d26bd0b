use std::marker::PhantomData;

use sea_query::{Alias, Asterisk, Expr, Func, SimpleExpr};

use crate::config::{Configuration, KeyValue, id_predicate};
use crate::dialect::{Projection, SelectQuery};
use crate::entity::Entity;
use crate::error::Result;
use crate::predicate::{Predicate, Sort, render_sort};
use crate::query::Query;
use crate::registry::ClassMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    All,
    Top(u64),
    Offset { offset: u64, max: u64 },
}

// Filters collected on a builder: explicit predicates plus an optional key, ANDed together.
#[derive(Debug, Clone, Default)]
struct Filters {
    predicates: Vec<Predicate>,
    key: Option<KeyValue>,
}

impl Filters {
    fn to_expr(self, config: &Configuration, map: &ClassMap) -> Result<Option<SimpleExpr>> {
        let mut predicates = self.predicates;
        if let Some(key) = self.key {
            predicates.push(id_predicate(map, key)?);
        }
        let predicate = match predicates.len() {
            0 => return Ok(None),
            1 => predicates.remove(0),
            _ => Predicate::and(predicates),
        };
        predicate.to_expr(config.dialect(), map).map(Some)
    }
}

/// Builder for SELECT queries, including top-N, page and range windows.
pub struct SelectBuilder<'a, E: Entity> {
    config: &'a Configuration,
    filters: Filters,
    sort: Vec<Sort>,
    window: Window,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> SelectBuilder<'a, E> {
    /// Creates a new SELECT query builder.
    #[must_use]
    pub const fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            filters: Filters {
                predicates: Vec::new(),
                key: None,
            },
            sort: Vec::new(),
            window: Window::All,
            _marker: PhantomData,
        }
    }

    /// Adds a WHERE predicate; several are ANDed.
    #[must_use]
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.filters.predicates.push(predicate);
        self
    }

    /// Restricts the query to the row with the given key.
    #[must_use]
    pub fn by_key(mut self, key: impl Into<KeyValue>) -> Self {
        self.filters.key = Some(key.into());
        self
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Adds several ORDER BY terms.
    #[must_use]
    pub fn sort(mut self, sort: impl IntoIterator<Item = Sort>) -> Self {
        self.sort.extend(sort);
        self
    }

    /// Returns at most `limit` rows.
    ///
    /// Without a sort the rows returned are engine-defined.
    #[must_use]
    pub const fn top(mut self, limit: u64) -> Self {
        self.window = Window::Top(limit);
        self
    }

    /// Returns page `page` (1-based) of `per_page` rows.
    #[must_use]
    pub const fn page(mut self, page: u64, per_page: u64) -> Self {
        self.window = Window::Offset {
            offset: page.saturating_sub(1).saturating_mul(per_page),
            max: per_page,
        };
        self
    }

    /// Returns `max_results` rows starting at 1-based row `first_result`.
    #[must_use]
    pub const fn range(mut self, first_result: u64, max_results: u64) -> Self {
        self.window = Window::Offset {
            offset: first_result.saturating_sub(1),
            max: max_results,
        };
        self
    }

    /// Build the SELECT query.
    ///
    /// # Errors
    ///
    /// Returns an error when the class map cannot be resolved or a predicate or sort
    /// references an unmapped property.
    pub fn build(self) -> Result<Query> {
        let map = self.config.get_map::<E>()?;
        let dialect = self.config.dialect();
        let builder = self.config.read_builder();

        let projection = map
            .columns()
            .map(|p| {
                Ok(Projection {
                    column: map.column_ref(&p.name)?,
                    name: p.name.clone(),
                    renamed: p.column != p.name,
                })
            })
            .collect::<Result<_>>()?;

        let select = SelectQuery {
            projection,
            table: map.table_ref(),
            filter: self.filters.to_expr(self.config, &map)?,
            order_by: render_sort(&self.sort, &map)?,
        };

        let built = match self.window {
            Window::All => select.statement().build(builder),
            Window::Top(limit) => dialect.render_top_query(&select, limit, builder),
            Window::Offset { offset, max } => dialect.render_paged_query(&select, offset, max, builder),
        };

        let query = Query::new(dialect, built);
        self.config.emit("SelectBuilder", &map.table, &query);
        Ok(query)
    }
}

/// Builder for `SELECT COUNT(*)` queries; also serves existence checks.
pub struct CountBuilder<'a, E: Entity> {
    config: &'a Configuration,
    filters: Filters,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> CountBuilder<'a, E> {
    #[must_use]
    pub const fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            filters: Filters {
                predicates: Vec::new(),
                key: None,
            },
            _marker: PhantomData,
        }
    }

    /// Adds a WHERE predicate; several are ANDed. No predicate counts every row.
    #[must_use]
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.filters.predicates.push(predicate);
        self
    }

    /// Counts the row with the given key.
    #[must_use]
    pub fn by_key(mut self, key: impl Into<KeyValue>) -> Self {
        self.filters.key = Some(key.into());
        self
    }

    /// Build the COUNT query. The single result column is named `Total`.
    ///
    /// # Errors
    ///
    /// Returns an error when the class map cannot be resolved or a predicate references an
    /// unmapped property.
    pub fn build(self) -> Result<Query> {
        let map = self.config.get_map::<E>()?;

        let mut statement = sea_query::Query::select();
        statement.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("Total")).from(map.table_ref());
        if let Some(filter) = self.filters.to_expr(self.config, &map)? {
            statement.and_where(filter);
        }

        let query = Query::new(self.config.dialect(), statement.build(self.config.read_builder()));
        self.config.emit("CountBuilder", &map.table, &query);
        Ok(query)
    }
}
