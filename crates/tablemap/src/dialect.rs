//! Per-engine rendering rules.
//!
//! A dialect is a stateless strategy: identifier quoting, parameter markers, the read-lock
//! hint, limit and paging syntax, and how an identity key is read back after an insert.
//! Statements are assembled with sea-query and rendered by the [`SqlBuilder`] backend a
//! dialect hands out. Dialects are shared as `Arc<dyn Dialect>` and need no synchronization.

use std::fmt::{Debug, Write};
use std::sync::Arc;

use sea_query::backend::{EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder};
use sea_query::prepare::{SqlWriter, SqlWriterValues};
use sea_query::{
    Alias, BinOper, ColumnRef, Expr, Func, Iden, InsertStatement, Oper, Order, Quote, SelectStatement, SimpleExpr,
    SubQueryStatement, TableRef, Value, Values, WindowStatement,
};

/// Rendered SQL text and the values bound to its markers, in marker order.
pub type Built = (String, Values);

/// sea-query backend for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder {
    quote: Quote,
    placeholder: &'static str,
    numbered: bool,
    read_lock: Option<&'static str>,
}

impl SqlBuilder {
    /// A backend quoting with `quote` and writing `placeholder` markers, numbered from 1 when
    /// `numbered` is set.
    #[must_use]
    pub const fn new(quote: Quote, placeholder: &'static str, numbered: bool) -> Self {
        Self {
            quote,
            placeholder,
            numbered,
            read_lock: None,
        }
    }

    /// Writes `hint` after every table the statement reads.
    #[must_use]
    pub const fn read_lock(mut self, hint: Option<&'static str>) -> Self {
        self.read_lock = hint;
        self
    }

    /// Renders a lone expression, such as a predicate.
    #[must_use]
    pub fn build_expr(&self, expr: &SimpleExpr) -> Built {
        let mut sql = SqlWriterValues::new(self.placeholder, self.numbered);
        sea_query::backend::QueryBuilder::prepare_simple_expr(self, expr, &mut sql);
        sql.into_parts()
    }
}

impl QuotedBuilder for SqlBuilder {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for SqlBuilder {}

// plain table references, without any hint
struct TableRefs(Quote);

impl QuotedBuilder for TableRefs {
    fn quote(&self) -> Quote {
        self.0
    }
}

impl TableRefBuilder for TableRefs {}

impl TableRefBuilder for SqlBuilder {
    fn prepare_table_ref_iden(&self, table_ref: &TableRef, sql: &mut dyn SqlWriter) {
        TableRefs(self.quote).prepare_table_ref_iden(table_ref, sql);
        if let Some(hint) = self.read_lock {
            let _ = write!(sql, " {hint}");
        }
    }
}

impl OperLeftAssocDecider for SqlBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        matches!(op, BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod)
    }
}

impl PrecedenceDecider for SqlBuilder {
    // Comparisons and NOT bind tighter than AND/OR. Groups arrive as tuples and carry their
    // own parentheses.
    fn inner_expr_well_known_greater_precedence(&self, inner: &SimpleExpr, outer_oper: &Oper) -> bool {
        let logical = matches!(outer_oper, Oper::BinOper(BinOper::And | BinOper::Or));
        match inner {
            SimpleExpr::Column(_)
            | SimpleExpr::Tuple(_)
            | SimpleExpr::Value(_)
            | SimpleExpr::Values(_)
            | SimpleExpr::Constant(_)
            | SimpleExpr::Keyword(_)
            | SimpleExpr::Custom(_)
            | SimpleExpr::FunctionCall(_) => true,
            SimpleExpr::Binary(_, op, _) => logical && !matches!(op, BinOper::And | BinOper::Or),
            SimpleExpr::Unary(..) => logical,
            _ => false,
        }
    }
}

impl sea_query::backend::QueryBuilder for SqlBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }

    fn insert_default_values(&self, _num_rows: u32, sql: &mut dyn SqlWriter) {
        let _ = sql.write_str("DEFAULT VALUES");
    }
}

/// One output column of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Qualified source column.
    pub column: ColumnRef,
    /// Output name.
    pub name: String,
    /// Whether the output name differs from the column and needs an `AS`.
    pub renamed: bool,
}

/// An un-limited SELECT kept in parts so a dialect can wrap it for top-N or paging.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    /// Output columns, in property order.
    pub projection: Vec<Projection>,
    /// Source table.
    pub table: TableRef,
    /// WHERE condition, if any.
    pub filter: Option<SimpleExpr>,
    /// Sort terms.
    pub order_by: Vec<(ColumnRef, Order)>,
}

impl SelectQuery {
    /// The plain statement: `SELECT <cols> FROM <table> [WHERE ..] [ORDER BY ..]`.
    #[must_use]
    pub fn statement(&self) -> SelectStatement {
        let mut statement = self.unordered();
        for (column, order) in &self.order_by {
            statement.order_by(column.clone(), order.clone());
        }
        statement
    }

    fn unordered(&self) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        for p in &self.projection {
            if p.renamed {
                statement.expr_as(SimpleExpr::Column(p.column.clone()), Alias::new(&p.name));
            } else {
                statement.column(p.column.clone());
            }
        }
        statement.from(self.table.clone());
        if let Some(filter) = &self.filter {
            statement.and_where(filter.clone());
        }
        statement
    }
}

/// Rendering rules for one database engine.
pub trait Dialect: Debug + Send + Sync {
    /// Short name, as accepted by [`from_name`].
    fn name(&self) -> &'static str;

    /// Opening and closing identifier quote.
    fn quote(&self) -> Quote;

    /// Parameter marker prefix, and whether markers are numbered from 1.
    fn placeholder(&self) -> (&'static str, bool);

    /// Table hint emitted after the table name when the read-lock flag is on.
    fn read_lock_hint(&self) -> Option<&'static str> {
        None
    }

    /// The sea-query backend rendering statements for this dialect.
    fn builder(&self) -> SqlBuilder {
        let (placeholder, numbered) = self.placeholder();
        SqlBuilder::new(self.quote(), placeholder, numbered)
    }

    /// Quotes a single identifier, doubling embedded closing quotes.
    fn quote_identifier(&self, identifier: &str) -> String {
        let mut quoted = String::with_capacity(identifier.len() + 2);
        Alias::new(identifier).prepare(&mut quoted, self.quote());
        quoted
    }

    /// Marker of the `index`-th (1-based) bound parameter.
    fn parameter_marker(&self, index: usize) -> String {
        match self.placeholder() {
            (prefix, true) => format!("{prefix}{index}"),
            (marker, false) => marker.to_string(),
        }
    }

    /// Renders `query` so that at most `limit` rows are returned.
    fn render_top_query(&self, query: &SelectQuery, limit: u64, builder: SqlBuilder) -> Built {
        let mut statement = query.statement();
        statement.limit(limit);
        statement.build(builder)
    }

    /// Renders `query` so that `max_rows` rows are returned after skipping `offset_rows`.
    fn render_paged_query(&self, query: &SelectQuery, offset_rows: u64, max_rows: u64, builder: SqlBuilder) -> Built {
        let mut statement = query.statement();
        statement.limit(max_rows).offset(offset_rows);
        statement.build(builder)
    }

    /// Renders an INSERT that also yields the generated identity `key_column`.
    fn render_key_retrieval(&self, mut insert: InsertStatement, key_column: &str, builder: SqlBuilder) -> Built {
        insert.returning_col(Alias::new(key_column));
        insert.build(builder)
    }

    /// Expression that is always true; rendered for an empty AND group.
    fn always_true(&self) -> &'static str {
        "(1=1)"
    }

    /// Expression that is always false; rendered for an empty OR group.
    fn always_false(&self) -> &'static str {
        "(1=0)"
    }
}

/// Resolves a dialect by name (case-insensitive).
#[must_use]
pub fn from_name(name: &str) -> Option<Arc<dyn Dialect>> {
    let dialect: Arc<dyn Dialect> = match name.trim().to_ascii_lowercase().as_str() {
        "sqlserver" | "mssql" => Arc::new(SqlServer),
        "postgres" | "postgresql" | "pg" => Arc::new(Postgres),
        "mysql" => Arc::new(MySql),
        "sqlite" => Arc::new(Sqlite),
        _ => return None,
    };
    Some(dialect)
}

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote(&self) -> Quote {
        Quote::from(('[', ']'))
    }

    fn placeholder(&self) -> (&'static str, bool) {
        ("@P", true)
    }

    fn read_lock_hint(&self) -> Option<&'static str> {
        Some("WITH (NOLOCK)")
    }

    fn render_top_query(&self, query: &SelectQuery, limit: u64, builder: SqlBuilder) -> Built {
        let (sql, values) = query.statement().build(builder);
        (sql.replacen("SELECT ", &format!("SELECT TOP ({limit}) "), 1), values)
    }

    // rows are numbered in a derived table and the outer query keeps one window of them
    fn render_paged_query(&self, query: &SelectQuery, offset_rows: u64, max_rows: u64, builder: SqlBuilder) -> Built {
        let projection = Alias::new("_proj");
        let row_number = Alias::new("_row_number");

        let mut window = WindowStatement::new();
        if query.order_by.is_empty() {
            window.order_by_expr(Expr::cust("CURRENT_TIMESTAMP"), Order::Asc);
        }
        for (column, order) in &query.order_by {
            window.order_by(column.clone(), order.clone());
        }

        let mut inner = query.unordered();
        inner.expr_window_as(Func::cust(Alias::new("ROW_NUMBER")), window, row_number.clone());

        let mut outer = sea_query::Query::select();
        for p in &query.projection {
            outer.column((projection.clone(), Alias::new(&p.name)));
        }
        outer
            .from_subquery(inner, projection.clone())
            .and_where(
                Expr::col((projection.clone(), row_number.clone()))
                    .between(offset_rows.saturating_add(1), offset_rows.saturating_add(max_rows)),
            )
            .order_by((projection, row_number), Order::Asc);
        outer.build(builder)
    }

    fn render_key_retrieval(&self, insert: InsertStatement, key_column: &str, builder: SqlBuilder) -> Built {
        let (sql, values) = insert.build(builder);
        (
            format!("{sql}; SELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS {}", self.quote_identifier(key_column)),
            values,
        )
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote(&self) -> Quote {
        Quote::new(b'"')
    }

    fn placeholder(&self) -> (&'static str, bool) {
        ("$", true)
    }
}

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self) -> Quote {
        Quote::new(b'`')
    }

    fn placeholder(&self) -> (&'static str, bool) {
        ("?", false)
    }

    fn render_key_retrieval(&self, insert: InsertStatement, key_column: &str, builder: SqlBuilder) -> Built {
        let (sql, values) = insert.build(builder);
        (format!("{sql}; SELECT LAST_INSERT_ID() AS {}", self.quote_identifier(key_column)), values)
    }
}

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote(&self) -> Quote {
        Quote::new(b'"')
    }

    fn placeholder(&self) -> (&'static str, bool) {
        ("?", false)
    }
}
