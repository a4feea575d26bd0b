//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use tablemap::{ClassMapBuilder, Configuration, KeyType, entity};
use uuid::Uuid;

// Common test entities used across multiple test files

entity! {
    table = "Person",
    #[derive(Debug, Clone)]
    pub struct Person {
        pub id: i64,
        pub first_name: String,
        pub last_name: String,
        pub is_active: bool,
        pub date_created: String,
    }
}

entity! {
    table = "Car",
    #[derive(Debug, Clone)]
    pub struct Car {
        pub id: i64,
        pub name: String,
        pub car_id: i32,
        pub is_active: bool,
    }
}

entity! {
    table = "Animal",
    #[derive(Debug, Clone)]
    pub struct Animal {
        pub id: Uuid,
        pub name: String,
    }
}

entity! {
    table = "Multikey",
    #[derive(Debug, Clone)]
    pub struct Multikey {
        pub key1: i32,
        pub key2: String,
        pub value: String,
    }
}

/// Builds the configuration and registers the shared explicit mappings.
pub fn configure(builder: tablemap::ConfigurationBuilder) -> Configuration {
    let config = builder.build();
    config
        .register::<Multikey>(
            ClassMapBuilder::new()
                .key("key1", KeyType::Assigned)
                .key("key2", KeyType::Assigned)
                .auto_map(),
        )
        .expect("multikey mapping should register");
    config
        .register::<Car>(ClassMapBuilder::new().column("car_id", "CarId").auto_map())
        .expect("car mapping should register");
    config
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' | '[' | ']' | '`' if !in_single_quote => {}
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Identifier quoting of every dialect is stripped and whitespace normalized, so one set of
/// fragments can be checked against several dialects.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!("expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`");
        }
    }
}
