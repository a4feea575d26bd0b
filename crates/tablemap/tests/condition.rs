//! Integration tests for the ``condition!`` macro and the condition compiler.

#![allow(missing_docs)]

mod common;

use common::Person;
use tablemap::dialect::Postgres;
use tablemap::{Configuration, Error, Predicate, Value, condition};

fn where_clause(predicate: Predicate) -> String {
    let sql = Configuration::default().select::<Person>().r#where(predicate).build().unwrap().sql;
    sql.split_once(" WHERE ").map(|(_, tail)| tail.to_string()).unwrap_or_default()
}

#[test]
fn equality_on_captured_value() {
    let name = "Foo".to_string();
    let predicate = condition!(|p| p.first_name == name).compile().unwrap();
    assert_eq!(predicate, Predicate::eq("first_name", "Foo"));
}

#[test]
fn and_chain_is_left_nested() {
    let predicate = condition!(|p| p.id == 1_i64 && p.first_name == "a" && p.last_name == "b")
        .compile()
        .unwrap();
    assert_eq!(
        where_clause(predicate),
        "(([Person].[id] = @P1 AND [Person].[first_name] = @P2) AND [Person].[last_name] = @P3)"
    );
}

#[test]
fn explicit_parentheses_are_kept() {
    let predicate = condition!(|p| p.id == 1_i64 || (p.is_active && p.last_name != "Bar"))
        .compile()
        .unwrap();
    assert_eq!(
        where_clause(predicate),
        "([Person].[id] = @P1 OR ([Person].[is_active] = @P2 AND [Person].[last_name] <> @P3))"
    );
}

#[test]
fn negations() {
    let predicate = condition!(|p| !p.is_active).compile().unwrap();
    assert_eq!(where_clause(predicate), "[Person].[is_active] <> @P1");

    let predicate = condition!(|p| !(p.id > 3_i64)).compile().unwrap();
    assert_eq!(where_clause(predicate), "NOT ([Person].[id] > @P1)");

    let predicate = condition!(|p| !(p.id == 1_i64 || p.id == 2_i64)).compile().unwrap();
    assert_eq!(where_clause(predicate), "NOT ([Person].[id] = @P1 OR [Person].[id] = @P2)");
}

#[test]
fn value_on_the_left_is_flipped() {
    let limit = 10_i64;
    let predicate = condition!(|p| limit <= p.id).compile().unwrap();
    assert_eq!(predicate, Predicate::ge("id", 10_i64));
}

#[test]
fn string_methods_become_like() {
    let predicate = condition!(|p| p.first_name.starts_with("Fo")).compile().unwrap();
    assert_eq!(predicate, Predicate::like("first_name", "Fo%"));

    let suffix = "ar".to_string();
    let predicate = condition!(|p| p.last_name.ends_with(&suffix)).compile().unwrap();
    assert_eq!(predicate, Predicate::like("last_name", "%ar"));

    let predicate = condition!(|p| !p.last_name.contains("o")).compile().unwrap();
    assert_eq!(predicate, Predicate::not_like("last_name", "%o%"));
}

#[test]
fn collection_membership() {
    let ids = vec![1_i64, 2, 3];
    let predicate = condition!(|p| ids.contains(&p.id)).compile().unwrap();
    assert_eq!(predicate, Predicate::r#in("id", [1_i64, 2, 3]));

    let query = Configuration::builder()
        .dialect(Postgres)
        .build()
        .select::<Person>()
        .r#where(condition!(|p| p.is_active && !ids.contains(&p.id)).compile().unwrap())
        .build()
        .unwrap();
    assert!(query.sql.ends_with(r#"WHERE ("Person"."is_active" = $1 AND "Person"."id" NOT IN ($2, $3, $4))"#));
    assert_eq!(query.values()[0], Value::Bool(Some(true)));
}

#[test]
fn casts_are_stripped() {
    let min = 18;
    let predicate = condition!(|p| p.id as i32 >= min).compile().unwrap();
    assert_eq!(predicate, Predicate::ge("id", 18));
}

#[test]
fn unsupported_shapes_fail() {
    let err = condition!(|p| p.first_name.len() > 3).compile().unwrap_err();
    assert!(matches!(err, Error::UnsupportedExpressionShape { .. }));

    let err = condition!(|p| p.first_name.is_empty()).compile().unwrap_err();
    assert!(matches!(err, Error::UnsupportedExpressionShape { .. }));

    // both sides are properties
    let err = condition!(|p| p.first_name == p.last_name).compile().unwrap_err();
    assert!(matches!(err, Error::UnsupportedExpressionShape { .. }));

    // unsupported node deep inside an otherwise valid tree
    let err = condition!(|p| p.is_active && (p.id == 1_i64 || p.id + 1 == 3)).compile().unwrap_err();
    assert!(matches!(err, Error::UnsupportedExpressionShape { .. }));
}
