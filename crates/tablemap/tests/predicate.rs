//! Integration tests for predicate rendering through the public builders.

#![allow(missing_docs)]

mod common;

use common::{Car, Person, assert_sql_contains, configure};
use tablemap::dialect::{MySql, Postgres};
use tablemap::{Configuration, Error, Predicate, Sort, Value};

fn where_clause(config: &Configuration, predicate: Predicate) -> String {
    let sql = config.select::<Person>().r#where(predicate).build().unwrap().sql;
    sql.split_once(" WHERE ").map(|(_, tail)| tail.to_string()).unwrap_or_default()
}

#[test]
fn nested_groups_are_parenthesized() {
    let config = Configuration::default();
    let predicate = Predicate::or(vec![
        Predicate::eq("first_name", "Foo"),
        Predicate::and(vec![Predicate::eq("last_name", "Bar"), Predicate::eq("is_active", true)]),
    ]);

    assert_eq!(
        where_clause(&config, predicate),
        "([Person].[first_name] = @P1 OR ([Person].[last_name] = @P2 AND [Person].[is_active] = @P3))"
    );
}

#[test]
fn single_child_groups_are_not_wrapped() {
    let config = Configuration::default();
    let predicate = Predicate::and(vec![Predicate::eq("id", 1_i64)]);
    assert_eq!(where_clause(&config, predicate), "[Person].[id] = @P1");
}

#[test]
fn nested_single_child_groups_keep_parentheses() {
    let config = Configuration::default();
    let predicate = Predicate::and(vec![Predicate::or(vec![Predicate::eq("id", 1_i64)])]);
    assert_eq!(where_clause(&config, predicate), "([Person].[id] = @P1)");
}

#[test]
fn empty_groups_and_lists() {
    let config = Configuration::default();
    assert_eq!(where_clause(&config, Predicate::and(vec![])), "(1=1)");
    assert_eq!(where_clause(&config, Predicate::or(vec![])), "(1=0)");
    assert_eq!(where_clause(&config, Predicate::r#in("id", Vec::<i64>::new())), "(1=0)");
    assert_eq!(where_clause(&config, Predicate::not_in("id", Vec::<i64>::new())), "(1=1)");
}

#[test]
fn negated_forms() {
    let config = Configuration::default();
    let predicate = Predicate::and(vec![
        Predicate::ne("first_name", "Foo"),
        Predicate::not_like("last_name", "Ba%"),
        !Predicate::gt("id", 5_i64),
        Predicate::is_not_null("date_created"),
        Predicate::not_between("id", 1_i64, 3_i64),
    ]);

    assert_eq!(
        where_clause(&config, predicate),
        "([Person].[first_name] <> @P1 AND [Person].[last_name] NOT LIKE @P2 \
         AND NOT ([Person].[id] > @P3) AND [Person].[date_created] IS NOT NULL \
         AND [Person].[id] NOT BETWEEN @P4 AND @P5)"
    );
}

#[test]
fn negated_group() {
    let config = Configuration::default();
    let predicate = !Predicate::or(vec![Predicate::eq("id", 1_i64), Predicate::eq("id", 2_i64)]);
    assert_eq!(where_clause(&config, predicate), "NOT ([Person].[id] = @P1 OR [Person].[id] = @P2)");
}

#[test]
fn parameters_follow_textual_order() {
    let config = Configuration::builder().dialect(Postgres).build();
    let query = config
        .select::<Person>()
        .r#where(Predicate::and(vec![
            Predicate::r#in("id", [4_i64, 5, 6]),
            Predicate::between("id", 1_i64, 10_i64),
        ]))
        .build()
        .unwrap();

    assert_sql_contains(&query.sql, &["WHERE (Person.id IN ($1, $2, $3) AND Person.id BETWEEN $4 AND $5)"]);
    assert_eq!(
        query.values(),
        vec![
            Value::BigInt(Some(4)),
            Value::BigInt(Some(5)),
            Value::BigInt(Some(6)),
            Value::BigInt(Some(1)),
            Value::BigInt(Some(10)),
        ]
    );
}

#[test]
fn match_object_uses_mapped_columns() {
    let config = configure(Configuration::builder().dialect(MySql));
    let query = config
        .select::<Car>()
        .r#where(Predicate::matching([("car_id", Value::from(9)), ("name", Value::from("Ford"))]))
        .build()
        .unwrap();

    assert_eq!(
        query.sql,
        "SELECT `Car`.`id`, `Car`.`name`, `Car`.`CarId` AS `car_id`, `Car`.`is_active` FROM `Car` \
         WHERE (`Car`.`CarId` = ? AND `Car`.`name` = ?)"
    );
    assert_eq!(query.values(), vec![Value::Int(Some(9)), Value::from("Ford")]);
}

#[test]
fn unmapped_property_is_rejected() {
    let config = Configuration::default();
    let err = config.select::<Person>().r#where(Predicate::eq("nickname", "x")).build().unwrap_err();
    assert_eq!(
        err,
        Error::UnmappedProperty {
            entity: "Person".to_string(),
            property: "nickname".to_string(),
        }
    );

    let err = config.select::<Person>().order_by(Sort::asc("nickname")).build().unwrap_err();
    assert!(matches!(err, Error::UnmappedProperty { .. }));
}

#[test]
fn null_only_compares_with_equality() {
    let config = Configuration::default();
    let err = config
        .select::<Person>()
        .r#where(Predicate::gt("date_created", Value::String(None)))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPredicate { .. }));
}
