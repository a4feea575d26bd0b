use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::Value;
use uuid::Uuid;

/// Declares an entity struct with an automatic `Entity` implementation.
///
/// The table name defaults to the struct name (or its plural, depending on the configured
/// default mapper). Declaring `table` (and optionally `schema`) overrides it.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "Person",
///     #[derive(Debug, Clone)]
///     pub struct Person {
///         pub person_id: i64,
///         pub person_name: String,
///         pub is_active: bool,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Code-generation arm
    (
        @impl ($($table:literal)?) ($($schema:literal)?)
        $(#[$meta:meta])*
        $vis:vis struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $struct_name {
            $(
                $(#[$field_meta])*
                $field_vis $field_name : $field_type
            ),*
        }

        impl $crate::Entity for $struct_name {
            fn descriptor() -> $crate::EntityDescriptor {
                $crate::EntityDescriptor {
                    type_name: stringify!($struct_name),
                    table: ::core::option::Option::<&'static str>::None $(.or(Some($table)))?,
                    schema: ::core::option::Option::<&'static str>::None $(.or(Some($schema)))?,
                    properties: vec![
                        $(
                            $crate::PropertyDescriptor {
                                name: stringify!($field_name),
                                kind: <$field_type as $crate::ColumnType>::KIND,
                            },
                        )*
                    ],
                }
            }

            fn values(&self) -> Vec<(&'static str, $crate::__private::Value)> {
                vec![
                    $(
                        (stringify!($field_name), ::core::clone::Clone::clone(&self.$field_name).into()),
                    )*
                ]
            }
        }
    };

    // Table and schema → forward
    (
        table = $table:literal,
        schema = $schema:literal,
        $($rest:tt)*
    ) => {
        $crate::entity! { @impl ($table) ($schema) $($rest)* }
    };

    // Table only → forward without schema
    (
        table = $table:literal,
        $($rest:tt)*
    ) => {
        $crate::entity! { @impl ($table) () $($rest)* }
    };

    // Bare struct → table resolved by the default mapper
    ($($rest:tt)*) => {
        $crate::entity! { @impl () () $($rest)* }
    };
}

/// A record type that can be mapped to a table.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: 'static {
    /// Structural description of the type's properties, used to build its class map.
    fn descriptor() -> EntityDescriptor;

    /// The record's property values, in declaration order.
    fn values(&self) -> Vec<(&'static str, Value)>;
}

/// Structural description of an entity type: what reflection would report.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Rust type name.
    pub type_name: &'static str,
    /// Explicitly declared table name.
    pub table: Option<&'static str>,
    /// Explicitly declared schema name.
    pub schema: Option<&'static str>,
    /// Declared properties, in declaration order.
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    /// Looks up a declared property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A single declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Field name.
    pub name: &'static str,
    /// Broad kind of the field's value type.
    pub kind: ValueKind,
}

/// Broad classification of a property's value type.
///
/// Only used to pick a key strategy by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Signed or unsigned integer.
    Integer,
    /// UUID / GUID.
    Uuid,
    /// Boolean flag.
    Boolean,
    /// Floating point.
    Float,
    /// Text.
    Text,
    /// Raw bytes.
    Binary,
    /// Date, time or timestamp.
    Temporal,
    /// Anything else.
    Other,
}

/// Trait for types that can be declared as entity properties.
///
/// Implemented for the standard value types; custom property types implement it to declare
/// their kind.
pub trait ColumnType {
    /// The value kind reported in the entity descriptor.
    const KIND: ValueKind;
}

macro_rules! column_type {
    ($kind:ident => $($ty:ty),+) => {
        $(
            impl ColumnType for $ty {
                const KIND: ValueKind = ValueKind::$kind;
            }
        )+
    };
}

column_type!(Integer => i8, i16, i32, i64, u8, u16, u32, u64);
column_type!(Float => f32, f64);
column_type!(Boolean => bool);
column_type!(Text => String, char);
column_type!(Binary => Vec<u8>);
column_type!(Uuid => Uuid);
column_type!(Temporal => NaiveDate, NaiveTime, NaiveDateTime, DateTime<Utc>);

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: ValueKind = T::KIND;
}

pub(crate) const fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::ChronoDateTimeLocal(None)
            | Value::ChronoDateTimeWithTimeZone(None)
            | Value::Uuid(None)
    )
}

// A GUID key holding null or the nil UUID has not been assigned yet.
pub(crate) fn is_unassigned_guid(value: &Value) -> bool {
    match value {
        Value::Uuid(Some(id)) => id.is_nil(),
        other => is_null(other),
    }
}
