use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Which string format a temporal value is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    Time,
    /// Date-time carrying an offset (RFC 3339)
    DateTime,
    /// Date-time without an offset
    LocalDateTime,
}

impl TemporalKind {
    pub fn format(&self) -> &'static str {
        match self {
            TemporalKind::Date => "date",
            TemporalKind::Time => "time",
            TemporalKind::DateTime | TemporalKind::LocalDateTime => "date-time",
        }
    }
}

/// Semantic shape of a type, as far as JSON Schema is concerned
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Boolean,
    /// Whole numbers the target type can hold, bounds inclusive
    Integer {
        min: i128,
        max: i128,
    },
    Number,
    String,
    Char,
    Enum {
        name: &'static str,
        variants: &'static [&'static str],
    },
    Temporal(TemporalKind),
    Array(Box<TypeDescriptor>),
    /// String-keyed map; the box describes the values
    Map(Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
    Record(RecordDescriptor),
    /// A raw type the codec has no JSON mapping for
    Unsupported(&'static str),
}

impl TypeDescriptor {
    /// An integer with no range beyond what JSON numbers carry
    pub const ANY_INTEGER: TypeDescriptor = TypeDescriptor::Integer {
        min: i128::MIN,
        max: i128::MAX,
    };

    pub fn array(items: TypeDescriptor) -> Self {
        Self::Array(Box::new(items))
    }

    pub fn map(values: TypeDescriptor) -> Self {
        Self::Map(Box::new(values))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Short name used in error messages
    pub fn kind_name(&self) -> String {
        match self {
            Self::Boolean => "boolean".to_string(),
            Self::Integer { .. } => "integer".to_string(),
            Self::Number => "number".to_string(),
            Self::String => "string".to_string(),
            Self::Char => "character".to_string(),
            Self::Enum { name, .. } => format!("enum {}", name),
            Self::Temporal(kind) => kind.format().to_string(),
            Self::Array(_) => "array".to_string(),
            Self::Map(_) => "map".to_string(),
            Self::Optional(inner) => format!("optional {}", inner.kind_name()),
            Self::Record(record) => record.name.to_string(),
            Self::Unsupported(name) => (*name).to_string(),
        }
    }
}

/// A composite type. Fields are produced lazily so that self-referential
/// records can describe themselves without recursing forever.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub name: &'static str,
    pub fields: fn() -> Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(name: &'static str, fields: fn() -> Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub descriptor: TypeDescriptor,
    pub description: Option<&'static str>,
}

impl FieldDescriptor {
    pub fn of<T: Described>(name: &'static str) -> Self {
        Self {
            name,
            descriptor: T::descriptor(),
            description: None,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Types that can state their own JSON shape.
///
/// Records implement this by hand:
///
/// ```rust
/// use ai_facade::schema::{Described, FieldDescriptor, RecordDescriptor, TypeDescriptor};
///
/// struct Person {
///     name: String,
///     age: Option<u32>,
/// }
///
/// impl Described for Person {
///     fn descriptor() -> TypeDescriptor {
///         TypeDescriptor::Record(RecordDescriptor::new("Person", || {
///             vec![
///                 FieldDescriptor::of::<String>("name"),
///                 FieldDescriptor::of::<Option<u32>>("age"),
///             ]
///         }))
///     }
/// }
/// ```
pub trait Described {
    fn descriptor() -> TypeDescriptor;
}

macro_rules! describe_as {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Described for $ty {
                fn descriptor() -> TypeDescriptor {
                    $kind
                }
            }
        )+
    };
}

macro_rules! describe_integer {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Described for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::Integer {
                        min: i128::try_from(<$ty>::MIN).unwrap_or(i128::MIN),
                        max: i128::try_from(<$ty>::MAX).unwrap_or(i128::MAX),
                    }
                }
            }
        )+
    };
}

describe_as!(TypeDescriptor::Boolean => bool);
describe_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_as!(TypeDescriptor::Number => f32, f64);
describe_as!(TypeDescriptor::String => String);
describe_as!(TypeDescriptor::Char => char);
describe_as!(TypeDescriptor::Temporal(TemporalKind::Date) => NaiveDate);
describe_as!(TypeDescriptor::Temporal(TemporalKind::Time) => NaiveTime);
describe_as!(TypeDescriptor::Temporal(TemporalKind::LocalDateTime) => NaiveDateTime);
describe_as!(TypeDescriptor::Temporal(TemporalKind::DateTime) => DateTime<Utc>);
describe_as!(TypeDescriptor::Unsupported("serde_json::Value") => serde_json::Value);

impl<T: Described> Described for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }
}

impl<T: Described> Described for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }
}

impl<T: Described> Described for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor())
    }
}

impl<T: Described> Described for VecDeque<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor())
    }
}

impl<T: Described> Described for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor())
    }
}

impl<T: Described, S> Described for HashMap<String, T, S> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }
}

impl<T: Described> Described for BTreeMap<String, T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }
}
