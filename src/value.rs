use std::{collections::BTreeMap, fmt, sync::Arc};

/// Error type a [`Lambda`] may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type LambdaResult = Result<String, BoxError>;

/// The coarse type of a [`Value`], used when reporting conversion failures.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    List,
    Map,
    Lambda,
}

/// How a section treats a value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Absent, `false`, zero, `""` or `[]`.
    Falsey,
    /// Anything else that is not a list or a lambda, maps included.
    Scalar,
    /// A non-empty list; the section body renders once per item.
    Sequence,
    /// A lambda; the section hands its raw body to the closure.
    Renderable,
}

/// A callable value.
///
/// Sections invoke it with their unparsed body, variable tags with an empty
/// string. The returned text is parsed as a template and rendered in place.
#[derive(Clone)]
pub struct Lambda(Arc<dyn Fn(&str) -> LambdaResult + Send + Sync>);

impl Lambda {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LambdaResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, raw: &str) -> LambdaResult {
        (self.0)(raw)
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lambda(..)")
    }
}

impl PartialEq for Lambda {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Runtime data a template renders against.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Lambda(Lambda),
}

impl Value {
    /// Builds a map value from `(key, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn lambda<F>(f: F) -> Self
    where
        F: Fn(&str) -> LambdaResult + Send + Sync + 'static,
    {
        Self::Lambda(Lambda::new(f))
    }

    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Int(_) | Self::Float(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Lambda(_) => ValueKind::Lambda,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Null | Self::Bool(false) | Self::Int(0) => Shape::Falsey,
            Self::Float(f) if *f == 0.0 => Shape::Falsey,
            Self::String(s) if s.is_empty() => Shape::Falsey,
            Self::List(items) if items.is_empty() => Shape::Falsey,
            Self::List(_) => Shape::Sequence,
            Self::Lambda(_) => Shape::Renderable,
            Self::Bool(true)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Map(_) => Shape::Scalar,
        }
    }

    /// The string form of a scalar, or `None` for lists, maps and lambdas.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => Some(String::new()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Map(_) | Self::Lambda(_) => None,
        }
    }

    /// Looks up a direct member of a map.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries.get(key),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::List(_)
            | Self::Lambda(_) => None,
        }
    }

    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(entries) => Some(entries),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::List(_)
            | Self::Lambda(_) => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Lambda> for Value {
    fn from(value: Lambda) -> Self {
        Self::Lambda(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(entries: BTreeMap<String, Self>) -> Self {
        Self::Map(entries)
    }
}

impl<K: Into<String>> FromIterator<(K, Self)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Self)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl FromIterator<Self> for Value {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::collections::BTreeMap;

    use serde::{
        Deserialize, Deserializer, Serialize, Serializer,
        de::{MapAccess, SeqAccess, Visitor},
        ser::{SerializeMap, SerializeSeq},
    };

    use super::Value;

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                // Lambdas carry no data.
                Self::Null | Self::Lambda(_) => serializer.serialize_unit(),
                Self::Bool(b) => serializer.serialize_bool(*b),
                Self::Int(i) => serializer.serialize_i64(*i),
                Self::Float(f) => serializer.serialize_f64(*f),
                Self::String(s) => serializer.serialize_str(s),
                Self::List(items) => {
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Self::Map(entries) => {
                    let mut map = serializer.serialize_map(Some(entries.len()))?;
                    for (key, value) in entries {
                        map.serialize_entry(key, value)?;
                    }
                    map.end()
                }
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("any template value")
        }

        fn visit_unit<E>(self) -> Result<Value, E> {
            Ok(Value::Null)
        }

        fn visit_none<E>(self) -> Result<Value, E> {
            Ok(Value::Null)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
            Value::deserialize(deserializer)
        }

        fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
            Ok(Value::Bool(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
            Ok(Value::Int(v))
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
            // Out of range integers degrade to floats rather than failing.
            Ok(i64::try_from(v).map_or_else(|_| Value::Float(v as f64), Value::Int))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
            Ok(Value::Float(v))
        }

        fn visit_str<E>(self, v: &str) -> Result<Value, E> {
            Ok(Value::String(v.to_owned()))
        }

        fn visit_string<E>(self, v: String) -> Result<Value, E> {
            Ok(Value::String(v))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(item) = seq.next_element()? {
                items.push(item);
            }
            Ok(Value::List(items))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
            let mut entries = BTreeMap::new();
            while let Some((key, value)) = map.next_entry::<String, Value>()? {
                entries.insert(key, value);
            }
            Ok(Value::Map(entries))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }
}
