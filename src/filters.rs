//! Filter predicates and their serialization into the GDC filter grammar.
//!
//! Every field is an `in` predicate over a list of values and all fields are
//! combined under a single top-level `and`:
//!
//! ```json
//! {"op": "and", "content": [
//!     {"op": "in", "content": {"field": "cases.disease_type", "value": ["..."]}}
//! ]}
//! ```

use serde_json::{Value, json};

/// One or more values for a field. A scalar becomes a singleton list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterValue(Vec<Value>);

impl FilterValue {
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

macro_rules! scalar_filter_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    Self(vec![Value::from(value)])
                }
            }
        )*
    };
}

scalar_filter_value!(&str, String, i64, u64, i32, u32, f64, bool);

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        Self(vec![Value::from(value.as_str())])
    }
}

impl<T: Into<Value>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for FilterValue {
    fn from(values: &[T]) -> Self {
        Self(values.iter().cloned().map(Into::into).collect())
    }
}

/// Field name to value list, kept in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    entries: Vec<(String, FilterValue)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field`, replacing any previous values for it.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn extend<I, K, V>(&mut self, predicates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        for (field, value) in predicates {
            self.insert(field, value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    /// Builds the nested `and`/`in` structure sent as `filters`.
    pub fn to_query_filters(&self) -> Value {
        let content = self
            .entries
            .iter()
            .map(|(field, value)| {
                json!({
                    "op": "in",
                    "content": { "field": field, "value": value.values() }
                })
            })
            .collect::<Vec<_>>();
        json!({ "op": "and", "content": content })
    }
}
