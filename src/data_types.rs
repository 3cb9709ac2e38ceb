use serde_json::{Map, Number, Value};

/// A row as returned to clients: column name to JSON value, in column order
pub type Record = Map<String, Value>;

/// A single value in a row payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Number(Number),
    Text(String),
    // Arrays and objects. Arrays bound to `[]` columns become array literals,
    // everything else is bound as JSON text.
    Structured(Value),
}

impl FieldValue {
    pub fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::Text(t) if t.is_empty())
    }

    /// Render as a text parameter; the statement casts it to the column's type.
    pub fn to_parameter(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Text(t) => Some(t.clone()),
            FieldValue::Structured(v) => Some(v.to_string()),
        }
    }

    /// Like `to_parameter`, but a JSON array headed for an array column (`text[]`,
    /// `integer[]`, ...) is rendered as a Postgres array literal instead of JSON text.
    pub fn to_parameter_for(&self, sql_type: &str) -> Option<String> {
        match self {
            FieldValue::Structured(Value::Array(items)) if sql_type.ends_with("[]") => {
                Some(array_literal(items))
            }
            other => other.to_parameter(),
        }
    }
}

/// `["a", null, ["b"]]` -> `{"a",NULL,{"b"}}`
fn array_literal(items: &[Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Array(nested) => array_literal(nested),
            Value::String(s) => quote_array_element(s),
            // Objects go in as JSON text, e.g. for jsonb[]
            other => quote_array_element(&other.to_string()),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

fn quote_array_element(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Structured(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Row payload, keeping the order in which the client listed the fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap(Vec<(String, FieldValue)>);

impl FieldMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every field whose value is the empty string. This also drops legitimate
    /// empty strings: the form UI can't tell "left blank" apart from "set to empty".
    pub fn without_empty(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(_, v)| !v.is_empty_text())
                .collect(),
        )
    }

    /// Drop a field by exact name
    pub fn without(self, name: &str) -> Self {
        Self(self.0.into_iter().filter(|(k, _)| k != name).collect())
    }
}

impl From<Map<String, Value>> for FieldMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
