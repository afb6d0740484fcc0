//! Documents and the ids that name them.

use crate::error::EncodingFailure;
use docingest_codec::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Field under which a document carries its own id.
pub const ID_FIELD: &str = "db/id";

/// Field-name prefixes owned by the log.
pub const RESERVED_PREFIXES: [&str; 2] = ["db/", "tx/"];

/// Identity of an entity in the document store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentId {
    /// Namespaced keyword, e.g. `user/alice`.
    Keyword(String),
    /// Free-form string id.
    Text(String),
    /// UUID id.
    Uuid(Uuid),
    /// Integer id.
    Integer(i64),
}

impl DocumentId {
    /// Creates a keyword id.
    pub fn keyword(name: impl Into<String>) -> Self {
        Self::Keyword(name.into())
    }

    /// Creates a string id.
    pub fn text(id: impl Into<String>) -> Self {
        Self::Text(id.into())
    }

    /// Returns true for keyword ids.
    #[must_use]
    pub fn is_keyword(&self) -> bool {
        matches!(self, Self::Keyword(_))
    }

    /// Checks the id is well formed.
    pub(crate) fn validate(&self) -> Result<(), EncodingFailure> {
        match self {
            Self::Keyword(name) if name.is_empty() => Err(EncodingFailure::EmptyId),
            Self::Keyword(name) if name.chars().any(char::is_whitespace) => {
                Err(EncodingFailure::MalformedKeyword(name.clone()))
            }
            Self::Text(id) if id.is_empty() => Err(EncodingFailure::EmptyId),
            _ => Ok(()),
        }
    }

    /// The canonical value of this id.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Keyword(name) => Value::keyword(name.as_str()),
            Self::Text(id) => Value::Text(id.clone()),
            Self::Uuid(id) => Value::uuid(*id.as_bytes()),
            Self::Integer(n) => Value::Integer(*n),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(name) => write!(f, ":{name}"),
            Self::Text(id) => write!(f, "{id:?}"),
            Self::Uuid(id) => write!(f, "#uuid {id}"),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

/// A document: an id plus named fields.
///
/// Field order is irrelevant; the canonical form sorts keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document for `id`.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Returns the document id.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Looks up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Iterates over the fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rejects malformed ids and fields in reserved namespaces.
    pub(crate) fn validate(&self) -> Result<(), EncodingFailure> {
        self.id.validate()?;
        match self
            .fields
            .keys()
            .find(|k| RESERVED_PREFIXES.iter().any(|p| k.starts_with(p)))
        {
            Some(field) => Err(EncodingFailure::ReservedField(field.clone())),
            None => Ok(()),
        }
    }

    /// The document as a map value with its id under [`ID_FIELD`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut pairs = Vec::with_capacity(self.fields.len() + 1);
        pairs.push((Value::Text(ID_FIELD.to_string()), self.id.to_value()));
        pairs.extend(
            self.fields
                .iter()
                .map(|(k, v)| (Value::Text(k.clone()), v.clone())),
        );
        Value::map(pairs)
    }
}
