//! JSON operation lists.
//!
//! The input is an array of tagged objects:
//!
//! ```json
//! [
//!   {"op": "put", "id": ":user/alice", "doc": {"name": "Alice"}, "valid_time": 1700000000000},
//!   {"op": "delete", "id": ":user/bob"},
//!   {"op": "match", "id": ":user/carol", "expected": null},
//!   {"op": "cas", "id": ":user/alice", "old": {"name": "Alice"}, "new": {"name": "Al"}},
//!   {"op": "evict", "id": 42},
//!   {"op": "fn", "id": ":fn/incr", "args": [":user/alice", 1]}
//! ]
//! ```
//!
//! Ids are integers, `{"uuid": "..."}`, keywords written with a leading
//! colon, or plain strings. Inside documents and arguments a string with a
//! leading colon is likewise a keyword. Floats are rejected.

use docingest_codec::Value;
use docingest_core::{Document, DocumentId, Operation, Timestamp};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors reading an operation list.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The file could not be read.
    #[error("cannot read operations: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON is malformed or does not describe operations.
    #[error("invalid operation list: {0}")]
    Json(#[from] serde_json::Error),

    /// A number is not an `i64`.
    #[error("{path}: only integers are supported, got {number}")]
    NonInteger {
        /// Location of the number.
        path: String,
        /// The number as written.
        number: String,
    },

    /// An id is not one of the accepted shapes.
    #[error("{path}: invalid id {id}")]
    InvalidId {
        /// Location of the id.
        path: String,
        /// The id as written.
        id: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OpSpec {
    Put {
        id: Json,
        #[serde(default)]
        doc: Map<String, Json>,
        valid_time: Option<i64>,
        end_valid_time: Option<i64>,
    },
    Delete {
        id: Json,
        valid_time: Option<i64>,
        end_valid_time: Option<i64>,
    },
    Match {
        id: Json,
        expected: Option<Map<String, Json>>,
        valid_time: Option<i64>,
    },
    Cas {
        id: Json,
        old: Option<Map<String, Json>>,
        new: Map<String, Json>,
        valid_time: Option<i64>,
    },
    Evict {
        id: Json,
    },
    Fn {
        id: Json,
        #[serde(default)]
        args: Vec<Json>,
    },
}

/// Reads an operation list from `path`, or stdin for `-`.
pub fn read_operations(path: &Path) -> Result<Vec<Operation>, OpsError> {
    let mut text = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        text = std::fs::read_to_string(path)?;
    }
    parse_operations(&text)
}

/// Parses an operation list.
pub fn parse_operations(text: &str) -> Result<Vec<Operation>, OpsError> {
    let specs: Vec<OpSpec> = serde_json::from_str(text)?;
    specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| to_operation(spec, &format!("[{i}]")))
        .collect()
}

fn to_operation(spec: OpSpec, path: &str) -> Result<Operation, OpsError> {
    let ts = |t: Option<i64>| t.map(Timestamp::from_millis);
    Ok(match spec {
        OpSpec::Put {
            id,
            doc,
            valid_time,
            end_valid_time,
        } => {
            let id = to_id(&id, path)?;
            Operation::Put {
                doc: to_document(id, doc, &format!("{path}.doc"))?,
                valid_time: ts(valid_time),
                end_valid_time: ts(end_valid_time),
            }
        }
        OpSpec::Delete {
            id,
            valid_time,
            end_valid_time,
        } => Operation::Delete {
            id: to_id(&id, path)?,
            valid_time: ts(valid_time),
            end_valid_time: ts(end_valid_time),
        },
        OpSpec::Match {
            id,
            expected,
            valid_time,
        } => {
            let id = to_id(&id, path)?;
            let expected = expected
                .map(|doc| to_document(id.clone(), doc, &format!("{path}.expected")))
                .transpose()?;
            Operation::Match {
                id,
                expected,
                valid_time: ts(valid_time),
            }
        }
        OpSpec::Cas {
            id,
            old,
            new,
            valid_time,
        } => {
            let id = to_id(&id, path)?;
            let old = old
                .map(|doc| to_document(id.clone(), doc, &format!("{path}.old")))
                .transpose()?;
            Operation::Cas {
                old,
                new: to_document(id, new, &format!("{path}.new"))?,
                valid_time: ts(valid_time),
            }
        }
        OpSpec::Evict { id } => Operation::evict(to_id(&id, path)?),
        OpSpec::Fn { id, args } => {
            let args = args
                .iter()
                .enumerate()
                .map(|(i, a)| to_value(a, &format!("{path}.args[{i}]")))
                .collect::<Result<_, _>>()?;
            Operation::call(to_id(&id, path)?, args)
        }
    })
}

fn to_id(json: &Json, path: &str) -> Result<DocumentId, OpsError> {
    let invalid = || OpsError::InvalidId {
        path: format!("{path}.id"),
        id: json.to_string(),
    };
    match json {
        Json::String(s) => Ok(match s.strip_prefix(':') {
            Some(name) => DocumentId::keyword(name),
            None => DocumentId::text(s.as_str()),
        }),
        Json::Number(n) => n.as_i64().map(DocumentId::Integer).ok_or_else(invalid),
        Json::Object(obj) if obj.len() == 1 => obj
            .get("uuid")
            .and_then(Json::as_str)
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(DocumentId::Uuid)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn to_document(id: DocumentId, fields: Map<String, Json>, path: &str) -> Result<Document, OpsError> {
    fields.iter().try_fold(Document::new(id), |doc, (k, v)| {
        Ok(doc.with(k.as_str(), to_value(v, &format!("{path}.{k}"))?))
    })
}

fn to_value(json: &Json, path: &str) -> Result<Value, OpsError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Integer(n.as_i64().ok_or_else(|| OpsError::NonInteger {
            path: path.to_string(),
            number: n.to_string(),
        })?),
        Json::String(s) => match s.strip_prefix(':') {
            Some(name) => Value::keyword(name),
            None => Value::Text(s.clone()),
        },
        Json::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| to_value(v, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(obj) => Value::map(
            obj.iter()
                .map(|(k, v)| Ok::<_, OpsError>((Value::Text(k.clone()), to_value(v, &format!("{path}.{k}"))?)))
                .collect::<Result<_, OpsError>>()?,
        ),
    })
}
