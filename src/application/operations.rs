//! The five post operations: stable wire names, descriptions and input
//! schemas advertised to the model, and the validation gate applied both
//! before dispatch and at change-tracking ingestion.

use crate::domain::content::{DeleteReceipt, Post, PostList, PostStatus};
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetPost,
    ListPosts,
    CreatePost,
    UpdatePost,
    DeletePost,
}

pub const ALL_OPERATIONS: [Operation; 5] = [
    Operation::GetPost,
    Operation::ListPosts,
    Operation::CreatePost,
    Operation::UpdatePost,
    Operation::DeletePost,
];

impl Operation {
    /// Wire name; the join key between local definitions and the remote
    /// registry. Must match the remote exactly.
    pub fn name(self) -> &'static str {
        match self {
            Operation::GetPost => "get-post",
            Operation::ListPosts => "list-posts",
            Operation::CreatePost => "create-post",
            Operation::UpdatePost => "update-post",
            Operation::DeletePost => "delete-post",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get-post" => Some(Operation::GetPost),
            "list-posts" => Some(Operation::ListPosts),
            "create-post" => Some(Operation::CreatePost),
            "update-post" => Some(Operation::UpdatePost),
            "delete-post" => Some(Operation::DeletePost),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::GetPost => "Fetch a single post by its numeric id.",
            Operation::ListPosts => "List posts with optional pagination (per_page, page).",
            Operation::CreatePost => {
                "Create a post from a title and content; status defaults to draft."
            }
            Operation::UpdatePost => {
                "Update the title, content or status of an existing post by id."
            }
            Operation::DeletePost => {
                "Delete a post by id; set force to skip the trash and remove permanently."
            }
        }
    }

    /// JSON schema advertised to the model alongside the description.
    pub fn input_schema(self) -> Value {
        let status = json!({
            "type": "string",
            "enum": ["publish", "draft", "pending", "private"],
        });
        match self {
            Operation::GetPost => json!({
                "type": "object",
                "properties": { "id": { "type": "integer" } },
                "required": ["id"],
            }),
            Operation::ListPosts => json!({
                "type": "object",
                "properties": {
                    "per_page": { "type": "integer", "default": 10 },
                    "page": { "type": "integer", "default": 1 },
                },
            }),
            Operation::CreatePost => json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "content": { "type": "string" },
                    "status": status,
                },
                "required": ["title", "content"],
            }),
            Operation::UpdatePost => json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "title": { "type": "string" },
                    "content": { "type": "string" },
                    "status": status,
                },
                "required": ["id"],
            }),
            Operation::DeletePost => json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "force": { "type": "boolean", "default": false },
                },
                "required": ["id"],
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("{operation}: arguments must be a JSON object")]
    NotAnObject { operation: &'static str },
    #[error("{operation}: missing required field '{field}'")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
    #[error("{operation}: field '{field}' must be {expected}")]
    InvalidField {
        operation: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    #[error("{operation}: unexpected field '{field}'")]
    UnexpectedField {
        operation: &'static str,
        field: String,
    },
}

/// Validates `arguments` against the operation's declared shape and returns a
/// normalized object with declared defaults applied. The remote is never
/// called with input that has not passed through here.
pub fn validate_arguments(
    operation: Operation,
    arguments: &Value,
) -> Result<Value, ValidationError> {
    let name = operation.name();
    let empty = Map::new();
    let fields = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(ValidationError::NotAnObject { operation: name }),
    };

    let allowed: &[&str] = match operation {
        Operation::GetPost => &["id"],
        Operation::ListPosts => &["per_page", "page"],
        Operation::CreatePost => &["title", "content", "status"],
        Operation::UpdatePost => &["id", "title", "content", "status"],
        Operation::DeletePost => &["id", "force"],
    };
    for key in fields.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ValidationError::UnexpectedField {
                operation: name,
                field: key.clone(),
            });
        }
    }

    let mut normalized = Map::new();
    match operation {
        Operation::GetPost => {
            normalized.insert("id".into(), require_integer(name, fields, "id")?);
        }
        Operation::ListPosts => {
            normalized.insert(
                "per_page".into(),
                optional_integer(name, fields, "per_page")?.unwrap_or_else(|| json!(10)),
            );
            normalized.insert(
                "page".into(),
                optional_integer(name, fields, "page")?.unwrap_or_else(|| json!(1)),
            );
        }
        Operation::CreatePost => {
            normalized.insert("title".into(), require_string(name, fields, "title")?);
            normalized.insert("content".into(), require_string(name, fields, "content")?);
            normalized.insert(
                "status".into(),
                optional_status(name, fields)?.unwrap_or_else(|| json!(PostStatus::Draft.as_str())),
            );
        }
        Operation::UpdatePost => {
            normalized.insert("id".into(), require_integer(name, fields, "id")?);
            if let Some(title) = optional_string(name, fields, "title")? {
                normalized.insert("title".into(), title);
            }
            if let Some(content) = optional_string(name, fields, "content")? {
                normalized.insert("content".into(), content);
            }
            if let Some(status) = optional_status(name, fields)? {
                normalized.insert("status".into(), status);
            }
        }
        Operation::DeletePost => {
            normalized.insert("id".into(), require_integer(name, fields, "id")?);
            normalized.insert(
                "force".into(),
                optional_bool(name, fields, "force")?.unwrap_or_else(|| json!(false)),
            );
        }
    }

    Ok(Value::Object(normalized))
}

/// Checks a remote reply against the operation's declared output shape.
/// Returns `None` for anything unrecognized; malformed results are dropped
/// rather than stored.
pub fn validate_result(operation: Operation, result: &Value) -> Option<Value> {
    let recognized = match operation {
        Operation::GetPost | Operation::CreatePost | Operation::UpdatePost => {
            serde_json::from_value::<Post>(result.clone()).is_ok()
        }
        Operation::ListPosts => serde_json::from_value::<PostList>(result.clone()).is_ok(),
        Operation::DeletePost => serde_json::from_value::<DeleteReceipt>(result.clone()).is_ok(),
    };
    recognized.then(|| result.clone())
}

fn require_integer(
    operation: &'static str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Value, ValidationError> {
    match fields.get(field) {
        Some(value) => integer_value(operation, field, value),
        None => Err(ValidationError::MissingField { operation, field }),
    }
}

fn optional_integer(
    operation: &'static str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Value>, ValidationError> {
    match fields.get(field) {
        Some(value) => integer_value(operation, field, value).map(Some),
        None => Ok(None),
    }
}

fn integer_value(
    operation: &'static str,
    field: &'static str,
    value: &Value,
) -> Result<Value, ValidationError> {
    value
        .as_i64()
        .map(|number| json!(number))
        .ok_or(ValidationError::InvalidField {
            operation,
            field,
            expected: "an integer",
        })
}

fn require_string(
    operation: &'static str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Value, ValidationError> {
    match fields.get(field) {
        Some(value) => string_value(operation, field, value),
        None => Err(ValidationError::MissingField { operation, field }),
    }
}

fn optional_string(
    operation: &'static str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Value>, ValidationError> {
    match fields.get(field) {
        Some(value) => string_value(operation, field, value).map(Some),
        None => Ok(None),
    }
}

fn string_value(
    operation: &'static str,
    field: &'static str,
    value: &Value,
) -> Result<Value, ValidationError> {
    value
        .as_str()
        .map(|text| json!(text))
        .ok_or(ValidationError::InvalidField {
            operation,
            field,
            expected: "a string",
        })
}

fn optional_status(
    operation: &'static str,
    fields: &Map<String, Value>,
) -> Result<Option<Value>, ValidationError> {
    match fields.get("status") {
        None => Ok(None),
        Some(value) => {
            let text = value.as_str().ok_or(ValidationError::InvalidField {
                operation,
                field: "status",
                expected: "one of publish, draft, pending, private",
            })?;
            let status = PostStatus::parse(text).ok_or(ValidationError::InvalidField {
                operation,
                field: "status",
                expected: "one of publish, draft, pending, private",
            })?;
            Ok(Some(json!(status.as_str())))
        }
    }
}

fn optional_bool(
    operation: &'static str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Value>, ValidationError> {
    match fields.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(|flag| Some(json!(flag)))
            .ok_or(ValidationError::InvalidField {
                operation,
                field,
                expected: "a boolean",
            }),
    }
}
