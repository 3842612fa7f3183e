//! # Persistence Field Conversion
//!
//! The persistence layer describes table columns with [`FieldDescriptor`]s.
//! This module maps them onto [`Parameter`]s so that model-backed endpoints
//! can derive their parameter maps from the model instead of restating
//! every column by hand.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::parameter::Parameter;

/// A typed column as supplied by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Column type as the persistence layer spells it (`varchar`, `bigint`, ...).
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Maximum character length for string columns.
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: false,
            primary_key: false,
            default: None,
            max_length: None,
            comment: None,
        }
    }

    /// Convert the column into a parameter.
    ///
    /// Primary keys are marked read-only. A column that is neither nullable
    /// nor defaulted is marked required.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownColumnType`] when the column type has no mapping.
    pub fn to_parameter(&self) -> Result<Parameter, CoreError> {
        let column = self.column_type.to_ascii_lowercase();
        // Strip a size suffix such as `varchar(255)` or `decimal(10,2)`.
        let base = column.split('(').next().unwrap_or(column.as_str()).trim();

        let mut param = match base {
            "tinyint" | "smallint" | "int" | "integer" | "mediumint" | "serial" => {
                Parameter::integer().format("int32")
            }
            "bigint" | "bigserial" => Parameter::integer().format("int64"),
            "float" | "real" => Parameter::number().format("float"),
            "double" | "decimal" | "numeric" => Parameter::number().format("double"),
            "bool" | "boolean" => Parameter::boolean(),
            "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" | "enum" => {
                Parameter::string()
            }
            "date" => Parameter::string().format("date"),
            "datetime" | "timestamp" | "timestamptz" => Parameter::string().format("date-time"),
            "time" => Parameter::string().format("time"),
            "uuid" => Parameter::string().format("uuid"),
            "binary" | "blob" | "bytea" => Parameter::string().format("byte"),
            "json" | "jsonb" => Parameter::object(),
            _ => {
                return Err(CoreError::UnknownColumnType {
                    field: self.name.clone(),
                    column_type: self.column_type.clone(),
                })
            }
        };

        if let Some(max) = self.max_length {
            param = param.max_length(max);
        }
        if self.nullable {
            param = param.nullable();
        }
        if let Some(default) = &self.default {
            param = param.default(default.clone());
        }
        if self.primary_key {
            param = param.read_only();
        }
        if !self.nullable && self.default.is_none() && !self.primary_key {
            param = param.required();
        }
        if let Some(comment) = &self.comment {
            param = param.description(comment.clone());
        }
        Ok(param)
    }
}
