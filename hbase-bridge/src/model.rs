//! Requests passed to the Java bridge and the JSON documents it returns.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// A bounded table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub table: String,
    pub start_row: Option<String>,
    pub end_row: Option<String>,
    pub limit: i32,
    pub prefix: Option<String>,
}

impl ScanRequest {
    pub fn new(table: impl Into<String>, limit: i32) -> Self {
        Self {
            table: table.into(),
            start_row: None,
            end_row: None,
            limit,
            prefix: None,
        }
    }

    pub fn start_row(mut self, row: impl Into<String>) -> Self {
        self.start_row = Some(row.into());
        self
    }

    pub fn end_row(mut self, row: impl Into<String>) -> Self {
        self.end_row = Some(row.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.limit <= 0 {
            return Err(BridgeError::InvalidArgument("limit must be positive"));
        }
        Ok(())
    }
}

/// Command keywords understood by the Java bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Get,
    Put,
    Delete,
}

impl CommandKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    /// Case-insensitive, as on the Java side.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A single-row command. Any field left `None` reaches Java as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub table: String,
    /// Passed through verbatim so unknown keywords get the Java side's error
    /// document rather than a local failure.
    pub command: String,
    pub row_key: Option<String>,
    pub family: Option<String>,
    pub qualifier: Option<String>,
    pub value: Option<String>,
}

impl CommandRequest {
    pub fn new(table: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            command: command.into(),
            row_key: None,
            family: None,
            qualifier: None,
            value: None,
        }
    }

    pub fn get(table: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self::new(table, CommandKind::Get.keyword()).row_key(row_key)
    }

    pub fn put(
        table: impl Into<String>,
        row_key: impl Into<String>,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(table, CommandKind::Put.keyword())
            .row_key(row_key)
            .family(family)
            .qualifier(qualifier)
            .value(value)
    }

    pub fn delete(table: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self::new(table, CommandKind::Delete.keyword()).row_key(row_key)
    }

    pub fn row_key(mut self, row_key: impl Into<String>) -> Self {
        self.row_key = Some(row_key.into());
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::parse(&self.command)
    }
}

/// family -> qualifier -> value
pub type Families = BTreeMap<String, BTreeMap<String, String>>;

/// One row as encoded by the Java bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub row: String,
    #[serde(default)]
    pub families: Families,
}

impl TableRow {
    pub fn cell(&self, family: &str, qualifier: &str) -> Option<&str> {
        self.families
            .get(family)
            .and_then(|q| q.get(qualifier))
            .map(String::as_str)
    }
}

/// Result document of `executeCommand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommandOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present for a `get` that found the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TableRow>,
}

impl CommandOutcome {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

pub fn parse_table_names(json: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_rows(json: &str) -> Result<Vec<TableRow>> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_outcome(json: &str) -> Result<CommandOutcome> {
    Ok(serde_json::from_str(json)?)
}
