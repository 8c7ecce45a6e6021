//! Messages exchanged between a [`ModuleWorker`](crate::ModuleWorker) and
//! the module host running on its thread.
//!
//! Every message is a JSON object tagged by `type`. Requests that expect a
//! reply carry a caller-assigned `messageId`, which the reply echoes back.

use crate::error::WorkerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type MessageId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    ImportModule {
        url: String,
    },
    GetExport {
        name: String,
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    CallExport {
        name: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Reply {
    ModuleRecord {
        #[serde(rename = "exportNames", default)]
        export_names: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    GetExportReply {
        #[serde(default)]
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    CallExportReply {
        #[serde(default)]
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
}

impl Request {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Request::ImportModule { .. } => None,
            Request::GetExport { message_id, .. } | Request::CallExport { message_id, .. } => {
                Some(*message_id)
            }
        }
    }
}

impl Reply {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Reply::ModuleRecord { .. } => None,
            Reply::GetExportReply { message_id, .. } | Reply::CallExportReply { message_id, .. } => {
                Some(*message_id)
            }
        }
    }

    /// Builds the reply to a value request from the host's outcome.
    pub(crate) fn get_reply(message_id: MessageId, outcome: Result<Value, WorkerError>) -> Self {
        let (value, error) = split(outcome);
        Reply::GetExportReply {
            value,
            error,
            message_id,
        }
    }

    pub(crate) fn call_reply(message_id: MessageId, outcome: Result<Value, WorkerError>) -> Self {
        let (value, error) = split(outcome);
        Reply::CallExportReply {
            value,
            error,
            message_id,
        }
    }
}

fn split(outcome: Result<Value, WorkerError>) -> (Value, Option<String>) {
    match outcome {
        Ok(value) => (value, None),
        Err(err) => (Value::Null, Some(err.to_string())),
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, WorkerError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, WorkerError> {
    Ok(serde_json::from_str(frame)?)
}
