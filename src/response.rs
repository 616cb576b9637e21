//! Response construction.
//!
//! Handlers say how their result is to be serialized by returning a
//! [`HandlerReply`] whose [`Reply`] variant picks the strategy:
//!
//! - [`Reply::Protobuf`]: encoded message bytes, sent as `application/x-protobuf`
//! - [`Reply::Model`]: a record shaped by the operation's response schema for
//!   the reply's status and sent as JSON
//! - [`Reply::Passthrough`]: bytes sent untouched, with an optional content type
//!
//! When a model cannot be shaped (no operation spec, no schema for the
//! status, or a record that does not fit the schema) it is still sent, as
//! plain JSON with its own field names.

use crate::dispatcher::HandlerResponse;
use crate::spec::{OperationSpec, Specification};
use crate::transform::{response_schema_for, RecordValue, Transformer};
use serde_json::Value;
use tracing::debug;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// How a handler result is serialized.
#[derive(Debug, Clone)]
pub enum Reply {
    Protobuf(Vec<u8>),
    Model(RecordValue),
    Passthrough {
        body: Vec<u8>,
        content_type: Option<String>,
    },
}

/// A handler's result: what to send and with which status.
#[derive(Debug, Clone)]
pub struct HandlerReply {
    pub status: u16,
    pub reply: Reply,
}

impl HandlerReply {
    /// A model reply with status 200.
    pub fn model(value: impl Into<RecordValue>) -> Self {
        Self {
            status: 200,
            reply: Reply::Model(value.into()),
        }
    }

    /// Encode `message` and reply with it, status 200.
    pub fn protobuf(message: &impl prost::Message) -> Self {
        Self {
            status: 200,
            reply: Reply::Protobuf(message.encode_to_vec()),
        }
    }

    /// Raw bytes, status 200.
    pub fn passthrough(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            reply: Reply::Passthrough {
                body: body.into(),
                content_type: content_type.map(str::to_string),
            },
        }
    }

    /// An empty body with `status`.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::passthrough(Vec::new(), None).with_status(status)
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Shape a model by the response schema for `status`, falling back to its
/// plain JSON form when no schema applies.
pub fn shape_model(
    spec: &Specification,
    operation: Option<&OperationSpec>,
    status: u16,
    value: &RecordValue,
) -> Value {
    let shaped = response_schema_for(operation, status)
        .and_then(|schema| Transformer::new(spec).transform(schema, value));
    match shaped {
        Ok(json) => json,
        Err(e) => {
            debug!(
                handler = operation.map_or("<none>", |op| op.handler_name.as_str()),
                status = status,
                reason = %e,
                "Serializing model without schema"
            );
            value.to_plain_json()
        }
    }
}

/// Turn a handler reply into the response that leaves the process.
#[must_use]
pub fn build_response(
    reply: HandlerReply,
    operation: Option<&OperationSpec>,
    spec: &Specification,
) -> HandlerResponse {
    let HandlerReply { status, reply } = reply;
    match reply {
        Reply::Protobuf(bytes) => {
            HandlerResponse::new(status, bytes).with_content_type(PROTOBUF_CONTENT_TYPE)
        }
        Reply::Model(value) => {
            let json = shape_model(spec, operation, status, &value);
            HandlerResponse::json(status, &json)
        }
        Reply::Passthrough { body, content_type } => {
            let response = HandlerResponse::new(status, body);
            match content_type {
                Some(content_type) => response.with_content_type(&content_type),
                None => response,
            }
        }
    }
}
