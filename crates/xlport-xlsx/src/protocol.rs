//! Message protocol spoken between a host and an export worker.
//!
//! One request in, exactly one terminal response out:
//!
//! ```json
//! {"command":"export","sheet":{...},"decorated":{"IFS":"_xlfn."}}
//! {"command":"import","data":"<base64>"}
//!
//! {"status":"complete","blob":"<base64>"}
//! {"status":"complete","results":{...}}
//! {"status":"error","data":"message"}
//! ```

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xlport_core::SerializedModel;
use xlport_formula::{Decorations, FormulaLocale};

use crate::error::Result;
use crate::export::{ExportOptions, ExportOutput, Exporter};
use crate::import::import_xlsx;
use crate::template::Template;

/// `Vec<u8>` as a standard base64 string.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }

    /// The same for optional fields.
    pub mod option {
        use super::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| STANDARD.decode(text.trim()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum WorkerRequest {
    Export {
        #[serde(rename = "sheet")]
        model: Box<SerializedModel>,
        /// Function-name decorations; the standard set when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decorated: Option<Decorations>,
        #[serde(default)]
        locale: FormulaLocale,
    },
    Import {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl WorkerRequest {
    pub fn export(model: SerializedModel) -> Self {
        WorkerRequest::Export {
            model: Box::new(model),
            decorated: None,
            locale: FormulaLocale::default(),
        }
    }

    pub fn import(data: Vec<u8>) -> Self {
        WorkerRequest::Import { data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerResponse {
    Complete {
        #[serde(
            default,
            with = "base64_bytes::option",
            skip_serializing_if = "Option::is_none"
        )]
        blob: Option<Vec<u8>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        results: Option<Box<SerializedModel>>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Error {
        data: String,
    },
}

impl WorkerResponse {
    pub fn exported(output: ExportOutput) -> Self {
        WorkerResponse::Complete {
            blob: Some(output.blob.bytes),
            results: None,
            warnings: output.warnings,
        }
    }

    pub fn imported(model: SerializedModel) -> Self {
        WorkerResponse::Complete {
            blob: None,
            results: Some(Box::new(model)),
            warnings: Vec::new(),
        }
    }

    pub fn error(message: impl ToString) -> Self {
        WorkerResponse::Error {
            data: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WorkerResponse::Error { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::error!(%err, "failed to encode worker response");
            r#"{"status":"error","data":"failed to encode response"}"#.to_string()
        })
    }
}

impl From<Result<WorkerResponse>> for WorkerResponse {
    fn from(result: Result<WorkerResponse>) -> Self {
        result.unwrap_or_else(WorkerResponse::error)
    }
}

// Messages are read tag first and the payload second. Serde's buffered
// internally tagged path would hand the model's integer-keyed row and
// column maps their JSON keys as plain strings.

/// Remove the `tag` field of a message object and return its value.
fn split_tag<E: de::Error>(mut message: Value, tag: &'static str) -> std::result::Result<(String, Value), E> {
    let name = match message.as_object_mut().map(|fields| fields.remove(tag)) {
        Some(Some(Value::String(name))) => name,
        Some(Some(_)) => return Err(E::custom(format_args!("`{tag}` must be a string"))),
        Some(None) => return Err(E::missing_field(tag)),
        None => return Err(E::custom("expected a message object")),
    };
    Ok((name, message))
}

fn payload<T: de::DeserializeOwned, E: de::Error>(message: Value) -> std::result::Result<T, E> {
    serde_json::from_value(message).map_err(E::custom)
}

#[derive(Deserialize)]
struct ExportPayload {
    #[serde(rename = "sheet")]
    model: Box<SerializedModel>,
    #[serde(default)]
    decorated: Option<Decorations>,
    #[serde(default)]
    locale: FormulaLocale,
}

#[derive(Deserialize)]
struct ImportPayload {
    #[serde(with = "base64_bytes")]
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct CompletePayload {
    #[serde(default, with = "base64_bytes::option")]
    blob: Option<Vec<u8>>,
    #[serde(default)]
    results: Option<Box<SerializedModel>>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    data: String,
}

impl<'de> Deserialize<'de> for WorkerRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (command, message) = split_tag(Value::deserialize(deserializer)?, "command")?;
        match command.as_str() {
            "export" => {
                let ExportPayload {
                    model,
                    decorated,
                    locale,
                } = payload(message)?;
                Ok(WorkerRequest::Export {
                    model,
                    decorated,
                    locale,
                })
            }
            "import" => {
                let ImportPayload { data } = payload(message)?;
                Ok(WorkerRequest::Import { data })
            }
            other => Err(de::Error::unknown_variant(other, &["export", "import"])),
        }
    }
}

impl<'de> Deserialize<'de> for WorkerResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (status, message) = split_tag(Value::deserialize(deserializer)?, "status")?;
        match status.as_str() {
            "complete" => {
                let CompletePayload {
                    blob,
                    results,
                    warnings,
                } = payload(message)?;
                Ok(WorkerResponse::Complete {
                    blob,
                    results,
                    warnings,
                })
            }
            "error" => {
                let ErrorPayload { data } = payload(message)?;
                Ok(WorkerResponse::Error { data })
            }
            other => Err(de::Error::unknown_variant(other, &["complete", "error"])),
        }
    }
}

/// Runs requests against a fixed template. Every call starts from fresh
/// export state; the dispatcher itself holds nothing mutable.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    template: Template,
}

impl Dispatcher {
    pub fn new(template: Template) -> Self {
        Dispatcher { template }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn handle(&self, request: WorkerRequest) -> WorkerResponse {
        let response = match request {
            WorkerRequest::Export {
                model,
                decorated,
                locale,
            } => {
                tracing::debug!(sheets = model.sheets.len(), "export requested");
                let exporter = Exporter::new(ExportOptions {
                    decorations: decorated,
                    locale,
                })
                .with_template(self.template.clone());
                exporter.export(*model).map(WorkerResponse::exported)
            }
            WorkerRequest::Import { data } => {
                tracing::debug!(bytes = data.len(), "import requested");
                import_xlsx(&data).map(WorkerResponse::imported)
            }
        };
        if let Err(err) = &response {
            tracing::warn!(%err, "worker request failed");
        }
        response.into()
    }

    /// Decode, run and encode one JSON message.
    pub fn handle_json(&self, message: &str) -> String {
        let response = match serde_json::from_str::<WorkerRequest>(message) {
            Ok(request) => self.handle(request),
            Err(err) => WorkerResponse::error(format_args!("invalid request: {err}")),
        };
        response.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use xlport_core::{Cell, CellCoord, CellValue, SerializedSheet};

    fn model() -> SerializedModel {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(CellCoord::new(0, 0), Cell::number(42.0));
        sheet.set_cell(
            CellCoord::new(0, 1),
            Cell::formula("=IFS(A1>0,1)", CellValue::Number(1.0)),
        );
        SerializedModel::new(vec![sheet])
    }

    #[test]
    fn test_request_json_shape() {
        let request: WorkerRequest = serde_json::from_value(json!({
            "command": "export",
            "sheet": serde_json::to_value(model()).unwrap(),
            "decorated": {"IFS": "_xlfn."}
        }))
        .unwrap();
        let WorkerRequest::Export { decorated, .. } = &request else {
            panic!("expected export");
        };
        assert_eq!(decorated.as_ref().unwrap().prefix_for("IFS"), Some("_xlfn."));

        let import: WorkerRequest =
            serde_json::from_value(json!({"command": "import", "data": "UEsDBA=="})).unwrap();
        assert_eq!(import, WorkerRequest::import(b"PK\x03\x04".to_vec()));
    }

    #[test]
    fn test_export_then_import_through_json() {
        let dispatcher = Dispatcher::default();
        let request = serde_json::to_string(&WorkerRequest::export(model())).unwrap();
        let response: Value = serde_json::from_str(&dispatcher.handle_json(&request)).unwrap();
        assert_eq!(response["status"], "complete");
        let blob = response["blob"].as_str().unwrap().to_string();

        let reply = dispatcher.handle_json(&json!({"command": "import", "data": blob}).to_string());
        let WorkerResponse::Complete {
            results: Some(model),
            ..
        } = serde_json::from_str(&reply).unwrap()
        else {
            panic!("expected results in {reply}");
        };
        let cell = model.sheets[0].get_cell(CellCoord::new(0, 1)).unwrap();
        assert_eq!(cell.formula.as_deref(), Some("=IFS(A1>0,1)"));
    }

    #[test]
    fn test_export_message_with_cells_rows_and_columns() {
        let message = json!({
            "command": "export",
            "sheet": {
                "sheets": [{
                    "id": "s1",
                    "name": "Sheet1",
                    "rows": {"0": {"height": 30.0, "cells": {"0": {"value": {"type": "Number", "value": 1.0}}}}},
                    "columns": {"2": {"width": 120.0}}
                }]
            }
        });
        let request: WorkerRequest = serde_json::from_value(message.clone()).unwrap();
        let WorkerRequest::Export { model, .. } = &request else {
            panic!("expected export");
        };
        assert!(model.sheets[0].get_cell(CellCoord::new(0, 0)).is_some());
        assert_eq!(model.sheets[0].col_width(2), 120.0);

        let reply: Value =
            serde_json::from_str(&Dispatcher::default().handle_json(&message.to_string())).unwrap();
        assert_eq!(reply["status"], "complete", "{reply}");
    }

    #[test]
    fn test_unknown_command_and_missing_tag_are_rejected() {
        assert!(serde_json::from_str::<WorkerRequest>(r#"{"command":"print"}"#).is_err());
        assert!(serde_json::from_str::<WorkerRequest>(r#"{"data":"UEsDBA=="}"#).is_err());
        assert!(serde_json::from_str::<WorkerResponse>(r#"{"status":"error","data":"boom"}"#)
            .is_ok_and(|response| response.is_error()));
    }

    #[test]
    fn test_failures_become_error_responses() {
        let dispatcher = Dispatcher::default();
        let empty = serde_json::to_string(&WorkerRequest::export(SerializedModel::default())).unwrap();
        let response: Value = serde_json::from_str(&dispatcher.handle_json(&empty)).unwrap();
        assert_eq!(response["status"], "error");

        let garbage: Value = serde_json::from_str(&dispatcher.handle_json("{\"command\":1}")).unwrap();
        assert_eq!(garbage["status"], "error");
        assert!(garbage["data"].as_str().unwrap().starts_with("invalid request"));

        let not_zip = dispatcher.handle(WorkerRequest::import(b"hello".to_vec()));
        assert!(not_zip.is_error());
    }
}
