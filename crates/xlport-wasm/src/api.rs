use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use xlport_core::SerializedModel;
use xlport_xlsx::{Dispatcher, ExportOptions, Exporter, Template, WorkerRequest, WorkerResponse};

/// Structured error object for JavaScript
#[derive(Serialize)]
struct JsXlportError {
    code: &'static str,
    message: String,
}

impl JsXlportError {
    fn from_error<E: std::fmt::Display>(code: &'static str, err: E) -> JsValue {
        let error = Self {
            code,
            message: err.to_string(),
        };
        to_js(&error)
    }
}

/// Plain JS objects (not `Map`s) so the result can be posted back as is.
fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

/// Read a JS value through its JSON text. Sparse row and column maps use
/// numeric keys, which only survive the trip as JSON object keys.
fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, String> {
    if value.is_undefined() {
        return Err("missing value".to_string());
    }
    let text: String = js_sys::JSON::stringify(&value)
        .map_err(|_| "value is not JSON-serializable".to_string())?
        .into();
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

fn report(response: &WorkerResponse) {
    match response {
        WorkerResponse::Complete { warnings, .. } => {
            for warning in warnings {
                web_sys::console::warn_1(&format!("[xlport] {warning}").into());
            }
        }
        WorkerResponse::Error { data } => {
            web_sys::console::error_1(&format!("[xlport] {data}").into());
        }
    }
}

/// Export worker exposed to JavaScript. Holds the template every export
/// starts from; nothing else survives between calls.
#[wasm_bindgen]
pub struct XlportWorker {
    dispatcher: Dispatcher,
}

impl Default for XlportWorker {
    fn default() -> Self {
        Self {
            dispatcher: Dispatcher::default(),
        }
    }
}

#[wasm_bindgen]
impl XlportWorker {
    /// Create a worker, optionally seeded from a template package.
    #[wasm_bindgen(constructor)]
    pub fn new(template: Option<Vec<u8>>) -> Result<XlportWorker, JsValue> {
        let template = match template {
            Some(bytes) => Template::from_bytes(&bytes)
                .map_err(|err| JsXlportError::from_error("TEMPLATE", err))?,
            None => Template::default(),
        };
        Ok(Self {
            dispatcher: Dispatcher::new(template),
        })
    }

    /// Handle one protocol message (`{command: 'export' | 'import', ...}`).
    /// Always answers with exactly one `{status: ...}` object.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue) -> JsValue {
        let response = match from_js::<WorkerRequest>(message) {
            Ok(request) => self.dispatcher.handle(request),
            Err(err) => WorkerResponse::error(format_args!("invalid request: {err}")),
        };
        report(&response);
        to_js(&response)
    }

    /// Same as `handleMessage` for messages already encoded as JSON text.
    #[wasm_bindgen(js_name = handleMessageJson)]
    pub fn handle_message_json(&self, message: &str) -> String {
        self.dispatcher.handle_json(message)
    }

    /// Export straight to package bytes, skipping the base64 hop.
    #[wasm_bindgen(js_name = exportWorkbook)]
    pub fn export_workbook(
        &self,
        model: JsValue,
        options: JsValue,
    ) -> Result<js_sys::Uint8Array, JsValue> {
        let model: SerializedModel =
            from_js(model).map_err(|err| JsXlportError::from_error("INVALID_MODEL", err))?;
        let options: ExportOptions = if options.is_undefined() || options.is_null() {
            ExportOptions::default()
        } else {
            from_js(options).map_err(|err| JsXlportError::from_error("INVALID_OPTIONS", err))?
        };
        let output = Exporter::new(options)
            .with_template(self.dispatcher.template().clone())
            .export(model)
            .map_err(|err| JsXlportError::from_error("EXPORT", err))?;
        for warning in &output.warnings {
            web_sys::console::warn_1(&format!("[xlport] {warning}").into());
        }
        Ok(js_sys::Uint8Array::from(output.blob.bytes.as_slice()))
    }

    /// Read package bytes into a model object.
    #[wasm_bindgen(js_name = importWorkbook)]
    pub fn import_workbook(&self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let model = xlport_xlsx::import_xlsx(bytes)
            .map_err(|err| JsXlportError::from_error("IMPORT", err))?;
        Ok(to_js(&model))
    }
}

/// `onmessage` entry point for a worker using the built-in template.
#[wasm_bindgen(js_name = handleMessage)]
pub fn handle_message(message: JsValue) -> JsValue {
    XlportWorker::default().handle_message(message)
}

#[wasm_bindgen(js_name = handleMessageJson)]
pub fn handle_message_json(message: &str) -> String {
    XlportWorker::default().handle_message_json(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;
    use xlport_core::{Cell, CellCoord, SerializedSheet};

    fn model() -> SerializedModel {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(CellCoord::new(0, 0), Cell::number(42.0));
        SerializedModel::new(vec![sheet])
    }

    #[wasm_bindgen_test]
    fn test_handle_message_export() {
        let request = to_js(&WorkerRequest::export(model()));
        let response: serde_json::Value =
            from_js(handle_message(request)).unwrap();
        assert_eq!(response["status"], "complete");
        assert!(response["blob"].as_str().unwrap().starts_with("UEsDB"));
    }

    #[wasm_bindgen_test]
    fn test_handle_message_rejects_unknown_command() {
        let reply = handle_message_json(r#"{"command":"print"}"#);
        let response: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(response["status"], "error");
    }

    #[wasm_bindgen_test]
    fn test_bytes_round_trip() {
        let worker = XlportWorker::default();
        let bytes = worker
            .export_workbook(to_js(&model()), JsValue::UNDEFINED)
            .unwrap()
            .to_vec();
        let model: SerializedModel =
            from_js(worker.import_workbook(&bytes).unwrap()).unwrap();
        assert_eq!(model.sheets[0].name, "Sheet1");
    }
}
