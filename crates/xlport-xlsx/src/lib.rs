//! Spreadsheet package engine for xlport models.
//!
//! [`export::Exporter`] turns a [`xlport_core::SerializedModel`] into an
//! OOXML workbook (`.xlsx`); [`import::import_xlsx`] reads one back.
//! [`protocol::Dispatcher`] wraps both behind the worker message protocol
//! shared by the wasm and server transports.

pub mod chart;
pub mod content_types;
pub mod drawing;
pub mod error;
pub mod export;
pub mod formula;
pub mod geometry;
pub mod import;
pub mod package;
pub mod protocol;
pub mod relationships;
pub mod shared_strings;
pub mod sparkline;
pub mod styles;
pub mod table;
pub mod template;
pub mod theme;
pub mod warnings;
pub mod workbook;
pub mod worksheet;
pub mod xml;

pub use error::{Result, XlsxError};
pub use export::{export_xlsx, ExportOptions, ExportOutput, Exporter};
pub use import::import_xlsx;
pub use package::{Blob, Package, XLSX_MEDIA_TYPE};
pub use protocol::{Dispatcher, WorkerRequest, WorkerResponse};
pub use styles::StyleCache;
pub use template::Template;
pub use warnings::Warnings;
