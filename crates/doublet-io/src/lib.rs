//! File I/O for doublet: CSV event catalogs in, JSON correlation results out.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{EventCatalog, ExperimentName};
pub use error::IoError;
pub use reader::SignalReader;
pub use writer::ResultWriter;
