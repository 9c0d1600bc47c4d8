//! Input/output helpers.
//!
//! - event file lists + candidate CSV ingest (`ingest`)
//! - calibration JSON read/write (`model_file`)
//! - inference exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;
pub mod model_file;

pub use export::*;
pub use ingest::*;
pub use model_file::*;
