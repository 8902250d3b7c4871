pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod stats;

pub use config::{ColumnMap, PipelineConfig};
pub use coordinator::{Coordinator, Schedule};
pub use error::{MalformedReason, PipelineError, ScanError};
pub use pipeline::{RunReport, run_pipeline};
pub use stats::{ResultStore, VehicleStats};
