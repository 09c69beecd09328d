mod durable_log;
mod error;
mod tracing_init;

pub use durable_log::AppendLog;
pub use error::{err, Error, Result};
pub use tracing_init::init as init_tracing;
