pub mod agent;
pub mod config;
pub mod error;
pub mod forge;
pub mod io;
pub mod labels;
pub mod lock;
pub mod metrics;
pub mod notify;
pub mod outbound;
pub mod paths;
pub mod pr;
pub mod progress;
pub mod qa;
pub mod review;
pub mod runner;
pub mod scan;
pub mod task;
pub mod test_gate;
pub mod tracker;
pub mod vcs;
pub mod warmup;

pub use error::{ForemanError, Result};
