pub mod agent;
pub mod init;
pub mod labels;
pub mod metrics;
pub mod notify;
pub mod progress;
pub mod qa;
pub mod review;
pub mod run;
pub mod test_gate;
pub mod warmup;
