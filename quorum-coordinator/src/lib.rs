pub mod client;
pub mod config;
pub mod decision_log;
pub mod engine;
pub mod server;

pub use client::HttpParticipantClient;
pub use config::Config;
pub use decision_log::DecisionLog;
pub use engine::{Engine, Participant};
