pub mod config;
pub mod engine;
pub mod server;
pub mod wal;

pub use config::Config;
pub use engine::Engine;
pub use wal::Wal;
