pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod plan;
pub mod research;
pub mod session;
pub mod storage;
pub mod voice;

// Re-export commonly used types
pub use app::launch;
pub use config::Config;
pub use error::{ResearchError, RunFailure};
