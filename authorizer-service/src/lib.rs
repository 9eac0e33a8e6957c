pub mod app;
pub mod config;
pub mod handlers;
pub mod refresh;

pub use app::{build_verifier, router, AppState};
pub use config::{AuthorizerConfig, KeySourceConfig};
