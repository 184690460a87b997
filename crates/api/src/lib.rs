pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::AppConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, Services};
