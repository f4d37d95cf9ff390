pub mod settings;

pub use settings::{BackendConfig, RateLimitConfig, RouteQuotas, ServerConfig, Settings};
