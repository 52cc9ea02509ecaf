mod settings;

pub use settings::{CatchUpConfig, DatabaseConfig, ServerConfig, Settings, WebSocketConfig};
