// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer
pub mod hub;
pub mod notification;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
