mod handlers;
mod metrics;
mod notifications;
mod routes;

pub use routes::api_routes;
