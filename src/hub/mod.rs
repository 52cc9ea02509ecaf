//! Real-time broadcast hub: presence registry, single-writer control loop,
//! per-connection outbound queues and reconnect catch-up.

mod connection;
mod dispatcher;
mod metrics;
mod registry;
mod replay;

pub use connection::{Connection, OUTBOUND_QUEUE_SIZE};
pub use dispatcher::{BroadcastEnvelope, Hub, HubStats, CONTROL_QUEUE_SIZE, SUBMISSION_QUEUE_SIZE};
pub use metrics::{HubMetrics, MetricsSnapshot};
pub use replay::CatchUpReplayer;
