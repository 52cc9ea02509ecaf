//! Presence registry: which subscribers are connected, and through which
//! connections.
//!
//! The registry is mutated exclusively by the hub control loop; every other
//! path only takes short-lived read access for snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::connection::Connection;

#[derive(Default)]
pub struct PresenceRegistry {
    /// Live connections indexed by subscriber. One subscriber may hold several
    /// simultaneous connections (multiple devices).
    by_subscriber: HashMap<Uuid, HashMap<Uuid, Arc<Connection>>>,
    /// Live connections indexed by tenant, for tenant-wide fan-out.
    by_tenant: HashMap<Uuid, HashMap<Uuid, Arc<Connection>>>,
    /// When a subscriber's connection last went away. Survives after the last
    /// connection closes; read by the catch-up replayer on reconnect.
    last_disconnect: HashMap<Uuid, DateTime<Utc>>,
}

impl PresenceRegistry {
    /// Insert a connection into both presence indexes.
    ///
    /// Both indexes are updated under the same mutable borrow: a connection is
    /// either visible in both or in neither.
    pub fn insert(&mut self, conn: Arc<Connection>) {
        self.by_subscriber
            .entry(conn.subscriber_id)
            .or_default()
            .insert(conn.id, conn.clone());
        self.by_tenant
            .entry(conn.tenant_id)
            .or_default()
            .insert(conn.id, conn);
    }

    /// Remove a connection from both indexes and record the disconnect time
    /// for its subscriber. Returns whether the connection was present.
    pub fn remove(&mut self, conn: &Connection, at: DateTime<Utc>) -> bool {
        self.last_disconnect.insert(conn.subscriber_id, at);

        let mut removed = false;
        if let Some(conns) = self.by_subscriber.get_mut(&conn.subscriber_id) {
            removed = conns.remove(&conn.id).is_some();
            if conns.is_empty() {
                self.by_subscriber.remove(&conn.subscriber_id);
            }
        }
        if let Some(conns) = self.by_tenant.get_mut(&conn.tenant_id) {
            conns.remove(&conn.id);
            if conns.is_empty() {
                self.by_tenant.remove(&conn.tenant_id);
            }
        }
        removed
    }

    pub fn subscriber_connections(&self, subscriber_id: Uuid) -> impl Iterator<Item = &Arc<Connection>> {
        self.by_subscriber
            .get(&subscriber_id)
            .into_iter()
            .flat_map(|conns| conns.values())
    }

    pub fn tenant_connections(&self, tenant_id: Uuid) -> impl Iterator<Item = &Arc<Connection>> {
        self.by_tenant
            .get(&tenant_id)
            .into_iter()
            .flat_map(|conns| conns.values())
    }

    pub fn all_connections(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.by_subscriber.values().flat_map(|conns| conns.values())
    }

    pub fn last_disconnect(&self, subscriber_id: Uuid) -> Option<DateTime<Utc>> {
        self.last_disconnect.get(&subscriber_id).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.by_subscriber.values().map(|conns| conns.len()).sum()
    }

    pub fn subscriber_count(&self) -> usize {
        self.by_subscriber.len()
    }

    pub fn tenant_count(&self) -> usize {
        self.by_tenant.len()
    }
}
