use std::sync::Arc;

use crate::config::Settings;
use crate::hub::{CatchUpReplayer, Hub, HubMetrics};
use crate::notification::NotificationStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub hub: Arc<Hub>,
    pub replayer: Arc<CatchUpReplayer>,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn NotificationStore>) -> Self {
        let metrics = Arc::new(HubMetrics::default());
        let hub = Arc::new(Hub::new(metrics.clone()));
        let replayer = Arc::new(CatchUpReplayer::new(
            store,
            metrics,
            settings.catchup.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            hub,
            replayer,
        }
    }
}
