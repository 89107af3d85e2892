//! Gateway 应用状态

use std::sync::Arc;

use crate::relay::Relay;

/// Gateway 应用状态，请求之间只读共享
#[derive(Clone)]
pub struct AppState {
    relay: Arc<Relay>,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }
}
