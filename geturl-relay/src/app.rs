use crate::relay::Relay;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Arc<Self> {
        Arc::new(Self { relay })
    }
}
