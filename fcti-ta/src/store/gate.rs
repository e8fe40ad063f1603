//! Per-property single-writer gate
//!
//! Every write for one property (discovery persistence, chain rebuild,
//! survival save) runs while holding that property's gate. Different
//! properties never contend.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct WriteGate {
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to one property
    pub async fn lock(&self, property_id: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().await;
            gates
                .entry(property_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        gate.lock_owned().await
    }
}
