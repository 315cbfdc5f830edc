use crate::domain::bridge::Origin;
use std::collections::HashMap;
use std::sync::Mutex;

/// Origins the operator has granted during this process lifetime.
///
/// Only grants are recorded. A denied origin stays absent so its next request
/// prompts again. There is no removal.
#[derive(Debug, Default)]
pub struct TrustStore {
    inner: Mutex<HashMap<Origin, bool>>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &Origin) -> Option<bool> {
        let guard = self.inner.lock().expect("trust store poisoned");
        guard.get(origin).copied()
    }

    pub fn is_granted(&self, origin: &Origin) -> bool {
        self.get(origin).unwrap_or(false)
    }

    pub fn grant(&self, origin: Origin) {
        let mut guard = self.inner.lock().expect("trust store poisoned");
        guard.insert(origin, true);
    }
}
