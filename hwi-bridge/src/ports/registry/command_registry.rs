use crate::domain::bridge::{DeviceHandle, Invocation, Operation};
use async_trait::async_trait;
use serde_json::Value;

/// Named hardware wallet operations.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    /// Looks up a registered operation by its exact name.
    fn operation(&self, name: &str) -> Option<Operation>;

    /// Locates a connected, unlocked device by master key fingerprint.
    ///
    /// `Ok(None)` means no such device is available.
    async fn find_device(&self, fingerprint: &str) -> anyhow::Result<Option<DeviceHandle>>;

    async fn call(&self, operation: &Operation, invocation: Invocation) -> anyhow::Result<Value>;
}
