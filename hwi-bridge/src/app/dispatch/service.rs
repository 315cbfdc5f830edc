use crate::domain::bridge::{CommandRequest, Invocation, OperationScope};
use crate::ports::approval::StatusSurface;
use crate::ports::registry::CommandRegistry;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("device not found or is locked: {fingerprint}")]
    DeviceUnavailable { fingerprint: String },
    /// The operation itself failed; reported to the caller as a normal result.
    #[error("{0}")]
    Invocation(String),
    #[error("command {0} panicked")]
    Internal(String),
}

/// Resolves named operations, binds devices for device-scoped ones, and runs
/// them while the status surface shows the method name.
pub struct CommandDispatcher {
    registry: Arc<dyn CommandRegistry>,
    status: Arc<dyn StatusSurface>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<dyn CommandRegistry>, status: Arc<dyn StatusSurface>) -> Self {
        Self { registry, status }
    }

    pub async fn invoke(&self, request: CommandRequest) -> Result<Value, DispatchError> {
        let CommandRequest { method, mut args } = request;
        let operation = self
            .registry
            .operation(&method)
            .ok_or_else(|| DispatchError::MethodNotFound(method.clone()))?;

        let _status = StatusGuard::show(self.status.as_ref(), operation.name());

        let invocation = match operation.scope() {
            OperationScope::Direct => Invocation::direct(args),
            OperationScope::Device => {
                if args.is_empty() {
                    return Err(DispatchError::Invocation(format!(
                        "{method} requires a device fingerprint as its first argument"
                    )));
                }
                let fingerprint = match args.remove(0) {
                    Value::String(fingerprint) => fingerprint,
                    other => {
                        return Err(DispatchError::Invocation(format!(
                            "device fingerprint must be a string, got {other}"
                        )))
                    }
                };
                let device = self
                    .registry
                    .find_device(&fingerprint)
                    .await
                    .map_err(|err| DispatchError::Invocation(format!("{err:#}")))?;
                let Some(device) = device else {
                    info!(%method, %fingerprint, "device not found or locked");
                    return Err(DispatchError::DeviceUnavailable { fingerprint });
                };
                debug!(%method, %device, "resolved device");
                Invocation::on_device(device, args)
            }
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.registry.call(&operation, invocation))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(Ok(value)) => {
                info!(%method, elapsed_ms, "command completed");
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(%method, elapsed_ms, error = %format!("{err:#}"), "command failed");
                Err(DispatchError::Invocation(format!("{err:#}")))
            }
            Err(_) => {
                error!(%method, elapsed_ms, "command panicked");
                Err(DispatchError::Internal(method))
            }
        }
    }
}

struct StatusGuard<'a> {
    surface: &'a dyn StatusSurface,
}

impl<'a> StatusGuard<'a> {
    fn show(surface: &'a dyn StatusSurface, method: &str) -> Self {
        surface.show(method);
        Self { surface }
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.surface.clear();
    }
}
