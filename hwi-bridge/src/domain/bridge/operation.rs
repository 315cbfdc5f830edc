use super::value_object::DeviceHandle;
use serde_json::Value;
use std::fmt;

/// Whether an operation runs against a specific device.
///
/// Decided when the operation is registered; the dispatcher never inspects
/// call signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationScope {
    Direct,
    Device,
}

impl OperationScope {
    pub fn requires_device(self) -> bool {
        matches!(self, OperationScope::Device)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    name: String,
    scope: OperationScope,
}

impl Operation {
    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: OperationScope::Direct,
        }
    }

    pub fn device_scoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: OperationScope::Device,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> OperationScope {
        self.scope
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named command with its positional arguments, as posted by the caller.
///
/// For device-scoped operations `args[0]` is the device fingerprint.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandRequest {
    pub method: String,
    pub args: Vec<Value>,
}

impl CommandRequest {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Arguments handed to the registry once the device (if any) is resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub device: Option<DeviceHandle>,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn direct(args: Vec<Value>) -> Self {
        Self { device: None, args }
    }

    pub fn on_device(device: DeviceHandle, args: Vec<Value>) -> Self {
        Self {
            device: Some(device),
            args,
        }
    }
}
