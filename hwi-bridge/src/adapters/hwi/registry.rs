use super::catalog::{self, HwiCommand, ParamKind};
use super::runner::{HwiCommandRunner, HwiOutput, SystemHwiCommandRunner};
use crate::domain::bridge::{DeviceHandle, Invocation, Operation, OperationScope};
use crate::ports::registry::CommandRegistry;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chain {
    Main,
    Test,
    Regtest,
    Signet,
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "main" => Ok(Chain::Main),
            "test" => Ok(Chain::Test),
            "regtest" => Ok(Chain::Regtest),
            "signet" => Ok(Chain::Signet),
            other => Err(format!(
                "unsupported chain '{other}'. Use main|test|regtest|signet"
            )),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Main => write!(f, "main"),
            Chain::Test => write!(f, "test"),
            Chain::Regtest => write!(f, "regtest"),
            Chain::Signet => write!(f, "signet"),
        }
    }
}

/// [`CommandRegistry`] backed by the `hwi` command-line tool.
///
/// Devices are found by running `hwi enumerate` and matching the master key
/// fingerprint; device-scoped commands then address the device by type and
/// path. Output is `hwi`'s JSON on stdout.
pub struct HwiCliRegistry {
    runner: Arc<dyn HwiCommandRunner>,
    chain: Option<Chain>,
}

impl HwiCliRegistry {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self::with_runner(Arc::new(SystemHwiCommandRunner::new(program, timeout)))
    }

    pub fn with_runner(runner: Arc<dyn HwiCommandRunner>) -> Self {
        Self {
            runner,
            chain: None,
        }
    }

    pub fn with_chain(mut self, chain: Option<Chain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn methods() -> impl Iterator<Item = &'static str> {
        catalog::CATALOG.iter().map(|command| command.method)
    }

    fn base_args(&self) -> Vec<String> {
        self.chain
            .map(|chain| vec![format!("--chain={chain}")])
            .unwrap_or_default()
    }

    fn build_args(
        &self,
        command: &HwiCommand,
        device: Option<&DeviceHandle>,
        args: Vec<Value>,
    ) -> anyhow::Result<Vec<String>> {
        if args.len() > command.params.len() {
            bail!(
                "{} accepts at most {} arguments, got {}",
                command.method,
                command.params.len(),
                args.len()
            );
        }

        let mut globals = self.base_args();
        if let Some(device) = device {
            globals.push(format!("--device-type={}", device.device_type));
            globals.push(format!("--device-path={}", device.path));
        }
        let mut options = Vec::new();
        let mut positionals = Vec::new();

        let mut args = args.into_iter();
        for param in command.params {
            let arg = args.next().unwrap_or(Value::Null);
            let target = if param.global {
                &mut globals
            } else {
                &mut options
            };
            match param.kind {
                ParamKind::Positional => {
                    if arg.is_null() {
                        bail!("{} missing required argument '{}'", command.method, param.name);
                    }
                    positionals.push(scalar(command, param.name, &arg)?);
                }
                ParamKind::Value(flag) => {
                    if !arg.is_null() {
                        target.push(format!("{flag}={}", scalar(command, param.name, &arg)?));
                    }
                }
                ParamKind::Switch(flag) => match arg {
                    Value::Null | Value::Bool(false) => {}
                    Value::Bool(true) => target.push(flag.to_string()),
                    other => bail!(
                        "{} argument '{}' must be a boolean, got {other}",
                        command.method,
                        param.name
                    ),
                },
                ParamKind::Toggle { on, off } => match arg {
                    Value::Null => {}
                    Value::Bool(true) => target.push(on.to_string()),
                    Value::Bool(false) => target.push(off.to_string()),
                    other => bail!(
                        "{} argument '{}' must be a boolean, got {other}",
                        command.method,
                        param.name
                    ),
                },
            }
        }

        let mut argv = globals;
        argv.push(command.subcommand.to_string());
        argv.extend(options);
        if !positionals.is_empty() {
            argv.push("--".to_string());
            argv.extend(positionals);
        }
        Ok(argv)
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<Value> {
        let output = self.runner.run(args).await?;
        parse_output(output)
    }
}

#[async_trait]
impl CommandRegistry for HwiCliRegistry {
    fn operation(&self, name: &str) -> Option<Operation> {
        catalog::lookup(name).map(|command| match command.scope {
            OperationScope::Direct => Operation::direct(command.method),
            OperationScope::Device => Operation::device_scoped(command.method),
        })
    }

    async fn find_device(&self, fingerprint: &str) -> anyhow::Result<Option<DeviceHandle>> {
        let mut args = self.base_args();
        args.push("enumerate".to_string());
        let devices = self.execute(&args).await.context("enumerating devices")?;
        let Value::Array(devices) = devices else {
            bail!("unexpected output from hwi enumerate");
        };

        for entry in &devices {
            // Locked devices report no fingerprint, broken ones an error.
            if entry.get("error").is_some() {
                continue;
            }
            if entry.get("fingerprint").and_then(Value::as_str) != Some(fingerprint) {
                continue;
            }
            let (Some(device_type), Some(path)) = (
                entry.get("type").and_then(Value::as_str),
                entry.get("path").and_then(Value::as_str),
            ) else {
                continue;
            };
            let mut device = DeviceHandle::new(fingerprint, device_type, path);
            if let Some(model) = entry.get("model").and_then(Value::as_str) {
                device = device.with_model(model);
            }
            return Ok(Some(device));
        }

        debug!(%fingerprint, candidates = devices.len(), "no enumerated device matched");
        Ok(None)
    }

    async fn call(&self, operation: &Operation, invocation: Invocation) -> anyhow::Result<Value> {
        let command = catalog::lookup(operation.name())
            .ok_or_else(|| anyhow!("unknown hwi method {}", operation.name()))?;
        if command.scope.requires_device() && invocation.device.is_none() {
            bail!("{} requires a device", command.method);
        }
        let args = self.build_args(command, invocation.device.as_ref(), invocation.args)?;
        self.execute(&args).await
    }
}

fn scalar(command: &HwiCommand, name: &str, value: &Value) -> anyhow::Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => bail!(
            "{} argument '{name}' must be a string, number or boolean, got {other}",
            command.method
        ),
    }
}

fn parse_output(output: HwiOutput) -> anyhow::Result<Value> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed = serde_json::from_str::<Value>(stdout.trim()).ok();

    if let Some(error) = parsed.as_ref().and_then(|value| value.get("error")) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        bail!(message);
    }

    if !output.success {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            bail!(
                "hwi exited with code {}",
                output
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
        bail!(stderr.to_string());
    }

    parsed.ok_or_else(|| anyhow!("hwi produced non-JSON output"))
}
