use std::{collections::HashMap, future::Future, sync::Mutex};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};

use super::WorkflowError;

/// Record of completed workflow steps, keyed by workflow instance and step
/// name.
///
/// Workflows execute at-least-once; this ledger is what turns that into
/// exactly-once effects per step. A durable implementation could persist
/// entries; the in-memory one covers a single runner process, which is
/// enough because every step's side effect is itself idempotent.
pub trait StepLedger: Send + Sync {
    fn load(&self, instance: &str, step: &str) -> Option<serde_json::Value>;
    fn record(&self, instance: &str, step: &str, output: serde_json::Value);
}

#[derive(Debug, Default)]
pub struct MemoryStepLedger {
    completed: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryStepLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepLedger for MemoryStepLedger {
    fn load(&self, instance: &str, step: &str) -> Option<serde_json::Value> {
        let map = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&(instance.to_string(), step.to_string())).cloned()
    }

    fn record(&self, instance: &str, step: &str, output: serde_json::Value) {
        let mut map = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        map.insert((instance.to_string(), step.to_string()), output);
    }
}

/// Runs a named step with effectively-once semantics: if the ledger holds
/// a recorded output for `(instance, step)` it is returned without
/// re-executing the step; otherwise the step runs and its output is
/// recorded. Failed steps record nothing and so re-execute on the next
/// attempt.
pub async fn run_step<T, F, Fut>(
    ledger: &dyn StepLedger,
    instance: &str,
    step: &str,
    f: F,
) -> Result<T, WorkflowError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    if let Some(recorded) = ledger.load(instance, step) {
        match serde_json::from_value(recorded) {
            Ok(output) => {
                tracing::debug!(instance, step, "Step already completed, using recorded output");
                return Ok(output);
            }
            Err(e) => {
                tracing::warn!(
                    instance,
                    step,
                    error = %e,
                    "Recorded step output unreadable, re-running step"
                );
            }
        }
    }

    let output = f().await?;

    let value = serde_json::to_value(&output)
        .with_context(|| format!("Failed to serialize output of step '{step}'"))?;
    ledger.record(instance, step, value);

    Ok(output)
}
