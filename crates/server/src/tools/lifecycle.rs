//! worker_install, worker_activate and worker_uninstall tools.

use precache_client::{ActivationOutcome, CacheWorker, InstallReport, WorkerState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use super::json_result;

#[derive(Debug, Serialize)]
pub struct InstallOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub report: InstallReport,
}

#[derive(Debug, Serialize)]
pub struct ActivateOutput {
    pub state: WorkerState,
    pub outcome: ActivationOutcome,
}

#[derive(Debug, Serialize)]
pub struct UninstallOutput {
    pub state: WorkerState,
}

/// Install: stage the core resources. A failure is returned to the caller,
/// which may retry.
pub async fn install_impl(worker: &CacheWorker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&InstallOutput { state: worker.state().await, report })
}

/// Activate: always succeeds at the protocol level; a reset is reported in
/// the outcome.
pub async fn activate_impl(worker: &CacheWorker) -> Result<CallToolResult, McpError> {
    let outcome = worker.activate().await;
    json_result(&ActivateOutput { state: worker.state().await, outcome })
}

pub async fn uninstall_impl(worker: &CacheWorker) -> Result<CallToolResult, McpError> {
    worker.uninstall().await?;
    json_result(&UninstallOutput { state: worker.state().await })
}
