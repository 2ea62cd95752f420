//! Hooks into the runtime hosting the worker.

/// Lifecycle controls owned by the hosting runtime.
///
/// The worker calls these at fixed points: `skip_waiting` at the start of
/// install and on an explicit skip-waiting message, `claim_clients` after a
/// successful activation.
pub trait LifecycleHost: Send + Sync {
    /// Let this worker generation supersede a waiting one without waiting
    /// for old clients to close.
    fn skip_waiting(&self);

    /// Take control of already-open clients.
    fn claim_clients(&self);
}

/// Host with no clients to control. Records the calls in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl LifecycleHost for DetachedHost {
    fn skip_waiting(&self) {
        tracing::debug!("skip_waiting requested; no waiting generation to supersede");
    }

    fn claim_clients(&self) {
        tracing::debug!("claim_clients requested; no open clients");
    }
}
