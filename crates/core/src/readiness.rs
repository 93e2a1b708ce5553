use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Two one-way flags gating the suggestion flow.
///
/// Each flag moves from `false` to `true` at most once. Marking an already
/// set flag is a no-op.
#[derive(Debug, Default)]
pub struct ReadinessState {
    models: AtomicBool,
    context_menu: AtomicBool,
    changed: Notify,
}

impl ReadinessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_models_ready(&self) -> bool {
        self.transition(&self.models)
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_context_menu_ready(&self) -> bool {
        self.transition(&self.context_menu)
    }

    pub fn models_ready(&self) -> bool {
        self.models.load(Ordering::Acquire)
    }

    pub fn context_menu_ready(&self) -> bool {
        self.context_menu.load(Ordering::Acquire)
    }

    pub async fn wait_models_ready(&self) {
        self.wait_for(&self.models).await;
    }

    pub async fn wait_context_menu_ready(&self) {
        self.wait_for(&self.context_menu).await;
    }

    fn transition(&self, flag: &AtomicBool) -> bool {
        let changed = flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            self.changed.notify_waiters();
        }
        changed
    }

    async fn wait_for(&self, flag: &AtomicBool) {
        loop {
            // Register before checking so a transition in between is not missed.
            let notified = self.changed.notified();
            if flag.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}
