//! LocalDispatch - Task Runner を同一プロセスで起動する RunnerDispatch
//!
//! Resolves the tab's document, spawns the shared runner, and publishes its
//! signal on the `SignalBus` with the tab as origin. The Coordinator cancels
//! the runner of a task it gave up on; a runner still alive at the next
//! dispatch is aborted before the new one starts.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info_span, warn};

use crate::app::runner::TaskRunner;
use crate::app::signal_bus::SignalBus;
use crate::domain::{PromptTask, RunnerSignal, ShuttleError, SignalEnvelope, TabHandle, TabId};
use crate::ports::{RunnerDispatch, TabHost};

struct RunningTask {
    tab_id: TabId,
    join: JoinHandle<()>,
}

pub struct LocalDispatch {
    host: Arc<dyn TabHost>,
    runner: Arc<TaskRunner>,
    bus: Arc<SignalBus>,
    current: Mutex<Option<RunningTask>>,
}

impl LocalDispatch {
    pub fn new(host: Arc<dyn TabHost>, runner: Arc<TaskRunner>, bus: Arc<SignalBus>) -> Self {
        Self {
            host,
            runner,
            bus,
            current: Mutex::new(None),
        }
    }

    /// Take the current runner if `matches` accepts its tab.
    fn take_current(&self, matches: impl FnOnce(&TabId) -> bool) -> Option<RunningTask> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|running| matches(&running.tab_id)) {
            current.take()
        } else {
            None
        }
    }

    async fn stop(running: RunningTask) {
        if running.join.is_finished() {
            return;
        }
        running.join.abort();
        // the runner future is dropped, and its state released, once this resolves
        let _ = running.join.await;
    }
}

#[async_trait]
impl RunnerDispatch for LocalDispatch {
    async fn dispatch(&self, tab: &TabHandle, task: &PromptTask) -> Result<(), ShuttleError> {
        let page = self.host.page(tab).await?;
        if let Some(stale) = self.take_current(|_| true)
            && !stale.join.is_finished()
        {
            warn!(tab_id = %stale.tab_id, "aborting task runner left over from an unresolved task");
            Self::stop(stale).await;
        }

        let runner = Arc::clone(&self.runner);
        let bus = Arc::clone(&self.bus);
        let origin = tab.tab_id.clone();
        let task = task.clone();
        let span = info_span!("task_runner", task_id = %task.task_id(), tab_id = %origin);

        let join = tokio::spawn(
            async move {
                let signal = match runner.run(page.as_ref(), &task).await {
                    Ok(signal) => signal,
                    Err(err) => {
                        error!(error = %err, "task runner refused the task");
                        RunnerSignal::SequenceFailed {
                            reason: err.to_string(),
                        }
                    }
                };
                bus.publish(SignalEnvelope::new(origin, signal));
            }
            .instrument(span),
        );
        *self.current.lock() = Some(RunningTask {
            tab_id: tab.tab_id.clone(),
            join,
        });

        Ok(())
    }

    async fn cancel(&self, tab: &TabId) {
        if let Some(running) = self.take_current(|running| running == tab) {
            if !running.join.is_finished() {
                warn!(tab_id = %tab, "cancelling task runner");
            }
            Self::stop(running).await;
        }
    }
}
