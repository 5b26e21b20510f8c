//! Coordinator - プロンプトキューの所有者
//!
//! A single driver task pulls one `PromptTask` at a time off a FIFO queue and
//! carries it through tab acquisition, load, dispatch and the completion
//! signal before touching the next one. "At most one task in flight" holds
//! because there is exactly one driver.
//!
//! # フロー（1 タスク）
//! 1. TabLifecycleManager::acquire() → TabAcquired
//! 2. load 完了待ち → TabLoaded
//! 3. SignalBus::subscribe()（dispatch より先）
//! 4. RunnerDispatch::dispatch() → SequenceDispatched
//! 5. シグナル待ち → SignalReceived → subscription 解放
//! 6. TaskResolved → 次へ

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::app::signal_bus::SignalBus;
use crate::app::tabs::TabLifecycleManager;
use crate::domain::{
    ControlMessage, CoordinatorState, CoordinatorStatus, DomainEvent, FailureKind, PromptTask,
    RunnerSignal, ShuttleError, TabId, TabPolicy, TaskId, TaskReport, TaskResolution,
};
use crate::ports::{Clock, EventSink, IdGenerator, RunnerDispatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Upper bound on one task, from acquisition to signal. `None` waits forever.
    pub task_timeout: Option<Duration>,
    pub single_policy: TabPolicy,
    pub batch_policy: TabPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            task_timeout: None,
            single_policy: TabPolicy::ReuseExisting,
            batch_policy: TabPolicy::AlwaysNew,
        }
    }
}

/// Collaborators the driver needs.
pub struct CoordinatorDeps {
    pub tabs: TabLifecycleManager,
    pub dispatch: Arc<dyn RunnerDispatch>,
    pub bus: Arc<SignalBus>,
    pub events: Arc<dyn EventSink>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

struct Shared {
    queue: Mutex<VecDeque<PromptTask>>,
    notify: Notify,
    status: watch::Sender<CoordinatorStatus>,
    history: Mutex<Vec<TaskReport>>,
    next_ordinal: AtomicU32,
    accepting: AtomicBool,
    stopped: watch::Sender<bool>,
    events: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
}

impl Shared {
    fn enqueue(
        &self,
        prompts: Vec<String>,
        policy: TabPolicy,
        batch: bool,
    ) -> Result<Vec<TaskId>, ShuttleError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(ShuttleError::ShutDown);
        }
        if prompts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_id = batch.then(|| self.ids.generate_batch_id());
        let mut enqueued = Vec::with_capacity(prompts.len());
        {
            let mut queue = self.queue.lock();
            for prompt in prompts {
                let ordinal = self.next_ordinal.fetch_add(1, Ordering::Relaxed);
                let mut task =
                    PromptTask::new(self.ids.generate_task_id(), prompt, ordinal, policy);
                if let Some(batch_id) = batch_id {
                    task = task.in_batch(batch_id);
                }
                enqueued.push((task.task_id(), ordinal));
                queue.push_back(task);
            }
            let queued = queue.len();
            self.status.send_modify(|s| s.queued = queued);
        }

        for (task_id, ordinal) in &enqueued {
            self.events.emit(DomainEvent::TaskEnqueued {
                task_id: *task_id,
                ordinal: *ordinal,
            });
        }
        self.notify.notify_one();

        Ok(enqueued.into_iter().map(|(task_id, _)| task_id).collect())
    }

    /// Pop the head task and mark it in flight.
    fn take_next(&self) -> Option<PromptTask> {
        let mut queue = self.queue.lock();
        let task = queue.pop_front()?;
        let queued = queue.len();
        self.status.send_modify(|s| {
            s.state = CoordinatorState::Busy {
                in_flight: task.task_id(),
            };
            s.queued = queued;
        });
        Some(task)
    }

    fn finish(&self, report: TaskReport) {
        self.history.lock().push(report);

        let drained = {
            let queue = self.queue.lock();
            let queued = queue.len();
            self.status.send_modify(|s| {
                s.state = CoordinatorState::Idle;
                s.queued = queued;
                s.completed += 1;
            });
            queued == 0
        };
        if drained {
            info!("queue drained");
            self.events.emit(DomainEvent::QueueDrained);
        }
    }
}

/// Handle to the running coordinator.
pub struct Coordinator {
    shared: Arc<Shared>,
    config: CoordinatorConfig,
    shutdown_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Start the driver loop on the current runtime.
    pub fn spawn(config: CoordinatorConfig, deps: CoordinatorDeps) -> Self {
        let (status, _) = watch::channel(CoordinatorStatus::idle());
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            status,
            history: Mutex::new(Vec::new()),
            next_ordinal: AtomicU32::new(1),
            accepting: AtomicBool::new(true),
            stopped: watch::Sender::new(false),
            events: Arc::clone(&deps.events),
            ids: Arc::clone(&deps.ids),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = Driver {
            shared: Arc::clone(&shared),
            task_timeout: config.task_timeout,
            deps,
        };
        let join = tokio::spawn(driver.run(shutdown_rx));

        Self {
            shared,
            config,
            shutdown_tx,
            join: Mutex::new(Some(join)),
        }
    }

    /// `startAutomation`: one prompt, default single-task tab policy.
    pub fn submit_single(&self, prompt: impl Into<String>) -> Result<TaskId, ShuttleError> {
        let ids = self
            .shared
            .enqueue(vec![prompt.into()], self.config.single_policy, false)?;
        ids.into_iter()
            .next()
            .ok_or_else(|| ShuttleError::Other("prompt was not enqueued".to_string()))
    }

    /// `startBatchAutomation`: prompts run in the given order. Empty is a no-op.
    pub fn submit_batch<I, S>(&self, prompts: I) -> Result<Vec<TaskId>, ShuttleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts = prompts.into_iter().map(Into::into).collect();
        self.shared.enqueue(prompts, self.config.batch_policy, true)
    }

    pub fn handle(&self, message: ControlMessage) -> Result<Vec<TaskId>, ShuttleError> {
        match message {
            ControlMessage::StartAutomation { prompt } => {
                self.submit_single(prompt).map(|id| vec![id])
            }
            ControlMessage::StartBatchAutomation { prompts } => self.submit_batch(prompts),
        }
    }

    pub fn status(&self) -> CoordinatorStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.shared.status.subscribe()
    }

    /// Reports of every resolved task, in resolution order.
    pub fn history(&self) -> Vec<TaskReport> {
        self.shared.history.lock().clone()
    }

    /// Wait until nothing is queued or in flight.
    ///
    /// Fails with `ShutDown` if the driver stops with work outstanding.
    pub async fn wait_idle(&self) -> Result<(), ShuttleError> {
        let mut status = self.shared.status.subscribe();
        let mut stopped = self.shared.stopped.subscribe();

        loop {
            if status.borrow_and_update().is_idle() {
                return Ok(());
            }
            if *stopped.borrow_and_update() {
                return Err(ShuttleError::ShutDown);
            }
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        return Err(ShuttleError::ShutDown);
                    }
                }
                _ = stopped.changed() => {}
            }
        }
    }

    /// Stop taking tasks, let the in-flight one finish, join the driver.
    pub async fn shutdown(&self) {
        self.shared.accepting.store(false, Ordering::Release);
        // ignore send error: the driver may already be gone
        let _ = self.shutdown_tx.send(true);

        let join = self.join.lock().take();
        if let Some(join) = join {
            let _ = join.await;
        }

        let abandoned = self.shared.queue.lock().len();
        if abandoned > 0 {
            warn!(abandoned, "coordinator stopped with queued tasks");
        }
    }
}

struct Driver {
    shared: Arc<Shared>,
    task_timeout: Option<Duration>,
    deps: CoordinatorDeps,
}

impl Driver {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let Some(task) = self.shared.take_next() else {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = self.shared.notify.notified() => {}
                }
                continue;
            };

            let span = info_span!("task", task_id = %task.task_id(), ordinal = task.ordinal());
            let report = self.process(task).instrument(span).await;
            self.shared.finish(report);
        }

        // no runner may outlive the driver
        let last_tab = self.shared.history.lock().last().and_then(|r| r.tab_id.clone());
        if let Some(tab_id) = last_tab {
            self.deps.dispatch.cancel(&tab_id).await;
        }
        self.shared.accepting.store(false, Ordering::Release);
        self.shared.stopped.send_replace(true);
    }

    async fn process(&self, task: PromptTask) -> TaskReport {
        let started_at = self.deps.clock.now();
        let mut tab_id = None;

        let finished = {
            let work = self.drive(&task, &mut tab_id);
            match self.task_timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.ok(),
                None => Some(work.await),
            }
        };
        let resolution = match finished {
            Some(resolution) => resolution,
            None => {
                warn!(
                    kind = ?FailureKind::LostSignal,
                    limit = ?self.task_timeout,
                    "task timed out"
                );
                // the runner must not keep touching the page once the queue moves on
                if let Some(tab_id) = &tab_id {
                    self.deps.dispatch.cancel(tab_id).await;
                }
                TaskResolution::TimedOut
            }
        };

        self.deps.events.emit(DomainEvent::TaskResolved {
            task_id: task.task_id(),
            resolution: resolution.clone(),
        });

        TaskReport {
            task_id: task.task_id(),
            ordinal: task.ordinal(),
            tab_id,
            resolution,
            started_at,
            finished_at: self.deps.clock.now(),
        }
    }

    async fn drive(&self, task: &PromptTask, tab_slot: &mut Option<TabId>) -> TaskResolution {
        let task_id = task.task_id();
        let events = &self.deps.events;

        let acquired = match self.deps.tabs.acquire(task.tab_policy()).await {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(error = %err, "could not obtain a tab");
                return TaskResolution::TabLost {
                    reason: err.to_string(),
                };
            }
        };
        *tab_slot = Some(acquired.handle.tab_id.clone());
        events.emit(DomainEvent::TabAcquired {
            task_id,
            tab_id: acquired.handle.tab_id.clone(),
            reused: acquired.reused,
        });

        let tab = match acquired.load.wait().await {
            Ok(tab) => tab,
            Err(err) => {
                warn!(error = %err, "tab never finished loading");
                return TaskResolution::TabLost {
                    reason: err.to_string(),
                };
            }
        };
        events.emit(DomainEvent::TabLoaded {
            task_id,
            tab_id: tab.tab_id.clone(),
        });

        // registered before dispatch so the signal cannot arrive unobserved
        let mut subscription = self.deps.bus.subscribe(&tab.tab_id);

        if let Err(err) = self.deps.dispatch.dispatch(&tab, task).await {
            warn!(error = %err, "dispatch failed");
            return TaskResolution::Failed {
                reason: format!("dispatch failed: {err}"),
            };
        }
        events.emit(DomainEvent::SequenceDispatched {
            task_id,
            tab_id: tab.tab_id.clone(),
        });

        let Some(signal) = subscription.recv().await else {
            return TaskResolution::Failed {
                reason: "signal route closed before a signal arrived".to_string(),
            };
        };
        drop(subscription);

        info!(tab_id = %tab.tab_id, signal = ?signal, "completion signal received from tab");
        events.emit(DomainEvent::SignalReceived {
            task_id,
            tab_id: tab.tab_id.clone(),
            signal: signal.clone(),
        });

        match signal {
            RunnerSignal::SequenceComplete => TaskResolution::Completed,
            RunnerSignal::SequenceFailed { reason } => TaskResolution::Failed { reason },
        }
    }
}
