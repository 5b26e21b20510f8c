//! TaskRunner - 1 タスク分の実行と reload-and-retry
//!
//! # フロー
//! 1. SequenceExecutor で 1 attempt 実行 → SequenceOutcome
//! 2. AttemptRecord を記録
//! 3. Decider で次の行動を決定（Complete / Reload / Fail）
//! 4. Reload なら backoff → page.reload() → 1 に戻る
//! 5. 最終的に RunnerSignal を必ず 1 つ返す

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::app::sequence::SequenceExecutor;
use crate::domain::{
    AttemptRecord, Decider, Decision, DecisionRecord, DomainEvent, PromptTask, RunnerSignal,
    RunnerState, ShuttleError,
};
use crate::ports::{Clock, EventSink, IdGenerator, PageContext};

pub struct TaskRunner {
    executor: SequenceExecutor,
    decider: Arc<dyn Decider>,
    events: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<RunnerState>,
}

impl TaskRunner {
    pub fn new(
        executor: SequenceExecutor,
        decider: Arc<dyn Decider>,
        events: Arc<dyn EventSink>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            executor,
            decider,
            events,
            ids,
            clock,
            state,
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Execute `task` against `page` until the decider settles it.
    ///
    /// Returns exactly one signal. The only `Err` is `RunnerBusy`, when
    /// another sequence is already executing on this runner.
    pub async fn run(
        &self,
        page: &dyn PageContext,
        task: &PromptTask,
    ) -> Result<RunnerSignal, ShuttleError> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if state.is_active() {
                return false;
            }
            *state = RunnerState::Probing;
            claimed = true;
            true
        });
        if !claimed {
            return Err(ShuttleError::RunnerBusy);
        }

        let _done = DoneOnDrop(&self.state);
        Ok(self.attempt_loop(page, task).await)
    }

    async fn attempt_loop(&self, page: &dyn PageContext, task: &PromptTask) -> RunnerSignal {
        let task_id = task.task_id();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started_at = self.clock.now();
            let outcome = self.executor.run(page, task, &self.state).await;
            let completed_at = self.clock.now();

            self.events.emit(DomainEvent::AttemptFinished(AttemptRecord::new(
                self.ids.generate_attempt_id(),
                task_id,
                attempt,
                outcome.clone(),
                started_at,
                completed_at,
            )));

            let decision = self.decider.decide(attempt, &outcome);
            self.events.emit(DomainEvent::DecisionMade(DecisionRecord::new(
                task_id,
                serde_json::to_value(&outcome).unwrap_or_default(),
                self.decider.policy_name(),
                decision.name(),
                Some(serde_json::json!({ "attempt": attempt })),
                self.clock.now(),
            )));

            match decision {
                Decision::Complete => {
                    info!(%task_id, attempt, "sequence complete");
                    return RunnerSignal::SequenceComplete;
                }
                Decision::Fail { reason } => {
                    error!(%task_id, attempt, %reason, "sequence failed");
                    return RunnerSignal::SequenceFailed { reason };
                }
                Decision::Reload { delay, reason } => {
                    warn!(%task_id, attempt, %reason, "reloading page");
                    tokio::time::sleep(delay).await;
                    if let Err(err) = page.reload().await {
                        error!(%task_id, attempt, error = %err, "reload failed");
                        return RunnerSignal::SequenceFailed {
                            reason: format!("reload failed: {err}"),
                        };
                    }
                    self.events
                        .emit(DomainEvent::ReloadTriggered { task_id, attempt });
                }
            }
        }
    }
}

/// Moves the runner to `Done` however `run` exits, including cancellation.
struct DoneOnDrop<'a>(&'a watch::Sender<RunnerState>);

impl Drop for DoneOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(RunnerState::Done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::probe::PageProbe;
    use crate::app::sequence::{DEFAULT_SETTLE_DELAY, SequencePlan};
    use crate::domain::{DefaultDecider, RetryPolicy, SequenceOutcome, TabPolicy, TaskId};
    use crate::impls::{InMemoryBrowser, PageTemplate, RecordingEventSink};
    use crate::ports::{SystemClock, TabHost, UlidGenerator};
    use std::time::Duration;
    use tokio::time::Instant;
    use ulid::Ulid;

    fn runner(policy: RetryPolicy, events: Arc<RecordingEventSink>) -> TaskRunner {
        let executor = SequenceExecutor::new(
            SequencePlan::default(),
            PageProbe::default(),
            DEFAULT_SETTLE_DELAY,
            events.clone(),
        );
        TaskRunner::new(
            executor,
            Arc::new(DefaultDecider::new(policy)),
            events,
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        )
    }

    fn task() -> PromptTask {
        PromptTask::new(
            TaskId::from_ulid(Ulid::new()),
            "prompt-A",
            1,
            TabPolicy::ReuseExisting,
        )
    }

    fn reloads(events: &RecordingEventSink) -> usize {
        events
            .events()
            .iter()
            .filter(|e| matches!(e, DomainEvent::ReloadTriggered { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_page_completes_on_first_attempt() {
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(RetryPolicy::bounded_default(), events.clone());
        let browser = InMemoryBrowser::new(PageTemplate::from_plan(&SequencePlan::default()));
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        let signal = runner.run(page.as_ref(), &task()).await.unwrap();

        assert_eq!(signal, RunnerSignal::SequenceComplete);
        assert_eq!(runner.state(), RunnerState::Done);
        assert_eq!(reloads(&events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_reloads_once_then_succeeds() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(
            RetryPolicy {
                max_attempts: Some(3),
                base_delay: Duration::ZERO,
                multiplier: 1.0,
            },
            events.clone(),
        );
        let browser = InMemoryBrowser::new(
            PageTemplate::from_plan(&plan).with_element_missing_for_loads(&plan.prompt_input, 1),
        );
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        let signal = runner.run(page.as_ref(), &task()).await.unwrap();

        assert_eq!(signal, RunnerSignal::SequenceComplete);
        assert_eq!(reloads(&events), 1);
        assert_eq!(browser.reload_count(&tab.tab_id), 1);

        let outcomes: Vec<_> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DomainEvent::AttemptFinished(record) => Some((record.attempt, record.outcome)),
                _ => None,
            })
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (1, SequenceOutcome::timeout(plan.prompt_input.clone())),
                (2, SequenceOutcome::Success),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_capped() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(
            RetryPolicy {
                max_attempts: Some(2),
                base_delay: Duration::from_secs(1),
                multiplier: 2.0,
            },
            events.clone(),
        );
        let template = PageTemplate::from_plan(&plan).without_element(&plan.prompt_input);
        let browser = InMemoryBrowser::new(template);
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();
        let started = Instant::now();

        let signal = runner.run(page.as_ref(), &task()).await.unwrap();

        assert!(matches!(
            signal,
            RunnerSignal::SequenceFailed { reason } if reason.contains("2 attempts")
        ));
        assert_eq!(reloads(&events), 1);
        // two 20s probe windows and one 1s backoff
        assert_eq!(started.elapsed(), Duration::from_secs(41));
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_fault_still_signals() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(RetryPolicy::bounded_default(), events.clone());
        let template = PageTemplate::from_plan(&plan).failing_on(&plan.submit, "null button");
        let browser = InMemoryBrowser::new(template);
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        let signal = runner.run(page.as_ref(), &task()).await.unwrap();

        assert!(matches!(
            signal,
            RunnerSignal::SequenceFailed { reason } if reason.contains("null button")
        ));
        assert_eq!(reloads(&events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_run_is_refused() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = Arc::new(runner(RetryPolicy::bounded_default(), events));
        let browser = InMemoryBrowser::new(
            PageTemplate::from_plan(&plan)
                .with_delayed_element(&plan.prompt_input, Duration::from_secs(5)),
        );
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        let first = {
            let runner = runner.clone();
            let page = page.clone();
            tokio::spawn(async move { runner.run(page.as_ref(), &task()).await })
        };
        let mut state = runner.subscribe_state();
        state.wait_for(|s| s.is_active()).await.unwrap();

        let second = runner.run(page.as_ref(), &task()).await;
        assert!(matches!(second, Err(ShuttleError::RunnerBusy)));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first, RunnerSignal::SequenceComplete);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_releases_the_runner() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(RetryPolicy::unbounded(), events);
        let template = PageTemplate::from_plan(&plan).without_element(&plan.prompt_input);
        let browser = InMemoryBrowser::new(template);
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        let stalled =
            tokio::time::timeout(Duration::from_secs(5), runner.run(page.as_ref(), &task())).await;

        assert!(stalled.is_err());
        assert_eq!(runner.state(), RunnerState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn decisions_are_recorded_per_attempt() {
        let plan = SequencePlan::default();
        let events = Arc::new(RecordingEventSink::new());
        let runner = runner(
            RetryPolicy {
                max_attempts: Some(3),
                base_delay: Duration::ZERO,
                multiplier: 1.0,
            },
            events.clone(),
        );
        let browser = InMemoryBrowser::new(
            PageTemplate::from_plan(&plan).with_element_missing_for_loads(&plan.prompt_input, 1),
        );
        let tab = browser.create("https://example.test/").await.unwrap();
        let page = browser.page(&tab).await.unwrap();

        runner.run(page.as_ref(), &task()).await.unwrap();

        let decisions: Vec<_> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DomainEvent::DecisionMade(record) => Some(record.decision),
                _ => None,
            })
            .collect();
        assert_eq!(decisions, vec!["reload_and_retry", "complete"]);
    }
}
