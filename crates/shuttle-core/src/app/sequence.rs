//! SequenceExecutor - 固定手順の実行
//!
//! One pass over the page: probe for the prompt input, apply every control
//! step best-effort, write the prompt, click submit. The pass never panics and
//! never returns `Err`; every failure is folded into a `SequenceOutcome` for
//! the Task Runner to decide on.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app::probe::PageProbe;
use crate::domain::{
    DomainEvent, FailureKind, PageError, ProbeError, PromptTask, RunnerState, SequenceOutcome,
};
use crate::ports::{EventSink, PageContext};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// A control adjustment applied before the prompt is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ControlStep {
    /// Write `value` into the control and fire `input` + `change`.
    SetValue { selector: String, value: String },
    /// Click `header` unless `container` already carries `expanded_class`.
    Expand {
        container: String,
        header: String,
        expanded_class: String,
    },
    Click { selector: String },
}

impl ControlStep {
    /// Short human-readable label used in logs and `StepSkipped` events.
    pub fn label(&self) -> String {
        match self {
            ControlStep::SetValue { selector, value } => format!("set {selector} = {value}"),
            ControlStep::Expand { container, .. } => format!("expand {container}"),
            ControlStep::Click { selector } => format!("click {selector}"),
        }
    }

    /// Every selector the step touches.
    pub fn selectors(&self) -> Vec<&str> {
        match self {
            ControlStep::SetValue { selector, .. } | ControlStep::Click { selector } => {
                vec![selector]
            }
            ControlStep::Expand {
                container, header, ..
            } => vec![container, header],
        }
    }
}

/// The fixed step list for the target page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePlan {
    pub prompt_input: String,
    #[serde(default)]
    pub controls: Vec<ControlStep>,
    pub submit: String,
}

impl Default for SequencePlan {
    fn default() -> Self {
        Self {
            prompt_input: "ms-text-chunk ms-autosize-textarea textarea".to_string(),
            controls: vec![
                // temperature
                ControlStep::SetValue {
                    selector: r#"ms-slider input[type="range"], ms-slider input"#.to_string(),
                    value: "1.2".to_string(),
                },
                // safety settings panel
                ControlStep::Expand {
                    container: "ms-prompt-run-settings > div:nth-child(14)".to_string(),
                    header: "ms-prompt-run-settings > div:nth-child(14) > :first-child"
                        .to_string(),
                    expanded_class: "expanded".to_string(),
                },
                // top-k, only rendered once the panel is open
                ControlStep::SetValue {
                    selector: "ms-prompt-run-settings .advanced-settings ms-slider input"
                        .to_string(),
                    value: "0.9".to_string(),
                },
            ],
            submit: "ms-prompt-input-wrapper run-button button".to_string(),
        }
    }
}

pub struct SequenceExecutor {
    plan: SequencePlan,
    probe: PageProbe,
    settle_delay: Duration,
    events: Arc<dyn EventSink>,
}

impl SequenceExecutor {
    pub fn new(
        plan: SequencePlan,
        probe: PageProbe,
        settle_delay: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            plan,
            probe,
            settle_delay,
            events,
        }
    }

    pub fn plan(&self) -> &SequencePlan {
        &self.plan
    }

    /// Run one attempt of the sequence for `task`.
    ///
    /// `state` is advanced through Probing → Configuring → Submitting; the
    /// caller owns the transition to `Done`.
    pub async fn run(
        &self,
        page: &dyn PageContext,
        task: &PromptTask,
        state: &watch::Sender<RunnerState>,
    ) -> SequenceOutcome {
        match self.run_steps(page, task, state).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    task_id = %task.task_id(),
                    kind = ?FailureKind::UnclassifiedRuntimeFault,
                    error = %err,
                    "sequence aborted"
                );
                SequenceOutcome::other(err.to_string())
            }
        }
    }

    async fn run_steps(
        &self,
        page: &dyn PageContext,
        task: &PromptTask,
        state: &watch::Sender<RunnerState>,
    ) -> Result<SequenceOutcome, PageError> {
        state.send_replace(RunnerState::Probing);
        match self.probe.wait(page, &self.plan.prompt_input).await {
            Ok(()) => {}
            Err(ProbeError::Timeout { selector, timeout }) => {
                warn!(
                    task_id = %task.task_id(),
                    kind = ?FailureKind::ElementTimeout,
                    selector = %selector,
                    ?timeout,
                    "prompt input did not appear"
                );
                return Ok(SequenceOutcome::timeout(selector));
            }
            Err(ProbeError::Page(err)) => return Err(err),
        }
        debug!(task_id = %task.task_id(), "prompt input found");

        state.send_replace(RunnerState::Configuring);
        for step in &self.plan.controls {
            if !self.apply(page, step).await? {
                self.skipped(task, step.label());
            }
            tokio::time::sleep(self.settle_delay).await;
        }

        state.send_replace(RunnerState::Submitting);
        if !page
            .set_value(&self.plan.prompt_input, task.prompt_text())
            .await?
        {
            return Ok(SequenceOutcome::other(format!(
                "prompt input {:?} disappeared before the prompt could be written",
                self.plan.prompt_input
            )));
        }
        tokio::time::sleep(self.settle_delay).await;

        if page.click(&self.plan.submit).await? {
            info!(task_id = %task.task_id(), "prompt submitted");
        } else {
            self.skipped(task, format!("click {}", self.plan.submit));
        }

        Ok(SequenceOutcome::Success)
    }

    /// `Ok(false)` when the targeted control is absent.
    async fn apply(&self, page: &dyn PageContext, step: &ControlStep) -> Result<bool, PageError> {
        match step {
            ControlStep::SetValue { selector, value } => page.set_value(selector, value).await,
            ControlStep::Click { selector } => page.click(selector).await,
            ControlStep::Expand {
                container,
                header,
                expanded_class,
            } => match page.has_class(container, expanded_class).await? {
                None => Ok(false),
                Some(true) => {
                    debug!(container = %container, "panel already expanded");
                    Ok(true)
                }
                Some(false) => page.click(header).await,
            },
        }
    }

    fn skipped(&self, task: &PromptTask, step: String) {
        warn!(task_id = %task.task_id(), step = %step, "control not found, skipping");
        self.events.emit(DomainEvent::StepSkipped {
            task_id: task.task_id(),
            step,
            kind: FailureKind::MissingOptionalControl,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TabPolicy, TaskId};
    use crate::impls::{InMemoryBrowser, PageAction, PageTemplate, RecordingEventSink};
    use crate::ports::TabHost;
    use tokio::time::Instant;
    use ulid::Ulid;

    struct Fixture {
        executor: SequenceExecutor,
        events: Arc<RecordingEventSink>,
        browser: InMemoryBrowser,
    }

    fn fixture(template: PageTemplate) -> Fixture {
        let events = Arc::new(RecordingEventSink::new());
        let executor = SequenceExecutor::new(
            SequencePlan::default(),
            PageProbe::default(),
            DEFAULT_SETTLE_DELAY,
            events.clone(),
        );
        Fixture {
            executor,
            events,
            browser: InMemoryBrowser::new(template),
        }
    }

    fn task(prompt: &str) -> PromptTask {
        PromptTask::new(
            TaskId::from_ulid(Ulid::new()),
            prompt,
            1,
            TabPolicy::ReuseExisting,
        )
    }

    async fn run(fx: &Fixture, task: &PromptTask) -> (SequenceOutcome, Vec<PageAction>) {
        let tab = fx.browser.create("https://example.test/").await.unwrap();
        let page = fx.browser.page(&tab).await.unwrap();
        let (state, _) = watch::channel(RunnerState::Idle);
        let outcome = fx.executor.run(page.as_ref(), task, &state).await;
        let actions = fx.browser.actions(&tab.tab_id);
        (outcome, actions)
    }

    #[tokio::test(start_paused = true)]
    async fn full_page_runs_every_step_in_order() {
        let plan = SequencePlan::default();
        let fx = fixture(PageTemplate::from_plan(&plan));
        let task = task("prompt-A");

        let (outcome, actions) = run(&fx, &task).await;

        assert_eq!(outcome, SequenceOutcome::Success);
        assert_eq!(
            actions,
            vec![
                PageAction::SetValue {
                    selector: r#"ms-slider input[type="range"], ms-slider input"#.to_string(),
                    value: "1.2".to_string(),
                },
                PageAction::Click {
                    selector: "ms-prompt-run-settings > div:nth-child(14) > :first-child"
                        .to_string(),
                },
                PageAction::SetValue {
                    selector: "ms-prompt-run-settings .advanced-settings ms-slider input"
                        .to_string(),
                    value: "0.9".to_string(),
                },
                PageAction::SetValue {
                    selector: plan.prompt_input.clone(),
                    value: "prompt-A".to_string(),
                },
                PageAction::Click {
                    selector: plan.submit.clone(),
                },
            ]
        );
        assert!(fx.events.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_follows_each_control_and_the_prompt() {
        let fx = fixture(PageTemplate::from_plan(&SequencePlan::default()));
        let started = Instant::now();

        run(&fx, &task("p")).await;

        // three controls + prompt write
        assert_eq!(started.elapsed(), DEFAULT_SETTLE_DELAY * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_control_is_skipped_and_submit_still_happens() {
        let plan = SequencePlan::default();
        let fx = fixture(
            PageTemplate::from_plan(&plan)
                .without_element(r#"ms-slider input[type="range"], ms-slider input"#),
        );

        let (outcome, actions) = run(&fx, &task("p")).await;

        assert_eq!(outcome, SequenceOutcome::Success);
        assert_eq!(
            actions.last(),
            Some(&PageAction::Click {
                selector: plan.submit.clone()
            })
        );
        let skipped: Vec<_> = fx
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, DomainEvent::StepSkipped { .. }))
            .collect();
        assert_eq!(skipped.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expanded_panel_is_not_clicked_again() {
        let plan = SequencePlan::default();
        let fx = fixture(
            PageTemplate::from_plan(&plan)
                .with_class("ms-prompt-run-settings > div:nth-child(14)", "expanded"),
        );

        let (outcome, actions) = run(&fx, &task("p")).await;

        assert_eq!(outcome, SequenceOutcome::Success);
        assert!(!actions.iter().any(|a| matches!(
            a,
            PageAction::Click { selector } if selector.ends_with(":first-child")
        )));
        assert!(fx.events.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_submit_is_skipped() {
        let plan = SequencePlan::default();
        let fx = fixture(PageTemplate::from_plan(&plan).without_element(&plan.submit));

        let (outcome, _) = run(&fx, &task("p")).await;

        assert_eq!(outcome, SequenceOutcome::Success);
        assert!(matches!(
            fx.events.events().as_slice(),
            [DomainEvent::StepSkipped { kind: FailureKind::MissingOptionalControl, .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_is_reported_without_touching_controls() {
        let plan = SequencePlan::default();
        let fx = fixture(PageTemplate::from_plan(&plan).without_element(&plan.prompt_input));

        let (outcome, actions) = run(&fx, &task("p")).await;

        assert_eq!(outcome, SequenceOutcome::timeout(plan.prompt_input.clone()));
        assert!(actions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn page_fault_aborts_the_attempt() {
        let plan = SequencePlan::default();
        let fx = fixture(
            PageTemplate::from_plan(&plan)
                .failing_on("ms-prompt-run-settings .advanced-settings ms-slider input", "boom"),
        );

        let (outcome, actions) = run(&fx, &task("p")).await;

        assert!(matches!(
            outcome,
            SequenceOutcome::OtherFailure { ref message } if message.contains("boom")
        ));
        assert!(!actions.iter().any(|a| matches!(
            a,
            PageAction::Click { selector } if *selector == plan.submit
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_prompt_input_is_a_failure() {
        let plan = SequencePlan::default();
        let fx = fixture(
            PageTemplate::from_plan(&plan)
                .with_vanishing_element(&plan.prompt_input, Duration::from_millis(100)),
        );

        let (outcome, _) = run(&fx, &task("p")).await;

        assert!(matches!(
            outcome,
            SequenceOutcome::OtherFailure { ref message } if message.contains("disappeared")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn state_token_ends_in_submitting() {
        let fx = fixture(PageTemplate::from_plan(&SequencePlan::default()));
        let tab = fx.browser.create("https://example.test/").await.unwrap();
        let page = fx.browser.page(&tab).await.unwrap();
        let (state, rx) = watch::channel(RunnerState::Idle);

        fx.executor.run(page.as_ref(), &task("p"), &state).await;

        assert_eq!(*rx.borrow(), RunnerState::Submitting);
    }

    #[test]
    fn plan_parses_from_toml() {
        let plan: SequencePlan = toml::from_str(
            r#"
            prompt_input = "textarea"
            submit = "button.run"

            [[controls]]
            step = "set_value"
            selector = "input.temp"
            value = "1.2"

            [[controls]]
            step = "expand"
            container = "div.panel"
            header = "div.panel > :first-child"
            expanded_class = "expanded"
            "#,
        )
        .unwrap();

        assert_eq!(plan.controls.len(), 2);
        assert!(matches!(
            &plan.controls[1],
            ControlStep::Expand { expanded_class, .. } if expanded_class == "expanded"
        ));
    }
}
