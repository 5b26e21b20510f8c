//! End-to-end scenarios against the in-memory browser.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use shuttle_core::app::SequencePlan;
use shuttle_core::domain::{
    DomainEvent, FailureKind, RunnerSignal, SequenceOutcome, SignalEnvelope, TabId, TaskResolution,
};
use shuttle_core::impls::{InMemoryBrowser, PageAction, PageTemplate, RecordingEventSink};
use shuttle_core::{App, AppBuilder, ShuttleConfig};
use tokio::time::Instant;

struct World {
    app: App,
    browser: Arc<InMemoryBrowser>,
    events: Arc<RecordingEventSink>,
}

fn world(template: PageTemplate) -> World {
    let browser = Arc::new(InMemoryBrowser::new(template));
    let events = Arc::new(RecordingEventSink::new());
    let app = AppBuilder::new(browser.clone())
        .config(ShuttleConfig::default())
        .event_sink(events.clone())
        .build()
        .unwrap();
    World {
        app,
        browser,
        events,
    }
}

fn plan() -> SequencePlan {
    SequencePlan::default()
}

fn position(events: &[DomainEvent], pred: impl Fn(&DomainEvent) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .expect("event should have been emitted")
}

fn prompt_written(actions: &[PageAction]) -> Option<String> {
    let input = plan().prompt_input;
    actions.iter().find_map(|a| match a {
        PageAction::SetValue { selector, value } if *selector == input => Some(value.clone()),
        _ => None,
    })
}

#[tokio::test(start_paused = true)]
async fn batch_runs_one_tab_at_a_time_in_order() {
    let w = world(PageTemplate::from_plan(&plan()).with_load_delay(Duration::from_millis(800)));

    let ids = w
        .app
        .coordinator
        .submit_batch(["prompt-A", "prompt-B"])
        .unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    let (a, b) = (ids[0], ids[1]);
    let events = w.events.events();

    let a_signal = position(&events, |e| {
        matches!(e, DomainEvent::SignalReceived { task_id, .. } if *task_id == a)
    });
    let b_tab = position(&events, |e| {
        matches!(e, DomainEvent::TabAcquired { task_id, .. } if *task_id == b)
    });
    assert!(a_signal < b_tab, "tab for prompt-B opened before prompt-A signalled");

    let tabs = w.browser.tabs();
    assert_eq!(tabs.len(), 2);
    assert_eq!(
        prompt_written(&w.browser.actions(&tabs[0].tab_id)).as_deref(),
        Some("prompt-A")
    );
    assert_eq!(
        prompt_written(&w.browser.actions(&tabs[1].tab_id)).as_deref(),
        Some("prompt-B")
    );

    let history = w.app.coordinator.history();
    assert_eq!(
        history.iter().map(|r| r.task_id).collect::<Vec<_>>(),
        vec![a, b]
    );
    assert!(history.iter().all(|r| r.resolution == TaskResolution::Completed));
    assert!(w.app.coordinator.status().is_idle());
}

#[rstest]
#[case::empty(0)]
#[case::one(1)]
#[case::several(4)]
#[tokio::test(start_paused = true)]
async fn every_prompt_gets_exactly_one_signal(#[case] n: usize) {
    let w = world(PageTemplate::from_plan(&plan()));
    let prompts: Vec<String> = (0..n).map(|i| format!("prompt-{i}")).collect();

    let ids = w.app.coordinator.submit_batch(prompts).unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    let events = w.events.events();
    let signalled: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DomainEvent::SignalReceived { task_id, .. } => Some(*task_id),
            _ => None,
        })
        .collect();
    let dispatched: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DomainEvent::SequenceDispatched { task_id, .. } => Some(*task_id),
            _ => None,
        })
        .collect();

    assert_eq!(signalled, ids);
    assert_eq!(dispatched, ids);
    assert_eq!(w.app.coordinator.status().completed, n);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_follow_load_dispatch_signal_order() {
    let w = world(PageTemplate::from_plan(&plan()).with_load_delay(Duration::from_secs(2)));

    let id = w.app.coordinator.submit_single("prompt-A").unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    let events = w.events.for_task(id);
    let loaded = position(&events, |e| matches!(e, DomainEvent::TabLoaded { .. }));
    let dispatched = position(&events, |e| {
        matches!(e, DomainEvent::SequenceDispatched { .. })
    });
    let first_attempt = position(&events, |e| matches!(e, DomainEvent::AttemptFinished(_)));
    let signal = position(&events, |e| matches!(e, DomainEvent::SignalReceived { .. }));

    assert!(loaded < dispatched);
    assert!(dispatched < first_attempt);
    assert!(first_attempt < signal);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DomainEvent::SignalReceived { .. }))
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn probe_timeout_triggers_exactly_one_reload() {
    let plan = plan();
    let w = world(
        PageTemplate::from_plan(&plan).with_element_missing_for_loads(&plan.prompt_input, 1),
    );
    let started = Instant::now();

    let id = w.app.coordinator.submit_single("prompt-A").unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    let events = w.events.for_task(id);
    let timed_out = position(&events, |e| {
        matches!(e, DomainEvent::AttemptFinished(r) if r.outcome.is_timeout())
    });
    let reload = position(&events, |e| matches!(e, DomainEvent::ReloadTriggered { .. }));
    let succeeded = position(&events, |e| {
        matches!(e, DomainEvent::AttemptFinished(r) if r.outcome == SequenceOutcome::Success)
    });
    let signal = position(&events, |e| matches!(e, DomainEvent::SignalReceived { .. }));

    assert!(timed_out < reload && reload < succeeded && succeeded < signal);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DomainEvent::ReloadTriggered { .. }))
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DomainEvent::SignalReceived { .. }))
            .count(),
        1
    );

    let tab = &w.browser.tabs()[0];
    assert_eq!(w.browser.reload_count(&tab.tab_id), 1);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(
        w.app.coordinator.history()[0].resolution,
        TaskResolution::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn stray_signal_does_not_advance_the_queue() {
    let plan = plan();
    let w = world(
        PageTemplate::from_plan(&plan)
            .with_delayed_element(&plan.prompt_input, Duration::from_secs(3)),
    );

    let ids = w
        .app
        .coordinator
        .submit_batch(["prompt-A", "prompt-B"])
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let delivered = w.app.signal_bus.publish(SignalEnvelope::new(
        TabId::new("not-our-tab"),
        RunnerSignal::SequenceComplete,
    ));
    assert!(!delivered);
    assert_eq!(w.app.coordinator.status().in_flight(), Some(ids[0]));
    assert_eq!(w.browser.tab_count(), 1);

    w.app.coordinator.wait_idle().await.unwrap();
    assert!(w.events.events().contains(&DomainEvent::StraySignalIgnored {
        origin: TabId::new("not-our-tab")
    }));
    assert_eq!(w.app.coordinator.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_control_still_reaches_submit() {
    let plan = plan();
    let top_k = "ms-prompt-run-settings .advanced-settings ms-slider input";
    let w = world(PageTemplate::from_plan(&plan).without_element(top_k));

    let id = w.app.coordinator.submit_single("prompt-A").unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    let tab = &w.browser.tabs()[0];
    assert_eq!(
        w.browser.actions(&tab.tab_id).last(),
        Some(&PageAction::Click {
            selector: plan.submit.clone()
        })
    );
    assert!(w.events.for_task(id).iter().any(|e| matches!(
        e,
        DomainEvent::StepSkipped { step, kind: FailureKind::MissingOptionalControl, .. }
            if step.contains(top_k)
    )));
    assert_eq!(
        w.app.coordinator.history()[0].resolution,
        TaskResolution::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn present_prompt_input_costs_no_poll_interval() {
    let w = world(PageTemplate::from_plan(&plan()));
    let started = Instant::now();

    w.app.coordinator.submit_single("prompt-A").unwrap();
    w.app.coordinator.wait_idle().await.unwrap();

    // three control settles plus the prompt settle; no 500ms probe sleep
    assert_eq!(started.elapsed(), Duration::from_millis(300 * 4));
}
