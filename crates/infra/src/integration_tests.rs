//! Integration tests for the full pipeline.
//!
//! Tests: Effect → EffectStream → EffectLog → replay, watchers → WatcherWorker,
//! and derived state → matching.
//!
//! Verifies:
//! - A restored stream derives exactly what the writer derived
//! - Processor vetoes never reach the log
//! - Watcher notifications are handled off the writer's thread
//! - Quantities derived from the stream drive flow-constraint matching

use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use flowmatch_availability::DEFAULT_HORIZON_DAYS;
use flowmatch_core::{
    AvailabilityWindow, SlotLocation, SlotTiming, StreamId, TemporalEnvelope, TimeRange,
};
use flowmatch_events::{
    AssertionPhase, Clock, CompareOp, CompositeEffect, Delta, Effect, EffectStream, ManualClock,
    NonNegativeGuard, PredicateOutcome, StateKey, StatePredicate, StreamError, WatcherNotification,
};
use flowmatch_matching::{
    FlowConstraints, MatchContext, Slot, group_slots_by_space_time, match_batch, score_match,
};

use crate::config::EngineConfig;
use crate::effect_log::{EffectLog, InMemoryEffectLog, PersistError, PersistentEffectStream};
use crate::workers::WatcherWorker;

fn t(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
}

fn setup(
    config: &EngineConfig,
) -> (
    Arc<ManualClock>,
    Arc<InMemoryEffectLog>,
    PersistentEffectStream<Arc<InMemoryEffectLog>>,
) {
    let clock = Arc::new(ManualClock::new(t(7, 8)));
    let log = Arc::new(InMemoryEffectLog::new());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let stream = EffectStream::with_config(StreamId::new(), config.stream_config(), dyn_clock)
        .with_processor(NonNegativeGuard);
    let persistent = PersistentEffectStream::new(stream, log.clone());
    (clock, log, persistent)
}

fn stock(amount: f64, valid: DateTime<Utc>, known: DateTime<Utc>) -> Effect {
    Effect::new(
        StateKey::new("forklift-pool", "quantity"),
        Delta::Increment(amount),
        TemporalEnvelope::new(valid, known),
    )
}

fn accept(
    stream: &mut PersistentEffectStream<Arc<InMemoryEffectLog>>,
    effect: Effect,
) -> Result<(), PersistError> {
    let entry = stream.append(effect)?;
    stream.transition(entry.id(), AssertionPhase::ACCEPTED)?;
    Ok(())
}

#[test]
fn restored_stream_derives_what_the_writer_derived() {
    let config = EngineConfig::default();
    let (clock, log, mut writer) = setup(&config);
    let key = StateKey::new("forklift-pool", "quantity");

    accept(&mut writer, stock(4.0, t(7, 6), t(7, 6))).unwrap();
    clock.set(t(7, 10));
    accept(&mut writer, stock(3.0, t(7, 9), t(7, 9))).unwrap();

    let rejected = writer.append(stock(100.0, t(7, 9), t(7, 9))).unwrap();
    writer
        .transition(rejected.id(), AssertionPhase::REJECTED)
        .unwrap();

    let pair = CompositeEffect::new(vec![
        stock(-2.0, t(7, 10), t(7, 10)),
        Effect::new(
            StateKey::new("yard", "forklifts-out"),
            Delta::Increment(2.0),
            TemporalEnvelope::new(t(7, 10), t(7, 10)),
        ),
    ]);
    let composite = pair.id;
    writer.append_composite(pair).unwrap();
    clock.set(t(7, 11));
    writer
        .transition_composite(composite, AssertionPhase::ACCEPTED)
        .unwrap();

    let replacement_of = writer.append(stock(1.0, t(7, 11), t(7, 11))).unwrap();
    writer
        .modify(replacement_of.id(), stock(2.0, t(7, 11), t(7, 11)))
        .unwrap();

    let stream_id = writer.stream().id();
    let restored = PersistentEffectStream::restore(
        log.clone(),
        stream_id,
        config.stream_config(),
        clock.clone(),
    )
    .unwrap();

    assert_eq!(restored.stream().entries(), writer.stream().entries());
    assert_eq!(restored.stream().records_since(0), writer.stream().records_since(0));

    for as_of in [
        TemporalEnvelope::latest(),
        TemporalEnvelope::at(t(7, 8)),
        TemporalEnvelope::new(t(7, 12), t(7, 9)),
    ] {
        assert_eq!(
            restored.stream().derive(&key, &as_of).unwrap(),
            writer.stream().derive(&key, &as_of).unwrap(),
        );
    }
    assert_eq!(
        restored.stream().derive(&key, &TemporalEnvelope::latest()).unwrap(),
        json!(7.0)
    );
    assert_eq!(log.load(stream_id).unwrap().len(), writer.persisted_position() as usize);
}

#[test]
fn processor_vetoes_are_not_persisted() {
    let (_clock, log, mut stream) = setup(&EngineConfig::default());

    accept(&mut stream, stock(2.0, t(7, 6), t(7, 6))).unwrap();
    let before = log.load(stream.stream().id()).unwrap().len();

    let withdrawal = stream.append(stock(-5.0, t(7, 7), t(7, 7))).unwrap();
    let err = stream
        .transition(withdrawal.id(), AssertionPhase::ACCEPTED)
        .unwrap_err();

    assert!(matches!(
        err,
        PersistError::Stream(StreamError::ProcessorRejected { .. })
    ));
    // Only the pending append of the withdrawal was added.
    assert_eq!(log.load(stream.stream().id()).unwrap().len(), before + 1);
    assert_eq!(
        stream.stream().derive_now(&StateKey::new("forklift-pool", "quantity")).unwrap(),
        json!(2.0)
    );
}

#[test]
fn watcher_worker_reacts_to_low_stock() {
    let config = EngineConfig::default();
    let (_clock, _log, mut stream) = setup(&config);
    let key = StateKey::new("forklift-pool", "quantity");

    let watcher = stream.subscribe(StatePredicate::new(key, CompareOp::Lt, json!(3)));
    let (tx, rx) = channel();
    let worker = WatcherWorker::spawn("low-stock", watcher, move |n: WatcherNotification| {
        tx.send((n.value, n.outcome)).map_err(|e| e.to_string())
    })
    .unwrap();

    accept(&mut stream, stock(5.0, t(7, 6), t(7, 6))).unwrap();
    accept(&mut stream, stock(-3.0, t(7, 7), t(7, 7))).unwrap();

    let timeout = Duration::from_secs(2);
    assert_eq!(
        rx.recv_timeout(timeout).unwrap(),
        (Some(json!(5.0)), PredicateOutcome::Unsatisfied)
    );
    assert_eq!(
        rx.recv_timeout(timeout).unwrap(),
        (Some(json!(2.0)), PredicateOutcome::Satisfied)
    );

    worker.shutdown();
}

fn porto_morning() -> SlotTiming {
    SlotTiming {
        start_date: Some(t(9, 0)),
        end_date: Some(Utc.with_ymd_and_hms(2025, 4, 9, 23, 59, 0).unwrap()),
        availability_window: Some(AvailabilityWindow::from_time_ranges(vec![TimeRange::new(
            "09:00", "12:00",
        )])),
        ..SlotTiming::default()
    }
}

fn in_city(city: &str) -> SlotLocation {
    SlotLocation {
        city: Some(city.into()),
        country: Some("PT".into()),
        ..SlotLocation::default()
    }
}

#[test]
fn derived_quantity_drives_flow_constraints() {
    let config = EngineConfig::from_lookup(|var| {
        (var == crate::config::ENV_DEFAULT_SEARCH_RADIUS_KM).then(|| "25".to_string())
    })
    .unwrap();
    assert_eq!(config.recurrence_horizon_days, DEFAULT_HORIZON_DAYS);

    let (_clock, _log, mut stream) = setup(&config);
    let key = StateKey::new("forklift-pool", "quantity");
    let ctx = MatchContext::new(t(7, 8)).with_defaults(config.match_defaults());

    let capacity = Slot::new("depot")
        .with_resource_type("forklift")
        .with_timing(porto_morning())
        .with_location(in_city("Porto"))
        .with_flow(FlowConstraints {
            min_atomic_size: Some(5.0),
            ..FlowConstraints::default()
        });

    let need_from_stream = |stream: &PersistentEffectStream<Arc<InMemoryEffectLog>>| {
        let quantity = stream
            .stream()
            .derive_now(&key)
            .unwrap()
            .as_f64()
            .unwrap_or(0.0);
        Slot::new("site")
            .with_resource_type("Forklift")
            .with_quantity(quantity)
            .with_timing(porto_morning())
            .with_location(in_city("Porto"))
    };

    accept(&mut stream, stock(3.0, t(7, 6), t(7, 6))).unwrap();
    assert!(!score_match(&need_from_stream(&stream), &capacity, &ctx).is_match());

    accept(&mut stream, stock(2.0, t(7, 7), t(7, 7))).unwrap();
    assert!(score_match(&need_from_stream(&stream), &capacity, &ctx).is_match());
}

#[test]
fn batch_matching_and_grouping_agree_on_buckets() {
    let ctx = MatchContext::new(t(7, 8)).with_defaults(EngineConfig::default().match_defaults());

    let needs: Vec<Slot> = (0..3)
        .map(|i| {
            Slot::new(format!("need-{i}"))
                .with_quantity(2.0)
                .with_timing(porto_morning())
                .with_location(in_city("Porto"))
        })
        .collect();
    let capacities = vec![
        Slot::new("porto").with_timing(porto_morning()).with_location(in_city("Porto")),
        Slot::new("faro").with_timing(porto_morning()).with_location(SlotLocation {
            city: Some("Faro".into()),
            country: Some("ES".into()),
            ..SlotLocation::default()
        }),
    ];

    let matches = match_batch(&needs, &capacities, &ctx);
    let pairs: Vec<(&str, &str)> = matches
        .iter()
        .map(|m| (m.need_id.as_str(), m.capacity_id.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("need-0", "porto"), ("need-1", "porto"), ("need-2", "porto")]
    );

    let groups = group_slots_by_space_time(&needs);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].slot_ids.len(), 3);
    assert_eq!(groups[0].total_quantity, 6.0);
}
