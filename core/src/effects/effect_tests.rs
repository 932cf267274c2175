//! Tests for the per-effect state machine, driven with synthetic instants.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use havoc_types::{Condition, EffectSpec, EngineSettings};

use super::{Effect, EffectBehavior, EffectError, EffectSignal, TickOutcome, VariableRestore};
use crate::context::EngineContext;
use crate::dispatch::DispatchRequest;
use crate::events::EventBus;
use crate::state::StateCache;
use crate::state::cache::VAR_POSITION;
use crate::test_support::MockConsole;

const REAL_POSITION: &str = "setpos 104.50 -220.00 64.03;setang 0.00 90.00 0.00";
const NO_CAMERA_POSITION: &str = "setpos 0.000000 0.000000 0.000000;setang 0.00 0.00 0.00";

fn make_ctx() -> (Arc<MockConsole>, EngineContext) {
    let console = Arc::new(MockConsole::new());
    let settings = EngineSettings::default();
    let state = Arc::new(StateCache::new(console.clone(), &settings));
    state.observe(VAR_POSITION, REAL_POSITION);
    let ctx = EngineContext::new(console.clone(), Arc::new(EventBus::new()), state, settings);
    (console, ctx)
}

fn set_map_loaded(ctx: &EngineContext, loaded: bool) {
    let position = if loaded { REAL_POSITION } else { NO_CAMERA_POSITION };
    ctx.state.observe(VAR_POSITION, position);
}

#[derive(Default)]
struct Counters {
    starts: AtomicU32,
    ticks: AtomicU32,
    stops: AtomicU32,
}

impl Counters {
    fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

fn counting_timed(counters: &Arc<Counters>) -> EffectBehavior {
    EffectBehavior::Timed {
        on_start: Box::new({
            let counters = counters.clone();
            move |_, _| {
                counters.starts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
        on_tick: Some(Box::new({
            let counters = counters.clone();
            move |_, _, _| {
                counters.ticks.fetch_add(1, Ordering::SeqCst);
                Ok(TickOutcome::Continue)
            }
        })),
        on_stop: Box::new({
            let counters = counters.clone();
            move |_, _| {
                counters.stops.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    }
}

fn timed_spec(id: &str, duration_secs: f32) -> EffectSpec {
    let mut spec = EffectSpec::new(id, id);
    spec.duration_secs = duration_secs;
    spec.active_when = Condition::MapLoaded;
    spec
}

fn request(id: &str) -> DispatchRequest {
    DispatchRequest::new(id)
}

fn drive(effect: &mut Effect, now: Instant, ctx: &EngineContext) -> Vec<EffectSignal> {
    let mut signals = Vec::new();
    effect
        .update_at(now, ctx, &mut |signal| signals.push(signal))
        .unwrap();
    signals
}

#[test]
fn runs_for_its_duration_then_closes() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();

    assert!(effect.is_closed());
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();
    assert!(!effect.is_closed());
    assert_eq!(counters.starts(), 1);

    let signals = drive(&mut effect, t0 + Duration::from_secs(10), &ctx);
    assert!(signals.is_empty());
    assert_eq!(effect.elapsed(), Duration::from_secs(10));
    assert_eq!(effect.remaining(), Duration::from_secs(50));
    assert_eq!(counters.ticks(), 1);

    let signals = drive(&mut effect, t0 + Duration::from_secs(70), &ctx);
    assert_eq!(signals, vec![EffectSignal::Closing]);
    assert!(effect.is_closed());
    assert!(effect.elapsed() <= effect.duration(), "elapsed never exceeds duration");
    assert_eq!(effect.elapsed(), Duration::from_secs(60));
    assert_eq!(counters.stops(), 1);
}

#[test]
fn closed_means_no_current_request() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();

    assert!(effect.current_request().is_none());
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();
    assert!(effect.current_request().is_some());

    drive(&mut effect, t0 + Duration::from_secs(61), &ctx);
    assert!(effect.is_closed());
    assert!(effect.current_request().is_none());
}

#[test]
fn pause_stops_the_clock_and_extends_wall_time() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();

    drive(&mut effect, t0 + Duration::from_secs(10), &ctx);
    assert_eq!(effect.elapsed(), Duration::from_secs(10));

    set_map_loaded(&ctx, false);
    let signals = drive(&mut effect, t0 + Duration::from_secs(11), &ctx);
    assert_eq!(signals, vec![EffectSignal::Paused(Duration::from_secs(50))]);
    assert!(effect.is_paused());

    // Further unavailable ticks stay silent and credit nothing.
    let signals = drive(&mut effect, t0 + Duration::from_secs(14), &ctx);
    assert!(signals.is_empty());
    assert_eq!(effect.elapsed(), Duration::from_secs(10));

    set_map_loaded(&ctx, true);
    let signals = drive(&mut effect, t0 + Duration::from_secs(15), &ctx);
    assert_eq!(signals, vec![EffectSignal::Resumed(Duration::from_secs(50))]);
    assert!(!effect.is_paused());
    assert_eq!(
        effect.elapsed(),
        Duration::from_secs(10),
        "the resume tick itself credits nothing"
    );

    // 5 s spent paused: a 60 s effect closes after 65 s of wall clock.
    let signals = drive(&mut effect, t0 + Duration::from_secs(65), &ctx);
    assert_eq!(signals, vec![EffectSignal::Closing]);
    assert!(effect.is_closed());
    assert_eq!(effect.elapsed(), Duration::from_secs(60));
    assert_eq!(counters.stops(), 1);
}

#[test]
fn pause_near_the_end_still_closes_after_resume() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();

    drive(&mut effect, t0 + Duration::from_secs(59), &ctx);

    set_map_loaded(&ctx, false);
    let signals = drive(&mut effect, t0 + Duration::from_secs(60), &ctx);
    assert_eq!(signals, vec![EffectSignal::Paused(Duration::from_secs(1))]);
    assert!(!effect.is_closed());

    set_map_loaded(&ctx, true);
    let signals = drive(&mut effect, t0 + Duration::from_secs(65), &ctx);
    assert_eq!(signals, vec![EffectSignal::Resumed(Duration::from_secs(1))]);

    let signals = drive(&mut effect, t0 + Duration::from_secs(66), &ctx);
    assert_eq!(signals, vec![EffectSignal::Closing]);
    assert!(effect.is_closed());
}

#[test]
fn starting_while_running_is_rejected() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();

    let err = effect
        .start_at(t0 + Duration::from_secs(1), &ctx, request("slow_time"))
        .unwrap_err();
    assert!(matches!(err, EffectError::AlreadyRunning));
    assert_eq!(counters.starts(), 1);
}

#[test]
fn request_duration_overrides_spec_default() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();

    effect
        .start_at(
            t0,
            &ctx,
            request("slow_time").with_duration(Duration::from_secs(15)),
        )
        .unwrap();
    assert_eq!(effect.duration(), Duration::from_secs(15));

    let signals = drive(&mut effect, t0 + Duration::from_secs(16), &ctx);
    assert_eq!(signals, vec![EffectSignal::Closing]);
}

#[test]
fn explicit_stop_is_idempotent() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();

    effect.stop_at(t0 + Duration::from_secs(5), &ctx).unwrap();
    assert!(effect.is_closed());
    assert_eq!(effect.elapsed(), Duration::from_secs(5));
    assert_eq!(counters.stops(), 1);

    effect.stop_at(t0 + Duration::from_secs(6), &ctx).unwrap();
    assert_eq!(counters.stops(), 1, "second stop must be a no-op");
}

#[test]
fn stop_while_paused_credits_no_extra_time() {
    let (_console, ctx) = make_ctx();
    let counters = Arc::new(Counters::default());
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), counting_timed(&counters));
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("slow_time")).unwrap();

    drive(&mut effect, t0 + Duration::from_secs(10), &ctx);
    set_map_loaded(&ctx, false);
    drive(&mut effect, t0 + Duration::from_secs(12), &ctx);

    effect.stop_at(t0 + Duration::from_secs(20), &ctx).unwrap();
    assert!(effect.is_closed());
    assert_eq!(effect.elapsed(), Duration::from_secs(10));
}

#[test]
fn instant_effect_applies_and_completes_synchronously() {
    let (_console, ctx) = make_ctx();
    let applied = Arc::new(AtomicU32::new(0));
    let behavior = {
        let applied = applied.clone();
        EffectBehavior::instant(move |_, _| {
            applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let mut effect = Effect::new(EffectSpec::new("kill_user", "kill_user"), behavior);
    let t0 = Instant::now();

    effect.start_at(t0, &ctx, request("kill_user")).unwrap();
    assert_eq!(applied.load(Ordering::SeqCst), 1);
    assert!(effect.is_closed(), "instant effects never stay active");

    // Immediately startable again, and never ticked.
    let signals = drive(&mut effect, t0 + Duration::from_secs(1), &ctx);
    assert!(signals.is_empty());

    // A requested duration does not apply to instants.
    effect
        .start_at(
            t0 + Duration::from_secs(1),
            &ctx,
            request("kill_user").with_duration(Duration::from_secs(30)),
        )
        .unwrap();
    assert_eq!(applied.load(Ordering::SeqCst), 2);
    assert!(effect.is_closed());
    assert_eq!(effect.duration(), Duration::ZERO);
}

#[test]
fn failed_start_leaves_the_effect_idle() {
    let (_console, ctx) = make_ctx();
    let behavior = EffectBehavior::Timed {
        on_start: Box::new(|_, _| Err(EffectError::Failed("no such entity".to_string()))),
        on_tick: None,
        on_stop: Box::new(|_, _| Ok(())),
    };
    let mut effect = Effect::new(timed_spec("slow_time", 60.0), behavior);
    let t0 = Instant::now();

    assert!(effect.start_at(t0, &ctx, request("slow_time")).is_err());
    assert!(effect.is_closed());
}

#[test]
fn tick_can_finish_the_effect_early() {
    let (_console, ctx) = make_ctx();
    let done = Arc::new(AtomicBool::new(false));
    let stops = Arc::new(AtomicU32::new(0));
    let behavior = EffectBehavior::Timed {
        on_start: Box::new(|_, _| Ok(())),
        on_tick: Some(Box::new({
            let done = done.clone();
            move |_, _, _| {
                if done.load(Ordering::SeqCst) {
                    Ok(TickOutcome::FinishEarly)
                } else {
                    Ok(TickOutcome::Continue)
                }
            }
        })),
        on_stop: Box::new({
            let stops = stops.clone();
            move |_, _| {
                stops.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    };
    let mut effect = Effect::new(timed_spec("challenge", 300.0), behavior);
    let t0 = Instant::now();
    effect.start_at(t0, &ctx, request("challenge")).unwrap();

    let signals = drive(&mut effect, t0 + Duration::from_secs(5), &ctx);
    assert!(signals.is_empty());

    done.store(true, Ordering::SeqCst);
    let signals = drive(&mut effect, t0 + Duration::from_secs(10), &ctx);
    assert_eq!(signals, vec![EffectSignal::Closing]);
    assert!(effect.is_closed());
    assert_eq!(effect.elapsed(), Duration::from_secs(10));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn set_variable_restores_the_original_value() {
    let (console, ctx) = make_ctx();
    console.stub_response("cl_crosshair_scale", "32");
    let mut effect = Effect::new(
        timed_spec("big_crosshair", 30.0),
        EffectBehavior::set_variable("cl_crosshair_scale", "128"),
    );
    let t0 = Instant::now();

    effect.start_at(t0, &ctx, request("big_crosshair")).unwrap();
    assert!(console.ran_command("cl_crosshair_scale 128"));

    drive(&mut effect, t0 + Duration::from_secs(31), &ctx);
    assert!(effect.is_closed());
    assert!(console.ran_command("cl_crosshair_scale 32"));
}

#[test]
fn variable_restore_snapshots_only_once() {
    let (console, ctx) = make_ctx();
    console.stub_response("fov_desired", "90");
    let mut restore = VariableRestore::new("fov_desired");

    restore.apply(&ctx, "130").unwrap();
    // A second apply while live must not capture our own override.
    console.stub_response("fov_desired", "130");
    restore.apply(&ctx, "150").unwrap();

    restore.restore(&ctx).unwrap();
    assert!(console.ran_command("fov_desired 90"));
}
