//! # Clock & Timer Tests
//!
//! Conversões do relógio, ordem das filas, recarga de periódicos e
//! programação do one-shot, tudo sobre o host simulado.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::clock::Clock;
use super::timer::{TimerEvent, TimerMode, TimerStatus};
use crate::core::config::{ClockConfig, NucleusConfig};
use crate::core::nucleus::Nucleus;
use crate::core::smp::{IpiTarget, IpiVector};
use crate::hal::platform::sim::SimHost;
use crate::sched::scheduler::policy::SchedPolicy;
use crate::sched::scheduler::SchedStatus;
use crate::sched::task::{PeriodWait, ThreadAttr};
use crate::sys::{SysError, TimerId};

fn boot(config: NucleusConfig) -> (Arc<SimHost>, Nucleus) {
    let host = Arc::new(SimHost::new());
    let nk = Nucleus::new(config, host.clone()).unwrap();
    (host, nk)
}

/// Timer de usuário que registra cada disparo.
fn recording_timer(nk: &Nucleus, cpu: u32, log: &Arc<Mutex<Vec<TimerEvent>>>) -> TimerId {
    let log = log.clone();
    nk.create_timer("rec", cpu, move |event| log.lock().push(*event))
        .unwrap()
}

// =============================================================================
// RELÓGIO
// =============================================================================

#[test]
fn raw_clock_never_goes_back() {
    let (host, nk) = boot(NucleusConfig::default());
    host.set_time(1_000);
    assert_eq!(nk.read_raw(), 1_000);
    host.set_time(400);
    assert_eq!(nk.read_raw(), 1_000);
    host.set_time(1_200);
    assert_eq!(nk.read_monotonic(), 1_200);
}

#[test]
fn conversions_stay_within_one_tick() {
    let config = ClockConfig {
        freq_hz: 19_200_000,
        ..ClockConfig::default()
    };
    let clock = Clock::new(&config).unwrap();
    // 1e9 / 19.2e6 ~= 52.08 ns por tick
    let ns_per_tick = 53;

    for ns in [1u64, 999, 1_000_000, 123_456_789, 10_000_000_000] {
        let back = clock.ticks_to_ns(clock.ns_to_ticks(ns));
        assert!(back <= ns, "ida e volta passou do valor: {} -> {}", ns, back);
        assert!(ns - back <= ns_per_tick, "erro acima de um tick: {} -> {}", ns, back);
    }
    let second = clock.ticks_to_ns_rounded(19_200_000);
    assert!(second.abs_diff(1_000_000_000) <= 1);
}

#[test]
fn conversion_saturates_on_fast_clocks() {
    let config = ClockConfig {
        freq_hz: 2_000_000_000,
        ..ClockConfig::default()
    };
    let clock = Clock::new(&config).unwrap();
    assert_eq!(clock.ns_to_ticks(1_000), 2_000);
    assert_eq!(clock.ns_to_ticks(u64::MAX / 2 + 1_000), u64::MAX);
    assert_eq!(clock.ns_to_ticks(u64::MAX), u64::MAX);
}

#[test]
fn zero_frequency_is_rejected() {
    let config = ClockConfig {
        freq_hz: 0,
        ..ClockConfig::default()
    };
    assert!(Clock::new(&config).is_err());
}

// =============================================================================
// FILA DE TIMERS
// =============================================================================

#[test]
fn timers_fire_by_date_then_priority_then_arrival() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let late_std = recording_timer(&nk, 0, &log);
    let early = recording_timer(&nk, 0, &log);
    let late_hi = recording_timer(&nk, 0, &log);
    let late_std2 = recording_timer(&nk, 0, &log);

    nk.set_timer_priority(late_hi, 10).unwrap();
    nk.start_timer(late_std, 200, 0, TimerMode::Relative).unwrap();
    nk.start_timer(early, 100, 0, TimerMode::Relative).unwrap();
    nk.start_timer(late_hi, 200, 0, TimerMode::Relative).unwrap();
    nk.start_timer(late_std2, 200, 0, TimerMode::Relative).unwrap();

    host.set_time(300);
    nk.clock_tick();
    let order: Vec<TimerId> = log.lock().iter().map(|e| e.timer).collect();
    assert_eq!(order, [early, late_hi, late_std, late_std2]);
    assert_eq!(nk.timer_date(early), Ok(None));
}

#[test]
fn absolute_one_shot_in_the_past_times_out() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);
    host.set_time(1_000);

    assert_eq!(nk.start_timer(t, 500, 0, TimerMode::Absolute), Err(SysError::TimedOut));
    assert_eq!(nk.timer_date(t), Ok(None));
    // Periódico com início passado é aceito e dispara na hora
    assert_eq!(nk.start_timer(t, 500, 200, TimerMode::Absolute), Ok(()));
    nk.clock_tick();
    assert_eq!(log.lock().len(), 1);
    assert_eq!(nk.timer_overruns(t), Ok(2));
}

#[test]
fn periodic_timer_collapses_missed_periods() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);
    nk.start_timer(t, 100, 100, TimerMode::Relative).unwrap();
    assert_eq!(nk.timer_interval(t), Ok(100));

    host.set_time(450);
    nk.clock_tick();
    {
        let events = log.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, 100);
        assert_eq!(events[0].overruns, 3);
    }
    assert_eq!(nk.timer_overruns(t), Ok(3));
    assert_eq!(nk.timer_date(t), Ok(Some(500)));
    assert_eq!(nk.timer_remaining(t), Ok(Some(50)));

    let snap = nk.timer_snapshot(t).unwrap();
    assert!(snap.status.contains(TimerStatus::PERIODIC | TimerStatus::FIRED));
    assert_eq!(snap.fired, 1);
}

#[test]
fn huge_relative_timer_does_not_fire_early() {
    let (host, nk) = boot(NucleusConfig::default().with_clock_freq(2_000_000_000));
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);

    nk.start_timer(t, u64::MAX / 2 + 1_000, 0, TimerMode::Relative).unwrap();
    assert_eq!(nk.timer_date(t), Ok(Some(u64::MAX)));
    host.set_time(10_000);
    nk.clock_tick();
    assert!(log.lock().is_empty());
}

#[test]
fn unreachable_reload_leaves_timer_stopped() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);
    host.set_time(100);

    nk.start_timer(t, 0, u64::MAX - 10, TimerMode::Relative).unwrap();
    nk.clock_tick();
    assert_eq!(log.lock().len(), 1);
    // A próxima data não cabe em u64
    assert_eq!(nk.timer_date(t), Ok(None));

    // O timer continua utilizável
    nk.start_timer(t, 50, 0, TimerMode::Relative).unwrap();
    assert_eq!(nk.timer_date(t), Ok(Some(150)));
}

#[test]
fn stop_and_destroy() {
    let (_host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);

    nk.stop_timer(t).unwrap();
    nk.start_timer(t, 100, 0, TimerMode::Relative).unwrap();
    nk.stop_timer(t).unwrap();
    assert_eq!(nk.timer_date(t), Ok(None));

    nk.destroy_timer(t).unwrap();
    assert_eq!(nk.start_timer(t, 100, 0, TimerMode::Relative), Err(SysError::BadHandle));
    assert_eq!(nk.create_timer("x", 3, |_| {}).err(), Some(SysError::InvalidArgument));
}

#[test]
fn gravity_fires_early_and_shortens_the_shot() {
    let (host, nk) = boot(NucleusConfig::default().with_gravity(50));
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);

    nk.start_timer(t, 1_000, 0, TimerMode::Relative).unwrap();
    assert_eq!(host.last_shot(0), Some(950));

    host.set_time(940);
    nk.clock_tick();
    assert!(log.lock().is_empty());
    host.set_time(960);
    nk.clock_tick();
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn wallclock_adjustment_moves_realtime_timers() {
    let (_host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let rt = recording_timer(&nk, 0, &log);
    let mono = recording_timer(&nk, 0, &log);

    nk.start_timer(rt, 1_000, 0, TimerMode::Realtime).unwrap();
    nk.start_timer(mono, 1_000, 0, TimerMode::Absolute).unwrap();
    nk.adjust_clock(400);

    assert_eq!(nk.timer_date(rt), Ok(Some(600)));
    assert_eq!(nk.timer_date(mono), Ok(Some(1_000)));
    assert_eq!(nk.read_realtime(), 400);
}

#[test]
fn wallclock_forward_skips_past_periods() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let rt = recording_timer(&nk, 0, &log);
    let mono = recording_timer(&nk, 0, &log);
    let a = nk
        .create_thread(&ThreadAttr::new("a", SchedPolicy::Fifo { prio: 10 }))
        .unwrap();
    nk.start_thread(a).unwrap();

    nk.start_timer(rt, 1_000, 100, TimerMode::Realtime).unwrap();
    nk.start_timer(mono, 1_000, 100, TimerMode::Absolute).unwrap();
    nk.set_periodic(a, 1_000, 100, TimerMode::Realtime).unwrap();

    host.set_time(500);
    nk.adjust_clock(750);
    // 1000 vira 250 na escala monotônica; 250 e 350 ficam para trás
    assert_eq!(nk.timer_date(rt), Ok(Some(450)));
    assert_eq!(nk.timer_date(mono), Ok(Some(1_000)));

    // A liberação esperada também foi reancorada em 250
    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Released { overruns: 2 }));

    nk.clock_tick();
    {
        let events = log.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timer, rt);
        assert_eq!(events[0].date, 450);
        assert_eq!(events[0].overruns, 0);
    }
    assert_eq!(nk.timer_date(rt), Ok(Some(550)));
    assert_eq!(nk.timer_date(mono), Ok(Some(1_000)));
}

#[test]
fn wallclock_rewind_keeps_fired_periodic_close() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let rt = recording_timer(&nk, 0, &log);
    let mono = recording_timer(&nk, 0, &log);
    let a = nk
        .create_thread(&ThreadAttr::new("a", SchedPolicy::Fifo { prio: 10 }))
        .unwrap();
    nk.start_thread(a).unwrap();

    nk.start_timer(rt, 100, 100, TimerMode::Realtime).unwrap();
    nk.start_timer(mono, 1_000, 100, TimerMode::Absolute).unwrap();
    nk.set_periodic(a, 100, 100, TimerMode::Realtime).unwrap();
    host.set_time(100);
    nk.clock_tick();
    assert_eq!(log.lock().len(), 1);
    assert_eq!(nk.timer_date(rt), Ok(Some(200)));

    // Sem o rebobinamento a data iria para 1250; fica na fase, a 50 de agora
    nk.adjust_clock(-1_050);
    assert_eq!(nk.timer_date(rt), Ok(Some(150)));
    assert_eq!(nk.timer_date(mono), Ok(Some(1_000)));

    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Released { overruns: 0 }));
    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Blocked));
    host.set_time(150);
    nk.clock_tick();
    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Released { overruns: 0 }));
    assert_eq!(log.lock().len(), 2);
}

// =============================================================================
// TICK DO HOST E ONE-SHOT
// =============================================================================

#[test]
fn host_tick_is_deferred_while_rt_thread_runs() {
    let (host, nk) = boot(NucleusConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);
    nk.start_host_tick(0, 1_000).unwrap();
    nk.start_timer(t, 1_500, 0, TimerMode::Relative).unwrap();

    let a = nk
        .create_thread(&ThreadAttr::new("a", SchedPolicy::Fifo { prio: 10 }))
        .unwrap();
    nk.start_thread(a).unwrap();

    host.set_time(100);
    nk.clock_tick();
    let status = nk.sched_snapshot(0).unwrap().status;
    assert!(status.contains(SchedStatus::HDEFER));
    assert_eq!(host.last_shot(0), Some(1_400));

    // De volta à root, o tick adiado é reprogramado
    nk.suspend_thread(a).unwrap();
    let status = nk.sched_snapshot(0).unwrap().status;
    assert!(!status.contains(SchedStatus::HDEFER));
    assert_eq!(host.last_shot(0), Some(900));
}

#[test]
fn host_tick_is_relayed_once() {
    let (host, nk) = boot(NucleusConfig::default().with_host_tick_deferral(false));
    nk.start_host_tick(0, 1_000).unwrap();
    assert!(!nk.take_host_tick(0));

    host.set_time(1_000);
    nk.clock_tick();
    assert!(nk.take_host_tick(0));
    assert!(!nk.take_host_tick(0));

    nk.stop_host_tick(0).unwrap();
    host.set_time(5_000);
    nk.clock_tick();
    assert!(!nk.take_host_tick(0));
    assert_eq!(nk.start_host_tick(0, 0), Err(SysError::InvalidArgument));
}

#[test]
fn remote_timer_start_kicks_the_owner_cpu() {
    let (host, nk) = boot(NucleusConfig::default().with_cpus(2));
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 1, &log);

    nk.start_timer(t, 1_000, 0, TimerMode::Relative).unwrap();
    assert!(host.ipis().contains(&(IpiTarget::Single(1), IpiVector::TimerShot)));
    assert_eq!(host.last_shot(1), None);

    host.set_cpu(1);
    nk.timer_ipi();
    assert_eq!(host.last_shot(1), Some(1_000));

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(log.lock()[0].cpu, 1);
}

#[test]
fn timer_migration_moves_the_shot() {
    let (host, nk) = boot(NucleusConfig::default().with_cpus(2));
    let log = Arc::new(Mutex::new(Vec::new()));
    let t = recording_timer(&nk, 0, &log);
    nk.start_timer(t, 1_000, 0, TimerMode::Relative).unwrap();

    host.clear_log();
    nk.migrate_timer(t, 1).unwrap();
    assert_eq!(nk.timer_snapshot(t).unwrap().cpu, 1);
    assert!(host.ipis().contains(&(IpiTarget::Single(1), IpiVector::TimerShot)));

    // A CPU 0 já não vê o timer
    host.set_time(1_000);
    nk.clock_tick();
    assert!(log.lock().is_empty());
    host.set_cpu(1);
    nk.clock_tick();
    assert_eq!(log.lock().len(), 1);
}
