//! # Scheduler Tests
//!
//! Escalonamento e ciclo de vida sobre o host simulado. O relógio roda a
//! 1 GHz, então ticks e nanossegundos coincidem.

use alloc::sync::Arc;

use crate::core::config::NucleusConfig;
use crate::core::nucleus::Nucleus;
use crate::core::smp::{CpuSet, IpiTarget, IpiVector};
use crate::core::time::{Timeout, TimerMode};
use crate::hal::platform::sim::SimHost;
use crate::sched::scheduler::tp::TpWindow;
use crate::sched::scheduler::policy::SchedPolicy;
use crate::sched::task::{PeriodWait, ThreadAttr, ThreadInfo, ThreadState};
use crate::sys::{SysError, ThreadId};

fn boot(config: NucleusConfig) -> (Arc<SimHost>, Nucleus) {
    let host = Arc::new(SimHost::new());
    let nk = Nucleus::new(config, host.clone()).unwrap();
    (host, nk)
}

fn spawn_with(nk: &Nucleus, name: &str, policy: SchedPolicy) -> ThreadId {
    let t = nk.create_thread(&ThreadAttr::new(name, policy)).unwrap();
    nk.start_thread(t).unwrap();
    t
}

fn spawn(nk: &Nucleus, name: &str, prio: i32) -> ThreadId {
    spawn_with(nk, name, SchedPolicy::Fifo { prio })
}

// =============================================================================
// ORDEM DE ESCOLHA
// =============================================================================

#[test]
fn highest_priority_runs_and_ties_are_fifo() {
    let (_host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();

    let h = spawn(&nk, "h", 50);
    assert_eq!(nk.current_thread(0), Ok(h));
    let a = spawn(&nk, "a", 20);
    let b = spawn(&nk, "b", 20);
    assert_eq!(nk.current_thread(0), Ok(h));

    nk.suspend_thread(h).unwrap();
    assert_eq!(nk.current_thread(0), Ok(a));
    nk.suspend_thread(a).unwrap();
    assert_eq!(nk.current_thread(0), Ok(b));
    nk.suspend_thread(b).unwrap();
    assert_eq!(nk.current_thread(0), Ok(root));

    nk.resume_thread(a).unwrap();
    assert_eq!(nk.current_thread(0), Ok(a));
}

#[test]
fn class_weight_beats_raw_priority() {
    let (_host, nk) = boot(NucleusConfig::default());
    let weak = spawn_with(&nk, "weak", SchedPolicy::Weak { prio: 99 });
    assert_eq!(nk.current_thread(0), Ok(weak));

    let rt = spawn(&nk, "rt", 1);
    assert_eq!(nk.current_thread(0), Ok(rt));
}

#[test]
fn preempted_thread_keeps_its_place() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);
    let _b = spawn(&nk, "b", 20);
    let c = spawn(&nk, "c", 30);
    assert_eq!(nk.current_thread(0), Ok(c));

    nk.suspend_thread(c).unwrap();
    assert_eq!(nk.current_thread(0), Ok(a));
}

#[test]
fn yield_rotates_among_equals() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);
    let b = spawn(&nk, "b", 20);
    assert_eq!(nk.current_thread(0), Ok(a));

    nk.yield_thread(a).unwrap();
    assert_eq!(nk.current_thread(0), Ok(b));
    nk.yield_thread(b).unwrap();
    assert_eq!(nk.current_thread(0), Ok(a));
}

#[test]
fn round_robin_rotates_when_quantum_expires() {
    let (host, nk) = boot(NucleusConfig::default().with_rr_quantum(1_000));
    let rr = SchedPolicy::RoundRobin { prio: 20, quantum: 0 };
    let a = spawn_with(&nk, "a", rr);
    let b = spawn_with(&nk, "b", rr);
    nk.start_host_tick(0, 500).unwrap();

    host.set_time(500);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(a));

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(b));
    assert!(nk.take_host_tick(0));
}

// =============================================================================
// CICLO DE VIDA
// =============================================================================

#[test]
fn deleting_the_current_thread_waits_for_the_switch() {
    let (_host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();
    let a = spawn(&nk, "a", 20);
    assert_eq!(nk.nr_threads(), 2);

    nk.delete_thread(a).unwrap();
    assert_eq!(nk.current_thread(0), Ok(root));
    assert_eq!(nk.thread_snapshot(a).err(), Some(SysError::BadHandle));
    assert_eq!(nk.nr_threads(), 1);

    let stats = nk.stats().snapshot();
    assert_eq!(stats.threads_created, 1);
    assert_eq!(stats.threads_deleted, 1);
}

#[test]
fn root_thread_is_protected() {
    let (_host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();
    assert_eq!(nk.suspend_thread(root), Err(SysError::InvalidArgument));
    assert_eq!(nk.delete_thread(root), Err(SysError::InvalidArgument));
    assert_eq!(
        nk.set_schedparam(root, SchedPolicy::Fifo { prio: 10 }),
        Err(SysError::InvalidArgument)
    );
}

#[test]
fn start_twice_is_busy_and_bad_priority_is_rejected() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);
    assert_eq!(nk.start_thread(a), Err(SysError::Busy));

    let attr = ThreadAttr::new("bad", SchedPolicy::Weak { prio: 200 });
    assert_eq!(nk.create_thread(&attr).err(), Some(SysError::InvalidArgument));
}

#[test]
fn set_schedparam_reorders_ready_threads() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);
    let b = spawn(&nk, "b", 10);
    assert_eq!(nk.current_thread(0), Ok(a));

    nk.set_schedparam(b, SchedPolicy::Fifo { prio: 40 }).unwrap();
    assert_eq!(nk.current_thread(0), Ok(b));
    let snap = nk.thread_snapshot(b).unwrap();
    assert_eq!(snap.base.prio, 40);
    assert_eq!(snap.current.prio, 40);
}

// =============================================================================
// ESPERAS TEMPORIZADAS
// =============================================================================

#[test]
fn sleep_wakes_on_timeout() {
    let (host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();
    let a = spawn(&nk, "a", 20);

    nk.sleep(a, Timeout::Relative(1_000)).unwrap();
    assert_eq!(nk.current_thread(0), Ok(root));
    assert!(nk.thread_snapshot(a).unwrap().state.contains(ThreadState::DELAY));

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(a));
    assert!(nk.thread_snapshot(a).unwrap().info.contains(ThreadInfo::TIMEO));
}

#[test]
fn sleep_edge_cases() {
    let (host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);

    assert_eq!(nk.sleep(a, Timeout::Infinite), Err(SysError::InvalidArgument));
    assert_eq!(nk.sleep(a, Timeout::NonBlock), Ok(()));

    host.set_time(5_000);
    assert_eq!(nk.sleep(a, Timeout::Absolute(1_000)), Ok(()));
    assert_eq!(nk.current_thread(0), Ok(a));
}

#[test]
fn unblock_breaks_a_sleep() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 20);

    nk.sleep(a, Timeout::Relative(10_000)).unwrap();
    assert_eq!(nk.unblock_thread(a), Ok(true));
    assert_eq!(nk.current_thread(0), Ok(a));
    assert!(nk.thread_snapshot(a).unwrap().info.contains(ThreadInfo::BREAK));
    assert_eq!(nk.unblock_thread(a), Ok(false));
}

#[test]
fn periodic_thread_reports_missed_releases() {
    let (host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();
    let a = spawn(&nk, "a", 20);

    assert_eq!(nk.wait_period(a), Err(SysError::InvalidArgument));
    nk.set_periodic(a, 1_000, 1_000, TimerMode::Relative).unwrap();

    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Blocked));
    assert_eq!(nk.current_thread(0), Ok(root));

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(a));
    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Released { overruns: 0 }));

    // Pontos em 2000 e 3000 perdidos; a liberação de 4000 é entregue
    host.set_time(4_500);
    nk.clock_tick();
    assert_eq!(nk.wait_period(a), Ok(PeriodWait::Released { overruns: 2 }));
}

// =============================================================================
// SMP
// =============================================================================

#[test]
fn running_thread_migrates_after_switch() {
    let (host, nk) = boot(NucleusConfig::default().with_cpus(2));
    let a = spawn(&nk, "a", 20);
    assert_eq!(nk.current_thread(0), Ok(a));

    host.clear_log();
    nk.migrate_thread(a, 1).unwrap();
    assert_eq!(nk.current_thread(0), nk.root_thread(0));

    let snap = nk.thread_snapshot(a).unwrap();
    assert_eq!(snap.cpu, 1);
    assert!(snap.state.contains(ThreadState::READY));
    assert!(host.ipis().contains(&(IpiTarget::Single(1), IpiVector::Reschedule)));

    host.set_cpu(1);
    assert!(nk.schedule());
    assert_eq!(nk.current_thread(1), Ok(a));
}

#[test]
fn migration_rules() {
    let (_host, nk) = boot(NucleusConfig::default().with_cpus(2));
    let pinned = nk
        .create_thread(&ThreadAttr::new("pinned", SchedPolicy::Fifo { prio: 5 }).with_affinity(CpuSet::single(0)))
        .unwrap();
    assert_eq!(nk.migrate_thread(pinned, 1), Err(SysError::InvalidArgument));
    assert_eq!(nk.migrate_thread(pinned, 7), Err(SysError::InvalidArgument));

    let _a = spawn(&nk, "a", 20);
    let b = spawn(&nk, "b", 10);
    assert_eq!(nk.migrate_thread(b, 1), Err(SysError::Busy));

    // Parada: move na hora
    nk.suspend_thread(b).unwrap();
    nk.migrate_thread(b, 1).unwrap();
    assert_eq!(nk.thread_snapshot(b).unwrap().cpu, 1);
}

// =============================================================================
// QUOTA E TP
// =============================================================================

#[test]
fn exhausted_quota_group_yields_until_refill() {
    let (host, nk) = boot(NucleusConfig::default().with_quota_period(10_000));
    let group = nk.create_quota_group(0, 1_000, 1_000).unwrap();
    let q = spawn_with(&nk, "q", SchedPolicy::Quota { group, prio: 10 });
    let w = spawn_with(&nk, "w", SchedPolicy::Weak { prio: 10 });
    assert_eq!(nk.current_thread(0), Ok(q));

    host.set_time(1_500);
    nk.request_reschedule(0).unwrap();
    assert_eq!(nk.current_thread(0), Ok(w));
    let snap = nk.quota_snapshot(group).unwrap();
    assert!(snap.exhausted);
    assert_eq!(snap.budget_ns, -500);

    host.set_time(10_000);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(q));
    assert!(!nk.quota_snapshot(group).unwrap().exhausted);

    assert_eq!(nk.destroy_quota_group(group), Err(SysError::Busy));
}

#[test]
fn tp_windows_switch_partitions() {
    let (host, nk) = boot(NucleusConfig::default());
    let root = nk.root_thread(0).unwrap();
    let windows = [
        TpWindow { offset: 0, partition: Some(0) },
        TpWindow { offset: 500, partition: Some(1) },
    ];
    assert_eq!(
        nk.set_tp_schedule(0, &windows[1..], 1_000),
        Err(SysError::InvalidArgument)
    );
    nk.set_tp_schedule(0, &windows, 1_000).unwrap();

    let t0 = spawn_with(&nk, "t0", SchedPolicy::Tp { partition: 0, prio: 10 });
    let t1 = spawn_with(&nk, "t1", SchedPolicy::Tp { partition: 1, prio: 10 });
    assert_eq!(nk.current_thread(0), Ok(root));

    nk.start_tp(0).unwrap();
    assert_eq!(nk.current_thread(0), Ok(t0));
    assert_eq!(nk.set_tp_schedule(0, &windows, 1_000), Err(SysError::Busy));

    host.set_time(500);
    nk.clock_tick();
    assert_eq!(nk.tp_partition(0), Ok(Some(1)));
    assert_eq!(nk.current_thread(0), Ok(t1));

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(nk.current_thread(0), Ok(t0));

    nk.stop_tp(0).unwrap();
    assert_eq!(nk.current_thread(0), Ok(root));
}
