//! # Synch Tests
//!
//! Posse, herança de prioridade e filas de espera, dirigidos pela API
//! pública sobre o host simulado.

use alloc::sync::Arc;

use crate::core::config::NucleusConfig;
use crate::core::nucleus::Nucleus;
use crate::core::smp::{CpuSet, IpiTarget, IpiVector};
use crate::core::time::Timeout;
use crate::hal::platform::sim::SimHost;
use crate::sched::scheduler::policy::SchedPolicy;
use crate::sched::task::{ThreadAttr, ThreadState};
use crate::sync::{FlushReason, Grant, SynchFlags, SynchRef};
use crate::sys::{SysError, ThreadId};

fn boot(config: NucleusConfig) -> (Arc<SimHost>, Nucleus) {
    let host = Arc::new(SimHost::new());
    let nk = Nucleus::new(config, host.clone()).unwrap();
    (host, nk)
}

fn spawn(nk: &Nucleus, name: &str, prio: i32) -> ThreadId {
    let t = nk
        .create_thread(&ThreadAttr::new(name, SchedPolicy::Fifo { prio }))
        .unwrap();
    nk.start_thread(t).unwrap();
    t
}

fn pi_mutex(nk: &Nucleus, name: &str) -> SynchRef {
    nk.create_synch(name, SynchFlags::OWNER | SynchFlags::PIP).unwrap()
}

fn current_prio(nk: &Nucleus, t: ThreadId) -> i32 {
    nk.thread_snapshot(t).unwrap().current.prio
}

// =============================================================================
// POSSE
// =============================================================================

#[test]
fn uncontended_cycle_stays_on_fast_path() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 10);
    let m = pi_mutex(&nk, "m");

    assert_eq!(nk.acquire(a, &m, Timeout::Infinite), Ok(Grant::Immediate));
    assert_eq!(nk.synch_owner(&m), Ok(Some(a)));
    assert_eq!(nk.release(a, &m), Ok(None));
    assert_eq!(nk.synch_owner(&m), Ok(None));

    let stats = nk.stats().snapshot();
    assert_eq!(stats.fast_acquires, 1);
    assert_eq!(stats.slow_acquires, 0);
}

#[test]
fn ownership_errors() {
    let (_host, nk) = boot(NucleusConfig::default());
    let a = spawn(&nk, "a", 10);
    let b = spawn(&nk, "b", 5);
    let m = pi_mutex(&nk, "m");

    nk.acquire(a, &m, Timeout::Infinite).unwrap();
    assert_eq!(nk.acquire(a, &m, Timeout::Infinite), Err(SysError::Deadlock));
    assert_eq!(nk.acquire(b, &m, Timeout::NonBlock), Err(SysError::Busy));
    assert_eq!(nk.release(b, &m), Err(SysError::PermissionDenied));
    assert_eq!(nk.synch_owner(&m), Ok(Some(a)));
}

#[test]
fn inheritance_requires_ownership() {
    let (_host, nk) = boot(NucleusConfig::default());
    assert_eq!(
        nk.create_synch("bad", SynchFlags::PIP).err(),
        Some(SysError::InvalidArgument)
    );
    let m = pi_mutex(&nk, "m");
    assert!(nk.synch_snapshot(&m).unwrap().flags.contains(SynchFlags::PRIO));
}

// =============================================================================
// HERANÇA DE PRIORIDADE
// =============================================================================

#[test]
fn boost_and_grant_order_follow_priority() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    assert_eq!(nk.acquire(low, &m, Timeout::Infinite), Ok(Grant::Immediate));

    let mut waiters = alloc::vec::Vec::new();
    for (name, prio) in [("h10", 10), ("h20", 20), ("h30", 30)] {
        let h = spawn(&nk, name, prio);
        assert_eq!(nk.current_thread(0), Ok(h));
        assert_eq!(nk.acquire(h, &m, Timeout::Infinite), Ok(Grant::Pending));
        assert_eq!(nk.wait_result(h), Ok(Grant::Pending));
        waiters.push(h);
    }
    let (h10, h20, h30) = (waiters[0], waiters[1], waiters[2]);

    // A dona herda o waiter mais urgente e volta a executar
    assert_eq!(nk.current_thread(0), Ok(low));
    assert_eq!(current_prio(&nk, low), 30);
    assert!(nk.thread_snapshot(low).unwrap().state.contains(ThreadState::BOOST));
    assert_eq!(nk.peek_pending(&m), Ok(Some(h30)));

    assert_eq!(nk.release(low, &m), Ok(Some(h30)));
    assert_eq!(current_prio(&nk, low), 5);
    assert!(!nk.thread_snapshot(low).unwrap().state.contains(ThreadState::BOOST));
    assert_eq!(nk.current_thread(0), Ok(h30));
    assert_eq!(nk.wait_result(h30), Ok(Grant::AfterWait));

    assert_eq!(nk.release(h30, &m), Ok(Some(h20)));
    assert_eq!(nk.release(h20, &m), Ok(Some(h10)));
    assert_eq!(nk.wait_result(h10), Ok(Grant::AfterWait));

    // Último waiter: a palavra fica sem CLAIM e a liberação é rápida
    assert_eq!(nk.synch_snapshot(&m).unwrap().nr_waiters, 0);
    assert_eq!(nk.release(h10, &m), Ok(None));
    assert_eq!(nk.synch_owner(&m), Ok(None));
}

#[test]
fn boost_follows_the_remaining_claims() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m1 = pi_mutex(&nk, "m1");
    let m2 = pi_mutex(&nk, "m2");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m1, Timeout::Infinite).unwrap();
    nk.acquire(low, &m2, Timeout::Infinite).unwrap();

    let h20 = spawn(&nk, "h20", 20);
    assert_eq!(nk.acquire(h20, &m1, Timeout::Infinite), Ok(Grant::Pending));
    let h30 = spawn(&nk, "h30", 30);
    assert_eq!(nk.acquire(h30, &m2, Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(current_prio(&nk, low), 30);

    // Soltar m2 leva o boost para o que ainda espera em m1
    assert_eq!(nk.release(low, &m2), Ok(Some(h30)));
    assert_eq!(current_prio(&nk, low), 20);
    assert!(nk.thread_snapshot(low).unwrap().state.contains(ThreadState::BOOST));

    assert_eq!(nk.release(low, &m1), Ok(Some(h20)));
    assert_eq!(current_prio(&nk, low), 5);
    assert!(!nk.thread_snapshot(low).unwrap().state.contains(ThreadState::BOOST));
}

#[test]
fn inheritance_is_transitive() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m1 = pi_mutex(&nk, "m1");
    let m2 = pi_mutex(&nk, "m2");

    let a = spawn(&nk, "a", 5);
    nk.acquire(a, &m1, Timeout::Infinite).unwrap();
    let b = spawn(&nk, "b", 10);
    nk.acquire(b, &m2, Timeout::Infinite).unwrap();
    assert_eq!(nk.acquire(b, &m1, Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(current_prio(&nk, a), 10);

    let c = spawn(&nk, "c", 40);
    assert_eq!(nk.acquire(c, &m2, Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(current_prio(&nk, b), 40);
    assert_eq!(current_prio(&nk, a), 40);
    assert_eq!(nk.current_thread(0), Ok(a));
}

#[test]
fn inheritance_walk_is_bounded() {
    let config = NucleusConfig {
        max_pi_depth: 2,
        ..NucleusConfig::default()
    };
    let (_host, nk) = boot(config);
    let locks = [pi_mutex(&nk, "m1"), pi_mutex(&nk, "m2"), pi_mutex(&nk, "m3")];

    let t1 = spawn(&nk, "t1", 5);
    nk.acquire(t1, &locks[0], Timeout::Infinite).unwrap();
    let t2 = spawn(&nk, "t2", 10);
    nk.acquire(t2, &locks[1], Timeout::Infinite).unwrap();
    nk.acquire(t2, &locks[0], Timeout::Infinite).unwrap();
    let t3 = spawn(&nk, "t3", 15);
    nk.acquire(t3, &locks[2], Timeout::Infinite).unwrap();
    nk.acquire(t3, &locks[1], Timeout::Infinite).unwrap();
    assert_eq!(current_prio(&nk, t1), 15);

    let t4 = spawn(&nk, "t4", 50);
    assert_eq!(nk.acquire(t4, &locks[2], Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(current_prio(&nk, t3), 50);
    assert_eq!(current_prio(&nk, t2), 50);
    // O limite corta a cadeia antes do último elo
    assert_eq!(current_prio(&nk, t1), 15);
}

#[test]
fn waiter_priority_change_moves_the_boost() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m, Timeout::Infinite).unwrap();
    let h = spawn(&nk, "h", 20);
    nk.acquire(h, &m, Timeout::Infinite).unwrap();
    assert_eq!(current_prio(&nk, low), 20);

    nk.set_schedparam(h, SchedPolicy::Fifo { prio: 40 }).unwrap();
    assert_eq!(current_prio(&nk, low), 40);
    nk.set_schedparam(h, SchedPolicy::Fifo { prio: 8 }).unwrap();
    assert_eq!(current_prio(&nk, low), 8);

    // A base da dona vale mais que um waiter menos urgente
    nk.set_schedparam(low, SchedPolicy::Fifo { prio: 12 }).unwrap();
    assert_eq!(current_prio(&nk, low), 12);
}

// =============================================================================
// ESPERAS INTERROMPIDAS
// =============================================================================

#[test]
fn timed_out_waiter_drops_the_boost() {
    let (host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m, Timeout::Infinite).unwrap();
    let h = spawn(&nk, "h", 20);
    assert_eq!(nk.acquire(h, &m, Timeout::Relative(1_000)), Ok(Grant::Pending));
    assert_eq!(current_prio(&nk, low), 20);

    host.set_time(1_000);
    nk.clock_tick();
    assert_eq!(nk.wait_result(h), Err(SysError::TimedOut));
    assert_eq!(current_prio(&nk, low), 5);

    let snap = nk.synch_snapshot(&m).unwrap();
    assert_eq!(snap.nr_waiters, 0);
    assert!(!snap.flags.contains(SynchFlags::CLAIMED));
    assert!(!m.fastlock().unwrap().load().is_claimed());
    assert_eq!(nk.release(low, &m), Ok(None));
}

#[test]
fn unblocked_waiter_is_interrupted() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m, Timeout::Infinite).unwrap();
    let h = spawn(&nk, "h", 20);
    nk.acquire(h, &m, Timeout::Infinite).unwrap();

    assert_eq!(nk.unblock_thread(h), Ok(true));
    assert_eq!(nk.wait_result(h), Err(SysError::Interrupted));
    assert_eq!(current_prio(&nk, low), 5);
    assert_eq!(nk.pending_count(&m), Ok(0));
    assert_eq!(nk.current_thread(0), Ok(h));
}

#[test]
fn destroy_wakes_every_waiter() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m, Timeout::Infinite).unwrap();
    let h1 = spawn(&nk, "h1", 20);
    nk.acquire(h1, &m, Timeout::Infinite).unwrap();
    let h2 = spawn(&nk, "h2", 25);
    nk.acquire(h2, &m, Timeout::Infinite).unwrap();

    nk.destroy_synch(&m).unwrap();
    assert_eq!(nk.wait_result(h1), Err(SysError::Destroyed));
    assert_eq!(nk.wait_result(h2), Err(SysError::Destroyed));
    assert_eq!(current_prio(&nk, low), 5);
    assert_eq!(nk.thread_snapshot(low).unwrap().claims, 0);

    assert!(m.fastlock().unwrap().load().is_destroyed());
    assert_eq!(nk.acquire(h2, &m, Timeout::Infinite), Err(SysError::BadHandle));
    assert_eq!(nk.synch_snapshot(&m).err(), Some(SysError::BadHandle));
}

#[test]
fn deleted_owner_hands_over_claimed_lock() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = pi_mutex(&nk, "m");
    let low = spawn(&nk, "low", 5);
    nk.acquire(low, &m, Timeout::Infinite).unwrap();
    let h = spawn(&nk, "h", 20);
    nk.acquire(h, &m, Timeout::Infinite).unwrap();

    nk.delete_thread(low).unwrap();
    assert_eq!(nk.synch_owner(&m), Ok(Some(h)));
    assert_eq!(nk.wait_result(h), Ok(Grant::AfterWait));
    assert_eq!(nk.current_thread(0), Ok(h));
}

#[test]
fn deleted_owner_hands_over_plain_lock() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = nk.create_synch("prio", SynchFlags::OWNER | SynchFlags::PRIO).unwrap();
    let a = spawn(&nk, "a", 5);
    nk.acquire(a, &m, Timeout::Infinite).unwrap();
    let h = spawn(&nk, "h", 30);
    assert_eq!(nk.acquire(h, &m, Timeout::Infinite), Ok(Grant::Pending));

    nk.delete_thread(a).unwrap();
    assert_eq!(nk.synch_owner(&m), Ok(Some(h)));
    assert_eq!(nk.wait_result(h), Ok(Grant::AfterWait));

    // Quem chega depois disputa com o novo dono, não toma a posse
    let low = spawn(&nk, "low", 1);
    assert_eq!(nk.acquire(low, &m, Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(nk.synch_owner(&m), Ok(Some(h)));
    assert_eq!(nk.release(h, &m), Ok(Some(low)));
}

#[test]
fn abandoned_lock_is_taken_over() {
    let (_host, nk) = boot(NucleusConfig::default());
    let m = nk.create_synch("plain", SynchFlags::OWNER).unwrap();
    let a = spawn(&nk, "a", 20);
    nk.acquire(a, &m, Timeout::Infinite).unwrap();
    nk.delete_thread(a).unwrap();

    let b = spawn(&nk, "b", 10);
    assert_eq!(nk.acquire(b, &m, Timeout::NonBlock), Ok(Grant::Immediate));
    assert_eq!(nk.synch_owner(&m), Ok(Some(b)));
}

// =============================================================================
// FILAS DE ESPERA
// =============================================================================

#[test]
fn wakeup_is_not_lost() {
    let (_host, nk) = boot(NucleusConfig::default());
    let q = nk.create_synch("q", SynchFlags::empty()).unwrap();
    let a = spawn(&nk, "a", 10);

    assert_eq!(nk.sleep_on(a, &q, Timeout::Infinite), Ok(Grant::Pending));
    assert_eq!(nk.wakeup_one_sleeper(&q), Ok(Some(a)));
    assert_eq!(nk.wait_result(a), Ok(Grant::AfterWait));
    assert_eq!(nk.current_thread(0), Ok(a));
    assert_eq!(nk.wakeup_one_sleeper(&q), Ok(None));
}

#[test]
fn remote_wakeup_reaches_the_sleeper_cpu() {
    let (host, nk) = boot(NucleusConfig::default().with_cpus(2));
    let q = nk.create_synch("q", SynchFlags::empty()).unwrap();
    let a = nk
        .create_thread(&ThreadAttr::new("a", SchedPolicy::Fifo { prio: 10 }).with_affinity(CpuSet::single(1)))
        .unwrap();
    nk.start_thread(a).unwrap();

    host.set_cpu(1);
    nk.schedule();
    assert_eq!(nk.current_thread(1), Ok(a));
    nk.sleep_on(a, &q, Timeout::Infinite).unwrap();
    assert_eq!(nk.current_thread(1), nk.root_thread(1));

    host.set_cpu(0);
    host.clear_log();
    assert_eq!(nk.wakeup_one_sleeper(&q), Ok(Some(a)));
    assert!(host.ipis().contains(&(IpiTarget::Single(1), IpiVector::Reschedule)));

    host.set_cpu(1);
    assert!(nk.schedule());
    assert_eq!(nk.current_thread(1), Ok(a));
    assert_eq!(nk.wait_result(a), Ok(Grant::AfterWait));
}

#[test]
fn queue_order_follows_flags() {
    let (_host, nk) = boot(NucleusConfig::default());
    let fifo = nk.create_synch("fifo", SynchFlags::empty()).unwrap();
    let prio = nk.create_synch("prio", SynchFlags::PRIO).unwrap();
    let a = spawn(&nk, "a", 10);
    let b = spawn(&nk, "b", 30);

    nk.sleep_on(a, &fifo, Timeout::Infinite).unwrap();
    nk.sleep_on(b, &fifo, Timeout::Infinite).unwrap();
    assert_eq!(nk.peek_pending(&fifo), Ok(Some(a)));
    assert_eq!(nk.wakeup_many_sleepers(&fifo, 5), Ok(2));

    nk.sleep_on(a, &prio, Timeout::Infinite).unwrap();
    nk.sleep_on(b, &prio, Timeout::Infinite).unwrap();
    assert_eq!(nk.peek_pending(&prio), Ok(Some(b)));
    assert_eq!(nk.wakeup_this_sleeper(&prio, a), Ok(()));
    assert_eq!(nk.wakeup_this_sleeper(&prio, a), Err(SysError::NotFound));
    assert_eq!(nk.pending_count(&prio), Ok(1));
    assert_eq!(nk.flush(&prio, FlushReason::Signaled), Ok(1));
    assert_eq!(nk.wait_result(b), Ok(Grant::AfterWait));
}

#[test]
fn wait_queue_rules() {
    let (_host, nk) = boot(NucleusConfig::default());
    let q = nk.create_synch("q", SynchFlags::empty()).unwrap();
    let m = pi_mutex(&nk, "m");
    let a = spawn(&nk, "a", 10);

    assert_eq!(nk.sleep_on(a, &q, Timeout::NonBlock), Err(SysError::TimedOut));
    assert_eq!(nk.sleep_on(a, &m, Timeout::Infinite), Err(SysError::InvalidArgument));
    assert_eq!(nk.flush(&m, FlushReason::Signaled), Err(SysError::InvalidArgument));
    assert_eq!(nk.synch_owner(&q), Err(SysError::InvalidArgument));
    assert_eq!(nk.acquire(a, &q, Timeout::Infinite), Err(SysError::InvalidArgument));
    // Sem dono e sem espera, o resultado não existe
    assert_eq!(nk.wait_result(a), Err(SysError::InvalidArgument));
}

#[test]
fn broken_flush_interrupts_sleepers() {
    let (_host, nk) = boot(NucleusConfig::default());
    let q = nk.create_synch("q", SynchFlags::empty()).unwrap();
    let a = spawn(&nk, "a", 10);
    let b = spawn(&nk, "b", 10);
    nk.sleep_on(a, &q, Timeout::Infinite).unwrap();
    nk.sleep_on(b, &q, Timeout::Relative(5_000)).unwrap();

    assert_eq!(nk.flush(&q, FlushReason::Broken), Ok(2));
    assert_eq!(nk.wait_result(a), Err(SysError::Interrupted));
    assert_eq!(nk.wait_result(b), Err(SysError::Interrupted));
    assert!(!nk.thread_snapshot(b).unwrap().state.contains(ThreadState::DELAY));
}
