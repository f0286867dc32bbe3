//! Self Tests de Boot
//!
//! Suites curtas que sobem um núcleo sobre o host simulado e exercitam os
//! caminhos críticos: escolha de thread, herança de prioridade e disparo
//! de timers. Rodam sem hardware, então o hospedeiro pode chamá-las antes
//! de entregar a primeira interrupção real.

use alloc::sync::Arc;

use crate::core::config::NucleusConfig;
use crate::core::nucleus::Nucleus;
use crate::core::time::{Timeout, TimerMode};
use crate::hal::platform::sim::SimHost;
use crate::klib::test_framework::{run_test_suite, TestCase, TestReport, TestResult};
use crate::sched::scheduler::policy::SchedPolicy;
use crate::sched::task::ThreadAttr;
use crate::sync::{Grant, SynchFlags};
use crate::sys::ThreadId;

const SCHED_TESTS: &[TestCase] = &[
    TestCase::new("fifo_preemption", test_fifo_preemption),
    TestCase::new("delete_current", test_delete_current),
];

const SYNCH_TESTS: &[TestCase] = &[
    TestCase::new("pi_boost", test_pi_boost),
    TestCase::new("wait_queue_wakeup", test_wait_queue_wakeup),
];

const TIMER_TESTS: &[TestCase] = &[
    TestCase::new("periodic_overruns", test_periodic_overruns),
    TestCase::new("sleep_timeout", test_sleep_timeout),
];

/// Executa todas as suites e devolve o placar somado.
pub fn run_selftests() -> TestReport {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 SELF TESTS DO NÚCLEO            ║");
    crate::kinfo!("╚════════════════════════════════════════╝");

    let mut report = run_test_suite("Escalonador", SCHED_TESTS);
    report.merge(run_test_suite("Synch", SYNCH_TESTS));
    report.merge(run_test_suite("Timers", TIMER_TESTS));

    if report.ok() {
        crate::kinfo!("╔════════════════════════════════════════╗");
        crate::kinfo!("║  ✅ NÚCLEO VALIDADO!                   ║");
        crate::kinfo!("╚════════════════════════════════════════╝");
    } else {
        crate::kfail!("(SelfTest) Suites com falhas");
        crate::kerror!("(SelfTest) Falhas: ", report.failed);
    }
    report
}

fn boot() -> Option<(Arc<SimHost>, Nucleus)> {
    let host = Arc::new(SimHost::new());
    match Nucleus::new(NucleusConfig::default(), host.clone()) {
        Ok(nk) => Some((host, nk)),
        Err(err) => {
            crate::kerror!("(SelfTest) Boot falhou, código=", err.as_code() as i64);
            None
        }
    }
}

fn spawn(nk: &Nucleus, name: &str, prio: i32) -> Option<ThreadId> {
    let t = nk.create_thread(&ThreadAttr::new(name, SchedPolicy::Fifo { prio })).ok()?;
    nk.start_thread(t).ok()?;
    Some(t)
}

fn check(cond: bool, what: &str) -> TestResult {
    if cond {
        TestResult::Passed
    } else {
        crate::kerror!("(SelfTest) Verificação falhou:");
        crate::kerror!(what);
        TestResult::Failed
    }
}

/// Thread mais urgente toma a CPU; ao bloquear, a anterior volta.
fn test_fifo_preemption() -> TestResult {
    let Some((_host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let (Some(low), Some(high)) = (spawn(&nk, "low", 10), spawn(&nk, "high", 20)) else {
        return TestResult::Failed;
    };
    if nk.current_thread(0) != Ok(high) {
        return check(false, "preempção");
    }
    if nk.suspend_thread(high).is_err() {
        return TestResult::Failed;
    }
    check(nk.current_thread(0) == Ok(low), "retorno à thread de menor prioridade")
}

fn test_delete_current() -> TestResult {
    let Some((_host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let Some(t) = spawn(&nk, "victim", 10) else {
        return TestResult::Failed;
    };
    if nk.delete_thread(t).is_err() {
        return TestResult::Failed;
    }
    check(
        nk.current_thread(0) == nk.root_thread(0) && nk.nr_threads() == 1,
        "zumbi liberado após a troca",
    )
}

fn test_pi_boost() -> TestResult {
    let Some((_host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let Ok(m) = nk.create_synch("st-mutex", SynchFlags::OWNER | SynchFlags::PIP) else {
        return TestResult::Failed;
    };
    let Some(low) = spawn(&nk, "owner", 5) else {
        return TestResult::Failed;
    };
    if nk.acquire(low, &m, Timeout::Infinite) != Ok(Grant::Immediate) {
        return check(false, "aquisição rápida");
    }
    let Some(high) = spawn(&nk, "waiter", 30) else {
        return TestResult::Failed;
    };
    if nk.acquire(high, &m, Timeout::Infinite) != Ok(Grant::Pending) {
        return check(false, "contenção");
    }

    let boosted = nk.thread_snapshot(low).map(|s| s.current.prio) == Ok(30);
    let handed = nk.release(low, &m) == Ok(Some(high));
    let restored = nk.thread_snapshot(low).map(|s| s.current.prio) == Ok(5);
    check(boosted && handed && restored, "herança e devolução de prioridade")
}

fn test_wait_queue_wakeup() -> TestResult {
    let Some((_host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let Ok(q) = nk.create_synch("st-queue", SynchFlags::PRIO) else {
        return TestResult::Failed;
    };
    let Some(t) = spawn(&nk, "sleeper", 10) else {
        return TestResult::Failed;
    };
    if nk.sleep_on(t, &q, Timeout::Infinite) != Ok(Grant::Pending) {
        return TestResult::Failed;
    }
    let woken = nk.wakeup_one_sleeper(&q) == Ok(Some(t));
    check(woken && nk.wait_result(t) == Ok(Grant::AfterWait), "despertar sem perda")
}

fn test_periodic_overruns() -> TestResult {
    let Some((host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let Ok(timer) = nk.create_timer("st-periodic", 0, |_| {}) else {
        return TestResult::Failed;
    };
    if nk.start_timer(timer, 100, 100, TimerMode::Relative).is_err() {
        return TestResult::Failed;
    }
    host.set_time(450);
    nk.clock_tick();
    check(
        nk.timer_overruns(timer) == Ok(3) && nk.timer_date(timer) == Ok(Some(500)),
        "recarga com overruns",
    )
}

fn test_sleep_timeout() -> TestResult {
    let Some((host, nk)) = boot() else {
        return TestResult::Failed;
    };
    let Some(t) = spawn(&nk, "sleeper", 10) else {
        return TestResult::Failed;
    };
    if nk.sleep(t, Timeout::Relative(1_000)).is_err() {
        return TestResult::Failed;
    }
    host.set_time(1_000);
    nk.clock_tick();
    check(nk.current_thread(0) == Ok(t), "despertar por timeout")
}

#[cfg(test)]
mod tests {
    use super::run_selftests;

    #[test]
    fn boot_suites_pass_on_simulated_host() {
        let report = run_selftests();
        assert!(report.ok(), "{:?}", report);
        assert_eq!(report.passed, 6);
    }
}
