//! Esperas temporizadas e threads periódicas
//!
//! `wait_period` é um protocolo em duas fases. A primeira chamada bloqueia
//! a thread (PWAIT + DELAY) até o próximo ponto de liberação e devolve
//! `Blocked`; a chamada seguinte, já desperta, consome o resultado:
//! quantos pontos de liberação foram perdidos desde a última vez.

use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::time::timer::{Timeout, TimerMode};
use crate::sys::{Nanos, SysError, SysResult, ThreadId};

use super::state::{ThreadInfo, ThreadState};

/// Resultado de `wait_period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodWait {
    /// A thread dormiu até o próximo ponto; chamar de novo após despertar
    Blocked,
    /// Ponto de liberação alcançado
    Released { overruns: u64 },
}

impl NucleusState {
    fn sleep(&mut self, core: &Core, tid: ThreadId, timeout: Timeout) -> SysResult<()> {
        self.user_thread(tid)?;
        match timeout {
            Timeout::Infinite => Err(SysError::InvalidArgument),
            Timeout::NonBlock => Ok(()),
            // Data já passada: nada a esperar
            _ => match self.block_thread(core, tid, ThreadState::DELAY, timeout, None) {
                Err(SysError::TimedOut) => Ok(()),
                other => other,
            },
        }
    }

    fn set_periodic(
        &mut self,
        core: &Core,
        tid: ThreadId,
        start_ns: Nanos,
        period_ns: Nanos,
        mode: TimerMode,
    ) -> SysResult<()> {
        self.user_thread(tid)?;
        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        t.info.remove(ThreadInfo::PWAIT);
        let ptimer = t.ptimer;

        if period_ns == 0 {
            return self.timer_stop(core, ptimer);
        }
        self.timer_start(core, ptimer, start_ns, period_ns, mode)?;
        crate::kdebug!("(Thread) Periódica, tid=", tid.as_u32());
        Ok(())
    }

    fn wait_period(&mut self, core: &Core, tid: ThreadId) -> SysResult<PeriodWait> {
        self.user_thread(tid)?;
        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        let ptimer = t.ptimer;

        if t.info.contains(ThreadInfo::PWAIT) {
            if t.state.contains(ThreadState::DELAY) {
                return Ok(PeriodWait::Blocked);
            }
            t.info.remove(ThreadInfo::PWAIT);
            if t.info.contains(ThreadInfo::BREAK) {
                return Err(SysError::Interrupted);
            }
        } else {
            let timer = self.timers.get(ptimer.0).ok_or(SysError::BadHandle)?;
            if !timer.is_running() || timer.interval == 0 {
                return Err(SysError::InvalidArgument);
            }
            let now = core.clock.read_raw(&*core.host);
            if now < timer.pexpect {
                if let Some(t) = self.threads.get_mut(tid.0) {
                    t.info.insert(ThreadInfo::PWAIT);
                }
                self.block_thread(core, tid, ThreadState::DELAY, Timeout::Infinite, None)?;
                return Ok(PeriodWait::Blocked);
            }
        }

        let now = core.clock.read_raw(&*core.host);
        let timer = self.timers.get_mut(ptimer.0).ok_or(SysError::BadHandle)?;
        let overruns = timer.take_overruns(now);
        Ok(PeriodWait::Released { overruns })
    }
}

impl Nucleus {
    /// Dorme até o timeout (DELAY). `unblock_thread` acorda antes, com BREAK.
    pub fn sleep(&self, thread: ThreadId, timeout: Timeout) -> SysResult<()> {
        let mut st = self.lock();
        st.sleep(&self.core, thread, timeout)?;
        self.commit(&mut st);
        Ok(())
    }

    /// Torna a thread periódica a partir de `start_ns` (modo `mode`).
    /// Período 0 desliga.
    pub fn set_periodic(&self, thread: ThreadId, start_ns: Nanos, period_ns: Nanos, mode: TimerMode) -> SysResult<()> {
        self.lock().set_periodic(&self.core, thread, start_ns, period_ns, mode)
    }

    pub fn wait_period(&self, thread: ThreadId) -> SysResult<PeriodWait> {
        let mut st = self.lock();
        let result = st.wait_period(&self.core, thread)?;
        self.commit(&mut st);
        Ok(result)
    }
}
