//! Arquivo: core/time/tick.rs
//!
//! Propósito: Tratamento da interrupção do timer do núcleo.
//! Dispara os timers vencidos da CPU, recarrega os periódicos e programa
//! o próximo one-shot do hardware.
//!
//! Detalhes de Implementação:
//! - `INTCK` fica ligado durante toda a varredura: starts e stops feitos
//!   pelos handlers não reprogramam o hardware; a programação acontece uma
//!   vez, no fim.
//! - Um timer vence quando `date <= now + gravity`.
//! - O tick do host pode ser adiado (HDEFER) quando há troca pendente ou
//!   uma thread RT executando; a volta à root reprograma o hardware.

use alloc::vec::Vec;

use super::timer::{TimerAction, TimerMode, TimerStatus};
use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::smp::{IpiTarget, IpiVector};
use crate::sched::scheduler::SchedStatus;
use crate::sched::task::state::{ThreadInfo, ThreadState};
use crate::sys::{CpuId, Nanos, STicks, SysError, SysResult, Ticks, TimerId};

impl NucleusState {
    /// Varre a fila de `cpu` disparando tudo que venceu.
    pub(crate) fn clock_tick(&mut self, core: &Core, cpu: CpuId) {
        let gravity = core.clock.gravity();
        let host = &*core.host;
        self.scheds[cpu].status.insert(SchedStatus::INTCK);

        let mut now = core.clock.read_raw(host);
        while let Some((date, id)) = self.timerqs[cpu].head() {
            if date > now.saturating_add(gravity) {
                break;
            }
            self.timer_dequeue(id);

            let overruns = match self.timers.get(id.0) {
                Some(timer) if timer.interval > 0 && now > date => (now - date) / timer.interval,
                Some(_) => 0,
                None => continue,
            };
            self.timer_fire(core, id, cpu, date, overruns);

            // O handler pode ter demorado
            now = core.clock.read_raw(host);
            self.timer_reload(core, id, now);
        }

        self.scheds[cpu].status.remove(SchedStatus::INTCK);
        self.local_shot(core, cpu);
    }

    /// Programa o hardware local para o timer que encabeça a fila.
    pub(crate) fn local_shot(&mut self, core: &Core, cpu: CpuId) {
        let sched = &self.scheds[cpu];
        if sched.status.contains(SchedStatus::INTCK) {
            return;
        }
        let queue = &self.timerqs[cpu];
        let Some((mut date, head)) = queue.head() else {
            return;
        };

        let mut defer = false;
        if core.config.timer.defer_host_tick
            && head == sched.htimer
            && (sched.resched_pending() || sched.curr != sched.root)
        {
            if let Some((next, _)) = queue.second() {
                date = next;
                defer = true;
            }
        }
        self.scheds[cpu].status.set(SchedStatus::HDEFER, defer);

        let horizon = core.clock.read_raw(&*core.host).saturating_add(core.clock.gravity());
        core.host.program_shot(cpu, date.saturating_sub(horizon));
    }

    /// Reprograma o one-shot de `cpu`, local ou via IPI.
    pub(crate) fn program_shot(&mut self, core: &Core, cpu: CpuId) {
        if self.scheds[cpu].status.contains(SchedStatus::INTCK) {
            return;
        }
        if cpu != core.host.current_cpu() {
            core.host.send_ipi(IpiTarget::Single(cpu), IpiVector::TimerShot);
            core.stats.inc_ipis();
            return;
        }
        self.local_shot(core, cpu);
    }

    /// Efeito dos timers internos
    pub(crate) fn timer_action(&mut self, core: &Core, cpu: CpuId, action: TimerAction) {
        match action {
            TimerAction::Timeout(thread) => {
                if let Some(t) = self.threads.get_mut(thread.0) {
                    t.info.insert(ThreadInfo::TIMEO);
                }
                self.resume_thread(core, thread, ThreadState::DELAY | ThreadState::PEND);
            }
            TimerAction::Release(thread) => {
                let waiting = self.threads.get(thread.0).is_some_and(|t| {
                    t.info.contains(ThreadInfo::PWAIT) && t.state.contains(ThreadState::DELAY)
                });
                if waiting {
                    self.resume_thread(core, thread, ThreadState::DELAY);
                }
            }
            TimerAction::HostTick => {
                let sched = &mut self.scheds[cpu];
                sched.status.insert(SchedStatus::HTICK);
                sched.status.remove(SchedStatus::HDEFER);
                self.host_tick_accounting(core, cpu);
            }
            TimerAction::QuotaRefill => {
                if self.scheds[cpu].quota.replenish() {
                    self.request_reschedule(core, cpu);
                }
            }
            TimerAction::TpSwitch => {
                let sched = &mut self.scheds[cpu];
                if !sched.tp.is_running() {
                    return;
                }
                let next = sched.tp.advance();
                let timer = sched.tp.timer;
                if let Some(timer) = timer {
                    // Fronteira futura: start não falha
                    let _ = self.timer_start_ticks(core, timer, next, 0, false, false);
                }
                crate::ktrace!("(TP) Janela trocada na cpu=", cpu);
                self.request_reschedule(core, cpu);
            }
        }
    }

    /// Reposiciona um timer REALTIME após o relógio de parede andar `delta`.
    fn adjust_timer(&mut self, id: TimerId, delta: STicks, now: Ticks) {
        self.timer_dequeue(id);
        let Some(timer) = self.timers.get_mut(id.0) else {
            return;
        };
        timer.date = timer.date.saturating_add_signed(-delta);

        if timer.status.contains(TimerStatus::PERIODIC) {
            timer.pexpect = timer.pexpect.saturating_add_signed(-delta);
            let period = timer.interval.min(STicks::MAX as u64) as STicks;
            let diff = (now as STicks).saturating_sub(timer.date as STicks);

            if diff.saturating_sub(period) >= 0 {
                // Períodos que ficaram no passado são pulados
                timer.date = timer.date.saturating_add_signed(diff - diff % period);
            } else if delta < 0 && timer.status.contains(TimerStatus::FIRED) && diff.saturating_add(period) <= 0 {
                let rem = diff.saturating_neg() % period;
                timer.date = timer.date.saturating_add_signed(diff + rem);
                timer.pexpect = timer.pexpect.saturating_add_signed(diff + rem);
            }
        }

        self.timer_enqueue(id);
    }

    pub(crate) fn adjust_clock(&mut self, core: &Core, delta_ns: i64) {
        core.clock.shift_wallclock(delta_ns);

        let magnitude = core.clock.ns_to_ticks(delta_ns.unsigned_abs()).min(STicks::MAX as u64) as STicks;
        let delta = if delta_ns < 0 { -magnitude } else { magnitude };
        let now = core.clock.read_raw(&*core.host);

        for cpu in 0..self.scheds.nr_cpus() as CpuId {
            let realtime: Vec<TimerId> = self.timerqs[cpu]
                .iter()
                .map(|(_, id)| id)
                .filter(|id| {
                    self.timers
                        .get(id.0)
                        .is_some_and(|t| t.status.contains(TimerStatus::REALTIME))
                })
                .collect();
            if realtime.is_empty() {
                continue;
            }
            for id in realtime {
                self.adjust_timer(id, delta, now);
            }
            self.program_shot(core, cpu);
        }
    }
}

impl Nucleus {
    /// Entrada da interrupção do timer na CPU corrente.
    /// Dispara os timers vencidos e executa a troca pendente.
    pub fn clock_tick(&self) {
        let cpu = self.core.host.current_cpu();
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return;
        }
        st.clock_tick(&self.core, cpu);
        st.schedule(&self.core, cpu);
    }

    /// Entrada de `IpiVector::TimerShot`: outra CPU mexeu na nossa fila.
    pub fn timer_ipi(&self) {
        let cpu = self.core.host.current_cpu();
        let mut st = self.lock();
        if st.valid_cpu(cpu) {
            st.local_shot(&self.core, cpu);
        }
    }

    /// Move o relógio de parede em `delta_ns` e reordena os timers REALTIME.
    pub fn adjust_clock(&self, delta_ns: i64) {
        let mut st = self.lock();
        st.adjust_clock(&self.core, delta_ns);
        crate::kinfo!("(Clock) Relógio de parede ajustado, offset=", self.core.clock.wallclock_offset());
    }

    /// Arma o tick periódico do host em `cpu`.
    pub fn start_host_tick(&self, cpu: CpuId, period_ns: Nanos) -> SysResult<()> {
        if period_ns == 0 {
            return Err(SysError::InvalidArgument);
        }
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        let htimer = st.scheds[cpu].htimer;
        st.timer_start(&self.core, htimer, period_ns, period_ns, TimerMode::Relative)?;
        crate::kdebug!("(Clock) Tick do host armado, cpu=", cpu);
        Ok(())
    }

    pub fn stop_host_tick(&self, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        let htimer = st.scheds[cpu].htimer;
        st.timer_stop(&self.core, htimer)
    }

    /// Consome o tick do host pendente de `cpu`, se houver.
    pub fn take_host_tick(&self, cpu: CpuId) -> bool {
        let mut st = self.lock();
        let Some(sched) = st.scheds.get_mut(cpu) else {
            return false;
        };
        let pending = sched.status.contains(SchedStatus::HTICK);
        sched.status.remove(SchedStatus::HTICK);
        pending
    }
}
