//! Administração das classes Quota e TP
//!
//! Grupos de quota e o quadro de particionamento temporal são por CPU.
//! Cada um usa um timer interno na CPU dona: reposição periódica de
//! orçamento e troca de janela.

use alloc::vec::Vec;

use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::time::timer::{TimerHandler, TimerMode, TIMER_HIPRIO};
use crate::sched::config::MAX_QUOTA_GROUPS;
use crate::sched::scheduler::tp::TpWindow;
use crate::sys::{CpuId, Nanos, QuotaGroupId, STicks, SysError, SysResult};

/// Estado de um grupo de quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub group: QuotaGroupId,
    pub quota_ns: Nanos,
    pub peak_ns: Nanos,
    /// Negativo quando o grupo estourou o orçamento
    pub budget_ns: i64,
    pub nr_threads: usize,
    pub exhausted: bool,
}

impl NucleusState {
    fn quota_refill_timer(&mut self, core: &Core, cpu: CpuId) -> SysResult<()> {
        if self.scheds[cpu].quota.timer.is_some() {
            return Ok(());
        }
        let timer = NucleusState::timer_alloc(
            &mut self.timers,
            "[quota-refill]",
            cpu,
            TIMER_HIPRIO,
            TimerHandler::QuotaRefill,
        )?;
        let period = core.config.quota_period_ns;
        if let Err(err) = self.timer_start(core, timer, period, period, TimerMode::Relative) {
            self.timers.remove(timer.0);
            return Err(err);
        }
        self.scheds[cpu].quota.timer = Some(timer);
        Ok(())
    }

    fn quota_snapshot(&self, core: &Core, group: QuotaGroupId) -> SysResult<QuotaSnapshot> {
        let sched = self.scheds.get(group.cpu).ok_or(SysError::InvalidArgument)?;
        let g = sched.quota.group(group.index).ok_or(SysError::NotFound)?;
        let clock = &core.clock;
        let budget = clock.ticks_to_ns(g.run_budget.unsigned_abs()) as STicks;
        Ok(QuotaSnapshot {
            group,
            quota_ns: clock.ticks_to_ns(g.quota),
            peak_ns: clock.ticks_to_ns(g.quota_peak),
            budget_ns: if g.run_budget < 0 { -budget } else { budget },
            nr_threads: g.nr_threads,
            exhausted: g.exhausted,
        })
    }
}

impl Nucleus {
    /// Cria um grupo com `quota_ns` por período, acumulável até `peak_ns`.
    pub fn create_quota_group(&self, cpu: CpuId, quota_ns: Nanos, peak_ns: Nanos) -> SysResult<QuotaGroupId> {
        if quota_ns == 0 || peak_ns < quota_ns {
            return Err(SysError::InvalidArgument);
        }
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        st.quota_refill_timer(&self.core, cpu)?;

        let clock = &self.core.clock;
        let index = st.scheds[cpu]
            .quota
            .create_group(clock.ns_to_ticks(quota_ns), clock.ns_to_ticks(peak_ns), MAX_QUOTA_GROUPS)
            .ok_or(SysError::OutOfMemory)?;
        crate::kdebug!("(Quota) Grupo criado, índice=", index);
        Ok(QuotaGroupId { cpu, index })
    }

    pub fn set_quota(&self, group: QuotaGroupId, quota_ns: Nanos, peak_ns: Nanos) -> SysResult<()> {
        if quota_ns == 0 || peak_ns < quota_ns {
            return Err(SysError::InvalidArgument);
        }
        let mut st = self.lock();
        let sched = st.scheds.get_mut(group.cpu).ok_or(SysError::InvalidArgument)?;
        let g = sched.quota.group_mut(group.index).ok_or(SysError::NotFound)?;
        g.quota = self.core.clock.ns_to_ticks(quota_ns);
        g.quota_peak = self.core.clock.ns_to_ticks(peak_ns);
        g.run_budget = g.run_budget.min(g.quota_peak as STicks);
        Ok(())
    }

    /// Remove um grupo sem membros.
    pub fn destroy_quota_group(&self, group: QuotaGroupId) -> SysResult<()> {
        let mut st = self.lock();
        let sched = st.scheds.get_mut(group.cpu).ok_or(SysError::InvalidArgument)?;
        let g = sched.quota.group(group.index).ok_or(SysError::NotFound)?;
        if g.nr_threads > 0 {
            return Err(SysError::Busy);
        }
        sched.quota.remove_group(group.index);

        if sched.quota.nr_groups() == 0 {
            if let Some(timer) = sched.quota.timer.take() {
                st.timer_destroy(&self.core, timer)?;
            }
        }
        Ok(())
    }

    pub fn quota_snapshot(&self, group: QuotaGroupId) -> SysResult<QuotaSnapshot> {
        self.lock().quota_snapshot(&self.core, group)
    }

    /// Instala o quadro TP de `cpu`. Janelas em ordem crescente de offset,
    /// a primeira em 0, todas dentro do período.
    pub fn set_tp_schedule(&self, cpu: CpuId, windows: &[TpWindow], period_ns: Nanos) -> SysResult<()> {
        let mut st = self.lock();
        let sched = st.scheds.get_mut(cpu).ok_or(SysError::InvalidArgument)?;
        if sched.tp.is_running() {
            return Err(SysError::Busy);
        }
        let Some(first) = windows.first() else {
            return Err(SysError::InvalidArgument);
        };
        if first.offset != 0 || period_ns == 0 {
            return Err(SysError::InvalidArgument);
        }

        let nr_partitions = sched.tp.nr_partitions();
        let mut prev: Option<Nanos> = None;
        for window in windows {
            let ordered = prev.map_or(true, |p| window.offset > p);
            let in_range = window.partition.map_or(true, |p| p < nr_partitions);
            if !ordered || !in_range || window.offset >= period_ns {
                return Err(SysError::InvalidArgument);
            }
            prev = Some(window.offset);
        }

        let clock = &self.core.clock;
        let frame: Vec<_> = windows
            .iter()
            .map(|w| (clock.ns_to_ticks(w.offset), w.partition))
            .collect();
        sched.tp.set_schedule(frame, clock.ns_to_ticks(period_ns));
        crate::kdebug!("(TP) Quadro instalado, janelas=", windows.len());
        Ok(())
    }

    /// Começa a percorrer o quadro TP a partir de agora.
    pub fn start_tp(&self, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        let sched = st.scheds.get_mut(cpu).ok_or(SysError::InvalidArgument)?;
        if !sched.tp.has_schedule() {
            return Err(SysError::InvalidArgument);
        }
        if sched.tp.is_running() {
            return Ok(());
        }

        let existing = sched.tp.timer;
        let timer = match existing {
            Some(timer) => timer,
            None => {
                let timer =
                    NucleusState::timer_alloc(&mut st.timers, "[tp-switch]", cpu, TIMER_HIPRIO, TimerHandler::TpSwitch)?;
                st.scheds[cpu].tp.timer = Some(timer);
                timer
            }
        };

        let now = self.read_raw();
        let Some(boundary) = st.scheds[cpu].tp.start(now) else {
            return Err(SysError::InvalidArgument);
        };
        st.timer_start_ticks(&self.core, timer, boundary, 0, false, false)?;
        st.request_reschedule(&self.core, cpu);
        self.commit(&mut st);
        crate::kinfo!("(TP) Particionamento iniciado na cpu=", cpu);
        Ok(())
    }

    pub fn stop_tp(&self, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        let sched = st.scheds.get_mut(cpu).ok_or(SysError::InvalidArgument)?;
        sched.tp.stop();
        let timer = sched.tp.timer;
        if let Some(timer) = timer {
            st.timer_stop(&self.core, timer)?;
        }
        st.request_reschedule(&self.core, cpu);
        self.commit(&mut st);
        Ok(())
    }

    /// Partição TP ativa em `cpu`
    pub fn tp_partition(&self, cpu: CpuId) -> SysResult<Option<usize>> {
        let st = self.lock();
        let sched = st.scheds.get(cpu).ok_or(SysError::InvalidArgument)?;
        Ok(sched.tp.active_partition())
    }
}
