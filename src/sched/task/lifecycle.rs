//! Ciclo de vida das threads
//!
//! Criação, início, suspensão, bloqueio e despertar, remoção, mudança de
//! política e migração entre CPUs. Uma thread removida enquanto corrente
//! vira zumbi e só é liberada pelo `schedule()` da sua CPU, depois que
//! outra thread assumiu a CPU.

use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::smp::CpuSet;
use crate::core::time::timer::{Timeout, Timer, TimerHandler, TIMER_STDPRIO};
use crate::klib::arena::Arena;
use crate::sched::scheduler::policy::{SchedParam, SchedPolicy};
use crate::sys::{CpuId, SynchId, SysError, SysResult, ThreadId, Ticks};

use super::entity::{Thread, ThreadAttr};
use super::state::{ThreadInfo, ThreadState};

impl NucleusState {
    /// Aloca a thread e seus dois timers. Função associada para servir ao
    /// boot, antes de existir um `NucleusState`.
    pub(crate) fn thread_alloc(
        threads: &mut Arena<Thread>,
        timers: &mut Arena<Timer>,
        cpu: CpuId,
        build: impl FnOnce(ThreadId) -> Thread,
    ) -> SysResult<ThreadId> {
        let tid = threads
            .insert_with(|handle| build(ThreadId(handle)))
            .map(ThreadId)
            .ok_or(SysError::OutOfMemory)?;

        let rtimer = match Self::timer_alloc(timers, "[rtimer]", cpu, TIMER_STDPRIO, TimerHandler::ThreadTimeout(tid)) {
            Ok(timer) => timer,
            Err(err) => {
                threads.remove(tid.0);
                return Err(err);
            }
        };
        let ptimer = match Self::timer_alloc(timers, "[ptimer]", cpu, TIMER_STDPRIO, TimerHandler::PeriodicRelease(tid)) {
            Ok(timer) => timer,
            Err(err) => {
                timers.remove(rtimer.0);
                threads.remove(tid.0);
                return Err(err);
            }
        };

        if let Some(thread) = threads.get_mut(tid.0) {
            thread.rtimer = rtimer;
            thread.ptimer = ptimer;
        }
        Ok(tid)
    }

    fn online_cpus(&self) -> CpuSet {
        CpuSet::first(self.scheds.nr_cpus())
    }

    /// A política é aceitável para uma thread na CPU `cpu`?
    pub(crate) fn validate_policy(&self, policy: &SchedPolicy, cpu: CpuId) -> SysResult<()> {
        if !policy.prio_in_range() {
            return Err(SysError::InvalidArgument);
        }
        let sched = self.scheds.get(cpu).ok_or(SysError::InvalidArgument)?;
        match *policy {
            SchedPolicy::Quota { group, .. } => {
                if group.cpu != cpu || sched.quota.group(group.index).is_none() {
                    return Err(SysError::InvalidArgument);
                }
            }
            SchedPolicy::Tp { partition, .. } => {
                if partition >= sched.tp.nr_partitions() {
                    return Err(SysError::InvalidArgument);
                }
            }
            SchedPolicy::Fifo { .. } | SchedPolicy::RoundRobin { .. } | SchedPolicy::Weak { .. } => {}
        }
        Ok(())
    }

    /// Conta (ou descarta) a thread como membro do seu grupo de quota.
    fn quota_membership(&mut self, policy: &SchedPolicy, join: bool) {
        let SchedPolicy::Quota { group, .. } = *policy else {
            return;
        };
        if let Some(g) = self.scheds.get_mut(group.cpu).and_then(|s| s.quota.group_mut(group.index)) {
            if join {
                g.nr_threads += 1;
            } else {
                g.nr_threads = g.nr_threads.saturating_sub(1);
            }
        }
    }

    fn rr_quantum(core: &Core, policy: &SchedPolicy) -> Ticks {
        match *policy {
            SchedPolicy::RoundRobin { quantum, .. } => {
                let ns = if quantum == 0 { core.config.rr_quantum_ns } else { quantum };
                core.clock.ns_to_ticks(ns).max(1)
            }
            _ => 0,
        }
    }

    pub(crate) fn create_thread(&mut self, core: &Core, attr: &ThreadAttr<'_>) -> SysResult<ThreadId> {
        let online = self.online_cpus();
        let requested = if attr.affinity.is_empty() { online } else { attr.affinity };
        let affinity = CpuSet::from_bits(requested.bits() & online.bits());
        let cpu = affinity.first_cpu().ok_or(SysError::InvalidArgument)?;
        self.validate_policy(&attr.policy, cpu)?;

        let tid = Self::thread_alloc(&mut self.threads, &mut self.timers, cpu, |id| {
            Thread::new(id, attr.name, cpu, affinity, attr.policy)
        })?;
        if let Some(t) = self.threads.get_mut(tid.0) {
            t.accounting.quantum = Self::rr_quantum(core, &attr.policy);
        }
        self.quota_membership(&attr.policy, true);

        core.stats.inc_threads_created();
        crate::kdebug!("(Thread) Criada tid=", tid.as_u32());
        Ok(tid)
    }

    /// Põe uma thread executável na fila da sua CPU e pede reescalonamento.
    pub(crate) fn make_ready(&mut self, core: &Core, tid: ThreadId) {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return;
        };
        if !t.state.is_runnable() {
            return;
        }
        let cpu = t.cpu;
        if self.scheds[cpu].curr == tid {
            self.request_reschedule(core, cpu);
            return;
        }
        if !t.state.contains(ThreadState::READY) {
            t.state.insert(ThreadState::READY);
            let hold = t.quota_hold(cpu);
            self.scheds[cpu].enqueue(tid, &t.cparam, hold, false);
        }
        self.request_reschedule(core, cpu);
    }

    /// Bloqueia `tid` com os bits de `mask`. Um timeout finito arma o
    /// rtimer e acrescenta DELAY; `wchan` é o synch em cuja pendq a thread
    /// já foi ligada.
    pub(crate) fn block_thread(
        &mut self,
        core: &Core,
        tid: ThreadId,
        mask: ThreadState,
        timeout: Timeout,
        wchan: Option<SynchId>,
    ) -> SysResult<()> {
        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        let mut mask = mask;
        let waiting = mask.intersects(ThreadState::PEND | ThreadState::DELAY) || timeout.as_timer().is_some();
        if waiting {
            t.info.remove(ThreadInfo::WAIT_BITS);
            t.wwake = None;
        }
        if wchan.is_some() {
            t.wchan = wchan;
        }
        let rtimer = t.rtimer;
        let cpu = t.cpu;

        if let Some((value, mode)) = timeout.as_timer() {
            if let Err(err) = self.timer_start(core, rtimer, value, 0, mode) {
                if let Some(t) = self.threads.get_mut(tid.0) {
                    t.info.insert(ThreadInfo::TIMEO);
                }
                if wchan.is_some() {
                    self.forget_sleeper(core, tid);
                }
                return Err(err);
            }
            mask |= ThreadState::DELAY;
        }

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        if t.state.contains(ThreadState::READY) {
            t.state.remove(ThreadState::READY);
            self.scheds[cpu].dequeue(tid, &t.cparam);
        }
        t.state.insert(mask);
        t.accounting.waits += 1;
        crate::ktrace!("(Thread) Bloqueada tid=", tid.as_u32());

        self.request_reschedule(core, cpu);
        Ok(())
    }

    /// Limpa os bits de `mask`. PEND ou DELAY desarmam o rtimer e soltam a
    /// thread da pendq em que ainda estiver.
    pub(crate) fn resume_thread(&mut self, core: &Core, tid: ThreadId, mask: ThreadState) {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return;
        };
        if !t.state.intersects(mask) {
            return;
        }

        if mask.intersects(ThreadState::PEND | ThreadState::DELAY) {
            let pending = t.state.contains(ThreadState::PEND) && t.wchan.is_some();
            t.state.remove(ThreadState::PEND | ThreadState::DELAY);
            let rtimer = t.rtimer;
            let _ = self.timer_stop(core, rtimer);
            if pending {
                self.forget_sleeper(core, tid);
            }
        }
        if let Some(t) = self.threads.get_mut(tid.0) {
            t.state.remove(mask);
        }
        self.make_ready(core, tid);
    }

    fn start_thread(&mut self, core: &Core, tid: ThreadId) -> SysResult<()> {
        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        if !t.state.contains(ThreadState::DORMANT) {
            return Err(SysError::Busy);
        }
        t.state.insert(ThreadState::STARTED);
        self.resume_thread(core, tid, ThreadState::DORMANT);
        crate::kdebug!("(Thread) Iniciada tid=", tid.as_u32());
        Ok(())
    }

    /// Thread existente, viva e que não é root.
    pub(crate) fn user_thread(&self, tid: ThreadId) -> SysResult<&Thread> {
        let t = self.threads.get(tid.0).ok_or(SysError::BadHandle)?;
        if t.state.contains(ThreadState::ZOMBIE) {
            return Err(SysError::BadHandle);
        }
        if t.is_root() {
            return Err(SysError::InvalidArgument);
        }
        Ok(t)
    }

    fn suspend_thread(&mut self, core: &Core, tid: ThreadId) -> SysResult<()> {
        let t = self.user_thread(tid)?;
        if t.state.contains(ThreadState::SUSP) {
            return Ok(());
        }
        self.block_thread(core, tid, ThreadState::SUSP, Timeout::Infinite, None)
    }

    fn unblock_thread(&mut self, core: &Core, tid: ThreadId) -> SysResult<bool> {
        let t = self.user_thread(tid)?;
        if !t.state.intersects(ThreadState::PEND | ThreadState::DELAY) {
            return Ok(false);
        }
        if let Some(t) = self.threads.get_mut(tid.0) {
            t.info.insert(ThreadInfo::BREAK);
        }
        self.resume_thread(core, tid, ThreadState::PEND | ThreadState::DELAY);
        Ok(true)
    }

    fn delete_thread(&mut self, core: &Core, tid: ThreadId) -> SysResult<()> {
        self.user_thread(tid)?;

        // Posses com waiters passam adiante, com ou sem PIP; as demais ficam
        // abandonadas na palavra rápida e são tomadas no próximo acquire.
        self.release_claims(core, tid);

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        let pending = t.state.contains(ThreadState::PEND) && t.wchan.is_some();
        let (rtimer, ptimer, cpu, policy) = (t.rtimer, t.ptimer, t.cpu, t.policy);
        if pending {
            self.forget_sleeper(core, tid);
        }
        self.timer_destroy(core, rtimer)?;
        self.timer_destroy(core, ptimer)?;
        self.quota_membership(&policy, false);

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        if t.state.contains(ThreadState::READY) {
            self.scheds[cpu].dequeue(tid, &t.cparam);
        }
        core.stats.inc_threads_deleted();

        if self.scheds[cpu].curr == tid {
            // Ainda ocupa a CPU: liberar só depois da troca
            t.state = ThreadState::ZOMBIE;
            self.scheds[cpu].zombie = Some(tid);
            self.request_reschedule(core, cpu);
            crate::kdebug!("(Thread) Zumbi tid=", tid.as_u32());
        } else {
            self.threads.remove(tid.0);
            crate::kdebug!("(Thread) Removida tid=", tid.as_u32());
        }
        Ok(())
    }

    pub(crate) fn finalize_zombie(&mut self, _core: &Core, tid: ThreadId) {
        if self.threads.remove(tid.0).is_some() {
            crate::ktrace!("(Thread) Zumbi liberado tid=", tid.as_u32());
        }
    }

    fn set_schedparam(&mut self, core: &Core, tid: ThreadId, policy: SchedPolicy) -> SysResult<()> {
        let t = self.user_thread(tid)?;
        let cpu = t.cpu;
        let old_policy = t.policy;
        self.validate_policy(&policy, cpu)?;

        self.quota_membership(&old_policy, false);
        self.quota_membership(&policy, true);

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        if t.state.contains(ThreadState::READY) {
            t.state.remove(ThreadState::READY);
            self.scheds[cpu].dequeue(tid, &t.cparam);
        }
        t.policy = policy;
        t.bparam = SchedParam::from_policy(&policy);
        t.state.set(ThreadState::RRB, matches!(policy, SchedPolicy::RoundRobin { .. }));
        t.accounting.quantum = Self::rr_quantum(core, &policy);

        let effective = self.pi_effective(tid);
        if let Some(t) = self.threads.get_mut(tid.0) {
            t.cparam = effective;
            t.state.set(ThreadState::BOOST, effective != t.bparam);
        }

        self.make_ready(core, tid);
        self.requeue_sleeper(core, tid);
        self.request_reschedule(core, cpu);
        Ok(())
    }

    /// Troca a CPU dona e leva junto os timers da thread.
    fn move_thread_cpu(&mut self, core: &Core, tid: ThreadId, cpu: CpuId) {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return;
        };
        t.cpu = cpu;
        let (rtimer, ptimer) = (t.rtimer, t.ptimer);
        let _ = self.timer_migrate(core, rtimer, cpu);
        let _ = self.timer_migrate(core, ptimer, cpu);
    }

    /// Move `tid` para `cpu`. Uma thread corrente é marcada MIGRATE e sai
    /// no próximo `schedule()` da CPU de origem.
    fn move_thread(&mut self, core: &Core, tid: ThreadId, cpu: CpuId) -> SysResult<()> {
        let t = self.threads.get(tid.0).ok_or(SysError::BadHandle)?;
        if t.cpu == cpu {
            return Ok(());
        }
        let policy = t.policy;
        let src = t.cpu;
        self.validate_policy(&policy, cpu)?;

        if self.scheds[src].curr == tid {
            if let Some(t) = self.threads.get_mut(tid.0) {
                t.state.insert(ThreadState::MIGRATE);
                t.migrate_to = Some(cpu);
            }
            self.request_reschedule(core, src);
            return Ok(());
        }

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        let was_ready = t.state.contains(ThreadState::READY);
        if was_ready {
            t.state.remove(ThreadState::READY);
            self.scheds[src].dequeue(tid, &t.cparam);
        }
        self.move_thread_cpu(core, tid, cpu);
        if was_ready {
            self.make_ready(core, tid);
        }
        Ok(())
    }

    /// Fim de uma migração, depois que a thread saiu da CPU de origem.
    pub(crate) fn complete_migration(&mut self, core: &Core, tid: ThreadId) {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return;
        };
        t.state.remove(ThreadState::MIGRATE);
        let Some(target) = t.migrate_to.take() else {
            return;
        };
        self.move_thread_cpu(core, tid, target);
        crate::ktrace!("(Thread) Migrada para cpu=", target);
        self.make_ready(core, tid);
    }

    fn migrate_thread(&mut self, core: &Core, tid: ThreadId, cpu: CpuId) -> SysResult<()> {
        let t = self.user_thread(tid)?;
        if !self.valid_cpu(cpu) || !t.affinity.contains(cpu) {
            return Err(SysError::InvalidArgument);
        }
        if t.state.contains(ThreadState::READY) {
            return Err(SysError::Busy);
        }
        self.move_thread(core, tid, cpu)
    }

    fn set_affinity(&mut self, core: &Core, tid: ThreadId, affinity: CpuSet) -> SysResult<()> {
        self.user_thread(tid)?;
        let affinity = CpuSet::from_bits(affinity.bits() & self.online_cpus().bits());
        let target = affinity.first_cpu().ok_or(SysError::InvalidArgument)?;

        let t = self.threads.get_mut(tid.0).ok_or(SysError::BadHandle)?;
        t.affinity = affinity;
        if !affinity.contains(t.cpu) {
            self.move_thread(core, tid, target)?;
        }
        Ok(())
    }
}

impl Nucleus {
    /// Cria uma thread DORMANT na primeira CPU da sua afinidade.
    pub fn create_thread(&self, attr: &ThreadAttr<'_>) -> SysResult<ThreadId> {
        self.lock().create_thread(&self.core, attr)
    }

    pub fn start_thread(&self, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.start_thread(&self.core, thread)?;
        self.commit(&mut st);
        Ok(())
    }

    pub fn suspend_thread(&self, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.suspend_thread(&self.core, thread)?;
        self.commit(&mut st);
        Ok(())
    }

    /// Desfaz `suspend_thread`. As demais esperas continuam valendo.
    pub fn resume_thread(&self, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.user_thread(thread)?;
        st.resume_thread(&self.core, thread, ThreadState::SUSP);
        self.commit(&mut st);
        Ok(())
    }

    /// Interrompe uma espera (PEND ou DELAY). Retorna se a thread esperava.
    pub fn unblock_thread(&self, thread: ThreadId) -> SysResult<bool> {
        let mut st = self.lock();
        let unblocked = st.unblock_thread(&self.core, thread)?;
        self.commit(&mut st);
        Ok(unblocked)
    }

    pub fn delete_thread(&self, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.delete_thread(&self.core, thread)?;
        self.commit(&mut st);
        Ok(())
    }

    /// Nova política base. A prioridade corrente continua respeitando a
    /// herança ativa.
    pub fn set_schedparam(&self, thread: ThreadId, policy: SchedPolicy) -> SysResult<()> {
        let mut st = self.lock();
        st.set_schedparam(&self.core, thread, policy)?;
        self.commit(&mut st);
        Ok(())
    }

    pub fn set_affinity(&self, thread: ThreadId, affinity: CpuSet) -> SysResult<()> {
        let mut st = self.lock();
        st.set_affinity(&self.core, thread, affinity)?;
        self.commit(&mut st);
        Ok(())
    }

    pub fn migrate_thread(&self, thread: ThreadId, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        st.migrate_thread(&self.core, thread, cpu)?;
        self.commit(&mut st);
        Ok(())
    }
}
