//! # Orquestrador de Agendamento
//!
//! Decide quem ocupa cada CPU. Quase todas as operações do núcleo só
//! marcam `RESCHED`; a troca acontece em `schedule()`, chamada pela API
//! pública ao final de cada serviço, pelo tick do relógio e pelo hospedeiro
//! ao receber `IpiVector::Reschedule`.
//!
//! ## Fluxo de `schedule(cpu)`
//! 1. Sem `RESCHED`, nada acontece (chamadas repetidas são inofensivas).
//! 2. Cobra o tempo de execução da corrente (e do seu grupo de quota).
//! 3. A corrente, se ainda executável, volta à cabeça do seu nível, ou ao
//!    fim quando `ROTATE` está ligado.
//! 4. `pick_next` escolhe a próxima (a root se não houver prontas).
//! 5. Depois da troca: libera o zumbi, conclui migrações pendentes e
//!    reprograma um tick do host que tinha sido adiado.

use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::smp::{IpiTarget, IpiVector};
use crate::sched::scheduler::policy::SchedClass;
use crate::sched::scheduler::SchedStatus;
use crate::sched::task::state::ThreadState;
use crate::sys::{CpuId, SysError, SysResult, ThreadId, Ticks};

impl NucleusState {
    /// Marca `cpu` para reescalonar. CPU remota recebe uma IPI.
    pub(crate) fn request_reschedule(&mut self, core: &Core, cpu: CpuId) {
        let sched = &mut self.scheds[cpu];
        if sched.status.contains(SchedStatus::RESCHED) {
            return;
        }
        sched.status.insert(SchedStatus::RESCHED);
        if cpu != core.host.current_cpu() {
            core.host.send_ipi(IpiTarget::Single(cpu), IpiVector::Reschedule);
            core.stats.inc_ipis();
        }
    }

    /// Cobra o tempo executado por `thread` até `now`.
    /// Retorna true se o grupo de quota da thread acabou de esgotar.
    fn charge_exec(&mut self, cpu: CpuId, thread: ThreadId, now: Ticks) -> bool {
        let Some(t) = self.threads.get_mut(thread.0) else {
            return false;
        };
        let delta = t.accounting.charge(now);
        match t.cparam.group {
            Some(group) if t.cparam.class == SchedClass::Quota && group.cpu == cpu => {
                self.scheds[cpu].quota.charge(group.index, delta)
            }
            _ => false,
        }
    }

    /// Troca de contexto em `cpu`, se pendente. Retorna true se trocou.
    pub(crate) fn schedule(&mut self, core: &Core, cpu: CpuId) -> bool {
        if !self.scheds[cpu].status.contains(SchedStatus::RESCHED) {
            return false;
        }
        self.scheds[cpu].status.remove(SchedStatus::RESCHED);
        core.stats.inc_schedules();

        let now = core.clock.read_raw(&*core.host);
        let prev = self.scheds[cpu].curr;
        if self.charge_exec(cpu, prev, now) {
            crate::kdebug!("(Quota) Grupo esgotado na cpu=", cpu);
        }

        let rotate = self.scheds[cpu].status.contains(SchedStatus::ROTATE);
        self.scheds[cpu].status.remove(SchedStatus::ROTATE);

        // Corrente ainda executável volta para a fila
        if let Some(t) = self.threads.get_mut(prev.0) {
            t.state.remove(ThreadState::RUNNING);
            if !t.is_root() && t.state.is_runnable() && t.cpu == cpu {
                t.state.insert(ThreadState::READY);
                let hold = t.quota_hold(cpu);
                self.scheds[cpu].enqueue(prev, &t.cparam, hold, !rotate);
            }
        }

        let threads = &self.threads;
        let next = self.scheds[cpu].pick_next(|t| threads.get(t.0).and_then(|th| th.quota_hold(cpu)));

        self.scheds[cpu].curr = next;
        if let Some(t) = self.threads.get_mut(next.0) {
            t.state.remove(ThreadState::READY);
            t.state.insert(ThreadState::RUNNING);
            if next != prev {
                t.accounting.start_exec(now);
            }
            if t.state.contains(ThreadState::RRB) && (next != prev || rotate) {
                t.accounting.reset_quantum(now);
            }
        }

        if next != prev {
            self.scheds[cpu].switches += 1;
            core.stats.inc_context_switches();
            crate::ktrace!("(Sched) Troca para thread=", next.as_u32());
            core.host.switch_to(cpu, prev, next);
        }

        self.finish_switch(core, cpu, prev, next);
        next != prev
    }

    /// Trabalho que só pode acontecer depois que `prev` saiu da CPU.
    fn finish_switch(&mut self, core: &Core, cpu: CpuId, prev: ThreadId, next: ThreadId) {
        if let Some(zombie) = self.scheds[cpu].zombie.take() {
            self.finalize_zombie(core, zombie);
        }

        let migrating = self
            .threads
            .get(prev.0)
            .is_some_and(|t| t.state.contains(ThreadState::MIGRATE));
        if migrating && prev != next {
            self.complete_migration(core, prev);
        }

        let sched = &self.scheds[cpu];
        if next == sched.root && sched.status.contains(SchedStatus::HDEFER) {
            self.local_shot(core, cpu);
        }
    }

    /// Contabilidade do tick do host: quota e quantum de round-robin.
    pub(crate) fn host_tick_accounting(&mut self, core: &Core, cpu: CpuId) {
        let curr = self.scheds[cpu].curr;
        if curr == self.scheds[cpu].root {
            return;
        }
        let now = core.clock.read_raw(&*core.host);
        if self.charge_exec(cpu, curr, now) {
            crate::kdebug!("(Quota) Grupo esgotado no tick, cpu=", cpu);
            self.request_reschedule(core, cpu);
        }

        let expired = self
            .threads
            .get(curr.0)
            .is_some_and(|t| t.state.contains(ThreadState::RRB) && t.accounting.quantum_expired(now));
        if expired {
            self.scheds[cpu].status.insert(SchedStatus::ROTATE);
            self.request_reschedule(core, cpu);
        }
    }

    fn yield_thread(&mut self, core: &Core, thread: ThreadId) -> SysResult<()> {
        let t = self.threads.get_mut(thread.0).ok_or(SysError::BadHandle)?;
        if t.is_root() {
            return Err(SysError::InvalidArgument);
        }
        let cpu = t.cpu;
        if t.state.contains(ThreadState::RUNNING) {
            self.scheds[cpu].status.insert(SchedStatus::ROTATE);
            self.request_reschedule(core, cpu);
        } else if t.state.contains(ThreadState::READY) {
            let hold = t.quota_hold(cpu);
            let sched = &mut self.scheds[cpu];
            sched.dequeue(thread, &t.cparam);
            sched.enqueue(thread, &t.cparam, hold, false);
        }
        Ok(())
    }
}

impl Nucleus {
    /// Executa a troca pendente na CPU corrente. Retorna true se trocou.
    pub fn schedule(&self) -> bool {
        let cpu = self.core.host.current_cpu();
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return false;
        }
        st.schedule(&self.core, cpu)
    }

    pub fn request_reschedule(&self, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        st.request_reschedule(&self.core, cpu);
        self.commit(&mut st);
        Ok(())
    }

    /// Cede a CPU às threads de mesmo nível (vai para o fim da fila).
    pub fn yield_thread(&self, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.yield_thread(&self.core, thread)?;
        self.commit(&mut st);
        Ok(())
    }
}
