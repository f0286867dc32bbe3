//! Herança de prioridade
//!
//! A prioridade corrente de uma thread é o máximo entre a base e a cabeça
//! da pendq de cada synch que ela possui com waiters (`claimq`). Toda
//! mudança numa pendq recalcula o dono e, se ele próprio espera num synch
//! com herança, sobe a cadeia.

use crate::core::nucleus::{Core, NucleusState};
use crate::sched::scheduler::policy::SchedParam;
use crate::sched::task::state::ThreadState;
use crate::sys::{SynchId, ThreadId};

use super::SynchFlags;

impl NucleusState {
    /// Prioridade que `tid` deve ter agora.
    pub(crate) fn pi_effective(&self, tid: ThreadId) -> SchedParam {
        let Some(t) = self.threads.get(tid.0) else {
            return SchedParam::IDLE;
        };
        let mut best = t.bparam;
        for sid in &t.claimq {
            let head = self
                .synchs
                .get(sid.0)
                .and_then(|s| s.pendq.front())
                .and_then(|w| self.threads.get(w.0));
            if let Some(waiter) = head {
                if waiter.cparam.weighted() > best.weighted() {
                    best = waiter.cparam;
                }
            }
        }
        best
    }

    /// Troca a prioridade corrente, reposicionando a thread na fila de
    /// prontas. Retorna false se nada mudou.
    fn pi_apply(&mut self, core: &Core, tid: ThreadId, param: SchedParam) -> bool {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return false;
        };
        if t.cparam == param {
            return false;
        }
        let cpu = t.cpu;
        let queued = t.state.contains(ThreadState::READY);
        if queued {
            self.scheds[cpu].dequeue(tid, &t.cparam);
        }
        t.cparam = param;
        t.state.set(ThreadState::BOOST, param != t.bparam);
        if queued {
            let hold = t.quota_hold(cpu);
            self.scheds[cpu].enqueue(tid, &t.cparam, hold, false);
        }
        crate::ktrace!("(PI) Nova prioridade, tid=", tid.as_u32());
        self.request_reschedule(core, cpu);
        true
    }

    /// Recalcula `owner` e segue a cadeia enquanto houver mudança.
    pub(crate) fn pi_propagate(&mut self, core: &Core, owner: ThreadId) {
        let mut owner = owner;
        let mut depth = 0;
        loop {
            let effective = self.pi_effective(owner);
            if !self.pi_apply(core, owner, effective) {
                return;
            }
            let Some(t) = self.threads.get(owner.0) else {
                return;
            };
            let Some(wchan) = t.wchan.filter(|_| t.state.contains(ThreadState::PEND)) else {
                return;
            };

            // A nova prioridade muda a posição do dono na pendq em que ele espera
            self.pendq_reposition(wchan, owner);
            let Some(s) = self.synchs.get(wchan.0) else {
                return;
            };
            if !s.flags.contains(SynchFlags::PIP) {
                return;
            }
            let Some(next) = s.owner() else {
                return;
            };

            depth += 1;
            if depth >= core.config.max_pi_depth {
                crate::kerror!("(PI) Cadeia de herança excede o limite, profundidade=", depth);
                return;
            }
            owner = next;
        }
    }

    /// Liga `tid` à pendq de `sid` respeitando a ordem do synch.
    pub(crate) fn pendq_insert(&mut self, sid: SynchId, tid: ThreadId) {
        let threads = &self.threads;
        let Some(s) = self.synchs.get_mut(sid.0) else {
            return;
        };
        let prio = threads.get(tid.0).map_or(i32::MIN, |t| t.weighted());
        if s.flags.contains(SynchFlags::PRIO) {
            let pos = s
                .pendq
                .iter()
                .position(|w| threads.get(w.0).map_or(true, |t| t.weighted() < prio))
                .unwrap_or(s.pendq.len());
            s.pendq.insert(pos, tid);
        } else {
            s.pendq.push_back(tid);
        }
    }

    fn pendq_reposition(&mut self, sid: SynchId, tid: ThreadId) {
        let Some(s) = self.synchs.get_mut(sid.0) else {
            return;
        };
        if !s.flags.contains(SynchFlags::PRIO) {
            return;
        }
        if let Some(pos) = s.pendq.iter().position(|w| *w == tid) {
            s.pendq.remove(pos);
            self.pendq_insert(sid, tid);
        }
    }

    /// A prioridade de `tid` mudou: reposiciona na pendq em que espera e
    /// propaga ao dono.
    pub(crate) fn requeue_sleeper(&mut self, core: &Core, tid: ThreadId) {
        let Some(t) = self.threads.get(tid.0) else {
            return;
        };
        let Some(wchan) = t.wchan.filter(|_| t.state.contains(ThreadState::PEND)) else {
            return;
        };
        self.pendq_reposition(wchan, tid);

        let owner = self
            .synchs
            .get(wchan.0)
            .filter(|s| s.flags.contains(SynchFlags::PIP))
            .and_then(|s| s.owner());
        if let Some(owner) = owner {
            self.pi_propagate(core, owner);
        }
    }
}
