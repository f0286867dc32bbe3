//! Escalonador por CPU
//!
//! Cada CPU tem um `Sched` com uma fila por classe, a thread corrente, a
//! thread root e as flags de reescalonamento. Todo acesso acontece sob o
//! nklock, via `NucleusState::scheds`.

pub mod policy;
pub mod quota;
pub mod runqueue;
pub mod tp;

use bitflags::bitflags;

use crate::core::debug::oops::nucleus_bug;
use crate::sys::{CpuId, ThreadId, TimerId};
use policy::{SchedClass, SchedParam};
use quota::QuotaSched;
use runqueue::RunQueue;
use tp::TpSched;

bitflags! {
    /// Flags locais do escalonador
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SchedStatus: u32 {
        /// Troca de contexto pendente
        const RESCHED = 1 << 0;
        /// Tick do host pendente de repasse ao hospedeiro
        const HTICK   = 1 << 1;
        /// Tick do host adiado (one-shot programado para o timer seguinte)
        const HDEFER  = 1 << 2;
        /// Dentro de `clock_tick`: não reprogramar o hardware
        const INTCK   = 1 << 3;
        /// Quantum RR expirou: a corrente volta ao fim do seu nível
        const ROTATE  = 1 << 4;
    }
}

pub struct Sched {
    pub cpu: CpuId,
    pub status: SchedStatus,
    pub curr: ThreadId,
    pub root: ThreadId,
    pub rt: RunQueue,
    pub weak: RunQueue,
    pub quota: QuotaSched,
    pub tp: TpSched,
    /// Timer do tick do host
    pub htimer: TimerId,
    /// Thread removida enquanto corrente; liberada após a troca
    pub zombie: Option<ThreadId>,
    pub switches: u64,
}

impl Sched {
    pub fn new(cpu: CpuId, root: ThreadId, htimer: TimerId, nr_partitions: usize) -> Self {
        Self {
            cpu,
            status: SchedStatus::empty(),
            curr: root,
            root,
            rt: RunQueue::new(),
            weak: RunQueue::new(),
            quota: QuotaSched::new(),
            tp: TpSched::new(nr_partitions),
            htimer,
            zombie: None,
            switches: 0,
        }
    }

    /// Insere na fila da classe. `head` recoloca uma thread preemptada à
    /// frente das iguais; `quota_hold` é o grupo que pode reter a thread.
    pub fn enqueue(&mut self, thread: ThreadId, param: &SchedParam, quota_hold: Option<u16>, head: bool) {
        match param.class {
            SchedClass::Rt => {
                if head {
                    self.rt.add_head(thread, param.prio)
                } else {
                    self.rt.add_tail(thread, param.prio)
                }
            }
            SchedClass::Weak => {
                if head {
                    self.weak.add_head(thread, param.prio)
                } else {
                    self.weak.add_tail(thread, param.prio)
                }
            }
            SchedClass::Quota => self.quota.enqueue(thread, param.prio, quota_hold, head),
            SchedClass::Tp => self.tp.enqueue(thread, param.partition, param.prio, head),
            SchedClass::Idle => nucleus_bug("(Sched) Thread idle não entra em fila:", thread.as_u32() as u64),
        }
    }

    /// Remove da fila da classe. A thread precisa estar lá.
    pub fn dequeue(&mut self, thread: ThreadId, param: &SchedParam) {
        let found = match param.class {
            SchedClass::Rt => self.rt.remove(thread, param.prio),
            SchedClass::Weak => self.weak.remove(thread, param.prio),
            SchedClass::Quota => self.quota.dequeue(thread, param.prio),
            SchedClass::Tp => self.tp.dequeue(thread, param.partition, param.prio),
            SchedClass::Idle => false,
        };
        if !found {
            nucleus_bug("(Sched) Thread ausente da fila de prontas:", thread.as_u32() as u64);
        }
    }

    /// Retira a próxima thread. Nunca falha: sem prontas, devolve a root.
    pub fn pick_next(&mut self, quota_hold: impl Fn(ThreadId) -> Option<u16>) -> ThreadId {
        for class in SchedClass::SCAN_ORDER {
            let next = match class {
                SchedClass::Rt => self.rt.pop(),
                SchedClass::Tp => self.tp.pick(),
                SchedClass::Quota => self.quota.pick(&quota_hold),
                SchedClass::Weak => self.weak.pop(),
                SchedClass::Idle => None,
            };
            if let Some(thread) = next {
                return thread;
            }
        }
        self.root
    }

    pub fn nr_ready(&self) -> usize {
        self.rt.len() + self.weak.len() + self.quota.len() + self.tp.len()
    }

    pub fn resched_pending(&self) -> bool {
        self.status.contains(SchedStatus::RESCHED)
    }
}
