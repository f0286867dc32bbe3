//! Classe Quota: orçamento de CPU por grupo
//!
//! Cada grupo recebe `quota` ticks por período, acumuláveis até `quota_peak`.
//! O tempo de execução das threads do grupo é cobrado na troca de contexto
//! e no tick do host. Um grupo esgotado tem suas threads retiradas da fila
//! no momento do pick e guardadas em `expired` até a próxima reposição.
//! Threads com prioridade herdada (BOOST) não são retidas.

use alloc::vec::Vec;

use super::runqueue::RunQueue;
use crate::sys::{STicks, ThreadId, Ticks, TimerId};

pub struct QuotaGroup {
    /// Orçamento por período
    pub quota: Ticks,
    /// Teto do orçamento acumulado
    pub quota_peak: Ticks,
    /// Orçamento restante (negativo quando estourou)
    pub run_budget: STicks,
    /// Threads cuja política base aponta para este grupo
    pub nr_threads: usize,
    pub exhausted: bool,
    expired: Vec<(ThreadId, i32)>,
}

impl QuotaGroup {
    pub fn nr_expired(&self) -> usize {
        self.expired.len()
    }
}

pub struct QuotaSched {
    runnable: RunQueue,
    groups: Vec<Option<QuotaGroup>>,
    /// Timer periódico de reposição (criado com o primeiro grupo)
    pub(crate) timer: Option<TimerId>,
}

impl QuotaSched {
    pub fn new() -> Self {
        Self {
            runnable: RunQueue::new(),
            groups: Vec::new(),
            timer: None,
        }
    }

    pub fn create_group(&mut self, quota: Ticks, quota_peak: Ticks, max: usize) -> Option<u16> {
        let group = QuotaGroup {
            quota,
            quota_peak,
            run_budget: quota as STicks,
            nr_threads: 0,
            exhausted: false,
            expired: Vec::new(),
        };
        if let Some(index) = self.groups.iter().position(Option::is_none) {
            self.groups[index] = Some(group);
            return Some(index as u16);
        }
        if self.groups.len() >= max {
            return None;
        }
        self.groups.push(Some(group));
        Some((self.groups.len() - 1) as u16)
    }

    pub fn group(&self, index: u16) -> Option<&QuotaGroup> {
        self.groups.get(index as usize)?.as_ref()
    }

    pub fn group_mut(&mut self, index: u16) -> Option<&mut QuotaGroup> {
        self.groups.get_mut(index as usize)?.as_mut()
    }

    pub fn remove_group(&mut self, index: u16) -> Option<QuotaGroup> {
        self.groups.get_mut(index as usize)?.take()
    }

    pub fn nr_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.is_some()).count()
    }

    /// Enfileira; uma thread de grupo esgotado vai direto para `expired`.
    /// `group` é None para threads isentas de retenção.
    pub fn enqueue(&mut self, thread: ThreadId, prio: i32, group: Option<u16>, head: bool) {
        if let Some(g) = group.and_then(|g| self.group_mut(g)) {
            if g.exhausted {
                g.expired.push((thread, prio));
                return;
            }
        }
        if head {
            self.runnable.add_head(thread, prio);
        } else {
            self.runnable.add_tail(thread, prio);
        }
    }

    pub fn dequeue(&mut self, thread: ThreadId, prio: i32) -> bool {
        if self.runnable.remove(thread, prio) {
            return true;
        }
        for group in self.groups.iter_mut().flatten() {
            if let Some(pos) = group.expired.iter().position(|&(t, _)| t == thread) {
                group.expired.remove(pos);
                return true;
            }
        }
        false
    }

    /// Próxima thread elegível. `group_of` devolve o grupo que retém a
    /// thread, ou None se ela é isenta.
    pub fn pick(&mut self, group_of: impl Fn(ThreadId) -> Option<u16>) -> Option<ThreadId> {
        loop {
            let prio = self.runnable.highest_prio()?;
            let thread = self.runnable.pop()?;
            match group_of(thread).and_then(|g| self.group_mut(g)) {
                Some(group) if group.exhausted => group.expired.push((thread, prio)),
                _ => return Some(thread),
            }
        }
    }

    /// Cobra `delta` do grupo. Retorna true se o grupo acabou de esgotar.
    pub fn charge(&mut self, index: u16, delta: Ticks) -> bool {
        let Some(group) = self.group_mut(index) else {
            return false;
        };
        group.run_budget -= delta as STicks;
        if group.run_budget <= 0 && !group.exhausted {
            group.exhausted = true;
            return true;
        }
        false
    }

    /// Repõe todos os grupos. Retorna true se alguma thread voltou à fila.
    pub fn replenish(&mut self) -> bool {
        let mut requeued = false;
        for group in self.groups.iter_mut().flatten() {
            let budget = group.run_budget + group.quota as STicks;
            group.run_budget = budget.min(group.quota_peak as STicks);
            if group.exhausted && group.run_budget > 0 {
                group.exhausted = false;
                for (thread, prio) in group.expired.drain(..) {
                    self.runnable.add_tail(thread, prio);
                    requeued = true;
                }
            }
        }
        requeued
    }

    pub fn len(&self) -> usize {
        self.runnable.len()
            + self
                .groups
                .iter()
                .flatten()
                .map(|g| g.expired.len())
                .sum::<usize>()
    }
}

impl Default for QuotaSched {
    fn default() -> Self {
        Self::new()
    }
}
