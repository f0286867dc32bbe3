//! Thread Control Block

use alloc::vec::Vec;

use super::accounting::Accounting;
use super::state::{ThreadInfo, ThreadState};
use crate::core::smp::CpuSet;
use crate::klib::arena::Handle;
use crate::sched::scheduler::policy::{SchedParam, SchedPolicy};
use crate::sys::{CpuId, ObjectName, SynchId, ThreadId, TimerId};

/// Atributos de criação
#[derive(Debug, Clone, Copy)]
pub struct ThreadAttr<'a> {
    pub name: &'a str,
    pub policy: SchedPolicy,
    /// Vazio = todas as CPUs online
    pub affinity: CpuSet,
}

impl<'a> ThreadAttr<'a> {
    pub fn new(name: &'a str, policy: SchedPolicy) -> Self {
        Self {
            name,
            policy,
            affinity: CpuSet::EMPTY,
        }
    }

    pub fn with_affinity(mut self, affinity: CpuSet) -> Self {
        self.affinity = affinity;
        self
    }
}

/// Thread Control Block
pub struct Thread {
    /// ID único
    pub id: ThreadId,
    /// Nome (debug)
    pub name: ObjectName,
    /// Estado atual
    pub state: ThreadState,
    /// Motivo do último despertar
    pub info: ThreadInfo,
    /// CPU dona
    pub cpu: CpuId,
    /// Destino de uma migração pendente (estado MIGRATE)
    pub migrate_to: Option<CpuId>,
    pub affinity: CpuSet,
    /// Política base
    pub policy: SchedPolicy,
    /// Prioridade base
    pub bparam: SchedParam,
    /// Prioridade corrente (após herança)
    pub cparam: SchedParam,
    /// Synch em que a thread espera
    pub wchan: Option<SynchId>,
    /// Synch que concedeu o último despertar
    pub wwake: Option<SynchId>,
    /// Synchs possuídos que têm waiters (herança ativa)
    pub claimq: Vec<SynchId>,
    /// Timer de timeout (atribuído logo após a alocação)
    pub rtimer: TimerId,
    /// Timer de liberação periódica
    pub ptimer: TimerId,
    /// Estatísticas de contabilidade
    pub accounting: Accounting,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        name: &str,
        cpu: CpuId,
        affinity: CpuSet,
        policy: SchedPolicy,
    ) -> Self {
        let param = SchedParam::from_policy(&policy);
        let mut state = ThreadState::DORMANT;
        if matches!(policy, SchedPolicy::RoundRobin { .. }) {
            state |= ThreadState::RRB;
        }
        Self {
            id,
            name: ObjectName::new(name),
            state,
            info: ThreadInfo::empty(),
            cpu,
            migrate_to: None,
            affinity,
            policy,
            bparam: param,
            cparam: param,
            wchan: None,
            wwake: None,
            claimq: Vec::new(),
            rtimer: TimerId(Handle::INVALID),
            ptimer: TimerId(Handle::INVALID),
            accounting: Accounting::new(),
        }
    }

    /// Thread root (idle) de uma CPU. Já nasce corrente.
    pub fn new_root(id: ThreadId, cpu: CpuId) -> Self {
        let mut root = Self::new(
            id,
            "ROOT",
            cpu,
            CpuSet::single(cpu),
            SchedPolicy::Weak { prio: 0 },
        );
        root.bparam = SchedParam::IDLE;
        root.cparam = SchedParam::IDLE;
        root.state = ThreadState::ROOT | ThreadState::RUNNING | ThreadState::STARTED;
        root
    }

    pub fn is_root(&self) -> bool {
        self.state.contains(ThreadState::ROOT)
    }

    /// Prioridade ponderada corrente
    pub fn weighted(&self) -> i32 {
        self.cparam.weighted()
    }

    pub fn is_boosted(&self) -> bool {
        self.state.contains(ThreadState::BOOST)
    }

    /// Grupo de quota que pode reter esta thread na CPU `cpu`.
    /// Threads com herança ativa nunca são retidas.
    pub fn quota_hold(&self, cpu: CpuId) -> Option<u16> {
        if self.is_boosted() {
            return None;
        }
        self.cparam
            .group
            .filter(|group| group.cpu == cpu)
            .map(|group| group.index)
    }
}
