//! Classes e políticas de escalonamento
//!
//! O conjunto de classes é fechado: `SchedClass` é um enum resolvido por
//! `match`, sem tabelas de funções. Cada classe soma um peso à prioridade
//! da thread; a prioridade ponderada resultante compara threads de classes
//! diferentes sem casos especiais.

use crate::sched::config::{
    CLASS_WEIGHT_FACTOR, PRIORITY_IDLE, PRIORITY_MAX, PRIORITY_MIN, WEAK_PRIORITY_MAX,
};
use crate::sys::{Nanos, QuotaGroupId};

/// Classes de escalonamento, da mais leve para a mais pesada
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchedClass {
    /// Apenas a thread root
    Idle,
    /// Threads RT rebaixadas (abaixo de toda classe RT)
    Weak,
    /// Orçamento de CPU por grupo
    Quota,
    /// Particionamento temporal
    Tp,
    /// FIFO / round-robin
    Rt,
}

impl SchedClass {
    /// Ordem de varredura no pick (peso decrescente)
    pub const SCAN_ORDER: [SchedClass; 4] = [Self::Rt, Self::Tp, Self::Quota, Self::Weak];

    pub const fn weight(self) -> i32 {
        let rank = match self {
            Self::Idle => 0,
            Self::Weak => 1,
            Self::Quota => 2,
            Self::Tp => 3,
            Self::Rt => 4,
        };
        rank * CLASS_WEIGHT_FACTOR
    }

    /// Faixa válida de prioridades (inclusiva)
    pub const fn prio_range(self) -> (i32, i32) {
        match self {
            Self::Idle => (PRIORITY_IDLE, PRIORITY_IDLE),
            Self::Weak => (PRIORITY_MIN, WEAK_PRIORITY_MAX),
            Self::Quota | Self::Tp | Self::Rt => (PRIORITY_MIN, PRIORITY_MAX),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Weak => "weak",
            Self::Quota => "quota",
            Self::Tp => "tp",
            Self::Rt => "rt",
        }
    }
}

/// Política pedida por quem cria ou reconfigura a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// First-In First-Out - Realtime
    Fifo { prio: i32 },
    /// Round Robin; quantum 0 usa o padrão da configuração
    RoundRobin { prio: i32, quantum: Nanos },
    Weak { prio: i32 },
    Quota { group: QuotaGroupId, prio: i32 },
    Tp { partition: usize, prio: i32 },
}

impl SchedPolicy {
    pub const fn class(&self) -> SchedClass {
        match self {
            Self::Fifo { .. } | Self::RoundRobin { .. } => SchedClass::Rt,
            Self::Weak { .. } => SchedClass::Weak,
            Self::Quota { .. } => SchedClass::Quota,
            Self::Tp { .. } => SchedClass::Tp,
        }
    }

    pub const fn prio(&self) -> i32 {
        match *self {
            Self::Fifo { prio }
            | Self::RoundRobin { prio, .. }
            | Self::Weak { prio }
            | Self::Quota { prio, .. }
            | Self::Tp { prio, .. } => prio,
        }
    }

    pub fn prio_in_range(&self) -> bool {
        let (min, max) = self.class().prio_range();
        (min..=max).contains(&self.prio())
    }
}

/// Parâmetros efetivos de escalonamento.
///
/// A herança de prioridade copia o `SchedParam` inteiro do waiter mais
/// prioritário, inclusive partição e grupo, para que o dono seja enfileirado
/// na mesma fila que o waiter usaria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedParam {
    pub class: SchedClass,
    pub prio: i32,
    pub partition: usize,
    pub group: Option<QuotaGroupId>,
}

impl SchedParam {
    pub const IDLE: Self = Self {
        class: SchedClass::Idle,
        prio: PRIORITY_IDLE,
        partition: 0,
        group: None,
    };

    pub fn from_policy(policy: &SchedPolicy) -> Self {
        let (partition, group) = match *policy {
            SchedPolicy::Tp { partition, .. } => (partition, None),
            SchedPolicy::Quota { group, .. } => (0, Some(group)),
            _ => (0, None),
        };
        Self {
            class: policy.class(),
            prio: policy.prio(),
            partition,
            group,
        }
    }

    /// Prioridade ponderada: peso da classe + prioridade
    pub const fn weighted(&self) -> i32 {
        self.class.weight() + self.prio
    }
}
