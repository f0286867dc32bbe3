//! # Objeto de Sincronização (synch)
//!
//! Base de mutexes, semáforos, filas de mensagens e variáveis de condição
//! das personalidades. Dois sabores:
//!
//! - **Com dono** (`OWNER`): exclusão mútua. A posse vive numa palavra
//!   atômica (`FastLock`) e, com `PIP`, o dono herda a prioridade do
//!   waiter mais urgente.
//! - **Fila de espera**: sem dono; threads dormem até alguém sinalizar.
//!
//! ## Invariantes
//! - `CLAIMED` ligado se, e só se, o synch está na `claimq` do dono.
//! - Com `PRIO`, a pendq fica em ordem decrescente de prioridade
//!   ponderada, FIFO entre iguais.
//! - A cadeia de herança é percorrida até `max_pi_depth` elos.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use bitflags::bitflags;

use crate::sys::{ObjectName, SynchId, ThreadId};

mod fastlock;
mod ops;
mod pi;

pub use fastlock::{FastLock, LockWord};

bitflags! {
    /// Atributos (fixos) e estado do synch
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SynchFlags: u32 {
        /// Pendq por prioridade (senão FIFO)
        const PRIO    = 1 << 0;
        /// Herança de prioridade
        const PIP     = 1 << 1;
        /// Exclusão mútua com dono
        const OWNER   = 1 << 2;
        /// Na claimq do dono
        const CLAIMED = 1 << 8;
    }
}

impl SynchFlags {
    /// Bits que o chamador pode pedir
    pub const ATTRS: Self = Self::PRIO.union(Self::PIP).union(Self::OWNER);
}

/// Resultado de uma aquisição ou espera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Posse obtida sem esperar
    Immediate,
    /// A thread ficou bloqueada; o resultado sai de `wait_result`
    Pending,
    /// Posse concedida (ou sinal recebido) depois de esperar
    AfterWait,
}

/// Motivo de um flush da pendq
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Sinalização em massa (só filas de espera)
    Signaled,
    /// Espera quebrada (`Interrupted`)
    Broken,
    TimedOut,
    Destroyed,
}

pub struct SynchObject {
    pub(crate) id: SynchId,
    pub(crate) name: ObjectName,
    pub(crate) flags: SynchFlags,
    pub(crate) pendq: VecDeque<ThreadId>,
    pub(crate) fastlock: Option<Arc<FastLock>>,
}

impl SynchObject {
    pub(crate) fn new(id: SynchId, name: &str, flags: SynchFlags) -> Self {
        let fastlock = flags.contains(SynchFlags::OWNER).then(|| Arc::new(FastLock::new()));
        Self {
            id,
            name: ObjectName::new(name),
            flags,
            pendq: VecDeque::new(),
            fastlock,
        }
    }

    pub(crate) fn has_owner_semantics(&self) -> bool {
        self.flags.contains(SynchFlags::OWNER)
    }

    pub(crate) fn owner(&self) -> Option<ThreadId> {
        self.fastlock.as_ref().and_then(|fl| fl.load().owner())
    }
}

/// Referência entregue ao chamador: o handle mais a palavra rápida, que
/// pode ser usada sem o nklock.
#[derive(Debug, Clone)]
pub struct SynchRef {
    id: SynchId,
    fastlock: Option<Arc<FastLock>>,
}

impl SynchRef {
    pub fn id(&self) -> SynchId {
        self.id
    }

    /// Palavra de posse (só synchs com dono)
    pub fn fastlock(&self) -> Option<&FastLock> {
        self.fastlock.as_deref()
    }
}

/// Cópia pontual de um synch
#[derive(Debug, Clone, Copy)]
pub struct SynchSnapshot {
    pub id: SynchId,
    pub name: ObjectName,
    pub flags: SynchFlags,
    pub owner: Option<ThreadId>,
    pub nr_waiters: usize,
}
