//! Fila de threads prontas (multi-nível)
//!
//! Um nível por prioridade, cada um uma FIFO, mais o bitmap de dois níveis
//! de `klib::bitmap`. Pick, inserção e remoção da cabeça não dependem do
//! número de threads; remover do meio de um nível percorre só esse nível.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::core::debug::oops::nucleus_bug;
use crate::klib::bitmap::{PrioMap, PRIO_LEVELS};
use crate::sys::ThreadId;

/// Fila de execução
pub struct RunQueue {
    map: PrioMap,
    levels: Vec<VecDeque<ThreadId>>,
    elems: usize,
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            map: PrioMap::new(),
            levels: (0..PRIO_LEVELS).map(|_| VecDeque::new()).collect(),
            elems: 0,
        }
    }

    fn level(prio: i32) -> usize {
        if prio < 0 || prio as usize >= PRIO_LEVELS {
            nucleus_bug("(RunQueue) Prioridade fora da faixa:", prio as u64);
        }
        prio as usize
    }

    /// Adiciona ao fim do nível (FIFO entre iguais)
    pub fn add_tail(&mut self, thread: ThreadId, prio: i32) {
        let level = Self::level(prio);
        self.levels[level].push_back(thread);
        self.map.set(level);
        self.elems += 1;
    }

    /// Adiciona à frente do nível (thread preemptada volta primeiro)
    pub fn add_head(&mut self, thread: ThreadId, prio: i32) {
        let level = Self::level(prio);
        self.levels[level].push_front(thread);
        self.map.set(level);
        self.elems += 1;
    }

    /// Remove `thread` do nível `prio`. Retorna false se ela não estava lá.
    pub fn remove(&mut self, thread: ThreadId, prio: i32) -> bool {
        let level = Self::level(prio);
        let queue = &mut self.levels[level];
        let Some(pos) = queue.iter().position(|&t| t == thread) else {
            return false;
        };
        queue.remove(pos);
        if queue.is_empty() {
            self.map.clear(level);
        }
        self.elems -= 1;
        true
    }

    /// Remove próxima thread (maior prioridade, mais antiga)
    pub fn pop(&mut self) -> Option<ThreadId> {
        let level = self.map.highest()?;
        let queue = &mut self.levels[level];
        let thread = queue.pop_front();
        if queue.is_empty() {
            self.map.clear(level);
        }
        if thread.is_some() {
            self.elems -= 1;
        }
        thread
    }

    /// Prioridade da cabeça
    pub fn highest_prio(&self) -> Option<i32> {
        self.map.highest().map(|level| level as i32)
    }

    /// Número de threads na fila
    pub fn len(&self) -> usize {
        self.elems
    }

    /// Verifica se está vazia
    pub fn is_empty(&self) -> bool {
        self.elems == 0
    }

    /// Threads em ordem de pick
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.levels.iter().rev().flat_map(|queue| queue.iter().copied())
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}
