//! Arquivo: core/time/timerq.rs
//!
//! Propósito: Fila de timers por CPU, ordenada por vencimento.
//!
//! Detalhes de Implementação:
//! - `BTreeMap` com chave (data, prioridade invertida, sequência):
//!   datas crescentes; na mesma data, o timer de maior prioridade primeiro;
//!   empate total em ordem de chegada.
//! - A chave fica guardada no timer enquanto ele está na fila, para a
//!   remoção não precisar de busca.

use alloc::collections::BTreeMap;
use core::cmp::Reverse;

use crate::sys::{Ticks, TimerId};

/// Chave de ordenação de um timer enfileirado
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerKey {
    date: Ticks,
    prio: Reverse<i32>,
    seq: u64,
}

impl TimerKey {
    pub fn date(&self) -> Ticks {
        self.date
    }
}

pub struct TimerQueue {
    tree: BTreeMap<TimerKey, TimerId>,
    seq: u64,
}

impl TimerQueue {
    pub const fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn insert(&mut self, timer: TimerId, date: Ticks, prio: i32) -> TimerKey {
        let key = TimerKey {
            date,
            prio: Reverse(prio),
            seq: self.seq,
        };
        self.seq = self.seq.wrapping_add(1);
        self.tree.insert(key, timer);
        key
    }

    pub fn remove(&mut self, key: &TimerKey) -> Option<TimerId> {
        self.tree.remove(key)
    }

    /// Timer mais próximo do vencimento
    pub fn head(&self) -> Option<(Ticks, TimerId)> {
        self.tree
            .first_key_value()
            .map(|(key, &timer)| (key.date, timer))
    }

    /// Timer logo após a cabeça
    pub fn second(&self) -> Option<(Ticks, TimerId)> {
        self.tree
            .iter()
            .nth(1)
            .map(|(key, &timer)| (key.date, timer))
    }

    /// Timers em ordem de disparo
    pub fn iter(&self) -> impl Iterator<Item = (Ticks, TimerId)> + '_ {
        self.tree.iter().map(|(key, &timer)| (key.date, timer))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
