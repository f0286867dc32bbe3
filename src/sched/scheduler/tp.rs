//! Classe TP: particionamento temporal
//!
//! Um quadro de `period` ticks dividido em janelas. Cada janela pertence a
//! uma partição (ou a nenhuma). Só as threads TP da partição ativa podem
//! ser escolhidas; as demais esperam sua janela na própria fila.

use alloc::vec::Vec;

use super::runqueue::RunQueue;
use crate::sys::{Nanos, ThreadId, Ticks, TimerId};

/// Janela do quadro TP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpWindow {
    /// Início relativo ao começo do quadro
    pub offset: Nanos,
    /// Partição ativa na janela; None = janela ociosa
    pub partition: Option<usize>,
}

pub struct TpSched {
    partitions: Vec<RunQueue>,
    /// (offset em ticks, partição)
    windows: Vec<(Ticks, Option<usize>)>,
    period: Ticks,
    active: Option<usize>,
    window: usize,
    frame_start: Ticks,
    running: bool,
    /// Timer de troca de janela (criado no primeiro `start_tp`)
    pub(crate) timer: Option<TimerId>,
}

impl TpSched {
    pub fn new(nr_partitions: usize) -> Self {
        Self {
            partitions: (0..nr_partitions).map(|_| RunQueue::new()).collect(),
            windows: Vec::new(),
            period: 0,
            active: None,
            window: 0,
            frame_start: 0,
            running: false,
            timer: None,
        }
    }

    pub fn nr_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn enqueue(&mut self, thread: ThreadId, partition: usize, prio: i32, head: bool) {
        let Some(queue) = self.partitions.get_mut(partition) else {
            crate::kerror!("(TP) Partição inexistente: ", partition);
            return;
        };
        if head {
            queue.add_head(thread, prio);
        } else {
            queue.add_tail(thread, prio);
        }
    }

    pub fn dequeue(&mut self, thread: ThreadId, partition: usize, prio: i32) -> bool {
        self.partitions
            .get_mut(partition)
            .map_or(false, |queue| queue.remove(thread, prio))
    }

    pub fn pick(&mut self) -> Option<ThreadId> {
        let partition = self.active?;
        self.partitions.get_mut(partition)?.pop()
    }

    /// Instala um quadro já validado (offsets crescentes, primeiro em 0).
    pub fn set_schedule(&mut self, windows: Vec<(Ticks, Option<usize>)>, period: Ticks) {
        self.windows = windows;
        self.period = period;
    }

    pub fn has_schedule(&self) -> bool {
        !self.windows.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_partition(&self) -> Option<usize> {
        self.active
    }

    /// Inicia o quadro em `now`. Retorna a data da próxima troca.
    pub fn start(&mut self, now: Ticks) -> Option<Ticks> {
        let &(_, partition) = self.windows.first()?;
        self.window = 0;
        self.frame_start = now;
        self.active = partition;
        self.running = true;
        Some(self.next_boundary())
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.active = None;
    }

    /// Passa para a janela seguinte. Retorna a data da próxima troca.
    pub fn advance(&mut self) -> Ticks {
        self.window += 1;
        if self.window >= self.windows.len() {
            self.window = 0;
            self.frame_start += self.period;
        }
        self.active = self.windows.get(self.window).and_then(|&(_, p)| p);
        self.next_boundary()
    }

    fn next_boundary(&self) -> Ticks {
        match self.windows.get(self.window + 1) {
            Some(&(offset, _)) => self.frame_start + offset,
            None => self.frame_start + self.period,
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(RunQueue::len).sum()
    }
}
