//! Contabilidade de Recursos (Accounting)
//!
//! Rastreia o consumo de CPU de cada thread e o quantum de round-robin.
//! Todos os tempos estão em ticks crus do relógio do núcleo.

use crate::sys::Ticks;

/// Estatísticas de uso de recursos de uma thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Accounting {
    /// Tempo total de CPU consumido
    pub total_cpu_time: Ticks,

    /// Timestamp da última vez que a thread começou a executar.
    pub last_start_time: Ticks,

    /// Trocas de contexto em que a thread ganhou a CPU
    pub switches: u64,

    /// Vezes que a thread bloqueou (pendq, delay ou suspensão)
    pub waits: u64,

    /// Quantum de round-robin (0 = sem RR)
    pub quantum: Ticks,

    /// Data em que o quantum corrente expira
    pub quantum_deadline: Ticks,
}

impl Accounting {
    /// Cria uma nova estrutura de contabilidade zerada
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra o início da execução (chamado quando a thread ganha a CPU)
    pub fn start_exec(&mut self, now: Ticks) {
        self.last_start_time = now;
        self.switches += 1;
    }

    /// Reinicia o quantum da thread
    pub fn reset_quantum(&mut self, now: Ticks) {
        self.quantum_deadline = now.saturating_add(self.quantum);
    }

    /// Cobra o tempo executado desde o último ponto de contabilidade.
    /// Retorna o delta cobrado.
    pub fn charge(&mut self, now: Ticks) -> Ticks {
        let delta = now.saturating_sub(self.last_start_time);
        self.total_cpu_time += delta;
        self.last_start_time = now;
        delta
    }

    pub fn quantum_expired(&self, now: Ticks) -> bool {
        self.quantum != 0 && now >= self.quantum_deadline
    }
}
