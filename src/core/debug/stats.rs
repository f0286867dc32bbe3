//! Arquivo: core/debug/stats.rs
//!
//! Propósito: Contadores estatísticos do núcleo.
//! Usados apenas para observabilidade: nenhuma decisão de escalonamento
//! lê estes valores.
//!
//! Detalhes de Implementação:
//! - Usa atômicos (AtomicU64) para permitir leitura sem o nklock.
//! - Contadores monotônicos crescentes.
use core::sync::atomic::{AtomicU64, Ordering};

pub struct NucleusStats {
    pub timer_fires: AtomicU64,
    pub schedules: AtomicU64,
    pub context_switches: AtomicU64,
    pub ipis: AtomicU64,
    pub fast_acquires: AtomicU64,
    pub slow_acquires: AtomicU64,
    pub threads_created: AtomicU64,
    pub threads_deleted: AtomicU64,
}

/// Cópia pontual dos contadores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub timer_fires: u64,
    pub schedules: u64,
    pub context_switches: u64,
    pub ipis: u64,
    pub fast_acquires: u64,
    pub slow_acquires: u64,
    pub threads_created: u64,
    pub threads_deleted: u64,
}

impl NucleusStats {
    pub const fn new() -> Self {
        Self {
            timer_fires: AtomicU64::new(0),
            schedules: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
            ipis: AtomicU64::new(0),
            fast_acquires: AtomicU64::new(0),
            slow_acquires: AtomicU64::new(0),
            threads_created: AtomicU64::new(0),
            threads_deleted: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_timer_fires(&self) {
        self.timer_fires.fetch_add(1, Ordering::Relaxed);
    }

    /// Passagens por `schedule()` com RESCHED pendente
    #[inline]
    pub fn inc_schedules(&self) {
        self.schedules.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_context_switches(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_ipis(&self) {
        self.ipis.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_fast_acquires(&self) {
        self.fast_acquires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_slow_acquires(&self) {
        self.slow_acquires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_threads_created(&self) {
        self.threads_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_threads_deleted(&self) {
        self.threads_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            timer_fires: self.timer_fires.load(Ordering::Relaxed),
            schedules: self.schedules.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            ipis: self.ipis.load(Ordering::Relaxed),
            fast_acquires: self.fast_acquires.load(Ordering::Relaxed),
            slow_acquires: self.slow_acquires.load(Ordering::Relaxed),
            threads_created: self.threads_created.load(Ordering::Relaxed),
            threads_deleted: self.threads_deleted.load(Ordering::Relaxed),
        }
    }

    /// Imprime estatísticas no log
    pub fn dump(&self) {
        let s = self.snapshot();
        crate::kinfo!("--- Estatísticas do Núcleo ---");
        crate::kinfo!("Disparos de timer: ", s.timer_fires);
        crate::kinfo!("Schedules:         ", s.schedules);
        crate::kinfo!("Trocas Contexto:   ", s.context_switches);
        crate::kinfo!("IPIs:              ", s.ipis);
        crate::kinfo!("Acquire rápido:    ", s.fast_acquires);
        crate::kinfo!("Acquire lento:     ", s.slow_acquires);
        crate::kinfo!("Threads criadas:   ", s.threads_created);
        crate::kinfo!("Threads removidas: ", s.threads_deleted);
        crate::kinfo!("------------------------------");
    }
}

impl Default for NucleusStats {
    fn default() -> Self {
        Self::new()
    }
}
