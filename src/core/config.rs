//! Configuração do núcleo (boot)
//!
//! Tudo aqui é lido uma vez em `Nucleus::new`. A política de adiamento do
//! tick do host é configurável porque depende de latências medidas por
//! arquitetura.

use crate::core::smp::MAX_CPUS;
use crate::sched::config::{
    DEFAULT_PI_DEPTH, DEFAULT_QUANTUM_NS, DEFAULT_QUOTA_PERIOD_NS, MAX_TP_PARTITIONS,
};
use crate::core::time::timer::TIMER_LOPRIO;
use crate::sys::{Nanos, SysError, SysResult};

/// Relógio do núcleo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub name: &'static str,
    pub freq_hz: u64,
    /// Antecedência de disparo dos timers
    pub gravity_ns: Nanos,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            name: "coreclk",
            freq_hz: 1_000_000_000,
            gravity_ns: 0,
        }
    }
}

/// Política das filas de timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPolicy {
    /// Pular o timer do tick do host na cabeça da fila quando há troca
    /// pendente ou uma thread RT executando.
    pub defer_host_tick: bool,
    /// Prioridade do timer do tick do host entre timers de mesma data
    pub host_tick_prio: i32,
}

impl Default for TimerPolicy {
    fn default() -> Self {
        Self {
            defer_host_tick: true,
            host_tick_prio: TIMER_LOPRIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NucleusConfig {
    pub nr_cpus: usize,
    pub clock: ClockConfig,
    pub timer: TimerPolicy,
    /// Quantum padrão de `SchedPolicy::RoundRobin` com quantum 0
    pub rr_quantum_ns: Nanos,
    pub quota_period_ns: Nanos,
    pub tp_partitions: usize,
    pub max_pi_depth: usize,
}

impl Default for NucleusConfig {
    fn default() -> Self {
        Self {
            nr_cpus: 1,
            clock: ClockConfig::default(),
            timer: TimerPolicy::default(),
            rr_quantum_ns: DEFAULT_QUANTUM_NS,
            quota_period_ns: DEFAULT_QUOTA_PERIOD_NS,
            tp_partitions: 4,
            max_pi_depth: DEFAULT_PI_DEPTH,
        }
    }
}

impl NucleusConfig {
    pub fn with_cpus(mut self, nr_cpus: usize) -> Self {
        self.nr_cpus = nr_cpus;
        self
    }

    pub fn with_clock_freq(mut self, freq_hz: u64) -> Self {
        self.clock.freq_hz = freq_hz;
        self
    }

    pub fn with_gravity(mut self, gravity_ns: Nanos) -> Self {
        self.clock.gravity_ns = gravity_ns;
        self
    }

    pub fn with_host_tick_deferral(mut self, enabled: bool) -> Self {
        self.timer.defer_host_tick = enabled;
        self
    }

    pub fn with_rr_quantum(mut self, quantum_ns: Nanos) -> Self {
        self.rr_quantum_ns = quantum_ns;
        self
    }

    pub fn with_quota_period(mut self, period_ns: Nanos) -> Self {
        self.quota_period_ns = period_ns;
        self
    }

    pub fn with_tp_partitions(mut self, partitions: usize) -> Self {
        self.tp_partitions = partitions;
        self
    }

    pub fn validate(&self) -> SysResult<()> {
        if self.nr_cpus == 0 || self.nr_cpus > MAX_CPUS {
            crate::kerror!("(Config) nr_cpus inválido: ", self.nr_cpus);
            return Err(SysError::InvalidArgument);
        }
        if self.clock.freq_hz == 0 {
            crate::kerror!("(Config) Frequência de relógio zero");
            return Err(SysError::InvalidArgument);
        }
        if self.tp_partitions > MAX_TP_PARTITIONS {
            crate::kerror!("(Config) Partições TP demais: ", self.tp_partitions);
            return Err(SysError::InvalidArgument);
        }
        if self.rr_quantum_ns == 0 || self.quota_period_ns == 0 || self.max_pi_depth == 0 {
            crate::kerror!("(Config) Quantum, período de quota e profundidade PI devem ser > 0");
            return Err(SysError::InvalidArgument);
        }
        Ok(())
    }
}
