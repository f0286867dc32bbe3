//! Arquivo: core/time/clock.rs
//!
//! Propósito: Relógio do núcleo.
//! Converte o contador cru de hardware de/para nanossegundos, mantém o
//! deslocamento do relógio de parede (wallclock) e define a "gravidade":
//! a antecedência, em ticks, com que um timer é considerado vencido.
//!
//! Detalhes de Implementação:
//! - Conversões usam multiplicação + shift com um par (scale, shift)
//!   pré-calculado no boot. Nenhuma divisão em tempo de execução.
//! - Intermediários em u128; `scale < 2^63` garante que o produto cabe.
//! - `read_raw()` nunca retrocede, mesmo que a fonte do host oscile.

use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::core::config::ClockConfig;
use crate::hal::HostPort;
use crate::sys::{Nanos, SysError, SysResult, Ticks};

pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Fator de conversão em ponto fixo: `v * mul / div ~= (v * scale) >> shift`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleShift {
    scale: u64,
    shift: u32,
}

impl ScaleShift {
    /// Calcula o maior `shift` que mantém `scale < 2^63`.
    pub fn new(mul: u64, div: u64) -> Self {
        let mut shift = 63u32;
        loop {
            let scale = ((mul as u128) << shift) / div as u128;
            if scale < (1u128 << 63) || shift == 0 {
                return Self {
                    scale: scale as u64,
                    shift,
                };
            }
            shift -= 1;
        }
    }

    /// Satura em `u64::MAX` quando o resultado não cabe.
    #[inline]
    pub fn apply(&self, value: u64) -> u64 {
        let wide = (value as u128 * self.scale as u128) >> self.shift;
        wide.min(u64::MAX as u128) as u64
    }

    /// Igual a `apply`, arredondando para o inteiro mais próximo.
    #[inline]
    pub fn apply_rounded(&self, value: u64) -> u64 {
        if self.shift == 0 {
            return self.apply(value);
        }
        let half = (value as u128 * self.scale as u128) >> (self.shift - 1);
        ((half + 1) / 2).min(u64::MAX as u128) as u64
    }

    pub fn scale(&self) -> u64 {
        self.scale
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }
}

pub struct Clock {
    name: &'static str,
    freq: u64,
    to_ns: ScaleShift,
    to_ticks: ScaleShift,
    /// Antecedência de disparo, em ticks
    gravity: AtomicU64,
    /// realtime = monotônico + offset (ns)
    wallclock_offset: AtomicI64,
    last_raw: AtomicU64,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> SysResult<Self> {
        if config.freq_hz == 0 {
            crate::kerror!("(Clock) Frequência zero");
            return Err(SysError::InvalidArgument);
        }

        let clock = Self {
            name: config.name,
            freq: config.freq_hz,
            to_ns: ScaleShift::new(NSEC_PER_SEC, config.freq_hz),
            to_ticks: ScaleShift::new(config.freq_hz, NSEC_PER_SEC),
            gravity: AtomicU64::new(0),
            wallclock_offset: AtomicI64::new(0),
            last_raw: AtomicU64::new(0),
        };
        clock.set_gravity_ns(config.gravity_ns);

        crate::kinfo!("(Clock) Frequência Hz=", config.freq_hz);
        crate::kdebug!("(Clock) Scale ns=", clock.to_ns.scale);
        crate::kdebug!("(Clock) Shift ns=", clock.to_ns.shift);
        Ok(clock)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn freq(&self) -> u64 {
        self.freq
    }

    /// Contador cru, monotônico.
    pub fn read_raw(&self, host: &dyn HostPort) -> Ticks {
        let raw = host.read_raw();
        let prev = self.last_raw.fetch_max(raw, Ordering::AcqRel);
        prev.max(raw)
    }

    pub fn read_monotonic(&self, host: &dyn HostPort) -> Nanos {
        self.ticks_to_ns(self.read_raw(host))
    }

    /// Tempo de parede em ns desde a Epoch.
    pub fn read_realtime(&self, host: &dyn HostPort) -> Nanos {
        let mono = self.read_monotonic(host);
        mono.saturating_add_signed(self.wallclock_offset())
    }

    #[inline]
    pub fn ticks_to_ns(&self, ticks: Ticks) -> Nanos {
        self.to_ns.apply(ticks)
    }

    /// Variante arredondada, para relatórios
    #[inline]
    pub fn ticks_to_ns_rounded(&self, ticks: Ticks) -> Nanos {
        self.to_ns.apply_rounded(ticks)
    }

    #[inline]
    pub fn ns_to_ticks(&self, ns: Nanos) -> Ticks {
        self.to_ticks.apply(ns)
    }

    /// Converte uma data de parede (ns) em data monotônica (ns).
    /// Datas anteriores ao boot viram 0.
    pub fn realtime_to_monotonic(&self, realtime_ns: Nanos) -> Nanos {
        realtime_ns.saturating_add_signed(-self.wallclock_offset())
    }

    pub fn gravity(&self) -> Ticks {
        self.gravity.load(Ordering::Relaxed)
    }

    pub fn set_gravity_ns(&self, ns: Nanos) {
        self.gravity.store(self.ns_to_ticks(ns), Ordering::Relaxed);
    }

    pub fn wallclock_offset(&self) -> i64 {
        self.wallclock_offset.load(Ordering::Acquire)
    }

    /// Só chamado sob o nklock, junto com a reordenação dos timers REALTIME.
    pub(crate) fn shift_wallclock(&self, delta_ns: i64) {
        self.wallclock_offset.fetch_add(delta_ns, Ordering::AcqRel);
    }
}
