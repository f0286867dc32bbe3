//! Trait do kernel hospedeiro
//!
//! O hospedeiro deve:
//! - chamar `Nucleus::clock_tick()` em toda interrupção do timer do núcleo;
//! - chamar `Nucleus::schedule()` ao receber `IpiVector::Reschedule` ou ao
//!   retornar de interrupção com troca pendente;
//! - chamar `Nucleus::timer_ipi()` ao receber `IpiVector::TimerShot`.

use crate::core::smp::{IpiTarget, IpiVector};
use crate::sys::{CpuId, ThreadId, Ticks};

/// Serviços que o kernel hospedeiro fornece ao núcleo.
pub trait HostPort: Send + Sync {
    /// Retorna ID da CPU atual
    fn current_cpu(&self) -> CpuId;

    /// Contador cru do relógio de hardware
    fn read_raw(&self) -> Ticks;

    /// Programa o one-shot de `cpu` para disparar em `delay` ticks.
    fn program_shot(&self, cpu: CpuId, delay: Ticks);

    /// Envia uma IPI
    fn send_ipi(&self, target: IpiTarget, vector: IpiVector);

    /// Troca de contexto de `prev` para `next` em `cpu`.
    fn switch_to(&self, cpu: CpuId, prev: ThreadId, next: ThreadId);

    /// Desabilita interrupções locais e retorna se estavam habilitadas.
    fn irq_save(&self) -> bool {
        false
    }

    /// Restaura o estado salvo por `irq_save`.
    fn irq_restore(&self, _was_enabled: bool) {}
}
