//! Arquivo: core/smp/ipi.rs
//!
//! Propósito: Interrupções Inter-Processador (IPIs) usadas pelo núcleo.
//! O envio em si pertence ao kernel hospedeiro (`HostPort::send_ipi`);
//! aqui ficam apenas os alvos e os vetores.
//!
//! - `Reschedule`: a CPU alvo deve chamar `Nucleus::schedule()`.
//! - `TimerShot`: a CPU alvo deve chamar `Nucleus::timer_ipi()` para
//!   reprogramar o one-shot local com a nova cabeça da fila.

use crate::sys::CpuId;

/// Destino da IPI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpiTarget {
    /// Uma CPU específica
    Single(CpuId),
    /// Todas as CPUs (Broadcast)
    All,
    /// Todas exceto a atual
    AllButSelf,
}

/// Vetores de IPI do núcleo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IpiVector {
    /// Reschedule: Força o escalonador a rodar
    Reschedule = 0xFC,
    /// Timer: Reprograma o one-shot a partir da fila local
    TimerShot = 0xFB,
}
