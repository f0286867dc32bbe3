//! Nucleo: núcleo de tempo real do Redstone OS.
//!
//! Ponto central de exportação dos módulos.
//!
//! Roda sob um kernel hospedeiro (dual-kernel): o hospedeiro entrega o
//! relógio, as interrupções e a troca de contexto através de `HostPort`;
//! o núcleo decide quem roda, quando cada timer dispara e quem possui cada
//! objeto de sincronização.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// --- Fronteira com o hospedeiro ---
pub mod hal; // HostPort, host simulado

// --- Módulos Centrais ---
pub mod core; // Contexto, relógio, timers, SMP, logging
pub mod klib; // Arena, bitmaps, framework de testes
pub mod sys; // Tipos e códigos de status

// --- Subsistemas ---
pub mod sched; // Escalonador e threads
pub mod sync; // nklock e synchs

pub use crate::core::config::{ClockConfig, NucleusConfig, TimerPolicy};
pub use crate::core::nucleus::{Nucleus, SchedSnapshot, ThreadSnapshot};
pub use crate::core::time::{Timeout, TimerMode};
pub use crate::sys::{SysError, SysResult};
