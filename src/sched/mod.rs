//! # Multitasking & Scheduler Subsystem
//!
//! Escalonamento de tempo real por CPU. Cada CPU tem sua própria fila por
//! classe e sua thread root; o nklock protege todas.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Classes:** RT (FIFO/RR), TP (particionamento temporal), Quota
//!   (orçamento por grupo) e Weak, varridas nesta ordem.
//! - **Threads:** ciclo de vida, bloqueio e despertar, migração e
//!   threads periódicas.
//! - **Troca de contexto:** decidida aqui, executada pelo hospedeiro via
//!   `HostPort::switch_to`.
//!
//! ## 🏗️ Arquitetura
//! 1. `scheduler`: estruturas por CPU (filas, quota, TP).
//! 2. `core`: o algoritmo de `schedule()` e a administração das classes.
//! 3. `task`: a thread e as operações sobre ela.

pub mod config;
pub mod core;
pub mod scheduler;
pub mod task;

#[cfg(test)]
mod test;

pub use scheduler::policy::{SchedClass, SchedParam, SchedPolicy};
pub use scheduler::tp::TpWindow;
pub use scheduler::SchedStatus;
