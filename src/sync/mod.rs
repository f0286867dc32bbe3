//! # Synchronization Primitives
//!
//! Sincronização do núcleo em dois níveis.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! Spinlock   → nklock: protege todo o estado do núcleo (não dorme)
//! Synch      → exclusão mútua com herança de prioridade e filas de espera
//!              para as threads de tempo real (dorme)
//! ```
//!
//! ## Regras
//!
//! - **Spinlock**: uma única instância, adquirida por toda a API pública.
//! - **Synch**: aquisição e liberação sem contenção são CAS puros, fora do
//!   nklock.
//! - **Ordem de Lock**: não há outra; nada é adquirido dentro do nklock.

// =============================================================================
// PRIMITIVAS
// =============================================================================

/// Spinlock com máscara de interrupções
pub mod spinlock;

/// Objeto de sincronização (mutex com PI, fila de espera)
pub mod synch;

#[cfg(test)]
mod test;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use spinlock::{Spinlock, SpinlockGuard};
pub use synch::{FlushReason, Grant, SynchFlags, SynchRef, SynchSnapshot};
