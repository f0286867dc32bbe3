//! Threads do núcleo
//!
//! Estrutura da thread, estados, contabilidade de CPU, ciclo de vida e
//! esperas temporizadas.

pub mod accounting;
pub mod entity;
pub mod lifecycle;
pub mod state;
pub mod timing;

pub use entity::ThreadAttr;
pub use state::{ThreadInfo, ThreadState};
pub use timing::PeriodWait;
