//! Tempo e Timers
//!
//! Relógio (ticks crus, nanossegundos, wallclock), filas de timers por CPU
//! e o tratador do tick de hardware.

pub mod clock;
pub mod tick;
pub mod timer;
pub mod timerq;

#[cfg(test)]
mod test;

pub use clock::Clock;
pub use timer::{Timeout, TimerCallback, TimerEvent, TimerMode, TimerSnapshot, TimerStatus};
