//! Spinlock global do núcleo

mod spinlock;

pub use spinlock::{Spinlock, SpinlockGuard};
