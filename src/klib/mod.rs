//! Kernel Library (KLib).
//!
//! Utilitários agnósticos de hardware para uso interno do núcleo.

pub mod arena;
pub mod bitmap;
pub mod test_framework;

#[cfg(test)]
mod test;
