//! Plataformas do HAL

pub mod sim;
