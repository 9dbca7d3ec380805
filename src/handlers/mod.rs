// src/handlers/mod.rs

pub mod attempt;
pub mod session;
pub mod test_series;
