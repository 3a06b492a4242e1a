//! # engine — the pure-ish heart of the pipeline
//!
//! `stop_loss` and `formatter` are pure and never suspend; `enricher` pulls
//! from the Quote Cache and is the only async piece here.

pub mod enricher;
pub mod formatter;
pub mod stop_loss;
