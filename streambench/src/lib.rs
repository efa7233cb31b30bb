#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

pub mod config;
pub mod coordinator;
pub mod reader;
pub mod sensor;
pub mod stats;
pub mod stream;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod test;
