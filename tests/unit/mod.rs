//! Integration tests exercising the crate only through its public API
//! (`apex_clob::prelude`), as opposed to the `#[cfg(test)]` unit tests
//! living alongside each module.

mod config_tests;
mod engine_flow_tests;
mod ledger_tests;
