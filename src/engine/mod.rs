//! Core engine: the discover, evaluate and execute pass.

pub mod discovery;
pub mod executor;
pub mod ledger;
pub mod reporter;
pub mod scanner;
