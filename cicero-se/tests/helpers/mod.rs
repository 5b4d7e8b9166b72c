//! Test Helper Utilities
//!
//! Shared fixtures for the cicero-se integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod failing_store;

pub use db_utils::{
    count_rows, create_file_db, create_memory_db, hearing_spec, plenary_spec, save_protocol,
    TestDb,
};
pub use failing_store::FailingStore;
