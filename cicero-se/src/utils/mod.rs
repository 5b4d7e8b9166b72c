//! Utility modules for cicero-se

pub mod db_retry;

pub use db_retry::retry_on_lock;
