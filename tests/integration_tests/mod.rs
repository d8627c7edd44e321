//! Integration tests module
//!
//! End-to-end tests for the nuri publishing pipeline:
//! - Draft → review → approved flow with its audit trail
//! - Scheduling invariants, including concurrent schedule/cancel
//! - Dispatch isolation, retries and job reconciliation
//! - Tistory and WordPress HTTP contracts

pub mod adapters_test;
pub mod dispatch_test;
pub mod pipeline_test;
