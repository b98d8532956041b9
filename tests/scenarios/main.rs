//! Scenario-based tests for pipeline runs

mod helpers;

mod edit_lock;
mod engine_failures;
mod local_checks;
mod success_run;
