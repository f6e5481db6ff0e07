//! Integration Tests Module
//!
//! End-to-end tests of the planning engine through its public API: plan
//! generation, validation, scheduling, cancellation and replanning.

// Full create/validate/execute/adapt pipeline
mod end_to_end_test;

// Execution model ordering and cycle handling
mod scheduling_test;

// Cancellation through the service facade
mod cancellation_test;
