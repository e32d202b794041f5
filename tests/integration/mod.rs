//! Integration Tests Module
//!
//! End-to-end tests for the orchestration engine. All external surfaces
//! (execution contexts, probes, keep-awake, backing store) are scripted
//! fakes; no provider, browser, or spreadsheet transport is touched.



// Completion-detector polling tests
mod detector_test;

// Retry/escalation state machine tests
mod executor_test;

// Idle-prevention coordinator tests
mod idle_test;

// Result-log formatting and merge tests
mod result_log_test;
