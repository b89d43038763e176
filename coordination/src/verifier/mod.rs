//! Verifier Module: deterministic validation of a proposed fix.
//!
//! # Pipeline
//!
//! ```text
//! syntax/import check per edited module → test command → diff-size accounting
//! ```
//!
//! A syntax failure is fatal for the attempt and the test command is not run.
//! Test output is parsed into a pass/fail count plus individual failures; a
//! failed run with nothing parseable gets one synthetic `unknown` failure
//! holding the output tail.
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::verifier::{Validator, ValidatorConfig};
//!
//! let validator = Validator::new("/path/to/repo", ValidatorConfig::default());
//! let result = validator.validate(&fix, &triage.edge_cases).await?;
//! println!("passed={} total={}", result.passed, result.total);
//! ```

pub mod parser;
pub mod pipeline;
pub mod report;

pub use parser::{parse_output, ParsedRun};
pub use pipeline::{module_for_path, modules_for_fix, Validator, ValidatorConfig, ValidatorError};
pub use report::{Gate, GateOutcome, GateResult, TestFailure, TestResult};
