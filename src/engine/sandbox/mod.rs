//! # Safe Code Execution
//!
//! The extract → validate → execute chain applied to model-authored code:
//! [`CodeExtractor`] pulls fenced Rhai candidates out of free-form
//! completions, [`SafetyValidator`] statically vets a candidate without
//! running it, and [`Sandbox`] evaluates an accepted candidate inside a
//! restricted scope. Rejected code is guaranteed never to run; the static
//! vet is a best-effort guard, not a hard security boundary.

pub mod extractor;
pub mod safety;
pub mod executor;

pub use executor::{Sandbox, SandboxOutcome};
pub use extractor::CodeExtractor;
pub use safety::{SafetyValidator, SafetyVerdict};
