//! Reflection memory: failure explanations carried across runs.
//!
//! - [`store`]: `Reflection` records and the append-only `ReflectionMemory`
//! - [`errors`]: load/persist errors

pub mod errors;
pub mod store;

pub use errors::MemoryError;
pub use store::{Reflection, ReflectionMemory, PROMPT_REFLECTION_LIMIT};
