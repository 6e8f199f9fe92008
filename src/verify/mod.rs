//! Structural self-check of emitted class files
//!
//! Runs after emission over the in-memory [`ClassFile`](crate::codegen::class::ClassFile):
//! every pool cross-reference must name an entry of the right kind, and the
//! class, field and method flag combinations must be legal. A failure here
//! means the emitter broke an invariant.

pub mod class_access_flags;
pub mod constant_pool;
pub mod fields;
pub mod interfaces;
pub mod method_access_flags;
mod verifier;

pub use constant_pool::check_pool_ceiling;
pub use verifier::{verify, VerifyError, VerifyResult};
