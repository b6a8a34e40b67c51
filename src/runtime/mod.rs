//! Runtime support shared by the scheduling loops

pub mod crash;

pub use crash::{panic_message, CrashHandler, PanicPayload};
