//! Middle end of a compiler from an array language to C: SSA form, type
//! inference, function instance resolution, SSA passes and the way out of
//! SSA.

pub mod compile;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod middle;

pub use compile::{CompiledFunction, compile_function, compile_unit};
pub use config::{CompilerOptions, LoggingMode, MemoryAllocation};
pub use error::{CompileError, CompileResult};
