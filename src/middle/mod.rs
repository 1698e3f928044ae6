//! Functions arrive here in SSA form. Their types are inferred, calls are
//! resolved to function instances, the body is simplified and finally taken
//! out of SSA so it can be emitted.

pub mod inference;
pub mod instance;
pub mod passes;
pub mod ssa;
pub mod ty;
pub mod unssa;
