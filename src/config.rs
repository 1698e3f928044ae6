//! Options consulted by the pipeline. Nothing here is global: a
//! [`CompilerOptions`] value is handed to every entry point.

use hashbrown::HashSet;
use strum::{Display, EnumIter, EnumString};

/// How matrices with a statically known shape are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum MemoryAllocation {
    /// Fixed size arrays whenever the shape is known at compile time
    Static,
    /// Heap allocated tensors
    #[default]
    Dynamic,
}

/// Which passes are allowed to log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoggingMode {
    #[default]
    Silent,
    AlwaysOn,
    /// Only passes whose name is in the set
    Selective(HashSet<String>),
}

impl LoggingMode {
    pub fn selective<S: Into<String>>(passes: impl IntoIterator<Item = S>) -> Self {
        Self::Selective(passes.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self, pass_name: &str) -> bool {
        match self {
            LoggingMode::Silent => false,
            LoggingMode::AlwaysOn => true,
            LoggingMode::Selective(passes) => passes.contains(pass_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub memory_allocation: MemoryAllocation,
    pub logging: LoggingMode,
    /// Keep copies into externally visible output names instead of fusing
    /// them away
    pub preserve_final_names: bool,
    /// Run the SSA validator after every pass
    pub validate_passes: bool,
    /// Let builtin scalar providers fold constant operands
    pub propagate_constants: bool,
    /// Operations that must be emitted as real functions instead of inlined
    /// expressions
    pub no_inline: HashSet<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            memory_allocation: MemoryAllocation::default(),
            logging: LoggingMode::default(),
            preserve_final_names: true,
            validate_passes: true,
            propagate_constants: true,
            no_inline: HashSet::new(),
        }
    }
}

impl CompilerOptions {
    pub fn with_memory_allocation(mut self, memory_allocation: MemoryAllocation) -> Self {
        self.memory_allocation = memory_allocation;
        self
    }

    pub fn with_logging(mut self, logging: LoggingMode) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_preserve_final_names(mut self, preserve_final_names: bool) -> Self {
        self.preserve_final_names = preserve_final_names;
        self
    }

    pub fn with_validate_passes(mut self, validate_passes: bool) -> Self {
        self.validate_passes = validate_passes;
        self
    }

    pub fn with_propagate_constants(mut self, propagate_constants: bool) -> Self {
        self.propagate_constants = propagate_constants;
        self
    }

    pub fn without_inlining(mut self, operation: impl Into<String>) -> Self {
        self.no_inline.insert(operation.into());
        self
    }

    pub fn should_inline(&self, operation: &str) -> bool {
        !self.no_inline.contains(operation)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn memory_allocation_parses_lowercase() {
        assert_eq!(
            MemoryAllocation::from_str("static"),
            Ok(MemoryAllocation::Static)
        );
        assert_eq!(
            MemoryAllocation::from_str("dynamic"),
            Ok(MemoryAllocation::Dynamic)
        );
        assert!(MemoryAllocation::from_str("stack").is_err());
        assert_eq!(MemoryAllocation::Static.to_string(), "static");
        assert_eq!(MemoryAllocation::default().to_string(), "dynamic");
    }

    #[test]
    fn selective_logging_only_enables_named_passes() {
        let mode = LoggingMode::selective(["block_reordering"]);

        assert!(mode.is_enabled("block_reordering"));
        assert!(!mode.is_enabled("conventional_ssa"));
        assert!(!LoggingMode::Silent.is_enabled("block_reordering"));
        assert!(LoggingMode::AlwaysOn.is_enabled("anything"));
    }
}
