//! One rule per instruction kind. The engine asks each rule in turn whether it
//! accepts an instruction and lets the first one that does infer it.

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        inference::{TypeInferenceContext, TypeInferenceEngine},
        ssa::{Constant, FunctionBody, Instruction, InstructionLocation},
        ty::{NumericKind, VariableType, combine::combine_all},
    },
};

pub trait TypeInferenceRule: Send + Sync {
    fn accepts(&self, instruction: &Instruction) -> bool;

    fn infer(
        &self,
        engine: &TypeInferenceEngine<'_>,
        body: &FunctionBody,
        context: &mut TypeInferenceContext,
        location: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()>;
}

fn unexpected(rule: &str, instruction: &Instruction) -> CompileError {
    CompileError::internal("type_inference", format!("{rule} cannot infer `{instruction}`"))
}

pub struct ArgumentRule;

impl TypeInferenceRule for ArgumentRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::Argument { .. })
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        _: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::Argument { output, index } = instruction else {
            return Err(unexpected("ArgumentRule", instruction));
        };

        let ty = context.argument_type(*index)?.clone();
        context.set_type(output, ty)
    }
}

/// Integer literals are `int32`, other numbers `double`, both carrying their
/// value as a constant.
pub struct AssignmentRule;

impl TypeInferenceRule for AssignmentRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::Assignment { .. })
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        _: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::Assignment { output, value } = instruction else {
            return Err(unexpected("AssignmentRule", instruction));
        };

        let ty = match value {
            Constant::Int(value) => VariableType::scalar_constant(NumericKind::Int32, *value as f64),
            Constant::Float(value) => VariableType::scalar_constant(NumericKind::Double, *value),
            Constant::Str(value) => VariableType::string(value.clone()),
        };

        context.set_type(output, ty)
    }
}

pub struct CopyRule;

impl TypeInferenceRule for CopyRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::CopyFromVariable { .. })
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        _: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::CopyFromVariable { output, input } = instruction else {
            return Err(unexpected("CopyRule", instruction));
        };

        match context.type_of(input).cloned() {
            Some(ty) => context.set_type(output, ty),
            None => Ok(()),
        }
    }
}

/// The least upper bound of the inputs arriving over live edges. Inputs not
/// typed yet, as on a loop back edge seen for the first time, are skipped but
/// make the result forget its constant.
pub struct PhiRule;

impl TypeInferenceRule for PhiRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        instruction.is_phi()
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        location: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Some(phi) = instruction.as_phi() else {
            return Err(unexpected("PhiRule", instruction));
        };

        let mut known = Vec::new();
        let mut has_unknown = false;

        for (source, variable) in phi.entries() {
            if !context.is_edge_live(*source, location.block) {
                continue;
            }

            match context.type_of(variable) {
                Some(ty) => known.push(ty.clone()),
                None => has_unknown = true,
            }
        }

        let Some(ty) = combine_all(&known)? else {
            return Ok(());
        };

        let ty = if has_unknown { ty.without_constant() } else { ty };
        context.set_type(phi.output(), ty)
    }
}

/// Resolves the called instance and takes the output types from its
/// signature. Calls to instances that never return end the current path.
pub struct FunctionCallRule;

impl TypeInferenceRule for FunctionCallRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::FunctionCall { .. })
    }

    fn infer(
        &self,
        engine: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        location: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::FunctionCall {
            function,
            outputs,
            inputs,
        } = instruction
        else {
            return Err(unexpected("FunctionCallRule", instruction));
        };

        let Some(input_types) = inputs
            .iter()
            .map(|input| context.type_of(input).cloned())
            .collect::<Option<Vec<_>>>()
        else {
            return Ok(());
        };

        let data = engine
            .resolver()
            .data(input_types)
            .with_number_of_outputs(outputs.len());
        let instance = engine.resolver().resolve(function, &data)?;

        let output_types = instance.output_types();
        if output_types.len() < outputs.len() {
            return Err(CompileError::internal(
                "type_inference",
                format!(
                    "`{}` gives {} outputs but {} are used",
                    instance.name(),
                    output_types.len(),
                    outputs.len()
                ),
            ));
        }

        for (output, ty) in outputs.iter().zip(output_types) {
            context.set_type(output, ty)?;
        }

        if instance.interrupts() {
            context.mark_unreachable();
        }
        context.record_instance(location, instance);

        Ok(())
    }
}

pub struct SimpleGetRule;

impl TypeInferenceRule for SimpleGetRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::SimpleGet { .. })
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        _: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::SimpleGet { output, array, .. } = instruction else {
            return Err(unexpected("SimpleGetRule", instruction));
        };

        let Some(array_type) = context.type_of(array) else {
            return Ok(());
        };

        let element = array_type
            .element_type()
            .ok_or_else(|| CompileError::unsupported("simple_get", &[array_type.clone()]))?;

        context.set_type(output, element)
    }
}

pub struct SimpleSetRule;

impl TypeInferenceRule for SimpleSetRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::SimpleSet { .. })
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        context: &mut TypeInferenceContext,
        _: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::SimpleSet { output, array, .. } = instruction else {
            return Err(unexpected("SimpleSetRule", instruction));
        };

        let Some(array_type) = context.type_of(array).cloned() else {
            return Ok(());
        };

        if !array_type.is_matrix() {
            return Err(CompileError::unsupported("simple_set", &[array_type]));
        }

        context.set_type(output, array_type)
    }
}

/// Infers the region of a parallel block in a derived context. When no path
/// through the region reaches its end, whatever follows the parallel block is
/// unreachable.
pub struct ParallelBlockRule;

impl TypeInferenceRule for ParallelBlockRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(instruction, Instruction::ParallelBlock { .. })
    }

    fn infer(
        &self,
        engine: &TypeInferenceEngine<'_>,
        body: &FunctionBody,
        context: &mut TypeInferenceContext,
        location: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let Instruction::ParallelBlock { content, end, .. } = instruction else {
            return Err(unexpected("ParallelBlockRule", instruction));
        };

        let mut region = context.derive();
        region.mark_edge_live(location.block, *content);
        engine.infer_region(body, &mut region, *content, Some(*end))?;

        let falls_through = region.has_live_edge_into(*end);
        context.merge(region);

        if !falls_through {
            context.mark_unreachable();
        }

        Ok(())
    }
}

/// Branches, jumps and returns define nothing.
pub struct ControlFlowRule;

impl TypeInferenceRule for ControlFlowRule {
    fn accepts(&self, instruction: &Instruction) -> bool {
        matches!(
            instruction,
            Instruction::Branch { .. } | Instruction::Goto { .. } | Instruction::Return
        )
    }

    fn infer(
        &self,
        _: &TypeInferenceEngine<'_>,
        _: &FunctionBody,
        _: &mut TypeInferenceContext,
        _: InstructionLocation,
        _: &Instruction,
    ) -> CompileResult<()> {
        Ok(())
    }
}
