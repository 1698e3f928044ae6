use std::sync::Arc;

use crate::middle::{instance::ProviderData, ty::VariableType};

type Check = Arc<dyn Fn(&ProviderData) -> bool + Send + Sync>;

/// A conjunction of predicates over [`ProviderData`], built fluently:
///
/// ```ignore
/// InputsChecker::new().number_of_inputs(2).are_scalar().not().has_constant(0)
/// ```
///
/// Checks about a specific input pass when that input does not exist, so a
/// count check should come first.
#[derive(Clone, Default)]
pub struct InputsChecker {
    checks: Vec<Check>,
    negate_next: bool,
}

impl core::fmt::Debug for InputsChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputsChecker")
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl InputsChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negates the next check added.
    pub fn not(mut self) -> Self {
        self.negate_next = !self.negate_next;
        self
    }

    pub fn custom(mut self, check: impl Fn(&ProviderData) -> bool + Send + Sync + 'static) -> Self {
        let check: Check = if self.negate_next {
            Arc::new(move |data| !check(data))
        } else {
            Arc::new(check)
        };

        self.negate_next = false;
        self.checks.push(check);
        self
    }

    fn input(self, index: usize, check: impl Fn(&VariableType) -> bool + Send + Sync + 'static) -> Self {
        self.custom(move |data| data.input_type(index).is_none_or(&check))
    }

    fn all_inputs(self, check: impl Fn(&VariableType) -> bool + Send + Sync + 'static) -> Self {
        self.custom(move |data| data.input_types().iter().all(&check))
    }

    pub fn number_of_inputs(self, count: usize) -> Self {
        self.custom(move |data| data.input_types().len() == count)
    }

    pub fn number_of_inputs_between(self, min: usize, max: usize) -> Self {
        self.custom(move |data| (min..=max).contains(&data.input_types().len()))
    }

    pub fn number_of_outputs_at_most(self, count: usize) -> Self {
        self.custom(move |data| data.number_of_outputs() <= count)
    }

    pub fn are_scalar(self) -> Self {
        self.all_inputs(VariableType::is_scalar)
    }

    pub fn are_numeric(self) -> Self {
        self.all_inputs(VariableType::is_numeric)
    }

    /// Every input from `start` on is a scalar.
    pub fn are_scalar_from(self, start: usize) -> Self {
        self.custom(move |data| {
            data.input_types()
                .iter()
                .skip(start)
                .all(VariableType::is_scalar)
        })
    }

    pub fn is_scalar(self, index: usize) -> Self {
        self.input(index, VariableType::is_scalar)
    }

    pub fn is_matrix(self, index: usize) -> Self {
        self.input(index, VariableType::is_matrix)
    }

    pub fn is_string(self, index: usize) -> Self {
        self.input(index, VariableType::is_string)
    }

    pub fn is_numeric(self, index: usize) -> Self {
        self.input(index, VariableType::is_numeric)
    }

    /// The input is a two dimensional matrix, or one of unknown rank.
    pub fn is_2d_matrix(self, index: usize) -> Self {
        self.input(index, |ty| {
            ty.shape()
                .is_some_and(|shape| shape.dims().is_none_or(|dims| dims.len() == 2))
        })
    }

    pub fn has_constant(self, index: usize) -> Self {
        self.input(index, |ty| ty.constant().is_some())
    }

    /// Every expected output type, when known, satisfies `check`.
    pub fn outputs_are(self, check: impl Fn(&VariableType) -> bool + Send + Sync + 'static) -> Self {
        self.custom(move |data| data.output_types().is_none_or(|types| types.iter().all(&check)))
    }

    pub fn check(&self, data: &ProviderData) -> bool {
        self.checks.iter().all(|check| check(data))
    }
}
