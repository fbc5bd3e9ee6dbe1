use std::any::Any;
use std::marker::PhantomData;

use validator::{Validate, ValidationErrors};

use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

/// Runs the input's `validator` rules before anything is serialized
///
/// All failures are collected into one [`ExecutionError::Validation`].
pub struct ValidateInput<I> {
    _input: PhantomData<fn() -> I>,
}

impl<I> ValidateInput<I> {
    pub fn new() -> Self {
        Self {
            _input: PhantomData,
        }
    }
}

impl<I> Default for ValidateInput<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Middleware for ValidateInput<I>
where
    I: Validate + Any + Send + Sync,
{
    fn id(&self) -> &str {
        "OperationInputValidation"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        ctx.input::<I>()?
            .validate()
            .map_err(|errors| ExecutionError::validation_error(describe::<I>(&errors)))
    }
}

pub fn add_validation<I>(stack: &mut Stack) -> Result<(), ExecutionError>
where
    I: Validate + Any + Send + Sync,
{
    stack.initialize.add(ValidateInput::<I>::new(), Position::After)
}

/// One sorted line per field failure, e.g.
/// `missing required field, PutImageScanningConfigurationInput.RepositoryName`
pub fn describe<I>(errors: &ValidationErrors) -> Vec<String> {
    let type_name = std::any::type_name::<I>()
        .rsplit("::")
        .next()
        .unwrap_or_default();

    let mut lines: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let member = member_name(&field);
            field_errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => format!("{}, {}.{}", message, type_name, member),
                    None => format!("invalid field ({}), {}.{}", e.code, type_name, member),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    lines.sort();
    lines.dedup();
    lines
}

/// `repository_name` or `repositoryName` to `RepositoryName`
fn member_name(field: &str) -> String {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
