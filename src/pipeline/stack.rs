use std::fmt;
use std::sync::Arc;

use super::{ExecutionError, Middleware, Phase, Position};
use crate::executor::retry::Retryer;

/// Ordered steps of one phase
#[derive(Clone)]
pub struct StepList {
    phase: Phase,
    steps: Vec<Arc<dyn Middleware>>,
}

impl StepList {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            steps: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Add a step at the front (`Before`) or back (`After`) of the phase
    pub fn add<M>(&mut self, step: M, position: Position) -> Result<(), ExecutionError>
    where
        M: Middleware + 'static,
    {
        self.add_shared(Arc::new(step), position)
    }

    pub fn add_shared(
        &mut self,
        step: Arc<dyn Middleware>,
        position: Position,
    ) -> Result<(), ExecutionError> {
        self.ensure_unique(step.id())?;
        match position {
            Position::Before => self.steps.insert(0, step),
            Position::After => self.steps.push(step),
        }
        Ok(())
    }

    /// Insert a step immediately before or after the step named `relative_to`
    pub fn insert<M>(
        &mut self,
        step: M,
        relative_to: &str,
        position: Position,
    ) -> Result<(), ExecutionError>
    where
        M: Middleware + 'static,
    {
        self.ensure_unique(step.id())?;
        let index = self.index_of(relative_to).ok_or_else(|| {
            ExecutionError::stack(format!(
                "{} step not found: {}",
                self.phase, relative_to
            ))
        })?;
        let index = match position {
            Position::Before => index,
            Position::After => index + 1,
        };
        self.steps.insert(index, Arc::new(step));
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Arc<dyn Middleware>, ExecutionError> {
        let index = self.index_of(id).ok_or_else(|| {
            ExecutionError::stack(format!("{} step not found: {}", self.phase, id))
        })?;
        Ok(self.steps.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Middleware>> {
        self.steps.iter().find(|s| s.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn Middleware>> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    fn ensure_unique(&self, id: &str) -> Result<(), ExecutionError> {
        if self.contains(id) {
            return Err(ExecutionError::stack(format!(
                "{} already has a step with id {}",
                self.phase, id
            )));
        }
        Ok(())
    }
}

/// The assembled middleware for one call
///
/// Built fresh for every invocation from immutable client options and dropped
/// when the call returns.
#[derive(Clone)]
pub struct Stack {
    id: String,
    pub initialize: StepList,
    pub serialize: StepList,
    pub build: StepList,
    pub finalize: StepList,
    pub deserialize: StepList,
    retryer: Option<Arc<dyn Retryer>>,
}

impl Stack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initialize: StepList::new(Phase::Initialize),
            serialize: StepList::new(Phase::Serialize),
            build: StepList::new(Phase::Build),
            finalize: StepList::new(Phase::Finalize),
            deserialize: StepList::new(Phase::Deserialize),
            retryer: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self, phase: Phase) -> &StepList {
        match phase {
            Phase::Initialize => &self.initialize,
            Phase::Serialize => &self.serialize,
            Phase::Build => &self.build,
            Phase::Finalize => &self.finalize,
            Phase::Deserialize => &self.deserialize,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut StepList {
        match phase {
            Phase::Initialize => &mut self.initialize,
            Phase::Serialize => &mut self.serialize,
            Phase::Build => &mut self.build,
            Phase::Finalize => &mut self.finalize,
            Phase::Deserialize => &mut self.deserialize,
        }
    }

    /// Policy the executor consults between attempts; `None` means one attempt
    pub fn set_retryer(&mut self, retryer: Arc<dyn Retryer>) {
        self.retryer = Some(retryer);
    }

    pub fn retryer(&self) -> Option<&Arc<dyn Retryer>> {
        self.retryer.as_ref()
    }

    /// Every step id in execution order, tagged with its phase
    pub fn step_ids(&self) -> Vec<(Phase, String)> {
        Phase::ALL
            .iter()
            .flat_map(|phase| {
                self.phase(*phase)
                    .ids()
                    .into_iter()
                    .map(move |id| (*phase, id.to_string()))
            })
            .collect()
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.id)?;
        for phase in Phase::ALL {
            writeln!(f, "{} stack step", phase)?;
            for id in self.phase(phase).ids() {
                writeln!(f, "\t{}", id)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("id", &self.id)
            .field("steps", &self.step_ids())
            .field("retry", &self.retryer.is_some())
            .finish()
    }
}
