//! Capture-and-restore helper for console variables.

use tracing::debug;

use super::EffectError;
use crate::context::EngineContext;

/// Remembers a variable's original value across a temporary override.
///
/// The original is snapshotted on the first `apply` only, so repeated
/// applies within one effect run keep the true original.
#[derive(Debug)]
pub struct VariableRestore {
    variable: String,
    original: Option<String>,
}

impl VariableRestore {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            original: None,
        }
    }

    pub fn apply(&mut self, ctx: &EngineContext, value: &str) -> Result<(), EffectError> {
        if self.original.is_none() {
            let current = ctx.console.run_command(&self.variable)?;
            self.original = Some(current.trim().to_string());
        }
        ctx.console.set_value(&self.variable, value)?;
        Ok(())
    }

    /// Put the original back. No-op if nothing was ever applied.
    pub fn restore(&mut self, ctx: &EngineContext) -> Result<(), EffectError> {
        if let Some(original) = self.original.take() {
            debug!(variable = %self.variable, "restoring original value");
            ctx.console.set_value(&self.variable, &original)?;
        }
        Ok(())
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
}
