//! Per-call context threaded through the callback chain

use tendril_sdk::{Backup, Target, Throwable, Value};

/// Mutable context of one intercepted call.
///
/// A frame holds either a result or a throwable, never both: setting one
/// clears the other. Setting either also marks the frame as returning early,
/// which in the before phase suppresses the original call and the remaining
/// before callbacks.
pub struct CallFrame<'a> {
    target: &'a Target,
    backup: &'a dyn Backup,
    /// Receiver; `None` for static targets
    pub this: Option<Value>,
    /// Arguments; changes made before the original runs are passed to it
    pub args: Vec<Value>,
    result: Value,
    throwable: Option<Throwable>,
    return_early: bool,
}

/// Saved outcome of a frame, restored when an after callback fails
pub(crate) struct Outcome {
    result: Value,
    throwable: Option<Throwable>,
}

impl<'a> CallFrame<'a> {
    pub(crate) fn new(
        target: &'a Target,
        backup: &'a dyn Backup,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            target,
            backup,
            this,
            args,
            result: Value::Null,
            throwable: None,
            return_early: false,
        }
    }

    /// The intercepted target
    pub fn method(&self) -> &Target {
        self.target
    }

    /// Current result (null while a throwable is set)
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Set the result, clearing any throwable
    pub fn set_result(&mut self, result: Value) {
        self.result = result;
        self.throwable = None;
        self.return_early = true;
    }

    /// Current throwable
    pub fn throwable(&self) -> Option<&Throwable> {
        self.throwable.as_ref()
    }

    /// Set the throwable, clearing any result
    pub fn set_throwable(&mut self, throwable: Throwable) {
        self.result = Value::Null;
        self.throwable = Some(throwable);
        self.return_early = true;
    }

    /// Whether a throwable is set
    pub fn has_throwable(&self) -> bool {
        self.throwable.is_some()
    }

    /// The outcome as the caller will see it
    pub fn result_or_throwable(&self) -> Result<Value, Throwable> {
        match &self.throwable {
            Some(t) => Err(t.clone()),
            None => Ok(self.result.clone()),
        }
    }

    /// Clear result, throwable and the early-return mark
    pub fn reset_result(&mut self) {
        self.result = Value::Null;
        self.throwable = None;
        self.return_early = false;
    }

    /// Whether the original call will be (or was) skipped
    pub fn is_return_early(&self) -> bool {
        self.return_early
    }

    /// Run the original body with the frame's current receiver and arguments.
    ///
    /// Does not touch the frame's outcome.
    pub fn invoke_original(&self) -> Result<Value, Throwable> {
        self.invoke_original_with(self.this.as_ref(), &self.args)
    }

    /// Run the original body with an explicit receiver and arguments
    pub fn invoke_original_with(
        &self,
        this: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, Throwable> {
        self.backup
            .invoke(this, args)
            .map_err(|e| e.into_throwable())
    }

    pub(crate) fn save_outcome(&self) -> Outcome {
        Outcome {
            result: self.result.clone(),
            throwable: self.throwable.clone(),
        }
    }

    pub(crate) fn restore_outcome(&mut self, saved: Outcome) {
        match saved.throwable {
            Some(t) => self.set_throwable(t),
            None => self.set_result(saved.result),
        }
    }

    pub(crate) fn into_outcome(self) -> Result<Value, Throwable> {
        match self.throwable {
            Some(t) => Err(t),
            None => Ok(self.result),
        }
    }
}

impl std::fmt::Debug for CallFrame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFrame")
            .field("method", &self.target.to_string())
            .field("this", &self.this)
            .field("args", &self.args)
            .field("result", &self.result)
            .field("throwable", &self.throwable)
            .field("return_early", &self.return_early)
            .finish()
    }
}
