//! Dispatch pipeline
//!
//! Runs the callback chain of one descriptor around its backup:
//!
//! ```text
//! before[0] .. before[k]   (stops at the first callback that returns early)
//! original                 (only if nobody returned early)
//! after[k]  .. after[0]    (only callbacks whose before phase ran)
//! ```
//!
//! Every callback invocation is a containment boundary. A callback that
//! returns an error or panics has its contribution to this call discarded
//! and the chain carries on.

use crate::callback::{CallbackError, CallbackResult, MethodHook};
use crate::config::LiveConfig;
use crate::descriptor::HookDescriptor;
use crate::frame::CallFrame;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tendril_sdk::{Throwable, Value};

/// Which side of the original call a callback ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before"),
            Phase::After => f.write_str("after"),
        }
    }
}

/// A contained callback failure
#[derive(Debug)]
enum CallbackFailure {
    Error(CallbackError),
    Panic(String),
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackFailure::Error(e) => write!(f, "{}", e),
            CallbackFailure::Panic(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one callback phase, turning errors and panics into a value
fn contain<F>(f: F) -> Result<(), CallbackFailure>
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CallbackFailure::Error(e)),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload))),
    }
}

fn report(callback: &dyn MethodHook, phase: Phase, descriptor: &HookDescriptor, failure: &CallbackFailure) {
    tracing::error!(
        callback = callback.name(),
        phase = %phase,
        method = %descriptor.target(),
        "unexpected failure in callback: {}",
        failure
    );
}

/// Dispatch one intercepted call through `descriptor`'s callback chain.
pub fn handle_call(
    descriptor: &HookDescriptor,
    config: &LiveConfig,
    this: Option<Value>,
    args: Vec<Value>,
) -> Result<Value, Throwable> {
    let target = descriptor.target();
    let backup = descriptor.backup().ok_or_else(|| {
        Throwable::assertion(format!(
            "call of {} reached the dispatcher before installation completed",
            target
        ))
    })?;

    if config.debug() {
        tracing::debug!(method = %target, this = ?this, args = ?args, "handling hooked call");
    }

    let callbacks = descriptor.callbacks().snapshot();
    if config.hooks_disabled() || callbacks.is_empty() {
        return backup
            .invoke(this.as_ref(), &args)
            .map_err(|e| e.into_throwable());
    }

    let mut frame = CallFrame::new(target, backup, this, args);

    // Before phase; `pivot` ends as one past the last callback that ran
    let mut pivot = 0;
    for (idx, callback) in callbacks.iter().enumerate() {
        pivot = idx + 1;
        match contain(|| callback.before(&mut frame)) {
            Ok(()) => {
                if frame.is_return_early() {
                    break;
                }
            }
            Err(failure) => {
                report(callback.as_ref(), Phase::Before, descriptor, &failure);
                frame.reset_result();
            }
        }
    }

    if !frame.is_return_early() {
        match frame.invoke_original() {
            Ok(value) => frame.set_result(value),
            Err(t) => frame.set_throwable(t),
        }
    }

    // After phase unwinds exactly the callbacks whose before phase ran
    for callback in callbacks[..pivot].iter().rev() {
        let saved = frame.save_outcome();
        if let Err(failure) = contain(|| callback.after(&mut frame)) {
            report(callback.as_ref(), Phase::After, descriptor, &failure);
            frame.restore_outcome(saved);
        }
    }

    frame.into_outcome()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{FnHook, MethodReplacement};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tendril_sdk::{
        Backup, DeclaringType, InstallMode, Installed, InvokeError, InvokeResult, Member, Target,
        TargetId, TypeKind,
    };

    type Log = Arc<Mutex<Vec<String>>>;

    /// Backup that records its invocation and doubles its int argument
    struct Doubler {
        log: Log,
        calls: AtomicUsize,
    }

    impl Backup for Doubler {
        fn invoke(&self, _this: Option<&Value>, args: &[Value]) -> InvokeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push("original".into());
            match args.first().and_then(|v| v.as_i32()) {
                Some(n) if n < 0 => Err(InvokeError::Target(Throwable::illegal_argument("negative"))),
                Some(n) => Ok(Value::Int(n * 2)),
                None => Err(InvokeError::ArgumentMismatch("expected 1 argument".into())),
            }
        }
    }

    fn descriptor(log: &Log) -> (HookDescriptor, Arc<Doubler>) {
        let backup = Arc::new(Doubler {
            log: log.clone(),
            calls: AtomicUsize::new(0),
        });
        let d = HookDescriptor::new(Target::new(
            TargetId::from_raw(42),
            Member::method(DeclaringType::class("Calc"), "double", vec![TypeKind::Int], TypeKind::Int),
        ));
        d.set_installed(Installed {
            backup: backup.clone(),
            mode: InstallMode::Inline,
        });
        (d, backup)
    }

    fn recorder(name: &'static str, log: &Log) -> Arc<dyn MethodHook> {
        let before_log = log.clone();
        let after_log = log.clone();
        FnHook::new(name)
            .on_before(move |_| {
                before_log.lock().push(format!("{}.before", name));
                Ok(())
            })
            .on_after(move |_| {
                after_log.lock().push(format!("{}.after", name));
                Ok(())
            })
            .build()
    }

    fn call(d: &HookDescriptor, n: i32) -> Result<Value, Throwable> {
        handle_call(d, &LiveConfig::default(), None, vec![Value::Int(n)])
    }

    #[test]
    fn test_fast_path_without_callbacks() {
        let log = Log::default();
        let (d, backup) = descriptor(&log);
        assert_eq!(call(&d, 4), Ok(Value::Int(8)));
        assert_eq!(call(&d, -1), Err(Throwable::illegal_argument("negative")));
        assert_eq!(backup.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_before_after_symmetry() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        for name in ["A", "B", "C"] {
            d.callbacks().add(recorder(name, &log));
        }

        assert_eq!(call(&d, 5), Ok(Value::Int(10)));
        assert_eq!(
            *log.lock(),
            vec!["A.before", "B.before", "C.before", "original", "C.after", "B.after", "A.after"]
        );
    }

    #[test]
    fn test_early_return_pivot() {
        let log = Log::default();
        let (d, backup) = descriptor(&log);
        d.callbacks().add(recorder("A", &log));
        let b_log = log.clone();
        let b_after = log.clone();
        d.callbacks().add(
            FnHook::new("B")
                .on_before(move |frame| {
                    b_log.lock().push("B.before".into());
                    frame.set_result(Value::Int(-7));
                    Ok(())
                })
                .on_after(move |_| {
                    b_after.lock().push("B.after".into());
                    Ok(())
                })
                .build(),
        );
        d.callbacks().add(recorder("C", &log));

        assert_eq!(call(&d, 5), Ok(Value::Int(-7)));
        assert_eq!(*log.lock(), vec!["A.before", "B.before", "B.after", "A.after"]);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_before_is_reverted() {
        let log = Log::default();
        let (d, backup) = descriptor(&log);
        d.callbacks().add(recorder("A", &log));
        d.callbacks().add(
            FnHook::new("B")
                .on_before(|frame| {
                    frame.set_result(Value::Int(999));
                    Err("broken".into())
                })
                .build(),
        );
        d.callbacks().add(recorder("C", &log));

        // B's result is discarded, the original runs
        assert_eq!(call(&d, 3), Ok(Value::Int(6)));
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock(),
            vec!["A.before", "C.before", "original", "C.after", "A.after"]
        );
    }

    #[test]
    fn test_panicking_before_is_contained() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        d.callbacks().add(
            FnHook::new("P")
                .on_before(|frame| {
                    frame.set_throwable(Throwable::runtime("half-done"));
                    panic!("callback bug");
                })
                .build(),
        );
        assert_eq!(call(&d, 2), Ok(Value::Int(4)));
    }

    #[test]
    fn test_failing_after_restores_previous_outcome() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        d.callbacks().add(
            FnHook::new("outer")
                .on_after(move |frame| {
                    *seen2.lock() = Some(frame.result_or_throwable());
                    Ok(())
                })
                .build(),
        );
        d.callbacks().add(
            FnHook::new("inner")
                .on_after(|frame| {
                    frame.set_throwable(Throwable::runtime("partial"));
                    Err("after broke".into())
                })
                .build(),
        );
        assert_eq!(call(&d, 10), Ok(Value::Int(20)));
        // The outer callback saw the outcome from before the inner failure
        assert_eq!(*seen.lock(), Some(Ok(Value::Int(20))));
    }

    #[test]
    fn test_after_can_replace_failure() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        d.callbacks().add(
            FnHook::new("recover")
                .on_after(|frame| {
                    if frame.has_throwable() {
                        frame.set_result(Value::Int(0));
                    }
                    Ok(())
                })
                .build(),
        );
        assert_eq!(call(&d, -5), Ok(Value::Int(0)));
    }

    #[test]
    fn test_args_mutated_before_original() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        d.callbacks().add(
            FnHook::new("bump")
                .on_before(|frame| {
                    frame.args[0] = Value::Int(100);
                    Ok(())
                })
                .build(),
        );
        assert_eq!(call(&d, 1), Ok(Value::Int(200)));
    }

    #[test]
    fn test_replacement_suppresses_original() {
        let log = Log::default();
        let (d, backup) = descriptor(&log);
        d.callbacks().add(Arc::new(MethodReplacement::new(|frame| {
            let n = frame.args[0].as_i32().unwrap_or_default();
            Ok(Value::Int(n + 1))
        })));
        assert_eq!(call(&d, 1), Ok(Value::Int(2)));
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabled_hooks_take_fast_path() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        d.callbacks().add(recorder("A", &log));

        let config = LiveConfig::default();
        config.set_hooks_disabled(true);
        let result = handle_call(&d, &config, None, vec![Value::Int(2)]);
        assert_eq!(result, Ok(Value::Int(4)));
        assert_eq!(*log.lock(), vec!["original"]);
    }

    #[test]
    fn test_uninstalled_descriptor_is_an_assertion() {
        let d = HookDescriptor::new(Target::new(
            TargetId::from_raw(1),
            Member::method(DeclaringType::class("X"), "y", vec![], TypeKind::Void),
        ));
        let err = handle_call(&d, &LiveConfig::default(), None, vec![]).unwrap_err();
        assert_eq!(err.class(), "AssertionError");
    }

    #[test]
    fn test_revocation_mid_dispatch_uses_snapshot() {
        let log = Log::default();
        let (d, _) = descriptor(&log);
        let d = Arc::new(d);
        let victim = recorder("V", &log);

        let d2 = d.clone();
        let victim2 = victim.clone();
        d.callbacks().add(
            FnHook::new("remover")
                .on_before(move |_| {
                    d2.callbacks().remove(&victim2);
                    Ok(())
                })
                .build(),
        );
        d.callbacks().add(victim);

        assert_eq!(call(&d, 1), Ok(Value::Int(2)));
        assert_eq!(*log.lock(), vec!["V.before", "original", "V.after"]);

        log.lock().clear();
        assert_eq!(call(&d, 1), Ok(Value::Int(2)));
        assert_eq!(*log.lock(), vec!["original"]);
    }
}
