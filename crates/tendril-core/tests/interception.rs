//! End-to-end interception against the reference host

use parking_lot::Mutex;
use std::sync::Arc;
use tendril_core::{
    CallbackError, FnHook, HookConfig, HookError, HookListener, HookMode, InstallMode,
    Interceptor, MethodHook, MethodReplacement, Unhook,
};
use tendril_host::{HostRuntime, SlotOptions};
use tendril_sdk::{DeclaringType, Member, Modifiers, Target, Throwable, TypeKind, Value};

type Log = Arc<Mutex<Vec<String>>>;

fn setup() -> (Arc<HostRuntime>, Interceptor) {
    setup_with(HookConfig::default())
}

fn setup_with(config: HookConfig) -> (Arc<HostRuntime>, Interceptor) {
    let host = Arc::new(HostRuntime::new());
    let interceptor = Interceptor::new(host.clone(), config);
    (host, interceptor)
}

/// `static int Math.div(int, int)`, throwing on a zero divisor
fn define_div(host: &HostRuntime, log: &Log) -> Target {
    let log = log.clone();
    host.define(
        Member::method(
            DeclaringType::class("Math"),
            "div",
            vec![TypeKind::Int, TypeKind::Int],
            TypeKind::Int,
        )
        .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC),
        move |_, args| {
            log.lock().push("original".into());
            let a = args[0].as_i32().unwrap_or_default();
            let b = args[1].as_i32().unwrap_or_default();
            if b == 0 {
                return Err(Throwable::new("ArithmeticException", "/ by zero"));
            }
            Ok(Value::Int(a / b))
        },
    )
}

fn recorder(name: &'static str, log: &Log) -> Arc<dyn MethodHook> {
    let before = log.clone();
    let after = log.clone();
    FnHook::new(name)
        .on_before(move |_| {
            before.lock().push(format!("{}.before", name));
            Ok(())
        })
        .on_after(move |_| {
            after.lock().push(format!("{}.after", name));
            Ok(())
        })
        .build()
}

fn div(host: &HostRuntime, target: &Target, a: i32, b: i32) -> Result<Value, Throwable> {
    host.call(target, None, vec![Value::Int(a), Value::Int(b)])
}

#[test]
fn test_before_after_symmetry() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    for name in ["A", "B", "C"] {
        interceptor.hook(&target, recorder(name, &log)).unwrap();
    }

    assert_eq!(div(&host, &target, 9, 3), Ok(Value::Int(3)));
    assert_eq!(
        *log.lock(),
        vec!["A.before", "B.before", "C.before", "original", "C.after", "B.after", "A.after"]
    );
}

#[test]
fn test_early_return_pivot() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    interceptor.hook(&target, recorder("A", &log)).unwrap();
    let b_before = log.clone();
    let b_after = log.clone();
    interceptor
        .hook(
            &target,
            FnHook::new("B")
                .on_before(move |frame| {
                    b_before.lock().push("B.before".into());
                    frame.set_result(Value::Int(42));
                    Ok(())
                })
                .on_after(move |_| {
                    b_after.lock().push("B.after".into());
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    interceptor.hook(&target, recorder("C", &log)).unwrap();

    assert_eq!(div(&host, &target, 9, 3), Ok(Value::Int(42)));
    assert_eq!(*log.lock(), vec!["A.before", "B.before", "B.after", "A.after"]);
}

#[test]
fn test_fault_containment() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    interceptor.hook(&target, recorder("A", &log)).unwrap();
    interceptor
        .hook(
            &target,
            FnHook::new("B")
                .on_before(|frame| {
                    frame.set_result(Value::Int(-1));
                    Err(CallbackError::from("boom"))
                })
                .on_after(|_| panic!("after phase bug"))
                .build(),
        )
        .unwrap();
    interceptor.hook(&target, recorder("C", &log)).unwrap();

    assert_eq!(div(&host, &target, 8, 2), Ok(Value::Int(4)));
    assert_eq!(
        *log.lock(),
        vec!["A.before", "C.before", "original", "C.after", "A.after"]
    );
}

#[test]
fn test_original_failure_propagates_unwrapped() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);
    interceptor.hook(&target, recorder("A", &log)).unwrap();

    let err = div(&host, &target, 1, 0).unwrap_err();
    assert_eq!(err, Throwable::new("ArithmeticException", "/ by zero"));
}

#[test]
fn test_fast_path_equivalence() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    let inputs = [(7, 2), (-9, 3), (1, 0)];
    let direct: Vec<_> = inputs.iter().map(|&(a, b)| div(&host, &target, a, b)).collect();

    // Intercept, then revoke the only callback: the routing stays installed
    let unhook = interceptor.hook(&target, recorder("A", &log)).unwrap();
    unhook.unhook();
    assert!(interceptor.is_hooked(&target));

    let routed: Vec<_> = inputs.iter().map(|&(a, b)| div(&host, &target, a, b)).collect();
    assert_eq!(direct, routed);
}

#[test]
fn test_fast_path_equivalence_for_loose_bodies() {
    let (host, interceptor) = setup();
    let receiver = Value::str("k");
    let declaring = DeclaringType::class("Loose");

    // Bodies whose result does not match the declared return kind
    let targets = [
        host.define(
            Member::method(declaring.clone(), "v", vec![], TypeKind::Void),
            |_, _| Ok(Value::Int(7)),
        ),
        host.define(
            Member::method(declaring.clone(), "l", vec![], TypeKind::Long),
            |_, _| Ok(Value::Int(7)),
        ),
        host.define(
            Member::method(declaring.clone(), "n", vec![], TypeKind::Int),
            |_, _| Ok(Value::Null),
        ),
        host.define(
            Member::method(declaring, "o", vec![], TypeKind::Object),
            |_, _| Ok(Value::Double(0.5)),
        ),
    ];

    for target in &targets {
        let direct = host.call(target, Some(receiver.clone()), vec![]);

        interceptor.hook(target, FnHook::new("a").build()).unwrap().unhook();
        assert!(interceptor.is_hooked(target));

        let routed = host.call(target, Some(receiver.clone()), vec![]);
        assert_eq!(direct, routed, "{}", target);
    }

    assert_eq!(host.call(&targets[0], Some(receiver.clone()), vec![]), Ok(Value::Null));
    assert_eq!(
        host.call(&targets[1], Some(receiver), vec![])
            .unwrap_err()
            .class(),
        "ClassCastException"
    );
}

#[test]
fn test_revocation_idempotence() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    let a = interceptor.hook(&target, recorder("A", &log)).unwrap();
    let _b = interceptor.hook(&target, recorder("B", &log)).unwrap();

    a.unhook();
    a.unhook();
    assert!(a.is_revoked());

    let descriptor = interceptor.descriptor(target.id()).unwrap();
    assert_eq!(descriptor.callbacks().len(), 1);

    div(&host, &target, 4, 2).unwrap();
    assert_eq!(*log.lock(), vec!["B.before", "original", "B.after"]);
}

#[test]
fn test_invoke_original_bypasses_callbacks() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    // Not intercepted yet: plain call
    assert_eq!(
        interceptor.invoke_original(&target, None, vec![Value::Int(6), Value::Int(3)]),
        Ok(Value::Int(2))
    );
    assert_eq!(
        interceptor
            .invoke_original(&target, None, vec![Value::Int(6), Value::Int(0)])
            .unwrap_err()
            .class(),
        "ArithmeticException"
    );

    interceptor
        .hook(&target, Arc::new(MethodReplacement::returning(Value::Int(0))))
        .unwrap();
    assert_eq!(div(&host, &target, 6, 3), Ok(Value::Int(0)));
    assert_eq!(
        interceptor.invoke_original(&target, None, vec![Value::Int(6), Value::Int(3)]),
        Ok(Value::Int(2))
    );
}

#[test]
fn test_static_target_is_resolved_before_install() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);
    assert!(!host.is_resolved(&target));

    interceptor.hook(&target, recorder("A", &log)).unwrap();
    assert!(host.is_resolved(&target));
    // The resolution call never reached the body
    assert_eq!(host.original_calls(&target), 0);
}

#[test]
fn test_mode_selection() {
    let (host, interceptor) = setup();
    let member = Member::method(DeclaringType::class("M"), "m", vec![], TypeKind::Void);
    let receiver = Value::str("m");

    let plain = host.define(member.clone(), |_, _| Ok(Value::Null));
    interceptor.hook(&plain, FnHook::new("a").build()).unwrap();
    assert_eq!(host.installed_mode(&plain), Some(InstallMode::Inline));
    assert!(host.is_compiled(&plain));

    let native = host.define(
        member.clone().with_modifiers(Modifiers::PUBLIC | Modifiers::NATIVE),
        |_, _| Ok(Value::Null),
    );
    interceptor.hook(&native, FnHook::new("a").build()).unwrap();
    assert_eq!(host.installed_mode(&native), Some(InstallMode::Replacement));

    let uncompilable = host.define_with(
        member.clone(),
        SlotOptions { compilable: false, ..SlotOptions::default() },
        |_, _| Ok(Value::Null),
    );
    interceptor.hook(&uncompilable, FnHook::new("a").build()).unwrap();
    assert_eq!(
        interceptor.descriptor(uncompilable.id()).unwrap().mode(),
        Some(InstallMode::Replacement)
    );

    interceptor.set_hook_mode(HookMode::Replacement);
    let forced = host.define(member, |_, _| Ok(Value::Null));
    interceptor.hook(&forced, FnHook::new("a").build()).unwrap();
    assert_eq!(host.installed_mode(&forced), Some(InstallMode::Replacement));
    assert!(!host.is_compiled(&forced));

    assert_eq!(host.call(&forced, Some(receiver), vec![]), Ok(Value::Null));
}

#[test]
fn test_installation_failure_leaves_no_descriptor() {
    let (host, interceptor) = setup();
    let target = host.define_with(
        Member::method(DeclaringType::class("X"), "x", vec![], TypeKind::Int),
        SlotOptions { installable: false, ..SlotOptions::default() },
        |_, _| Ok(Value::Int(1)),
    );

    let err = interceptor.hook(&target, FnHook::new("a").build()).unwrap_err();
    assert!(matches!(err, HookError::InstallationFailed { .. }));
    assert!(interceptor.descriptor(target.id()).is_none());
    assert!(!interceptor.is_hooked(&target));
}

#[test]
fn test_disable_hooks_switch() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);
    interceptor
        .hook(&target, Arc::new(MethodReplacement::do_nothing()))
        .unwrap();

    // do_nothing returns null, which an int method cannot return
    assert_eq!(
        div(&host, &target, 4, 2).unwrap_err().class(),
        "NullPointerException"
    );

    interceptor.set_hooks_disabled(true);
    assert_eq!(div(&host, &target, 4, 2), Ok(Value::Int(2)));
    interceptor.set_hooks_disabled(false);
    assert!(div(&host, &target, 4, 2).is_err());
}

#[test]
fn test_disabled_by_config() {
    let config = HookConfig {
        disable_hooks: true,
        ..HookConfig::default()
    };
    let (host, interceptor) = setup_with(config);
    let log = Log::default();
    let target = define_div(&host, &log);
    interceptor.hook(&target, recorder("A", &log)).unwrap();

    assert_eq!(div(&host, &target, 4, 2), Ok(Value::Int(2)));
    assert_eq!(*log.lock(), vec!["original"]);
}

#[test]
fn test_constructor_hook() {
    let (host, interceptor) = setup();
    let ctor = host.define_constructor(
        Member::constructor(DeclaringType::class("Cell"), vec![TypeKind::Int]),
        || Value::object("Cell", Mutex::new(0i32)),
        |this, args| {
            let cell = this
                .and_then(|v| v.as_object())
                .and_then(|o| o.downcast_ref::<Mutex<i32>>())
                .ok_or_else(|| Throwable::null_pointer("no receiver"))?;
            *cell.lock() = args[0].as_i32().unwrap_or_default();
            Ok(Value::Null)
        },
    );

    interceptor
        .hook(
            &ctor,
            FnHook::new("double-arg")
                .on_before(|frame| {
                    let n = frame.args[0].as_i32().unwrap_or_default();
                    frame.args[0] = Value::Int(n * 2);
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    let made = host.call(&ctor, None, vec![Value::Int(21)]).unwrap();
    let cell = made
        .as_object()
        .and_then(|o| o.downcast_ref::<Mutex<i32>>())
        .unwrap();
    assert_eq!(*cell.lock(), 42);

    // Hooked constructor invoked directly returns void
    assert_eq!(
        interceptor.invoke_original(&ctor, Some(made.clone()), vec![Value::Int(1)]),
        Ok(Value::Null)
    );
    assert_eq!(*cell.lock(), 1);
}

#[test]
fn test_invoke_original_constructor_returns_null_either_way() {
    let (host, interceptor) = setup();
    let built = Arc::new(Mutex::new(0usize));
    let counter = built.clone();
    let ctor = host.define_constructor(
        Member::constructor(DeclaringType::class("Token"), vec![]),
        || Value::object("Token", ()),
        move |_, _| {
            *counter.lock() += 1;
            Ok(Value::Null)
        },
    );

    // Not intercepted: a fresh instance is built but not returned
    assert_eq!(interceptor.invoke_original(&ctor, None, vec![]), Ok(Value::Null));
    assert_eq!(*built.lock(), 1);

    interceptor.hook(&ctor, FnHook::new("a").build()).unwrap();
    let instance = host.call(&ctor, None, vec![]).unwrap();
    assert_eq!(*built.lock(), 2);

    assert_eq!(
        interceptor.invoke_original(&ctor, Some(instance), vec![]),
        Ok(Value::Null)
    );
    assert_eq!(*built.lock(), 3);
}

#[test]
fn test_frame_invoke_original_from_callback() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);

    interceptor
        .hook(
            &target,
            FnHook::new("retry")
                .on_after(|frame| {
                    if frame.has_throwable() {
                        let retried =
                            frame.invoke_original_with(None, &[Value::Int(100), Value::Int(1)]);
                        match retried {
                            Ok(v) => frame.set_result(v),
                            Err(t) => frame.set_throwable(t),
                        }
                    }
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    assert_eq!(div(&host, &target, 1, 0), Ok(Value::Int(100)));
}

struct RecordingListener {
    events: Log,
    fail: bool,
}

impl HookListener for RecordingListener {
    fn before_hook(&self, target: &Target, callback: &Arc<dyn MethodHook>) -> Result<(), CallbackError> {
        self.events
            .lock()
            .push(format!("before {} {}", target.member().name(), callback.name()));
        if self.fail {
            return Err("listener broke".into());
        }
        Ok(())
    }

    fn after_hook(&self, target: &Target, unhook: &Unhook) -> Result<(), CallbackError> {
        self.events
            .lock()
            .push(format!("after {} {}", target.member().name(), unhook.callback().name()));
        if self.fail {
            panic!("listener panicked");
        }
        Ok(())
    }
}

#[test]
fn test_listener_observes_registration() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);
    let events = Log::default();

    interceptor.set_listener(Arc::new(RecordingListener {
        events: events.clone(),
        fail: false,
    }));
    interceptor.hook(&target, recorder("A", &log)).unwrap();
    assert_eq!(*events.lock(), vec!["before div A", "after div A"]);

    interceptor.clear_listener();
    interceptor.hook(&target, recorder("B", &log)).unwrap();
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn test_listener_failure_does_not_abort() {
    let (host, interceptor) = setup();
    let log = Log::default();
    let target = define_div(&host, &log);
    let events = Log::default();

    interceptor.set_listener(Arc::new(RecordingListener {
        events: events.clone(),
        fail: true,
    }));
    let unhook = interceptor.hook(&target, recorder("A", &log)).unwrap();
    assert!(!unhook.is_revoked());
    assert_eq!(events.lock().len(), 2);
    assert_eq!(div(&host, &target, 2, 1), Ok(Value::Int(2)));
}
