//! `tendril demo` - scripted interception against the reference host

use anyhow::Context;
use std::sync::Arc;
use tendril_core::{FnHook, HookConfig, Interceptor, MethodReplacement};
use tendril_host::HostRuntime;
use tendril_sdk::{DeclaringType, Member, Modifiers, Target, Throwable, TypeKind, Value};

struct Targets {
    div: Target,
    greet: Target,
    nano_time: Target,
}

fn define_targets(host: &HostRuntime) -> Targets {
    let div = host.define(
        Member::method(
            DeclaringType::class("Math"),
            "div",
            vec![TypeKind::Int, TypeKind::Int],
            TypeKind::Int,
        )
        .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC),
        |_, args| {
            let a = args[0].as_i32().unwrap_or_default();
            let b = args[1].as_i32().unwrap_or_default();
            if b == 0 {
                return Err(Throwable::new("ArithmeticException", "/ by zero"));
            }
            Ok(Value::Int(a / b))
        },
    );

    let greet = host.define(
        Member::method(
            DeclaringType::class("Greeter"),
            "greet",
            vec![TypeKind::Object],
            TypeKind::Object,
        ),
        |_, args| Ok(Value::str(format!("hello, {}", args[0]))),
    );

    let nano_time = host.define(
        Member::method(DeclaringType::class("System"), "nanoTime", vec![], TypeKind::Long)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::NATIVE),
        |_, _| Ok(Value::Long(1_234_567)),
    );

    Targets {
        div,
        greet,
        nano_time,
    }
}

fn show(label: &str, outcome: Result<Value, Throwable>) {
    match outcome {
        Ok(value) => println!("  {:<28} = {}", label, value),
        Err(t) => println!("  {:<28} ! {}", label, t),
    }
}

pub fn execute(config: HookConfig) -> anyhow::Result<()> {
    let host = Arc::new(HostRuntime::new());
    let targets = define_targets(&host);
    let interceptor = Interceptor::new(host.clone(), config.clone());

    println!(
        "tendril demo (mode: {}, hooks {})",
        config.hook_mode,
        if config.disable_hooks { "disabled" } else { "enabled" }
    );
    println!();

    let receiver = Value::str("greeter");
    let div = |a: i32, b: i32| host.call(&targets.div, None, vec![Value::Int(a), Value::Int(b)]);
    let greet =
        |name: &str| host.call(&targets.greet, Some(receiver.clone()), vec![Value::str(name)]);

    println!("Before interception:");
    show("Math.div(84, 2)", div(84, 2));
    show("Math.div(1, 0)", div(1, 0));
    show("Greeter.greet(\"world\")", greet("world"));
    show("System.nanoTime()", host.call(&targets.nano_time, None, vec![]));
    println!();

    let trace = interceptor
        .hook(
            &targets.div,
            FnHook::new("trace")
                .on_before(|frame| {
                    println!("    -> {}{:?}", frame.method().member().name(), frame.args);
                    Ok(())
                })
                .on_after(|frame| {
                    println!("    <- {:?}", frame.result_or_throwable());
                    Ok(())
                })
                .build(),
        )
        .context("hooking Math.div")?;

    interceptor
        .hook(
            &targets.div,
            FnHook::new("zero-guard")
                .on_before(|frame| {
                    if frame.args[1] == Value::Int(0) {
                        frame.set_result(Value::Int(0));
                    }
                    Ok(())
                })
                .build(),
        )
        .context("hooking Math.div")?;

    interceptor
        .hook(
            &targets.greet,
            FnHook::new("shout")
                .on_after(|frame| {
                    if let Some(s) = frame.result().as_str() {
                        let loud = s.to_uppercase();
                        frame.set_result(Value::str(loud));
                    }
                    Ok(())
                })
                .build(),
        )
        .context("hooking Greeter.greet")?;

    interceptor
        .hook(
            &targets.nano_time,
            Arc::new(MethodReplacement::returning(Value::Long(0))),
        )
        .context("hooking System.nanoTime")?;

    println!("Installed:");
    for target in [&targets.div, &targets.greet, &targets.nano_time] {
        let mode = host
            .installed_mode(target)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        let callbacks = interceptor
            .descriptor(target.id())
            .map(|d| d.callbacks().len())
            .unwrap_or(0);
        println!(
            "  {:<40} {:<12} {} callback(s)",
            target.to_string(),
            mode,
            callbacks
        );
    }
    println!();

    println!("After interception:");
    show("Math.div(84, 2)", div(84, 2));
    show("Math.div(1, 0)", div(1, 0));
    show("Greeter.greet(\"world\")", greet("world"));
    show("System.nanoTime()", host.call(&targets.nano_time, None, vec![]));
    show(
        "original Greeter.greet",
        interceptor.invoke_original(
            &targets.greet,
            Some(receiver.clone()),
            vec![Value::str("world")],
        ),
    );
    println!();

    trace.unhook();
    println!("After removing the trace callback:");
    show("Math.div(84, 2)", div(84, 2));
    Ok(())
}
