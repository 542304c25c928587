//! Tendril Core - method interception engine
//!
//! Keeps one [`HookDescriptor`] per intercepted target and runs every
//! redirected call through the attached callbacks:
//!
//! - **Registry**: at most one installation per target, even under races
//! - **Installer**: validation, static resolution, mode selection
//! - **Dispatch**: before callbacks, the original, after callbacks in
//!   reverse, with each callback contained
//!
//! The physical redirection is delegated to a [`tendril_sdk::Redirector`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod callback;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod global;
pub mod installer;
pub mod interceptor;
pub mod mode;
pub mod registry;
pub mod unhook;

pub use bridge::{bridge_for, bridge_for_kind, Bridge};
pub use callback::{
    CallbackError, CallbackResult, FnHook, HookListener, MethodHook, MethodReplacement,
};
pub use config::{ConfigError, HookConfig, LiveConfig};
pub use descriptor::{CallbackSet, CallbackSnapshot, HookDescriptor};
pub use error::{HookError, HookResult};
pub use frame::CallFrame;
pub use global::{global, init};
pub use interceptor::Interceptor;
pub use mode::{select_mode, HookMode, IllegalHookMode};
pub use registry::DescriptorRegistry;
pub use unhook::Unhook;

pub use tendril_sdk::{InstallMode, Target, TargetId, Throwable, Value};
