//! Tendril Host - in-process reference runtime
//!
//! A small runtime whose methods are Rust closures and whose every call
//! goes through one method table. It implements [`tendril_sdk::Redirector`]
//! so the interception engine can be driven end to end without a real
//! virtual machine underneath:
//!
//! - static methods stay unresolved until their first call
//! - compilation, decompilation and JIT switches are tracked per method
//! - inline installs can be downgraded, and installs can be made to fail,
//!   through [`SlotOptions`]

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod runtime;
pub mod slot;

pub use runtime::HostRuntime;
pub use slot::{Alloc, Body, SlotOptions};
