//! Tendril SDK - boundary types for method interception
//!
//! This crate holds the types shared between the interception engine
//! (`tendril-core`) and the backends that physically redirect calls:
//! values, target metadata, failures, and the [`Redirector`] capability.
//! A backend can be written against this crate alone.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod redirect;
pub mod target;
pub mod value;

pub use error::{InvokeError, Throwable};
pub use redirect::{
    Backup, Entry, InstallMode, InstallRequest, Installed, InvokeResult, RedirectError, Redirector,
};
pub use target::{DeclaringType, Member, MemberKind, Modifiers, Target, TargetId, TypeKind};
pub use value::{ObjectRef, Value};
