//! The worker substrate the lock primitives park on.

mod builder;
mod config;
mod hooks;
mod parker;
mod registry;
mod worker;

pub use self::{
    builder::Builder,
    config::Config,
    hooks::{Hooks, NoHooks},
    registry::{Registry, WorkerId},
    worker::{ExecContext, TaskGuard, Worker},
};

pub(crate) use self::registry::Slot;

#[cfg(test)]
pub(crate) use self::hooks::testing;
