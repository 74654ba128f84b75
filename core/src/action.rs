//! Action trait and closure adapters.
//!
//! RULE: the clock never looks inside an action. It stores it, lends it
//! the scope it was scheduled with, and calls `execute` at the right time.

use crate::clock::Clock;
use std::marker::PhantomData;

/// The contract every scheduled or sampled action must fulfil.
pub trait Action<S> {
    /// Stable label used in traces and error reports.
    fn label(&self) -> &str {
        "action"
    }

    /// Called by the clock when the action is due.
    ///
    /// - `clock`: the running clock; the action may schedule further
    ///   events, register samples or stop the clock.
    /// - `scope`: the evaluation context the action was scheduled with.
    fn execute(&mut self, clock: &mut Clock<S>, scope: &S) -> anyhow::Result<()>;
}

/// A closure adapted to `Action`.
pub struct FnAction<S, F> {
    label: String,
    f:      F,
    _scope: PhantomData<fn(&S)>,
}

impl<S, F> Action<S> for FnAction<S, F>
where
    F: FnMut(&mut Clock<S>, &S) -> anyhow::Result<()>,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn execute(&mut self, clock: &mut Clock<S>, scope: &S) -> anyhow::Result<()> {
        (self.f)(clock, scope)
    }
}

/// Wrap a closure as an anonymous action.
pub fn action<S, F>(f: F) -> FnAction<S, F>
where
    F: FnMut(&mut Clock<S>, &S) -> anyhow::Result<()>,
{
    named("action", f)
}

/// Wrap a closure as an action with a label.
pub fn named<S, F>(label: impl Into<String>, f: F) -> FnAction<S, F>
where
    F: FnMut(&mut Clock<S>, &S) -> anyhow::Result<()>,
{
    FnAction { label: label.into(), f, _scope: PhantomData }
}
