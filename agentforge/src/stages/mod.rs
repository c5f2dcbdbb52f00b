//! Stage trait and implementations.
//!
//! Stages are the units of work in an agentforge pipeline. A stage reads
//! its declared inputs from the [`StageContext`] and returns a
//! [`StageOutput`] carrying the single value for its output key.

mod invoker;
pub mod patterns;
mod result;

pub use invoker::{InvocationError, InvokerStage, OutputCheck, StageInvoker};
pub use result::StageRecord;

use crate::context::StageContext;
use crate::core::StageOutput;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The stage execution context
    ///
    /// # Returns
    ///
    /// The stage output indicating success, failure or cancellation.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    label: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("label", &self.label).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// The closure receives an owned clone of the context so the returned
/// future can be `'static`.
pub struct AsyncFnStage<F>
where
    F: Fn(StageContext) -> BoxFuture<'static, StageOutput> + Send + Sync,
{
    label: String,
    func: F,
}

impl<F> AsyncFnStage<F>
where
    F: Fn(StageContext) -> BoxFuture<'static, StageOutput> + Send + Sync,
{
    /// Creates a new async function-based stage.
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Debug for AsyncFnStage<F>
where
    F: Fn(StageContext) -> BoxFuture<'static, StageOutput> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("label", &self.label).finish()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: Fn(StageContext) -> BoxFuture<'static, StageOutput> + Send + Sync,
{
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        (self.func)(ctx.clone()).await
    }
}
