// src/core/handler.rs

use crate::core::control::StepControl;
use crate::core::ctx::Ctx;
use std::future::Future;
use std::pin::Pin;

/// A boxed async hook attached to a step.
///
/// The hook owns a clone of the flow's [`Ctx`] and resolves to
/// `Result<StepControl, Err>`. Hooks must release their lock guards before
/// awaiting.
pub type Hook<TData, Err> =
  Box<dyn Fn(Ctx<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync>;

/// Wraps a user closure whose error converts into the flow's error type.
pub(crate) fn boxed_hook<TData, Err, F, UserErr>(
  hook_fn: impl Fn(Ctx<TData>) -> F + Send + Sync + 'static,
) -> Hook<TData, Err>
where
  TData: Send + Sync + 'static,
  Err: 'static,
  F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
  UserErr: Into<Err> + 'static,
{
  Box::new(move |ctx| {
    let fut = hook_fn(ctx);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}
