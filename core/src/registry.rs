// src/registry.rs

//! `FlowRegistry<E>`: runs the flow registered for a context type.
//!
//! Flows are keyed by the `TypeId` of their root context, so each context type
//! has at most one flow. The registry returns the application error type `E`.

use crate::core::control::FlowOutcome;
use crate::core::ctx::Ctx;
use crate::error::FlowError;
use crate::flow::Flow;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  /// `ctx` must hold a `Ctx<TData>` for the wrapped flow's `TData`.
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr>;
}

struct FlowRunner<TData, HookErr, AppErr>
where
  TData: 'static + Send + Sync,
  HookErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: Arc<Flow<TData, HookErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, HookErr, AppErr> ErasedRunner<AppErr> for FlowRunner<TData, HookErr, AppErr>
where
  TData: 'static + Send + Sync,
  HookErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HookErr> + From<FlowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr> {
    let typed = match ctx.downcast::<Ctx<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<Ctx<TData>>().to_string();
        event!(Level::ERROR, %expected_type, "registry received a context of the wrong type");
        return Err(AppErr::from(FlowError::TypeMismatch {
          step_name: "registry_dispatch".to_string(),
          expected_type,
        }));
      }
    };
    self.flow.run(typed).await.map_err(AppErr::from)
  }
}

/// Type-keyed collection of flows sharing one application error type.
pub struct FlowRegistry<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Default for FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `flow` for its context type, replacing any previous one.
  pub fn register<TData, HookErr>(&self, flow: Flow<TData, HookErr>)
  where
    TData: 'static + Send + Sync,
    HookErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<HookErr>,
  {
    event!(Level::DEBUG, ctx_type = %std::any::type_name::<TData>(), steps = ?flow.step_names(), "registering flow");
    let runner = FlowRunner::<TData, HookErr, AppErr> {
      flow: Arc::new(flow),
      _app_err: PhantomData,
    };
    self.flows.write().insert(TypeId::of::<TData>(), Arc::new(runner));
  }

  pub fn is_registered<TData: 'static + Send + Sync>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<TData>())
  }

  /// Runs the flow registered for `TData`.
  #[instrument(name = "FlowRegistry::run", skip_all, fields(ctx_type = %std::any::type_name::<TData>()))]
  pub async fn run<TData>(&self, ctx: Ctx<TData>) -> Result<FlowOutcome, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = self.flows.read().get(&TypeId::of::<TData>()).cloned().ok_or_else(|| {
      let type_name = std::any::type_name::<TData>().to_string();
      event!(Level::ERROR, %type_name, "no flow registered");
      AppErr::from(FlowError::FlowNotRegistered { type_name })
    })?;
    runner.run_erased(Box::new(ctx)).await
  }
}
