//! Per-call invocation context
//!
//! An `Invocation` is created by a forwarder for every intercepted call and
//! discarded once the call returns. It carries the boxed parameters, the
//! interceptor cursor and the return value slot.
//!
//! `proceed()` runs the interceptor at the cursor; when the cursor is past
//! the last interceptor it runs the callback against the real instance. An
//! interceptor that never calls `proceed()` ends the chain and leaves the
//! return value at its default. The cursor is restored when an interceptor
//! returns, so an interceptor may call `proceed()` more than once.
//!
//! For awaitable members `awaitable_context()` exposes the asynchronous
//! adapter: an interceptor can defer the rest of the chain until a future
//! completes, and register hooks that observe the final result.

use crate::definition::MethodDefinition;
use crate::descriptor::MemberKey;
use crate::error::{InterceptError, Result};
use crate::instance::{Call, Instance, Outcome};
use crate::interceptor::Interceptor;
use crate::plan::CallbackIntent;
use crate::proxy::Proxy;
use crate::value::{TypeRef, Value};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Observes the final result of an awaitable invocation
pub type CompletionHook = Box<dyn FnOnce(std::result::Result<&Value, &InterceptError>) + Send>;

/// Lifecycle of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Created,
    Running,
    Completed,
    Faulted,
}

struct Deferral {
    resume_at: usize,
    future: BoxFuture<'static, Result<()>>,
}

/// Context of one intercepted call
pub struct Invocation {
    proxy: Proxy,
    target: Option<Arc<dyn Instance>>,
    method: Arc<MethodDefinition>,
    callback: CallbackIntent,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    generic_arguments: Vec<TypeRef>,
    parameters: Vec<Value>,
    cursor: usize,
    depth: usize,
    return_value: Value,
    pending: Option<BoxFuture<'static, Result<Value>>>,
    deferral: Option<Deferral>,
    hooks: Vec<CompletionHook>,
    state: InvocationState,
}

impl Invocation {
    pub(crate) fn new(
        proxy: Proxy,
        method: Arc<MethodDefinition>,
        callback: CallbackIntent,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        generic_arguments: Vec<TypeRef>,
        parameters: Vec<Value>,
    ) -> Self {
        let target = proxy.target().cloned();
        Self {
            proxy,
            target,
            method,
            callback,
            interceptors,
            generic_arguments,
            parameters,
            cursor: 0,
            depth: 0,
            return_value: Value::Unit,
            pending: None,
            deferral: None,
            hooks: Vec::new(),
            state: InvocationState::Created,
        }
    }

    /// Proxy the call entered through
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Target instance; `None` for class proxies without a target
    pub fn target(&self) -> Option<&Arc<dyn Instance>> {
        self.target.as_ref()
    }

    /// Accessor method of the proxy the call came through (`set_Title`)
    pub fn method(&self) -> &MethodDefinition {
        &self.method
    }

    /// Property or event owning the accessor; `None` for plain methods
    pub fn owner(&self) -> Option<&str> {
        self.method.owner.as_deref()
    }

    pub fn key(&self) -> &MemberKey {
        &self.method.key
    }

    /// Property, event or method name the call belongs to
    pub fn member_name(&self) -> &str {
        self.method.member_name()
    }

    pub fn generic_arguments(&self) -> &[TypeRef] {
        &self.generic_arguments
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut [Value] {
        &mut self.parameters
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)
    }

    pub fn set_argument(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.parameters.len();
        let slot = self.parameters.get_mut(index).ok_or_else(|| InterceptError::Arity {
            member: self.method.key.to_string(),
            expected: index + 1,
            actual: len,
        })?;
        *slot = value.into();
        Ok(())
    }

    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    pub fn set_return_value(&mut self, value: impl Into<Value>) {
        self.return_value = value.into();
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Position of the next interceptor to run
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_awaitable(&self) -> bool {
        self.method.is_awaitable()
    }

    /// Asynchronous adapter; only available on awaitable members
    pub fn awaitable_context(&mut self) -> Result<AwaitableContext<'_>> {
        if !self.is_awaitable() {
            return Err(InterceptError::NotAwaitable(self.method.key.to_string()));
        }
        Ok(AwaitableContext { invocation: self })
    }

    /// Continue with the next interceptor, or the real call at the end
    pub fn proceed(&mut self) -> Result<()> {
        if self.state == InvocationState::Created {
            self.state = InvocationState::Running;
        }

        self.depth += 1;
        let result = self.step();
        self.depth -= 1;

        if self.depth == 0 {
            self.state = if result.is_ok() {
                InvocationState::Completed
            } else {
                InvocationState::Faulted
            };
        }
        result
    }

    fn step(&mut self) -> Result<()> {
        let index = self.cursor;
        match self.interceptors.get(index).cloned() {
            Some(interceptor) => {
                tracing::trace!(member = %self.method.key, index, "Invoking interceptor");
                self.cursor = index + 1;
                let result = interceptor.intercept(self);
                self.cursor = index;
                result
            }
            None => self.invoke_callback(),
        }
    }

    fn invoke_callback(&mut self) -> Result<()> {
        tracing::trace!(member = %self.method.key, callback = ?self.callback, "Invoking callback");
        let instance = Arc::clone(self.proxy.instance_for(self.callback)?);
        let outcome = instance.invoke(Call {
            proxy: &self.proxy,
            member: &self.method.key,
            generic_arguments: &self.generic_arguments,
            args: &mut self.parameters,
        })?;

        match outcome {
            Outcome::Ready(value) => {
                self.return_value = value;
                self.pending = None;
            }
            Outcome::Pending(future) if self.is_awaitable() => {
                self.return_value = Value::Unit;
                self.pending = Some(future);
            }
            Outcome::Pending(_) => {
                return Err(InterceptError::ReturnType {
                    member: self.method.key.to_string(),
                    expected: self.method.return_type.to_string(),
                    actual: "pending".to_string(),
                })
            }
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Value) {
        (self.parameters, self.return_value)
    }

    /// Drive an awaitable invocation to its final value
    pub(crate) async fn complete(mut self) -> Result<Value> {
        let result = self.drive().await;
        if result.is_err() {
            self.state = InvocationState::Faulted;
        }
        for hook in std::mem::take(&mut self.hooks) {
            hook(result.as_ref());
        }
        result
    }

    async fn drive(&mut self) -> Result<Value> {
        self.proceed()?;

        while let Some(deferral) = self.deferral.take() {
            tracing::trace!(
                member = %self.method.key,
                resume_at = deferral.resume_at,
                "Awaiting deferred step"
            );
            deferral.future.await?;
            self.cursor = deferral.resume_at;
            self.proceed()?;
        }

        match self.pending.take() {
            Some(future) => future.await,
            None => Ok(std::mem::take(&mut self.return_value)),
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("proxy", &self.proxy.proxy_type().name())
            .field("member", &self.method.key)
            .field("parameters", &self.parameters)
            .field("cursor", &self.cursor)
            .field("interceptors", &self.interceptors.len())
            .field("return_value", &self.return_value)
            .field("state", &self.state)
            .finish()
    }
}

/// Asynchronous adapter over an awaitable invocation
pub struct AwaitableContext<'a> {
    invocation: &'a mut Invocation,
}

impl AwaitableContext<'_> {
    /// Resume the rest of the chain once `step` completes
    ///
    /// Used instead of `proceed()`. The caller's awaitable completes only
    /// after `step` and then the real call have both completed.
    pub fn proceed_after(
        self,
        step: impl Future<Output = Result<()>> + Send + 'static,
    ) -> Result<()> {
        if self.invocation.deferral.is_some() {
            return Err(InterceptError::custom(format!(
                "'{}' already has a deferred step",
                self.invocation.method.key
            )));
        }
        self.invocation.deferral = Some(Deferral {
            resume_at: self.invocation.cursor,
            future: Box::pin(step),
        });
        Ok(())
    }

    /// Observe the final value or error of the call
    pub fn on_completed(
        self,
        hook: impl FnOnce(std::result::Result<&Value, &InterceptError>) + Send + 'static,
    ) {
        self.invocation.hooks.push(Box::new(hook));
    }

    /// Replace the pending result of the real call
    pub fn map_pending(
        self,
        f: impl FnOnce(BoxFuture<'static, Result<Value>>) -> BoxFuture<'static, Result<Value>>,
    ) {
        if let Some(pending) = self.invocation.pending.take() {
            self.invocation.pending = Some(f(pending));
        }
    }
}
