//! Real implementations behind a proxy
//!
//! Targets, base implementations and mixins all implement `Instance`.
//! The synthesized callback at the end of every interceptor chain lands in
//! `Instance::invoke`.

use crate::binding::Role;
use crate::descriptor::MemberKey;
use crate::error::{InterceptError, Result};
use crate::proxy::Proxy;
use crate::value::{Handler, TypeRef, Value};
use futures::future::BoxFuture;
use std::sync::RwLock;

/// A call routed to a real implementation
pub struct Call<'a> {
    /// Proxy the call entered through; calls made on it are intercepted
    pub proxy: &'a Proxy,
    pub member: &'a MemberKey,
    pub generic_arguments: &'a [TypeRef],
    /// Boxed arguments; writes to by-ref slots reach the caller
    pub args: &'a mut [Value],
}

impl Call<'_> {
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| InterceptError::Arity {
            member: self.member.to_string(),
            expected: index + 1,
            actual: self.args.len(),
        })
    }

    pub fn set_arg(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.args.len();
        let slot = self.args.get_mut(index).ok_or_else(|| InterceptError::Arity {
            member: self.member.to_string(),
            expected: index + 1,
            actual: len,
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Error for a member the implementation does not provide
    pub fn unsupported(&self, type_name: &str) -> InterceptError {
        InterceptError::MemberNotFound {
            type_name: type_name.to_string(),
            member: self.member.to_string(),
        }
    }
}

/// Result of a real call
pub enum Outcome {
    Ready(Value),
    /// Awaitable result of an asynchronous member
    Pending(BoxFuture<'static, Result<Value>>),
}

impl Outcome {
    pub fn ready(value: impl Into<Value>) -> Self {
        Outcome::Ready(value.into())
    }

    pub fn unit() -> Self {
        Outcome::Ready(Value::Unit)
    }

    pub fn pending(
        future: impl std::future::Future<Output = Result<Value>> + Send + 'static,
    ) -> Self {
        Outcome::Pending(Box::pin(future))
    }
}

/// A real implementation: proxy target, class base, or mixin
pub trait Instance: Send + Sync {
    /// Name of the concrete type
    fn type_name(&self) -> &str;

    /// Is this instance of `type_name` or does it implement it
    fn is_a(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    /// Perform the call
    fn invoke(&self, call: Call<'_>) -> Result<Outcome>;
}

/// Backing delegate storage for an event
#[derive(Default)]
pub struct HandlerList {
    handlers: RwLock<Vec<Handler>>,
}

impl HandlerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: Handler) -> Result<()> {
        let mut handlers = self.handlers.write().map_err(|e| {
            InterceptError::custom(format!("Handler list lock poisoned: {}", e))
        })?;
        handlers.push(handler);
        Ok(())
    }

    /// Remove the most recently added occurrence of `handler`
    pub fn remove(&self, handler: &Handler) -> Result<bool> {
        let mut handlers = self.handlers.write().map_err(|e| {
            InterceptError::custom(format!("Handler list lock poisoned: {}", e))
        })?;
        match handlers.iter().rposition(|h| h == handler) {
            Some(pos) => {
                handlers.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Invoke every subscribed handler, returning how many ran
    pub fn raise(&self, args: &[Value]) -> Result<usize> {
        // Snapshot so handlers may subscribe/unsubscribe while running
        let handlers = self
            .handlers
            .read()
            .map_err(|e| InterceptError::custom(format!("Handler list lock poisoned: {}", e)))?
            .clone();
        for handler in &handlers {
            handler.invoke(args);
        }
        Ok(handlers.len())
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply an add/remove accessor call with the handler in argument 0
    pub fn apply(&self, call: &Call<'_>) -> Result<Outcome> {
        let handler = call
            .arg(0)?
            .as_handler()
            .cloned()
            .ok_or_else(|| InterceptError::Argument(format!(
                "'{}' expects a handler argument",
                call.member
            )))?;
        match call.member.role {
            Role::Add => self.add(handler)?,
            Role::Remove => {
                self.remove(&handler)?;
            }
            _ => {
                return Err(InterceptError::Argument(format!(
                    "'{}' is not an event accessor",
                    call.member
                )))
            }
        }
        Ok(Outcome::unit())
    }
}
