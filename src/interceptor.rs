//! Interceptor contract and built-in interceptors

use crate::error::{InterceptError, Result};
use crate::invocation::Invocation;
use crate::value::Value;
use std::sync::Arc;

/// Capability invoked around a member call
///
/// Call `invocation.proceed()` to continue the chain. Parameters may be
/// read or mutated before proceeding, the return value after. Returning
/// without proceeding short-circuits the real call.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, invocation: &mut Invocation) -> Result<()>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut Invocation) -> Result<()> + Send + Sync,
{
    fn intercept(&self, invocation: &mut Invocation) -> Result<()> {
        self(invocation)
    }
}

/// Enter/exit/exception hooks around a call
///
/// Wrap in `Lifecycle` to use as an interceptor. For awaitable members
/// `on_exit` and `on_exception` run when the awaitable completes.
pub trait LifecycleInterceptor: Send + Sync + 'static {
    fn on_enter(&self, _invocation: &mut Invocation) -> Result<()> {
        Ok(())
    }

    fn on_exit(&self, _member: &str, _return_value: &Value) {}

    fn on_exception(&self, _member: &str, _error: &InterceptError) {}
}

/// Adapts a `LifecycleInterceptor` into an `Interceptor`
pub struct Lifecycle<T>(Arc<T>);

impl<T: LifecycleInterceptor> Lifecycle<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn shared(inner: Arc<T>) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &Arc<T> {
        &self.0
    }
}

impl<T: LifecycleInterceptor> Interceptor for Lifecycle<T> {
    fn intercept(&self, invocation: &mut Invocation) -> Result<()> {
        let member = invocation.member_name().to_string();
        let result = self
            .0
            .on_enter(invocation)
            .and_then(|()| invocation.proceed());

        match result {
            Err(e) => {
                self.0.on_exception(&member, &e);
                Err(e)
            }
            Ok(()) if invocation.is_awaitable() => {
                let inner = Arc::clone(&self.0);
                invocation
                    .awaitable_context()?
                    .on_completed(move |outcome| match outcome {
                        Ok(value) => inner.on_exit(&member, value),
                        Err(e) => inner.on_exception(&member, e),
                    });
                Ok(())
            }
            Ok(()) => {
                self.0.on_exit(&member, invocation.return_value());
                Ok(())
            }
        }
    }
}

/// Notification interceptor for clean property setters
///
/// Skips the set when the new value equals the current one. Otherwise
/// performs the set and then calls `notify_member` on the proxy with the
/// property name, exactly once.
#[derive(Debug, Clone)]
pub struct NotifyPropertyChanged {
    notify_member: String,
}

impl NotifyPropertyChanged {
    pub fn new(notify_member: impl Into<String>) -> Self {
        Self {
            notify_member: notify_member.into(),
        }
    }

    pub fn notify_member(&self) -> &str {
        &self.notify_member
    }
}

impl Interceptor for NotifyPropertyChanged {
    fn intercept(&self, invocation: &mut Invocation) -> Result<()> {
        let property = invocation.member_name().to_string();
        let Some((value, index)) = invocation.parameters().split_last() else {
            return Err(InterceptError::Argument(format!(
                "Setter for '{}' called without a value",
                property
            )));
        };

        let current = invocation.proxy().get_indexed(&property, index.to_vec())?;
        if current == *value {
            tracing::trace!(property = %property, "Redundant set suppressed");
            return Ok(());
        }

        invocation.proceed()?;
        invocation
            .proxy()
            .call(&self.notify_member, vec![Value::from(property)])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_interceptor<T: Interceptor>(_: &T) {}

    #[test]
    fn test_closures_are_interceptors() {
        let closure = |invocation: &mut Invocation| invocation.proceed();
        assert_interceptor(&closure);
        let _: Arc<dyn Interceptor> = Arc::new(closure);
    }

    #[test]
    fn test_lifecycle_defaults() {
        struct Quiet;
        impl LifecycleInterceptor for Quiet {}

        let lifecycle = Lifecycle::new(Quiet);
        assert_interceptor(&lifecycle);
        lifecycle.inner().on_exit("Run", &Value::Unit);
        lifecycle.inner().on_exception("Run", &InterceptError::custom("boom"));
    }

    #[test]
    fn test_notify_member_name() {
        assert_eq!(NotifyPropertyChanged::new("Notify").notify_member(), "Notify");
    }
}
