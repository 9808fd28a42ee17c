//! Forwarding implementations
//!
//! A forwarder is the synthesized body of one accessor. It is immutable and
//! shared by every proxy instance of a type; per-instance state (chains,
//! target, base, mixins) lives on the proxy.

use crate::binding::InterceptorFactory;
use crate::definition::MethodDefinition;
use crate::error::{InterceptError, Result};
use crate::interceptor::Interceptor;
use crate::plan::CallbackIntent;
use std::fmt;
use std::sync::Arc;

/// Synthesized body of one accessor
pub enum Forwarder {
    /// Full pipeline: an invocation over the instance's resolved chain
    Intercepted {
        method: Arc<MethodDefinition>,
        callback: CallbackIntent,
    },
    /// Direct call-through without an invocation
    Transparent {
        method: Arc<MethodDefinition>,
        callback: CallbackIntent,
    },
    /// Invocation over a fixed chain shared by all instances
    Restricted {
        method: Arc<MethodDefinition>,
        callback: CallbackIntent,
        chain: Arc<[Arc<dyn Interceptor>]>,
    },
}

impl Forwarder {
    /// Standard forwarder for an accessor
    pub fn pipeline(
        method: &MethodDefinition,
        callback: CallbackIntent,
        factory: &InterceptorFactory,
    ) -> Result<Self> {
        check_signature(method)?;
        let method = Arc::new(method.clone());

        if !method.is_interceptable {
            return Ok(Forwarder::Transparent { method, callback });
        }

        if let Some(missing) = method
            .interceptors
            .declared()
            .find(|d| !factory.contains(&d.provider))
        {
            return Err(InterceptError::UnknownProvider(missing.provider.clone()));
        }
        Ok(Forwarder::Intercepted { method, callback })
    }

    /// Pipeline bypass: call through with no interceptors
    pub fn transparent(method: &MethodDefinition, callback: CallbackIntent) -> Result<Self> {
        check_signature(method)?;
        Ok(Forwarder::Transparent {
            method: Arc::new(method.clone()),
            callback,
        })
    }

    /// Restricted pipeline around a fixed set of interceptors
    pub fn restricted(
        method: &MethodDefinition,
        callback: CallbackIntent,
        chain: Vec<Arc<dyn Interceptor>>,
    ) -> Result<Self> {
        check_signature(method)?;
        Ok(Forwarder::Restricted {
            method: Arc::new(method.clone()),
            callback,
            chain: Arc::from(chain),
        })
    }

    pub fn method(&self) -> &Arc<MethodDefinition> {
        match self {
            Forwarder::Intercepted { method, .. }
            | Forwarder::Transparent { method, .. }
            | Forwarder::Restricted { method, .. } => method,
        }
    }

    pub fn callback(&self) -> CallbackIntent {
        match self {
            Forwarder::Intercepted { callback, .. }
            | Forwarder::Transparent { callback, .. }
            | Forwarder::Restricted { callback, .. } => *callback,
        }
    }

    pub fn is_intercepted(&self) -> bool {
        matches!(self, Forwarder::Intercepted { .. })
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, Forwarder::Transparent { .. })
    }
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Forwarder::Intercepted { .. } => "Intercepted",
            Forwarder::Transparent { .. } => "Transparent",
            Forwarder::Restricted { .. } => "Restricted",
        };
        f.debug_struct(kind)
            .field("member", &self.method().key)
            .field("callback", &self.callback())
            .finish()
    }
}

fn check_signature(method: &MethodDefinition) -> Result<()> {
    if method.is_awaitable() && method.has_by_ref() {
        return Err(InterceptError::Synthesis {
            type_name: method.declaring_type.clone(),
            reason: format!(
                "awaitable member '{}' cannot take by-ref parameters",
                method.name
            ),
        });
    }
    Ok(())
}
