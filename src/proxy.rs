//! Proxy instances
//!
//! A `Proxy` is a cheap, cloneable handle to one instance of a synthesized
//! type. It holds the per-instance state: the target, the base
//! implementation of class proxies, the mixin instances and the expanded
//! interceptor chain of every intercepted member. Calls are dispatched
//! through the type's forwarders.

use crate::binding::{InterceptorFactory, Role};
use crate::definition::{MethodDefinition, ProxyKind};
use crate::descriptor::{MemberKey, TypeDescriptor};
use crate::error::{InterceptError, Result};
use crate::instance::{Call, Instance, Outcome};
use crate::interceptor::Interceptor;
use crate::invocation::Invocation;
use crate::options::ProxyOptions;
use crate::plan::CallbackIntent;
use crate::synth::{Forwarder, ProxyType};
use crate::value::{Handler, TypeRef, Value};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

struct ProxyInner {
    id: Uuid,
    ty: Arc<ProxyType>,
    target: Option<Arc<dyn Instance>>,
    base: Option<Arc<dyn Instance>>,
    mixins: Vec<Arc<dyn Instance>>,
    chains: HashMap<MemberKey, Arc<[Arc<dyn Interceptor>]>>,
}

/// Handle to a proxy instance
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    /// Instantiate `ty` with its per-instance state
    ///
    /// The base of a class proxy comes from `source`, the descriptor of
    /// this request, which may differ from the one `ty` was built from in
    /// its constructor only.
    pub(crate) fn instantiate(
        ty: &Arc<ProxyType>,
        source: &TypeDescriptor,
        factory: &InterceptorFactory,
        interceptors: &[Arc<dyn Interceptor>],
        target: Option<Arc<dyn Instance>>,
        options: &ProxyOptions,
    ) -> Result<Self> {
        let base = match ty.kind() {
            ProxyKind::Class => {
                let constructor = source
                    .constructor
                    .as_ref()
                    .ok_or_else(|| InterceptError::NoConstructor(source.full_name()))?;
                Some(constructor(options.args())?)
            }
            ProxyKind::ClassWithTarget | ProxyKind::Interface => {
                if target.is_none() {
                    return Err(InterceptError::Argument(format!(
                        "'{}' requires a target",
                        ty.name()
                    )));
                }
                None
            }
        };

        if options.mixins().len() != ty.mixins().len() {
            return Err(InterceptError::Argument(format!(
                "'{}' weaves {} mixin(s), {} supplied",
                ty.name(),
                ty.mixins().len(),
                options.mixins().len()
            )));
        }
        let mut mixins = Vec::with_capacity(ty.mixins().len());
        for (interface, mixin) in ty.mixins().iter().zip(options.mixins()) {
            if !mixin.instance.is_a(&interface.name) {
                return Err(InterceptError::TargetMismatch {
                    target: mixin.instance.type_name().to_string(),
                    required: interface.full_name(),
                });
            }
            mixins.push(Arc::clone(&mixin.instance));
        }

        let mut chains: HashMap<MemberKey, Arc<[Arc<dyn Interceptor>]>> = HashMap::new();
        for key in ty.keys() {
            let forwarder = ty.forwarder(key)?;
            if let Forwarder::Intercepted { method, .. } = forwarder.as_ref() {
                let chain = method.interceptors.expand(factory, interceptors)?;
                chains.insert(key.clone(), Arc::from(chain));
            }
        }

        let proxy = Self {
            inner: Arc::new(ProxyInner {
                id: Uuid::new_v4(),
                ty: Arc::clone(ty),
                target,
                base,
                mixins,
                chains,
            }),
        };
        tracing::trace!(proxy_type = %ty.name(), id = %proxy.id(), "Proxy instantiated");
        Ok(proxy)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The synthesized type this instance was built from
    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.inner.ty
    }

    pub fn target(&self) -> Option<&Arc<dyn Instance>> {
        self.inner.target.as_ref()
    }

    /// Base implementation of a class proxy
    pub fn base(&self) -> Option<&Arc<dyn Instance>> {
        self.inner.base.as_ref()
    }

    /// Is the proxy substitutable for `type_name`
    pub fn implements(&self, type_name: &str) -> bool {
        self.inner.ty.is_a(type_name)
    }

    /// Interceptor chain of an intercepted member on this instance
    pub fn chain(&self, key: &MemberKey) -> Option<&Arc<[Arc<dyn Interceptor>]>> {
        let forwarder = self.inner.ty.forwarder(key).ok()?;
        self.inner.chains.get(&forwarder.method().key)
    }

    pub(crate) fn instance_for(&self, callback: CallbackIntent) -> Result<&Arc<dyn Instance>> {
        let instance = match callback {
            CallbackIntent::Target => self.inner.target.as_ref(),
            CallbackIntent::Base => self.inner.base.as_ref(),
            CallbackIntent::Mixin(position) => self.inner.mixins.get(position),
        };
        instance.ok_or_else(|| {
            InterceptError::Argument(format!(
                "'{}' has no instance for {:?} callbacks",
                self.inner.ty.name(),
                callback
            ))
        })
    }

    // ─── Dispatch ───

    /// Synchronous call; by-ref slots in `args` receive written values
    pub fn invoke(
        &self,
        key: &MemberKey,
        generic_arguments: &[TypeRef],
        args: &mut [Value],
    ) -> Result<Value> {
        let key = &self.inner.ty.resolve(key, args)?.clone();
        let forwarder = Arc::clone(self.inner.ty.forwarder(key)?);
        let method = forwarder.method();
        check_generic_arity(method, generic_arguments)?;
        if method.is_awaitable() {
            return Err(InterceptError::Awaitable(key.to_string()));
        }

        let value = match forwarder.as_ref() {
            Forwarder::Transparent { callback, .. } => {
                let instance = self.instance_for(*callback)?;
                match instance.invoke(Call {
                    proxy: self,
                    member: key,
                    generic_arguments,
                    args: &mut *args,
                })? {
                    Outcome::Ready(value) => value,
                    Outcome::Pending(_) => {
                        return Err(InterceptError::ReturnType {
                            member: key.to_string(),
                            expected: method.return_type.to_string(),
                            actual: "pending".to_string(),
                        })
                    }
                }
            }
            Forwarder::Intercepted { callback, .. } | Forwarder::Restricted { callback, .. } => {
                let mut invocation = Invocation::new(
                    self.clone(),
                    Arc::clone(method),
                    *callback,
                    self.chain_for(&forwarder, key)?,
                    generic_arguments.to_vec(),
                    args.to_vec(),
                );
                invocation.proceed()?;

                let (parameters, value) = invocation.into_parts();
                for position in method.by_ref_positions() {
                    if let (Some(slot), Some(written)) = (args.get_mut(position), parameters.get(position)) {
                        *slot = written.clone();
                    }
                }
                value
            }
        };

        cast_return(method, generic_arguments, value)
    }

    /// Call of an awaitable member; resolves once the chain and the real
    /// call have completed
    pub fn invoke_async(
        &self,
        key: &MemberKey,
        generic_arguments: &[TypeRef],
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        let proxy = self.clone();
        let key = key.clone();
        let generic_arguments = generic_arguments.to_vec();
        Box::pin(async move { proxy.dispatch_async(key, generic_arguments, args).await })
    }

    async fn dispatch_async(
        &self,
        key: MemberKey,
        generic_arguments: Vec<TypeRef>,
        mut args: Vec<Value>,
    ) -> Result<Value> {
        let key = self.inner.ty.resolve(&key, &args)?.clone();
        let forwarder = Arc::clone(self.inner.ty.forwarder(&key)?);
        let method = Arc::clone(forwarder.method());
        check_generic_arity(&method, &generic_arguments)?;
        if !method.is_awaitable() {
            return Err(InterceptError::NotAwaitable(key.to_string()));
        }

        let value = match forwarder.as_ref() {
            Forwarder::Transparent { callback, .. } => {
                let outcome = self.instance_for(*callback)?.invoke(Call {
                    proxy: self,
                    member: &key,
                    generic_arguments: &generic_arguments,
                    args: &mut args,
                })?;
                match outcome {
                    Outcome::Ready(value) => value,
                    Outcome::Pending(future) => future.await?,
                }
            }
            Forwarder::Intercepted { callback, .. } | Forwarder::Restricted { callback, .. } => {
                let chain = self.chain_for(&forwarder, &key)?;
                Invocation::new(
                    self.clone(),
                    Arc::clone(&method),
                    *callback,
                    chain,
                    generic_arguments.clone(),
                    args,
                )
                .complete()
                .await?
            }
        };

        cast_return(&method, &generic_arguments, value)
    }

    fn chain_for(
        &self,
        forwarder: &Forwarder,
        key: &MemberKey,
    ) -> Result<Arc<[Arc<dyn Interceptor>]>> {
        match forwarder {
            Forwarder::Restricted { chain, .. } => Ok(Arc::clone(chain)),
            _ => self
                .inner
                .chains
                .get(key)
                .cloned()
                .ok_or_else(|| InterceptError::MemberNotFound {
                    type_name: self.inner.ty.name().to_string(),
                    member: key.to_string(),
                }),
        }
    }

    // ─── Convenience surface ───

    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let mut args = args;
        self.invoke(&MemberKey::method(method, args.len()), &[], &mut args)
    }

    /// Call with by-ref arguments written back into `args`
    pub fn call_ref(&self, method: &str, args: &mut [Value]) -> Result<Value> {
        self.invoke(&MemberKey::method(method, args.len()), &[], args)
    }

    /// Call a generic method, closing its placeholders over `generic_arguments`
    pub fn call_generic(
        &self,
        method: &str,
        generic_arguments: &[TypeRef],
        args: Vec<Value>,
    ) -> Result<Value> {
        let mut args = args;
        self.invoke(&MemberKey::method(method, args.len()), generic_arguments, &mut args)
    }

    pub fn call_async(&self, method: &str, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        self.invoke_async(&MemberKey::method(method, args.len()), &[], args)
    }

    pub fn get(&self, property: &str) -> Result<Value> {
        self.get_indexed(property, Vec::new())
    }

    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.set_indexed(property, Vec::new(), value)
    }

    pub fn get_indexed(&self, property: &str, index: Vec<Value>) -> Result<Value> {
        let mut args = index;
        self.invoke(&MemberKey::new(property, Role::Get, args.len()), &[], &mut args)
    }

    pub fn set_indexed(&self, property: &str, index: Vec<Value>, value: impl Into<Value>) -> Result<()> {
        let mut args = index;
        args.push(value.into());
        self.invoke(&MemberKey::new(property, Role::Set, args.len()), &[], &mut args)?;
        Ok(())
    }

    pub fn add_handler(&self, event: &str, handler: Handler) -> Result<()> {
        self.invoke(&MemberKey::new(event, Role::Add, 1), &[], &mut [Value::Handler(handler)])?;
        Ok(())
    }

    pub fn remove_handler(&self, event: &str, handler: &Handler) -> Result<()> {
        self.invoke(
            &MemberKey::new(event, Role::Remove, 1),
            &[],
            &mut [Value::Handler(handler.clone())],
        )?;
        Ok(())
    }
}

/// Proxies are instances too, so a proxy can be the target of another
impl Instance for Proxy {
    fn type_name(&self) -> &str {
        self.inner.ty.name()
    }

    fn is_a(&self, type_name: &str) -> bool {
        self.implements(type_name)
    }

    fn invoke(&self, call: Call<'_>) -> Result<Outcome> {
        let key = self.inner.ty.resolve(call.member, &*call.args)?;
        let awaitable = self.inner.ty.forwarder(key)?.method().is_awaitable();
        if awaitable {
            Ok(Outcome::Pending(self.invoke_async(
                call.member,
                call.generic_arguments,
                call.args.to_vec(),
            )))
        } else {
            Proxy::invoke(self, call.member, call.generic_arguments, call.args).map(Outcome::Ready)
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.inner.id)
            .field("type", &self.inner.ty.name())
            .field(
                "target",
                &self.inner.target.as_ref().map(|t| t.type_name().to_string()),
            )
            .field("mixins", &self.inner.mixins.len())
            .finish()
    }
}

fn check_generic_arity(method: &MethodDefinition, generic_arguments: &[TypeRef]) -> Result<()> {
    if method.generic_parameters.len() != generic_arguments.len() {
        return Err(InterceptError::GenericArity {
            member: method.key.to_string(),
            expected: method.generic_parameters.len(),
            actual: generic_arguments.len(),
        });
    }
    Ok(())
}

/// Cast a captured return value to the member's declared type
fn cast_return(method: &MethodDefinition, generic_arguments: &[TypeRef], value: Value) -> Result<Value> {
    let bindings: HashMap<String, TypeRef> = method
        .generic_parameters
        .iter()
        .cloned()
        .zip(generic_arguments.iter().cloned())
        .collect();
    let declared = method.return_type.awaited().bind(&bindings);

    if declared.is_void() {
        return Ok(Value::Unit);
    }
    if value.is_unit() {
        return Ok(declared.default_value());
    }
    let actual = value.kind();
    declared.cast(value).ok_or_else(|| InterceptError::ReturnType {
        member: method.key.to_string(),
        expected: declared.to_string(),
        actual: actual.to_string(),
    })
}
