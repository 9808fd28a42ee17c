//! Proxy generator — the public entry point
//!
//! `ProxyGenerator` composes reflection, selection, resolution, plan
//! assembly and synthesis, caches definitions and synthesized types per
//! (proxy type name, options fingerprint), instantiates proxies and
//! broadcasts a `TypeCreated` notification for every proxy it creates.

use crate::binding::InterceptorFactory;
use crate::definition::{ProxyKind, TypeDefinition};
use crate::descriptor::TypeDescriptor;
use crate::error::{InterceptError, Result};
use crate::instance::Instance;
use crate::interceptor::Interceptor;
use crate::options::ProxyOptions;
use crate::plan::BuildPlan;
use crate::proxy::Proxy;
use crate::registry::{RegistryKey, TypeRegistry};
use crate::resolver::InterceptorResolver;
use crate::synth::{DispatchBackend, ProxyBackend, ProxyType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Notification raised for every created proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCreated {
    /// Source class or interface
    pub source_type: String,
    pub kind: ProxyKind,
    /// Synthesized proxy type
    pub proxy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    /// Fingerprint of the options the type was built with
    pub fingerprint: String,
    /// Whether this creation synthesized the type
    pub synthesized: bool,
}

/// Builds and caches proxy types and creates proxy instances
///
/// Thread-safe; share one generator behind an `Arc` so every caller sees
/// the same cache.
pub struct ProxyGenerator {
    backend: Box<dyn ProxyBackend>,
    factory: InterceptorFactory,
    definitions: TypeRegistry<TypeDefinition>,
    types: TypeRegistry<ProxyType>,
    event_tx: broadcast::Sender<TypeCreated>,
}

impl ProxyGenerator {
    /// Create a generator using the in-process dispatch backend
    pub fn new(factory: InterceptorFactory) -> Self {
        Self::with_backend(DispatchBackend::new(), factory)
    }

    /// Create a generator using a custom synthesis backend
    pub fn with_backend(backend: impl ProxyBackend + 'static, factory: InterceptorFactory) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            backend: Box::new(backend),
            factory,
            definitions: TypeRegistry::new(),
            types: TypeRegistry::new(),
            event_tx,
        }
    }

    /// Subscribe to type creation notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TypeCreated> {
        self.event_tx.subscribe()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn factory(&self) -> &InterceptorFactory {
        &self.factory
    }

    /// Number of synthesized types in the cache
    pub fn cached_types(&self) -> usize {
        self.types.len()
    }

    /// Proxy of a class whose calls land on its base implementation
    pub fn create_class_proxy(
        &self,
        ty: &Arc<TypeDescriptor>,
        options: &ProxyOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy> {
        if ty.is_interface() {
            return Err(InterceptError::InvalidShape {
                type_name: ty.full_name(),
                reason: "class proxies require a class; use an interface proxy".to_string(),
            });
        }
        self.create(ty, None, options, interceptors)
    }

    /// Proxy of a class whose calls land on `target`
    pub fn create_class_proxy_with_target(
        &self,
        ty: &Arc<TypeDescriptor>,
        target: Arc<dyn Instance>,
        options: &ProxyOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy> {
        if ty.is_interface() {
            return Err(InterceptError::InvalidShape {
                type_name: ty.full_name(),
                reason: "class proxies require a class; use an interface proxy".to_string(),
            });
        }
        self.create(ty, Some(target), options, interceptors)
    }

    /// Proxy implementing `ty` whose calls land on `target`
    pub fn create_interface_proxy_with_target(
        &self,
        ty: &Arc<TypeDescriptor>,
        target: Arc<dyn Instance>,
        options: &ProxyOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy> {
        if !ty.is_interface() {
            return Err(InterceptError::InvalidShape {
                type_name: ty.full_name(),
                reason: "interface proxies require an interface".to_string(),
            });
        }
        self.create(ty, Some(target), options, interceptors)
    }

    /// Synthesized type for a request, building it on first use
    pub fn proxy_type(
        &self,
        ty: &Arc<TypeDescriptor>,
        kind: ProxyKind,
        options: &ProxyOptions,
    ) -> Result<(Arc<ProxyType>, bool)> {
        let key = RegistryKey::new(kind.proxy_name(ty), options.fingerprint())
            .with_shape(ty.fingerprint());

        self.types.get_or_add(key.clone(), || {
            let (definition, _) = self.definitions.get_or_add(key, || {
                let mut definition =
                    TypeDefinition::reflect(ty, kind, options.selector().as_ref())?;
                InterceptorResolver::new(options.order()).resolve_definition(&mut definition)?;
                Ok(definition)
            })?;

            let plan = BuildPlan::assemble(&definition, options)?;
            tracing::debug!(
                type_name = %plan.full_name,
                members = plan.members.len(),
                interceptable = plan.interceptable_count(),
                backend = self.backend.name(),
                "Synthesizing proxy type"
            );
            let proxy_type = self.backend.synthesize(&plan, &self.factory)?;
            tracing::info!(
                type_name = %proxy_type.name(),
                forwarders = proxy_type.len(),
                "Proxy type created"
            );
            Ok(proxy_type)
        })
    }

    fn create(
        &self,
        ty: &Arc<TypeDescriptor>,
        target: Option<Arc<dyn Instance>>,
        options: &ProxyOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy> {
        let kind = ProxyKind::classify(ty, target.as_deref())?;
        let (proxy_type, synthesized) = self.proxy_type(ty, kind, options)?;
        let target_type = target.as_ref().map(|t| t.type_name().to_string());

        let proxy = Proxy::instantiate(&proxy_type, ty, &self.factory, interceptors, target, options)
            .map_err(|e| {
                tracing::warn!(
                    type_name = %proxy_type.name(),
                    error = %e,
                    "Proxy instantiation failed"
                );
                InterceptError::Construction {
                    type_name: proxy_type.name().to_string(),
                    source: Box::new(e),
                }
            })?;

        let _ = self.event_tx.send(TypeCreated {
            source_type: ty.full_name(),
            kind,
            proxy_type: proxy_type.name().to_string(),
            target_type,
            fingerprint: proxy_type.fingerprint().to_string(),
            synthesized,
        });

        Ok(proxy)
    }
}

impl std::fmt::Debug for ProxyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyGenerator")
            .field("backend", &self.backend.name())
            .field("factory", &self.factory)
            .field("types", &self.types)
            .finish()
    }
}
