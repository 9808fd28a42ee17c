//! Declarative interceptor bindings
//!
//! An `InterceptorManifest` maps members and roles to ordered lists of
//! interceptor providers. Manifests are plain data and load from JSON, so
//! bindings can live next to the application config. Provider names are
//! turned into interceptors by an explicitly injected `InterceptorFactory`.

use crate::error::{InterceptError, Result};
use crate::interceptor::Interceptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Accessor role a binding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Method,
    Get,
    Set,
    Add,
    Remove,
    /// Every role of the member (or of every member, at class level)
    All,
}

impl Role {
    /// Does a binding declared for `self` cover `role`
    pub fn covers(self, role: Role) -> bool {
        self == Role::All || self == role
    }
}

/// Interceptor provider: a registered provider name plus construction arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl ProviderDescriptor {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: serde_json::Value) -> Self {
        self.args.push(arg);
        self
    }
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.provider)
    }
}

/// One declarative binding
///
/// Without a `member` the binding is class-level and applies to every
/// member whose role it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    pub roles: Vec<Role>,
    pub providers: Vec<ProviderDescriptor>,
}

impl Binding {
    /// Class-level binding
    pub fn type_level(roles: &[Role], providers: Vec<ProviderDescriptor>) -> Self {
        Self {
            member: None,
            roles: roles.to_vec(),
            providers,
        }
    }

    /// Member-level binding
    pub fn member(
        member: impl Into<String>,
        roles: &[Role],
        providers: Vec<ProviderDescriptor>,
    ) -> Self {
        Self {
            member: Some(member.into()),
            roles: roles.to_vec(),
            providers,
        }
    }

    pub fn covers(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r.covers(role))
    }

    /// Applies to several roles of the same member at once
    pub fn is_multi_role(&self) -> bool {
        self.roles.len() > 1 || self.roles.contains(&Role::All)
    }
}

/// Ordered set of bindings for one source type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorManifest {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl InterceptorManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Intercept every member of the type with `providers`
    pub fn intercept_all(self, providers: Vec<ProviderDescriptor>) -> Self {
        self.bind(Binding::type_level(&[Role::All], providers))
    }

    pub fn bind_member(
        self,
        member: impl Into<String>,
        roles: &[Role],
        providers: Vec<ProviderDescriptor>,
    ) -> Self {
        self.bind(Binding::member(member, roles, providers))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Parse a manifest from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a manifest from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            InterceptError::Config(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;

        let manifest: Self = serde_json::from_str(&json).map_err(|e| {
            InterceptError::Config(format!(
                "Failed to parse manifest {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %path.display(),
            bindings = manifest.bindings.len(),
            "Interceptor manifest loaded"
        );
        Ok(manifest)
    }
}

type ProviderFn =
    Arc<dyn Fn(&[serde_json::Value]) -> Result<Arc<dyn Interceptor>> + Send + Sync>;

/// Registry of interceptor providers, keyed by provider name
#[derive(Clone, Default)]
pub struct InterceptorFactory {
    providers: HashMap<String, ProviderFn>,
}

impl InterceptorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider constructor under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: impl Fn(&[serde_json::Value]) -> Result<Arc<dyn Interceptor>>
            + Send
            + Sync
            + 'static,
    ) {
        self.providers.insert(name.into(), Arc::new(provider));
    }

    /// Builder form of `register`
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        provider: impl Fn(&[serde_json::Value]) -> Result<Arc<dyn Interceptor>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.register(name, provider);
        self
    }

    /// Register a provider that hands out one shared interceptor
    pub fn with_shared(self, name: impl Into<String>, interceptor: Arc<dyn Interceptor>) -> Self {
        self.with_provider(name, move |_| Ok(Arc::clone(&interceptor)))
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    /// Instantiate the interceptor described by `descriptor`
    pub fn create(&self, descriptor: &ProviderDescriptor) -> Result<Arc<dyn Interceptor>> {
        let provider = self
            .providers
            .get(&descriptor.provider)
            .ok_or_else(|| InterceptError::UnknownProvider(descriptor.provider.clone()))?;
        provider(&descriptor.args)
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for InterceptorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorFactory")
            .field("providers", &self.names())
            .finish()
    }
}
