//! Proxy configuration
//!
//! `ProxyOptions` is the runtime configuration passed to the generator.
//! The type-shaping part of it (selector, mixin interfaces, interceptor
//! order, accessor policies) is captured by `fingerprint()` and becomes
//! part of the registry key. `ProxyConfig` is the serializable subset that
//! can be loaded from a JSON file.

use crate::descriptor::TypeDescriptor;
use crate::error::{InterceptError, Result};
use crate::instance::Instance;
use crate::selector::{DefaultMemberSelector, MemberSelector};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where caller-supplied interceptors sit relative to declared ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterceptorOrder {
    /// Caller interceptors wrap outermost: first on entry, last on exit
    #[default]
    CallerFirst,
    /// Declared interceptors wrap outermost; caller interceptors run innermost
    DeclaredFirst,
}

/// How a property's accessors are synthesized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessorPolicy {
    /// Full interceptor pipeline on both accessors
    #[default]
    Standard,
    /// Getter bypasses the pipeline; setter runs only the change
    /// notification interceptor, which calls `notify_member` on the proxy
    Clean {
        #[serde(rename = "notifyMember", default = "default_notify_member")]
        notify_member: String,
    },
}

fn default_notify_member() -> String {
    "OnPropertyChanged".to_string()
}

impl AccessorPolicy {
    /// Clean policy notifying through `OnPropertyChanged`
    pub fn clean() -> Self {
        AccessorPolicy::Clean {
            notify_member: default_notify_member(),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, AccessorPolicy::Clean { .. })
    }
}

/// Additional interface woven into proxy instances
#[derive(Clone)]
pub struct Mixin {
    pub interface: Arc<TypeDescriptor>,
    pub instance: Arc<dyn Instance>,
}

impl Mixin {
    pub fn new(interface: Arc<TypeDescriptor>, instance: Arc<dyn Instance>) -> Self {
        Self {
            interface,
            instance,
        }
    }
}

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixin")
            .field("interface", &self.interface.full_name())
            .field("instance", &self.instance.type_name())
            .finish()
    }
}

/// Options for proxy creation
#[derive(Clone, Default)]
pub struct ProxyOptions {
    member_selector: Option<Arc<dyn MemberSelector>>,
    mixins: Vec<Mixin>,
    interceptor_order: InterceptorOrder,
    accessor_policies: BTreeMap<String, AccessorPolicy>,
    constructor_arguments: Vec<Value>,
}

impl ProxyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a loaded config
    pub fn from_config(config: ProxyConfig) -> Self {
        let mut options = Self::new()
            .interceptor_order(config.interceptor_order)
            .constructor_arguments(
                config
                    .constructor_arguments
                    .into_iter()
                    .map(Value::from_json)
                    .collect(),
            );
        if !config.excluded_members.is_empty() {
            options = options.member_selector(Arc::new(DefaultMemberSelector::excluding(
                config.excluded_members,
            )));
        }
        options.accessor_policies = config.accessor_policies;
        options
    }

    pub fn member_selector(mut self, selector: Arc<dyn MemberSelector>) -> Self {
        self.member_selector = Some(selector);
        self
    }

    pub fn mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    pub fn interceptor_order(mut self, order: InterceptorOrder) -> Self {
        self.interceptor_order = order;
        self
    }

    pub fn accessor_policy(mut self, property: impl Into<String>, policy: AccessorPolicy) -> Self {
        self.accessor_policies.insert(property.into(), policy);
        self
    }

    /// Shorthand for a clean accessor policy on `property`
    pub fn clean_property(self, property: impl Into<String>) -> Self {
        self.accessor_policy(property, AccessorPolicy::clean())
    }

    pub fn constructor_arguments(mut self, args: Vec<Value>) -> Self {
        self.constructor_arguments = args;
        self
    }

    /// Selector in effect, falling back to the default policy
    pub fn selector(&self) -> Arc<dyn MemberSelector> {
        self.member_selector
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultMemberSelector::new()))
    }

    pub fn mixins(&self) -> &[Mixin] {
        &self.mixins
    }

    pub fn order(&self) -> InterceptorOrder {
        self.interceptor_order
    }

    pub fn policy_for(&self, property: &str) -> AccessorPolicy {
        self.accessor_policies
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    pub fn accessor_policies(&self) -> &BTreeMap<String, AccessorPolicy> {
        &self.accessor_policies
    }

    pub fn args(&self) -> &[Value] {
        &self.constructor_arguments
    }

    /// Canonical description of everything that shapes the synthesized type
    pub fn fingerprint(&self) -> String {
        let fingerprint = serde_json::json!({
            "selector": self.selector().id(),
            "mixins": self
                .mixins
                .iter()
                .map(|m| m.interface.full_name())
                .collect::<Vec<_>>(),
            "order": self.interceptor_order,
            "policies": self.accessor_policies,
        });
        fingerprint.to_string()
    }
}

impl fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("selector", &self.selector().id())
            .field("mixins", &self.mixins)
            .field("interceptor_order", &self.interceptor_order)
            .field("accessor_policies", &self.accessor_policies)
            .field("constructor_arguments", &self.constructor_arguments)
            .finish()
    }
}

/// Serializable proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default)]
    pub interceptor_order: InterceptorOrder,

    /// Members never intercepted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_members: Vec<String>,

    /// Property name → accessor policy
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accessor_policies: BTreeMap<String, AccessorPolicy>,

    /// Arguments for the base constructor of class proxies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor_arguments: Vec<serde_json::Value>,
}

impl ProxyConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file; a missing file yields the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path).map_err(|e| {
            InterceptError::Config(format!(
                "Failed to read proxy config {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = serde_json::from_str(&json).map_err(|e| {
            InterceptError::Config(format!(
                "Failed to parse proxy config {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "Proxy config loaded");
        Ok(config)
    }
}
