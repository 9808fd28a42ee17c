//! Proxy synthesis — turning a build plan into a dispatchable type
//!
//! A synthesis backend implements `ProxyBackend`. The crate ships
//! `DispatchBackend`, which builds an immutable dispatch table of
//! forwarders from pluggable per-kind `MemberSynthesizer` strategies.
//! Synthesis is all-or-nothing: a backend returns a complete `ProxyType`
//! or an error, never a partial table.

use crate::binding::InterceptorFactory;
use crate::definition::ProxyKind;
use crate::descriptor::{MemberKey, TypeDescriptor};
use crate::error::{InterceptError, Result};
use crate::plan::{BuildPlan, PlannedMember};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod dispatch;
pub mod event;
pub mod forwarder;
pub mod method;
pub mod property;

pub use dispatch::DispatchBackend;
pub use forwarder::Forwarder;

/// Core trait for synthesis backends
///
/// The generator hands a backend a validated plan and caches whatever type
/// it returns; a backend is only ever called once per registry key.
pub trait ProxyBackend: Send + Sync {
    /// Produce a complete proxy type from `plan`
    fn synthesize(&self, plan: &BuildPlan, factory: &InterceptorFactory) -> Result<ProxyType>;

    /// Backend name (e.g., "dispatch")
    fn name(&self) -> &str;
}

/// Strategy producing the forwarders of one kind of member
pub trait MemberSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        member: &PlannedMember,
        factory: &InterceptorFactory,
    ) -> Result<Vec<(MemberKey, Forwarder)>>;
}

/// A synthesized proxy type
///
/// Immutable once published and shared by every proxy instance built from
/// it.
pub struct ProxyType {
    name: String,
    kind: ProxyKind,
    source: Arc<TypeDescriptor>,
    mixins: Vec<Arc<TypeDescriptor>>,
    fingerprint: String,
    forwarders: HashMap<MemberKey, Arc<Forwarder>>,
    /// Unpinned key to its overloads, in declaration order
    overloads: HashMap<MemberKey, Vec<MemberKey>>,
    /// Keys in declaration order
    order: Vec<MemberKey>,
}

impl ProxyType {
    /// Assemble a type from forwarders in declaration order
    pub fn new(plan: &BuildPlan, entries: Vec<(MemberKey, Forwarder)>) -> Result<Self> {
        let mut forwarders = HashMap::with_capacity(entries.len());
        let mut overloads: HashMap<MemberKey, Vec<MemberKey>> = HashMap::new();
        let mut order = Vec::with_capacity(entries.len());

        for (key, forwarder) in entries {
            if forwarders.contains_key(&key) {
                return Err(InterceptError::Synthesis {
                    type_name: plan.full_name.clone(),
                    reason: format!("'{}' is dispatched by more than one member", key.describe()),
                });
            }
            overloads.entry(key.erased()).or_default().push(key.clone());
            order.push(key.clone());
            forwarders.insert(key, Arc::new(forwarder));
        }

        Ok(Self {
            name: plan.full_name.clone(),
            kind: plan.kind,
            source: Arc::clone(&plan.source),
            mixins: plan.mixins.clone(),
            fingerprint: plan.fingerprint.clone(),
            forwarders,
            overloads,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn source(&self) -> &Arc<TypeDescriptor> {
        &self.source
    }

    pub fn mixins(&self) -> &[Arc<TypeDescriptor>] {
        &self.mixins
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Dispatch keys in declaration order
    pub fn keys(&self) -> &[MemberKey] {
        &self.order
    }

    /// Forwarder for `key`
    ///
    /// An unpinned key must name a single overload; use `resolve` to pick
    /// among overloads of the same arity.
    pub fn forwarder(&self, key: &MemberKey) -> Result<&Arc<Forwarder>> {
        let key = self.select(key, None)?;
        self.forwarders
            .get(key)
            .ok_or_else(|| self.not_found(key))
    }

    /// Dispatch key of the overload that `args` are passed to
    pub fn resolve(&self, key: &MemberKey, args: &[Value]) -> Result<&MemberKey> {
        self.select(key, Some(args))
    }

    fn select(&self, key: &MemberKey, args: Option<&[Value]>) -> Result<&MemberKey> {
        let Some(overloads) = self.overloads.get(&key.erased()) else {
            let overload = self
                .order
                .iter()
                .find(|k| k.name == key.name && k.role == key.role);
            return Err(match overload {
                Some(found) => InterceptError::Arity {
                    member: key.accessor_name(),
                    expected: found.arity,
                    actual: key.arity,
                },
                None => self.not_found(key),
            });
        };

        if let Some(pinned) = overloads.iter().find(|k| *k == key) {
            return Ok(pinned);
        }
        if let [only] = overloads.as_slice() {
            return Ok(only);
        }

        let Some(args) = args else {
            return Err(InterceptError::Argument(format!(
                "'{}' is overloaded on '{}'; pin it by signature",
                key, self.name
            )));
        };
        let accepted: Vec<&MemberKey> = overloads
            .iter()
            .filter(|k| {
                self.forwarders
                    .get(*k)
                    .is_some_and(|f| f.method().accepts_arguments(args))
            })
            .collect();
        match accepted.as_slice() {
            [only] => Ok(*only),
            [] => Err(InterceptError::Argument(format!(
                "No overload of '{}' accepts ({})",
                key,
                argument_kinds(args)
            ))),
            _ => Err(InterceptError::Argument(format!(
                "Call of '{}' with ({}) matches {} overloads",
                key,
                argument_kinds(args),
                accepted.len()
            ))),
        }
    }

    fn not_found(&self, key: &MemberKey) -> InterceptError {
        InterceptError::MemberNotFound {
            type_name: self.name.clone(),
            member: key.describe(),
        }
    }

    /// Is the type substitutable for `type_name`
    pub fn is_a(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.source.name == type_name
            || self.source.full_name() == type_name
            || self.source.interfaces.iter().any(|i| i == type_name)
            || self
                .mixins
                .iter()
                .any(|m| m.name == type_name || m.full_name() == type_name)
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("members", &self.order.len())
            .field(
                "mixins",
                &self.mixins.iter().map(|m| m.full_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn argument_kinds(args: &[Value]) -> String {
    args.iter().map(|a| a.kind().to_string()).collect::<Vec<_>>().join(", ")
}
