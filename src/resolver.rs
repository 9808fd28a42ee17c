//! Interceptor resolution
//!
//! Merges the declarative bindings of a type with the caller-supplied
//! interceptors into one ordered chain per accessor.
//!
//! Declared providers are collected in a fixed precedence:
//!
//! 1. class-level bindings covering the role, in declaration order
//! 2. member-level bindings for exactly this role
//! 3. member-level multi-role bindings (several roles, or `All`)
//!
//! Caller-supplied interceptors then form a single block placed according
//! to `InterceptorOrder`: outermost for `CallerFirst` (the default),
//! innermost for `DeclaredFirst`. Chains run outermost first, so with
//! `CallerFirst` and declared `[A]`, caller `[C]`, the entry order is
//! `C, A, callback` and the exit order `A, C`.

use crate::binding::{Binding, InterceptorFactory, InterceptorManifest, ProviderDescriptor, Role};
use crate::definition::{MemberDefinition, MethodDefinition, TypeDefinition};
use crate::descriptor::TypeDescriptor;
use crate::error::{InterceptError, Result};
use crate::interceptor::Interceptor;
use crate::options::InterceptorOrder;
use std::sync::Arc;

/// One position in a frozen chain
#[derive(Debug, Clone, PartialEq)]
pub enum ChainSlot {
    Declared(ProviderDescriptor),
    /// Placeholder for the interceptors supplied at proxy creation
    Caller,
}

/// Frozen interceptor order for one accessor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainTemplate {
    slots: Vec<ChainSlot>,
}

impl ChainTemplate {
    pub fn new(slots: Vec<ChainSlot>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[ChainSlot] {
        &self.slots
    }

    pub fn declared(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.slots.iter().filter_map(|slot| match slot {
            ChainSlot::Declared(d) => Some(d),
            ChainSlot::Caller => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Instantiate declared providers and splice in the caller block
    pub fn expand(
        &self,
        factory: &InterceptorFactory,
        caller: &[Arc<dyn Interceptor>],
    ) -> Result<Vec<Arc<dyn Interceptor>>> {
        let mut chain = Vec::with_capacity(self.slots.len() + caller.len());
        for slot in &self.slots {
            match slot {
                ChainSlot::Declared(descriptor) => chain.push(factory.create(descriptor)?),
                ChainSlot::Caller => chain.extend(caller.iter().cloned()),
            }
        }
        Ok(chain)
    }
}

/// Resolves ordered chains from a manifest
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptorResolver {
    order: InterceptorOrder,
}

impl InterceptorResolver {
    pub fn new(order: InterceptorOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> InterceptorOrder {
        self.order
    }

    /// Declared providers for one member role, in precedence order
    pub fn declared(
        &self,
        manifest: &InterceptorManifest,
        member: &str,
        role: Role,
    ) -> Vec<ProviderDescriptor> {
        let for_member = |b: &&Binding| b.member.as_deref() == Some(member) && b.covers(role);

        let class_level = manifest
            .bindings
            .iter()
            .filter(|b| b.member.is_none() && b.covers(role));
        let single_role = manifest
            .bindings
            .iter()
            .filter(for_member)
            .filter(|b| !b.is_multi_role());
        let multi_role = manifest
            .bindings
            .iter()
            .filter(for_member)
            .filter(|b| b.is_multi_role());

        class_level
            .chain(single_role)
            .chain(multi_role)
            .flat_map(|b| b.providers.iter().cloned())
            .collect()
    }

    /// Frozen chain for one member role
    pub fn resolve(&self, manifest: &InterceptorManifest, member: &str, role: Role) -> ChainTemplate {
        let declared = self
            .declared(manifest, member, role)
            .into_iter()
            .map(ChainSlot::Declared);

        let slots = match self.order {
            InterceptorOrder::CallerFirst => std::iter::once(ChainSlot::Caller).chain(declared).collect(),
            InterceptorOrder::DeclaredFirst => declared.chain(std::iter::once(ChainSlot::Caller)).collect(),
        };
        ChainTemplate::new(slots)
    }

    /// Reject bindings naming members or roles the type does not have
    pub fn validate(&self, source: &TypeDescriptor) -> Result<()> {
        for binding in &source.bindings.bindings {
            if binding.roles.is_empty() {
                return Err(InterceptError::Binding {
                    type_name: source.full_name(),
                    reason: "binding declares no roles".to_string(),
                });
            }

            let Some(name) = binding.member.as_deref() else {
                continue;
            };
            let member = source.find_member(name).ok_or_else(|| InterceptError::Binding {
                type_name: source.full_name(),
                reason: format!("no member named '{}'", name),
            })?;

            for role in &binding.roles {
                if *role != Role::All && !member.roles().contains(role) {
                    return Err(InterceptError::Binding {
                        type_name: source.full_name(),
                        reason: format!("member '{}' has no {:?} role", name, role),
                    });
                }
            }
        }
        Ok(())
    }

    /// Freeze chains into every interceptable accessor of a definition
    pub fn resolve_definition(&self, definition: &mut TypeDefinition) -> Result<()> {
        self.validate(&definition.source)?;

        let manifest = definition.source.bindings.clone();
        let resolve = |method: &mut MethodDefinition, interceptable: bool| {
            if interceptable {
                method.interceptors = self.resolve(&manifest, method.member_name(), method.key.role);
            }
        };

        for member in &mut definition.members {
            match member {
                MemberDefinition::Method(m) => {
                    let interceptable = m.is_interceptable;
                    resolve(m, interceptable);
                }
                MemberDefinition::Property(p) | MemberDefinition::Indexer(p) => {
                    let interceptable = p.is_interceptable;
                    if let Some(getter) = p.getter.as_mut() {
                        resolve(getter, interceptable);
                    }
                    if let Some(setter) = p.setter.as_mut() {
                        resolve(setter, interceptable);
                    }
                }
                MemberDefinition::Event(e) => {
                    let interceptable = e.is_interceptable;
                    resolve(&mut e.add, interceptable);
                    resolve(&mut e.remove, interceptable);
                }
            }
        }

        tracing::debug!(
            type_name = %definition.full_name,
            order = ?self.order,
            "Interceptor chains resolved"
        );
        Ok(())
    }
}
