//! Proxy build plan
//!
//! The frozen, fully-resolved description of a proxy type handed to the
//! synthesis backend: every member with its resolved chains, the callback
//! intent of each member, the accessor policy of each property and the
//! mixin interfaces. Assembly validates the plan; it adds no behavior.

use crate::definition::{MemberDefinition, ProxyKind, TypeDefinition};
use crate::descriptor::{MemberKey, TypeDescriptor};
use crate::error::{InterceptError, Result};
use crate::options::{AccessorPolicy, ProxyOptions};
use std::sync::Arc;

/// Where the callback at the end of a chain lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackIntent {
    /// The target instance supplied at creation
    Target,
    /// The base implementation built from the source constructor
    Base,
    /// The mixin instance at this position
    Mixin(usize),
}

/// One member of the plan
#[derive(Debug, Clone)]
pub struct PlannedMember {
    pub definition: MemberDefinition,
    pub callback: CallbackIntent,
    pub policy: AccessorPolicy,
}

impl PlannedMember {
    pub fn name(&self) -> &str {
        self.definition.name()
    }
}

/// Immutable input to synthesis
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub full_name: String,
    pub kind: ProxyKind,
    pub source: Arc<TypeDescriptor>,
    pub members: Vec<PlannedMember>,
    pub mixins: Vec<Arc<TypeDescriptor>>,
    pub fingerprint: String,
}

impl BuildPlan {
    /// Assemble and validate a plan from a resolved definition
    pub fn assemble(definition: &TypeDefinition, options: &ProxyOptions) -> Result<Self> {
        if definition.kind == ProxyKind::Class && definition.source.constructor.is_none() {
            return Err(InterceptError::NoConstructor(definition.source.full_name()));
        }

        let callback = match definition.kind {
            ProxyKind::Class => CallbackIntent::Base,
            ProxyKind::ClassWithTarget | ProxyKind::Interface => CallbackIntent::Target,
        };

        let mut members: Vec<PlannedMember> = definition
            .members
            .iter()
            .map(|member| PlannedMember {
                policy: match member {
                    MemberDefinition::Property(p) | MemberDefinition::Indexer(p) => {
                        options.policy_for(&p.name)
                    }
                    _ => AccessorPolicy::Standard,
                },
                definition: member.clone(),
                callback,
            })
            .collect();

        let mut mixins = Vec::with_capacity(options.mixins().len());
        for (position, mixin) in options.mixins().iter().enumerate() {
            for definition in TypeDefinition::mixin_members(&mixin.interface)? {
                members.push(PlannedMember {
                    definition,
                    callback: CallbackIntent::Mixin(position),
                    policy: AccessorPolicy::Standard,
                });
            }
            mixins.push(Arc::clone(&mixin.interface));
        }

        let plan = Self {
            full_name: definition.full_name.clone(),
            kind: definition.kind,
            source: Arc::clone(&definition.source),
            members,
            mixins,
            fingerprint: options.fingerprint(),
        };
        plan.validate_policies(options)?;
        Ok(plan)
    }

    fn validate_policies(&self, options: &ProxyOptions) -> Result<()> {
        for (property, policy) in options.accessor_policies() {
            let is_property = self.members.iter().any(|m| {
                matches!(
                    &m.definition,
                    MemberDefinition::Property(p) | MemberDefinition::Indexer(p) if p.name == *property
                )
            });
            if !is_property {
                return Err(InterceptError::Argument(format!(
                    "Accessor policy for '{}' names no property of '{}'",
                    property, self.full_name
                )));
            }

            if let AccessorPolicy::Clean { notify_member } = policy {
                if !self.has_accessor(&MemberKey::method(notify_member, 1)) {
                    return Err(InterceptError::Argument(format!(
                        "Clean property '{}' notifies through '{}', which '{}' does not declare",
                        property, notify_member, self.full_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Does any planned member dispatch `key`
    pub fn has_accessor(&self, key: &MemberKey) -> bool {
        self.members
            .iter()
            .flat_map(|m| m.definition.accessors())
            .any(|a| a.key.matches(key))
    }

    pub fn interceptable_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.definition.is_interceptable())
            .count()
    }
}
