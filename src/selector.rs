//! Member selection policy
//!
//! Decides which members of a source type get a full interception
//! pipeline. Members that are not selected are still dispatchable through
//! the proxy, they just forward straight to the real implementation.

use crate::descriptor::{
    EventDescriptor, MethodDescriptor, Modifiers, Origin, PropertyDescriptor, TypeKind,
};
use std::collections::BTreeSet;

/// Replaceable member inclusion policy
///
/// Implementations must be deterministic: the same type and policy always
/// select the same members.
pub trait MemberSelector: Send + Sync {
    /// Stable identifier, part of the registry fingerprint
    fn id(&self) -> String;

    fn include_method(&self, kind: TypeKind, method: &MethodDescriptor) -> bool;

    fn include_property(&self, kind: TypeKind, property: &PropertyDescriptor) -> bool;

    fn include_event(&self, kind: TypeKind, event: &EventDescriptor) -> bool;
}

/// Default policy
///
/// Interface members are always eligible. Class members must be
/// overridable, not sealed, and not declared by the universal base object
/// type. Compiler-synthesized accessor methods are never eligible on their
/// own; their property or event is. Names listed in `excluded` are skipped.
#[derive(Debug, Clone, Default)]
pub struct DefaultMemberSelector {
    excluded: BTreeSet<String>,
}

impl DefaultMemberSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: names.into_iter().map(Into::into).collect(),
        }
    }

    fn eligible(&self, kind: TypeKind, name: &str, modifiers: Modifiers, origin: Origin) -> bool {
        if self.excluded.contains(name) {
            return false;
        }
        match kind {
            TypeKind::Interface => true,
            TypeKind::Class => origin == Origin::Declared && modifiers.is_overridable(),
        }
    }
}

impl MemberSelector for DefaultMemberSelector {
    fn id(&self) -> String {
        if self.excluded.is_empty() {
            "default".to_string()
        } else {
            let names: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
            format!("default-excluding:{}", names.join(","))
        }
    }

    fn include_method(&self, kind: TypeKind, method: &MethodDescriptor) -> bool {
        !method.special_name && self.eligible(kind, &method.name, method.modifiers, method.origin)
    }

    fn include_property(&self, kind: TypeKind, property: &PropertyDescriptor) -> bool {
        self.eligible(kind, &property.name, property.modifiers, property.origin)
    }

    fn include_event(&self, kind: TypeKind, event: &EventDescriptor) -> bool {
        self.eligible(kind, &event.name, event.modifiers, event.origin)
    }
}
