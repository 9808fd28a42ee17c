//! Source type descriptions
//!
//! A `TypeDescriptor` is the structural description of a class or
//! interface that a proxy is derived from: its members in declaration
//! order, their signatures and modifiers, the base constructor and the
//! declarative interceptor manifest. Descriptors are built once, shared
//! behind `Arc`, and never mutated afterwards.

use crate::binding::{InterceptorManifest, Role};
use crate::error::Result;
use crate::instance::Instance;
use crate::value::{TypeRef, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Builds the base implementation of a class from constructor arguments
pub type Constructor = Arc<dyn Fn(&[Value]) -> Result<Arc<dyn Instance>> + Send + Sync>;

/// Whether the source type is a concrete class or an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Class,
    Interface,
}

/// Inheritance modifiers of a class member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
}

impl Modifiers {
    /// Can a derived type replace this member
    pub fn is_overridable(&self) -> bool {
        (self.is_virtual || self.is_abstract) && !self.is_sealed
    }
}

/// Where a member is declared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// Declared by the source type (or one of its own bases)
    #[default]
    Declared,
    /// Declared by the universal base object type
    Object,
}

/// By-reference parameter passing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefKind {
    Ref,
    Out,
}

/// Identity of a dispatchable accessor: name, role, arity and signature
///
/// Properties, indexers and events are keyed by their own name with the
/// accessor role; methods use `Role::Method`. The arity and the bound
/// parameter types separate overloads. A key without a signature is a
/// lookup key that matches every overload of that arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    pub name: String,
    pub role: Role,
    pub arity: usize,
    pub signature: Vec<TypeRef>,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, role: Role, arity: usize) -> Self {
        Self {
            name: name.into(),
            role,
            arity,
            signature: Vec::new(),
        }
    }

    pub fn method(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, Role::Method, arity)
    }

    /// Pin the key to one overload; also fixes the arity
    pub fn with_signature(mut self, signature: impl IntoIterator<Item = TypeRef>) -> Self {
        self.signature = signature.into_iter().collect();
        self.arity = self.signature.len();
        self
    }

    /// The key with its signature dropped
    pub fn erased(&self) -> Self {
        Self::new(self.name.clone(), self.role, self.arity)
    }

    /// Does this key denote `lookup` (equal, or `lookup` is unpinned)
    pub fn matches(&self, lookup: &MemberKey) -> bool {
        self.name == lookup.name
            && self.role == lookup.role
            && self.arity == lookup.arity
            && (lookup.signature.is_empty() || self.signature == lookup.signature)
    }

    /// Accessor method name as the member would be compiled (`get_Title`)
    pub fn accessor_name(&self) -> String {
        match self.role {
            Role::Method | Role::All => self.name.clone(),
            Role::Get => format!("get_{}", self.name),
            Role::Set => format!("set_{}", self.name),
            Role::Add => format!("add_{}", self.name),
            Role::Remove => format!("remove_{}", self.name),
        }
    }

    /// `Write(str)`, or `Write/1` when no signature is pinned
    pub fn describe(&self) -> String {
        if self.signature.is_empty() {
            return self.to_string();
        }
        let parameters: Vec<String> = self.signature.iter().map(ToString::to_string).collect();
        format!("{}({})", self.accessor_name(), parameters.join(", "))
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.accessor_name(), self.arity)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub by_ref: Option<RefKind>,
    /// Attribute names replicated on the proxy signature
    pub attributes: Vec<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: None,
            attributes: Vec::new(),
        }
    }

    pub fn by_ref(mut self, kind: RefKind) -> Self {
        self.by_ref = Some(kind);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: TypeRef,
    pub generic_parameters: Vec<String>,
    pub modifiers: Modifiers,
    pub origin: Origin,
    /// Compiler-synthesized accessor already represented by a property or event
    pub special_name: bool,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: TypeRef::Void,
            generic_parameters: Vec::new(),
            modifiers: Modifiers::default(),
            origin: Origin::Declared,
            special_name: false,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, ty));
        self
    }

    pub fn ref_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters
            .push(ParameterDescriptor::new(name, ty).by_ref(RefKind::Ref));
        self
    }

    pub fn out_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters
            .push(ParameterDescriptor::new(name, ty).by_ref(RefKind::Out));
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn generic(mut self, placeholder: impl Into<String>) -> Self {
        self.generic_parameters.push(placeholder.into());
        self
    }

    pub fn overridable(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn abstract_member(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.modifiers.is_sealed = true;
        self
    }

    pub fn object_member(mut self) -> Self {
        self.origin = Origin::Object;
        self
    }

    pub fn special_name(mut self) -> Self {
        self.special_name = true;
        self
    }
}

/// A declared property; with index parameters it is an indexer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub index_parameters: Vec<ParameterDescriptor>,
    pub has_getter: bool,
    pub has_setter: bool,
    pub modifiers: Modifiers,
    pub origin: Origin,
}

impl PropertyDescriptor {
    /// Read-write property
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            index_parameters: Vec::new(),
            has_getter: true,
            has_setter: true,
            modifiers: Modifiers::default(),
            origin: Origin::Declared,
        }
    }

    /// Read-write indexer named `Item`
    pub fn indexer(ty: TypeRef) -> Self {
        Self::new("Item", ty)
    }

    pub fn index(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.index_parameters.push(ParameterDescriptor::new(name, ty));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.has_setter = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.has_getter = false;
        self
    }

    pub fn overridable(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn abstract_member(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.modifiers.is_sealed = true;
        self
    }

    pub fn is_indexer(&self) -> bool {
        !self.index_parameters.is_empty()
    }
}

/// A declared event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub name: String,
    pub modifiers: Modifiers,
    pub origin: Origin,
}

impl EventDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Modifiers::default(),
            origin: Origin::Declared,
        }
    }

    pub fn overridable(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.modifiers.is_sealed = true;
        self
    }
}

/// A declared member in declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "member", rename_all = "camelCase")]
pub enum MemberDescriptor {
    Method(MethodDescriptor),
    Property(PropertyDescriptor),
    Event(EventDescriptor),
}

impl MemberDescriptor {
    pub fn name(&self) -> &str {
        match self {
            MemberDescriptor::Method(m) => &m.name,
            MemberDescriptor::Property(p) => &p.name,
            MemberDescriptor::Event(e) => &e.name,
        }
    }

    /// Roles this member can be bound for
    pub fn roles(&self) -> &'static [Role] {
        match self {
            MemberDescriptor::Method(_) => &[Role::Method],
            MemberDescriptor::Property(_) => &[Role::Get, Role::Set],
            MemberDescriptor::Event(_) => &[Role::Add, Role::Remove],
        }
    }
}

/// Structural description of a class or interface
#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub generic_parameters: Vec<String>,
    /// Closed generic arguments, positionally matching `generic_parameters`
    pub generic_arguments: Vec<TypeRef>,
    pub interfaces: Vec<String>,
    pub members: Vec<MemberDescriptor>,
    pub bindings: InterceptorManifest,
    pub constructor: Option<Constructor>,
}

impl TypeDescriptor {
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            generic_parameters: Vec::new(),
            generic_arguments: Vec::new(),
            interfaces: Vec::new(),
            members: Vec::new(),
            bindings: InterceptorManifest::default(),
            constructor: None,
        }
    }

    /// Declare a generic parameter closed over `argument`
    pub fn generic(mut self, placeholder: impl Into<String>, argument: TypeRef) -> Self {
        self.generic_parameters.push(placeholder.into());
        self.generic_arguments.push(argument);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.members.push(MemberDescriptor::Method(method));
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.members.push(MemberDescriptor::Property(property));
        self
    }

    pub fn event(mut self, event: EventDescriptor) -> Self {
        self.members.push(MemberDescriptor::Event(event));
        self
    }

    pub fn bindings(mut self, manifest: InterceptorManifest) -> Self {
        self.bindings = manifest;
        self
    }

    pub fn constructor(
        mut self,
        constructor: impl Fn(&[Value]) -> Result<Arc<dyn Instance>> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Stable name including closed generic arguments (`Repo[Item,str]`)
    pub fn full_name(&self) -> String {
        if self.generic_arguments.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self.generic_arguments.iter().map(|a| a.to_string()).collect();
        format!("{}[{}]", self.name, args.join(","))
    }

    /// Canonical description of the declared shape
    ///
    /// Two descriptors with equal fingerprints derive the same proxy type.
    /// The constructor is not part of the shape; each request supplies its
    /// own.
    pub fn fingerprint(&self) -> String {
        let fingerprint = serde_json::json!({
            "kind": self.kind,
            "name": self.full_name(),
            "interfaces": self.interfaces,
            "members": self.members,
            "bindings": self.bindings,
        });
        fingerprint.to_string()
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name() == name)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.full_name())
            .field("kind", &self.kind)
            .field("interfaces", &self.interfaces)
            .field("members", &self.members.len())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}
