//! Type reflection model
//!
//! Turns a `TypeDescriptor` into a `TypeDefinition`: the proxy kind, the
//! generic context, and one definition per member with the member
//! selector's verdict recorded as `is_interceptable`. Properties and
//! indexers own getter/setter method definitions; events own add/remove
//! method definitions. Definitions are immutable once built and cached by
//! the generator per (proxy name, options fingerprint).

use crate::binding::Role;
use crate::descriptor::{
    EventDescriptor, MemberDescriptor, MemberKey, MethodDescriptor, ParameterDescriptor,
    PropertyDescriptor, RefKind, TypeDescriptor, TypeKind,
};
use crate::error::{InterceptError, Result};
use crate::instance::Instance;
use crate::options::ProxyOptions;
use crate::resolver::ChainTemplate;
use crate::selector::MemberSelector;
use crate::value::{TypeRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Proxy creation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyKind {
    /// Overrides members of a class; calls land on the base implementation
    Class,
    /// Overrides members of a class; calls land on a target instance
    ClassWithTarget,
    /// Implements every interface member; calls land on the target
    Interface,
}

impl ProxyKind {
    /// Classify a request and check the target against the source type
    pub fn classify(source: &TypeDescriptor, target: Option<&dyn Instance>) -> Result<Self> {
        let type_name = source.full_name();
        match (source.kind, target) {
            (TypeKind::Interface, None) => Err(InterceptError::Argument(format!(
                "Interface proxy for '{}' requires a target",
                type_name
            ))),
            (TypeKind::Interface, Some(target)) => {
                if !target.is_a(&source.name) {
                    return Err(InterceptError::TargetMismatch {
                        target: target.type_name().to_string(),
                        required: type_name,
                    });
                }
                Ok(ProxyKind::Interface)
            }
            (TypeKind::Class, Some(target)) => {
                if !target.is_a(&source.name) {
                    return Err(InterceptError::TargetMismatch {
                        target: target.type_name().to_string(),
                        required: type_name,
                    });
                }
                Ok(ProxyKind::ClassWithTarget)
            }
            (TypeKind::Class, None) => {
                if source.constructor.is_none() {
                    return Err(InterceptError::NoConstructor(type_name));
                }
                Ok(ProxyKind::Class)
            }
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ProxyKind::Class => "ClassProxy",
            ProxyKind::ClassWithTarget => "ClassProxyWithTarget",
            ProxyKind::Interface => "InterfaceProxy",
        }
    }

    /// Stable proxy type name for a source type
    pub fn proxy_name(self, source: &TypeDescriptor) -> String {
        format!("{}.{}", self.prefix(), source.full_name())
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A parameter on a proxy signature
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub position: usize,
    pub name: String,
    pub ty: TypeRef,
    pub by_ref: Option<RefKind>,
    pub attributes: Vec<String>,
}

impl ParameterDefinition {
    fn from_descriptor(
        position: usize,
        parameter: &ParameterDescriptor,
        context: &HashMap<String, TypeRef>,
    ) -> Self {
        Self {
            position,
            name: parameter.name.clone(),
            ty: parameter.ty.bind(context),
            by_ref: parameter.by_ref,
            attributes: parameter.attributes.clone(),
        }
    }

    pub fn is_by_ref(&self) -> bool {
        self.by_ref.is_some()
    }
}

/// A dispatchable method or accessor
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    pub declaring_type: String,
    pub key: MemberKey,
    /// Method or accessor name (`get_Title`)
    pub name: String,
    /// Owning property or event
    pub owner: Option<String>,
    pub parameters: Vec<ParameterDefinition>,
    pub return_type: TypeRef,
    pub generic_parameters: Vec<String>,
    /// Resolved chain; empty until the resolver runs
    pub interceptors: ChainTemplate,
    pub is_interceptable: bool,
}

impl MethodDefinition {
    fn new(
        declaring_type: &str,
        key: MemberKey,
        owner: Option<String>,
        parameters: Vec<ParameterDefinition>,
        return_type: TypeRef,
        generic_parameters: Vec<String>,
        is_interceptable: bool,
    ) -> Self {
        let key = key.with_signature(parameters.iter().map(|p| p.ty.clone()));
        Self {
            declaring_type: declaring_type.to_string(),
            name: key.accessor_name(),
            key,
            owner,
            parameters,
            return_type,
            generic_parameters,
            interceptors: ChainTemplate::default(),
            is_interceptable,
        }
    }

    /// Name of the member this accessor belongs to
    pub fn member_name(&self) -> &str {
        self.owner.as_deref().unwrap_or(&self.name)
    }

    pub fn is_awaitable(&self) -> bool {
        self.return_type.is_awaitable()
    }

    pub fn has_by_ref(&self) -> bool {
        self.parameters.iter().any(ParameterDefinition::is_by_ref)
    }

    /// Can `args` be passed to this overload
    ///
    /// `out` slots take any placeholder value.
    pub fn accepts_arguments(&self, args: &[Value]) -> bool {
        self.parameters.len() == args.len()
            && self
                .parameters
                .iter()
                .zip(args)
                .all(|(p, arg)| p.by_ref == Some(RefKind::Out) || p.ty.accepts(arg))
    }

    pub fn by_ref_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.parameters
            .iter()
            .filter(|p| p.is_by_ref())
            .map(|p| p.position)
    }
}

/// Property or indexer
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub declaring_type: String,
    pub name: String,
    pub ty: TypeRef,
    pub index_parameters: Vec<ParameterDefinition>,
    pub getter: Option<MethodDefinition>,
    pub setter: Option<MethodDefinition>,
    pub is_interceptable: bool,
}

/// Event with its add/remove accessors
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub declaring_type: String,
    pub name: String,
    pub add: MethodDefinition,
    pub remove: MethodDefinition,
    pub is_interceptable: bool,
}

/// A member of the proxy type
#[derive(Debug, Clone, PartialEq)]
pub enum MemberDefinition {
    Method(MethodDefinition),
    Property(PropertyDefinition),
    Indexer(PropertyDefinition),
    Event(EventDefinition),
}

impl MemberDefinition {
    pub fn name(&self) -> &str {
        match self {
            MemberDefinition::Method(m) => &m.name,
            MemberDefinition::Property(p) | MemberDefinition::Indexer(p) => &p.name,
            MemberDefinition::Event(e) => &e.name,
        }
    }

    pub fn is_interceptable(&self) -> bool {
        match self {
            MemberDefinition::Method(m) => m.is_interceptable,
            MemberDefinition::Property(p) | MemberDefinition::Indexer(p) => p.is_interceptable,
            MemberDefinition::Event(e) => e.is_interceptable,
        }
    }

    /// Every dispatchable accessor of the member
    pub fn accessors(&self) -> Vec<&MethodDefinition> {
        match self {
            MemberDefinition::Method(m) => vec![m],
            MemberDefinition::Property(p) | MemberDefinition::Indexer(p) => {
                p.getter.iter().chain(p.setter.iter()).collect()
            }
            MemberDefinition::Event(e) => vec![&e.add, &e.remove],
        }
    }
}

/// Structural description of the proxy to build
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub source: Arc<TypeDescriptor>,
    pub kind: ProxyKind,
    /// Stable proxy type name (`ClassProxy.Document`)
    pub full_name: String,
    pub generic_context: HashMap<String, TypeRef>,
    pub members: Vec<MemberDefinition>,
}

impl TypeDefinition {
    /// Reflect `source` for the creation mode implied by `target`
    pub fn build(
        source: &Arc<TypeDescriptor>,
        target: Option<&dyn Instance>,
        options: &ProxyOptions,
    ) -> Result<Self> {
        let kind = ProxyKind::classify(source, target)?;
        Self::reflect(source, kind, options.selector().as_ref())
    }

    /// Reflect `source` for an already classified proxy kind
    pub fn reflect(
        source: &Arc<TypeDescriptor>,
        kind: ProxyKind,
        selector: &dyn MemberSelector,
    ) -> Result<Self> {
        let generic_context = generic_context(source)?;
        let members = source
            .members
            .iter()
            .map(|member| {
                let interceptable = match member {
                    MemberDescriptor::Method(m) => selector.include_method(source.kind, m),
                    MemberDescriptor::Property(p) => selector.include_property(source.kind, p),
                    MemberDescriptor::Event(e) => selector.include_event(source.kind, e),
                };
                member_definition(&source.full_name(), member, &generic_context, interceptable)
            })
            .collect();

        let definition = Self {
            source: Arc::clone(source),
            kind,
            full_name: kind.proxy_name(source),
            generic_context,
            members,
        };

        tracing::debug!(
            type_name = %definition.full_name,
            members = definition.members.len(),
            interceptable = definition.members.iter().filter(|m| m.is_interceptable()).count(),
            "Type definition built"
        );
        Ok(definition)
    }

    /// Non-interceptable member definitions for a mixin interface
    pub fn mixin_members(mixin: &TypeDescriptor) -> Result<Vec<MemberDefinition>> {
        if !mixin.is_interface() {
            return Err(InterceptError::InvalidShape {
                type_name: mixin.full_name(),
                reason: "mixins must be interfaces".to_string(),
            });
        }
        let context = generic_context(mixin)?;
        Ok(mixin
            .members
            .iter()
            .map(|m| member_definition(&mixin.full_name(), m, &context, false))
            .collect())
    }

    pub fn find(&self, name: &str) -> Option<&MemberDefinition> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// Accessors in declaration order
    pub fn accessors(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.members.iter().flat_map(|m| m.accessors())
    }
}

fn generic_context(source: &TypeDescriptor) -> Result<HashMap<String, TypeRef>> {
    if source.generic_parameters.len() != source.generic_arguments.len() {
        return Err(InterceptError::InvalidShape {
            type_name: source.name.clone(),
            reason: format!(
                "{} generic parameter(s) but {} argument(s)",
                source.generic_parameters.len(),
                source.generic_arguments.len()
            ),
        });
    }
    Ok(source
        .generic_parameters
        .iter()
        .cloned()
        .zip(source.generic_arguments.iter().cloned())
        .collect())
}

fn member_definition(
    declaring_type: &str,
    member: &MemberDescriptor,
    context: &HashMap<String, TypeRef>,
    interceptable: bool,
) -> MemberDefinition {
    match member {
        MemberDescriptor::Method(m) => {
            MemberDefinition::Method(method_definition(declaring_type, m, context, interceptable))
        }
        MemberDescriptor::Property(p) => {
            let definition = property_definition(declaring_type, p, context, interceptable);
            if p.is_indexer() {
                MemberDefinition::Indexer(definition)
            } else {
                MemberDefinition::Property(definition)
            }
        }
        MemberDescriptor::Event(e) => {
            MemberDefinition::Event(event_definition(declaring_type, e, interceptable))
        }
    }
}

fn method_definition(
    declaring_type: &str,
    method: &MethodDescriptor,
    context: &HashMap<String, TypeRef>,
    interceptable: bool,
) -> MethodDefinition {
    // Method placeholders shadow type-level ones
    let mut context = context.clone();
    for placeholder in &method.generic_parameters {
        context.remove(placeholder);
    }

    let parameters = method
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| ParameterDefinition::from_descriptor(i, p, &context))
        .collect::<Vec<_>>();

    MethodDefinition::new(
        declaring_type,
        MemberKey::method(&method.name, parameters.len()),
        None,
        parameters,
        method.return_type.bind(&context),
        method.generic_parameters.clone(),
        interceptable,
    )
}

fn property_definition(
    declaring_type: &str,
    property: &PropertyDescriptor,
    context: &HashMap<String, TypeRef>,
    interceptable: bool,
) -> PropertyDefinition {
    let ty = property.ty.bind(context);
    let index_parameters: Vec<ParameterDefinition> = property
        .index_parameters
        .iter()
        .enumerate()
        .map(|(i, p)| ParameterDefinition::from_descriptor(i, p, context))
        .collect();

    let getter = property.has_getter.then(|| {
        MethodDefinition::new(
            declaring_type,
            MemberKey::new(&property.name, Role::Get, index_parameters.len()),
            Some(property.name.clone()),
            index_parameters.clone(),
            ty.clone(),
            Vec::new(),
            interceptable,
        )
    });

    let setter = property.has_setter.then(|| {
        let mut parameters = index_parameters.clone();
        parameters.push(ParameterDefinition {
            position: index_parameters.len(),
            name: "value".to_string(),
            ty: ty.clone(),
            by_ref: None,
            attributes: Vec::new(),
        });
        MethodDefinition::new(
            declaring_type,
            MemberKey::new(&property.name, Role::Set, parameters.len()),
            Some(property.name.clone()),
            parameters,
            TypeRef::Void,
            Vec::new(),
            interceptable,
        )
    });

    PropertyDefinition {
        declaring_type: declaring_type.to_string(),
        name: property.name.clone(),
        ty,
        index_parameters,
        getter,
        setter,
        is_interceptable: interceptable,
    }
}

fn event_definition(declaring_type: &str, event: &EventDescriptor, interceptable: bool) -> EventDefinition {
    let accessor = |role: Role| {
        MethodDefinition::new(
            declaring_type,
            MemberKey::new(&event.name, role, 1),
            Some(event.name.clone()),
            vec![ParameterDefinition {
                position: 0,
                name: "handler".to_string(),
                ty: TypeRef::Handler,
                by_ref: None,
                attributes: Vec::new(),
            }],
            TypeRef::Void,
            Vec::new(),
            interceptable,
        )
    };

    EventDefinition {
        declaring_type: declaring_type.to_string(),
        name: event.name.clone(),
        add: accessor(Role::Add),
        remove: accessor(Role::Remove),
        is_interceptable: interceptable,
    }
}
