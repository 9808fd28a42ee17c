//! Dynamic-dispatch synthesis backend
//!
//! Builds the dispatch table in process. Each member kind is handled by
//! its own `MemberSynthesizer`, supplied at construction; the defaults
//! cover methods, properties, indexers and events.

use super::event::EventSynthesizer;
use super::method::MethodSynthesizer;
use super::property::PropertySynthesizer;
use super::{MemberSynthesizer, ProxyBackend, ProxyType};
use crate::binding::InterceptorFactory;
use crate::definition::MemberDefinition;
use crate::error::Result;
use crate::plan::{BuildPlan, PlannedMember};
use std::sync::Arc;

/// In-process synthesis backend
#[derive(Clone)]
pub struct DispatchBackend {
    methods: Arc<dyn MemberSynthesizer>,
    properties: Arc<dyn MemberSynthesizer>,
    events: Arc<dyn MemberSynthesizer>,
}

impl Default for DispatchBackend {
    fn default() -> Self {
        Self {
            methods: Arc::new(MethodSynthesizer),
            properties: Arc::new(PropertySynthesizer),
            events: Arc::new(EventSynthesizer),
        }
    }
}

impl DispatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method_synthesizer(mut self, synthesizer: Arc<dyn MemberSynthesizer>) -> Self {
        self.methods = synthesizer;
        self
    }

    /// Strategy for properties and indexers
    pub fn with_property_synthesizer(mut self, synthesizer: Arc<dyn MemberSynthesizer>) -> Self {
        self.properties = synthesizer;
        self
    }

    pub fn with_event_synthesizer(mut self, synthesizer: Arc<dyn MemberSynthesizer>) -> Self {
        self.events = synthesizer;
        self
    }

    fn strategy(&self, member: &PlannedMember) -> &dyn MemberSynthesizer {
        match member.definition {
            MemberDefinition::Method(_) => self.methods.as_ref(),
            MemberDefinition::Property(_) | MemberDefinition::Indexer(_) => {
                self.properties.as_ref()
            }
            MemberDefinition::Event(_) => self.events.as_ref(),
        }
    }
}

impl ProxyBackend for DispatchBackend {
    fn synthesize(&self, plan: &BuildPlan, factory: &InterceptorFactory) -> Result<ProxyType> {
        let mut entries = Vec::new();
        for member in &plan.members {
            entries.extend(self.strategy(member).synthesize(member, factory)?);
        }

        let proxy_type = ProxyType::new(plan, entries)?;
        tracing::debug!(
            type_name = %proxy_type.name(),
            backend = self.name(),
            forwarders = proxy_type.len(),
            "Proxy type synthesized"
        );
        Ok(proxy_type)
    }

    fn name(&self) -> &str {
        "dispatch"
    }
}
