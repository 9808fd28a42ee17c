//! Method synthesis

use super::forwarder::Forwarder;
use super::MemberSynthesizer;
use crate::binding::InterceptorFactory;
use crate::definition::MemberDefinition;
use crate::descriptor::MemberKey;
use crate::error::{InterceptError, Result};
use crate::plan::PlannedMember;

/// Forwarders for plain and generic methods
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodSynthesizer;

impl MemberSynthesizer for MethodSynthesizer {
    fn synthesize(
        &self,
        member: &PlannedMember,
        factory: &InterceptorFactory,
    ) -> Result<Vec<(MemberKey, Forwarder)>> {
        let MemberDefinition::Method(method) = &member.definition else {
            return Err(InterceptError::Synthesis {
                type_name: member.name().to_string(),
                reason: "method synthesizer given a non-method member".to_string(),
            });
        };

        let forwarder = Forwarder::pipeline(method, member.callback, factory)?;
        Ok(vec![(method.key.clone(), forwarder)])
    }
}
