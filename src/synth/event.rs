//! Event synthesis
//!
//! Add and remove accessors each get the method pipeline. The accessor
//! callbacks land on the real instance, which owns the backing handler
//! storage.

use super::forwarder::Forwarder;
use super::MemberSynthesizer;
use crate::binding::InterceptorFactory;
use crate::definition::MemberDefinition;
use crate::descriptor::MemberKey;
use crate::error::{InterceptError, Result};
use crate::plan::PlannedMember;

#[derive(Debug, Clone, Copy, Default)]
pub struct EventSynthesizer;

impl MemberSynthesizer for EventSynthesizer {
    fn synthesize(
        &self,
        member: &PlannedMember,
        factory: &InterceptorFactory,
    ) -> Result<Vec<(MemberKey, Forwarder)>> {
        let MemberDefinition::Event(event) = &member.definition else {
            return Err(InterceptError::Synthesis {
                type_name: member.name().to_string(),
                reason: "event synthesizer given a non-event member".to_string(),
            });
        };

        Ok(vec![
            (
                event.add.key.clone(),
                Forwarder::pipeline(&event.add, member.callback, factory)?,
            ),
            (
                event.remove.key.clone(),
                Forwarder::pipeline(&event.remove, member.callback, factory)?,
            ),
        ])
    }
}
