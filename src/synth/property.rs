//! Property and indexer synthesis
//!
//! Standard properties run both accessors through the method pipeline;
//! index arguments travel first in the parameter array. Clean properties
//! bypass the pipeline on the getter and run the setter through a
//! restricted chain holding only `NotifyPropertyChanged`.

use super::forwarder::Forwarder;
use super::MemberSynthesizer;
use crate::binding::InterceptorFactory;
use crate::definition::MemberDefinition;
use crate::descriptor::MemberKey;
use crate::error::{InterceptError, Result};
use crate::interceptor::{Interceptor, NotifyPropertyChanged};
use crate::options::AccessorPolicy;
use crate::plan::PlannedMember;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct PropertySynthesizer;

impl MemberSynthesizer for PropertySynthesizer {
    fn synthesize(
        &self,
        member: &PlannedMember,
        factory: &InterceptorFactory,
    ) -> Result<Vec<(MemberKey, Forwarder)>> {
        let (MemberDefinition::Property(property) | MemberDefinition::Indexer(property)) =
            &member.definition
        else {
            return Err(InterceptError::Synthesis {
                type_name: member.name().to_string(),
                reason: "property synthesizer given a non-property member".to_string(),
            });
        };

        match &member.policy {
            AccessorPolicy::Standard => property
                .getter
                .iter()
                .chain(property.setter.iter())
                .map(|accessor| -> Result<(MemberKey, Forwarder)> {
                    Ok((
                        accessor.key.clone(),
                        Forwarder::pipeline(accessor, member.callback, factory)?,
                    ))
                })
                .collect(),
            AccessorPolicy::Clean { notify_member } => {
                let (Some(getter), Some(setter)) = (&property.getter, &property.setter) else {
                    return Err(InterceptError::Synthesis {
                        type_name: property.declaring_type.clone(),
                        reason: format!(
                            "clean property '{}' needs both a getter and a setter",
                            property.name
                        ),
                    });
                };

                let notify: Arc<dyn Interceptor> =
                    Arc::new(NotifyPropertyChanged::new(notify_member.clone()));
                Ok(vec![
                    (
                        getter.key.clone(),
                        Forwarder::transparent(getter, member.callback)?,
                    ),
                    (
                        setter.key.clone(),
                        Forwarder::restricted(setter, member.callback, vec![notify])?,
                    ),
                ])
            }
        }
    }
}
