//! Gate deciding whether an actor must complete account activation
//! before acting on an order.

use crate::errors::ServiceError;
use crate::models::{Actor, ActorStatus, OrderSheet};

/// Advisory for reads, mandatory before `submit`/`confirm`. Guest
/// sheets bypass the gate entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationGate;

impl ActivationGate {
    pub fn new() -> Self {
        Self
    }

    /// Returns false when the sheet is a guest order or the actor's
    /// organization is ACTIVE; true otherwise.
    pub fn requires_activation(&self, actor: Option<&Actor>, sheet: &OrderSheet) -> bool {
        if sheet.is_guest {
            return false;
        }
        match actor {
            Some(actor) => actor.status != ActorStatus::Active,
            None => true,
        }
    }

    /// Guard run ahead of mutating order operations. The error carries
    /// the actor's invite token so the caller can key the activation
    /// flow.
    pub fn ensure_may_mutate(
        &self,
        actor: Option<&Actor>,
        sheet: &OrderSheet,
    ) -> Result<(), ServiceError> {
        if self.requires_activation(actor, sheet) {
            return Err(ServiceError::ActivationRequired {
                invite_token: actor.and_then(|a| a.invite_token.clone()),
            });
        }
        Ok(())
    }
}
