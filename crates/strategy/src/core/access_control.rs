//! Role-based access control gate.
//!
//! Holds the (principal, role) assignment set and authorizes every mutating
//! entry point of the controller. Lookups are side-effect free; only an admin
//! can change the set.

use std::collections::BTreeSet;

use alloy::primitives::Address;
use tracing::info;

use crate::errors::StrategyError;
use crate::types::Role;

#[derive(Debug, Clone, Default)]
pub struct AccessControlGate {
    assignments: BTreeSet<(Address, Role)>,
}

impl AccessControlGate {
    /// Gate with `admin` holding the admin role and nothing else.
    pub fn with_admin(admin: Address) -> Self {
        let mut gate = Self::default();
        gate.assignments.insert((admin, Role::Admin));
        gate
    }

    pub fn has_role(&self, principal: Address, role: Role) -> bool {
        self.assignments.contains(&(principal, role))
    }

    /// `Err(Unauthorized)` unless `principal` holds `role`.
    pub fn authorize(&self, principal: Address, role: Role) -> Result<(), StrategyError> {
        if self.has_role(principal, role) {
            Ok(())
        } else {
            Err(StrategyError::Unauthorized { principal, role })
        }
    }

    /// Grant `role` to `principal`. `caller` must be an admin. Idempotent.
    pub fn grant_role(
        &mut self,
        caller: Address,
        principal: Address,
        role: Role,
    ) -> Result<(), StrategyError> {
        self.authorize(caller, Role::Admin)?;
        if self.assignments.insert((principal, role)) {
            info!(%principal, role = role.as_str(), %caller, "role granted");
        }
        Ok(())
    }

    /// Revoke `role` from `principal`. `caller` must be an admin. Idempotent.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        principal: Address,
        role: Role,
    ) -> Result<(), StrategyError> {
        self.authorize(caller, Role::Admin)?;
        if self.assignments.remove(&(principal, role)) {
            info!(%principal, role = role.as_str(), %caller, "role revoked");
        }
        Ok(())
    }

    /// All principals holding `role`.
    #[cfg(test)]
    fn members(&self, role: Role) -> Vec<Address> {
        self.assignments
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(principal, _)| *principal)
            .collect()
    }
}
