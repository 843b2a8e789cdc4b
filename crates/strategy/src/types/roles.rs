use std::fmt;

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

/// Capability held by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Grants and revokes roles; sets the destination chain.
    Admin,
    /// The vault that funds the strategy: deposit, withdraw, direct vault ops.
    Vault,
    /// Route configuration, oracle feeds and the granular cross-chain steps.
    Manager,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Vault, Role::Manager];

    /// Canonical on-chain role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "DEFAULT_ADMIN_ROLE",
            Self::Vault => "VAULT_ROLE",
            Self::Manager => "MANAGER_ROLE",
        }
    }

    /// 32-byte role identifier as used by on-chain access control:
    /// zero for the admin role, `keccak256(name)` for the others.
    pub fn id(&self) -> B256 {
        match self {
            Self::Admin => B256::ZERO,
            _ => keccak256(self.as_str()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
