//! Per-destination-chain bridge routes.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::errors::StrategyError;
use crate::types::ChainTokenInfo;

/// Keyed mapping `chain_id → (source token, dest token, min, max)`.
///
/// Ranges are validated on write so runtime flows only ever see
/// `min_amount <= max_amount`.
#[derive(Debug, Clone, Default)]
pub struct ChainTokenRegistry {
    routes: BTreeMap<u64, ChainTokenInfo>,
}

impl ChainTokenRegistry {
    /// Insert or overwrite the route for `chain_id`. No merging with a prior entry.
    pub fn set_token_info(
        &mut self,
        chain_id: u64,
        source_token: Address,
        dest_token: Address,
        min_amount: U256,
        max_amount: U256,
    ) -> Result<(), StrategyError> {
        if min_amount > max_amount {
            return Err(StrategyError::InvalidRange {
                chain_id,
                min_amount,
                max_amount,
            });
        }

        let info = ChainTokenInfo {
            source_token,
            dest_token,
            min_amount,
            max_amount,
        };
        let replaced = self.routes.insert(chain_id, info).is_some();

        info!(
            chain_id,
            %source_token,
            %dest_token,
            %min_amount,
            %max_amount,
            replaced,
            "bridge route set"
        );
        Ok(())
    }

    pub fn lookup(&self, chain_id: u64) -> Option<ChainTokenInfo> {
        self.routes.get(&chain_id).copied()
    }

    /// All routes, ordered by chain id.
    pub fn routes(&self) -> Vec<(u64, ChainTokenInfo)> {
        self.routes.iter().map(|(id, info)| (*id, *info)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const SRC: Address = address!("0000000000000000000000000000000000000001");
    const DEST: Address = address!("0000000000000000000000000000000000000002");
    const OTHER: Address = address!("0000000000000000000000000000000000000003");

    #[test]
    fn test_set_and_lookup() {
        let mut registry = ChainTokenRegistry::default();
        registry
            .set_token_info(137, SRC, DEST, U256::from(10u64), U256::from(1_000u64))
            .unwrap();

        let info = registry.lookup(137).unwrap();
        assert_eq!(info.source_token, SRC);
        assert_eq!(info.dest_token, DEST);
        assert!(info.accepts(U256::from(10u64)));
        assert!(info.accepts(U256::from(1_000u64)));
        assert!(!info.accepts(U256::from(9u64)));
        assert!(registry.lookup(1).is_none());
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let mut registry = ChainTokenRegistry::default();
        assert!(registry
            .set_token_info(1, SRC, DEST, U256::from(5u64), U256::from(5u64))
            .is_ok());
    }

    #[test]
    fn test_inverted_range_rejected_and_prior_entry_kept() {
        let mut registry = ChainTokenRegistry::default();
        registry
            .set_token_info(137, SRC, DEST, U256::from(1u64), U256::from(2u64))
            .unwrap();

        let err = registry
            .set_token_info(137, SRC, OTHER, U256::from(60u64), U256::from(50u64))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidRange { chain_id: 137, .. }));
        assert_eq!(registry.lookup(137).unwrap().dest_token, DEST);
    }

    #[test]
    fn test_overwrite_replaces_whole_entry() {
        let mut registry = ChainTokenRegistry::default();
        registry
            .set_token_info(137, SRC, DEST, U256::from(1u64), U256::from(100u64))
            .unwrap();
        registry
            .set_token_info(137, OTHER, OTHER, U256::from(50u64), U256::from(60u64))
            .unwrap();

        let info = registry.lookup(137).unwrap();
        assert_eq!(info.source_token, OTHER);
        assert_eq!(info.min_amount, U256::from(50u64));
        assert_eq!(registry.routes().len(), 1);
    }
}
