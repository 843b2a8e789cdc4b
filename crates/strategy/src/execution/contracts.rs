//! Compile-time ABI definitions for the strategy's event surface via Alloy `sol!`.
//!
//! Names and argument order are fixed: off-chain indexers decode strategy
//! activity by these canonical signatures.

use alloy::sol;

sol! {
    /// Events emitted by the cross-chain strategy.
    interface IStrategyEvents {
        /// Collateral posted to the lending market.
        event Supplied(uint256 amount);

        /// Debt drawn from the lending market.
        event Borrowed(uint256 amount);

        /// Transfer initiated to the destination chain (price is WAD-scaled).
        event BridgedToDestination(
            uint256 amount,
            uint256 destinationChainId,
            uint256 price,
            address destToken
        );

        /// Compact bridge event of the manager-driven cross-chain flow.
        event BridgedToSonic(uint256 amount);

        event BeefyDeposited(uint256 amount);

        event BeefyWithdrawn(uint256 requested, uint256 returned);

        event StrategyHarvested();

        event BeefyEarned();

        event FarmedInSonic(uint256 amount);

        event WithdrawnFromSonic(uint256 amount);

        event RepaidToAave(uint256 amount);
    }
}
