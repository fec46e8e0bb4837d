use serde::{Deserialize, Serialize};
use themine_core::constants::{ADMIN_QUORUM, KYC_QUORUM};
use themine_core::params::SaleParams;
use themine_core::types::Address;

/// A set of identities allowed to confirm an action, and how many distinct
/// members must agree before it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    members: Vec<Address>,
    threshold: usize,
}

impl Quorum {
    /// `threshold` is clamped to `1..=members.len()`.
    pub fn new(members: Vec<Address>, threshold: usize) -> Self {
        let threshold = threshold.clamp(1, members.len().max(1));
        Self { members, threshold }
    }

    /// The 2-of-3 administrator quorum.
    pub fn admins(params: &SaleParams) -> Self {
        Self::new(params.admins.to_vec(), ADMIN_QUORUM)
    }

    /// The KYC validator acting alone.
    pub fn kyc(params: &SaleParams) -> Self {
        Self::new(vec![params.kyc_validator], KYC_QUORUM)
    }

    pub fn is_member(&self, who: &Address) -> bool {
        self.members.contains(who)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themine_core::params::TokenEconomics;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn params() -> SaleParams {
        SaleParams {
            admins: [addr(1), addr(2), addr(3)],
            kyc_validator: addr(4),
            presale_account: addr(5),
            funding_start: 10,
            funding_round_duration: 30,
            minting_prepare_delay: 10,
            minting_commit_delay: 10,
            max_contribution: 1_000,
            economics: TokenEconomics { min_contribution: 1, ..TokenEconomics::default() },
        }
    }

    #[test]
    fn admin_quorum_is_two_of_three() {
        let q = Quorum::admins(&params());
        assert_eq!(q.threshold(), 2);
        assert_eq!(q.members().len(), 3);
        assert!(q.is_member(&addr(2)));
        assert!(!q.is_member(&addr(4)));
    }

    #[test]
    fn kyc_quorum_is_the_validator_alone() {
        let q = Quorum::kyc(&params());
        assert_eq!(q.threshold(), 1);
        assert!(q.is_member(&addr(4)));
        assert!(!q.is_member(&addr(1)));
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(Quorum::new(vec![addr(1), addr(2)], 5).threshold(), 2);
        assert_eq!(Quorum::new(vec![addr(1)], 0).threshold(), 1);
    }
}
