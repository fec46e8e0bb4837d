use std::path::Path;

use themine_core::constants::DEFAULT_MAX_CONTRIBUTION_WEI;
use themine_core::error::SaleError;
use themine_core::params::{SaleParams, TokenEconomics};
use themine_core::types::{Address, Tick};

/// Read and validate sale parameters from a JSON file.
///
/// `economics` and `max_contribution` may be omitted and fall back to the
/// deployment defaults.
pub fn load_params(path: &Path) -> Result<SaleParams, SaleError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SaleError::InvalidParams(format!("{}: {e}", path.display())))?;
    let params: SaleParams = serde_json::from_str(&text)
        .map_err(|e| SaleError::InvalidParams(format!("{}: {e}", path.display())))?;
    params.validate()?;
    Ok(params)
}

/// Well-known development address `0x00…00nn`.
pub fn dev_address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::from_bytes(bytes)
}

/// Development parameters: admins `0x…01`–`0x…03`, KYC validator `0x…04`,
/// presale account `0x…05`, three 100-tick rounds from `funding_start`.
pub fn dev_params(funding_start: Tick) -> SaleParams {
    SaleParams {
        admins: [dev_address(1), dev_address(2), dev_address(3)],
        kyc_validator: dev_address(4),
        presale_account: dev_address(5),
        funding_start,
        funding_round_duration: 300,
        minting_prepare_delay: 50,
        minting_commit_delay: 50,
        max_contribution: DEFAULT_MAX_CONTRIBUTION_WEI,
        economics: TokenEconomics::default(),
    }
}
