/// ─── TheMine Token Sale Constants ────────────────────────────────────────────
///
/// Token:       MINE (18 decimals)
/// Base unit:   wei (1 ETH = 10^18 wei)
///
/// Every value here is a default. Deployments override them through
/// `TokenEconomics` in the sale parameters.

// ── Units ────────────────────────────────────────────────────────────────────

/// Decimal places of the MINE token.
pub const TOKEN_DECIMALS: u32 = 18;

/// 1 MINE expressed in its smallest unit.
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// 1 ETH expressed in wei.
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

// ── Allocations ──────────────────────────────────────────────────────────────

/// Presale allocation, credited to the presale account at construction.
pub const TOKENS_PRESALE: u128 = 200_000 * UNITS_PER_TOKEN;

/// Team allocation, credited to the finalize beneficiary when the sale closes.
pub const TOKENS_TEAM: u128 = 100_000 * UNITS_PER_TOKEN;

/// Minimum total supply (presale included) for the sale to succeed.
pub const TOKEN_CREATED_MIN: u128 = 300_000 * UNITS_PER_TOKEN;

// ── Conversion ───────────────────────────────────────────────────────────────

/// ETH/USD rate used for the whole sale, in US cents.
pub const ETH_USD_EXCHANGE_RATE_IN_CENTS: u128 = 50_000;

/// Bonus multipliers in percent for rounds one, two and three.
pub const TOKEN_FIRST_BONUS_MULTIPLIER: u128 = 125;
pub const TOKEN_SECOND_BONUS_MULTIPLIER: u128 = 115;
pub const TOKEN_THIRD_BONUS_MULTIPLIER: u128 = 105;

/// Fixed divisor applied to the contributed wei before multiplying:
/// 100 (cents → dollars) × 100 (percent → ratio).
///
/// tokens = rate_cents × bonus_percent × floor(wei / CONVERSION_DIVISOR)
///
/// With the defaults, 1 ETH in round one yields exactly 625 MINE.
pub const CONVERSION_DIVISOR: u128 = 10_000;

// ── Contribution limits ──────────────────────────────────────────────────────

/// Smallest accepted contribution: 0.01 ETH.
pub const MIN_CONTRIBUTION_WEI: u128 = 10_000_000_000_000_000;

/// Default contribution ceiling: 20 ETH.
pub const DEFAULT_MAX_CONTRIBUTION_WEI: u128 = 20 * WEI_PER_ETH;

// ── Governance ───────────────────────────────────────────────────────────────

/// Number of administrators.
pub const ADMIN_COUNT: usize = 3;

/// Distinct administrator confirmations required for privileged actions.
pub const ADMIN_QUORUM: usize = 2;

/// Confirmations required from the KYC validator role.
pub const KYC_QUORUM: usize = 1;

/// Number of bonus rounds the funding period is split into.
pub const FUNDING_ROUNDS: u64 = 3;
