use crate::types::{AccountId, BankId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors (fatal, raised before any graph mutation) ──
    #[error("The length of in-degree ({in_len}) and out-degree ({out_len}) sequences must be same.")]
    DegreeLengthMismatch { in_len: usize, out_len: usize },

    #[error("The sum of in-degree ({in_sum}) and out-degree ({out_sum}) must be same.")]
    DegreeMismatch { in_sum: usize, out_sum: usize },

    #[error("The number of total accounts ({accounts}) must be a multiple of the degree sequence length ({length}).")]
    NotATileMultiple { accounts: usize, length: usize },

    #[error("Degree sequence covers {nodes} nodes but {accounts} accounts were loaded")]
    AccountCountMismatch { nodes: usize, accounts: usize },

    #[error("Unknown normal model type '{name}'")]
    UnknownNormalModel { name: String },

    #[error("Margin ratio in AML typologies ({ratio}) must be within [0.0, 1.0]")]
    InvalidMarginRatio { ratio: f64 },

    #[error("No such bank ID: '{bank_id}'")]
    NoSuchBank { bank_id: BankId },

    #[error("Invalid {table} row {row}: {reason}")]
    InvalidRow { table: &'static str, row: usize, reason: String },

    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: &'static str, column: &'static str },

    #[error("Invalid value '{value}' for column '{column}' in {table} row {row}")]
    BadValue { table: &'static str, row: usize, column: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Resource exhaustion (recoverable per instance) ──
    #[error("Insufficient candidates in pool '{pool}': requested {requested}, available {available}")]
    InsufficientCandidates { pool: String, requested: usize, available: usize },

    #[error("No main account candidates found in pool '{pool}' (degree threshold {threshold})")]
    NoHubCandidates { pool: String, threshold: usize },

    #[error("No bank other than '{exclude}' has {needed} remaining accounts")]
    NoEligibleBank { exclude: BankId, needed: usize },

    // ── Invariant violations (always fatal) ──
    #[error("Fan breakdown for account {account} cannot reach degree threshold {threshold}: no clump can donate")]
    BreakdownInvariantViolation { account: AccountId, threshold: usize },

    #[error("Self loop from/to {account} is not allowed for transaction networks")]
    SelfTransaction { account: AccountId },

    #[error("Account {account} is already claimed")]
    DuplicateClaim { account: AccountId },

    #[error("Account {account} does not exist")]
    UnknownAccount { account: AccountId },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    /// Pool exhaustion that only invalidates a single typology instance.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCandidates { .. }
                | Self::NoHubCandidates { .. }
                | Self::NoEligibleBank { .. }
        )
    }
}

pub type GenResult<T> = Result<T, GenError>;
