//! Shared types for the TXLENS enrichment core.
//!
//! Raw records come in from the per-chain collectors, enriched records go
//! out to the store. Parser, detector, classifier and enhancer all speak
//! these types so none of them depends on another's internals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Platform name recorded when no rule tier could attribute a transaction.
pub const UNKNOWN_PLATFORM: &str = "Unknown";

/// Lets enums that implement `FromStr` deserialize from loose labels
/// ("sui", "Arbitrum", "FAILED") the way exports and config files write them.
macro_rules! deserialize_via_from_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let raw = String::deserialize(deserializer)?;
                    raw.parse().map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Blockchain network a record was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Sol,
    Sui,
    Eth,
    Base,
    Arb,
    Op,
    Polygon,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Sol => "SOL",
            Chain::Sui => "SUI",
            Chain::Eth => "ETH",
            Chain::Base => "BASE",
            Chain::Arb => "ARB",
            Chain::Op => "OP",
            Chain::Polygon => "POLYGON",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, accepts the labels the exports actually use.
impl std::str::FromStr for Chain {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sol" | "solana" => Ok(Chain::Sol),
            "sui" => Ok(Chain::Sui),
            "eth" | "ethereum" | "mainnet" => Ok(Chain::Eth),
            "base" => Ok(Chain::Base),
            "arb" | "arbitrum" | "arbitrum one" => Ok(Chain::Arb),
            "op" | "optimism" | "op mainnet" => Ok(Chain::Op),
            "polygon" | "matic" | "polygon pos" => Ok(Chain::Polygon),
            _ => Err(EnrichError::UnknownChain(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Direction of a token movement relative to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// +1 for IN, -1 for OUT.
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::In => Decimal::ONE,
            Direction::Out => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

/// On-chain execution status as reported by the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    #[default]
    Success,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Success => write!(f, "SUCCESS"),
            TxStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for TxStatus {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "success" | "succeeded" | "ok" | "confirmed" => Ok(TxStatus::Success),
            "failed" | "failure" | "fail" | "error" | "reverted" => Ok(TxStatus::Failed),
            other => Err(EnrichError::UnknownStatus(other.to_string())),
        }
    }
}

/// Transaction category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Swap,
    Liquidity,
    Farming,
    Transfer,
    Bridge,
    Staking,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Swap => write!(f, "SWAP"),
            Category::Liquidity => write!(f, "LIQUIDITY"),
            Category::Farming => write!(f, "FARMING"),
            Category::Transfer => write!(f, "TRANSFER"),
            Category::Bridge => write!(f, "BRIDGE"),
            Category::Staking => write!(f, "STAKING"),
            Category::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "swap" => Ok(Category::Swap),
            "liquidity" | "lp" => Ok(Category::Liquidity),
            "farming" | "farm" => Ok(Category::Farming),
            "transfer" => Ok(Category::Transfer),
            "bridge" => Ok(Category::Bridge),
            "staking" | "stake" => Ok(Category::Staking),
            "other" => Ok(Category::Other),
            _ => Err(EnrichError::UnknownCategory(s.to_string())),
        }
    }
}

deserialize_via_from_str!(Chain, TxStatus, Category);

/// How completely a record was enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    /// Every asset priced and a platform attributed.
    Verified,
    /// Partially enriched.
    Processed,
    /// Unknown platform and nothing priced.
    Unverified,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Verified => write!(f, "VERIFIED"),
            ValidationStatus::Processed => write!(f, "PROCESSED"),
            ValidationStatus::Unverified => write!(f, "UNVERIFIED"),
        }
    }
}

/// Which detection tier produced the platform, kept for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    ContractMatch,
    PatternMatch,
    ChainDefault,
    None,
}

impl DetectionMethod {
    /// Contract and pattern hits name a real counterparty; a chain default
    /// is only a generic label.
    pub fn is_counterparty(&self) -> bool {
        matches!(self, DetectionMethod::ContractMatch | DetectionMethod::PatternMatch)
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::ContractMatch => write!(f, "CONTRACT_MATCH"),
            DetectionMethod::PatternMatch => write!(f, "PATTERN_MATCH"),
            DetectionMethod::ChainDefault => write!(f, "CHAIN_DEFAULT"),
            DetectionMethod::None => write!(f, "NONE"),
        }
    }
}

/// Reason a persisted record is considered unclear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectReason {
    UnknownPlatform,
    MissingAmount,
    FailedTx,
    ZeroValue,
    Other,
}

impl DefectReason {
    pub const ALL: &'static [DefectReason] = &[
        DefectReason::UnknownPlatform,
        DefectReason::MissingAmount,
        DefectReason::FailedTx,
        DefectReason::ZeroValue,
        DefectReason::Other,
    ];
}

impl fmt::Display for DefectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectReason::UnknownPlatform => write!(f, "UNKNOWN_PLATFORM"),
            DefectReason::MissingAmount => write!(f, "MISSING_AMOUNT"),
            DefectReason::FailedTx => write!(f, "FAILED_TX"),
            DefectReason::ZeroValue => write!(f, "ZERO_VALUE"),
            DefectReason::Other => write!(f, "OTHER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One token movement parsed out of a raw asset string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAsset {
    /// Always non-negative; the sign lives in `direction`.
    pub amount: Decimal,
    /// Upper-cased ticker.
    pub symbol: String,
    pub direction: Direction,
}

impl ParsedAsset {
    pub fn new(amount: Decimal, symbol: impl Into<String>, direction: Direction) -> Self {
        Self {
            amount,
            symbol: symbol.into(),
            direction,
        }
    }

    /// Amount with the direction applied (OUT is negative).
    pub fn signed_amount(&self) -> Decimal {
        self.amount * self.direction.sign()
    }
}

impl fmt::Display for ParsedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            Direction::In => "+",
            Direction::Out => "-",
        };
        write!(f, "{sign}{} {}", self.amount, self.symbol)
    }
}

/// A transaction as captured by a collector. Never mutated after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransactionRecord {
    pub chain: Chain,
    pub wallet: String,
    /// Native transaction hash / digest / signature.
    pub tx_id: String,
    #[serde(default)]
    pub tx_type: String,
    /// Composite amount strings, e.g. `"-904.000000003SUI,2647.652454USDC"`.
    #[serde(default)]
    pub raw_assets: Vec<String>,
    /// Free-text counterparty fields in field order ("Interacted with", "To", ...).
    #[serde(default)]
    pub raw_interaction: Vec<String>,
    /// Gas paid, in the chain's native unit.
    #[serde(default)]
    pub gas_fee: Option<Decimal>,
    /// Block number, slot or checkpoint.
    #[serde(default)]
    pub block: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: TxStatus,
}

impl RawTransactionRecord {
    /// Minimal record; the remaining fields are filled with the `with_*` builders.
    pub fn new(
        chain: Chain,
        wallet: impl Into<String>,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            chain,
            wallet: wallet.into(),
            tx_id: tx_id.into(),
            tx_type: String::new(),
            raw_assets: Vec::new(),
            raw_interaction: Vec::new(),
            gas_fee: None,
            block: None,
            timestamp,
            status: TxStatus::Success,
        }
    }

    pub fn with_type(mut self, tx_type: impl Into<String>) -> Self {
        self.tx_type = tx_type.into();
        self
    }

    pub fn with_asset(mut self, raw: impl Into<String>) -> Self {
        self.raw_assets.push(raw.into());
        self
    }

    pub fn with_interaction(mut self, text: impl Into<String>) -> Self {
        self.raw_interaction.push(text.into());
        self
    }

    pub fn with_status(mut self, status: TxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_gas_fee(mut self, fee: Decimal) -> Self {
        self.gas_fee = Some(fee);
        self
    }

    /// Stable identity shared with the enriched record.
    pub fn identity(&self) -> String {
        record_identity(&self.tx_id, &self.wallet)
    }

    /// No type, no asset text and no interaction text: nothing to enrich from.
    pub fn is_malformed(&self) -> bool {
        let blank = |s: &String| s.trim().is_empty();
        self.tx_type.trim().is_empty()
            && self.raw_assets.iter().all(blank)
            && self.raw_interaction.iter().all(blank)
    }
}

impl fmt::Display for RawTransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} ({})",
            self.chain,
            short(&self.tx_id),
            if self.tx_type.is_empty() { "-" } else { &self.tx_type },
            self.status,
        )
    }
}

/// A raw record plus everything the enhancer derived from it.
///
/// Holds no wall-clock fields so re-enhancing the same input is byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTransactionRecord {
    /// SHA-256 of `(tx_id, wallet)`; see [`record_identity`].
    pub id: String,
    pub raw: RawTransactionRecord,
    pub assets: Vec<ParsedAsset>,
    /// `None` means "could not price", never zero.
    pub total_usd_value: Option<Decimal>,
    pub platform: String,
    /// Every distinct platform seen, when more than one counterparty participated.
    #[serde(default)]
    pub candidate_platforms: Vec<String>,
    pub category: Category,
    pub validation_status: ValidationStatus,
    pub detection_method: DetectionMethod,
}

impl fmt::Display for EnrichedTransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let usd = match self.total_usd_value {
            Some(v) => format!("${:.2}", v),
            None => "unpriced".to_string(),
        };
        write!(
            f,
            "{} {} via {} ({}) | {} | {} assets | {}",
            self.raw,
            self.category,
            self.platform,
            self.detection_method,
            usd,
            self.assets.len(),
            self.validation_status,
        )
    }
}

impl EnrichedTransactionRecord {
    pub fn is_unknown_platform(&self) -> bool {
        self.platform == UNKNOWN_PLATFORM
    }
}

// ---------------------------------------------------------------------------
// Identity & address helpers
// ---------------------------------------------------------------------------

/// Canonical form used for address comparison and identity hashing.
///
/// `0x` hex is case-insensitive on every chain that uses it, so it is
/// lower-cased; anything else (base58) is compared exactly.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Lower-case hex SHA-256 of `"{tx_id}:{wallet}"` after address normalisation.
pub fn record_identity(tx_id: &str, wallet: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_address(tx_id).as_bytes());
    hasher.update(b":");
    hasher.update(normalize_address(wallet).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn short(s: &str) -> &str {
    match s.char_indices().nth(10) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors. Only mapping construction is fatal; everything that can
/// go wrong per record degrades into the record's status instead.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Invalid platform mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid pattern rule `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Unknown transaction status: {0}")]
    UnknownStatus(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
