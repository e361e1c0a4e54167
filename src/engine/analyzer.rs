//! Post-hoc quality analysis over the enriched store.
//!
//! Read-only reducers: [`analyze_unclear`] buckets records by defect reason,
//! [`EnhancementSummary`] tallies what the store contains. Neither mutates
//! its input.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use crate::types::{
    Category, Chain, DefectReason, DetectionMethod, EnrichedTransactionRecord, TxStatus,
    ValidationStatus,
};

const TOP_PLATFORMS: usize = 10;

// ---------------------------------------------------------------------------
// Defect report
// ---------------------------------------------------------------------------

/// Overall data-quality tier from the identification rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl QualityGrade {
    pub fn from_rate(rate: Decimal) -> Self {
        if rate >= dec!(95) {
            QualityGrade::Excellent
        } else if rate >= dec!(85) {
            QualityGrade::Good
        } else if rate >= dec!(70) {
            QualityGrade::Fair
        } else {
            QualityGrade::NeedsWork
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityGrade::Excellent => write!(f, "Excellent"),
            QualityGrade::Good => write!(f, "Good"),
            QualityGrade::Fair => write!(f, "Fair"),
            QualityGrade::NeedsWork => write!(f, "Needs work"),
        }
    }
}

/// Records grouped by defect reason. A record can sit in several buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectReport {
    pub total: usize,
    /// Every reason is present, possibly with an empty list.
    pub buckets: BTreeMap<DefectReason, Vec<String>>,
    /// Bucket size × 100 / total, one decimal place.
    pub percentages: BTreeMap<DefectReason, Decimal>,
    /// Records with no defect at all.
    pub identified_count: usize,
    pub identification_rate: Decimal,
    pub grade: QualityGrade,
}

impl DefectReport {
    pub fn count(&self, reason: DefectReason) -> usize {
        self.buckets.get(&reason).map_or(0, Vec::len)
    }

    pub fn percentage(&self, reason: DefectReason) -> Decimal {
        self.percentages.get(&reason).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn ids(&self, reason: DefectReason) -> &[String] {
        self.buckets.get(&reason).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn log(&self) {
        for reason in DefectReason::ALL {
            info!(
                reason = %reason,
                count = self.count(*reason),
                pct = %self.percentage(*reason),
                "Defect bucket"
            );
        }
        info!(
            total = self.total,
            identified = self.identified_count,
            rate = %self.identification_rate,
            grade = %self.grade,
            "Unclear-transaction analysis complete"
        );
    }
}

/// Every defect reason that applies to `record`.
pub fn defects_for(record: &EnrichedTransactionRecord) -> Vec<DefectReason> {
    let mut reasons = Vec::new();

    if record.is_unknown_platform() {
        reasons.push(DefectReason::UnknownPlatform);
    }
    if record.assets.is_empty() {
        reasons.push(DefectReason::MissingAmount);
    }
    if record.raw.status == TxStatus::Failed {
        reasons.push(DefectReason::FailedTx);
    }
    if !record.assets.is_empty() {
        let all_zero = record.assets.iter().all(|a| a.amount.is_zero());
        let priced_zero = record.total_usd_value.is_some_and(|v| v.is_zero());
        if all_zero || priced_zero {
            reasons.push(DefectReason::ZeroValue);
        }
    }
    if reasons.is_empty() && record.validation_status != ValidationStatus::Verified {
        reasons.push(DefectReason::Other);
    }

    reasons
}

/// Bucket the persisted set by defect reason.
pub fn analyze_unclear(records: &[EnrichedTransactionRecord]) -> DefectReport {
    let mut buckets: BTreeMap<DefectReason, Vec<String>> = DefectReason::ALL
        .iter()
        .map(|reason| (*reason, Vec::new()))
        .collect();
    let mut identified_count = 0;

    for record in records {
        let reasons = defects_for(record);
        if reasons.is_empty() {
            identified_count += 1;
        }
        for reason in reasons {
            buckets.entry(reason).or_default().push(record.id.clone());
        }
    }

    let total = records.len();
    let percentages = buckets
        .iter()
        .map(|(reason, ids)| (*reason, percent(ids.len(), total)))
        .collect();
    let identification_rate = percent(identified_count, total);

    DefectReport {
        total,
        buckets,
        percentages,
        identified_count,
        identification_rate,
        grade: QualityGrade::from_rate(identification_rate),
    }
}

/// `count × 100 / total` to one decimal place; zero for an empty set.
fn percent(count: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(count) * dec!(100) / Decimal::from(total)).round_dp(1)
}

// ---------------------------------------------------------------------------
// Enhancement summary
// ---------------------------------------------------------------------------

/// Totals over an enriched set, for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementSummary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_status: BTreeMap<ValidationStatus, usize>,
    pub by_method: BTreeMap<DetectionMethod, usize>,
    /// Known platforms by record count, descending, ties by name.
    pub top_platforms: Vec<(String, usize)>,
    pub priced_count: usize,
    pub total_usd: Decimal,
    /// Mean over priced records only.
    pub average_usd: Option<Decimal>,
    /// Native-unit gas per chain.
    pub gas_by_chain: BTreeMap<Chain, Decimal>,
    /// Share of records with a known platform, percent.
    pub identification_rate: Decimal,
}

impl EnhancementSummary {
    pub fn from_records(records: &[EnrichedTransactionRecord]) -> Self {
        let mut by_category = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        let mut by_method = BTreeMap::new();
        let mut platforms: BTreeMap<&str, usize> = BTreeMap::new();
        let mut gas_by_chain: BTreeMap<Chain, Decimal> = BTreeMap::new();
        let mut total_usd = Decimal::ZERO;
        let mut priced_count = 0;

        for record in records {
            *by_category.entry(record.category).or_insert(0) += 1;
            *by_status.entry(record.validation_status).or_insert(0) += 1;
            *by_method.entry(record.detection_method).or_insert(0) += 1;
            if !record.is_unknown_platform() {
                *platforms.entry(record.platform.as_str()).or_insert(0) += 1;
            }
            if let Some(usd) = record.total_usd_value {
                match total_usd.checked_add(usd) {
                    Some(sum) => {
                        total_usd = sum;
                        priced_count += 1;
                    }
                    None => warn!(id = %record.id, usd = %usd, "USD total overflowed, record left out of volume"),
                }
            }
            if let Some(gas) = record.raw.gas_fee {
                let chain_gas = gas_by_chain.entry(record.raw.chain).or_default();
                match chain_gas.checked_add(gas) {
                    Some(sum) => *chain_gas = sum,
                    None => warn!(id = %record.id, gas = %gas, "Gas total overflowed, fee left out"),
                }
            }
        }

        let known: usize = platforms.values().sum();
        let mut top_platforms: Vec<(String, usize)> = platforms
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        // BTreeMap iteration already orders names; a stable sort keeps that for ties.
        top_platforms.sort_by(|a, b| b.1.cmp(&a.1));
        top_platforms.truncate(TOP_PLATFORMS);

        let average_usd = (priced_count > 0)
            .then(|| (total_usd / Decimal::from(priced_count)).round_dp(2));

        Self {
            total: records.len(),
            by_category,
            by_status,
            by_method,
            top_platforms,
            priced_count,
            total_usd,
            average_usd,
            gas_by_chain,
            identification_rate: percent(known, records.len()),
        }
    }

    pub fn log(&self) {
        for (category, count) in &self.by_category {
            info!(category = %category, count, "Records by category");
        }
        for (status, count) in &self.by_status {
            info!(status = %status, count, "Records by validation status");
        }
        for (method, count) in &self.by_method {
            info!(method = %method, count, "Records by detection method");
        }
        for (platform, count) in &self.top_platforms {
            info!(platform = %platform, count, "Top platform");
        }
        for (chain, gas) in &self.gas_by_chain {
            info!(chain = %chain, gas = %gas, "Gas paid");
        }
        info!(
            total = self.total,
            priced = self.priced_count,
            volume = format!("${:.2}", self.total_usd),
            average = self.average_usd.map(|v| format!("${v:.2}")).unwrap_or_else(|| "n/a".into()),
            identified_pct = %self.identification_rate,
            "Enhancement summary"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
