//! Inventory planning from demand forecasts
//!
//! Compares each stock line's share of on-hand inventory with its share of
//! demand. Shares are percentages of the respective totals, and the gap
//! between them (inventory minus demand, in percentage points) decides the
//! line's [`StockStatus`]. Orders are split across lines by demand share.

use crate::data::FeatureTable;
use crate::error::{PipelineError, Result};
use crate::pipeline::FittedPipeline;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Thresholds for stock assessment and order allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockPolicy {
    /// Gap (percentage points) below which a line is balanced
    pub balanced_band: f64,
    /// Gap (percentage points) beyond which an imbalance is significant
    pub significant_band: f64,
    /// Smallest fraction of an order any line receives before renormalizing
    pub min_order_share: f64,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            balanced_band: 5.0,
            significant_band: 15.0,
            min_order_share: 0.05,
        }
    }
}

impl StockPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set both bands
    pub fn with_bands(mut self, balanced: f64, significant: f64) -> Self {
        self.balanced_band = balanced;
        self.significant_band = significant;
        self
    }

    /// Builder method to set the per-line order floor
    pub fn with_min_order_share(mut self, share: f64) -> Self {
        self.min_order_share = share;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.balanced_band.is_finite() && self.balanced_band >= 0.0) {
            return Err(PipelineError::parameter(
                "balanced_band",
                self.balanced_band,
                "must be finite and non-negative",
            ));
        }
        if !(self.significant_band.is_finite() && self.significant_band >= self.balanced_band) {
            return Err(PipelineError::parameter(
                "significant_band",
                self.significant_band,
                "must be finite and at least balanced_band",
            ));
        }
        if !(self.min_order_share >= 0.0 && self.min_order_share < 1.0) {
            return Err(PipelineError::parameter(
                "min_order_share",
                self.min_order_share,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }

    /// Classify an inventory-minus-demand gap. The balanced band is
    /// half-open; the significant band starts strictly past its edge.
    pub fn classify(&self, difference: f64) -> StockStatus {
        if difference.abs() < self.balanced_band {
            StockStatus::Balanced
        } else if difference > self.significant_band {
            StockStatus::SignificantlyOverstocked
        } else if difference >= self.balanced_band {
            StockStatus::Overstocked
        } else if difference < -self.significant_band {
            StockStatus::SignificantlyUnderstocked
        } else {
            StockStatus::Understocked
        }
    }
}

/// On-hand quantity and expected demand of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLine {
    pub item: String,
    pub on_hand: f64,
    pub demand: f64,
}

impl StockLine {
    pub fn new(item: impl Into<String>, on_hand: f64, demand: f64) -> Self {
        Self {
            item: item.into(),
            on_hand,
            demand,
        }
    }

    /// Pair on-hand quantities with the pipeline's demand forecast for
    /// every row of `table`. Negative forecasts count as zero demand.
    /// Items are named by the table's id column, or `row {i}` without one.
    pub fn from_forecast(
        pipeline: &FittedPipeline,
        table: &FeatureTable,
        on_hand: &[f64],
    ) -> Result<Vec<StockLine>> {
        if on_hand.len() != table.n_rows() {
            return Err(PipelineError::shape(
                "stock forecast",
                format!("{} on-hand quantities", table.n_rows()),
                format!("{} on-hand quantities", on_hand.len()),
            ));
        }

        let forecast = pipeline.predict(table.features())?;

        Ok(forecast
            .iter()
            .zip(on_hand)
            .enumerate()
            .map(|(i, (&demand, &stock))| StockLine {
                item: table
                    .item_label(i)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("row {}", i)),
                on_hand: stock,
                demand: demand.max(0.0),
            })
            .collect())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("on_hand", self.on_hand), ("demand", self.demand)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::parameter(
                    format!("{} of '{}'", name, self.item),
                    value,
                    "must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// Balance between stock and demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    Balanced,
    Overstocked,
    SignificantlyOverstocked,
    Understocked,
    SignificantlyUnderstocked,
}

impl StockStatus {
    pub fn is_overstocked(&self) -> bool {
        matches!(self, Self::Overstocked | Self::SignificantlyOverstocked)
    }

    pub fn is_understocked(&self) -> bool {
        matches!(self, Self::Understocked | Self::SignificantlyUnderstocked)
    }
}

/// Assessment of one stock line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAssessment {
    pub item: String,
    pub on_hand: f64,
    pub demand: f64,
    /// Percent of total on-hand stock
    pub inventory_share: f64,
    /// Percent of total demand
    pub demand_share: f64,
    /// `inventory_share - demand_share`, in percentage points
    pub difference: f64,
    pub status: StockStatus,
}

/// Assessed stock lines, in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningReport {
    lines: Vec<LineAssessment>,
    total_on_hand: f64,
    total_demand: f64,
}

impl PlanningReport {
    pub fn lines(&self) -> &[LineAssessment] {
        &self.lines
    }

    pub fn total_on_hand(&self) -> f64 {
        self.total_on_hand
    }

    pub fn total_demand(&self) -> f64 {
        self.total_demand
    }

    /// Up to `n` overstocked lines, largest surplus first
    pub fn most_overstocked(&self, n: usize) -> Vec<&LineAssessment> {
        let mut over: Vec<&LineAssessment> =
            self.lines.iter().filter(|l| l.status.is_overstocked()).collect();
        over.sort_by(|a, b| b.difference.total_cmp(&a.difference));
        over.truncate(n);
        over
    }

    /// Up to `n` understocked lines, largest shortfall first
    pub fn most_understocked(&self, n: usize) -> Vec<&LineAssessment> {
        let mut under: Vec<&LineAssessment> =
            self.lines.iter().filter(|l| l.status.is_understocked()).collect();
        under.sort_by(|a, b| a.difference.total_cmp(&b.difference));
        under.truncate(n);
        under
    }

    /// Number of lines with the given status
    pub fn count(&self, status: StockStatus) -> usize {
        self.lines.iter().filter(|l| l.status == status).count()
    }
}

/// Compare stock shares with demand shares.
/// Lines with neither stock nor demand are left out of the report.
pub fn assess(lines: &[StockLine], policy: &StockPolicy) -> Result<PlanningReport> {
    policy.validate()?;
    for line in lines {
        line.validate()?;
    }

    let total_on_hand: f64 = lines.iter().map(|l| l.on_hand).sum();
    let total_demand: f64 = lines.iter().map(|l| l.demand).sum();

    let assessed: Vec<LineAssessment> = lines
        .iter()
        .filter(|l| l.on_hand > 0.0 || l.demand > 0.0)
        .map(|l| {
            let inventory_share = percent_of(l.on_hand, total_on_hand);
            let demand_share = percent_of(l.demand, total_demand);
            let difference = inventory_share - demand_share;
            LineAssessment {
                item: l.item.clone(),
                on_hand: l.on_hand,
                demand: l.demand,
                inventory_share,
                demand_share,
                difference,
                status: policy.classify(difference),
            }
        })
        .collect();

    let report = PlanningReport {
        lines: assessed,
        total_on_hand,
        total_demand,
    };

    info!(
        n_lines = report.lines.len(),
        overstocked = report.lines.iter().filter(|l| l.status.is_overstocked()).count(),
        understocked = report.lines.iter().filter(|l| l.status.is_understocked()).count(),
        "Assessed stock balance"
    );

    Ok(report)
}

/// Quantity of an order assigned to one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: String,
    /// Fraction of the order after flooring and renormalizing
    pub share: f64,
    pub quantity: u64,
}

/// Split `total` units across lines by demand share.
///
/// Every line's share is raised to at least `min_order_share` and the
/// shares are renormalized; with no demand at all the split is even.
/// Quantities are rounded by largest remainder so they sum to `total`.
pub fn allocate_order(total: u64, lines: &[StockLine], policy: &StockPolicy) -> Result<Vec<OrderLine>> {
    policy.validate()?;
    for line in lines {
        line.validate()?;
    }

    if lines.is_empty() {
        if total == 0 {
            return Ok(Vec::new());
        }
        return Err(PipelineError::DataError(format!(
            "cannot allocate {} units across zero stock lines",
            total
        )));
    }

    let total_demand: f64 = lines.iter().map(|l| l.demand).sum();
    let raw: Vec<f64> = if total_demand > 0.0 {
        lines
            .iter()
            .map(|l| (l.demand / total_demand).max(policy.min_order_share))
            .collect()
    } else {
        vec![1.0 / lines.len() as f64; lines.len()]
    };
    let norm: f64 = raw.iter().sum();
    let shares: Vec<f64> = raw.iter().map(|s| s / norm).collect();

    let exact: Vec<f64> = shares.iter().map(|s| s * total as f64).collect();
    let mut quantities: Vec<u64> = exact.iter().map(|q| q.floor() as u64).collect();
    let assigned: u64 = quantities.iter().sum();
    let leftover = total.saturating_sub(assigned) as usize;

    // Largest fractional part first; stable so ties favor earlier lines
    let mut by_remainder: Vec<usize> = (0..lines.len()).collect();
    by_remainder.sort_by(|&a, &b| (exact[b] - exact[b].floor()).total_cmp(&(exact[a] - exact[a].floor())));
    for &i in by_remainder.iter().cycle().take(leftover) {
        quantities[i] += 1;
    }

    debug!(total, n_lines = lines.len(), "Allocated order");

    Ok(lines
        .iter()
        .zip(shares)
        .zip(quantities)
        .map(|((line, share), quantity)| OrderLine {
            item: line.item.clone(),
            share,
            quantity,
        })
        .collect())
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}
