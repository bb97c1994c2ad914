//! Target Calculator
//!
//! Derives three take-profit levels and a stop-loss from the entry price,
//! the signal's confidence and a volatility estimate.
//!
//! - Profit distances: `base_profit_pct × {1.0, 2.0, 3.5} × conf_mult × vol_mult`
//! - Stop distance: `base_stop_pct × (1 + (100 - confidence)/100) × vol_mult`
//!
//! Lower confidence shrinks the profit targets and widens the stop.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::types::{Direction, Targets};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Base favourable move for TP1 at full confidence (0.01 = 1%)
    pub base_profit_pct: f64,
    /// Multipliers of the base move for TP1, TP2, TP3 (strictly increasing)
    pub tp_multipliers: [f64; 3],
    /// Base adverse move for the stop (0.008 = 0.8%)
    pub base_stop_pct: f64,
    /// Volatility that maps to a multiplier of 1.0
    pub reference_volatility: f64,
    pub volatility_clamp_min: f64,
    pub volatility_clamp_max: f64,
    /// Floor on `confidence / 100` so a zero-confidence signal still has
    /// targets strictly away from entry
    pub min_confidence_multiplier: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_profit_pct: 0.01,
            tp_multipliers: [1.0, 2.0, 3.5],
            base_stop_pct: 0.008,
            reference_volatility: 0.02,
            volatility_clamp_min: 0.5,
            volatility_clamp_max: 2.0,
            min_confidence_multiplier: 0.1,
        }
    }
}

impl TargetConfig {
    /// Check that every confidence/volatility in range yields ordered levels
    pub fn validate(&self) -> Result<()> {
        let [m1, m2, m3] = self.tp_multipliers;
        if !(m1 > 0.0 && m1 < m2 && m2 < m3) {
            return Err(TrackerError::InvalidInput(format!(
                "tp_multipliers must be positive and strictly increasing, got {:?}",
                self.tp_multipliers
            )));
        }
        if !(self.base_profit_pct > 0.0 && self.base_profit_pct.is_finite()) {
            return Err(TrackerError::InvalidInput(
                "base_profit_pct must be positive".to_string(),
            ));
        }
        if !(self.base_stop_pct > 0.0) {
            return Err(TrackerError::InvalidInput(
                "base_stop_pct must be positive".to_string(),
            ));
        }
        if !(self.reference_volatility > 0.0) {
            return Err(TrackerError::InvalidInput(
                "reference_volatility must be positive".to_string(),
            ));
        }
        if !(self.volatility_clamp_min > 0.0
            && self.volatility_clamp_min <= self.volatility_clamp_max)
        {
            return Err(TrackerError::InvalidInput(format!(
                "volatility clamp [{}, {}] is empty or non-positive",
                self.volatility_clamp_min, self.volatility_clamp_max
            )));
        }
        if !(self.min_confidence_multiplier > 0.0 && self.min_confidence_multiplier <= 1.0) {
            return Err(TrackerError::InvalidInput(
                "min_confidence_multiplier must be in (0, 1]".to_string(),
            ));
        }
        // Widest stop: zero confidence at max volatility. A SHORT target
        // distance of 100% or more would put a price at or below zero.
        let widest_stop = self.base_stop_pct * 2.0 * self.volatility_clamp_max;
        let widest_tp3 = self.base_profit_pct * m3 * self.volatility_clamp_max;
        if widest_stop >= 1.0 || widest_tp3 >= 1.0 {
            return Err(TrackerError::InvalidInput(format!(
                "distances must stay below 100% (stop {:.4}, tp3 {:.4})",
                widest_stop, widest_tp3
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetCalculator {
    config: TargetConfig,
}

impl TargetCalculator {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    fn volatility_multiplier(&self, volatility: f64) -> f64 {
        (volatility / self.config.reference_volatility)
            .clamp(self.config.volatility_clamp_min, self.config.volatility_clamp_max)
    }

    fn confidence_multiplier(&self, confidence_pct: f64) -> f64 {
        (confidence_pct / 100.0).max(self.config.min_confidence_multiplier)
    }

    /// Compute TP1-TP3 and the stop for an entry
    pub fn compute(
        &self,
        entry_price: f64,
        direction: Direction,
        confidence_pct: f64,
        volatility: f64,
    ) -> Result<Targets> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(TrackerError::InvalidInput(format!(
                "entry price must be finite and positive, got {}",
                entry_price
            )));
        }
        if !confidence_pct.is_finite() || !(0.0..=100.0).contains(&confidence_pct) {
            return Err(TrackerError::InvalidInput(format!(
                "confidence must be within [0, 100], got {}",
                confidence_pct
            )));
        }
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(TrackerError::InvalidInput(format!(
                "volatility must be finite and non-negative, got {}",
                volatility
            )));
        }

        let vol_mult = self.volatility_multiplier(volatility);
        let conf_mult = self.confidence_multiplier(confidence_pct);
        let profit = |k: f64| self.config.base_profit_pct * k * conf_mult * vol_mult;
        let stop = self.config.base_stop_pct * (1.0 + (100.0 - confidence_pct) / 100.0) * vol_mult;

        let [m1, m2, m3] = self.config.tp_multipliers;
        let sign = direction.sign();

        Ok(Targets {
            tp1: entry_price * (1.0 + sign * profit(m1)),
            tp2: entry_price * (1.0 + sign * profit(m2)),
            tp3: entry_price * (1.0 + sign * profit(m3)),
            stop_loss: entry_price * (1.0 - sign * stop),
        })
    }
}

/// [`TargetCalculator::compute`] with the default parameters
pub fn compute_targets(
    entry_price: f64,
    direction: Direction,
    confidence_pct: f64,
    volatility: f64,
) -> Result<Targets> {
    TargetCalculator::default().compute(entry_price, direction, confidence_pct, volatility)
}
