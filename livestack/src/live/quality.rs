use serde::{Deserialize, Serialize};

use super::LiveStackItem;

/// Acceptance test applied to a frame before it is stacked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", content = "value", rename_all = "snake_case")]
pub enum QualityGate {
    /// Mean HFR strictly below the value.
    HfrBelow(f64),
    /// Detected star count strictly above the value.
    StarsAbove(f64),
    /// Guiding RMS in arcseconds strictly below the value. Frames without a
    /// recorded RMS pass.
    RmsBelow(f64),
}

impl Default for QualityGate {
    fn default() -> Self {
        QualityGate::HfrBelow(10.0)
    }
}

impl QualityGate {
    pub fn name(&self) -> &'static str {
        match self {
            QualityGate::HfrBelow(_) => "HFR below threshold",
            QualityGate::StarsAbove(_) => "Stars above threshold",
            QualityGate::RmsBelow(_) => "RMS arcsec below threshold",
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            QualityGate::HfrBelow(v) | QualityGate::StarsAbove(v) | QualityGate::RmsBelow(v) => v,
        }
    }

    pub fn passes(&self, item: &LiveStackItem) -> bool {
        match *self {
            QualityGate::HfrBelow(v) => item.hfr < v,
            QualityGate::StarsAbove(v) => item.stars.len() as f64 > v,
            QualityGate::RmsBelow(v) => item.rms.is_none_or(|rms| rms.arcsec() < v),
        }
    }
}

/// Gates `item` does not pass, in configuration order.
pub fn failed_gates<'a>(gates: &'a [QualityGate], item: &LiveStackItem) -> Vec<&'a QualityGate> {
    gates.iter().filter(|gate| !gate.passes(item)).collect()
}
