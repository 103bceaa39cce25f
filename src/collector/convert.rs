//! Raw stat value conversion.
//!
//! Two rules apply to every stat key result:
//!
//! - **Unit conversion**: keys matched by [`CONVERSION_RULES`] are rescaled.
//!   CPU ratios arrive in tenths of a percent (873 means 87.3%), while CPU
//!   counts in the same family pass through untouched.
//! - **Fan-out**: every raw entry becomes its own sample. Per-node entries
//!   fill the descriptor's variable labels from the entry's device id.
//!
//! Categorization is by substring match on the stat key, so renamed keys
//! silently fall back to [`Conversion::Identity`]. Keep the table below as
//! the single place where key families are classified.

use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

use crate::collector::{CollectorError, MetricDescriptor, Sample};
use crate::stats::StatValue;

/// Unit transformation applied to a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Conversion {
    /// Emit the raw value.
    Identity,
    /// Tenths of a percent to percent (divide by 10).
    TenthsToPercent,
}

impl Conversion {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Self::Identity => raw,
            Self::TenthsToPercent => raw / 10.0,
        }
    }
}

/// Key-family classification entry.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRule {
    /// Substring identifying the family (e.g. `cpu`).
    pub family: &'static str,
    /// Substrings marking count-like keys that pass through unconverted.
    pub passthrough: &'static [&'static str],
    pub conversion: Conversion,
}

impl ConversionRule {
    fn matches(&self, key: &str) -> bool {
        key.contains(self.family)
    }
}

/// Ordered classification table; first matching family wins.
pub const CONVERSION_RULES: &[ConversionRule] = &[ConversionRule {
    family: "cpu",
    passthrough: &["count"],
    conversion: Conversion::TenthsToPercent,
}];

/// Resolve the conversion for a stat key.
pub fn conversion_for(key: &str) -> Conversion {
    CONVERSION_RULES
        .iter()
        .find(|rule| rule.matches(key))
        .map(|rule| {
            if rule.passthrough.iter().any(|p| key.contains(p)) {
                Conversion::Identity
            } else {
                rule.conversion
            }
        })
        .unwrap_or(Conversion::Identity)
}

/// Label values for one raw entry against `desc`.
///
/// Descriptors without variable labels take none; otherwise each label is
/// filled with the entry's device id (`"0"` when the engine omitted it).
fn entity_labels(desc: &MetricDescriptor, stat: &StatValue) -> Vec<String> {
    let entity = stat.devid.unwrap_or_default().to_string();
    vec![entity; desc.variable_labels().len()]
}

/// Convert every raw entry of a stat key into samples.
///
/// Zero entries yield zero samples.
///
/// # Errors
/// Propagates label arity violations from [`Sample::new`].
pub fn fan_out(
    desc: &Arc<MetricDescriptor>,
    key: &str,
    stats: &[StatValue],
) -> Result<Vec<Sample>, CollectorError> {
    let conversion = conversion_for(key);
    stats
        .iter()
        .map(|stat| Sample::new(desc, conversion.apply(stat.value), entity_labels(desc, stat)))
        .collect()
}
