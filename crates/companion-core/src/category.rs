//! Free-text category normalization.

use serde::{Deserialize, Serialize};

/// Canonical emergency-service category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceCategory {
    /// Police services.
    Police,
    /// Fire brigade.
    FireBrigade,
    /// Ambulance and medical response.
    Ambulance,
    /// Gender-based violence support.
    Gbv,
    /// Child support services.
    ChildSupport,
    /// Non-blank label matching no rule, passed through unchanged.
    Other(String),
    /// Missing or blank label.
    Unknown,
}

/// Canonical categories in display order, used to seed chart series.
pub const CANONICAL_SERVICE_CATEGORIES: [ServiceCategory; 5] = [
    ServiceCategory::Police,
    ServiceCategory::FireBrigade,
    ServiceCategory::Ambulance,
    ServiceCategory::Gbv,
    ServiceCategory::ChildSupport,
];

// First match wins. "GBV Support" must land on GBV, not Child Support.
const CATEGORY_RULES: [(&[&str], ServiceCategory); 5] = [
    (&["fire"], ServiceCategory::FireBrigade),
    (&["gbv", "gender"], ServiceCategory::Gbv),
    (&["ambulance", "medical"], ServiceCategory::Ambulance),
    (&["child", "support"], ServiceCategory::ChildSupport),
    (&["police"], ServiceCategory::Police),
];

impl ServiceCategory {
    /// Returns the display label.
    pub fn label(&self) -> &str {
        match self {
            Self::Police => "Police",
            Self::FireBrigade => "Fire Brigade",
            Self::Ambulance => "Ambulance",
            Self::Gbv => "GBV",
            Self::ChildSupport => "Child Support",
            Self::Other(raw) => raw,
            Self::Unknown => "Unknown",
        }
    }
}

/// Normalizes a free-text category label.
///
/// Matching is a case-insensitive substring test against an ordered rule
/// list; the first matching rule wins. Labels matching no rule pass through
/// as [`ServiceCategory::Other`], and missing or blank labels become
/// [`ServiceCategory::Unknown`].
pub fn normalize_category(raw: Option<&str>) -> ServiceCategory {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return ServiceCategory::Unknown;
    };

    let lowered = raw.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(_, category)| category.clone())
        .unwrap_or_else(|| ServiceCategory::Other(raw.to_string()))
}

/// Scam report risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Message judged harmless.
    Safe,
    /// Message needs caution.
    Caution,
    /// Message is a likely scam.
    HighRisk,
    /// Missing or unrecognized label.
    Unknown,
}

impl RiskLevel {
    /// Every risk level in display order.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Safe,
        RiskLevel::Caution,
        RiskLevel::HighRisk,
        RiskLevel::Unknown,
    ];

    /// Returns the display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Caution => "CAUTION",
            Self::HighRisk => "HIGH RISK",
            Self::Unknown => "Unknown",
        }
    }
}

/// Normalizes a scam risk label such as `"HIGH RISK"`, `"high_risk"` or
/// `"caution"`.
pub fn normalize_risk_level(raw: Option<&str>) -> RiskLevel {
    let Some(raw) = raw else {
        return RiskLevel::Unknown;
    };

    let upper = raw.trim().to_uppercase().replace(['_', '-'], " ");
    if upper.contains("HIGH") {
        RiskLevel::HighRisk
    } else if upper.contains("CAUTION") {
        RiskLevel::Caution
    } else if upper == "SAFE" {
        RiskLevel::Safe
    } else {
        RiskLevel::Unknown
    }
}
