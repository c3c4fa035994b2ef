use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The fixed set of document categories the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    BillOfQuantities,
    ContractsAndAgreements,
    TenderDocuments,
    ProgressReports,
    FinalReports,
    CostEstimations,
    InvoicesAndFinancials,
    DrawingsAndPlans,
    PermitsAndLicenses,
    SafetyAndCompliance,
    Other,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown document category: {0:?}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 11] = [
        Category::BillOfQuantities,
        Category::ContractsAndAgreements,
        Category::TenderDocuments,
        Category::ProgressReports,
        Category::FinalReports,
        Category::CostEstimations,
        Category::InvoicesAndFinancials,
        Category::DrawingsAndPlans,
        Category::PermitsAndLicenses,
        Category::SafetyAndCompliance,
        Category::Other,
    ];

    /// Wire and display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BillOfQuantities => "Bill of Quantities (BOQ)",
            Category::ContractsAndAgreements => "Contracts and Agreements",
            Category::TenderDocuments => "Tender Documents",
            Category::ProgressReports => "Progress Reports",
            Category::FinalReports => "Final Reports",
            Category::CostEstimations => "Cost Estimations",
            Category::InvoicesAndFinancials => "Invoices and Financials",
            Category::DrawingsAndPlans => "Drawings and Plans",
            Category::PermitsAndLicenses => "Permits and Licenses",
            Category::SafetyAndCompliance => "Safety and Compliance",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == trimmed)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for a category that may be empty while classification is
/// pending. `""` and `null` both map to `None`.
///
/// A label outside [`Category::ALL`] also decodes as `None` (shown as
/// "Uncategorized") so one stray label cannot fail a whole listing.
pub mod pending {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Category;

    pub fn serialize<S: Serializer>(value: &Option<Category>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(category) => serializer.serialize_str(category.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Category>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(label) => match label.parse() {
                Ok(category) => Ok(Some(category)),
                Err(err) => {
                    tracing::warn!(%err, "unrecognised document category; treating as uncategorized");
                    Ok(None)
                }
            },
        }
    }
}
