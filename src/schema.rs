//! Schema variants: which records a run extracts.
//!
//! The procurement and financial-fact pipelines share every stage; they
//! differ only in the instruction document, the column set, how pages are
//! chunked and whether detected tables take priority over running text.

use crate::config::ChunkPolicy;
use crate::prompts::{FINANCIAL_FACT_INSTRUCTIONS, PROCUREMENT_INSTRUCTIONS};
use serde::{Deserialize, Serialize};

/// Procurement opportunity columns, in output order.
pub const PROCUREMENT_FIELDS: &[&str] = &[
    "agency",
    "opportunity_source_type",
    "division",
    "contract_number",
    "expected_rfp_date",
    "expected_rfp_year",
    "expected_rfp_month",
    "min_contract_value",
    "max_contract_value",
    "contract_tags",
    "contract_type",
    "contract_term",
    "short_description",
    "detailed_description",
    "key_contact",
    "incumbent",
    "procurement_method",
    "location",
    "source_url",
    "status",
];

/// Toll financial-fact columns, in output order.
pub const FINANCIAL_FACT_FIELDS: &[&str] = &[
    "asset_type",
    "asset",
    "agency",
    "as_at_date",
    "year",
    "period_reported",
    "metric_type",
    "segment",
    "value",
    "source",
    "source_url",
];

/// The record schema governing one run. Variants are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Procurement opportunities from forecasts and consultant plans. (default)
    #[default]
    Procurement,
    /// Revenue / transaction facts from toll-facility reports.
    FinancialFacts,
}

impl SchemaVariant {
    /// The built-in instruction document.
    pub fn instructions(self) -> &'static str {
        match self {
            SchemaVariant::Procurement => PROCUREMENT_INSTRUCTIONS,
            SchemaVariant::FinancialFacts => FINANCIAL_FACT_INSTRUCTIONS,
        }
    }

    /// Declared fields in column order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SchemaVariant::Procurement => PROCUREMENT_FIELDS,
            SchemaVariant::FinancialFacts => FINANCIAL_FACT_FIELDS,
        }
    }

    /// Free text splits by characters; tables must keep whole rows.
    pub fn default_chunk_policy(self) -> ChunkPolicy {
        match self {
            SchemaVariant::Procurement => ChunkPolicy::Chars(2000),
            SchemaVariant::FinancialFacts => ChunkPolicy::Rows(30),
        }
    }

    /// Whether detected tables replace a page's running text.
    pub fn default_prefer_tables(self) -> bool {
        matches!(self, SchemaVariant::FinancialFacts)
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaVariant::Procurement => "procurement",
            SchemaVariant::FinancialFacts => "financial-facts",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_schemas_carry_source_url() {
        for v in [SchemaVariant::Procurement, SchemaVariant::FinancialFacts] {
            assert!(v.fields().contains(&"source_url"), "{}", v.name());
            assert!(v.fields().contains(&"agency"), "{}", v.name());
        }
    }

    #[test]
    fn chunk_policy_per_variant() {
        assert_eq!(
            SchemaVariant::Procurement.default_chunk_policy(),
            ChunkPolicy::Chars(2000)
        );
        assert_eq!(
            SchemaVariant::FinancialFacts.default_chunk_policy(),
            ChunkPolicy::Rows(30)
        );
    }

    #[test]
    fn only_financial_facts_prefers_tables() {
        assert!(!SchemaVariant::Procurement.default_prefer_tables());
        assert!(SchemaVariant::FinancialFacts.default_prefer_tables());
    }
}
