//! Fund identifiers, normalized fund records and the provider abstraction

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Display;

/// Opaque fund token taken from the request path, e.g. `VFIAX` or `0540`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FundIdentifier(String);

impl FundIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FundIdentifier {
    fn from(value: &str) -> Self {
        FundIdentifier(value.to_string())
    }
}

impl Display for FundIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A leaf value as sent by the provider. The provider mixes quoted and bare
/// numbers, so values are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl Scalar {
    pub fn trimmed(self) -> Self {
        match self {
            Scalar::Text(text) => Scalar::Text(text.trim().to_string()),
            other => other,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            Scalar::Number(number) => write!(f, "{number}"),
            Scalar::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

/// Average annual returns, updated monthly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSet {
    pub ten_yr_pct: Option<Scalar>,
    pub five_yr_pct: Option<Scalar>,
    pub three_yr_pct: Option<Scalar>,
    pub one_yr_pct: Option<Scalar>,
    pub three_month_pct: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkReturn {
    pub name: Option<Scalar>,
    pub returns: ReturnSet,
}

/// Identifiers of the same fund in other share classes and registries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundIds {
    pub cusip: Option<Scalar>,
    /// Collective investment trust
    pub cit_fund_id: Option<Scalar>,
    pub admiral_fund_id: Option<Scalar>,
    pub etf_fund_id: Option<Scalar>,
    pub investor_fund_id: Option<Scalar>,
    pub institutional_fund_id: Option<Scalar>,
    pub institutional_plus_fund_id: Option<Scalar>,
}

/// Merged view of the profile, price and performance documents of one fund.
///
/// The shape is fixed: every field exists regardless of what the provider
/// returned, and absent values stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFundRecord {
    pub id: Option<Scalar>,
    pub ticker: Option<Scalar>,
    pub name: Option<Scalar>,
    pub short_name: Option<Scalar>,
    pub category: Option<Scalar>,
    pub price: Option<Scalar>,
    pub price_as_of_date: Option<Scalar>,
    pub expense_ratio: Option<Scalar>,
    pub fund_return: ReturnSet,
    pub benchmark_return: BenchmarkReturn,
    pub ids: FundIds,
}

#[async_trait]
pub trait FundDataProvider: Send + Sync {
    async fn fetch_fund(&self, fund: &FundIdentifier) -> Result<NormalizedFundRecord>;
}
