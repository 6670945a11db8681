use crate::core::{
    config::ProviderConfig,
    fund::{
        BenchmarkReturn, FundDataProvider, FundIdentifier, FundIds, NormalizedFundRecord,
        ReturnSet, Scalar,
    },
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use std::time::Duration;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Profile,
    Price,
    Performance,
}

impl Endpoint {
    fn segment(&self) -> &'static str {
        match self {
            Endpoint::Profile => "profile",
            Endpoint::Price => "price",
            Endpoint::Performance => "performance",
        }
    }
}

// Raw documents. Every level is optional; a substructure that is missing,
// `null` or not an object is treated as empty. Leaves stay strict.

fn object_or_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_json::Value::deserialize(deserializer)? {
        value @ serde_json::Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(D::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    #[serde(default, deserialize_with = "object_or_none")]
    fund_profile: Option<FundProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundProfile {
    fund_id: Option<Scalar>,
    ticker: Option<Scalar>,
    long_name: Option<Scalar>,
    short_name: Option<Scalar>,
    category: Option<Scalar>,
    expense_ratio: Option<Scalar>,
    cusip: Option<Scalar>,
    cit_fund_id: Option<Scalar>,
    #[serde(default, deserialize_with = "object_or_none")]
    associated_fund_ids: Option<AssociatedFundIds>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociatedFundIds {
    admiral_fund_id: Option<Scalar>,
    etf_fund_id: Option<Scalar>,
    investor_fund_id: Option<Scalar>,
    institutional_fund_id: Option<Scalar>,
    institutional_plus_fund_id: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceResponse {
    #[serde(default, deserialize_with = "object_or_none")]
    current_price: Option<CurrentPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPrice {
    #[serde(default, deserialize_with = "object_or_none")]
    daily_price: Option<DailyPrice>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyPrice {
    #[serde(default, deserialize_with = "object_or_none")]
    regular: Option<RegularPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegularPrice {
    price: Option<Scalar>,
    as_of_date: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceResponse {
    #[serde(default, deserialize_with = "object_or_none")]
    month_end_avg_annual_rtn: Option<AnnualReturns>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnualReturns {
    #[serde(default, deserialize_with = "object_or_none")]
    fund_return: Option<RawReturns>,
    #[serde(default, deserialize_with = "object_or_none")]
    benchmark_return: Option<RawReturns>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReturns {
    name: Option<Scalar>,
    ten_yr_pct: Option<Scalar>,
    five_yr_pct: Option<Scalar>,
    three_yr_pct: Option<Scalar>,
    one_yr_pct: Option<Scalar>,
    three_month_pct: Option<Scalar>,
}

impl From<RawReturns> for ReturnSet {
    fn from(raw: RawReturns) -> Self {
        ReturnSet {
            ten_yr_pct: raw.ten_yr_pct,
            five_yr_pct: raw.five_yr_pct,
            three_yr_pct: raw.three_yr_pct,
            one_yr_pct: raw.one_yr_pct,
            three_month_pct: raw.three_month_pct,
        }
    }
}

/// The three raw documents with every optional substructure replaced by an
/// empty one.
#[derive(Debug)]
struct Normalized {
    profile: FundProfile,
    fund_ids: AssociatedFundIds,
    price: RegularPrice,
    fund_return: RawReturns,
    benchmark_return: RawReturns,
}

impl Normalized {
    fn new(profile: ProfileResponse, price: PriceResponse, performance: PerformanceResponse) -> Self {
        let mut profile = profile.fund_profile.unwrap_or_default();
        let fund_ids = profile.associated_fund_ids.take().unwrap_or_default();
        let price = price
            .current_price
            .and_then(|p| p.daily_price)
            .and_then(|p| p.regular)
            .unwrap_or_default();
        let performance = performance.month_end_avg_annual_rtn.unwrap_or_default();

        Normalized {
            profile,
            fund_ids,
            price,
            fund_return: performance.fund_return.unwrap_or_default(),
            benchmark_return: performance.benchmark_return.unwrap_or_default(),
        }
    }

    fn into_record(self) -> NormalizedFundRecord {
        let Normalized {
            profile,
            fund_ids,
            price,
            fund_return,
            mut benchmark_return,
        } = self;

        NormalizedFundRecord {
            id: profile.fund_id,
            ticker: profile.ticker,
            name: profile.long_name.map(Scalar::trimmed),
            short_name: profile.short_name.map(Scalar::trimmed),
            category: profile.category.map(Scalar::trimmed),
            price: price.price,
            price_as_of_date: price.as_of_date,
            expense_ratio: profile.expense_ratio,
            fund_return: fund_return.into(),
            benchmark_return: BenchmarkReturn {
                name: benchmark_return.name.take().map(Scalar::trimmed),
                returns: benchmark_return.into(),
            },
            ids: FundIds {
                cusip: profile.cusip,
                cit_fund_id: profile.cit_fund_id,
                admiral_fund_id: fund_ids.admiral_fund_id,
                etf_fund_id: fund_ids.etf_fund_id,
                investor_fund_id: fund_ids.investor_fund_id,
                institutional_fund_id: fund_ids.institutional_fund_id,
                institutional_plus_fund_id: fund_ids.institutional_plus_fund_id,
            },
        }
    }
}

/// Fetches fund data from the (undocumented) Vanguard personal investor API.
pub struct VanguardProvider {
    base_url: String,
    client: reqwest::Client,
}

impl VanguardProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer)
                .with_context(|| format!("Invalid referer: {}", config.referer))?,
        );

        // A single client keeps connections to the provider alive across requests
        let client = reqwest::Client::builder()
            .user_agent(concat!("fundxml/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout())
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(VanguardProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint_url(&self, fund: &FundIdentifier, endpoint: Endpoint) -> String {
        format!(
            "{}/rs/ire/01/pe/fund/{}/{}/.json",
            self.base_url,
            fund,
            endpoint.segment()
        )
    }

    #[instrument(
        name = "VanguardFetch",
        skip(self),
        fields(fund = %fund, endpoint = ?endpoint)
    )]
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        fund: &FundIdentifier,
        endpoint: Endpoint,
    ) -> Result<T> {
        let url = self.endpoint_url(fund, endpoint);
        debug!("Requesting fund data from {}", url);

        let body = self.fetch_body(&url).await.map_err(request_failure)?;

        serde_json::from_slice(&body)
            .inspect_err(|e| {
                error!(
                    error = ?e,
                    response = %String::from_utf8_lossy(&body),
                    "Failed to parse fund response"
                );
            })
            .context("Failed to fetch data from Vanguard")
    }

    async fn fetch_body(&self, url: &str) -> reqwest::Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        debug!(status = %response.status(), "Received Vanguard response");
        Ok(response.bytes().await?.to_vec())
    }
}

/// Wraps a transport or status failure, naming the requested path when known.
fn request_failure(err: reqwest::Error) -> anyhow::Error {
    match err.url().map(|url| url.path().to_string()) {
        Some(path) => anyhow::Error::new(err).context(format!("Failed to fetch \"{path}\"")),
        None => anyhow::Error::new(err).context("Failed to fetch data from Vanguard"),
    }
}

#[async_trait]
impl FundDataProvider for VanguardProvider {
    async fn fetch_fund(&self, fund: &FundIdentifier) -> Result<NormalizedFundRecord> {
        let (profile, price, performance) = futures::try_join!(
            self.fetch_json::<ProfileResponse>(fund, Endpoint::Profile),
            self.fetch_json::<PriceResponse>(fund, Endpoint::Price),
            self.fetch_json::<PerformanceResponse>(fund, Endpoint::Performance),
        )?;

        Ok(Normalized::new(profile, price, performance).into_record())
    }
}
