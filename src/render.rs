//! XML rendering of fund records and errors

use crate::core::{
    HandlerError,
    fund::{NormalizedFundRecord, ReturnSet, Scalar},
};
use anyhow::Result;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::error;

pub const CONTENT_TYPE_XML: &str = "text/xml";
// TODO: expire at the next market close instead of a fixed day.
/// Fund data changes at most once per trading day.
pub const CACHE_ONE_DAY: &str = "max-age=86400";

const FALLBACK_ERROR: &str = "<error><message>Internal error</message></error>";

type XmlWriter = Writer<Vec<u8>>;

/// A rendered document plus the metadata sent with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub status: StatusCode,
    pub cache_control: Option<&'static str>,
    pub body: String,
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_XML))],
            self.body,
        )
            .into_response();
        if let Some(cache_control) = self.cache_control {
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(cache_control),
            );
        }
        response
    }
}

/// Renders a successful lookup.
pub fn success(record: &NormalizedFundRecord) -> Result<RenderedResponse, HandlerError> {
    let body = render_fund(record).map_err(|e| {
        error!(error = ?e, "Failed to render fund document");
        HandlerError::Unhandled("Failed to render fund data".to_string())
    })?;
    Ok(RenderedResponse {
        status: StatusCode::OK,
        cache_control: Some(CACHE_ONE_DAY),
        body,
    })
}

/// Renders an error document. Never fails.
pub fn failure(err: &HandlerError) -> RenderedResponse {
    let body = render_error(&err.to_string()).unwrap_or_else(|e| {
        error!(error = ?e, "Failed to render error document");
        FALLBACK_ERROR.to_string()
    });
    RenderedResponse {
        status: err.status(),
        cache_control: None,
        body,
    }
}

pub fn render_fund(record: &NormalizedFundRecord) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_block(&mut writer, "fund", |w| {
        write_leaf(w, "id", &record.id)?;
        write_leaf(w, "ticker", &record.ticker)?;
        write_leaf(w, "name", &record.name)?;
        write_leaf(w, "shortName", &record.short_name)?;
        write_leaf(w, "category", &record.category)?;

        write_leaf(w, "price", &record.price)?;
        write_leaf(w, "priceAsOfDate", &record.price_as_of_date)?;
        write_leaf(w, "expenseRatio", &record.expense_ratio)?;

        write_block(w, "fundReturn", |w| write_returns(w, &record.fund_return))?;
        write_block(w, "benchmarkReturn", |w| {
            write_leaf(w, "name", &record.benchmark_return.name)?;
            write_returns(w, &record.benchmark_return.returns)
        })?;

        let ids = &record.ids;
        write_leaf(w, "cusip", &ids.cusip)?;
        write_leaf(w, "citFundId", &ids.cit_fund_id)?;
        write_leaf(w, "admiralFundId", &ids.admiral_fund_id)?;
        write_leaf(w, "etfFundId", &ids.etf_fund_id)?;
        write_leaf(w, "investorFundId", &ids.investor_fund_id)?;
        write_leaf(w, "institutionalFundId", &ids.institutional_fund_id)?;
        write_leaf(w, "institutionalPlusFundId", &ids.institutional_plus_fund_id)
    })?;
    Ok(String::from_utf8(writer.into_inner())?)
}

pub fn render_error(message: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_block(&mut writer, "error", |w| {
        write_leaf(w, "message", &Some(Scalar::Text(message.to_string())))
    })?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_returns(writer: &mut XmlWriter, returns: &ReturnSet) -> Result<()> {
    write_leaf(writer, "tenYrPct", &returns.ten_yr_pct)?;
    write_leaf(writer, "fiveYrPct", &returns.five_yr_pct)?;
    write_leaf(writer, "threeYrPct", &returns.three_yr_pct)?;
    write_leaf(writer, "oneYrPct", &returns.one_yr_pct)?;
    write_leaf(writer, "threeMonthPct", &returns.three_month_pct)
}

fn write_block<F>(writer: &mut XmlWriter, name: &str, body: F) -> Result<()>
where
    F: FnOnce(&mut XmlWriter) -> Result<()>,
{
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    body(writer)?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Absent values become empty elements so the document shape never changes.
fn write_leaf(writer: &mut XmlWriter, name: &str, value: &Option<Scalar>) -> Result<()> {
    match value {
        Some(value) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        None => writer.write_event(Event::Empty(BytesStart::new(name)))?,
    }
    Ok(())
}
