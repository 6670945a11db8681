use axum::{
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use fundxml::core::config::{AnalyticsConfig, AppConfig, ProviderConfig};
use fundxml::handler::{AppState, app_router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Fixtures shared by the tests below
mod test_utils {
    use super::*;

    pub const PROFILE_JSON: &str = r#"{
        "fundProfile": {
            "fundId": "0585",
            "ticker": "VTSAX",
            "longName": "Vanguard Total Stock Market Index Fund Admiral Shares",
            "shortName": "Total Stock Mkt Idx Adm",
            "category": "Large Blend",
            "expenseRatio": "0.0400",
            "cusip": "922908728",
            "citFundId": "1234",
            "associatedFundIds": {
                "admiralFundId": "0585",
                "etfFundId": "0970",
                "investorFundId": "0085",
                "institutionalFundId": "0855",
                "institutionalPlusFundId": "0871"
            }
        }
    }"#;

    pub const PRICE_JSON: &str = r#"{
        "currentPrice": {
            "dailyPrice": { "regular": { "price": "64.32", "asOfDate": "2019-01-04" } }
        }
    }"#;

    pub const PERFORMANCE_JSON: &str = r#"{
        "monthEndAvgAnnualRtn": {
            "fundReturn": {
                "tenYrPct": "13.28", "fiveYrPct": "7.89", "threeYrPct": "8.95",
                "oneYrPct": "-5.17", "threeMonthPct": "-14.29"
            },
            "benchmarkReturn": {
                "name": "Spliced Total Stock Market Index",
                "tenYrPct": "13.30", "fiveYrPct": "7.90", "threeYrPct": "8.96",
                "oneYrPct": "-5.17", "threeMonthPct": "-14.29"
            }
        }
    }"#;

    pub fn fund_path(fund: &str, endpoint: &str) -> String {
        format!("/rs/ire/01/pe/fund/{fund}/{endpoint}/.json")
    }

    pub async fn mount(server: &MockServer, fund: &str, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(fund_path(fund, endpoint)))
            .respond_with(response)
            .mount(server)
            .await;
    }

    pub async fn create_mock_server(
        fund: &str,
        profile: &str,
        price: &str,
        performance: &str,
    ) -> MockServer {
        let mock_server = MockServer::start().await;
        for (endpoint, body) in [
            ("profile", profile),
            ("price", price),
            ("performance", performance),
        ] {
            mount(
                &mock_server,
                fund,
                endpoint,
                ResponseTemplate::new(200).set_body_string(body),
            )
            .await;
        }
        mock_server
    }

    pub fn config_for(server: &MockServer) -> AppConfig {
        AppConfig {
            provider: ProviderConfig {
                base_url: server.uri(),
                ..ProviderConfig::default()
            },
            deadline_ms: 5_000,
            ..AppConfig::default()
        }
    }

    pub fn build_router(config: &AppConfig) -> axum::Router {
        let state = AppState::from_config(config).expect("Failed to build state");
        app_router(Arc::new(state))
    }

    pub async fn get(router: &axum::Router, uri: &str) -> Response<Body> {
        router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

use test_utils::*;

#[test_log::test(tokio::test)]
async fn test_missing_fund_returns_412() {
    let mock_server = MockServer::start().await;
    let router = build_router(&config_for(&mock_server));

    for uri in ["/", "/VTSAX/extra", "/VTSAX/"] {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), 412, "unexpected status for {uri}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());

        let body = body_text(response).await;
        assert!(body.contains("<error>"));
        assert!(body.contains("<message>Missing fund</message>"));
    }

    // Validation happens before any provider call
    let received = mock_server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_full_fund_document() {
    let mock_server =
        create_mock_server("VTSAX", PROFILE_JSON, PRICE_JSON, PERFORMANCE_JSON).await;
    let router = build_router(&config_for(&mock_server));

    let response = get(&router, "/VTSAX").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=86400");

    let body = body_text(response).await;
    info!(%body, "Rendered fund document");
    for expected in [
        "<id>0585</id>",
        "<ticker>VTSAX</ticker>",
        "<name>Vanguard Total Stock Market Index Fund Admiral Shares</name>",
        "<shortName>Total Stock Mkt Idx Adm</shortName>",
        "<category>Large Blend</category>",
        "<price>64.32</price>",
        "<priceAsOfDate>2019-01-04</priceAsOfDate>",
        "<expenseRatio>0.0400</expenseRatio>",
        "<tenYrPct>13.28</tenYrPct>",
        "<threeMonthPct>-14.29</threeMonthPct>",
        "<name>Spliced Total Stock Market Index</name>",
        "<tenYrPct>13.30</tenYrPct>",
        "<cusip>922908728</cusip>",
        "<citFundId>1234</citFundId>",
        "<admiralFundId>0585</admiralFundId>",
        "<etfFundId>0970</etfFundId>",
        "<investorFundId>0085</investorFundId>",
        "<institutionalFundId>0855</institutionalFundId>",
        "<institutionalPlusFundId>0871</institutionalPlusFundId>",
    ] {
        assert!(body.contains(expected), "{expected} missing from:\n{body}");
    }
}

#[test_log::test(tokio::test)]
async fn test_any_failed_fetch_returns_500() {
    for failing in ["profile", "price", "performance"] {
        let mock_server = MockServer::start().await;
        for (endpoint, body) in [
            ("profile", PROFILE_JSON),
            ("price", PRICE_JSON),
            ("performance", PERFORMANCE_JSON),
        ] {
            let response = if endpoint == failing {
                ResponseTemplate::new(404)
            } else {
                ResponseTemplate::new(200).set_body_string(body)
            };
            mount(&mock_server, "VTSAX", endpoint, response).await;
        }
        let router = build_router(&config_for(&mock_server));

        let response = get(&router, "/VTSAX").await;

        assert_eq!(response.status(), 500, "unexpected status when {failing} fails");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        let body = body_text(response).await;
        assert!(body.contains("<error>"));
        assert!(!body.contains("<fund>"));
        assert!(body.contains(&fund_path("VTSAX", failing)));
    }
}

#[test_log::test(tokio::test)]
async fn test_deadline_returns_500() {
    let mock_server = MockServer::start().await;
    for (endpoint, body) in [
        ("profile", PROFILE_JSON),
        ("price", PRICE_JSON),
        ("performance", PERFORMANCE_JSON),
    ] {
        mount(
            &mock_server,
            "VTSAX",
            endpoint,
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(Duration::from_secs(3)),
        )
        .await;
    }
    let config = AppConfig {
        deadline_ms: 100,
        ..config_for(&mock_server)
    };
    let router = build_router(&config);

    let response = get(&router, "/VTSAX").await;

    assert_eq!(response.status(), 500);
    let body = body_text(response).await;
    assert!(body.contains("timeout after 100ms"), "unexpected body:\n{body}");
}

#[test_log::test(tokio::test)]
async fn test_absent_benchmark_still_renders() {
    let performance = r#"{ "monthEndAvgAnnualRtn": { "fundReturn": { "oneYrPct": "-5.17" } } }"#;
    let mock_server = create_mock_server("VTSAX", PROFILE_JSON, "{}", performance).await;
    let router = build_router(&config_for(&mock_server));

    let response = get(&router, "/VTSAX").await;

    assert_eq!(response.status(), 200);
    let body = body_text(response).await;
    assert!(body.contains("<oneYrPct>-5.17</oneYrPct>"));
    assert!(body.contains("<price/>"));
    assert!(body.contains("<benchmarkReturn>"));
    assert!(body.contains("<name/>"));
}

#[test_log::test(tokio::test)]
async fn test_same_request_renders_identical_bytes() {
    let mock_server =
        create_mock_server("VTSAX", PROFILE_JSON, PRICE_JSON, PERFORMANCE_JSON).await;
    let router = build_router(&config_for(&mock_server));

    let first = body_text(get(&router, "/VTSAX").await).await;
    let second = body_text(get(&router, "/VTSAX").await).await;

    assert_eq!(first, second);
}

#[test_log::test(tokio::test)]
async fn test_page_view_is_reported() {
    let mock_server =
        create_mock_server("VTSAX", PROFILE_JSON, PRICE_JSON, PERFORMANCE_JSON).await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    let config = AppConfig {
        analytics: Some(AnalyticsConfig {
            account_id: "UA-TEST-1".to_string(),
            endpoint: format!("{}/collect", mock_server.uri()),
        }),
        ..config_for(&mock_server)
    };
    let router = build_router(&config);

    let response = get(&router, "/VTSAX?src=sheets").await;
    assert_eq!(response.status(), 200);

    // The page view is sent in the background
    let mut reported = false;
    for _ in 0..50 {
        let requests = mock_server.received_requests().await.unwrap_or_default();
        reported = requests.iter().any(|r| {
            r.url.path() == "/collect"
                && r.url
                    .query_pairs()
                    .any(|(k, v)| k == "dp" && v == "/VTSAX?src=sheets")
        });
        if reported {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reported, "page view was not reported");
}

#[test_log::test(tokio::test)]
async fn test_analytics_failure_does_not_affect_response() {
    let mock_server =
        create_mock_server("VTSAX", PROFILE_JSON, PRICE_JSON, PERFORMANCE_JSON).await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    let config = AppConfig {
        analytics: Some(AnalyticsConfig {
            account_id: "UA-TEST-1".to_string(),
            endpoint: format!("{}/collect", mock_server.uri()),
        }),
        ..config_for(&mock_server)
    };
    let router = build_router(&config);

    let response = get(&router, "/VTSAX").await;

    assert_eq!(response.status(), 200);
    assert!(body_text(response).await.contains("<ticker>VTSAX</ticker>"));
}

#[test_log::test(tokio::test)]
async fn test_fetch_command_with_config_file() {
    let mock_server =
        create_mock_server("VTSAX", PROFILE_JSON, PRICE_JSON, PERFORMANCE_JSON).await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
        deadline_ms: 5000
        provider:
          base_url: {}
    "#,
        mock_server.uri()
    );
    std::fs::write(config_file.path(), &config_content).expect("Failed to write config file");

    let result = fundxml::run_command(
        fundxml::AppCommand::Fetch("VTSAX".to_string()),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Fetch failed with: {:?}", result.err());

    let result = fundxml::run_command(
        fundxml::AppCommand::Fetch("MISSING".to_string()),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}
