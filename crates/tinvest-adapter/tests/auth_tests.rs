/*
[INPUT]:  Access token values and mock endpoints
[OUTPUT]: Test results for credential handling
[POS]:    Integration tests - authentication
[UPDATE]: When token handling or auth failure mapping changes
*/

mod common;

use common::{FIGI, MockStreamServer, api_base, fast_config, setup_mock_server};
use rstest::rstest;
use tinvest_adapter::{ClientConfig, InvestError, OpenApiClient, SecretToken, StreamingClient};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[rstest]
#[case("", false)]
#[case("   ", false)]
#[case("t.abc def", false)]
#[case("t.abc\tdef", false)]
#[case("t.abc\n", true)]
#[case("t.abc", true)]
fn test_token_validation(#[case] raw: &str, #[case] valid: bool) {
    let result = SecretToken::new(raw);
    if valid {
        assert_eq!(assert_ok!(result).expose(), "t.abc");
    } else {
        assert!(matches!(result, Err(InvestError::Config(_))));
    }
}

#[test]
fn test_token_is_redacted_in_debug() {
    let token = assert_ok!(SecretToken::new("t.very-secret"));
    let rendered = format!("{token:?}");
    assert!(!rendered.contains("very-secret"));
    assert_eq!(token.bearer(), "Bearer t.very-secret");
}

#[rstest]
#[case(401)]
#[case(403)]
#[tokio::test]
async fn test_rest_rejection_is_auth_error(#[case] status: u16) {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/openapi/portfolio"))
        .and(header("authorization", "Bearer t.revoked"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: api_base(&server),
        ..ClientConfig::default()
    };
    let client = assert_ok!(OpenApiClient::with_config(
        assert_ok!(SecretToken::new("t.revoked")),
        config
    ));

    let err = assert_err!(client.portfolio().await);
    assert!(err.is_auth_error());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_streaming_forbidden_is_auth_error() {
    let server = MockStreamServer::rejecting(403).await;
    let client = assert_ok!(StreamingClient::with_config(
        assert_ok!(SecretToken::new("t.revoked")),
        fast_config(&server.url)
    ));
    let _handle = client.subscribe_instrument_info(FIGI, None);

    let err = assert_err!(client.wait().await);
    assert!(matches!(err, InvestError::Unauthorized { status: 403 }));
    assert_eq!(server.auth_headers(), vec!["Bearer t.revoked".to_string()]);
}
