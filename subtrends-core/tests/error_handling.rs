use std::time::Duration;
use subtrends_core::retry::get_retry_strategy;
use subtrends_core::{
    report_error, ConfigError, CoreError, ErrorExt, LlmError, RedditApiError, RetryStrategy,
};

fn anthropic_rate_limit(retry_after: Option<u64>) -> CoreError {
    CoreError::Llm(LlmError::RateLimitExceeded {
        provider: "anthropic".to_string(),
        retry_after,
    })
}

#[test]
fn test_error_codes_name_the_failing_service() {
    let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 5 });
    assert_eq!(rate_limited.error_code(), "REDDIT_RATE_LIMIT");

    let bad_key = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "anthropic".to_string(),
    });
    assert_eq!(bad_key.error_code(), "LLM_INVALID_API_KEY");

    let missing = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "REDDIT_CLIENT_ID".to_string(),
    });
    assert_eq!(missing.error_code(), "CONFIG_MISSING_ENV_VAR");

    let unknown = CoreError::NotFound {
        group: "sports".to_string(),
        available: vec!["tech".to_string()],
    };
    assert_eq!(unknown.error_code(), "GROUP_NOT_FOUND");
}

#[test]
fn test_retryability_follows_retry_strategy() {
    let cases = vec![
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 5 }),
        CoreError::RedditApi(RedditApiError::ServerError { status_code: 500 }),
        CoreError::RedditApi(RedditApiError::UnexpectedStatus { status_code: 404 }),
        CoreError::RedditApi(RedditApiError::RequestTimeout),
        CoreError::RedditApi(RedditApiError::InvalidToken),
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: "bad json".to_string(),
        }),
        CoreError::Llm(LlmError::ServiceUnavailable {
            provider: "anthropic".to_string(),
            status_code: 529,
        }),
        CoreError::Llm(LlmError::UnexpectedStatus {
            status_code: 418,
            detail: "teapot".to_string(),
        }),
        anthropic_rate_limit(None),
        CoreError::InvalidInput {
            message: "empty".to_string(),
        },
        CoreError::LimiterClosed,
    ];

    for error in cases {
        assert_eq!(
            get_retry_strategy(&error) != RetryStrategy::NoRetry,
            error.is_retryable(),
            "mismatch for {}",
            error
        );
    }

    let config_error = CoreError::Config(ConfigError::InvalidValue {
        field: "NUM_POSTS".to_string(),
        value: "many".to_string(),
    });
    assert!(!config_error.is_retryable());
}

#[test]
fn test_retry_after_only_when_server_sent_one() {
    let reddit = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(reddit.retry_after(), Some(Duration::from_secs(60)));

    assert_eq!(anthropic_rate_limit(Some(7)).retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(anthropic_rate_limit(None).retry_after(), None);

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 });
    assert!(server_error.is_retryable());
    assert_eq!(server_error.retry_after(), None);
}

#[test]
fn test_user_friendly_messages_point_at_settings() {
    let bad_credentials = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "invalid_client".to_string(),
    });
    let message = bad_credentials.user_friendly_message();
    assert!(message.contains("REDDIT_CLIENT_ID"));
    assert!(message.contains("invalid_client"));

    let timeout = CoreError::Llm(LlmError::RequestTimeout {
        provider: "anthropic".to_string(),
    });
    assert!(timeout
        .user_friendly_message()
        .contains("ANTHROPIC_REQUEST_TIMEOUT"));

    let missing = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "ANTHROPIC_API_KEY".to_string(),
    });
    assert_eq!(missing.user_friendly_message(), "ANTHROPIC_API_KEY must be set.");
}

#[test]
fn test_unknown_group_lists_alternatives() {
    let unknown = CoreError::NotFound {
        group: "sports".to_string(),
        available: vec!["ai".to_string(), "tech".to_string()],
    };
    assert_eq!(
        unknown.to_string(),
        "group 'sports' not found. Available groups: ai, tech"
    );
    assert!(unknown.user_friendly_message().ends_with("ai, tech"));

    let nothing_configured = CoreError::NotFound {
        group: "sports".to_string(),
        available: Vec::new(),
    };
    assert!(nothing_configured
        .user_friendly_message()
        .contains("SUB_<GROUP>"));
}

#[test]
fn test_report_error_handles_both_severities() {
    report_error("fetch r/worldnews", &CoreError::RedditApi(RedditApiError::RequestTimeout));
    report_error("summarize world", &anthropic_rate_limit(Some(3)));
    report_error(
        "load config",
        &CoreError::Config(ConfigError::FileNotFound {
            path: "subtrends.toml".to_string(),
        }),
    );
}
