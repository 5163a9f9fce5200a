//! AWS error classification
//!
//! Maps SDK failures onto [`FetchError`] using the `.code()` metadata
//! instead of string matching on the Debug format. Throttling and transport
//! timeouts come out retryable; everything else does not.

use aws_sdk_cloudwatch::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use cwbridge_core::FetchError;

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known AWS error codes for server-side timeouts
const TIMEOUT_CODES: &[&str] = &["RequestTimeout", "RequestTimeoutException"];

/// Classify an AWS error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> FetchError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if THROTTLING_CODES.contains(&c) => FetchError::Throttled(message),
        Some(c) if TIMEOUT_CODES.contains(&c) => FetchError::Timeout(message),
        _ => FetchError::Api {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an SDK operation error.
///
/// Client-side timeouts and dropped connections never reach the service, so
/// they carry no error code and are classified from the error kind instead.
pub fn classify_sdk_error<E, R>(error: &SdkError<E, R>) -> FetchError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match error {
        SdkError::TimeoutError(_) => {
            FetchError::Timeout(DisplayErrorContext(error).to_string())
        }
        SdkError::DispatchFailure(failure) if failure.is_timeout() || failure.is_io() => {
            FetchError::Timeout(DisplayErrorContext(error).to_string())
        }
        _ => {
            let meta = ProvideErrorMetadata::meta(error);
            match meta.message() {
                Some(message) => classify_aws_error(meta.code(), Some(message)),
                None => {
                    let message = DisplayErrorContext(error).to_string();
                    classify_aws_error(meta.code(), Some(&message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("Rate exceeded"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
            assert_eq!(err, FetchError::Throttled("Rate exceeded".to_string()));
        }
    }

    #[test]
    fn timeout_codes() {
        for code in TIMEOUT_CODES {
            let err = classify_aws_error(Some(code), Some("slow"));
            assert!(matches!(err, FetchError::Timeout(_)), "Expected Timeout for code: {code}");
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("InvalidParameterValue"), Some("bad period"));
        assert_eq!(
            err,
            FetchError::Api {
                code: Some("InvalidParameterValue".to_string()),
                message: "bad period".to_string(),
            }
        );
        assert!(!err.is_retryable());

        let err2 = classify_aws_error(None, None);
        assert!(matches!(err2, FetchError::Api { code: None, ref message } if message == "Unknown error"));
    }
}
