pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use crate::download::AccessDecision;
    use crate::services::{TokenError, UpstreamError};

    async fn body_of(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_error_display_messages() {
        let err = AppError::Config("Port out of range".to_string());
        assert_eq!(err.to_string(), "Configuration error: Port out of range");

        let err = AppError::InvalidInput("driveId and itemId are required".to_string());
        assert_eq!(err.to_string(), "Invalid input: driveId and itemId are required");

        let err = AppError::Forbidden(AccessDecision::DeniedNoPrincipal);
        assert_eq!(err.to_string(), "Access denied: no matching user in the record store");
    }

    #[test]
    fn test_error_to_response_conversion() {
        let cases = vec![
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden(AccessDecision::DeniedNoRecordLink), StatusCode::FORBIDDEN),
            (AppError::Forbidden(AccessDecision::DeniedInactivePrincipal), StatusCode::FORBIDDEN),
            (AppError::NotFound("list not found".into()), StatusCode::NOT_FOUND),
            (AppError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::AuthProvider(TokenError::Transport("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Upstream(UpstreamError::Status { status: 502, url: "u".into() }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_safe_messages() {
        let err = AppError::Upstream(UpstreamError::Status {
            status: 500,
            url: "https://graph.microsoft.com/v1.0/drives/b!secret/items/01ABC".to_string(),
        });
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("graph.microsoft.com"));

        let internal = anyhow::anyhow!("Connection to 192.168.1.100:5432 failed");
        let (_, body) = body_of(AppError::Internal(internal)).await;
        assert_eq!(body, "Internal error");

        let err = AppError::AuthProvider(TokenError::Rejected {
            status: 401,
            message: "AADSTS7000215: Invalid client secret provided".into(),
        });
        let (_, body) = body_of(err).await;
        assert!(!body.contains("AADSTS"));
    }

    #[tokio::test]
    async fn test_client_errors_keep_short_message() {
        let (status, body) = body_of(AppError::Unauthenticated("missing identity header".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Authentication required: missing identity header");
    }
}
