//! `ShopError` as an HTTP response: `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::{ErrorKind, ShopError};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::BusinessRule => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let error = if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (kind.status(), Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderStatus, PromoRejection};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ShopError::EmptyCart, StatusCode::BAD_REQUEST),
            (ShopError::InsufficientStock { product: "X".into() }, StatusCode::BAD_REQUEST),
            (ShopError::Promo(PromoRejection::Expired), StatusCode::BAD_REQUEST),
            (ShopError::Promo(PromoRejection::NotFound), StatusCode::NOT_FOUND),
            (ShopError::NotCancellable(OrderStatus::Shipped), StatusCode::BAD_REQUEST),
            (ShopError::OrderAlreadyCancelled, StatusCode::CONFLICT),
            (ShopError::NotPurchased, StatusCode::FORBIDDEN),
            (ShopError::AlreadyReviewed, StatusCode::CONFLICT),
            (ShopError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ShopError::Corrupt("bad row".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
