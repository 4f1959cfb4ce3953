// src/error.rs
use log::error;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Failures of the order placement workflow, in the order they are checked.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid order type")]
    InvalidOrderType,
    #[error("Quantity must be positive")]
    NonPositiveQuantity,
    #[error("Price must be positive")]
    NonPositivePrice,
    #[error("User not found")]
    UserNotFound,
    #[error("Stock not found")]
    StockNotFound,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Insufficient shares")]
    InsufficientShares,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Method {method} Not Allowed")]
    MethodNotAllowed { method: String, allow: &'static str },
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return ApiError::bad_request("Resource already exists");
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::bad_request("Referenced resource does not exist");
            }
        }
        error!("Database error: {}", e);
        ApiError::Internal
    }
}

// Every placement failure except a database fault is a 400, including
// missing users and stocks: they are dependencies of the order, not the
// resource being fetched.
impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Database(db) => ApiError::from(db),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
