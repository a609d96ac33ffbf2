//! Error conversions at the handler boundary
//!
//! Collaborators return their own typed errors; handlers translate them to
//! [`AppError`] (and thereby to HTTP statuses) through these functions.

use crate::db::repository::RepoError;
use crate::stock::StockError;
use crate::utils::AppError;

/// Repository error → HTTP-mapped application error
pub fn repo_err(e: RepoError) -> AppError {
    match e {
        RepoError::NotFound(msg) => AppError::not_found(msg),
        RepoError::Duplicate(msg) => AppError::validation(msg),
        RepoError::Validation(msg) => AppError::validation(msg),
        RepoError::Database(msg) => AppError::database(msg),
    }
}

/// Stock reconciliation error → HTTP-mapped application error
pub fn stock_err(e: StockError) -> AppError {
    match e {
        StockError::ProductNotFound(id) => AppError::not_found(format!("Product not found: {id}")),
        StockError::InsufficientStock { name } => {
            AppError::conflict(format!("Not enough stock for {name}"))
        }
        StockError::InvalidQuantity => AppError::validation("quantity must be at least 1"),
        StockError::Database(msg) => AppError::database(msg),
    }
}
