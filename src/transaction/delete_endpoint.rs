//! The endpoint for deleting a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::AccountId,
    endpoints,
    transaction::{core::delete_transaction, models::TransactionId},
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub(crate) struct DeleteTransactionState {
    /// The database connection for managing transactions.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for deleting a transaction.
///
/// The delete is scoped to the logged-in account; a transaction that does
/// not exist and a transaction owned by someone else both produce the same
/// not-found response.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Extension(account_id): Extension<AccountId>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match delete_transaction(transaction_id, account_id, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::DASHBOARD_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error @ Error::NotFound) => error.into_response(),
        Err(error) => {
            tracing::error!("Could not delete transaction {transaction_id}: {error}");
            error.into_response()
        }
    }
}
