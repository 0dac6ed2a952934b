//! The endpoint for recording a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    account::AccountId,
    endpoints,
    html::form_error,
    transaction::{
        models::{Category, Direction, PaymentChannel},
        core::{NewTransaction, create_transaction},
    },
};

/// The state needed to record a transaction.
#[derive(Debug, Clone)]
pub(crate) struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The date format used by `<input type="date">`.
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The raw data entered into the record-transaction form.
#[derive(Deserialize)]
pub(crate) struct CreateTransactionForm {
    /// income or expense.
    pub(crate) direction: Direction,
    /// The non-negative amount of money.
    pub(crate) amount: f64,
    /// The spending category.
    pub(crate) category: Category,
    /// online or cash.
    pub(crate) channel: PaymentChannel,
    /// The transaction date in `YYYY-MM-DD` form.
    pub(crate) date: String,
}

/// A route handler for recording a transaction.
///
/// This endpoint sits behind the auth middleware, so an unauthenticated
/// request is redirected into the log-in flow before it gets here.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(account_id): Extension<AccountId>,
    Form(form): Form<CreateTransactionForm>,
) -> Response {
    let date = match Date::parse(form.date.trim(), DATE_FORMAT) {
        Ok(date) => date,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                form_error("Enter the date as YYYY-MM-DD."),
            )
                .into_response();
        }
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match create_transaction(
        NewTransaction {
            account_id,
            direction: form.direction,
            amount: form.amount,
            category: form.category,
            channel: form.channel,
            date,
        },
        &connection,
    ) {
        Ok(_) => (
            HxRedirect(endpoints::DASHBOARD_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::Validation(message)) => {
            (StatusCode::BAD_REQUEST, form_error(&message)).into_response()
        }
        Err(error) => {
            tracing::error!("Could not record transaction: {error}");
            error.into_response()
        }
    }
}
