//! The landing page: balance summary, category chart, record-transaction
//! form and the transaction table.
//!
//! The page is anonymous-friendly: a visitor without a session sees the
//! all-zero summary and a prompt to log in instead of an error.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use charming::{
    Chart,
    component::{Legend, Title},
    element::{Tooltip, Trigger},
    series::Pie,
};
use maud::{Markup, PreEscaped, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error, Notifier,
    account::{Account, get_account_by_id},
    auth::session_account,
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        HeadElement, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, format_currency, link,
    },
    ledger::{LedgerSummary, MonthFilter, summarize},
    low_balance::{LowBalancePolicy, check_low_balance},
    navigation::NavBar,
    timezone::local_offset,
    transaction::{Category, Direction, PaymentChannel, Transaction, get_transactions_for_account},
};

/// The state needed for displaying the dashboard page.
#[derive(Clone)]
pub(crate) struct DashboardState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// The local timezone as a canonical timezone name, e.g.
    /// "Pacific/Auckland". Decides what "today" means for the date input.
    pub(crate) local_timezone: String,
    /// When to send the low-balance warning email.
    pub(crate) low_balance: LowBalancePolicy,
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
    /// Dispatches the low-balance warning email.
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            local_timezone: state.local_timezone.clone(),
            low_balance: state.low_balance,
            db_connection: state.db_connection.clone(),
            notifier: state.notifier.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<DashboardState> for Key {
    fn from_ref(state: &DashboardState) -> Self {
        state.cookie_key.clone()
    }
}

/// The query string accepted by the dashboard.
#[derive(Deserialize)]
pub(crate) struct DashboardQuery {
    /// An optional `YYYY-MM` month to narrow the ledger to.
    pub(crate) month: Option<String>,
}

/// Display the dashboard.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn get_dashboard_page(
    State(state): State<DashboardState>,
    jar: PrivateCookieJar,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let month_filter = query.month.as_deref().and_then(MonthFilter::parse);

    let account_id = match session_account(&jar) {
        Some(account_id) => account_id,
        None => return anonymous_dashboard_view().into_response(),
    };

    let (account, transactions) = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        let account = match get_account_by_id(account_id, &connection) {
            Ok(account) => account,
            // A stale session cookie for a deleted account is treated the
            // same as no session.
            Err(Error::NotFound) => return anonymous_dashboard_view().into_response(),
            Err(error) => return error.into_response(),
        };

        let date_range = month_filter.and_then(|filter| filter.date_range());
        let transactions =
            match get_transactions_for_account(account_id, date_range, &connection) {
                Ok(transactions) => transactions,
                Err(error) => return error.into_response(),
            };

        (account, transactions)
    };

    let summary = summarize(&transactions);

    let jar = check_low_balance(
        jar,
        &state.low_balance,
        &account,
        summary.balance,
        state.notifier.as_ref(),
    );

    let today = today_in(&state.local_timezone);
    let page = dashboard_view(&account, &summary, &transactions, month_filter, today);

    (jar, page).into_response()
}

fn today_in(local_timezone: &str) -> Date {
    match local_offset(local_timezone) {
        Some(offset) => OffsetDateTime::now_utc().to_offset(offset).date(),
        None => OffsetDateTime::now_utc().date(),
    }
}

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

fn anonymous_dashboard_view() -> Markup {
    let content = html! {
        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-3xl font-bold my-4" { "Ledgerly" }

            (summary_cards(&LedgerSummary::empty()))

            p class="text-gray-500 dark:text-gray-400 my-4"
            {
                (link(endpoints::LOG_IN_VIEW, "Log in"))
                " or "
                (link(endpoints::SIGN_UP_VIEW, "sign up"))
                " to start tracking your income and expenses."
            }
        }
    };

    base("Dashboard", &[], &content)
}

fn dashboard_view(
    account: &Account,
    summary: &LedgerSummary,
    transactions: &[Transaction],
    month_filter: Option<MonthFilter>,
    today: Date,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW);

    let mut head_elements = vec![HeadElement::ScriptLink(
        "/static/echarts-5-min.js".to_owned(),
    )];
    if !summary.expenses_by_category.is_empty() {
        head_elements.push(category_chart_script(&summary.expenses_by_category));
    }

    let content = html! {
        (nav_bar.render())

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold my-4" { "Hello, " (account.username) }

            (summary_cards(summary))
            (month_filter_form(month_filter))
            (record_transaction_form(today))

            @if !summary.expenses_by_category.is_empty()
            {
                div
                    id="category-chart"
                    class="w-full max-w-2xl min-h-[380px] rounded dark:bg-gray-100 my-4"
                {}
            }

            (transactions_table(transactions))
        }
    };

    base("Dashboard", &head_elements, &content)
}

fn summary_card(label: &str, amount: f64) -> Markup {
    html! {
        div class="bg-white dark:bg-gray-800 rounded shadow p-4 text-center"
        {
            p class="text-sm text-gray-500 dark:text-gray-400" { (label) }
            p class="text-xl font-bold" { (format_currency(amount)) }
        }
    }
}

fn summary_cards(summary: &LedgerSummary) -> Markup {
    html! {
        section class="grid grid-cols-1 md:grid-cols-5 gap-4 w-full max-w-4xl"
        {
            (summary_card("Total Income", summary.total_income))
            (summary_card("Total Expense", summary.total_expense))
            (summary_card("Balance", summary.balance))
            (summary_card("Online Balance", summary.online_balance))
            (summary_card("Cash Balance", summary.cash_balance))
        }
    }
}

fn month_filter_form(month_filter: Option<MonthFilter>) -> Markup {
    let selected = month_filter
        .map(|filter| filter.to_query_value())
        .unwrap_or_default();

    html! {
        form method="get" action=(endpoints::DASHBOARD_VIEW) class="flex items-end gap-x-2 my-4"
        {
            div
            {
                label for="month" class=(FORM_LABEL_STYLE) { "Month" }
                input type="month" name="month" id="month" value=(selected) class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Filter" }

            @if month_filter.is_some()
            {
                (link(endpoints::DASHBOARD_VIEW, "Show all"))
            }
        }
    }
}

fn select_input(label: &str, name: &str, options: &[(&str, &str)]) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            select name=(name) id=(name) class=(FORM_TEXT_INPUT_STYLE)
            {
                @for (value, text) in options
                {
                    option value=(value) { (text) }
                }
            }
        }
    }
}

fn record_transaction_form(today: Date) -> Markup {
    let categories: Vec<(&str, &str)> = Category::ALL
        .iter()
        .map(|category| (category.as_str(), category.label()))
        .collect();
    let today = today
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| String::new());

    html! {
        form
            hx-post=(endpoints::TRANSACTIONS_API)
            class="grid grid-cols-2 md:grid-cols-6 gap-x-2 gap-y-4 items-end w-full max-w-4xl my-4"
        {
            (select_input("Type", "direction", &[
                (Direction::Income.as_str(), "Income"),
                (Direction::Expense.as_str(), "Expense"),
            ]))

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }
                input
                    type="number"
                    name="amount"
                    id="amount"
                    min="0"
                    step="0.01"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            (select_input("Category", "category", &categories))

            (select_input("Paid via", "channel", &[
                (PaymentChannel::Online.as_str(), PaymentChannel::Online.label()),
                (PaymentChannel::Cash.as_str(), PaymentChannel::Cash.label()),
            ]))

            div
            {
                label for="date" class=(FORM_LABEL_STYLE) { "Date" }
                input
                    type="date"
                    name="date"
                    id="date"
                    value=(today)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add" }
        }
    }
}

fn transactions_table(transactions: &[Transaction]) -> Markup {
    html! {
        section class="w-full max-w-4xl overflow-x-auto"
        {
            table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Paid via" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "" }
                    }
                }

                tbody
                {
                    @for transaction in transactions
                    {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) { (transaction.date) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                @match transaction.direction
                                {
                                    Direction::Income => { "Income" }
                                    Direction::Expense => { "Expense" }
                                }
                            }
                            td class=(TABLE_CELL_STYLE) { (transaction.category.label()) }
                            td class=(TABLE_CELL_STYLE) { (transaction.channel.label()) }
                            td class=(TABLE_CELL_STYLE) { (format_currency(transaction.amount)) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                button
                                    hx-delete=(endpoints::format_endpoint(endpoints::DELETE_TRANSACTION, transaction.id))
                                    hx-confirm="Delete this transaction?"
                                    class=(BUTTON_DELETE_STYLE)
                                {
                                    "Delete"
                                }
                            }
                        }
                    }

                    @if transactions.is_empty()
                    {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) colspan="6" { "No transactions yet." }
                        }
                    }
                }
            }
        }
    }
}

fn category_chart(expenses_by_category: &[(String, f64)]) -> Chart {
    Chart::new()
        .title(Title::new().text("Expenses by category"))
        .tooltip(Tooltip::new().trigger(Trigger::Item))
        .legend(Legend::new().top("bottom"))
        .series(
            Pie::new().name("Expenses").radius(vec!["0%", "65%"]).data(
                expenses_by_category
                    .iter()
                    .map(|(label, total)| (*total, label.as_str()))
                    .collect::<Vec<_>>(),
            ),
        )
}

fn category_chart_script(expenses_by_category: &[(String, f64)]) -> HeadElement {
    let options = category_chart(expenses_by_category).to_string();

    HeadElement::ScriptSource(PreEscaped(format!(
        r#"document.addEventListener('DOMContentLoaded', function() {{
            const chartDom = document.getElementById("category-chart");
            const chart = echarts.init(chartDom);
            chart.setOption({options});
            window.addEventListener('resize', chart.resize);
        }});"#
    )))
}

#[cfg(test)]
mod dashboard_tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use rusqlite::Connection;
    use sha2::{Digest, Sha512};
    use time::macros::date;

    use crate::{
        Notifier, PasswordHash,
        account::{Account, insert_account},
        auth::{DEFAULT_SESSION_DURATION, set_auth_cookie},
        db::initialize,
        low_balance::LowBalancePolicy,
        test_utils::{
            RecordingNotifier, SentEmail, assert_valid_html, parse_html_document,
        },
        transaction::{
            Category, Direction, NewTransaction, PaymentChannel, create_transaction,
        },
    };

    use super::{DashboardQuery, DashboardState, get_dashboard_page};

    fn test_state() -> (DashboardState, Arc<Mutex<Connection>>, Arc<Mutex<Vec<SentEmail>>>) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let connection = Arc::new(Mutex::new(connection));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new(sent.clone()));
        let hash = Sha512::digest(b"foobar");

        (
            DashboardState {
                cookie_key: Key::from(&hash),
                local_timezone: "Etc/UTC".to_owned(),
                low_balance: LowBalancePolicy::default(),
                db_connection: connection.clone(),
                notifier,
            },
            connection,
            sent,
        )
    }

    fn insert_test_account(connection: &Connection) -> Account {
        insert_account(
            "alice",
            "alice@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            true,
            connection,
        )
        .unwrap()
    }

    /// The reference data set: income 500 (online, Jan 5), expense 200
    /// (cash, Jan 10), expense 50 (online, Feb 1).
    fn insert_reference_transactions(connection: &Connection, account: &Account) {
        for (direction, amount, category, channel, date) in [
            (
                Direction::Income,
                500.0,
                Category::Salary,
                PaymentChannel::Online,
                date!(2024 - 01 - 05),
            ),
            (
                Direction::Expense,
                200.0,
                Category::Rent,
                PaymentChannel::Cash,
                date!(2024 - 01 - 10),
            ),
            (
                Direction::Expense,
                50.0,
                Category::Food,
                PaymentChannel::Online,
                date!(2024 - 02 - 01),
            ),
        ] {
            create_transaction(
                NewTransaction {
                    account_id: account.id,
                    direction,
                    amount,
                    category,
                    channel,
                    date,
                },
                connection,
            )
            .unwrap();
        }
    }

    fn logged_in_jar(state: &DashboardState, account: &Account) -> PrivateCookieJar {
        set_auth_cookie(
            PrivateCookieJar::new(state.cookie_key.clone()),
            account.id,
            DEFAULT_SESSION_DURATION,
        )
        .unwrap()
    }

    async fn page_text(response: axum::response::Response) -> String {
        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        document.root_element().text().collect()
    }

    #[tokio::test]
    async fn anonymous_visitor_sees_zero_summary() {
        let (state, _, _) = test_state();
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        let response =
            get_dashboard_page(State(state), jar, Query(DashboardQuery { month: None })).await;

        let text = page_text(response).await;
        assert!(text.contains("$0.00"), "want zero balances, got: {text}");
        assert!(text.contains("Log in"));
    }

    #[tokio::test]
    async fn unfiltered_dashboard_shows_overall_totals() {
        let (state, connection, _) = test_state();
        let account = {
            let connection = connection.lock().unwrap();
            let account = insert_test_account(&connection);
            insert_reference_transactions(&connection, &account);
            account
        };
        let jar = logged_in_jar(&state, &account);

        let response =
            get_dashboard_page(State(state), jar, Query(DashboardQuery { month: None })).await;

        let text = page_text(response).await;
        assert!(text.contains("$500.00"), "total income");
        assert!(text.contains("$250.00"), "total expense and balance");
    }

    #[tokio::test]
    async fn month_filter_narrows_totals() {
        let (state, connection, _) = test_state();
        let account = {
            let connection = connection.lock().unwrap();
            let account = insert_test_account(&connection);
            insert_reference_transactions(&connection, &account);
            account
        };
        let jar = logged_in_jar(&state, &account);

        let response = get_dashboard_page(
            State(state),
            jar,
            Query(DashboardQuery {
                month: Some("2024-01".to_owned()),
            }),
        )
        .await;

        let text = page_text(response).await;
        assert!(text.contains("$300.00"), "January balance, got: {text}");
        assert!(text.contains("-$200.00"), "January cash balance");
        assert!(
            !text.contains("$50.00"),
            "the February transaction should be filtered out"
        );
    }

    #[tokio::test]
    async fn low_balance_triggers_warning_email() {
        let (state, connection, sent) = test_state();
        let account = {
            let connection = connection.lock().unwrap();
            let account = insert_test_account(&connection);
            create_transaction(
                NewTransaction {
                    account_id: account.id,
                    direction: Direction::Expense,
                    amount: 75.0,
                    category: Category::Shopping,
                    channel: PaymentChannel::Online,
                    date: date!(2024 - 01 - 10),
                },
                &connection,
            )
            .unwrap();
            account
        };
        let jar = logged_in_jar(&state, &account);

        get_dashboard_page(State(state), jar, Query(DashboardQuery { month: None })).await;

        let emails = sent.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "low balance warning");
    }
}
