//! Aggregation of an account's transactions into dashboard totals.

use time::{Date, Month};

use crate::transaction::{Category, Direction, PaymentChannel, Transaction};

/// A calendar month used to narrow the dashboard to one month's
/// transactions, parsed from the `YYYY-MM` value of a month input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MonthFilter {
    year: i32,
    month: Month,
}

impl MonthFilter {
    /// Parse a `YYYY-MM` string, e.g. "2024-01".
    ///
    /// Returns `None` for anything that is not a valid year-month pair.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;

        Some(Self { year, month })
    }

    /// The first and last day of the month, for an inclusive date range.
    pub(crate) fn date_range(&self) -> Option<(Date, Date)> {
        let first = Date::from_calendar_date(self.year, self.month, 1).ok()?;
        let last =
            Date::from_calendar_date(self.year, self.month, self.month.length(self.year)).ok()?;

        Some((first, last))
    }

    /// Format back to the `YYYY-MM` form expected by a month input.
    pub(crate) fn to_query_value(self) -> String {
        format!("{:04}-{:02}", self.year, u8::from(self.month))
    }
}

/// Totals over a set of transactions, ready for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct LedgerSummary {
    /// Sum of all income amounts.
    pub(crate) total_income: f64,
    /// Sum of all expense amounts.
    pub(crate) total_expense: f64,
    /// `total_income - total_expense`.
    pub(crate) balance: f64,
    /// Income minus expense over the online channel only.
    pub(crate) online_balance: f64,
    /// Income minus expense over the cash channel only.
    pub(crate) cash_balance: f64,
    /// Expense totals per category label, in display order, zero
    /// categories omitted. Drives the category chart.
    pub(crate) expenses_by_category: Vec<(String, f64)>,
}

impl LedgerSummary {
    /// The all-zero summary shown to anonymous visitors.
    pub(crate) fn empty() -> Self {
        Self::default()
    }
}

/// Compute the dashboard totals for a set of transactions.
///
/// The caller is expected to have already narrowed `transactions` to one
/// account and, optionally, one calendar month.
pub(crate) fn summarize(transactions: &[Transaction]) -> LedgerSummary {
    let mut summary = LedgerSummary::default();
    let mut category_totals = [0.0_f64; Category::ALL.len()];

    for transaction in transactions {
        let signed_amount = match transaction.direction {
            Direction::Income => {
                summary.total_income += transaction.amount;
                transaction.amount
            }
            Direction::Expense => {
                summary.total_expense += transaction.amount;

                let index = Category::ALL
                    .iter()
                    .position(|category| *category == transaction.category)
                    .unwrap_or(Category::ALL.len() - 1);
                category_totals[index] += transaction.amount;

                -transaction.amount
            }
        };

        match transaction.channel {
            PaymentChannel::Online => summary.online_balance += signed_amount,
            PaymentChannel::Cash => summary.cash_balance += signed_amount,
        }
    }

    summary.balance = summary.total_income - summary.total_expense;
    summary.expenses_by_category = Category::ALL
        .iter()
        .zip(category_totals)
        .filter(|(_, total)| *total > 0.0)
        .map(|(category, total)| (category.label().to_owned(), total))
        .collect();

    summary
}

#[cfg(test)]
mod month_filter_tests {
    use time::macros::date;

    use super::MonthFilter;

    #[test]
    fn parses_year_and_month() {
        let filter = MonthFilter::parse("2024-01").unwrap();

        assert_eq!(
            filter.date_range(),
            Some((date!(2024 - 01 - 01), date!(2024 - 01 - 31)))
        );
    }

    #[test]
    fn range_covers_leap_february() {
        let filter = MonthFilter::parse("2024-02").unwrap();

        assert_eq!(
            filter.date_range(),
            Some((date!(2024 - 02 - 01), date!(2024 - 02 - 29)))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(MonthFilter::parse(""), None);
        assert_eq!(MonthFilter::parse("2024"), None);
        assert_eq!(MonthFilter::parse("2024-13"), None);
        assert_eq!(MonthFilter::parse("january 2024"), None);
    }

    #[test]
    fn query_value_roundtrips() {
        let filter = MonthFilter::parse("2024-09").unwrap();

        assert_eq!(filter.to_query_value(), "2024-09");
    }
}

#[cfg(test)]
mod summarize_tests {
    use time::macros::date;

    use crate::{
        account::AccountId,
        transaction::{Category, Direction, PaymentChannel, Transaction},
    };

    use super::{LedgerSummary, summarize};

    fn transaction(
        direction: Direction,
        amount: f64,
        category: Category,
        channel: PaymentChannel,
        date: time::Date,
    ) -> Transaction {
        Transaction {
            id: 0,
            account_id: AccountId::new(1),
            direction,
            amount,
            category,
            channel,
            date,
        }
    }

    /// The three reference transactions: income 500 (online, Jan 5),
    /// expense 200 (cash, Jan 10), expense 50 (online, Feb 1).
    fn reference_transactions() -> Vec<Transaction> {
        vec![
            transaction(
                Direction::Income,
                500.0,
                Category::Salary,
                PaymentChannel::Online,
                date!(2024 - 01 - 05),
            ),
            transaction(
                Direction::Expense,
                200.0,
                Category::Rent,
                PaymentChannel::Cash,
                date!(2024 - 01 - 10),
            ),
            transaction(
                Direction::Expense,
                50.0,
                Category::Food,
                PaymentChannel::Online,
                date!(2024 - 02 - 01),
            ),
        ]
    }

    #[test]
    fn unfiltered_totals_match_reference() {
        let summary = summarize(&reference_transactions());

        assert_eq!(summary.total_income, 500.0);
        assert_eq!(summary.total_expense, 250.0);
        assert_eq!(summary.balance, 250.0);
    }

    #[test]
    fn january_totals_match_reference() {
        let transactions: Vec<_> = reference_transactions()
            .into_iter()
            .filter(|t| t.date < date!(2024 - 02 - 01))
            .collect();

        let summary = summarize(&transactions);

        assert_eq!(summary.total_income, 500.0);
        assert_eq!(summary.total_expense, 200.0);
        assert_eq!(summary.balance, 300.0);
        assert_eq!(summary.online_balance, 500.0);
        assert_eq!(summary.cash_balance, -200.0);
    }

    #[test]
    fn expenses_grouped_by_category_label() {
        let summary = summarize(&reference_transactions());

        assert_eq!(
            summary.expenses_by_category,
            vec![("Food".to_owned(), 50.0), ("Rent".to_owned(), 200.0)]
        );
    }

    #[test]
    fn empty_input_gives_all_zero_summary() {
        assert_eq!(summarize(&[]), LedgerSummary::empty());
    }
}
