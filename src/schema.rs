use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder written wherever a value could not be resolved.
pub const NOT_AVAILABLE: &str = "N/A";

pub const REPORT_HEADER: [&str; 7] = [
    "Subscription ID",
    "Status",
    "Customer ID",
    "Customer Email",
    "Amount Due",
    "Currency",
    "Original Due Date",
];

pub const PUBLISHED_EXTRA_HEADER: [&str; 2] = ["Last Updated At", "Days Overdue"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    /// Any status string this crate does not know about yet.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Only `past_due` and `unpaid` count as late.
    pub fn is_late(self) -> bool {
        matches!(self, SubscriptionStatus::PastDue | SubscriptionStatus::Unpaid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subscription as listed by the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: SubscriptionStatus,
    pub customer_id: String,
    pub latest_invoice_id: Option<String>,
    pub currency: String,
}

/// A single page of the subscription listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPage {
    pub data: Vec<SubscriptionSummary>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceSummary {
    pub id: String,
    /// Amount in minor currency units (e.g. cents)
    pub amount_due: i64,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerSummary {
    pub id: String,
    pub email: Option<String>,
}

/// A value that is either known or recorded as "N/A" in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolved<T> {
    Value(T),
    NotAvailable,
}

impl<T> Resolved<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::NotAvailable => None,
        }
    }
}

impl<T> From<Option<T>> for Resolved<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Resolved::Value(v),
            None => Resolved::NotAvailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub customer_id: String,
    pub customer_email: Resolved<String>,
    /// Major currency units
    pub amount_due: Resolved<Decimal>,
    /// Uppercase ISO code
    pub currency: String,
    /// Creation instant of the latest invoice, used as the due date
    pub original_due_date: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// Cells for the seven report columns, with the due date left raw as its unix timestamp.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.subscription_id.clone(),
            self.status.to_string(),
            self.customer_id.clone(),
            self.customer_email
                .value()
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            self.amount_due
                .value()
                .map(|d| d.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            self.currency.clone(),
            self.original_due_date
                .map(|d| d.timestamp().to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ]
    }
}

/// Late subscriptions in processor enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub rows: Vec<SubscriptionRecord>,
}

impl ReportTable {
    pub fn header(&self) -> Vec<String> {
        REPORT_HEADER.iter().map(|h| h.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRow {
    pub record: SubscriptionRecord,
    /// Display form of `record.original_due_date`, or "N/A"
    pub original_due_date: String,
    pub last_updated_at: String,
    /// Whole days, or "N/A" when there is no due date
    pub days_overdue: String,
}

impl PublishedRow {
    pub fn cells(&self) -> Vec<String> {
        let mut cells = self.record.cells();
        cells[6] = self.original_due_date.clone();
        cells.push(self.last_updated_at.clone());
        cells.push(self.days_overdue.clone());
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<PublishedRow>,
}

impl PublishedReport {
    pub fn header() -> Vec<String> {
        REPORT_HEADER
            .iter()
            .chain(PUBLISHED_EXTRA_HEADER.iter())
            .map(|h| h.to_string())
            .collect()
    }

    /// Header followed by every row, as written to the sheet.
    pub fn to_matrix(&self) -> Vec<Vec<String>> {
        let mut matrix = Vec::with_capacity(self.rows.len() + 1);
        matrix.push(Self::header());
        matrix.extend(self.rows.iter().map(PublishedRow::cells));
        matrix
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetTab {
    pub tab_id: i64,
    pub title: String,
    /// Grid size before the write; zero when the sheet did not report one
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub column_count: u32,
}

/// Where a report is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLocation {
    pub spreadsheet_id: String,
    pub tab_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatedRange {
    pub updated_cells: u64,
    pub updated_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub tab_name: String,
    pub updated_cells: u64,
    pub updated_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub subscriptions_processed: usize,
    pub late_subscriptions: usize,
    pub update: UpdateSummary,
}
