//! Wire shapes of the Stripe and Google Sheets REST APIs, trimmed to the fields the report reads.

use crate::schema::{
    CustomerSummary, InvoiceSummary, SheetTab, SubscriptionPage, SubscriptionStatus,
    SubscriptionSummary, UpdatedRange,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Stripe reference that may come back either as a bare id or as the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub customer: Expandable,
    pub latest_invoice: Option<Expandable>,
    pub currency: String,
}

impl From<StripeSubscription> for SubscriptionSummary {
    fn from(sub: StripeSubscription) -> Self {
        SubscriptionSummary {
            customer_id: sub.customer.id().to_string(),
            latest_invoice_id: sub.latest_invoice.map(|i| i.id().to_string()),
            id: sub.id,
            status: sub.status,
            currency: sub.currency,
        }
    }
}

impl From<StripeList<StripeSubscription>> for SubscriptionPage {
    fn from(list: StripeList<StripeSubscription>) -> Self {
        SubscriptionPage {
            data: list.data.into_iter().map(Into::into).collect(),
            has_more: list.has_more,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub amount_due: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

impl From<StripeInvoice> for InvoiceSummary {
    fn from(invoice: StripeInvoice) -> Self {
        InvoiceSummary {
            id: invoice.id,
            amount_due: invoice.amount_due,
            created: invoice.created,
        }
    }
}

/// Deleted customers come back as `{"id": ..., "deleted": true}` with no email.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl From<StripeCustomer> for CustomerSummary {
    fn from(customer: StripeCustomer) -> Self {
        CustomerSummary {
            id: customer.id,
            email: if customer.deleted { None } else { customer.email },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetMetadata {
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub grid_properties: GridProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub column_count: u32,
}

impl From<SpreadsheetMetadata> for Vec<SheetTab> {
    fn from(metadata: SpreadsheetMetadata) -> Self {
        metadata
            .sheets
            .into_iter()
            .map(|entry| SheetTab {
                tab_id: entry.properties.sheet_id,
                title: entry.properties.title,
                row_count: entry.properties.grid_properties.row_count,
                column_count: entry.properties.grid_properties.column_count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange<'a> {
    pub range: &'a str,
    pub major_dimension: &'static str,
    pub values: &'a [Vec<String>],
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_cells: u64,
    #[serde(default)]
    pub updated_rows: u64,
}

impl From<UpdateValuesResponse> for UpdatedRange {
    fn from(response: UpdateValuesResponse) -> Self {
        UpdatedRange {
            updated_cells: response.updated_cells,
            updated_rows: response.updated_rows,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    pub error: GoogleErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
