//! # Late Payments Report
//!
//! Builds a snapshot of overdue subscriptions from a payment processor and
//! publishes it into a spreadsheet tab, replacing whatever the tab held before.
//!
//! ## Core Concepts
//!
//! - **Late subscription**: status `past_due` or `unpaid`; every other status is skipped
//! - **Collector**: walks every subscription page, resolving the latest invoice and customer
//!   of each late one into a [`SubscriptionRecord`]
//! - **Publisher**: derives `Last Updated At` and `Days Overdue` as of a single instant and
//!   overwrites the tab from `A1`
//! - **Original due date**: the creation time of the latest invoice
//!
//! ## Example
//!
//! ```rust,ignore
//! use late_payments_report::*;
//! use late_payments_report::live::{ServiceAccountAuthenticator, SheetsClient, StripeClient};
//!
//! let config = ReportConfig::load(std::path::Path::new("config.json"))?;
//! let stripe = StripeClient::new(config.processor_api_key.clone());
//! let sheets = SheetsClient::new(ServiceAccountAuthenticator::from_file(&config.credentials_path)?);
//!
//! let summary = run_report(&config, &stripe, &sheets).await?;
//! println!("{} cells updated", summary.update.updated_cells);
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod processor;
pub mod publisher;
pub mod schema;
pub mod sink;
pub mod utils;

#[cfg(feature = "live")]
pub mod live;

pub use collector::{Collection, Collector};
pub use config::{LookupFailurePolicy, ReportConfig};
pub use error::{ReportError, Result, SinkError};
pub use processor::{subscription_stream, PaymentProcessor};
pub use publisher::{render, Publisher};
pub use schema::*;
pub use sink::SpreadsheetSink;
pub use utils::*;

use chrono::{DateTime, Utc};
use log::info;

/// Runs the collector and then the publisher against the configured tab.
pub struct LatePaymentsReport<'a> {
    config: &'a ReportConfig,
    processor: &'a dyn PaymentProcessor,
    sink: &'a dyn SpreadsheetSink,
}

impl<'a> LatePaymentsReport<'a> {
    pub fn new(
        config: &'a ReportConfig,
        processor: &'a dyn PaymentProcessor,
        sink: &'a dyn SpreadsheetSink,
    ) -> Self {
        Self {
            config,
            processor,
            sink,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_inner(None).await
    }

    /// Same as [`run`](Self::run) but stamps the report with `now` instead of the wall clock.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        self.run_inner(Some(now)).await
    }

    async fn run_inner(&self, now: Option<DateTime<Utc>>) -> Result<RunSummary> {
        info!("Fetching data from Stripe...");
        let collection = Collector::new(self.processor)
            .with_policy(self.config.lookup_failure_policy)
            .collect_with_stats()
            .await?;

        info!("Updating Google Sheet...");
        let publisher =
            Publisher::new(self.sink).with_clear_stale_rows(self.config.clear_stale_rows);
        let location = self.config.sheet_location();
        let update = match now {
            Some(now) => {
                publisher
                    .publish_at(&collection.table, &location, now)
                    .await?
            }
            None => publisher.publish(&collection.table, &location).await?,
        };

        Ok(RunSummary {
            subscriptions_processed: collection.subscriptions_processed,
            late_subscriptions: collection.table.len(),
            update,
        })
    }
}

pub async fn run_report(
    config: &ReportConfig,
    processor: &dyn PaymentProcessor,
    sink: &dyn SpreadsheetSink,
) -> Result<RunSummary> {
    LatePaymentsReport::new(config, processor, sink).run().await
}
