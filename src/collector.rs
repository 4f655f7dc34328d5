use crate::config::LookupFailurePolicy;
use crate::error::{ReportError, Result};
use crate::processor::{subscription_stream, PaymentProcessor};
use crate::schema::{ReportTable, Resolved, SubscriptionRecord, SubscriptionSummary};
use crate::utils::{minor_to_major, normalize_currency};
use futures::{pin_mut, TryStreamExt};
use log::{debug, info, warn};

pub const PROGRESS_INTERVAL: usize = 10;

/// Result of a collection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub table: ReportTable,
    /// Subscriptions seen, late or not
    pub subscriptions_processed: usize,
}

pub struct Collector<'a> {
    processor: &'a dyn PaymentProcessor,
    policy: LookupFailurePolicy,
}

impl<'a> Collector<'a> {
    pub fn new(processor: &'a dyn PaymentProcessor) -> Self {
        Self {
            processor,
            policy: LookupFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LookupFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn collect(&self) -> Result<ReportTable> {
        Ok(self.collect_with_stats().await?.table)
    }

    /// Walks every subscription and builds a row for each late one, in listing order.
    pub async fn collect_with_stats(&self) -> Result<Collection> {
        let subscriptions = subscription_stream(self.processor);
        pin_mut!(subscriptions);

        let mut table = ReportTable::default();
        let mut processed = 0usize;

        while let Some(subscription) = subscriptions.try_next().await? {
            processed += 1;

            if subscription.status.is_late() {
                let record = self.resolve(&subscription).await?;
                debug!(
                    "Late subscription {} ({}) for customer {}",
                    record.subscription_id, record.status, record.customer_id
                );
                table.rows.push(record);
            }

            if processed % PROGRESS_INTERVAL == 0 {
                info!("Processed {} subscriptions...", processed);
            }
        }

        info!("Processed a total of {} subscriptions.", processed);
        info!("Found {} late subscriptions.", table.len());

        Ok(Collection {
            table,
            subscriptions_processed: processed,
        })
    }

    /// Only a lookup the processor answered with "not found" may be recorded as N/A.
    fn degrades(&self, error: &ReportError) -> bool {
        self.policy == LookupFailurePolicy::Degrade && error.is_not_found()
    }

    async fn resolve(&self, subscription: &SubscriptionSummary) -> Result<SubscriptionRecord> {
        let (amount_due, original_due_date) = match &subscription.latest_invoice_id {
            Some(invoice_id) => match self.processor.get_invoice(invoice_id).await {
                Ok(invoice) => (
                    Resolved::Value(minor_to_major(invoice.amount_due)),
                    Some(invoice.created),
                ),
                Err(e) if self.degrades(&e) => {
                    warn!(
                        "Invoice {} for subscription {} no longer exists, recording N/A: {}",
                        invoice_id, subscription.id, e
                    );
                    (Resolved::NotAvailable, None)
                }
                Err(e) => return Err(e),
            },
            None => (Resolved::NotAvailable, None),
        };

        let customer_email = match self.processor.get_customer(&subscription.customer_id).await {
            Ok(customer) => customer
                .email
                .filter(|email| !email.is_empty())
                .into(),
            Err(e) if self.degrades(&e) => {
                warn!(
                    "Customer {} for subscription {} no longer exists, recording N/A: {}",
                    subscription.customer_id, subscription.id, e
                );
                Resolved::NotAvailable
            }
            Err(e) => return Err(e),
        };

        Ok(SubscriptionRecord {
            subscription_id: subscription.id.clone(),
            status: subscription.status,
            customer_id: subscription.customer_id.clone(),
            customer_email,
            amount_due,
            currency: normalize_currency(&subscription.currency),
            original_due_date,
        })
    }
}
