use crate::error::{ReportError, Result};
use crate::schema::{CustomerSummary, InvoiceSummary, SubscriptionPage, SubscriptionSummary};
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};

/// Read access to the payment processor's subscription, invoice and customer objects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// List one page of subscriptions of every status, starting after the given
    /// subscription id (or at the beginning when `None`).
    async fn list_subscriptions(&self, starting_after: Option<String>) -> Result<SubscriptionPage>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceSummary>;

    async fn get_customer(&self, customer_id: &str) -> Result<CustomerSummary>;
}

enum Cursor {
    Start,
    After(String),
    Done,
}

/// Every subscription the processor knows about, fetching pages lazily until
/// the processor reports there are no more.
pub fn subscription_stream<'a, P>(
    processor: &'a P,
) -> impl Stream<Item = Result<SubscriptionSummary>> + 'a
where
    P: PaymentProcessor + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let starting_after = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::After(id) => Some(id),
        };

        let page = processor.list_subscriptions(starting_after).await?;

        // An empty page cannot advance the cursor, so it ends the listing.
        let next = match (page.has_more, page.data.last()) {
            (true, Some(last)) => Cursor::After(last.id.clone()),
            _ => Cursor::Done,
        };

        Ok::<_, ReportError>(Some((stream::iter(page.data.into_iter().map(Ok)), next)))
    })
    .try_flatten()
}
