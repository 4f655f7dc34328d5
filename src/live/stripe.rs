use crate::error::{ReportError, Result};
use crate::live::types::*;
use crate::processor::PaymentProcessor;
use crate::schema::{CustomerSummary, InvoiceSummary, SubscriptionPage};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

const STRIPE_BASE_URL: &str = "https://api.stripe.com/v1";
pub const PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: STRIPE_BASE_URL.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Stripe GET {}", url);

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        Self::parse(operation, res).await
    }

    async fn parse<T: DeserializeOwned>(operation: &str, res: Response) -> Result<T> {
        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await?;
            return Err(upstream_error(operation, status, &error_text));
        }

        Ok(res.json().await?)
    }
}

/// Maps a non-2xx Stripe response onto `ReportError::Upstream`, keeping the status.
pub fn upstream_error(operation: &str, status: StatusCode, body: &str) -> ReportError {
    let message = serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|body| {
            let kind = body.error.kind.unwrap_or_default();
            body.error.message.map(|m| format!("{} {}", kind, m))
        })
        .unwrap_or_else(|| body.to_string());

    ReportError::upstream_status(
        operation,
        format!("status {}: {}", status, message.trim()),
        status.as_u16(),
    )
}

/// Query for one page of the subscription listing. Every status is requested.
pub fn subscription_list_query(starting_after: Option<String>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("status", "all".to_string()),
        ("limit", PAGE_SIZE.to_string()),
    ];
    if let Some(cursor) = starting_after {
        query.push(("starting_after", cursor));
    }
    query
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn list_subscriptions(&self, starting_after: Option<String>) -> Result<SubscriptionPage> {
        let query = subscription_list_query(starting_after);
        let list: StripeList<StripeSubscription> =
            self.get("list subscriptions", "subscriptions", &query).await?;
        Ok(list.into())
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceSummary> {
        let invoice: StripeInvoice = self
            .get(
                "retrieve invoice",
                &format!("invoices/{}", invoice_id),
                &[],
            )
            .await?;
        Ok(invoice.into())
    }

    async fn get_customer(&self, customer_id: &str) -> Result<CustomerSummary> {
        let customer: StripeCustomer = self
            .get(
                "retrieve customer",
                &format!("customers/{}", customer_id),
                &[],
            )
            .await?;
        Ok(customer.into())
    }
}
