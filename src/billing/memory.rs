//! In-process billing backend.
//!
//! Keeps the customer and subscription mirror that webhooks maintain, and
//! hands out hosted-checkout URLs without talking to a processor.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::User;
use crate::billing::checkout::USER_ID_METADATA;
use crate::billing::{
    BillingError, BillingSync, CheckoutProvider, CheckoutRequest, CheckoutSession,
    CustomerDirectory, EntitlementStore, WebhookEvent,
};
use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
    pub user_id: Option<String>,
    /// Creation time in unix seconds.
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    pub status: String,
}

impl Subscription {
    pub fn grants_premium(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

pub struct MemoryBilling {
    customers: DashMap<String, Customer>,
    subscriptions: DashMap<String, Subscription>,
    sessions: Mutex<Vec<CheckoutRequest>>,
    checkout_base_url: String,
    clock: Arc<dyn Clock>,
}

impl MemoryBilling {
    pub fn new(checkout_base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            customers: DashMap::new(),
            subscriptions: DashMap::new(),
            sessions: Mutex::new(Vec::new()),
            checkout_base_url: checkout_base_url.into().trim_end_matches('/').to_string(),
            clock,
        }
    }

    pub fn upsert_customer(&self, customer: Customer) {
        self.customers.insert(customer.id.clone(), customer);
    }

    pub fn upsert_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    /// Checkout requests received so far, oldest first.
    pub async fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.sessions.lock().await.clone()
    }

    fn customer_from_object(&self, object: &serde_json::Value) -> Option<Customer> {
        let id = object.get("id")?.as_str()?.to_string();
        let user_id = object
            .get("metadata")
            .and_then(|m| m.get(USER_ID_METADATA))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Some(Customer {
            id,
            email: object.get("email").and_then(|v| v.as_str()).map(str::to_string),
            user_id,
            created: object
                .get("created")
                .and_then(|v| v.as_u64())
                .unwrap_or_else(|| self.clock.now_secs()),
        })
    }
}

fn subscription_from_object(object: &serde_json::Value) -> Option<Subscription> {
    Some(Subscription {
        id: object.get("id")?.as_str()?.to_string(),
        customer_id: object.get("customer")?.as_str()?.to_string(),
        status: object.get("status")?.as_str()?.to_string(),
    })
}

#[async_trait]
impl EntitlementStore for MemoryBilling {
    async fn is_premium(&self, user_id: &str) -> Result<bool, BillingError> {
        let premium = self.subscriptions.iter().any(|sub| {
            sub.grants_premium()
                && self
                    .customers
                    .get(&sub.customer_id)
                    .is_some_and(|c| c.user_id.as_deref() == Some(user_id))
        });
        Ok(premium)
    }
}

#[async_trait]
impl CustomerDirectory for MemoryBilling {
    async fn get_or_create(&self, user: &User) -> Result<String, BillingError> {
        let newest = self
            .customers
            .iter()
            .filter(|c| c.user_id.as_deref() == Some(user.id.as_str()))
            .max_by_key(|c| c.created)
            .map(|c| c.id.clone());
        if let Some(id) = newest {
            return Ok(id);
        }

        let customer = Customer {
            id: format!("cus_{}", Uuid::new_v4().simple()),
            email: user.email.clone(),
            user_id: Some(user.id.clone()),
            created: self.clock.now_secs(),
        };
        let id = customer.id.clone();
        self.upsert_customer(customer);
        tracing::debug!(user_id = %user.id, customer_id = %id, "Created billing customer");
        Ok(id)
    }
}

#[async_trait]
impl CheckoutProvider for MemoryBilling {
    async fn create_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let id = format!("cs_{}", Uuid::new_v4().simple());
        let url = format!("{}/{}", self.checkout_base_url, id);
        self.sessions.lock().await.push(request);
        Ok(CheckoutSession { id, url: Some(url) })
    }
}

#[async_trait]
impl BillingSync for MemoryBilling {
    async fn apply(&self, event: &WebhookEvent) -> Result<(), BillingError> {
        let object = &event.data.object;
        match event.kind.as_str() {
            "customer.created" | "customer.updated" => {
                let customer = self
                    .customer_from_object(object)
                    .ok_or_else(|| BillingError::Backend("Malformed customer object".into()))?;
                self.upsert_customer(customer);
            }
            "customer.deleted" => {
                if let Some(id) = object.get("id").and_then(|v| v.as_str()) {
                    self.customers.remove(id);
                }
            }
            kind if kind.starts_with("customer.subscription.") => {
                let subscription = subscription_from_object(object)
                    .ok_or_else(|| BillingError::Backend("Malformed subscription object".into()))?;
                self.upsert_subscription(subscription);
            }
            other => {
                tracing::debug!(kind = other, "Ignoring webhook event");
            }
        }
        Ok(())
    }
}
