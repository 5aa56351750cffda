use async_trait::async_trait;
use concent_types::Result;
use tokio::sync::RwLock;

/// A settled payment between the two parties, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub requestor_payment_address: String,
    pub provider_payment_address: String,
    pub amount: u64,
    pub payment_ts: i64,
}

/// Blockchain payment backend, as Concent sees it.
///
/// Best-effort and asynchronous in effect: the lifecycle machine fires
/// forced payments after a state transition is persisted and only logs
/// failures; inquiries (`get_deposit_value`, `get_list_of_payments`) feed
/// decisions before a transition is attempted.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Current deposit held for the account behind `payment_address`.
    async fn get_deposit_value(&self, payment_address: &str) -> Result<u64>;

    /// Payments from requestor to provider at or after `since_ts`.
    async fn get_list_of_payments(
        &self,
        requestor_payment_address: &str,
        provider_payment_address: &str,
        since_ts: i64,
    ) -> Result<Vec<Payment>>;

    /// Pay the provider out of the requestor's deposit.
    async fn make_force_payment(
        &self,
        requestor_payment_address: &str,
        provider_payment_address: &str,
        amount: u64,
        payment_ts: i64,
    ) -> Result<()>;
}

/// Payment backend stub for tests and development.
///
/// Reports a fixed deposit for every account and records forced payments,
/// which then show up in `get_list_of_payments`.
pub struct MockPaymentBackend {
    deposit: u64,
    payments: RwLock<Vec<Payment>>,
}

impl MockPaymentBackend {
    pub fn new(deposit: u64) -> Self {
        Self {
            deposit,
            payments: RwLock::new(Vec::new()),
        }
    }

    /// All forced payments made so far.
    pub async fn forced_payments(&self) -> Vec<Payment> {
        self.payments.read().await.clone()
    }
}

impl Default for MockPaymentBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl PaymentBackend for MockPaymentBackend {
    async fn get_deposit_value(&self, _payment_address: &str) -> Result<u64> {
        Ok(self.deposit)
    }

    async fn get_list_of_payments(
        &self,
        requestor_payment_address: &str,
        provider_payment_address: &str,
        since_ts: i64,
    ) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .filter(|p| {
                p.requestor_payment_address == requestor_payment_address
                    && p.provider_payment_address == provider_payment_address
                    && p.payment_ts >= since_ts
            })
            .cloned()
            .collect())
    }

    async fn make_force_payment(
        &self,
        requestor_payment_address: &str,
        provider_payment_address: &str,
        amount: u64,
        payment_ts: i64,
    ) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.push(Payment {
            requestor_payment_address: requestor_payment_address.to_string(),
            provider_payment_address: provider_payment_address.to_string(),
            amount,
            payment_ts,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_records_forced_payments() {
        let backend = MockPaymentBackend::new(10_000);
        assert_eq!(backend.get_deposit_value("0xabc").await.unwrap(), 10_000);

        backend
            .make_force_payment("0xreq", "0xprov", 5000, 2000)
            .await
            .unwrap();

        let listed = backend
            .get_list_of_payments("0xreq", "0xprov", 1000)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 5000);

        // Payments before the cutoff are not listed.
        let listed = backend
            .get_list_of_payments("0xreq", "0xprov", 3000)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
