//! A scripted [`PaymentProcessor`] that records every call.
use std::sync::{Arc, Mutex};

use crate::{
    db_types::Money,
    traits::{
        CheckoutSessionInfo,
        CheckoutSessionRequest,
        IntentSecret,
        PaymentConfirmation,
        PaymentProcessor,
        ProcessorError,
        ProcessorRefund,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorCall {
    CreateIntent { amount: Money, currency: String, metadata: Vec<(String, String)> },
    CreateCheckoutSession(CheckoutSessionRequest),
    RetrieveIntent(String),
    ResolveSession(String),
    Refund { intent_id: String, amount: Option<Money>, idempotency_key: String },
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<ProcessorCall>,
    fail_next: Option<String>,
    charge_amount: Money,
    counter: u64,
}

/// Clones share their call log.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessor {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.state.lock().expect("lock poisoned").calls.clone()
    }

    /// The next call fails with `message`.
    pub fn fail_next(&self, message: &str) {
        self.state.lock().expect("lock poisoned").fail_next = Some(message.to_string());
    }

    /// The amount that full refunds return.
    pub fn set_charge_amount(&self, amount: Money) {
        self.state.lock().expect("lock poisoned").charge_amount = amount;
    }

    fn record(&self, call: ProcessorCall) -> Result<u64, ProcessorError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.calls.push(call);
        if let Some(msg) = state.fail_next.take() {
            return Err(ProcessorError(msg));
        }
        state.counter += 1;
        Ok(state.counter)
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<IntentSecret, ProcessorError> {
        let metadata = metadata.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let n = self.record(ProcessorCall::CreateIntent { amount, currency: currency.to_string(), metadata })?;
        Ok(IntentSecret { intent_id: format!("pi_fake_{n}"), client_secret: format!("pi_fake_{n}_secret") })
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSessionInfo, ProcessorError> {
        let n = self.record(ProcessorCall::CreateCheckoutSession(request))?;
        Ok(CheckoutSessionInfo {
            session_id: format!("cs_fake_{n}"),
            url: Some(format!("https://checkout.example.com/cs_fake_{n}")),
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentConfirmation, ProcessorError> {
        self.record(ProcessorCall::RetrieveIntent(intent_id.to_string()))?;
        Ok(PaymentConfirmation {
            intent_id: intent_id.to_string(),
            status: "succeeded".into(),
            succeeded: true,
            amount: Money::default(),
            currency: "usd".into(),
            order_id: None,
            receipt_email: None,
        })
    }

    /// Sessions resolve to the intent with the same suffix: `cs_abc` pays through `pi_abc`.
    async fn resolve_session_intent(&self, session_id: &str) -> Result<Option<String>, ProcessorError> {
        self.record(ProcessorCall::ResolveSession(session_id.to_string()))?;
        Ok(session_id.strip_prefix("cs_").map(|suffix| format!("pi_{suffix}")))
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount: Option<Money>,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let n = self.record(ProcessorCall::Refund {
            intent_id: intent_id.to_string(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        })?;
        Ok(ProcessorRefund {
            refund_id: format!("re_fake_{n}"),
            charge_id: Some(format!("ch_fake_{n}")),
            amount: amount.unwrap_or_else(|| self.state.lock().expect("lock poisoned").charge_amount),
            currency: "usd".into(),
        })
    }
}
