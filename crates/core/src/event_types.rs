//! Built-in webhook event types.
//!
//! These seed the event registry at startup. Publishers may still emit
//! types outside this list unless strict event-type checking is enabled.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    TenantUpdated,
    InvoiceCreated,
    InvoicePaid,
    InvoiceOverdue,
    PaymentSucceeded,
    PaymentFailed,
    EmailSent,
    EmailBounced,
    SmsSent,
    WebhookTest,
}

impl WebhookEventType {
    pub const ALL: [WebhookEventType; 13] = [
        WebhookEventType::UserCreated,
        WebhookEventType::UserUpdated,
        WebhookEventType::UserDeleted,
        WebhookEventType::TenantUpdated,
        WebhookEventType::InvoiceCreated,
        WebhookEventType::InvoicePaid,
        WebhookEventType::InvoiceOverdue,
        WebhookEventType::PaymentSucceeded,
        WebhookEventType::PaymentFailed,
        WebhookEventType::EmailSent,
        WebhookEventType::EmailBounced,
        WebhookEventType::SmsSent,
        WebhookEventType::WebhookTest,
    ];

    /// Dot-separated identifier used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEventType::UserCreated => "user.created",
            WebhookEventType::UserUpdated => "user.updated",
            WebhookEventType::UserDeleted => "user.deleted",
            WebhookEventType::TenantUpdated => "tenant.updated",
            WebhookEventType::InvoiceCreated => "invoice.created",
            WebhookEventType::InvoicePaid => "invoice.paid",
            WebhookEventType::InvoiceOverdue => "invoice.overdue",
            WebhookEventType::PaymentSucceeded => "payment.succeeded",
            WebhookEventType::PaymentFailed => "payment.failed",
            WebhookEventType::EmailSent => "email.sent",
            WebhookEventType::EmailBounced => "email.bounced",
            WebhookEventType::SmsSent => "sms.sent",
            WebhookEventType::WebhookTest => "webhook.test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn description(self) -> &'static str {
        match self {
            WebhookEventType::UserCreated => "A user was added to the tenant",
            WebhookEventType::UserUpdated => "A user's profile or role changed",
            WebhookEventType::UserDeleted => "A user was removed from the tenant",
            WebhookEventType::TenantUpdated => "Tenant settings or profile changed",
            WebhookEventType::InvoiceCreated => "An invoice was issued",
            WebhookEventType::InvoicePaid => "An invoice was paid in full",
            WebhookEventType::InvoiceOverdue => "An invoice passed its due date unpaid",
            WebhookEventType::PaymentSucceeded => "A payment was captured",
            WebhookEventType::PaymentFailed => "A payment attempt was declined or errored",
            WebhookEventType::EmailSent => "An outbound email was accepted by the provider",
            WebhookEventType::EmailBounced => "An outbound email bounced",
            WebhookEventType::SmsSent => "An outbound SMS was accepted by the provider",
            WebhookEventType::WebhookTest => "Synthetic event sent by a manual test delivery",
        }
    }

    /// Example `data` payload advertised in the event catalog.
    pub fn example(self) -> Value {
        match self {
            WebhookEventType::UserCreated | WebhookEventType::UserUpdated => json!({
                "user_id": "0190c1c4-2f1e-7d2a-9a51-3c0b6c1d2e4f",
                "email": "ada@example.com",
                "role": "member"
            }),
            WebhookEventType::UserDeleted => json!({
                "user_id": "0190c1c4-2f1e-7d2a-9a51-3c0b6c1d2e4f"
            }),
            WebhookEventType::TenantUpdated => json!({
                "changed_fields": ["name", "billing_email"]
            }),
            WebhookEventType::InvoiceCreated
            | WebhookEventType::InvoicePaid
            | WebhookEventType::InvoiceOverdue => json!({
                "invoice_id": "inv_1042",
                "amount_cents": 129900,
                "currency": "EUR",
                "due_date": "2026-11-01"
            }),
            WebhookEventType::PaymentSucceeded | WebhookEventType::PaymentFailed => json!({
                "payment_id": "pay_88",
                "invoice_id": "inv_1042",
                "amount_cents": 129900,
                "currency": "EUR"
            }),
            WebhookEventType::EmailSent | WebhookEventType::EmailBounced => json!({
                "message_id": "msg_5521",
                "to": "ada@example.com",
                "template": "invoice_reminder"
            }),
            WebhookEventType::SmsSent => json!({
                "message_id": "sms_771",
                "to": "+33600000000"
            }),
            WebhookEventType::WebhookTest => json!({
                "message": "This is a test delivery to verify webhook connectivity."
            }),
        }
    }
}
