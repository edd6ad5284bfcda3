//! Fan-out of order and payment events to messaging channels.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{BrokerError, Envelope, EventHandler, HandlerError, MessageBroker, QueueBinding};
use common::UserId;
use domain::{EXCHANGE, ORDER_CREATED, OrderCreated, PAYMENT_COMPLETED, PaymentCompleted};

use crate::senders::{Contact, ContactSource, EmailSender, SmsSender};

/// Durable queue bound to `order.*`.
pub const NOTIFICATIONS_ORDERS_QUEUE: &str = "notifications-orders";

/// Durable queue bound to `payment.*`.
pub const NOTIFICATIONS_PAYMENTS_QUEUE: &str = "notifications-payments";

/// Dispatches confirmation messages for order and payment events.
///
/// One channel failing never skips the other, and the handler always
/// acknowledges: losing a notification is preferable to redelivering the
/// event forever.
pub struct NotificationDispatcher<C, E, M> {
    contacts: C,
    email: E,
    sms: M,
}

impl<C, E, M> NotificationDispatcher<C, E, M>
where
    C: ContactSource,
    E: EmailSender,
    M: SmsSender,
{
    /// Creates a dispatcher over the given channel collaborators.
    pub fn new(contacts: C, email: E, sms: M) -> Self {
        Self {
            contacts,
            email,
            sms,
        }
    }

    async fn contact(&self, event: &str, user_id: UserId) -> Option<Contact> {
        let contact = self.contacts.contact_for_user(user_id).await;
        if contact.is_none() {
            tracing::info!(%user_id, event, "no contact on file, skipping notification");
        }
        contact
    }

    async fn on_order_created(&self, event: OrderCreated) {
        let Some(contact) = self.contact(ORDER_CREATED, event.user_id).await else {
            return;
        };

        match self
            .email
            .send_order_confirmation(&contact.email, event.order_id, &event.items)
            .await
        {
            Ok(()) => {
                metrics::counter!("notifications_sent_total", "channel" => "email").increment(1);
            }
            Err(err) => {
                tracing::error!(order_id = %event.order_id, error = %err, "error sending email");
            }
        }

        if let Some(phone) = contact.phone {
            match self.sms.send_order_notification(&phone, event.order_id).await {
                Ok(()) => {
                    metrics::counter!("notifications_sent_total", "channel" => "sms").increment(1);
                }
                Err(err) => {
                    tracing::error!(order_id = %event.order_id, error = %err, "error sending SMS");
                }
            }
        }
    }

    async fn on_payment_completed(&self, event: PaymentCompleted) {
        let Some(contact) = self.contact(PAYMENT_COMPLETED, event.user_id).await else {
            return;
        };

        match self
            .email
            .send_payment_confirmation(&contact.email, event.order_id, event.amount)
            .await
        {
            Ok(()) => {
                metrics::counter!("notifications_sent_total", "channel" => "email").increment(1);
            }
            Err(err) => {
                tracing::error!(order_id = %event.order_id, error = %err, "error sending email");
            }
        }

        if let Some(phone) = contact.phone {
            match self
                .sms
                .send_payment_notification(&phone, event.order_id, event.amount)
                .await
            {
                Ok(()) => {
                    metrics::counter!("notifications_sent_total", "channel" => "sms").increment(1);
                }
                Err(err) => {
                    tracing::error!(order_id = %event.order_id, error = %err, "error sending SMS");
                }
            }
        }
    }
}

#[async_trait]
impl<C, E, M> EventHandler for NotificationDispatcher<C, E, M>
where
    C: ContactSource,
    E: EmailSender,
    M: SmsSender,
{
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        match envelope.routing_key.as_str() {
            ORDER_CREATED => match envelope.decode::<OrderCreated>() {
                Ok(event) => self.on_order_created(event).await,
                Err(err) => {
                    tracing::error!(error = %err, "undecodable order event, dropping");
                }
            },
            PAYMENT_COMPLETED => match envelope.decode::<PaymentCompleted>() {
                Ok(event) => self.on_payment_completed(event).await,
                Err(err) => {
                    tracing::error!(error = %err, "undecodable payment event, dropping");
                }
            },
            other => {
                tracing::debug!(routing_key = %other, "no notification for event");
            }
        }
        Ok(())
    }
}

/// Declares the notification queues and starts consuming.
pub async fn subscribe_notifications<C, E, M, B>(
    broker: &B,
    dispatcher: NotificationDispatcher<C, E, M>,
) -> Result<(), BrokerError>
where
    C: ContactSource + 'static,
    E: EmailSender + 'static,
    M: SmsSender + 'static,
    B: MessageBroker,
{
    let handler: Arc<dyn EventHandler> = Arc::new(dispatcher);
    broker
        .subscribe(
            QueueBinding::new(EXCHANGE, NOTIFICATIONS_ORDERS_QUEUE, "order.*"),
            handler.clone(),
        )
        .await?;
    broker
        .subscribe(
            QueueBinding::new(EXCHANGE, NOTIFICATIONS_PAYMENTS_QUEUE, "payment.*"),
            handler,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::{
        InMemoryContactSource, RecordingEmailSender, RecordingSmsSender, SentMessage,
    };
    use common::OrderId;
    use domain::{Address, Money, Order, OrderItem, Payment, PaymentFailed};

    type Dispatcher =
        NotificationDispatcher<InMemoryContactSource, RecordingEmailSender, RecordingSmsSender>;

    fn setup() -> (
        Dispatcher,
        InMemoryContactSource,
        RecordingEmailSender,
        RecordingSmsSender,
    ) {
        let contacts = InMemoryContactSource::new();
        let email = RecordingEmailSender::new();
        let sms = RecordingSmsSender::new();
        let dispatcher =
            NotificationDispatcher::new(contacts.clone(), email.clone(), sms.clone());
        (dispatcher, contacts, email, sms)
    }

    fn order(user_id: UserId) -> Order {
        Order::create(
            user_id,
            vec![OrderItem::new("p1", 2, Money::from_cents(1000))],
            Address {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
            },
        )
        .unwrap()
    }

    fn order_created(user_id: UserId) -> Envelope {
        Envelope::new(ORDER_CREATED, &OrderCreated::new(&order(user_id))).unwrap()
    }

    fn payment_completed(user_id: UserId) -> Envelope {
        let payment = Payment::create(
            OrderId::new(),
            user_id,
            Money::from_cents(2000),
            "usd",
            "pi_0001",
        );
        Envelope::new(PAYMENT_COMPLETED, &PaymentCompleted::new(&payment)).unwrap()
    }

    #[tokio::test]
    async fn test_order_created_sends_email_and_sms() {
        let (dispatcher, contacts, email, sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", Some("+15550100".to_string()));

        dispatcher.handle(&order_created(user_id)).await.unwrap();

        let sent = email.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            SentMessage::OrderConfirmation { to, item_count: 1, .. } if to == "jo@example.com"
        ));
        assert_eq!(sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_no_sms_without_phone_number() {
        let (dispatcher, contacts, email, sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", None);

        dispatcher.handle(&order_created(user_id)).await.unwrap();

        assert_eq!(email.sent().len(), 1);
        assert!(sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_does_not_skip_sms() {
        let (dispatcher, contacts, email, sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", Some("+15550100".to_string()));
        email.set_fail(true);

        // The handler still acknowledges.
        dispatcher.handle(&order_created(user_id)).await.unwrap();

        assert!(email.sent().is_empty());
        assert_eq!(sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_completed_sends_confirmation_with_amount() {
        let (dispatcher, contacts, email, sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", Some("+15550100".to_string()));

        dispatcher.handle(&payment_completed(user_id)).await.unwrap();

        let sent = email.sent();
        assert!(matches!(
            &sent[0],
            SentMessage::PaymentConfirmation { amount, .. } if amount.cents() == 2000
        ));
        assert_eq!(sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_drops_notification() {
        let (dispatcher, _contacts, email, sms) = setup();

        dispatcher
            .handle(&order_created(UserId::new()))
            .await
            .unwrap();

        assert!(email.sent().is_empty());
        assert!(sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_payment_failed_triggers_nothing() {
        let (dispatcher, contacts, email, sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", None);

        let payment = Payment::create(
            OrderId::new(),
            user_id,
            Money::from_cents(2000),
            "usd",
            "pi_0001",
        );
        let envelope = Envelope::new(
            domain::PAYMENT_FAILED,
            &PaymentFailed::new(&payment, "card declined"),
        )
        .unwrap();
        dispatcher.handle(&envelope).await.unwrap();

        assert!(email.sent().is_empty());
        assert!(sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_event_is_acknowledged() {
        let (dispatcher, _contacts, email, _sms) = setup();

        let envelope =
            Envelope::new(ORDER_CREATED, &serde_json::json!({"wrong": "shape"})).unwrap();
        assert!(dispatcher.handle(&envelope).await.is_ok());
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_subscriptions_receive_wildcard_events() {
        use std::time::Duration;

        let (dispatcher, contacts, email, _sms) = setup();
        let user_id = UserId::new();
        contacts.insert(user_id, "jo@example.com", None);

        let broker = broker::InMemoryBroker::new();
        subscribe_notifications(&broker, dispatcher).await.unwrap();

        broker
            .publish(EXCHANGE, order_created(user_id))
            .await
            .unwrap();
        broker
            .publish(EXCHANGE, payment_completed(user_id))
            .await
            .unwrap();

        for _ in 0..200 {
            if email.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(email.sent().len(), 2);
    }
}
