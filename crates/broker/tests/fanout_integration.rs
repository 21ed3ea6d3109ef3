use std::sync::Arc;
use std::time::Duration;

use broker::{
    BrokerExt, EventPublisher, InMemoryBroker, MAIL_NOTIFICATION_QUEUE, ORDER_EVENTS_EXCHANGE,
    QueueBinding, STOCK_UPDATE_QUEUE,
};
use common::{OrderCreatedEvent, OrderId, ProductId};
use futures_util::StreamExt;

#[tokio::test]
async fn test_every_consumer_queue_receives_each_event() {
    let broker = InMemoryBroker::new();
    let mut stock = broker
        .subscribe(&QueueBinding::stock_updates(), "stock")
        .await
        .unwrap();
    let mut mail = broker
        .subscribe(&QueueBinding::mail_notifications(), "mail")
        .await
        .unwrap();

    let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
        .await
        .unwrap();
    let event = OrderCreatedEvent::new(OrderId::new(42), ProductId::new("P1"), 3);
    let outcome = publisher.publish_order_created(&event).await;
    assert!(outcome.is_published());

    let from_stock = stock.next().await.unwrap().unwrap();
    let from_mail = mail.next().await.unwrap().unwrap();

    assert_eq!(from_stock.queue(), STOCK_UPDATE_QUEUE);
    assert_eq!(from_mail.queue(), MAIL_NOTIFICATION_QUEUE);
    assert_eq!(from_stock.payload(), from_mail.payload());
    assert_eq!(from_stock.headers().event_id, Some(outcome.event_id()));
    assert_eq!(from_mail.headers().event_id, Some(outcome.event_id()));
}

#[tokio::test]
async fn test_settling_on_one_queue_does_not_affect_the_other() {
    let broker = InMemoryBroker::new();
    let mut stock = broker
        .subscribe(&QueueBinding::stock_updates(), "stock")
        .await
        .unwrap();
    let mut mail = broker
        .subscribe(&QueueBinding::mail_notifications(), "mail")
        .await
        .unwrap();
    let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
        .await
        .unwrap();

    let event = OrderCreatedEvent::new(OrderId::new(1), ProductId::new("P1"), 1);
    publisher.publish_order_created(&event).await;

    let first = stock.next().await.unwrap().unwrap();
    assert_eq!(first.retry().await.unwrap(), 1);
    let retried = stock.next().await.unwrap().unwrap();
    assert_eq!(retried.retry_count(), 1);
    retried.dead_letter("gave up").await.unwrap();

    let delivered = mail.next().await.unwrap().unwrap();
    assert_eq!(delivered.retry_count(), 0);
    delivered.ack().await.unwrap();

    assert_eq!(broker.dead_letters(STOCK_UPDATE_QUEUE).await.len(), 1);
    assert!(broker.dead_letters(MAIL_NOTIFICATION_QUEUE).await.is_empty());
    assert_eq!(broker.queue_depth(STOCK_UPDATE_QUEUE).await, 0);
    assert_eq!(broker.queue_depth(MAIL_NOTIFICATION_QUEUE).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_events_published_during_outage_are_dropped_not_queued() {
    let broker = InMemoryBroker::new();
    broker
        .subscribe(&QueueBinding::stock_updates(), "stock")
        .await
        .unwrap();
    let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
        .await
        .unwrap();

    broker.set_unavailable(true);
    let event = OrderCreatedEvent::new(OrderId::new(5), ProductId::new("P1"), 1);
    let outcome = publisher.publish_order_created(&event).await;
    assert!(!outcome.is_published());

    broker.set_unavailable(false);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(broker.queue_depth(STOCK_UPDATE_QUEUE).await, 0);
}
