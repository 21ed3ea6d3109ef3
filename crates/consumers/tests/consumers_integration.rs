//! End-to-end consumer tests over the in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use broker::{
    Broker, BrokerExt, EventPublisher, InMemoryBroker, MAIL_NOTIFICATION_QUEUE,
    ORDER_EVENTS_EXCHANGE, OutboundMessage, QueueBinding, ReconnectPolicy, STOCK_UPDATE_QUEUE,
};
use common::{Money, OrderCreatedEvent, OrderId, ProductId};
use consumers::{
    InMemoryProcessedEffects, LogNotifier, NotificationHandler, RedeliveryPolicy,
    StockDecrementHandler, Worker,
};
use futures_util::StreamExt;
use inventory::{InMemoryInventoryLedger, InventoryLedger, NewProduct};

async fn inventory_with_p1(stock: u32) -> InMemoryInventoryLedger {
    let ledger = InMemoryInventoryLedger::new();
    ledger
        .create_product(NewProduct::new("Laptop", Money::from_major(25000), stock).with_id("P1"))
        .await
        .unwrap();
    ledger
}

async fn stock_of_p1(ledger: &InMemoryInventoryLedger) -> u32 {
    ledger
        .get_product(&ProductId::new("P1"))
        .await
        .unwrap()
        .unwrap()
        .stock
}

fn stock_worker(ledger: &InMemoryInventoryLedger) -> Worker {
    Worker::new(
        STOCK_UPDATE_QUEUE,
        Arc::new(StockDecrementHandler::new(Arc::new(ledger.clone()))),
        RedeliveryPolicy::default(),
    )
}

#[tokio::test]
async fn test_redelivered_event_decrements_stock_once() {
    let ledger = inventory_with_p1(50).await;
    let broker = InMemoryBroker::new();
    let mut stream = broker
        .subscribe(&QueueBinding::stock_updates(), "stock")
        .await
        .unwrap();
    let worker = stock_worker(&ledger);

    // Same message published twice, as a broker redelivery would look
    let event = OrderCreatedEvent::new(OrderId::new(1), ProductId::new("P1"), 2);
    let message = OutboundMessage::order_created(&event).unwrap();
    broker
        .publish(ORDER_EVENTS_EXCHANGE, message.clone())
        .await
        .unwrap();
    broker.publish(ORDER_EVENTS_EXCHANGE, message).await.unwrap();

    for _ in 0..2 {
        let delivery = stream.next().await.unwrap().unwrap();
        worker.handle_delivery(delivery).await.unwrap();
    }

    assert_eq!(stock_of_p1(&ledger).await, 48);
    assert_eq!(broker.acknowledged_count(STOCK_UPDATE_QUEUE).await, 2);
}

#[tokio::test]
async fn test_ledger_outage_retries_until_dead_letter() {
    let ledger = inventory_with_p1(50).await;
    ledger.set_unavailable(true);
    let broker = InMemoryBroker::new();
    let mut stream = broker
        .subscribe(&QueueBinding::stock_updates(), "stock")
        .await
        .unwrap();
    let worker = Worker::new(
        STOCK_UPDATE_QUEUE,
        Arc::new(StockDecrementHandler::new(Arc::new(ledger.clone()))),
        RedeliveryPolicy::new(3),
    );

    let event = OrderCreatedEvent::new(OrderId::new(1), ProductId::new("P1"), 2);
    broker
        .publish(
            ORDER_EVENTS_EXCHANGE,
            OutboundMessage::order_created(&event).unwrap(),
        )
        .await
        .unwrap();

    // One original attempt plus three retries
    for _ in 0..4 {
        let delivery = stream.next().await.unwrap().unwrap();
        worker.handle_delivery(delivery).await.unwrap();
    }

    let parked = broker.dead_letters(STOCK_UPDATE_QUEUE).await;
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].headers.retry_count, 3);
    assert_eq!(broker.queue_depth(STOCK_UPDATE_QUEUE).await, 0);

    ledger.set_unavailable(false);
    assert_eq!(stock_of_p1(&ledger).await, 50);
}

#[tokio::test]
async fn test_both_workers_converge_from_one_publish() {
    let ledger = inventory_with_p1(50).await;
    let processed = InMemoryProcessedEffects::new();
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
    let event = OrderCreatedEvent::new(OrderId::new(7), ProductId::new("P1"), 5);
    assert!(publisher.publish_order_created(&event).await.is_published());

    let stock_worker = stock_worker(&ledger);
    let mail_worker = Worker::new(
        MAIL_NOTIFICATION_QUEUE,
        Arc::new(NotificationHandler::new(
            Arc::new(LogNotifier),
            Arc::new(processed.clone()),
        )),
        RedeliveryPolicy::default(),
    );

    stock_worker
        .handle_delivery(stock.next().await.unwrap().unwrap())
        .await
        .unwrap();
    mail_worker
        .handle_delivery(mail.next().await.unwrap().unwrap())
        .await
        .unwrap();

    assert_eq!(stock_of_p1(&ledger).await, 45);
    assert_eq!(processed.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_worker_resumes_after_broker_outage() {
    let ledger = inventory_with_p1(50).await;
    let broker = InMemoryBroker::new();
    broker.declare_exchange(ORDER_EVENTS_EXCHANGE).await.unwrap();
    broker
        .declare_queue(&QueueBinding::stock_updates())
        .await
        .unwrap();

    let worker = stock_worker(&ledger);
    let connector = Arc::new(broker.clone());
    let supervised = tokio::spawn(async move {
        worker
            .run_supervised(
                connector,
                QueueBinding::stock_updates(),
                ReconnectPolicy::fixed(Duration::from_secs(1)),
            )
            .await
    });

    let publish = |order: i64| {
        let broker = broker.clone();
        async move {
            let event = OrderCreatedEvent::new(OrderId::new(order), ProductId::new("P1"), 1);
            broker
                .publish(
                    ORDER_EVENTS_EXCHANGE,
                    OutboundMessage::order_created(&event).unwrap(),
                )
                .await
                .unwrap();
        }
    };

    publish(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stock_of_p1(&ledger).await, 49);

    broker.set_unavailable(true);
    tokio::time::sleep(Duration::from_secs(3)).await;
    broker.set_unavailable(false);

    // Messages published after recovery are consumed by the new subscription
    publish(2).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(stock_of_p1(&ledger).await, 48);

    supervised.abort();
}
