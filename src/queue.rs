use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue connection failed: {0}")]
    Connection(String),
    #[error("Failed to acknowledge message: {0}")]
    Ack(String),
    #[error("Queue delivery stream closed")]
    Closed,
}

impl From<lapin::Error> for QueueError {
    fn from(e: lapin::Error) -> Self {
        QueueError::Connection(e.to_string())
    }
}

/// Transport-level acknowledgment of a single delivery.
#[async_trait::async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), QueueError>;
}

/// A message handed out by a [`MessageQueue`]. Must be acknowledged exactly
/// once.
pub struct Delivery {
    payload: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, acker: Box<dyn Acknowledge>) -> Self {
        Self { payload, acker }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub async fn ack(self) -> Result<(), QueueError> {
        self.acker.ack().await
    }
}

#[async_trait::async_trait]
pub trait MessageQueue: Send {
    /// Name of the queue being consumed.
    fn name(&self) -> &str;

    /// Wait for the next delivery. `None` means the stream ended.
    async fn next(&mut self) -> Option<Result<Delivery, QueueError>>;
}

/// Consumer on a durable AMQP queue.
pub struct AmqpQueue {
    name: String,
    consumer: lapin::Consumer,
    _channel: Channel,
    _connection: Connection,
}

impl AmqpQueue {
    pub async fn connect(connstring: &str, queue_name: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(connstring, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(format!("failed to connect to {queue_name}: {e}")))?;

        let channel = connection.create_channel().await?;

        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                queue_name,
                concat!("spamd-", env!("CARGO_PKG_VERSION")),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!(
            "Consuming from queue '{}' ({} message(s) waiting)",
            queue_name,
            queue.message_count()
        );

        Ok(Self {
            name: queue_name.to_string(),
            consumer,
            _channel: channel,
            _connection: connection,
        })
    }
}

struct AmqpAcker(lapin::acker::Acker);

#[async_trait::async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Ack(e.to_string()))
    }
}

#[async_trait::async_trait]
impl MessageQueue for AmqpQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|d| Delivery::new(d.data, Box::new(AmqpAcker(d.acker))))
                .map_err(QueueError::from),
        )
    }
}

/// In-process queue fed through a channel. Acknowledgments are counted.
pub struct ChannelQueue {
    name: String,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    acked: Arc<AtomicUsize>,
}

/// Producer half of a [`ChannelQueue`].
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelPublisher {
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<(), QueueError> {
        self.sender
            .send(payload.into())
            .map_err(|_| QueueError::Closed)
    }
}

impl ChannelQueue {
    pub fn new(name: impl Into<String>) -> (ChannelPublisher, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            name: name.into(),
            receiver,
            acked: Arc::new(AtomicUsize::new(0)),
        };
        (ChannelPublisher { sender }, queue)
    }

    /// Shared counter of acknowledged deliveries.
    pub fn ack_counter(&self) -> Arc<AtomicUsize> {
        self.acked.clone()
    }
}

struct CountingAcker(Arc<AtomicUsize>);

#[async_trait::async_trait]
impl Acknowledge for CountingAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageQueue for ChannelQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        let payload = self.receiver.recv().await?;
        Some(Ok(Delivery::new(
            payload,
            Box::new(CountingAcker(self.acked.clone())),
        )))
    }
}
