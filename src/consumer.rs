use crate::alert::{spam_subset, AlertSink};
use crate::batcher::{Batch, Batcher};
use crate::classifier::ClassificationGateway;
use crate::queue::{MessageQueue, QueueError};
use crate::validator::MessageValidator;

/// Counters reported when the consumer stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub received: u64,
    pub invalid: u64,
    pub batches_flushed: u64,
    pub classification_failures: u64,
    pub spam_found: u64,
    pub alerts_delivered: u64,
    pub alert_failures: u64,
}

/// Single-task pipeline: queue -> validate -> batch -> classify -> alert.
///
/// Every delivery is acknowledged once its iteration finishes, whatever the
/// outcome of validation, classification or alerting. The loop stops when
/// a payload contains the queue's own name, or with an error when the queue
/// itself fails.
pub struct Consumer<Q, S> {
    queue: Q,
    batcher: Batcher,
    gateway: ClassificationGateway,
    sink: S,
    flush_on_shutdown: bool,
    summary: ConsumerSummary,
}

impl<Q, S> Consumer<Q, S>
where
    Q: MessageQueue,
    S: AlertSink,
{
    pub fn new(queue: Q, batcher: Batcher, gateway: ClassificationGateway, sink: S) -> Self {
        Self {
            queue,
            batcher,
            gateway,
            sink,
            flush_on_shutdown: false,
            summary: ConsumerSummary::default(),
        }
    }

    /// Classify and alert on a partial batch when the shutdown sentinel
    /// arrives, instead of dropping it.
    pub fn flush_on_shutdown(mut self, enabled: bool) -> Self {
        self.flush_on_shutdown = enabled;
        self
    }

    pub async fn run(mut self) -> Result<ConsumerSummary, QueueError> {
        log::info!(
            "Consumer started on '{}' with batch size {}",
            self.queue.name(),
            self.batcher.batch_size()
        );

        loop {
            let delivery = match self.queue.next().await {
                Some(delivery) => delivery?,
                None => return Err(QueueError::Closed),
            };

            self.summary.received += 1;
            let stop = self.is_shutdown_sentinel(delivery.payload());

            self.process(delivery.payload()).await;
            delivery.ack().await?;

            if stop {
                log::info!(
                    "Shutdown sentinel received on '{}', stopping consumer",
                    self.queue.name()
                );
                break;
            }
        }

        if self.flush_on_shutdown && !self.batcher.is_empty() {
            let batch = self.batcher.flush();
            log::info!("Flushing {} pending record(s) before shutdown", batch.len());
            self.handle_batch(batch).await;
        } else if !self.batcher.is_empty() {
            log::warn!(
                "Dropping {} pending record(s) at shutdown",
                self.batcher.len()
            );
        }

        log::info!("Consumer stopped: {:?}", self.summary);
        Ok(self.summary)
    }

    fn is_shutdown_sentinel(&self, payload: &[u8]) -> bool {
        String::from_utf8_lossy(payload).contains(self.queue.name())
    }

    async fn process(&mut self, payload: &[u8]) {
        let record = match MessageValidator::validate(payload) {
            Ok(record) => record,
            Err(e) => {
                self.summary.invalid += 1;
                log::warn!(
                    "Skipping invalid message ({e}): {}",
                    MessageValidator::excerpt(payload)
                );
                return;
            }
        };
        log::debug!("Accepted message from owner {}", record.owner_id);

        if self.batcher.append(record) {
            let batch = self.batcher.flush();
            self.handle_batch(batch).await;
        }
    }

    async fn handle_batch(&mut self, batch: Batch) {
        self.summary.batches_flushed += 1;

        let labels = match self.gateway.classify(&batch).await {
            Ok(labels) => labels,
            Err(e) => {
                self.summary.classification_failures += 1;
                log::error!("Dropping batch of {} record(s): {e}", batch.len());
                return;
            }
        };

        let payload = spam_subset(&batch, &labels);
        log::info!(
            "Classified batch of {}: {} spam",
            batch.len(),
            payload.len()
        );
        if payload.is_empty() {
            return;
        }
        self.summary.spam_found += payload.len() as u64;

        for record in &payload {
            log::info!("Spam from owner {}: {}", record.owner_id, record.text);
        }

        match self.sink.alert(&payload).await {
            Ok(()) => self.summary.alerts_delivered += 1,
            Err(e) => {
                self.summary.alert_failures += 1;
                log::error!(
                    "Failed to deliver alert for {} spam record(s) (status {:?}): {e}",
                    payload.len(),
                    e.status()
                );
            }
        }
    }
}
