pub mod alert;
pub mod batcher;
pub mod classifier;
pub mod config;
pub mod consumer;
pub mod learn;
pub mod queue;
pub mod validator;

pub use alert::{AlertDeliveryError, AlertPayload, AlertSink, HttpAlertSink};
pub use batcher::{Batch, Batcher};
pub use classifier::{ClassificationError, ClassificationGateway, Classify};
pub use config::{Config, ConfigError, ConfigOverrides, PipelineSettings};
pub use consumer::{Consumer, ConsumerSummary};
pub use learn::SpamFilter;
pub use queue::{AmqpQueue, ChannelPublisher, ChannelQueue, Delivery, MessageQueue, QueueError};
pub use validator::{MessageValidator, ValidatedRecord, ValidationError};
