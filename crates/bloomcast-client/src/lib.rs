//! Client SDK for the bloomcast daemon.
//!
//! [`PubSubClient`] wraps a Unix or TCP connection to a local daemon and
//! speaks the text command protocol: `PUB <topic>|<message>` to publish,
//! `SUB ` plus filter dimensions to subscribe, and `MSG <topic>|<message>`
//! deliveries back. [`TopicFilter`] keeps the client's topic set and the
//! bloom filter sized for it.
//!
//! ```no_run
//! # async fn run() -> bloomcast_client::Result<()> {
//! use bloomcast_client::{PubSubClient, TopicFilter};
//!
//! let mut client = PubSubClient::connect_unix("/tmp/pubsub.sock").await?;
//! let mut topics = TopicFilter::default();
//! topics.add_topic("sensors/temperature");
//! client.subscribe(&topics).await?;
//! client.publish("sensors/temperature", "21.5").await?;
//! let delivery = client.recv().await?;
//! if let (Some(topic), Some(message)) = (delivery.topic_str(), delivery.message_str()) {
//!     tracing::info!(topic, message, "delivery");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod topic_filter;

pub use bloomcast_proto::{Delivery, FilterParams};
pub use client::{PubSubClient, publish_frame};
pub use error::{ClientError, Result};
pub use topic_filter::TopicFilter;
