//! Client-side topic set with a matching bloom filter.

use std::{collections::BTreeSet, fmt};

use bloomcast_core::SubscriptionFilter;
use bloomcast_proto::FilterParams;

/// Default number of topics the filter is sized for.
pub const DEFAULT_CAPACITY: u32 = 1000;

/// Default target false-positive rate.
pub const DEFAULT_FP_RATE: f64 = 0.01;

/// Topics a client wants, plus a bloom filter over them.
///
/// Removing a topic rebuilds the filter from the remaining set, since bits
/// cannot be cleared individually.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    topics: BTreeSet<String>,
    filter: SubscriptionFilter,
    params: FilterParams,
}

impl TopicFilter {
    /// Filter sized for `capacity` topics at `fp_rate` false positives.
    pub fn with_estimates(capacity: u32, fp_rate: f64) -> Self {
        let params = FilterParams::with_estimates(capacity, fp_rate);
        Self { topics: BTreeSet::new(), filter: SubscriptionFilter::new(params), params }
    }

    /// Add a topic. Returns `false` if it was already present.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        if !self.topics.insert(topic.to_owned()) {
            return false;
        }
        self.filter.add(topic);
        true
    }

    /// Remove a topic and rebuild the filter. Returns `false` if absent.
    pub fn remove_topic(&mut self, topic: &str) -> bool {
        if !self.topics.remove(topic) {
            return false;
        }
        self.regenerate();
        true
    }

    /// Drop every topic.
    pub fn clear(&mut self) {
        self.topics.clear();
        self.filter = SubscriptionFilter::new(self.params);
    }

    /// Test the bloom filter. May report topics never added.
    pub fn contains(&self, topic: &str) -> bool {
        self.filter.contains(topic)
    }

    /// Topics added, in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    /// Number of topics added.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// True if no topics are present.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Dimensions sent in a `SUB` frame.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    fn regenerate(&mut self) {
        let mut filter = SubscriptionFilter::new(self.params);
        for topic in &self.topics {
            filter.add(topic);
        }
        self.filter = filter;
    }
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self::with_estimates(DEFAULT_CAPACITY, DEFAULT_FP_RATE)
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TopicFilter(topics={}, bits={}, hashes={})",
            self.topics.len(),
            self.params.bit_size,
            self.params.hash_count
        )
    }
}
