//! Per-unit payload construction from a shared order template.

use serde::Serialize;
use std::sync::Arc;

use crate::order::OrderPayload;

/// Anything the dispatch engine can turn into one request body per unit.
pub trait PayloadSource: Send + Sync + 'static {
    type Payload: Serialize + Send;

    /// Builds the payload for the 0-based unit `index`.
    fn build(&self, index: usize) -> Self::Payload;

    /// Human-readable code carried by a built payload, used in reports.
    fn code(&self, payload: &Self::Payload) -> String;
}

/// Returns the order code for a 1-based sequence number.
pub fn order_code(sequence: usize) -> String {
    format!("CODE {}", sequence)
}

/// Produces one independent order per unit of work.
///
/// The template is frozen behind an `Arc` when the builder is created and is
/// only ever read afterwards, so clones of the builder can be handed to any
/// number of concurrent tasks.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    template: Arc<OrderPayload>,
}

impl PayloadBuilder {
    pub fn new(template: OrderPayload) -> Self {
        Self {
            template: Arc::new(template),
        }
    }

    pub fn template(&self) -> &OrderPayload {
        &self.template
    }

    /// Builds the payload for the 0-based unit `index`.
    ///
    /// The result owns all of its nested data; nothing is shared with the
    /// template or with payloads built for other indices.
    pub fn build(&self, index: usize) -> OrderPayload {
        let mut payload = OrderPayload::clone(&self.template);
        payload.code = order_code(index + 1);
        payload
    }
}

impl PayloadSource for PayloadBuilder {
    type Payload = OrderPayload;

    fn build(&self, index: usize) -> OrderPayload {
        PayloadBuilder::build(self, index)
    }

    fn code(&self, payload: &OrderPayload) -> String {
        payload.code.clone()
    }
}
