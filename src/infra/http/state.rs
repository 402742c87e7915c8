use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::application::records::RecordService;
use crate::application::repos::DocumentStore;
use crate::domain::entities::{OrderRecord, ProductRecord, UserRecord};

#[derive(Clone)]
pub struct HttpState {
    pub users: RecordService<UserRecord>,
    pub products: RecordService<ProductRecord>,
    pub orders: RecordService<OrderRecord>,
    pub store: Arc<dyn DocumentStore>,
    /// Deadline for the health probe, matching the record operations.
    pub operation_timeout: Duration,
}

impl FromRef<HttpState> for RecordService<UserRecord> {
    fn from_ref(state: &HttpState) -> Self {
        state.users.clone()
    }
}

impl FromRef<HttpState> for RecordService<ProductRecord> {
    fn from_ref(state: &HttpState) -> Self {
        state.products.clone()
    }
}

impl FromRef<HttpState> for RecordService<OrderRecord> {
    fn from_ref(state: &HttpState) -> Self {
        state.orders.clone()
    }
}
