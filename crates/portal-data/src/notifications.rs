//! Notification push handling
//!
//! The push channel delivers bare numeric notification ids. Each id is turned
//! into a `findRecord` query against the store so the notification is loaded
//! into the cache. Fetch failures are logged and dropped; the push channel
//! keeps running.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::context::StoreContext;
use crate::record::Record;
use crate::schema::RecordType;
use crate::store_traits::RecordStore;

/// Hub method name the server pushes notification ids on
pub const NOTIFICATION_METHOD: &str = "Notification";

pub struct NotificationListener<S: ?Sized> {
    context: Arc<StoreContext>,
    store: Arc<S>,
}

impl<S> NotificationListener<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(context: Arc<StoreContext>, store: Arc<S>) -> Self {
        Self { context, store }
    }

    /// Load the notification with the given remote id.
    ///
    /// Returns `None` if the fetch failed.
    pub async fn on_notification(&self, id: u64) -> Option<Record> {
        let id_string = id.to_string();
        let query = self.context.find_record(RecordType::Notification, &id_string);

        match self.store.query(query, &self.context.default_options()).await {
            Ok(result) => {
                let record = result.into_record();
                debug!(event = "notification.loaded", id = %id_string, found = record.is_some());
                record
            }
            Err(err) => {
                error!(
                    event = "notification.fetch_failed",
                    id = %id_string,
                    error = %err,
                    "unable to retrieve notification"
                );
                None
            }
        }
    }

    /// Handle ids until the sending side closes. Returns how many loaded.
    pub async fn run(&self, mut ids: mpsc::Receiver<u64>) -> usize {
        info!(event = "notification.listening", method = NOTIFICATION_METHOD);
        let mut loaded = 0;
        while let Some(id) = ids.recv().await {
            if self.on_notification(id).await.is_some() {
                loaded += 1;
            }
        }
        info!(event = "notification.closed", loaded = loaded);
        loaded
    }
}
