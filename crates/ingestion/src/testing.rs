//! Test helpers

use std::sync::Mutex;
use std::time::Duration;

use contracts::{BufferSink, SharedBuffer};

/// Sink that copies every unit out and releases the handle
#[derive(Default)]
pub struct CollectingSink {
    units: Mutex<Vec<Vec<u8>>>,
}

impl CollectingSink {
    pub fn units(&self) -> Vec<Vec<u8>> {
        self.units.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.units.lock().unwrap().len()
    }

    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("units not received in time");
    }
}

impl BufferSink for CollectingSink {
    fn submit(&self, buffer: SharedBuffer) {
        self.units.lock().unwrap().push(buffer.as_slice().to_vec());
        buffer.release();
    }
}
