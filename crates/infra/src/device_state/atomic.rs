use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use web2wire_core::DeviceState;

use super::r#trait::DeviceStateStore;
use crate::error::StoreError;

const IDLE: u8 = 0;
const PROCESSING: u8 = 1;

/// In-process device state backed by a single atomic byte.
#[derive(Debug)]
pub struct AtomicDeviceState {
    state: AtomicU8,
}

impl AtomicDeviceState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn get(&self) -> DeviceState {
        match self.state.load(Ordering::Acquire) {
            PROCESSING => DeviceState::Processing,
            _ => DeviceState::Idle,
        }
    }
}

impl Default for AtomicDeviceState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStateStore for AtomicDeviceState {
    async fn read(&self) -> Result<DeviceState, StoreError> {
        Ok(self.get())
    }

    async fn try_claim(&self) -> Result<bool, StoreError> {
        Ok(self
            .state
            .compare_exchange(IDLE, PROCESSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    async fn release(&self) -> Result<(), StoreError> {
        self.state.store(IDLE, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test]
    async fn claim_release_cycle() {
        let cell = AtomicDeviceState::new();
        assert_eq!(cell.read().await.unwrap(), DeviceState::Idle);

        assert!(cell.try_claim().await.unwrap());
        assert_eq!(cell.read().await.unwrap(), DeviceState::Processing);
        assert!(!cell.try_claim().await.unwrap());

        cell.release().await.unwrap();
        cell.release().await.unwrap();
        assert_eq!(cell.read().await.unwrap(), DeviceState::Idle);
        assert!(cell.try_claim().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn exactly_one_concurrent_claim_wins() {
        for _ in 0..50 {
            let cell = Arc::new(AtomicDeviceState::new());
            let winners = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(tokio::sync::Barrier::new(16));

            let mut tasks = Vec::new();
            for _ in 0..16 {
                let cell = cell.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                tasks.push(tokio::spawn(async move {
                    barrier.wait().await;
                    if cell.try_claim().await.unwrap() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for t in tasks {
                t.await.unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert_eq!(cell.get(), DeviceState::Processing);
        }
    }
}
