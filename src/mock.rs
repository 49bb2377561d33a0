//! In-memory transport used by the unit tests.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::transport::{BleTransport, TransportFactory};
use crate::{Error, Result};

/// Shared counters so a test can inspect a transport after handing it off
#[derive(Default)]
pub struct MockState {
    pub connected: AtomicBool,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_write: AtomicBool,
    pub writes: Mutex<Vec<Vec<u8>>>,
    /// Every connect/write in call order
    pub log: Mutex<Vec<&'static str>>,
}

impl MockState {
    pub fn connects(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Simulates the lamp dropping the link on its own
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    pub state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl BleTransport for MockTransport {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.state.log.lock().push("connect");
            tokio::task::yield_now().await;
            if self.state.fail_connect.load(Ordering::SeqCst) {
                return Err(Error::DeviceNotFound("mock".to_string()));
            }
            self.state.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            self.state.connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_connected(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.state.connected.load(Ordering::SeqCst) })
    }

    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.log.lock().push("write");
            if !self.state.connected.load(Ordering::SeqCst) {
                return Err(Error::NotConnected("mock".to_string()));
            }
            if self.state.fail_write.load(Ordering::SeqCst) {
                return Err(Error::NotConnected("mock".to_string()));
            }
            self.state.writes.lock().push(data.to_vec());
            Ok(())
        })
    }
}

/// Factory that records the state of every transport it builds, keyed by MAC
pub fn mock_factory() -> (TransportFactory, Arc<Mutex<Vec<(String, Arc<MockState>)>>>) {
    let built: Arc<Mutex<Vec<(String, Arc<MockState>)>>> = Arc::default();
    let sink = built.clone();
    let factory: TransportFactory = Arc::new(move |mac: &str| {
        let (transport, state) = MockTransport::new();
        sink.lock().push((mac.to_string(), state));
        Box::new(transport) as Box<dyn BleTransport>
    });
    (factory, built)
}
