/// Test doubles shared by the integration tests: a tokio-backed timer, a
/// self-contained simulated node and a wire moving frames between nodes.
use korri_twai::{
    adapter::{AdapterConfig, TwaiAdapter, TwaiResources},
    infra::{registry::PeripheralRegistry, twai::simulated::SimulatedTwai},
    protocol::transport::traits::korri_timer::KorriTimer,
};
use tokio::time::{sleep, Duration};

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl KorriTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[allow(dead_code)]
/// Everything one ECU needs: its controller, the adapter's shared resources
/// and a private registry so tests can run in parallel.
pub struct Node {
    pub driver: SimulatedTwai,
    pub resources: TwaiResources,
    pub registry: PeripheralRegistry,
}

#[allow(dead_code)]
impl Node {
    pub fn new() -> Self {
        Self {
            driver: SimulatedTwai::new(),
            resources: TwaiResources::new(),
            registry: PeripheralRegistry::new(),
        }
    }

    pub fn adapter(&self, config: AdapterConfig) -> TwaiAdapter<'_, SimulatedTwai> {
        TwaiAdapter::with_registry(&self.driver, &self.resources, &self.registry, config)
    }
}

#[allow(dead_code)]
/// Move every frame transmitted by `from` onto the receive queue of `to`.
/// Returns the number of frames delivered.
pub fn pump(from: &SimulatedTwai, to: &SimulatedTwai) -> usize {
    let mut delivered = 0;
    while let Some(frame) = from.take_transmitted() {
        if to.inject(frame) {
            delivered += 1;
        }
    }
    delivered
}

#[allow(dead_code)]
/// Poll `condition` every millisecond for up to one second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(1)).await;
    }
    condition()
}
