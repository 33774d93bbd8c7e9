//! Throughput statistics driven by the periodic runner, on tokio's paused clock.
#![cfg(feature = "statistics")]
mod helpers;

use helpers::{MockTimer, Node};
use korri_twai::{
    adapter::{statistics::smooth, AdapterConfig},
    infra::twai::TwaiFrame,
    protocol::transport::traits::frame_transport::FrameTransport,
};
use tokio::time::{sleep, timeout, Duration};

#[tokio::test(start_paused = true)]
/// Rates follow one decay per second and the runner exits on close.
async fn test_runner_decays_once_per_second() {
    let node = Node::new();
    let mut adapter = node.adapter(AdapterConfig::new());
    assert!(adapter.open());
    let mut runner = adapter.statistics_runner(MockTimer);

    for _ in 0..20 {
        assert!(adapter.send_frame(0x18FEDF00, &[0; 8], true));
        assert!(node.driver.take_transmitted().is_some());
    }
    for _ in 0..4 {
        assert!(node.driver.inject(TwaiFrame::new_extended(0x09F80123, &[0; 2])));
        assert!(adapter.receive_frame().is_some());
    }

    let scenario = async {
        sleep(Duration::from_millis(1500)).await;
        let rates = adapter.statistics();
        assert_eq!(rates.tx_packets_per_second, smooth(0, 20));
        assert_eq!(rates.tx_bits_per_second, smooth(0, 20 * 116));
        assert_eq!(rates.rx_packets_per_second, smooth(0, 4));
        assert_eq!(rates.rx_bits_per_second, smooth(0, 4 * 68));

        // Quiet second: rates fall to 5% of their previous value.
        sleep(Duration::from_millis(1000)).await;
        let quiet = adapter.statistics();
        assert_eq!(
            quiet.tx_bits_per_second,
            smooth(rates.tx_bits_per_second, 0)
        );
        assert_eq!(quiet.rx_packets_per_second, 0);
        adapter.close();
    };

    let finished = timeout(Duration::from_secs(10), async {
        tokio::join!(runner.run(), scenario);
    })
    .await;
    assert!(finished.is_ok(), "statistics runner did not stop on close");
}

#[tokio::test(start_paused = true)]
/// A runner created for a closed adapter returns without ticking.
async fn test_runner_after_close() {
    let node = Node::new();
    let mut adapter = node.adapter(AdapterConfig::new());
    assert!(adapter.open());
    adapter.close();

    let mut runner = adapter.statistics_runner(MockTimer);
    assert!(timeout(Duration::from_millis(10), runner.run()).await.is_ok());
}
