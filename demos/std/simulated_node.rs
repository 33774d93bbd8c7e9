//! # Simulated node
//!
//! Host-side walkthrough of the adapter lifecycle against the simulated TWAI
//! controller: open, exchange frames with a second node, ride out a bus-off,
//! read throughput statistics and close.
//!
//! ```bash
//! cargo run --example simulated_node
//! ```

use static_cell::StaticCell;
use tokio::time::{sleep, Duration};

use korri_twai::{
    adapter::{AdapterConfig, TwaiAdapter, TwaiResources},
    infra::{
        registry::PeripheralRegistry,
        twai::{simulated::SimulatedTwai, Alerts, DriverState},
    },
    protocol::transport::traits::{frame_transport::FrameTransport, korri_timer::KorriTimer},
};

// ============================================================================
// Peripherals and shared resources
// ============================================================================

static NODE_TWAI: SimulatedTwai = SimulatedTwai::new();
static NODE_RESOURCES: TwaiResources = TwaiResources::new();

// The remote node gets its own registry: on real hardware it is another board.
static REMOTE_TWAI: SimulatedTwai = SimulatedTwai::new();
static REMOTE_RESOURCES: TwaiResources = TwaiResources::new();
static REMOTE_REGISTRY: PeripheralRegistry = PeripheralRegistry::new();

static NODE_ADAPTER: StaticCell<TwaiAdapter<'static, SimulatedTwai>> = StaticCell::new();

// ============================================================================
// Timer implementation for the host
// ============================================================================

pub struct TokioTimer;

impl KorriTimer for TokioTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

fn on_alert(alerts: Alerts, is_error: bool) {
    if is_error {
        println!("[alert] error condition: {:#x}", alerts.bits());
    }
}

/// Frames transmitted by `from` appear on the receive queue of `to`.
fn wire(from: &SimulatedTwai, to: &SimulatedTwai) {
    while let Some(frame) = from.take_transmitted() {
        to.inject(frame);
    }
}

// ============================================================================
// Main application
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let adapter = NODE_ADAPTER.init(TwaiAdapter::new(
        &NODE_TWAI,
        &NODE_RESOURCES,
        AdapterConfig::new().trace_frames(true),
    ));
    let mut remote = TwaiAdapter::with_registry(
        &REMOTE_TWAI,
        &REMOTE_RESOURCES,
        &REMOTE_REGISTRY,
        AdapterConfig::new(),
    );

    adapter.set_alerts_callback(Some(on_alert));
    let mut monitor = adapter.alert_monitor();
    let mut statistics = adapter.statistics_runner(TokioTimer);

    assert!(adapter.open(), "node adapter failed to open");
    assert!(remote.open(), "remote adapter failed to open");

    let application = async {
        // Two seconds of traffic: position updates out, heartbeats in.
        for tick in 0u8..20 {
            adapter.send_frame(0x09F80123, &[tick, 0, 0, 0, 0, 0, 0, 0], true);
            remote.send_frame(0x19F01442, &[0x60, 0xEA, tick], true);
            wire(&NODE_TWAI, &REMOTE_TWAI);
            wire(&REMOTE_TWAI, &NODE_TWAI);

            while let Some(frame) = adapter.receive_frame() {
                let fields = frame.id.routing_fields();
                println!(
                    "[node] pgn {} from {:#04x} ({} bytes)",
                    fields.pgn, fields.source, frame.len
                );
            }
            while remote.receive_frame().is_some() {}
            sleep(Duration::from_millis(100)).await;
        }
        println!("[node] throughput {:?}", adapter.statistics());

        // Too many bit errors: the monitor recovers the bus on its own.
        NODE_TWAI.force_bus_off();
        while NODE_TWAI.state() != DriverState::Recovering {
            sleep(Duration::from_millis(1)).await;
        }
        NODE_TWAI.complete_recovery();
        while NODE_TWAI.state() != DriverState::Running {
            sleep(Duration::from_millis(1)).await;
        }
        println!("[node] bus recovered, sending again");
        adapter.send_frame(0x09F80123, &[0xFF; 8], true);

        adapter.close();
        remote.close();
    };

    tokio::join!(monitor.run(), statistics.run(), application);
    println!("[node] closed");
}
