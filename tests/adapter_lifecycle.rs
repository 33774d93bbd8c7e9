//! Two simulated ECUs exchanging NMEA 2000 frames through their adapters.
mod helpers;

use helpers::{pump, Node};
use korri_twai::{
    adapter::AdapterConfig,
    infra::twai::{DriverState, TwaiFrame},
    protocol::transport::traits::frame_transport::FrameTransport,
};

#[test]
/// A broadcast and an addressed frame cross the wire unchanged.
fn test_frames_cross_the_wire() {
    let (gps, plotter) = (Node::new(), Node::new());
    let mut gps_adapter = gps.adapter(AdapterConfig::new());
    let mut plotter_adapter = plotter.adapter(AdapterConfig::new());
    assert!(gps_adapter.open());
    assert!(plotter_adapter.open());

    // PGN 129025 position rapid update, broadcast from address 0x23.
    let position = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];
    assert!(gps_adapter.send_frame(0x09F80123, &position, true));
    // PGN 59904 ISO request addressed to 0x23 from 0x42.
    assert!(plotter_adapter.send_frame(0x18EA2342, &[0x14, 0xF0, 0x01], false));

    assert_eq!(pump(&gps.driver, &plotter.driver), 1);
    assert_eq!(pump(&plotter.driver, &gps.driver), 1);

    let received = plotter_adapter.receive_frame().expect("position frame");
    let fields = received.id.routing_fields();
    assert_eq!(fields.pgn, 129025);
    assert_eq!(fields.source, 0x23);
    assert_eq!(fields.destination, 0xFF);
    assert_eq!(received.payload(), &position);

    let request = gps_adapter.receive_frame().expect("request frame");
    let fields = request.id.routing_fields();
    assert_eq!(fields.pgn, 59904);
    assert_eq!(fields.destination, 0x23);
    assert_eq!(fields.source, 0x42);
    assert_eq!(request.payload(), &[0x14, 0xF0, 0x01]);

    assert!(gps_adapter.receive_frame().is_none());
    assert!(plotter_adapter.receive_frame().is_none());
}

#[test]
/// Frames are delivered in order and standard frames never reach the caller.
fn test_order_and_standard_filtering() {
    let node = Node::new();
    let mut adapter = node.adapter(AdapterConfig::new());
    assert!(adapter.open());

    for seq in 0..5u8 {
        assert!(node.driver.inject(TwaiFrame::new_extended(0x0DF01023, &[seq])));
        if seq % 2 == 0 {
            let noise = TwaiFrame::new_standard(0x100, &[0xFF]).expect("standard frame");
            assert!(node.driver.inject(noise));
        }
    }

    let mut sequence = Vec::new();
    for _ in 0..16 {
        if let Some(frame) = adapter.receive_frame() {
            sequence.push(frame.payload()[0]);
        }
    }
    assert_eq!(sequence, vec![0, 1, 2, 3, 4]);
}

#[test]
/// The adapter survives a stop/restart and a full close/reopen cycle.
fn test_reopen_after_close() {
    let node = Node::new();
    let mut adapter = node.adapter(AdapterConfig::new().trace_frames(true));
    assert!(adapter.open());
    assert!(adapter.send_frame(0x18FEDF00, &[1], true));

    adapter.close();
    assert!(!node.driver.is_installed());
    assert!(!adapter.send_frame(0x18FEDF00, &[2], true));

    assert!(adapter.open());
    assert_eq!(node.driver.install_count(), 2);
    assert_eq!(node.driver.pending_transmit(), 0);
    assert!(adapter.send_frame(0x18FEDF00, &[3], true));
    assert_eq!(
        node.driver.take_transmitted().map(|f| f.payload()[0]),
        Some(3)
    );

    let status = adapter.status().expect("status while open");
    assert_eq!(status.state, DriverState::Running);
}
