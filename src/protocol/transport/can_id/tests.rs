//! Unit tests for the `CanId` accessors and routing decomposition.
use super::*;

//==================================================================================CAN_ID
#[test]
/// Extracts the source address from the raw ID.
fn test_source_address() {
    let can_id = CanId::new(0x1AE225D1);
    assert_eq!(can_id.source_address(), 0xD1);
}

#[test]
/// Verifies extraction of the 3-bit priority field.
fn test_priority() {
    let can_id = CanId::new(0x1AE225D1);
    assert_eq!(can_id.priority(), 0b110)
}

#[test]
/// PDU1: the PS byte is the destination and does not enter the PGN.
fn test_pdu1_routing() {
    // Priority 3, DP 1, PF 0xEA (ISO Request), PS 0x23, SA 0x42.
    let fields = extract_routing_fields(0x0DEA2342);
    assert_eq!(fields.priority, 3);
    assert_eq!(fields.pgn, 0x1EA00);
    assert_eq!(fields.destination, 0x23);
    assert_eq!(fields.source, 0x42);
}

#[test]
/// PDU2: the destination is global and PS extends the PGN.
fn test_pdu2_routing() {
    let fields = extract_routing_fields(0x18FEDF00);
    assert_eq!(
        fields,
        RoutingFields {
            priority: 6,
            pgn: 0xFEDF,
            source: 0x00,
            destination: 0xFF,
        }
    );
    assert_eq!(fields.pgn, 65247);
}

#[test]
/// PF = 239 is the last addressed format, PF = 240 the first broadcast one.
fn test_pdu_boundary() {
    let addressed = CanId::new(0x09EF1020);
    assert!(!addressed.is_broadcast());
    assert_eq!(addressed.destination(), 0x10);
    assert_eq!(addressed.pgn(), 0x1EF00);

    let broadcast = CanId::new(0x09F01020);
    assert!(broadcast.is_broadcast());
    assert_eq!(broadcast.destination(), 0xFF);
    assert_eq!(broadcast.pgn(), 0x1F010);
}

#[test]
/// Bits above the 29-bit identifier never leak into the fields.
fn test_upper_bits_ignored() {
    assert_eq!(
        extract_routing_fields(0xF8FEDF00),
        extract_routing_fields(0x18FEDF00)
    );
    assert_eq!(CanId::new(0xFFFF_FFFF).0, 0x1FFF_FFFF);
}

#[test]
/// Sweep every PF/PS combination for both data pages and several priorities.
fn test_routing_is_total() {
    for priority in [0u32, 3, 7] {
        for dp in 0..=1u32 {
            for pf in 0..=255u32 {
                for ps in [0u32, 0x01, 0x7F, 0xFF] {
                    let id = (priority << 26) | (dp << 24) | (pf << 16) | (ps << 8) | 0x5A;
                    let fields = extract_routing_fields(id);
                    assert!(fields.priority <= 7);
                    assert_eq!(fields.priority as u32, priority);
                    assert_eq!(fields.source, 0x5A);
                    if pf < 240 {
                        assert_eq!(fields.destination as u32, ps);
                        assert_eq!(fields.pgn, (dp << 16) | (pf << 8));
                    } else {
                        assert_eq!(fields.destination, 0xFF);
                        assert_eq!(fields.pgn, (dp << 16) | (pf << 8) | ps);
                    }
                }
            }
        }
    }
}
