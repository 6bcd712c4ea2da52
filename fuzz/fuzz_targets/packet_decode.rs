#![no_main]

use bloomcast_core::router::validate;
use bloomcast_proto::{PACKET_SIZE, PAYLOAD_SIZE, Packet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::decode(data) {
        let (topic, message) = packet.topic_and_message();
        assert!(topic.len() + message.len() <= PAYLOAD_SIZE);
        assert_eq!(Packet::decode(packet.as_wire()).ok(), Some(packet));
    }

    // The router accepts exactly the full-size current-version packets, any type
    if let Ok(packet) = validate(data) {
        assert_eq!(data.len(), PACKET_SIZE);
        assert_eq!(packet.as_wire(), data);
    }
});
