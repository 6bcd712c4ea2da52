#![no_main]

use bloomcast_core::SubscriptionFilter;
use bloomcast_proto::{Command, FilterParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(command) = Command::parse(data) else {
        assert!(data.len() < 4);
        return;
    };

    match command {
        Command::Subscribe { payload } => {
            if let Ok(params) = FilterParams::decode(&payload) {
                // Cap allocation so the fuzzer measures parsing, not memory
                let params = FilterParams::new(params.bit_size % (1 << 20), params.hash_count % 64);
                let mut filter = SubscriptionFilter::new(params);
                filter.add("fuzz");
                assert!(filter.contains("fuzz"));
            }
        },
        publish @ Command::Publish { .. } => {
            assert_eq!(Command::parse(&publish.to_frame()), Some(publish));
        },
        Command::Unknown { .. } => {},
    }
});
