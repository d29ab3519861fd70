//! Integration tests: a real federate (driven through
//! [`federate_rt::orchestrator`]) against the in-process `rti_stub`, over
//! actual loopback TCP sockets.

use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::thread;

use federate_rt::event_queue::RecordingQueue;
use federate_rt::rti_stub::{run_stub_rti, StubConfig};
use federate_rt::{FederateConfig, FederateId, FederateRuntime, Instant, RuntimeConstants};

fn bind_stub(federation_id: &str, number_of_federates: usize, start_time: Instant) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = StubConfig {
        federation_id: federation_id.to_string(),
        number_of_federates,
        start_time,
    };
    thread::spawn(move || run_stub_rti(listener, config));
    port
}

#[test_log::test]
fn scenario1_bootstrap_ok_against_stub_rti() {
    let port = bind_stub("fed-x", 1, Instant::from_nanos(1_000_000_000));

    let config = FederateConfig::new(FederateId::from(0), "fed-x", Ipv4Addr::LOCALHOST)
        .with_rti_port(port)
        .with_fast_forward(true)
        .with_constants(RuntimeConstants::for_tests());

    let event_queue = Arc::new(RecordingQueue::new(Instant::ZERO));
    let runtime = FederateRuntime::start(config, event_queue).unwrap();

    assert_eq!(runtime.start_time, Instant::from_nanos(1_000_000_000));
}

#[test_log::test]
fn scenario2_wrong_federation_id_is_rejected() {
    let port = bind_stub("fed-correct", 1, Instant::ZERO);

    let config = FederateConfig::new(FederateId::from(0), "fed-wrong", Ipv4Addr::LOCALHOST)
        .with_rti_port(port)
        .with_fast_forward(true)
        .with_constants(RuntimeConstants {
            connect_num_retries: 1,
            ..RuntimeConstants::for_tests()
        });

    let event_queue = Arc::new(RecordingQueue::new(Instant::ZERO));
    let result = FederateRuntime::start(config, event_queue);
    assert!(result.is_err());
}

#[test_log::test]
fn isolated_federate_advances_time_without_rti_traffic() {
    let port = bind_stub("fed-isolated", 1, Instant::ZERO);

    let config = FederateConfig::new(FederateId::from(0), "fed-isolated", Ipv4Addr::LOCALHOST)
        .with_rti_port(port)
        .with_fast_forward(true)
        .with_constants(RuntimeConstants::for_tests());

    let event_queue = Arc::new(RecordingQueue::new(Instant::ZERO));
    let runtime = FederateRuntime::start(config, event_queue).unwrap();

    // No upstream/downstream neighbors configured: next_event_time must
    // return immediately with no RTI round trip required.
    let granted = runtime
        .coordinator
        .next_event_time(Instant::from_nanos(5_000))
        .unwrap();
    assert_eq!(granted, Instant::from_nanos(5_000));
}
