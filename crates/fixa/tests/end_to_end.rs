#![cfg(feature = "peer")]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use fixa::peer::{ControllerEvent, ListenerHandle, PeerError, SessionState};
use fixa::transport::{FixaStream, TcpTransport};
use fixa::{
    Color, Controller, ControllerConfig, Device, DeviceConfig, FixableBool, FixableColor,
    FixableConfig, FixableFloat, FixableId, FixableValue, Registry,
};

const WAIT: Duration = Duration::from_secs(5);

fn demo_registry() -> Registry {
    let registry = Registry::new();
    registry
        .declare_with_value(
            "Size",
            FixableConfig::float("Size", 10.0, 100.0).with_order(0),
            50.0_f32,
        )
        .expect("Size should declare");
    registry
        .declare_with_value("Open", FixableConfig::bool("Open").with_order(1), false)
        .expect("Open should declare");
    registry
}

fn serve(device: &Device) -> ListenerHandle {
    let listener = TcpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .expect("listener should bind");
    device.spawn_listener(listener).expect("listener should spawn")
}

fn ids(raw: &[&str]) -> Vec<FixableId> {
    raw.iter().map(|id| FixableId::from(*id)).collect()
}

#[test]
fn registration_then_edit_round_trip() {
    let registry = demo_registry();
    let open: FixableBool = registry.bind("Open");
    let size: FixableFloat = registry.bind("Size");
    let open_changes = open.subscribe();

    let device = Device::new(registry, DeviceConfig::default().with_stream_name("Demo"));
    let updates = device.subscribe_updates();
    let listener = serve(&device);

    let config = ControllerConfig::default();
    let interval = config.throttle_interval;
    let controller =
        Controller::connect(listener.local_addr(), config).expect("controller should connect");

    let registration = controller.wait_live(WAIT).expect("session should go live");
    assert_eq!(registration.stream_name, "Demo");
    let order: Vec<&str> = registration
        .fixables
        .iter()
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(order, vec!["Size", "Open"]);
    assert_eq!(
        registration.values,
        BTreeMap::from([
            (FixableId::from("Open"), FixableValue::Bool(false)),
            (FixableId::from("Size"), FixableValue::Float(50.0)),
        ])
    );

    // The controller echoes what it was told before any edit.
    let echoed = updates.recv_timeout(WAIT).expect("echo should be applied");
    assert_eq!(echoed, ids(&["Open", "Size"]));
    assert_eq!(size.value(), 50.0);

    let sent_at = Instant::now();
    controller.set("Open", true).expect("set should succeed");
    let applied = updates.recv_timeout(WAIT).expect("edit should be applied");
    assert_eq!(applied, ids(&["Open"]));
    assert!(sent_at.elapsed() < interval + Duration::from_secs(1));
    assert!(open.value());

    let seen: Vec<bool> = open_changes.try_iter().collect();
    assert_eq!(seen.last(), Some(&true));

    controller.disconnect().expect("disconnect should succeed");
    listener.stop().expect("listener should stop");
}

#[test]
fn second_controller_supersedes_first() {
    let registry = demo_registry();
    let device = Device::new(registry.clone(), DeviceConfig::default());
    let updates = device.subscribe_updates();
    let listener = serve(&device);
    let config = ControllerConfig::default().with_throttle_interval(Duration::ZERO);

    let first = Controller::connect(listener.local_addr(), config.clone())
        .expect("first controller should connect");
    first.wait_live(WAIT).expect("first session should go live");
    updates.recv_timeout(WAIT).expect("first echo should be applied");

    let second = Controller::connect(listener.local_addr(), config)
        .expect("second controller should connect");
    second.wait_live(WAIT).expect("second session should go live");
    updates.recv_timeout(WAIT).expect("second echo should be applied");

    assert!(first.status().wait_for(SessionState::Closed, WAIT));
    let err = first.set("Open", true).unwrap_err();
    assert!(matches!(err, PeerError::NotLive(SessionState::Closed)));

    second.set("Size", 20.0_f32).expect("set should succeed");
    let applied = updates.recv_timeout(WAIT).expect("edit should be applied");
    assert_eq!(applied, ids(&["Size"]));
    assert_eq!(registry.value("Size"), Some(FixableValue::Float(20.0)));
    assert_eq!(registry.value("Open"), Some(FixableValue::Bool(false)));

    listener.stop().expect("listener should stop");
}

#[test]
fn group_children_are_addressed_by_flat_id() {
    let registry = Registry::new();
    registry
        .declare(
            "Look",
            FixableConfig::group(
                "Look",
                [
                    ("Tint", FixableConfig::color("Tint")),
                    ("Rule", FixableConfig::divider("Rule")),
                ],
            ),
        )
        .expect("group should declare");
    let tint: FixableColor = registry.bind("Tint");

    let device = Device::new(registry, DeviceConfig::default());
    let updates = device.subscribe_updates();
    let listener = serve(&device);
    let controller = Controller::connect(listener.local_addr(), ControllerConfig::default())
        .expect("controller should connect");

    let registration = controller.wait_live(WAIT).expect("session should go live");
    assert_eq!(registration.fixables.len(), 1);
    assert_eq!(registration.fixables[0].1.children().len(), 2);
    assert_eq!(
        registration.values.get("Tint"),
        Some(&FixableValue::Color(Color::MAGENTA))
    );
    updates.recv_timeout(WAIT).expect("echo should be applied");

    let green = Color::rgb(0.0, 1.0, 0.0);
    controller.set("Tint", green).expect("set should succeed");
    controller.flush_now().expect("flush should succeed");
    assert_eq!(
        updates.recv_timeout(WAIT).expect("edit should be applied"),
        ids(&["Tint"])
    );
    assert_eq!(tint.value(), green);

    assert!(matches!(
        controller.set("Rule", true),
        Err(PeerError::KindMismatch { expected: None, .. })
    ));
    listener.stop().expect("listener should stop");
}

#[test]
fn device_hang_up_ends_controller_session() {
    let device = Device::new(demo_registry(), DeviceConfig::default());
    let listener = serve(&device);
    let controller = Controller::connect(listener.local_addr(), ControllerConfig::default())
        .expect("controller should connect");
    let events = controller.subscribe_events();
    controller.wait_live(WAIT).expect("session should go live");

    device.hang_up().expect("hang up should succeed");

    let ended = events
        .iter()
        .find(|event| *event == ControllerEvent::SessionEnded);
    assert_eq!(ended, Some(ControllerEvent::SessionEnded));
    assert_eq!(controller.state(), SessionState::Closed);
    listener.stop().expect("listener should stop");
}

#[test]
fn first_edit_survives_an_immediate_disconnect() {
    let mut lost = 0;
    for _ in 0..200 {
        let registry = demo_registry();
        let device = Device::new(registry.clone(), DeviceConfig::default());
        let (device_end, controller_end) = FixaStream::pair().expect("pair should open");
        let session = device.attach(device_end).expect("device should attach");
        let controller = Controller::attach(
            controller_end,
            ControllerConfig::default().with_throttle_interval(Duration::ZERO),
        )
        .expect("controller should attach");

        controller.wait_live(WAIT).expect("session should go live");
        controller.set("Open", true).expect("set should succeed");
        controller.disconnect().expect("disconnect should succeed");

        assert!(session.status().wait_for(SessionState::Closed, WAIT));
        if registry.value("Open") != Some(FixableValue::Bool(true)) {
            lost += 1;
        }
    }
    assert_eq!(lost, 0);
}
