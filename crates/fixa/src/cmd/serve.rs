use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use fixa_peer::{Device, DeviceConfig, ServiceRecord};
use fixa_registry::Registry;
use fixa_transport::TcpTransport;
use fixa_wire::decode_manifest;
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{
    io_error, peer_error, registry_error, transport_error, wire_error, CliError, CliResult,
    INTERNAL, SUCCESS,
};
use crate::output::{print_listening, print_value, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = load_manifest(&args)?;
    let device = Device::new(
        registry.clone(),
        DeviceConfig::default().with_stream_name(args.stream_name.clone()),
    );

    let listener = TcpTransport::bind(args.addr).map_err(|err| transport_error("bind failed", err))?;
    let record = ServiceRecord::new(
        args.device_name.clone(),
        args.stream_name.clone(),
        listener.local_addr(),
    );
    let updates = device.subscribe_updates();
    let handle = device
        .spawn_listener(listener)
        .map_err(|err| peer_error("listen failed", err))?;
    print_listening(&record, format);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    'serve: while running.load(Ordering::SeqCst) {
        let applied = match updates.recv_timeout(POLL_INTERVAL) {
            Ok(applied) => applied,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        for id in applied {
            if let Some(value) = registry.value(id.as_str()) {
                print_value("applied", &id, &value, format);
                printed = printed.saturating_add(1);
            }
            if args.count.is_some_and(|count| printed >= count) {
                break 'serve;
            }
        }
    }

    info!("shutting down");
    if let Err(err) = device.hang_up() {
        info!(%err, "hang up failed");
    }
    handle
        .stop()
        .map_err(|err| peer_error("listener failed", err))?;
    Ok(SUCCESS)
}

fn load_manifest(args: &ServeArgs) -> CliResult<Registry> {
    let bytes = fs::read(&args.manifest).map_err(|err| {
        io_error(
            &format!("failed reading {}", args.manifest.display()),
            err,
        )
    })?;
    let setups = decode_manifest(&bytes).map_err(|err| wire_error("invalid manifest", err))?;
    let registry = Registry::new();
    registry
        .declare_all(setups)
        .map_err(|err| registry_error("invalid manifest", err))?;
    info!(
        manifest = %args.manifest.display(),
        fixables = registry.len(),
        "manifest loaded"
    );
    Ok(registry)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
