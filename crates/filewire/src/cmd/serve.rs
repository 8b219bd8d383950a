use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use filewire_envelope::ChecksumMode;
use filewire_files::{file_router, LocalFileBridge, NoPicker};
use filewire_rpc::{RouterCatalog, RpcService, ServiceConfig};
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let pending_timeout = args
        .pending_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let config = ServiceConfig {
        bind_addr: args.bind,
        port: args.port,
        byte_order: args.byte_order.as_order(),
        checksum: if args.crc16 {
            ChecksumMode::Crc16
        } else {
            ChecksumMode::Reserved
        },
        pending_timeout,
        router: args.router,
        ..ServiceConfig::default()
    };

    let catalog = build_catalog();
    let mut service =
        RpcService::bind(config, &catalog).map_err(|err| rpc_error("bind failed", err))?;
    info!(addr = %service.local_addr(), "service ready");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        if let Err(err) = service.accept_next() {
            return Err(rpc_error("accept failed", err));
        }
    }

    Ok(SUCCESS)
}

/// Routers available to `--router`.
///
/// Unattended serving has no selection UI, so the file router runs with
/// [`NoPicker`]; hosts embedding the service attach their own picker.
fn build_catalog() -> RouterCatalog {
    let mut catalog = RouterCatalog::new();
    catalog.register("file", || {
        file_router(
            Arc::new(Mutex::new(LocalFileBridge::new())),
            Arc::new(NoPicker),
        )
    });
    catalog
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
