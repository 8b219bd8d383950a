use std::sync::{Arc, Mutex};

use filewire_rpc::{RequestContext, Router, RpcError};
use tracing::warn;

use crate::bridge::FileBridge;
use crate::error::FileError;
use crate::picker::FilePicker;
use crate::wire::{self, ArgReader};

// Method codes, shared with every peer implementation of this protocol.
pub const SELECT_FILE: u8 = 0x01;
pub const OPEN_READ_ONLY: u8 = 0x02;
pub const OPEN_WRITE_ONLY: u8 = 0x03;
pub const CLOSE: u8 = 0x04;
pub const OFFSET: u8 = 0x05;
pub const SET_POS: u8 = 0x06;
pub const READ: u8 = 0x07;
pub const WRITE: u8 = 0x08;

/// Build the remote-file router.
///
/// Every method except `SELECT_FILE` answers synchronously from the bridge.
/// `SELECT_FILE` registers a pending entry and hands it to the picker; the
/// response is produced whenever the selection completes. Bridge failures
/// come back as error results, never as connection teardown.
pub fn file_router<B, P>(bridge: Arc<Mutex<B>>, picker: Arc<P>) -> Router
where
    B: FileBridge + Send + 'static,
    P: FilePicker + 'static,
{
    let mut router = Router::new();

    router.on_request(SELECT_FILE, move |ctx, rid, _args| {
        if !picker.available() {
            warn!(rid, "file selection requested but no picker attached");
            let body = wire::err_message(
                &FileError::PickerUnavailable.to_string(),
                ctx.byte_order(),
            );
            return ctx.reply(rid, &body);
        }
        match ctx.defer(rid) {
            Ok(token) => {
                picker.begin_selection(token, ctx.resolver());
                Ok(())
            }
            Err(RpcError::AlreadyPending(_)) => {
                let body = wire::err_message("selection already pending", ctx.byte_order());
                ctx.reply(rid, &body)
            }
            Err(err) => Err(err),
        }
    });

    let b = Arc::clone(&bridge);
    router.on_request(OPEN_READ_ONLY, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let mut args = ArgReader::new(args, order);
            let path = args.str_u16()?;
            lock(&b).open_read_only(path)
        })();
        respond(ctx, rid, outcome.map(|handle| wire::ok_handle(handle, order)))
    });

    let b = Arc::clone(&bridge);
    router.on_request(OPEN_WRITE_ONLY, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let mut args = ArgReader::new(args, order);
            let path = args.str_u16()?;
            let truncate = args.u8()? != 0;
            lock(&b).open_write_only(path, truncate)
        })();
        respond(ctx, rid, outcome.map(|handle| wire::ok_handle(handle, order)))
    });

    let b = Arc::clone(&bridge);
    router.on_request(CLOSE, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let handle = ArgReader::new(args, order).u32()?;
            lock(&b).close(handle)
        })();
        respond(ctx, rid, outcome.map(|()| wire::ok_empty()))
    });

    let b = Arc::clone(&bridge);
    router.on_request(OFFSET, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let handle = ArgReader::new(args, order).u32()?;
            lock(&b).offset(handle)
        })();
        respond(ctx, rid, outcome.map(|offset| wire::ok_u64(offset, order)))
    });

    let b = Arc::clone(&bridge);
    router.on_request(SET_POS, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let mut args = ArgReader::new(args, order);
            let handle = args.u32()?;
            let offset = args.u64()?;
            lock(&b).set_pos(handle, offset)
        })();
        respond(ctx, rid, outcome.map(|()| wire::ok_empty()))
    });

    let b = Arc::clone(&bridge);
    router.on_request(READ, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let mut args = ArgReader::new(args, order);
            let handle = args.u32()?;
            let len = args.u32()? as usize;
            lock(&b).read(handle, len)
        })();
        respond(ctx, rid, outcome.map(|data| wire::ok_bytes(&data)))
    });

    let b = Arc::clone(&bridge);
    router.on_request(WRITE, move |ctx, rid, args| {
        let order = ctx.byte_order();
        let outcome = (|| {
            let mut args = ArgReader::new(args, order);
            let handle = args.u32()?;
            let data = args.rest();
            lock(&b).write(handle, data)
        })();
        respond(ctx, rid, outcome.map(|count| wire::ok_u64(count, order)))
    });

    router
}

fn lock<B: FileBridge>(bridge: &Arc<Mutex<B>>) -> std::sync::MutexGuard<'_, B> {
    bridge.lock().expect("file bridge lock poisoned")
}

fn respond(
    ctx: &mut RequestContext<'_>,
    rid: u32,
    outcome: Result<Vec<u8>, FileError>,
) -> filewire_rpc::Result<()> {
    match outcome {
        Ok(body) => ctx.reply(rid, &body),
        Err(err) => {
            warn!(rid, method = ctx.method(), error = %err, "file request failed");
            let body = wire::err_message(&err.to_string(), ctx.byte_order());
            ctx.reply(rid, &body)
        }
    }
}
