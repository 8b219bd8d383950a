//! End-to-end remote-file sessions over loopback TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use filewire_envelope::{ByteOrder, EnvelopeConfig};
use filewire_files::wire::{self, ArgReader, ArgWriter};
use filewire_files::{
    file_router, ContentInfo, FileError, FilePicker, LocalFileBridge, NoPicker, CLOSE, OFFSET,
    OPEN_READ_ONLY, OPEN_WRITE_ONLY, READ, SELECT_FILE, SET_POS, WRITE,
};
use filewire_rpc::{Resolver, RpcClient, RpcService, ServiceConfig, Token};

const ORDER: ByteOrder = ByteOrder::Big;

fn start_file_service<P: FilePicker + 'static>(picker: P) -> SocketAddr {
    let bridge = Arc::new(Mutex::new(LocalFileBridge::new()));
    let router = file_router(bridge, Arc::new(picker));
    let config = ServiceConfig {
        port: 0,
        ..ServiceConfig::default()
    };
    let mut service = RpcService::bind_with_router(config, router).expect("service should bind");
    let addr = service.local_addr();
    std::thread::spawn(move || loop {
        if service.accept_next().is_err() {
            break;
        }
    });
    addr
}

fn connect(addr: SocketAddr) -> RpcClient {
    let config = EnvelopeConfig {
        read_timeout: Some(Duration::from_secs(5)),
        ..EnvelopeConfig::default()
    };
    RpcClient::connect(addr, config).expect("client should connect")
}

fn call_ok(client: &mut RpcClient, method: u8, args: &[u8]) -> Vec<u8> {
    let response = client.call(method, args).expect("call should succeed");
    wire::decode_status(response.arguments(), ORDER)
        .expect("result should be ok")
        .to_vec()
}

fn call_err(client: &mut RpcClient, method: u8, args: &[u8]) -> FileError {
    let response = client.call(method, args).expect("call should succeed");
    wire::decode_status(response.arguments(), ORDER)
        .expect_err("result should be an error")
}

fn path_args(path: &str) -> Vec<u8> {
    let mut writer = ArgWriter::new(ORDER);
    writer.str_u16(path);
    writer.into_vec()
}

fn handle_args(handle: u32) -> Vec<u8> {
    let mut writer = ArgWriter::new(ORDER);
    writer.u32(handle);
    writer.into_vec()
}

fn make_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "filewire-session-{}-{}-{}",
        tag,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

struct TestPicker {
    info: ContentInfo,
}

impl FilePicker for TestPicker {
    fn begin_selection(&self, token: Token, resolver: Resolver) {
        let payload = wire::encode_content_info(&self.info, ORDER);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            resolver.resolve(token, payload);
        });
    }
}

#[test]
fn read_session_over_tcp() {
    let dir = make_temp_dir("read");
    let path = dir.join("data.txt");
    std::fs::write(&path, b"hello remote file").expect("seed file should write");

    let addr = start_file_service(NoPicker);
    let mut client = connect(addr);

    let body = call_ok(
        &mut client,
        OPEN_READ_ONLY,
        &path_args(path.to_str().expect("path should be utf-8")),
    );
    let handle = ArgReader::new(&body, ORDER).u32().expect("handle should decode");
    assert_eq!(handle, 3);

    assert_eq!(
        call_ok(&mut client, READ, &{
            let mut writer = ArgWriter::new(ORDER);
            writer.u32(handle).u32(5);
            writer.into_vec()
        }),
        b"hello"
    );

    let body = call_ok(&mut client, OFFSET, &handle_args(handle));
    assert_eq!(ArgReader::new(&body, ORDER).u64().expect("offset should decode"), 5);

    call_ok(&mut client, SET_POS, &{
        let mut writer = ArgWriter::new(ORDER);
        writer.u32(handle).u64(6);
        writer.into_vec()
    });
    assert_eq!(
        call_ok(&mut client, READ, &{
            let mut writer = ArgWriter::new(ORDER);
            writer.u32(handle).u32(64);
            writer.into_vec()
        }),
        b"remote file"
    );

    call_ok(&mut client, CLOSE, &handle_args(handle));

    // The handle is gone after close.
    let err = call_err(&mut client, READ, &{
        let mut writer = ArgWriter::new(ORDER);
        writer.u32(handle).u32(1);
        writer.into_vec()
    });
    assert!(matches!(err, FileError::Remote(message) if message.contains("invalid file handle")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn write_session_over_tcp() {
    let dir = make_temp_dir("write");
    let path = dir.join("out.txt");

    let addr = start_file_service(NoPicker);
    let mut client = connect(addr);

    let body = call_ok(&mut client, OPEN_WRITE_ONLY, &{
        let mut writer = ArgWriter::new(ORDER);
        writer
            .str_u16(path.to_str().expect("path should be utf-8"))
            .u8(1);
        writer.into_vec()
    });
    let handle = ArgReader::new(&body, ORDER).u32().expect("handle should decode");

    let body = call_ok(&mut client, WRITE, &{
        let mut writer = ArgWriter::new(ORDER);
        writer.u32(handle).bytes(b"written remotely");
        writer.into_vec()
    });
    assert_eq!(ArgReader::new(&body, ORDER).u64().expect("count should decode"), 16);

    call_ok(&mut client, CLOSE, &handle_args(handle));

    assert_eq!(std::fs::read(&path).expect("file should exist"), b"written remotely");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn select_file_resolved_by_picker() {
    let info = ContentInfo {
        uri: "content://downloads/document/1000000008".to_string(),
        display_name: "report.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size: 123_456,
    };
    let addr = start_file_service(TestPicker { info: info.clone() });
    let mut client = connect(addr);

    let response = client.call(SELECT_FILE, &[]).expect("call should succeed");
    assert_eq!(response.method(), SELECT_FILE);

    let selected = wire::decode_content_info(response.arguments(), ORDER)
        .expect("content info should decode");
    assert_eq!(selected, info);
}

#[test]
fn select_file_without_picker_is_rejected() {
    let addr = start_file_service(NoPicker);
    let mut client = connect(addr);

    let err = call_err(&mut client, SELECT_FILE, &[]);
    assert!(matches!(err, FileError::Remote(message) if message.contains("no file picker")));
}

#[test]
fn malformed_arguments_answer_error_without_closing() {
    let dir = make_temp_dir("malformed");
    let path = dir.join("ok.txt");
    std::fs::write(&path, b"fine").expect("seed file should write");

    let addr = start_file_service(NoPicker);
    let mut client = connect(addr);

    // Empty arguments are short of the u16 path length.
    let err = call_err(&mut client, OPEN_READ_ONLY, &[]);
    assert!(matches!(err, FileError::Remote(message) if message.contains("truncated")));

    // The connection survives the rejected call.
    let body = call_ok(
        &mut client,
        OPEN_READ_ONLY,
        &path_args(path.to_str().expect("path should be utf-8")),
    );
    assert_eq!(ArgReader::new(&body, ORDER).u32().expect("handle should decode"), 3);

    let _ = std::fs::remove_dir_all(&dir);
}
