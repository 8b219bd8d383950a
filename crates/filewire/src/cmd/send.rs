use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};

use filewire_envelope::EnvelopeConfig;
use filewire_rpc::RpcClient;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{rpc_error, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let addr = resolve_addr(&args.addr)?;

    let config = EnvelopeConfig {
        byte_order: args.byte_order.as_order(),
        read_timeout: Some(wait_timeout),
        ..EnvelopeConfig::default()
    };
    let mut client =
        RpcClient::connect(addr, config).map_err(|err| rpc_error("connect failed", err))?;

    let arguments = resolve_arguments(&args)?;

    if args.notify {
        client
            .notify(args.method, &arguments)
            .map_err(|err| rpc_error("send failed", err))?;
        return Ok(SUCCESS);
    }

    if args.wait {
        let response = client
            .call(args.method, &arguments)
            .map_err(|err| rpc_error("call failed", err))?;
        print_message(&response, format);
    } else {
        client
            .request(args.method, &arguments)
            .map_err(|err| rpc_error("send failed", err))?;
    }

    Ok(SUCCESS)
}

fn resolve_addr(input: &str) -> CliResult<SocketAddr> {
    input
        .to_socket_addrs()
        .map_err(|err| {
            crate::exit::CliError::new(USAGE, format!("invalid address {input:?}: {err}"))
        })?
        .next()
        .ok_or_else(|| {
            crate::exit::CliError::new(USAGE, format!("address {input:?} did not resolve"))
        })
}

fn resolve_arguments(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
