//! Minimal subscriber: accepts the master/standby pushes and logs them.
//!
//! Register it with
//! `curl -X PUT 'http://<agent>:8080/CMRestAPI/RecvAddr?url=http://<this-host>:8081/CMRestAPI'`.

use anyhow::Result;
use clap::{Parser, builder::TypedValueParser};
use cm_restapi::{
    admin::http::{HttpResponse, read_http_request, write_response},
    cli::args::LogLevel,
    notify::{MASTER_INFO_PATH, STANDBY_INFO_PATH},
    util,
};
use log::{error, info};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Demo receiver of primary change pushes", long_about = None)]
struct DemoArgs {
    #[arg(long, short = 'B', value_name = "BIND_ADDR", default_value = "0.0.0.0:8081")]
    bind: String,

    #[arg(
        long,
        short = 'L',
        default_value_t = LogLevel::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["trace", "debug", "info", "warn", "error", "off"])
            .map(|s| s.parse::<LogLevel>().unwrap()),
    )]
    log: LogLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DemoArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.log.into())
        .init();

    let listener = TcpListener::bind(util::parse_bind_addr(&args.bind)?).await?;
    info!("Receiving pushes on http://{}", listener.local_addr()?);

    loop {
        let (mut stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            let response = match read_http_request(&mut stream).await {
                Ok(request) => receive(&request.method, &request.target, &request.body),
                Err(e) => {
                    error!("Bad request from {}: {}", peer, e);
                    return;
                }
            };
            if let Err(e) = write_response(&mut stream, &response).await {
                error!("Failed to answer {}: {}", peer, e);
            }
        });
    }
}

fn receive(method: &str, target: &str, body: &[u8]) -> HttpResponse {
    if method != "PUT" {
        return HttpResponse::text(405, "Method Not Allowed");
    }
    let info = String::from_utf8_lossy(body);
    let info = info.trim();
    let path = target.split('?').next().unwrap_or(target);

    let kind = if path.ends_with(&format!("/{MASTER_INFO_PATH}")) {
        "master"
    } else if path.ends_with(&format!("/{STANDBY_INFO_PATH}")) {
        "standby"
    } else {
        return HttpResponse::text(404, "Not Found");
    };

    if info.is_empty() {
        return HttpResponse::text(200, format!("Received {kind} info is empty."));
    }
    info!("Received {} info: {}", kind, info);
    HttpResponse::text(200, format!("Received {kind} info successfully."))
}
