use bytes::BytesMut;
use clap::Parser;
use std::collections::HashSet;
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use dns_resolver::records::RecordSet;
use dns_resolver::{resolve, ResolutionError};
use dns_wire::types::{Message, Rcode, UDP_MAX_LEN};

mod settings;

use crate::settings::Settings;

const DNS_PORT: u16 = 2053;

async fn handle_raw_message(args: ListenArgs, buf: &[u8]) -> Option<Message> {
    let res = Message::from_octets(buf);
    tracing::debug!(message = ?res, "got message");

    match res {
        Ok(msg) => match resolve(args.upstream, &args.records, &msg).await {
            Ok(response) => Some(response),
            Err(error @ ResolutionError::UnsupportedType { .. }) => {
                tracing::debug!(%error, "replying not-implemented");
                let mut response = msg.make_response();
                response.header.rcode = Rcode::NotImplemented;
                Some(response)
            }
            Err(error) => {
                tracing::warn!(%error, "could not resolve message");
                None
            }
        },
        // a datagram we cannot parse gets no reply at all: the
        // client's retry timer is the error signal
        Err(error) => {
            tracing::debug!(%error, "could not parse message");
            None
        }
    }
}

async fn listen_udp_task(args: ListenArgs, socket: UdpSocket) {
    let (tx, mut rx) = mpsc::channel(32);
    let mut buf = vec![0u8; UDP_MAX_LEN];

    loop {
        tokio::select! {
            Ok((size, peer)) = socket.recv_from(&mut buf) => {
                tracing::debug!(?peer, "UDP request");
                let bytes = BytesMut::from(&buf[..size]);
                let reply = tx.clone();
                let args = args.clone();
                tokio::spawn(async move {
                    if let Some(response_message) = handle_raw_message(args, bytes.as_ref()).await {
                        match reply.send((response_message, peer)).await {
                            Ok(()) => (),
                            Err(error) => tracing::debug!(?peer, %error, "reply channel error"),
                        }
                    }
                });
            }

            Some((message, peer)) = rx.recv() => {
                match message.into_octets() {
                    Ok(serialised) => {
                        if let Err(error) = socket.send_to(&serialised, peer).await {
                            tracing::debug!(?peer, %error, "UDP send error");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(?peer, %error, "could not serialise message");
                    }
                }
            }
        }
    }
}

/// Arguments for `listen_udp_task` and the resolvers.
#[derive(Debug, Clone)]
struct ListenArgs {
    upstream: Option<SocketAddr>,
    records: Arc<RecordSet>,
}

fn begin_logging() {
    let log_format = if let Ok(var) = env::var("RUST_LOG_FORMAT") {
        var.split(',').map(str::to_string).collect()
    } else {
        HashSet::new()
    };

    let logger = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(!log_format.contains("no-ansi"));

    if log_format.contains("json") {
        logger.json().init();
    } else if log_format.contains("compact") {
        logger.compact().init();
    } else {
        logger.init();
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Clone, Parser)]
/// A small DNS server which answers A-record queries from a JSON
/// record file, or forwards queries question-by-question to an
/// upstream resolver and merges the answers.
///
/// It listens on 127.0.0.1:2053, UDP only.
struct Args {
    /// Upstream resolver to forward queries to, e.g. "8.8.8.8:53";
    /// without it, queries are answered from the configured records
    #[clap(short, long, value_parser)]
    resolver: Option<SocketAddr>,

    /// Path to a JSON file of records to serve
    #[clap(short, long, value_parser)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    let settings = match &args.config {
        Some(path) => match Settings::new(path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::error!(?path, %error, "could not load configuration");
                process::exit(1);
            }
        },
        None => Settings::default(),
    };

    let records = match settings.into_record_set() {
        Ok(records) => records,
        Err(error) => {
            tracing::error!(%error, "could not load configuration");
            process::exit(1);
        }
    };

    match args.resolver {
        Some(upstream) => tracing::info!(%upstream, "forwarding to upstream resolver"),
        None => tracing::info!(records = %records.len(), "serving local records"),
    }

    tracing::info!(interface = %Ipv4Addr::LOCALHOST, port = %DNS_PORT, "binding DNS UDP socket");
    let udp = match UdpSocket::bind((Ipv4Addr::LOCALHOST, DNS_PORT)).await {
        Ok(s) => s,
        Err(error) => {
            tracing::error!(%error, "could not bind DNS UDP socket");
            process::exit(1);
        }
    };

    let listen_args = ListenArgs {
        upstream: args.resolver,
        records: Arc::new(records),
    };

    listen_udp_task(listen_args, udp).await;
}
