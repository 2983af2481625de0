// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use manipulation::service_types::{DEFAULT_CONTEXT, DEFAULT_PORT};
use manipulation::{ManipulationResult, Server, ServerConfig};

/// Serves the robot, problem and graph objects of a manipulation planning session.
///
/// The log level is read from RUST_LOG and defaults to info.
#[derive(Parser, Debug)]
#[clap(author, version, name = "manipulation-server")]
struct CommandLineArguments {
    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1")]
    pub address: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Naming context the objects are registered in
    #[clap(short, long, default_value_t = DEFAULT_CONTEXT.to_string())]
    pub context: String,
    /// Log in JSON instead of plain text
    #[clap(long, action)]
    pub log_json: bool,
}

fn main() -> ManipulationResult<()> {
    let args = CommandLineArguments::parse();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
    let config = ServerConfig {
        address: args.address,
        port: args.port,
        context: args.context,
    };
    Server::bind(&config)?.run()
}
