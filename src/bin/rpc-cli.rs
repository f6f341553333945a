use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use thrift_http::client::{ClientError, RpcClient};
use thrift_http::protocol::ProtocolKind;
use thrift_http::services::{HelloClient, SleepClient};

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Invoke the demo Thrift services over HTTP", long_about = None)]
struct Cli {
    /// Base URL of the server, without the service path
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[arg(short, long, value_enum, default_value_t = Protocol::Binary)]
    protocol: Protocol,

    /// Accept self-signed certificates
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Protocol {
    Binary,
    Compact,
}

impl From<Protocol> for ProtocolKind {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Binary => ProtocolKind::Binary,
            Protocol::Compact => ProtocolKind::Compact,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Call HelloService.hello
    Hello {
        name: String,
        /// Service path
        #[arg(long, default_value = "/hello")]
        path: String,
    },
    /// Call SleepService.sleep
    Sleep {
        milliseconds: i64,
        #[arg(long, default_value = "/sleep")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()?;
    let rpc = |path: &str| {
        RpcClient::with_client(http.clone(), format!("{}{}", cli.url, path))
            .protocol(cli.protocol.into())
    };

    let result = match &cli.command {
        Commands::Hello { name, path } => HelloClient::new(rpc(path))
            .hello(name)
            .await
            .map(|greeting| json!({ "success": greeting })),
        Commands::Sleep { milliseconds, path } => SleepClient::new(rpc(path))
            .sleep(*milliseconds)
            .await
            .map(|slept| json!({ "success": slept })),
    };

    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(ClientError::Application(e)) => {
            let value = json!({ "exception": { "type": e.kind.as_str(), "message": e.message } });
            println!("{}", serde_json::to_string_pretty(&value)?);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
    Ok(())
}
