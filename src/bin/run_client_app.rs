/*
 * ‌
 * Fedlink Rust SDK
 * ​
 * Copyright (C) 2023 - 2026 Fedlink Labs
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fedlink::{
    start_client,
    AppError,
    AppRegistry,
    ClientConfig,
    Context,
    Error,
    Message,
    ShutdownSignal,
    TransportType,
};

/// Run a registered client app against a Fedlink broker.
#[derive(Parser)]
#[command(name = "run-client-app", version)]
struct Args {
    /// App reference in `module:attribute` form.
    client_app: String,

    /// Disable TLS. Mutually exclusive with `--root-certificates`.
    #[arg(long)]
    insecure: bool,

    /// Use the REST transport instead of gRPC request/response.
    #[arg(long)]
    rest: bool,

    /// PEM bundle for TLS peer verification.
    #[arg(long, value_name = "PATH")]
    root_certificates: Option<PathBuf>,

    /// Broker address.
    #[arg(long, value_name = "HOST:PORT", default_value = "0.0.0.0:9092")]
    server: String,

    /// Give up reconnecting after this many attempts; unbounded by default.
    #[arg(long, value_name = "N")]
    max_retries: Option<usize>,

    /// Give up reconnecting after this many seconds; unbounded by default.
    #[arg(long, value_name = "S")]
    max_wait_time: Option<f64>,

    /// Resolution root for the app reference.
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,
}

/// Apps available to this binary. Native apps register here at link time;
/// there is no dynamic loading.
fn builtin_apps() -> AppRegistry {
    let mut registry = AppRegistry::new();
    registry.register("fedlink.demo:echo", Arc::new(echo));
    registry
}

/// Demo app: mirror every payload straight back to the broker.
fn echo(message: &Message, _context: &mut Context) -> Result<Message, AppError> {
    Ok(message.reply(message.payload.clone()))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(dir) = &args.dir {
        if let Err(error) = std::env::set_current_dir(dir) {
            log::error!("cannot change into `{}`: {error}", dir.display());
            return ExitCode::from(1);
        }
    }

    let registry = builtin_apps();

    let Some(app) = registry.resolve(&args.client_app) else {
        log::error!("no client app is registered under `{}`", args.client_app);
        return ExitCode::from(1);
    };

    let root_certificates = match &args.root_certificates {
        Some(path) => match std::fs::read(path) {
            Ok(pem) => Some(pem),
            Err(error) => {
                log::error!("cannot read root certificates from `{}`: {error}", path.display());
                return ExitCode::from(1);
            }
        },
        None => None,
    };

    let mut config = ClientConfig::new(args.server);
    config.transport = if args.rest { TransportType::Rest } else { TransportType::GrpcRere };
    config.insecure = args.insecure.then_some(true);
    config.root_certificates = root_certificates;
    config.max_retries = args.max_retries;
    config.max_wait_time = args.max_wait_time.map(Duration::from_secs_f64);

    let signal = ShutdownSignal::new();
    let shutdown = signal.subscribe();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received interrupt; shutting down");
            signal.trigger();
        }
    });

    match start_client(config, app, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error @ Error::Config(_)) => {
            log::error!("{error}");
            ExitCode::from(1)
        }
        Err(error @ Error::App(_)) => {
            log::error!("{error}");
            ExitCode::from(2)
        }
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
