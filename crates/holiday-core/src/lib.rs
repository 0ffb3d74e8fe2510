pub mod api;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod grid;
pub mod model;
pub mod prefs;
pub mod render;
pub mod search;
pub mod service;
pub mod state;
pub mod store;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::api::HttpHolidayApi;
use crate::clock::{
  Clock,
  SystemClock
};
use crate::controller::{
  CalendarController,
  ControllerSettings
};
use crate::service::{
  CacheTtls,
  HolidayService
};
use crate::store::{
  FileStore,
  KeyValueStore
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting holidays CLI"
  );

  let mut cfg = config::HolidayConfig::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .iter()
      .map(|kv| {
        (kv.key.clone(), kv.value.clone())
      })
  )?;
  debug!(?cfg, "effective config");

  let command = commands::Command::parse(
    &cli.command_tokens()
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store: Arc<dyn KeyValueStore> =
    Arc::new(
      FileStore::open(&data_dir)
        .with_context(|| {
          format!(
            "failed to open cache store \
             at {}",
            data_dir.display()
          )
        })?
    );
  let clock: Arc<dyn Clock> = Arc::new(
    SystemClock::new(cfg.timezone())
  );

  let api = HttpHolidayApi::new(
    &cfg.api_base_url,
    cfg.request_timeout()
  )?;
  let service = HolidayService::new(
    api,
    store.clone(),
    clock.clone(),
    CacheTtls::from_config(&cfg)
  );
  let settings =
    ControllerSettings::from_config(
      &cfg,
      clock.today()
    );
  let controller = CalendarController::new(
    service, store, clock, settings
  );
  let renderer =
    render::Renderer::new(!cli.no_color);

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(commands::dispatch(
    &controller,
    &renderer,
    command
  ))?;

  info!("done");
  Ok(())
}
