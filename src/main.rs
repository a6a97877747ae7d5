use anyhow::Context;
use trailerfin::{Config, run};

fn main() -> anyhow::Result<()> {
    // Runtime sizing comes from the file/env config; CLI flags are applied inside `run`.
    let worker_threads = Config::load()?.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("trailerfin-worker");
    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    builder
        .build()
        .context("Failed to start tokio runtime")?
        .block_on(run())
}
