use crate::scheduler::Scheduler;
use tokio_util::sync::CancellationToken;

pub async fn cmd_monitor(scheduler: &Scheduler, cancel: CancellationToken) -> anyhow::Result<()> {
    println!("Monitoring for new media and expiring links. Press Ctrl-C to stop.");
    scheduler.run_monitor(cancel).await
}
