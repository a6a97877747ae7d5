use crate::scheduler::Scheduler;
use tokio_util::sync::CancellationToken;

pub async fn cmd_schedule(scheduler: &Scheduler, cancel: CancellationToken) -> anyhow::Result<()> {
    let days = scheduler.context().config.scheduler.schedule_days;
    println!("Running every {days} day(s). Press Ctrl-C to stop.");
    scheduler.run_scheduled(cancel).await
}
