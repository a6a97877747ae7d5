use crate::scheduler::{ScanReport, Scheduler};
use tokio_util::sync::CancellationToken;

pub async fn cmd_scan(scheduler: &Scheduler, cancel: &CancellationToken) -> anyhow::Result<()> {
    let report = tokio::select! {
        () = cancel.cancelled() => {
            println!("Scan interrupted");
            return Ok(());
        }
        report = scheduler.run_scan() => report?,
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!();
    println!("{:-<70}", "");
    println!("Scan complete!");
    println!("  Candidates:     {}", report.candidates);
    println!("  Refreshed:      {}", report.persisted);
    println!("  Still valid:    {}", report.valid_cached);
    println!("  Newly ignored:  {}", report.marked_ignored);
    println!("  Skipped:        {}", report.ignored_skip);
    println!("  Failed:         {}", report.failed);
}
