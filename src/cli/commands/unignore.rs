use crate::cache::{IgnoreList, JsonFileBackend};
use crate::config::Config;
use crate::domain::TitleId;
use std::sync::Arc;

pub async fn cmd_unignore(config: &Config, title_id: &str) -> anyhow::Result<()> {
    let title_id = TitleId::new(title_id.trim());
    let ignored = IgnoreList::load(Arc::new(JsonFileBackend::new(config.ignored_path()))).await;

    if ignored.remove(&title_id).await {
        println!("✓ Removed {title_id} from the ignore list.");
    } else {
        println!("{title_id} is not on the ignore list.");
    }
    Ok(())
}
