pub mod assets;
pub use assets::{AssetError, AssetWriter, FileAssetWriter};

pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

pub mod monitor;
pub use monitor::Monitor;

pub mod refresh;
pub use refresh::{RefreshError, RefreshOptions, RefreshWorker};

pub mod resolver;
pub use resolver::TrailerService;
