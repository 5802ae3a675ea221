pub mod generation;
pub mod metrics;
pub mod providers;
pub mod storage;

pub use generation::{CharacterGenerator, ExpressionImage};
pub use metrics::{get_metrics, init_metrics};
pub use storage::{ImageStore, StoredImage};
