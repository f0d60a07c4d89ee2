mod aggregator;
mod classifier;
mod shapes;
mod types;

pub use aggregator::{FamilyTables, MetricAggregator, MetricTable};
pub use classifier::{default_family_rules, FamilyRule, JobClassifier, JobIdMode};
pub use shapes::ShapeChain;
pub use types::{JobFamily, MetricCategory};
