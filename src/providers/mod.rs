mod buildkite;
mod local;

pub use buildkite::{BuildkiteClient, BuildkiteProvider};
pub use local::LocalProvider;
