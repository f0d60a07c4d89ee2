mod artifacts;
mod builds;
mod core;

pub use self::core::BuildkiteClient;
