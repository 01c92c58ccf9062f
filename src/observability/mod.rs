pub(crate) mod tracing;

pub use self::tracing::{LogFormat, init};
