pub mod postgres;
pub mod runtime;

use uuid::Uuid;

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}
