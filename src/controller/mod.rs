pub mod error;
pub mod forest_sync;

pub use error::{Error, Result};
pub use forest_sync::{
    Relist, apply_hierarchy_event, apply_namespace_event, apply_object_event, default_type_syncers,
    manager_of, run_hierarchy_mirror, run_namespace_mirror, run_object_mirror,
};
