mod hierarchy_configuration;

pub use hierarchy_configuration::*;
