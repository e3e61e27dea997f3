//! Construction of the [`NodeKeeper`](crate::NodeKeeper) facade.

mod builder;

pub use builder::NodeKeeperBuilder;
