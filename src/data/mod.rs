pub mod cache;
pub mod correlate;
pub mod model;
pub mod refgeo;
pub mod region;
pub mod signals;
pub mod stats;
pub mod timeshift;
pub mod transform;
