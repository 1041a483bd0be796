pub mod chunking;
pub mod index;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
