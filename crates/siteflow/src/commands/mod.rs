pub mod forget;
pub mod list;
pub mod plan;
pub mod status;
