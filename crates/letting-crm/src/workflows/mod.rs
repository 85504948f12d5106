pub mod enquiries;
pub mod lettings;
