/// UI module exports
pub mod blocked;
pub mod popup;
