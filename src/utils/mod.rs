pub mod paths;
pub mod preview;
