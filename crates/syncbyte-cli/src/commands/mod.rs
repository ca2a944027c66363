pub mod migrate;
pub mod replay;
pub mod state;
