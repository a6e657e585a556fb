pub mod db;
pub mod models;
pub mod positions;
pub mod state;

pub use db::PortfolioDb;
pub use models::*;
pub use positions::{closed_pnl, ClosedPnl, PositionStore};
pub use state::{select_fresh, FreshBatch, ProcessingState};
