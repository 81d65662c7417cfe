pub mod auctioneer;
pub mod round;

pub use auctioneer::{Allocation, Auctioneer, AuctioneerConfig};
pub use round::{Round, RoundState};
