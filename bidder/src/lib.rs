pub mod bidder;
pub mod rules;

pub use bidder::{BidOutcome, Bidder, BidderConfig};
pub use rules::BiddingRule;
