pub mod analysis;
pub mod contributions;
pub mod dashboard;
pub mod invite;
pub mod ledger;
pub mod loans;
pub mod maintenance;
pub mod members;
pub mod messages;
pub mod reports;
pub mod savings;

pub use analysis::*;
pub use contributions::*;
pub use dashboard::*;
pub use invite::*;
pub use ledger::*;
pub use loans::*;
pub use maintenance::*;
pub use members::*;
pub use messages::*;
pub use reports::*;
pub use savings::*;
