// Member-facing screens. Every handler works on the signed-in user's own member row.

pub mod chat;
pub mod dashboard;
pub mod loans;
pub mod reports;
pub mod shares;

pub use chat::*;
pub use dashboard::*;
pub use loans::*;
pub use reports::*;
pub use shares::*;
