pub mod attester;
pub mod error;
pub mod fund;
pub mod governance;
pub mod math;
pub mod venue;

pub use error::{ErrorFamily, FundError};
pub use fund::{Fund, FundConfig};
