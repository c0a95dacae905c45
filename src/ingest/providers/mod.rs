//! Concrete channel adapters, one per payment provider

pub mod coop;
pub mod equity;
pub mod kcb;
pub mod mpesa;

pub use coop::CoopAdapter;
pub use equity::EquityAdapter;
pub use kcb::KcbAdapter;
pub use mpesa::MpesaAdapter;
