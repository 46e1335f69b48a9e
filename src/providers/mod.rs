pub mod cbr;
pub mod util;

pub use cbr::CbrRateProvider;
