pub mod approval;
pub mod payment;
pub mod reservation;

pub use approval::*;
pub use payment::*;
pub use reservation::*;
