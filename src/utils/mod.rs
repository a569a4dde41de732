pub mod amount;
pub mod calc;
