pub mod rational;
pub mod tick_price;

// Raydium CLMM official math library
pub mod clmm_math;
