// Copyright (c) Raydium Foundation
// Licensed under Apache 2.0
// Source: https://github.com/raydium-io/raydium-clmm/programs/amm/src/libraries/
// Sqrt-price lattice of the on-chain program, used client-side to stay
// bit-compatible with the amounts the program computes

pub mod big_num;
pub mod tick_math;

pub use big_num::U128;
pub use tick_math::{
    MAX_SQRT_PRICE_X64, MAX_TICK, MIN_SQRT_PRICE_X64, MIN_TICK, get_sqrt_price_at_tick,
    get_tick_at_sqrt_price,
};
