// Copyright (c) Raydium Foundation
// Licensed under Apache 2.0
// Source: https://github.com/raydium-io/raydium-clmm/programs/amm/src/libraries/big_num.rs
// Only the U128 word type is needed by the tick lattice

//! 128 bit number with explicit 64-bit limbs
//! https://github.com/solana-labs/solana/issues/19549
use uint::construct_uint;

construct_uint! {
    pub struct U128(2);
}
