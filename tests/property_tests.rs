//! 数量联动与 tick 编解码的性质测试 (proptest)
//!
//! 运行测试:
//!     cargo test --test property_tests

use clmm_deposit_sdk::liquidity::{PoolPrice, PricePosition, PriceRange, classify, normalize, reconcile};
use clmm_deposit_sdk::utils::calc::tick_price::{price_to_tick, tick_to_price};
use clmm_deposit_sdk::{ClmmError, Rational, Side};
use proptest::prelude::*;

const SPACINGS: [u16; 6] = [1, 8, 10, 60, 120, 200];

fn spacing() -> impl Strategy<Value = u16> {
    prop::sample::select(SPACINGS.to_vec())
}

/// Price as `mantissa / 10^scale`, roughly 1e-6 .. 1e6
fn price() -> impl Strategy<Value = Rational> {
    (1u64..1_000_000_000_000u64, 0u32..13).prop_map(|(mantissa, scale)| Rational::from_scaled(mantissa, scale + 6))
}

fn amount() -> impl Strategy<Value = Rational> {
    (1u64..10_000_000_000u64, 0u32..10).prop_map(|(mantissa, scale)| Rational::from_scaled(mantissa, scale))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip_inside_is_exact(
        lower in -20_000i32..20_000,
        width in 1i32..2_000,
        offset in 0u32..1_000,
        focused in amount(),
    ) {
        let range = PriceRange::new(lower * 10, (lower + width) * 10, 10).unwrap();
        // 当前价严格落在区间内部
        let lo = range.lower_sqrt_price_x64().unwrap();
        let hi = range.upper_sqrt_price_x64().unwrap();
        let current = lo + 1 + (hi - lo - 2) / 1_000 * offset as u128;
        let price = PoolPrice::from_sqrt_price_x64(current, 6, 9).unwrap();
        prop_assert_eq!(classify(&range, &price).unwrap(), PricePosition::Inside);

        let forward = reconcile(&range, PricePosition::Inside, Side::A, &focused, &price).unwrap();
        let back = reconcile(&range, PricePosition::Inside, Side::B, forward.amount_b(), &price).unwrap();
        prop_assert_eq!(back.amount_a(), &focused);
        prop_assert_eq!(back.liquidity, forward.liquidity);
    }

    #[test]
    fn prop_tick_price_within_one_step(p in price(), s in spacing()) {
        let tick = price_to_tick(&p, s).unwrap();
        prop_assert_eq!(tick % s as i32, 0);
        let below = tick_to_price(tick - s as i32).unwrap();
        let above = tick_to_price(tick + s as i32).unwrap();
        prop_assert!(below <= p && p <= above, "tick {} for price {}", tick, p);
    }

    #[test]
    fn prop_aligned_tick_recovered(k in -3_000i32..3_000, s in spacing()) {
        let tick = k * s as i32;
        prop_assume!(tick.abs() < 400_000);
        prop_assert_eq!(price_to_tick(&tick_to_price(tick).unwrap(), s).unwrap(), tick);
    }

    #[test]
    fn prop_normalize_is_ordered_and_aligned(a in price(), b in price(), s in spacing()) {
        match normalize(&a, &b, s) {
            Ok(range) => {
                prop_assert!(range.lower_tick() < range.upper_tick());
                prop_assert_eq!(range.lower_tick() % s as i32, 0);
                prop_assert_eq!(range.upper_tick() % s as i32, 0);
                prop_assert_eq!(normalize(&b, &a, s).unwrap(), range);
            }
            Err(e) => {
                let degenerate = matches!(e, ClmmError::DegenerateRange { .. });
                prop_assert!(degenerate, "unexpected error {:?}", e);
            }
        }
    }

    #[test]
    fn prop_classification_is_exclusive(
        lower in -10_000i32..10_000,
        width in 1i32..500,
        current_tick in -20_000i32..20_000,
    ) {
        let range = PriceRange::new(lower * 10, (lower + width) * 10, 10).unwrap();
        let sqrt = clmm_deposit_sdk::utils::calc::clmm_math::get_sqrt_price_at_tick(current_tick).unwrap();
        let price = PoolPrice::from_sqrt_price_x64(sqrt, 6, 6).unwrap();
        let position = classify(&range, &price).unwrap();
        let expected = if current_tick < range.lower_tick() {
            PricePosition::Below
        } else if current_tick > range.upper_tick() {
            PricePosition::Above
        } else {
            PricePosition::Inside
        };
        prop_assert_eq!(position, expected);
    }
}
