//! Arbitrary-precision rational numbers.
//!
//! Every amount and price in the reconciliation path is a `Rational`. Values are
//! kept in lowest terms with a strictly positive denominator, so structural
//! equality is numeric equality. Addition, subtraction and multiplication go
//! through the `std::ops` traits; division is fallible and lives on
//! [`Rational::divide`]. Rounding happens only in [`Rational::round`] and
//! [`Rational::to_decimal_string`], and the caller always names the mode.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use crate::common::error::{ClmmError, ClmmResult};

/// Explicit rounding mode for the lossy conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Toward negative infinity
    Floor,
    /// Toward positive infinity
    Ceil,
    /// Nearest, ties away from zero
    #[default]
    HalfUp,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Rational {
    numer: BigInt,
    denom: BigInt,
}

impl Rational {
    pub fn new(numer: impl Into<BigInt>, denom: impl Into<BigInt>) -> ClmmResult<Self> {
        let denom = denom.into();
        if denom.is_zero() {
            return Err(ClmmError::DivisionByZero);
        }
        Ok(Self::reduced(numer.into(), denom))
    }

    /// `denom` must be non-zero.
    pub(crate) fn reduced(mut numer: BigInt, mut denom: BigInt) -> Self {
        if denom.is_negative() {
            numer = -numer;
            denom = -denom;
        }
        let g = numer.gcd(&denom);
        if !g.is_one() {
            numer /= &g;
            denom /= &g;
        }
        Self { numer, denom }
    }

    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self { numer: value.into(), denom: BigInt::one() }
    }

    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn one() -> Self {
        Self::from_integer(1)
    }

    /// `value / 10^scale`, e.g. a raw token amount and its decimals.
    pub fn from_scaled(value: impl Into<BigInt>, scale: u32) -> Self {
        Self::reduced(value.into(), pow10_int(scale))
    }

    /// `10^exp` for a signed exponent.
    pub fn pow10(exp: i32) -> Self {
        if exp >= 0 {
            Self::from_integer(pow10_int(exp.unsigned_abs()))
        } else {
            Self::reduced(BigInt::one(), pow10_int(exp.unsigned_abs()))
        }
    }

    /// Parses plain decimal text such as `"100"`, `"-0.25"`, `".5"` or `"100."`.
    pub fn from_decimal_str(input: &str) -> ClmmResult<Self> {
        let invalid = || ClmmError::InvalidDecimal(input.to_string());
        let s = input.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let digits = format!("{int_part}{frac_part}");
        let value = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let value = if negative { -value } else { value };
        Ok(Self::from_scaled(value, frac_part.len() as u32))
    }

    pub fn numer(&self) -> &BigInt {
        &self.numer
    }

    pub fn denom(&self) -> &BigInt {
        &self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.numer.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.numer.is_negative()
    }

    pub fn is_integer(&self) -> bool {
        self.denom.is_one()
    }

    pub fn abs(&self) -> Self {
        Self { numer: self.numer.abs(), denom: self.denom.clone() }
    }

    pub fn divide(&self, rhs: &Rational) -> ClmmResult<Rational> {
        if rhs.is_zero() {
            return Err(ClmmError::DivisionByZero);
        }
        Ok(Self::reduced(&self.numer * &rhs.denom, &self.denom * &rhs.numer))
    }

    pub fn recip(&self) -> ClmmResult<Rational> {
        Self::one().divide(self)
    }

    pub fn floor(&self) -> BigInt {
        self.round(RoundingMode::Floor)
    }

    pub fn ceil(&self) -> BigInt {
        self.round(RoundingMode::Ceil)
    }

    pub fn round(&self, mode: RoundingMode) -> BigInt {
        match mode {
            RoundingMode::Floor => self.numer.div_floor(&self.denom),
            RoundingMode::Ceil => -(-&self.numer).div_floor(&self.denom),
            RoundingMode::HalfUp => {
                let (q, r) = self.numer.abs().div_rem(&self.denom);
                let q = if &r + &r >= self.denom { q + 1 } else { q };
                if self.numer.is_negative() { -q } else { q }
            }
        }
    }

    /// Fixed-point decimal text with at most `max_fraction_digits` digits after
    /// the point. Trailing zeros are trimmed.
    pub fn to_decimal_string(&self, max_fraction_digits: u32, mode: RoundingMode) -> String {
        let scaled = Self::reduced(&self.numer * pow10_int(max_fraction_digits), self.denom.clone())
            .round(mode);
        let negative = scaled.is_negative();
        let digits = scaled.abs().to_string();
        let width = max_fraction_digits as usize;

        let (int_part, frac_part) = if digits.len() > width {
            let (i, f) = digits.split_at(digits.len() - width);
            (i.to_string(), f.to_string())
        } else {
            ("0".to_string(), format!("{digits:0>width$}"))
        };
        let frac_part = frac_part.trim_end_matches('0');

        let mut out = String::with_capacity(int_part.len() + frac_part.len() + 2);
        if negative {
            out.push('-');
        }
        out.push_str(&int_part);
        if !frac_part.is_empty() {
            out.push('.');
            out.push_str(frac_part);
        }
        out
    }

    /// Lossy conversion for logging and charts only.
    pub fn to_f64(&self) -> f64 {
        if self.numer.is_zero() {
            return 0.0;
        }
        // Keep roughly 64 significant bits in the quotient.
        let shift = 64 - (self.numer.bits() as i64 - self.denom.bits() as i64);
        let q = if shift >= 0 {
            (&self.numer << shift as usize) / &self.denom
        } else {
            &self.numer / (&self.denom << (-shift) as usize)
        };
        q.to_f64().unwrap_or(f64::NAN) * 2f64.powi(-shift as i32)
    }
}

pub(crate) fn pow10_int(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.numer * &other.denom).cmp(&(&other.numer * &self.denom))
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<&Rational> for &Rational {
    type Output = Rational;
    fn add(self, rhs: &Rational) -> Rational {
        Rational::reduced(
            &self.numer * &rhs.denom + &rhs.numer * &self.denom,
            &self.denom * &rhs.denom,
        )
    }
}

impl Sub<&Rational> for &Rational {
    type Output = Rational;
    fn sub(self, rhs: &Rational) -> Rational {
        Rational::reduced(
            &self.numer * &rhs.denom - &rhs.numer * &self.denom,
            &self.denom * &rhs.denom,
        )
    }
}

impl Mul<&Rational> for &Rational {
    type Output = Rational;
    fn mul(self, rhs: &Rational) -> Rational {
        Rational::reduced(&self.numer * &rhs.numer, &self.denom * &rhs.denom)
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp<Rational> for Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational {
                (&self).$method(&rhs)
            }
        }

        impl $imp<&Rational> for Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational {
                (&self).$method(rhs)
            }
        }

        impl $imp<Rational> for &Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational {
                self.$method(&rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational { numer: -self.numer, denom: self.denom }
    }
}

impl Neg for &Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational { numer: -&self.numer, denom: self.denom.clone() }
    }
}

impl From<u64> for Rational {
    fn from(value: u64) -> Self {
        Self::from_integer(value)
    }
}

impl From<u128> for Rational {
    fn from(value: u128) -> Self {
        Self::from_integer(value)
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl From<BigInt> for Rational {
    fn from(value: BigInt) -> Self {
        Self::from_integer(value)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom.is_one() {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({self})")
    }
}

/// Accepts `"n/d"` fractions as well as plain decimals.
impl FromStr for Rational {
    type Err = ClmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((n, d)) => {
                let parse = |part: &str| {
                    BigInt::from_str(part.trim()).map_err(|_| ClmmError::InvalidDecimal(s.to_string()))
                };
                Rational::new(parse(n)?, parse(d)?)
            }
            None => Rational::from_decimal_str(s),
        }
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rational::from_str(&s).map_err(D::Error::custom)
    }
}
