use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Cents        ----------------------------------------------------------
/// A monetary amount in integer minor units (cents).
///
/// All pricing arithmetic in the gateway happens on this type. Amounts are only ever rendered as decimal currency at
/// the presentation edge, so floating point never enters the pipeline.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to Cents")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Multiplies by a basis-point rate, rounding half away from zero.
    ///
    /// Used for percentage fee and tax calculations. The intermediate product is widened to `i128` so that rates
    /// applied to large amounts cannot overflow.
    pub fn apply_basis_points(&self, bps: i64) -> Self {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = if scaled >= 0 { (scaled + 5_000) / 10_000 } else { (scaled - 5_000) / 10_000 };
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_as_decimal_currency() {
        assert_eq!(Cents::from(20470).to_string(), "$204.70");
        assert_eq!(Cents::from(5).to_string(), "$0.05");
        assert_eq!(Cents::from(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn basis_points_round_half_up() {
        // 2.2% of $200.00 is exactly $4.40
        assert_eq!(Cents::from(20_000).apply_basis_points(220), Cents::from(440));
        // 2.2% of $0.25 is 0.55c, which rounds to 1c
        assert_eq!(Cents::from(25).apply_basis_points(220), Cents::from(1));
        // 10% of $204.70
        assert_eq!(Cents::from(20_470).apply_basis_points(1_000), Cents::from(2_047));
    }

    #[test]
    fn sums_and_ops() {
        let total: Cents = [100, 250, 30].into_iter().map(Cents::from).sum();
        assert_eq!(total, Cents::from(380));
        assert_eq!(Cents::from(100) - Cents::from(30), Cents::from(70));
        assert_eq!(Cents::from(150) * 3, Cents::from(450));
    }
}
