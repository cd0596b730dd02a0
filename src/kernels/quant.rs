/// Quantization utilities: shift-round-saturate from wide accumulators to narrow lanes.

/// Narrow lane types an accumulator can be saturated into.
pub trait Narrow: Copy + Send + Sync + 'static {
    const MIN: i64;
    const MAX: i64;
    /// Caller guarantees `v` is already within `[MIN, MAX]`.
    fn from_clamped(v: i64) -> Self;
    fn widen(self) -> i32;
}

macro_rules! impl_narrow {
    ($($t:ty),*) => {
        $(impl Narrow for $t {
            const MIN: i64 = <$t>::MIN as i64;
            const MAX: i64 = <$t>::MAX as i64;
            #[inline]
            fn from_clamped(v: i64) -> Self { v as $t }
            #[inline]
            fn widen(self) -> i32 { self as i32 }
        })*
    };
}

impl_narrow!(u8, i8, i16);

// Every i64 rounds to zero at this shift, so larger ones change nothing.
const MAX_SHIFT: u32 = 64;

/// Round-half-up right shift: `round(value / 2^shift)` with ties toward +inf.
#[inline]
pub fn round_shift(value: i64, shift: u32) -> i64 {
    let s = shift.min(MAX_SHIFT);
    if s == 0 {
        return value;
    }
    // widened so the rounding term cannot overflow near i64::MAX
    ((value as i128 + (1i128 << (s - 1))) >> s) as i64
}

/// Shift, round half toward positive infinity, then saturate into `T`.
#[inline]
pub fn srs<T: Narrow>(value: i64, shift: u32) -> T {
    T::from_clamped(round_shift(value, shift).clamp(T::MIN, T::MAX))
}

/// Float-input variant of [`srs`]. NaN saturates to zero.
#[inline]
pub fn srs_f32<T: Narrow>(value: f32, shift: u32) -> T {
    if value.is_nan() {
        return T::from_clamped(0i64.clamp(T::MIN, T::MAX));
    }
    let scaled = (value as f64) / (2f64).powi(shift.min(MAX_SHIFT) as i32);
    let rounded = (scaled + 0.5).floor();
    let clamped = rounded.clamp(T::MIN as f64, T::MAX as f64);
    T::from_clamped(clamped as i64)
}

/// Precision reduction for 16-bit filter coefficients: keep the high byte.
/// Truncating arithmetic shift, no rounding.
#[inline]
pub fn reduce_coefficient(c: i16) -> i8 {
    (c >> 8) as i8
}
