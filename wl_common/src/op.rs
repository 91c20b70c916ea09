/// Implements the arithmetic operator traits for single-field integer newtypes.
///
/// The target type must implement `From<i64>` and expose its value via `value()`.
#[macro_export]
macro_rules! op {
    (binary $type:ty, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self::from(std::ops::$trait::$fn(self.value(), rhs.value()))
            }
        }
    };
    (inplace $type:ty, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            fn $fn(&mut self, rhs: Self) {
                let mut v = self.value();
                std::ops::$trait::$fn(&mut v, rhs.value());
                *self = Self::from(v);
            }
        }
    };
    (unary $type:ty, $trait:ident, $fn:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self::from(std::ops::$trait::$fn(self.value()))
            }
        }
    };
}
