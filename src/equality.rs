//! Pluggable equality used by selector memoization.

use std::rc::Rc;

/// An equality strategy for memoized values.
pub type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Structural equality through [`PartialEq`]. The default for selectors.
pub fn deep_equal<T: PartialEq + 'static>() -> Equality<T> {
    Rc::new(|a: &T, b: &T| a == b)
}

/// One-level equality through [`ShallowEq`].
pub fn shallow_equal<T: ShallowEq + 'static>() -> Equality<T> {
    Rc::new(|a: &T, b: &T| a.shallow_eq(b))
}

/// Equality that only looks one level deep.
///
/// Primitives and strings compare by value, `Rc`s by pointer, and
/// containers element-wise with `shallow_eq`. Useful for selectors that
/// return tuples or records of primitives and shared references, where a
/// full structural comparison would walk large shared subtrees.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

macro_rules! shallow_by_value {
    ($($t:ty),* $(,)?) => {
        $(impl ShallowEq for $t {
            fn shallow_eq(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

shallow_by_value!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &str, (),
);

impl<T: ?Sized> ShallowEq for Rc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ShallowEq> ShallowEq for [T] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.shallow_eq(b))
    }
}

impl<T: ShallowEq> ShallowEq for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.as_slice().shallow_eq(other.as_slice())
    }
}

macro_rules! shallow_tuple {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: ShallowEq),+> ShallowEq for ($($name,)+) {
            fn shallow_eq(&self, other: &Self) -> bool {
                $(self.$idx.shallow_eq(&other.$idx))&&+
            }
        }
    };
}

shallow_tuple!(A.0);
shallow_tuple!(A.0, B.1);
shallow_tuple!(A.0, B.1, C.2);
shallow_tuple!(A.0, B.1, C.2, D.3);
shallow_tuple!(A.0, B.1, C.2, D.3, E.4);
shallow_tuple!(A.0, B.1, C.2, D.3, E.4, F.5);
