/// Derives arithmetic for a single-field integer newtype by forwarding to the inner value. `Neg` is always derived.
///
/// ```ignore
/// newtype_ops!(Money { Add::add, Sub::sub } assign { AddAssign::add_assign, SubAssign::sub_assign });
/// ```
#[macro_export]
macro_rules! newtype_ops {
    ($t:ident { $($bin:ident::$bin_fn:ident),* } assign { $($asg:ident::$asg_fn:ident),* }) => {
        $(
            impl std::ops::$bin for $t {
                type Output = Self;

                fn $bin_fn(self, rhs: Self) -> Self {
                    Self(std::ops::$bin::$bin_fn(self.0, rhs.0))
                }
            }
        )*
        $(
            impl std::ops::$asg for $t {
                fn $asg_fn(&mut self, rhs: Self) {
                    std::ops::$asg::$asg_fn(&mut self.0, rhs.0)
                }
            }
        )*
        impl std::ops::Neg for $t {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }
    };
}
