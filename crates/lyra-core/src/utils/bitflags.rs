// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `lyra_bitflags!`, a small declarative generator for bit-set newtypes.
//!
//! Usage flags, write masks and stage masks throughout the RHI are plain
//! integers wrapped in a type so that a `BufferUsage` can never be passed
//! where a `TextureUsage` is expected.

/// Declares a bit-set newtype with named constants and the usual set operators.
#[macro_export]
macro_rules! lyra_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The set containing no flag.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// The set containing no flag.
            pub const fn empty() -> Self {
                Self::EMPTY
            }

            /// The union of every named flag.
            pub const fn all() -> Self {
                Self { bits: 0 $(| $flag_value)* }
            }

            /// Builds a set from raw bits. Unknown bits are kept as-is.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// The raw bits of the set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// `true` when every bit of `other` is also set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` when `self` and `other` share at least one bit.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets every bit of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears every bit of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Returns a copy with the bits of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl ::core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl ::core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl ::core::ops::BitXor for $name {
            type Output = Self;
            fn bitxor(self, other: Self) -> Self {
                Self { bits: self.bits ^ other.bits }
            }
        }

        impl ::core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl ::core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl ::core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                let mut remaining = self.bits;
                let mut names: [&str; 64] = [""; 64];
                let mut count = 0usize;
                $(
                    let value: $ty = $flag_value;
                    if value != 0 && (remaining & value) == value && count < names.len() {
                        names[count] = stringify!($flag_name);
                        count += 1;
                        remaining &= !value;
                    }
                )*

                write!(f, "{}(", stringify!($name))?;
                if count == 0 && remaining == 0 {
                    write!(f, "EMPTY")?;
                }
                for (i, name) in names[..count].iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{name}")?;
                }
                if remaining != 0 {
                    if count > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", remaining)?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::lyra_bitflags! {
        /// Flags used only by these tests.
        pub struct Access: u16 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
            const MAP = 1 << 2;
            const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        }
    }

    #[test]
    fn empty_set_contains_nothing() {
        let access = Access::default();
        assert!(access.is_empty());
        assert!(access.contains(Access::EMPTY));
        assert!(!access.contains(Access::READ));
        assert_eq!(format!("{access:?}"), "Access(EMPTY)");
    }

    #[test]
    fn composite_constants_behave_like_unions() {
        let access = Access::READ | Access::WRITE;
        assert_eq!(access, Access::READ_WRITE);
        assert!(access.contains(Access::WRITE));
        assert!(!access.contains(Access::MAP));
        assert!(access.intersects(Access::READ | Access::MAP));
        assert_eq!(Access::all(), Access::READ_WRITE | Access::MAP);
        assert_eq!(Access::empty(), Access::EMPTY);
    }

    #[test]
    fn insert_and_remove() {
        let mut access = Access::READ;
        access.insert(Access::MAP);
        assert!(access.contains(Access::MAP));
        access.remove(Access::READ);
        assert_eq!(access, Access::MAP);
        assert_eq!(access & Access::READ, Access::EMPTY);
    }

    #[test]
    fn debug_lists_named_and_unknown_bits() {
        assert_eq!(format!("{:?}", Access::READ_WRITE), "Access(READ | WRITE)");
        let odd = Access::from_bits_truncate(0b1001);
        assert_eq!(format!("{odd:?}"), "Access(READ | 0x8)");
    }
}
