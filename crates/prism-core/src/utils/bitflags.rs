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

//! A macro for packed flag words.
//!
//! Render state words mix single-bit flags with multi-bit fields (depth test,
//! blend factors, primitive topology). Besides the usual set operations the
//! generated types expose [`field`](#method.field) / `with_field` accessors
//! for those packed fields.

/// Declares a packed flag word with named constants.
#[macro_export]
#[doc(hidden)]
macro_rules! prism_bitflags {
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
            /// No bits set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Creates a value from raw bits. Unknown bits are kept.
            pub const fn from_bits(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if all bits of `other` are set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if any bit of `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the bits of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the bits of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Returns a copy with the bits of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns a copy with the bits of `other` cleared.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }

            /// Extracts the packed field selected by `mask`, shifted down by `shift`.
            pub const fn field(&self, mask: Self, shift: u32) -> $ty {
                (self.bits & mask.bits) >> shift
            }

            /// Returns a copy where the packed field selected by `mask` holds `value`.
            #[must_use]
            pub const fn with_field(self, mask: Self, shift: u32, value: $ty) -> Self {
                Self {
                    bits: (self.bits & !mask.bits) | ((value << shift) & mask.bits),
                }
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
                write!(f, "{}({:#x})", stringify!($name), self.bits)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::prism_bitflags! {
        struct Packed: u32 {
            const A = 1 << 0;
            const B = 1 << 1;
            const LEVEL_MASK = 0xf << 4;
            const LEVEL_3 = 3 << 4;
        }
    }

    #[test]
    fn set_operations() {
        let mut flags = Packed::A | Packed::B;
        assert!(flags.contains(Packed::A));
        assert!(flags.intersects(Packed::B | Packed::LEVEL_3));
        flags.remove(Packed::A);
        assert_eq!(flags, Packed::B);
        assert!(Packed::default().is_empty());
        assert_eq!(Packed::A.with(Packed::B).without(Packed::A), Packed::B);
    }

    #[test]
    fn packed_fields_round_trip_through_mask() {
        let flags = Packed::A | Packed::LEVEL_3;
        assert_eq!(flags.field(Packed::LEVEL_MASK, 4), 3);

        let flags = flags.with_field(Packed::LEVEL_MASK, 4, 9);
        assert_eq!(flags.field(Packed::LEVEL_MASK, 4), 9);
        assert!(flags.contains(Packed::A), "other bits are preserved");

        // Values wider than the field are truncated by the mask.
        let flags = flags.with_field(Packed::LEVEL_MASK, 4, 0x1f);
        assert_eq!(flags.field(Packed::LEVEL_MASK, 4), 0xf);
        assert!(!flags.contains(Packed::from_bits(1 << 8)));
    }

    #[test]
    fn debug_prints_raw_bits() {
        assert_eq!(format!("{:?}", Packed::LEVEL_3), "Packed(0x30)");
    }
}
