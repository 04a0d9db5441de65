/*!
An `OredIntegerSet` is an implementation of an `ApproximateSet` that uses bitwise Or to accumulate
integer members in a single index value: each member is hashed down to one bit of `IndexType` and
that bit is set. The fewer the elements it "contains", the more accurate it is. This implementation
is about as quick and dirty as possible without just using a `HashSet`.

Possible alternatives:
  * Bloom filter: https://crates.io/crates/bloom
  * Cuckoo filter: https://crates.io/crates/cuckoofilter
  * XOr filter: https://crates.io/crates/xorf
*/

use std::marker::PhantomData;
use std::ops::{
  BitAndAssign,
  BitOrAssign,
  SubAssign
};

use num_traits::{AsPrimitive, PrimInt, Unsigned};

use super::ApproximateSet;

pub struct OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  index: IndexType, // The internal representation of the set.
  _member: PhantomData<MemberType>,
}

impl<IndexType, MemberType> OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  /// Maps a member to the single bit of `index` that represents it.
  fn bit_for(value: MemberType) -> IndexType {
    let bits = std::mem::size_of::<IndexType>() * 8;
    let slot = value.as_() % bits;
    IndexType::one() << slot
  }
}

impl<IndexType, MemberType> Clone for OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  fn clone(&self) -> Self {
    Self { index: self.index, _member: PhantomData }
  }
}

impl<IndexType, MemberType> ApproximateSet<MemberType> for OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  fn new() -> Self{
    Self{
      index: IndexType::zero(),
      _member: PhantomData,
    }
  }

  fn with_value(value: MemberType) -> Self {
    let mut set = Self::new();
    set.insert(value);
    set
  }

  fn with_values(values: Vec<MemberType>) -> Self {
    let mut set = Self::new();
    for i in values {
      set.insert(i);
    }
    set
  }

  fn insert(&mut self, value: MemberType) {
    self.index = self.index | Self::bit_for(value);
  }

  fn may_contain(&self, value: &MemberType) -> bool {
    let bit = Self::bit_for(*value);
    (self.index & bit) != IndexType::zero()
  }

  fn make_union(a: &Self, b: &Self) -> Self{
    Self{
      index: a.index | b.index,
      _member: PhantomData,
    }
  }

  fn make_intersection(a: &Self, b: &Self) -> Self{
    Self{
      index: a.index & b.index,
      _member: PhantomData,
    }
  }

  fn empty(&self) -> bool {
    self.index == IndexType::zero()
  }

  fn may_equal(&self, other: &Self) -> bool {
    self.index == other.index
  }

  fn equivalent(&self, other: &Self) -> bool {
    self.index == other.index
  }

  fn reset(&mut self) {
    self.index = IndexType::zero();
  }

}

impl<IndexType, MemberType> BitOrAssign for OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  fn bitor_assign(&mut self, rhs: Self) {
    self.index = self.index | rhs.index;
  }
}

impl<IndexType, MemberType> BitAndAssign for OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  fn bitand_assign(&mut self, rhs: Self) {
    self.index = self.index & rhs.index;
  }
}

impl<IndexType, MemberType> SubAssign for OredIntegerSet<IndexType, MemberType>
  where IndexType: PrimInt + Unsigned + 'static,
        MemberType: AsPrimitive<usize>
{
  fn sub_assign(&mut self, rhs: Self) {
    self.index = self.index & !rhs.index;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_membership_is_always_correct() {
    let set: OredIntegerSet<u64, usize> = OredIntegerSet::with_values(vec![1, 2, 3]);
    assert!(!set.may_contain(&10_000));
  }

  #[test]
  fn membership_after_insert_is_reported() {
    let mut set: OredIntegerSet<u64, usize> = OredIntegerSet::new();
    set.insert(5);
    assert!(set.may_contain(&5));
  }

  #[test]
  fn union_contains_both_operands() {
    let a: OredIntegerSet<u64, usize> = OredIntegerSet::with_value(1);
    let b: OredIntegerSet<u64, usize> = OredIntegerSet::with_value(2);
    let u = OredIntegerSet::make_union(&a, &b);
    assert!(u.may_contain(&1));
    assert!(u.may_contain(&2));
  }
}
