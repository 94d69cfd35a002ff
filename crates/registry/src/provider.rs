use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Provider ranking. Higher ranks are preferred.
pub type Rank = i32;

/// Opaque identifier assigned by a registry to one published provider.
///
/// Registries hand out identifiers in strictly increasing order, so a lower
/// identifier always means an earlier registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub u64);

impl ProviderId {
	/// Returns the underlying u64 value.
	#[inline]
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for ProviderId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "provider#{}", self.0)
	}
}

/// Identity of one consuming component context.
///
/// Materialized provider objects are cached per context and released when
/// that context is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl ContextId {
	/// Allocates a process-unique context identifier.
	pub fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
	}
}

impl std::fmt::Display for ContextId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "context#{}", self.0)
	}
}

/// A provider handle together with its current rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef {
	pub id: ProviderId,
	pub rank: Rank,
}

impl ProviderRef {
	pub const fn new(id: ProviderId, rank: Rank) -> Self {
		Self { id, rank }
	}

	/// Selection order, best candidate first.
	///
	/// Higher rank wins. Equal ranks fall back to registration order: the
	/// provider with the lower [`ProviderId`] wins.
	pub fn preference(&self, other: &Self) -> Ordering {
		other.rank.cmp(&self.rank).then_with(|| self.id.cmp(&other.id))
	}

	/// Returns true if `self` should be selected over `other`.
	#[inline]
	pub fn outranks(&self, other: &Self) -> bool {
		self.preference(other) == Ordering::Less
	}
}

impl std::fmt::Display for ProviderRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}(rank={})", self.id, self.rank)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(ProviderRef::new(ProviderId(2), 10), ProviderRef::new(ProviderId(1), 0), true)]
	#[case(ProviderRef::new(ProviderId(1), 0), ProviderRef::new(ProviderId(2), 10), false)]
	#[case(ProviderRef::new(ProviderId(1), 5), ProviderRef::new(ProviderId(2), 5), true)]
	#[case(ProviderRef::new(ProviderId(2), 5), ProviderRef::new(ProviderId(1), 5), false)]
	#[case(ProviderRef::new(ProviderId(3), -1), ProviderRef::new(ProviderId(4), -2), true)]
	fn outranks_prefers_rank_then_registration_order(#[case] lhs: ProviderRef, #[case] rhs: ProviderRef, #[case] expected: bool) {
		assert_eq!(lhs.outranks(&rhs), expected);
	}

	#[test]
	fn preference_sorts_best_first() {
		let mut refs = vec![
			ProviderRef::new(ProviderId(4), 0),
			ProviderRef::new(ProviderId(1), 0),
			ProviderRef::new(ProviderId(3), 7),
			ProviderRef::new(ProviderId(2), -3),
		];
		refs.sort_by(ProviderRef::preference);
		let ids: Vec<_> = refs.iter().map(|r| r.id.0).collect();
		assert_eq!(ids, vec![3, 1, 4, 2]);
	}

	#[test]
	fn provider_does_not_outrank_itself() {
		let r = ProviderRef::new(ProviderId(9), 1);
		assert!(!r.outranks(&r));
	}

	#[test]
	fn context_ids_are_unique() {
		let a = ContextId::next();
		let b = ContextId::next();
		assert_ne!(a, b);
	}
}
