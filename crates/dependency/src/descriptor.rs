use std::sync::Arc;

/// What kind of provider satisfies a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
	/// A service published in a registry.
	Service,
	/// A configuration object keyed by PID.
	Configuration,
	/// Any other provider kind backed by a custom source.
	Other,
}

impl DependencyKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Service => "service",
			Self::Configuration => "configuration",
			Self::Other => "other",
		}
	}
}

/// How many providers a slot binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
	/// The best eligible provider.
	Single,
	/// Every eligible provider, best first.
	Multiple,
}

/// What happens when the binding of an active component changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingPolicy {
	/// Rebind in place; the component keeps running.
	Dynamic,
	/// Rebinding forces the component through stop and start.
	Static,
}

/// What an optional slot delivers when no provider is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Absence {
	/// Deliver a value built by the slot's default supplier.
	Substitute,
	/// Deliver [`Delivery::Absent`](crate::Delivery::Absent).
	Allow,
}

/// Static, shareable description of one dependency slot.
///
/// Built once per component declaration and shared read-only across all of
/// its instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
	name: String,
	kind: DependencyKind,
	required: bool,
	cardinality: Cardinality,
	policy: BindingPolicy,
	callback: String,
	absence: Absence,
}

impl DependencyDescriptor {
	fn new(name: String, kind: DependencyKind) -> Self {
		let configuration = kind == DependencyKind::Configuration;
		Self {
			name,
			kind,
			required: !configuration,
			cardinality: Cardinality::Single,
			policy: BindingPolicy::Dynamic,
			callback: if configuration { "updated" } else { "bind" }.to_string(),
			absence: if configuration { Absence::Substitute } else { Absence::Allow },
		}
	}

	/// A required, single, dynamic service slot.
	pub fn service(name: impl Into<String>) -> Self {
		Self::new(name.into(), DependencyKind::Service)
	}

	/// An optional configuration slot that substitutes defaults.
	pub fn configuration(name: impl Into<String>) -> Self {
		Self::new(name.into(), DependencyKind::Configuration)
	}

	/// A required, single, dynamic slot backed by a custom source.
	pub fn other(name: impl Into<String>) -> Self {
		Self::new(name.into(), DependencyKind::Other)
	}

	#[must_use]
	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	#[must_use]
	pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
		self.cardinality = cardinality;
		self
	}

	/// Shorthand for [`Cardinality::Multiple`].
	#[must_use]
	pub fn multiple(self) -> Self {
		self.with_cardinality(Cardinality::Multiple)
	}

	#[must_use]
	pub fn with_policy(mut self, policy: BindingPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Sets the callback name used in diagnostics.
	#[must_use]
	pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
		self.callback = callback.into();
		self
	}

	#[must_use]
	pub fn with_absence(mut self, absence: Absence) -> Self {
		self.absence = absence;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> DependencyKind {
		self.kind
	}

	pub fn is_required(&self) -> bool {
		self.required
	}

	pub fn cardinality(&self) -> Cardinality {
		self.cardinality
	}

	pub fn policy(&self) -> BindingPolicy {
		self.policy
	}

	pub fn callback(&self) -> &str {
		&self.callback
	}

	/// Absence handling. Required slots never substitute.
	pub fn absence(&self) -> Absence {
		if self.required { Absence::Allow } else { self.absence }
	}

	/// Wraps the descriptor for sharing across instances.
	pub fn shared(self) -> Arc<Self> {
		Arc::new(self)
	}
}
