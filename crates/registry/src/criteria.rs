use std::collections::BTreeMap;

/// Subscription criteria: a service name plus exact-match properties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Criteria {
	name: String,
	properties: BTreeMap<String, String>,
}

impl Criteria {
	/// Matches every provider published under `name`.
	pub fn service(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			properties: BTreeMap::new(),
		}
	}

	/// Additionally requires `key` to equal `value`.
	#[must_use]
	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns true if a provider published under `name` with `properties` matches.
	pub fn matches(&self, name: &str, properties: &BTreeMap<String, String>) -> bool {
		self.name == name && self.properties.iter().all(|(k, v)| properties.get(k) == Some(v))
	}
}
