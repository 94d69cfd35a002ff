use serde_json::json;

use super::*;

fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
	pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn drain(stream: &mut ProviderStream) -> Vec<ProviderEvent> {
	let mut events = Vec::new();
	while let Ok(event) = stream.try_recv() {
		events.push(event);
	}
	events
}

#[test]
fn subscribe_replays_existing_matching_providers() {
	let registry = MemoryRegistry::<u32>::new();
	let a = registry.register("log", BTreeMap::new(), 5, |_, _| Ok(1));
	let _other = registry.register("http", BTreeMap::new(), 0, |_, _| Ok(2));

	let mut stream = registry.subscribe(&Criteria::service("log"));
	assert_eq!(drain(&mut stream), vec![ProviderEvent::Added(ProviderRef::new(a, 5))]);
}

#[test]
fn live_events_follow_mutation_order() {
	let registry = MemoryRegistry::<u32>::new();
	let mut stream = registry.subscribe(&Criteria::service("log").with_property("sink", "file"));

	let a = registry.register("log", props(&[("sink", "file")]), 0, |_, _| Ok(1));
	let _ignored = registry.register("log", props(&[("sink", "stderr")]), 0, |_, _| Ok(2));
	assert!(registry.set_rank(a, 9));
	assert!(registry.unregister(a));
	assert!(!registry.unregister(a));

	assert_eq!(
		drain(&mut stream),
		vec![
			ProviderEvent::Added(ProviderRef::new(a, 0)),
			ProviderEvent::Modified(ProviderRef::new(a, 9)),
			ProviderEvent::Removed(a),
		]
	);
}

#[test]
fn provider_ids_increase_with_registration() {
	let registry = MemoryRegistry::<u32>::new();
	let a = registry.register("log", BTreeMap::new(), 0, |_, _| Ok(1));
	let b = registry.register("log", BTreeMap::new(), 0, |_, _| Ok(1));
	assert!(a < b);
}

#[test]
fn acquire_and_release_track_uses_per_context() {
	let registry = MemoryRegistry::<String>::new();
	let id = registry.register("log", BTreeMap::new(), 0, |id, ctx| Ok(format!("{id}@{ctx}")));
	let c1 = ContextId(1);
	let c2 = ContextId(2);

	assert_eq!(registry.acquire(id, c1).as_deref(), Ok("provider#1@context#1"));
	registry.acquire(id, c2).unwrap();
	assert_eq!(registry.use_count(id), 2);

	registry.release(id, c1);
	registry.release(id, c1);
	assert_eq!(registry.use_count(id), 1);
}

#[test]
fn acquire_reports_unregistered_and_factory_failures() {
	let registry = MemoryRegistry::<u32>::new();
	let broken = registry.register("log", BTreeMap::new(), 0, |_, _| Err("boom".to_string()));

	assert_eq!(
		registry.acquire(broken, ContextId(1)),
		Err(AcquisitionError::Factory {
			provider: broken,
			reason: "boom".to_string()
		})
	);
	assert_eq!(registry.use_count(broken), 0);

	registry.unregister(broken);
	assert_eq!(registry.acquire(broken, ContextId(1)), Err(AcquisitionError::Unregistered(broken)));
}

#[test]
fn dropped_subscribers_are_pruned() {
	let registry = MemoryRegistry::<u32>::new();
	let stream = registry.subscribe(&Criteria::service("log"));
	drop(stream);
	registry.register("log", BTreeMap::new(), 0, |_, _| Ok(1));
	assert!(registry.state.read().subscribers.is_empty());
}

#[test]
fn configuration_store_emits_added_modified_removed() {
	let store = MemoryConfigurationStore::new();
	let mut stream = store.subscribe("app.pid");

	let mut properties = Properties::new();
	properties.insert("testKey".into(), json!("testvalue"));
	let provider = store.put("app.pid", properties.clone());
	store.put("app.pid", Properties::new());
	store.put("other.pid", properties);
	assert!(store.delete("app.pid"));
	assert!(!store.delete("app.pid"));

	assert_eq!(
		drain(&mut stream),
		vec![
			ProviderEvent::Added(ProviderRef::new(provider, 0)),
			ProviderEvent::Modified(ProviderRef::new(provider, 0)),
			ProviderEvent::Removed(provider),
		]
	);
}

#[test]
fn configuration_revision_bumps_on_update() {
	let store = MemoryConfigurationStore::new();
	assert!(store.get_configuration("pid").is_none());

	let provider = store.put("pid", Properties::new());
	let mut properties = Properties::new();
	properties.insert("k".into(), json!(1));
	store.put("pid", properties.clone());

	let config = store.get_configuration("pid").unwrap();
	assert_eq!(config.provider, provider);
	assert_eq!(config.revision, 2);
	assert_eq!(config.properties, properties);

	let mut replay = store.subscribe("pid");
	assert_eq!(drain(&mut replay), vec![ProviderEvent::Added(ProviderRef::new(provider, 0))]);
}
