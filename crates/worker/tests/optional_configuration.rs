//! An optional configuration dependency driven entirely by store events:
//! default, start, bound value, default again, stop. Three callbacks total.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tether_dependency::{
	ActivationError, ComponentId, ComponentState, Container, DependencyDescriptor, DependencyManager, Delivery, SlotSpec, SlotState,
};
use tether_registry::{MemoryConfigurationStore, Properties};
use tether_worker::{ComponentDrivers, PumpExit, TaskClass};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct TestConfig {
	#[serde(rename = "testKey")]
	test_key: String,
}

impl Default for TestConfig {
	fn default() -> Self {
		Self {
			test_key: "default".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
	Updated(String),
	Start,
	Stop,
}

struct ChannelContainer(mpsc::UnboundedSender<Step>);

impl Container for ChannelContainer {
	fn request_activate(&self, _component: &ComponentId) -> Result<(), ActivationError> {
		let _ = self.0.send(Step::Start);
		Ok(())
	}

	fn request_deactivate(&self, _component: &ComponentId) {
		let _ = self.0.send(Step::Stop);
	}
}

async fn next(steps: &mut mpsc::UnboundedReceiver<Step>) -> Step {
	tokio::time::timeout(Duration::from_secs(5), steps.recv())
		.await
		.expect("no lifecycle step within 5s")
		.expect("step channel closed")
}

#[tokio::test]
async fn optional_configuration_lifecycle() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let (tx, mut steps) = mpsc::unbounded_channel();
	let store = Arc::new(MemoryConfigurationStore::new());
	let callbacks = Arc::new(Mutex::new(0usize));

	let updated = tx.clone();
	let counter = Arc::clone(&callbacks);
	let manager = DependencyManager::builder("optional-config", Arc::new(ChannelContainer(tx)))
		.slot(SlotSpec::configuration(
			DependencyDescriptor::configuration("config"),
			store.clone(),
			"test.pid",
			move |delivery: &Delivery<TestConfig>| {
				*counter.lock() += 1;
				let key = delivery.value().map(|c| c.test_key.clone()).unwrap_or_default();
				let _ = updated.send(Step::Updated(key));
				Ok(())
			},
		))
		.build()
		.unwrap();

	let mut drivers = ComponentDrivers::new(Arc::clone(&manager));
	drivers.configuration("config", store.as_ref(), "test.pid");
	assert_eq!(drivers.snapshots()[0].class, TaskClass::EventPump);

	tether_worker::activate(&manager).await.unwrap();
	assert_eq!(next(&mut steps).await, Step::Updated("default".into()));
	assert_eq!(next(&mut steps).await, Step::Start);

	let mut properties = Properties::new();
	properties.insert("testKey".into(), json!("testvalue"));
	store.put("test.pid", properties);
	assert_eq!(next(&mut steps).await, Step::Updated("testvalue".into()));
	assert_eq!(manager.slot_state("config").unwrap(), SlotState::SatisfiedBound);

	assert!(store.delete("test.pid"));
	assert_eq!(next(&mut steps).await, Step::Updated("default".into()));
	assert_eq!(manager.slot_state("config").unwrap(), SlotState::SatisfiedDefault);

	manager.dispose();
	assert_eq!(next(&mut steps).await, Step::Stop);
	assert_eq!(manager.state(), ComponentState::Disposed);
	assert_eq!(*callbacks.lock(), 3);

	let report = drivers.shutdown().await;
	assert_eq!(report.pumps.len(), 1);
	assert!(matches!(report.pumps[0], Ok(ref pump) if pump.exit == PumpExit::Cancelled && pump.forwarded == 2));
	assert!(report.retry.is_none());
}
