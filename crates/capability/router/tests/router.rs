use async_trait::async_trait;
use domain::{Location, Org, Thing, ThingKind, ThingType};
use piot_router::{TopicRouter, split_topic};
use piot_sinks::{RelationalSink, SinkError, TimeSeriesSink};
use piot_storage::{InMemoryOrgStore, InMemoryThingStore, ThingStore};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    writes: Mutex<Vec<String>>,
    fail_for: Option<String>,
}

impl RecordingSink {
    fn failing_for(name: &str) -> Self {
        Self {
            fail_for: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn record(&self, thing: &Thing, entry: String) -> Result<(), SinkError> {
        if self.fail_for.as_deref() == Some(thing.name.as_str()) {
            return Err(SinkError::Transport("unreachable".to_string()));
        }
        self.writes.lock().expect("lock").push(entry);
        Ok(())
    }

    fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("lock").clone()
    }
}

#[async_trait]
impl TimeSeriesSink for RecordingSink {
    async fn post_measurement(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        self.record(thing, format!("ts:{}:{}={value}", org.name, thing.name))
    }

    async fn post_switch_state(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        self.record(thing, format!("ts:{}:{}={value}", org.name, thing.name))
    }

    async fn post_location(&self, _org: &Org, thing: &Thing, location: &Location) -> Result<(), SinkError> {
        self.record(thing, format!("loc:{}={},{}@{}", thing.name, location.lat, location.lng, location.ts))
    }

    async fn post_battery_level(&self, _org: &Org, thing: &Thing, level: i32) -> Result<(), SinkError> {
        self.record(thing, format!("bat:{}={level}", thing.name))
    }
}

#[async_trait]
impl RelationalSink for RecordingSink {
    async fn store_measurement(&self, _org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        self.record(thing, format!("sql:{}={value}", thing.name))
    }

    async fn store_switch_state(&self, _org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        self.record(thing, format!("sql:{}={value}", thing.name))
    }
}

struct Harness {
    things: Arc<InMemoryThingStore>,
    sink: Arc<RecordingSink>,
    router: TopicRouter,
}

impl Harness {
    fn new() -> Self {
        Self::with_sink(RecordingSink::default())
    }

    fn with_sink(sink: RecordingSink) -> Self {
        let things = Arc::new(InMemoryThingStore::new());
        let orgs = Arc::new(InMemoryOrgStore::new());
        orgs.insert(Org::new("org-acme", "Acme")).expect("org");
        orgs.insert(Org::new("org-other", "Other")).expect("org");
        let sink = Arc::new(sink);
        let router = TopicRouter::new(things.clone(), orgs, sink.clone(), sink.clone());
        Self {
            things,
            sink,
            router,
        }
    }

    async fn thing(
        &self,
        name: &str,
        thing_type: ThingType,
        org_id: Option<&str>,
        configure: impl FnOnce(&mut Thing),
    ) -> Thing {
        let mut thing = self
            .things
            .register(name, thing_type, None)
            .await
            .expect("register");
        thing.org_id = org_id.map(str::to_string);
        configure(&mut thing);
        self.things.save(&thing).await.expect("save");
        thing
    }

    async fn reload(&self, thing: &Thing) -> Thing {
        self.things
            .get(&thing.id)
            .await
            .expect("get")
            .expect("thing exists")
    }
}

fn measured_on(topic: &'static str) -> impl FnOnce(&mut Thing) {
    move |thing| {
        thing.persistence.timeseries = true;
        if let ThingKind::Sensor(sensor) = &mut thing.kind {
            sensor.measurement_topic = topic.to_string();
        }
    }
}

#[test]
fn topics_split_into_org_and_subtopic() {
    assert_eq!(split_topic("org/Acme/kitchen/value"), Some(("Acme", "kitchen/value")));
    assert_eq!(split_topic("org/Acme"), None);
    assert_eq!(split_topic("home/Acme/value"), None);
}

#[tokio::test]
async fn shared_topic_fans_out_to_every_sensor() {
    let harness = Harness::new();
    let first = harness
        .thing("s1", ThingType::Sensor, Some("org-acme"), measured_on("temp"))
        .await;
    let second = harness
        .thing("s2", ThingType::Sensor, Some("org-acme"), measured_on("temp"))
        .await;

    harness.router.route("org/Acme/temp", "21.5").await.expect("route");

    for thing in [&first, &second] {
        let stored = harness.reload(thing).await;
        assert_eq!(stored.as_sensor().and_then(|s| s.value.as_deref()), Some("21.5"));
        assert!(stored.last_seen > 0);
    }
    let mut writes = harness.sink.writes();
    writes.sort();
    assert_eq!(writes, vec!["ts:Acme:s1=21.5", "ts:Acme:s2=21.5"]);
}

#[tokio::test]
async fn sensor_template_and_relational_sink() {
    let harness = Harness::new();
    let sensor = harness
        .thing("s1", ThingType::Sensor, Some("org-acme"), |thing| {
            thing.persistence.relational = true;
            if let ThingKind::Sensor(sensor) = &mut thing.kind {
                sensor.measurement_topic = "env".to_string();
                sensor.measurement_template = "data.t".to_string();
            }
        })
        .await;

    harness
        .router
        .route("org/Acme/env", r#"{"data":{"t":19.25}}"#)
        .await
        .expect("route");

    let stored = harness.reload(&sensor).await;
    assert_eq!(stored.as_sensor().and_then(|s| s.value.as_deref()), Some("19.25"));
    assert_eq!(harness.sink.writes(), vec!["sql:s1=19.25"]);
}

#[tokio::test]
async fn things_outside_the_org_are_never_touched() {
    let harness = Harness::new();
    let unassigned = harness
        .thing("loose", ThingType::Sensor, None, measured_on("temp"))
        .await;
    let foreign = harness
        .thing("foreign", ThingType::Sensor, Some("org-other"), measured_on("temp"))
        .await;

    harness.router.route("org/Acme/temp", "3").await.expect("route");

    assert_eq!(harness.reload(&unassigned).await.last_seen, 0);
    assert_eq!(harness.reload(&foreign).await.last_seen, 0);
    assert!(harness.sink.writes().is_empty());
}

#[tokio::test]
async fn unknown_org_and_foreign_roots_are_dropped() {
    let harness = Harness::new();
    harness
        .thing("s1", ThingType::Sensor, Some("org-acme"), measured_on("temp"))
        .await;

    harness.router.route("org/Nobody/temp", "1").await.expect("unknown org");
    harness.router.route("home/Acme/temp", "1").await.expect("foreign root");
    harness.router.route("org/Acme", "1").await.expect("short topic");

    assert!(harness.sink.writes().is_empty());
}

#[tokio::test]
async fn battery_and_sensor_rules_share_a_topic() {
    let harness = Harness::new();
    let sensor = harness
        .thing("s1", ThingType::Sensor, Some("org-acme"), |thing| {
            thing.battery.topic = "status".to_string();
            thing.battery.level_template = "bat".to_string();
            thing.battery.tracking = true;
            if let ThingKind::Sensor(sensor) = &mut thing.kind {
                sensor.measurement_topic = "status".to_string();
                sensor.measurement_template = "t".to_string();
            }
        })
        .await;

    harness
        .router
        .route("org/Acme/status", r#"{"bat":77,"t":4.5}"#)
        .await
        .expect("route");

    let stored = harness.reload(&sensor).await;
    assert_eq!(stored.battery.level, Some(77));
    assert_eq!(stored.as_sensor().and_then(|s| s.value.as_deref()), Some("4.5"));
    assert_eq!(harness.sink.writes(), vec!["bat:s1=77"]);
}

#[tokio::test]
async fn unparsable_battery_level_is_not_stored() {
    let harness = Harness::new();
    let device = harness
        .thing("d1", ThingType::Device, Some("org-acme"), |thing| {
            thing.battery.topic = "battery".to_string();
            thing.battery.level = Some(50);
        })
        .await;

    harness.router.route("org/Acme/battery", "low").await.expect("route");

    let stored = harness.reload(&device).await;
    assert_eq!(stored.battery.level, Some(50));
    assert!(stored.last_seen > 0);
}

#[tokio::test]
async fn switch_states_map_to_sink_values() {
    let harness = Harness::new();
    let configure = |thing: &mut Thing| {
        thing.persistence.timeseries = true;
        if let ThingKind::Switch(switch) = &mut thing.kind {
            switch.state_topic = "relay".to_string();
            switch.state_on = "ON".to_string();
            switch.state_off = "OFF".to_string();
        }
    };
    let relay = harness
        .thing("r1", ThingType::Switch, Some("org-acme"), configure)
        .await;

    harness.router.route("org/Acme/relay", "ON").await.expect("on");
    assert_eq!(harness.reload(&relay).await.as_switch().map(|s| s.state), Some(true));

    harness.router.route("org/Acme/relay", "maybe").await.expect("unknown");
    assert_eq!(harness.reload(&relay).await.as_switch().map(|s| s.state), Some(true));

    harness.router.route("org/Acme/relay", "OFF").await.expect("off");
    assert_eq!(harness.reload(&relay).await.as_switch().map(|s| s.state), Some(false));

    assert_eq!(harness.sink.writes(), vec!["ts:Acme:r1=1", "ts:Acme:r1=0"]);
}

#[tokio::test]
async fn device_availability_and_telemetry() {
    let harness = Harness::new();
    let device = harness
        .thing("d1", ThingType::Device, Some("org-acme"), |thing| {
            thing.availability.topic = "available".to_string();
            thing.telemetry.topic = "telemetry".to_string();
        })
        .await;

    harness.router.route("org/Acme/available", "yes").await.expect("availability");
    assert!(harness.reload(&device).await.last_seen > 0);

    harness
        .router
        .route("org/Acme/telemetry", r#"{"uptime":12}"#)
        .await
        .expect("telemetry");
    assert_eq!(
        harness.reload(&device).await.telemetry.payload.as_deref(),
        Some(r#"{"uptime":12}"#)
    );
}

#[tokio::test]
async fn location_updates_are_monotonic() {
    let harness = Harness::new();
    let device = harness
        .thing("d1", ThingType::Device, Some("org-acme"), |thing| {
            if let ThingKind::Device(data) = &mut thing.kind {
                data.location_source.topic = "gps".to_string();
                data.location_source.lat_template = "lat".to_string();
                data.location_source.lng_template = "lng".to_string();
                data.location_source.ts_template = "ts".to_string();
                data.location_source.tracking = true;
            }
        })
        .await;

    let router = &harness.router;
    router
        .route("org/Acme/gps", r#"{"lat":1.5,"lng":2.5,"ts":100}"#)
        .await
        .expect("first");
    router
        .route("org/Acme/gps", r#"{"lat":9.0,"lng":9.0,"ts":50}"#)
        .await
        .expect("older");

    let location = harness
        .reload(&device)
        .await
        .as_device()
        .and_then(|d| d.location)
        .expect("location");
    assert_eq!(location.ts, 100);
    assert_eq!(location.lat, 1.5);

    router
        .route("org/Acme/gps", r#"{"lat":3.5,"lng":4.5,"ts":150}"#)
        .await
        .expect("newer");
    let location = harness
        .reload(&device)
        .await
        .as_device()
        .and_then(|d| d.location)
        .expect("location");
    assert_eq!(location.ts, 150);
    assert_eq!(harness.sink.writes().len(), 3);
}

#[tokio::test]
async fn location_without_templates_is_skipped() {
    let harness = Harness::new();
    let device = harness
        .thing("d1", ThingType::Device, Some("org-acme"), |thing| {
            if let ThingKind::Device(data) = &mut thing.kind {
                data.location_source.topic = "gps".to_string();
                data.location_source.tracking = true;
            }
        })
        .await;

    harness
        .router
        .route("org/Acme/gps", r#"{"lat":1,"lng":2}"#)
        .await
        .expect("route");

    let stored = harness.reload(&device).await;
    assert!(stored.as_device().and_then(|d| d.location).is_none());
    assert!(harness.sink.writes().is_empty());
}

#[tokio::test]
async fn sink_failure_of_one_thing_does_not_stop_others() {
    let harness = Harness::with_sink(RecordingSink::failing_for("s1"));
    harness
        .thing("s1", ThingType::Sensor, Some("org-acme"), measured_on("temp"))
        .await;
    let healthy = harness
        .thing("s2", ThingType::Sensor, Some("org-acme"), measured_on("temp"))
        .await;

    harness.router.route("org/Acme/temp", "8").await.expect("route");

    assert_eq!(harness.sink.writes(), vec!["ts:Acme:s2=8"]);
    assert_eq!(
        harness.reload(&healthy).await.as_sensor().and_then(|s| s.value.as_deref()),
        Some("8")
    );
}
