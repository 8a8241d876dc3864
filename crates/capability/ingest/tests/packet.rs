use domain::{DevicePacket, Org, SensorReading, ThingFilter, ThingType};
use piot_broker::{MemoryBrokerClient, ThingPublisher};
use piot_ingest::{DebounceCache, IngestError, PacketIngestor};
use piot_storage::{InMemoryOrgStore, InMemoryThingStore, ThingStore};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    things: Arc<InMemoryThingStore>,
    orgs: Arc<InMemoryOrgStore>,
    broker: Arc<MemoryBrokerClient>,
}

impl Harness {
    fn new() -> Self {
        let orgs = Arc::new(InMemoryOrgStore::new());
        orgs.insert(Org::new("org-1", "Acme")).expect("org");
        Self {
            things: Arc::new(InMemoryThingStore::new()),
            orgs,
            broker: Arc::new(MemoryBrokerClient::new()),
        }
    }

    /// 每次调用都使用新的防抖缓存。
    fn ingestor(&self, interval: Duration) -> PacketIngestor {
        let publisher = ThingPublisher::new(self.broker.clone(), self.orgs.clone());
        PacketIngestor::new(
            self.things.clone(),
            publisher,
            Arc::new(DebounceCache::new(interval)),
        )
    }

    async fn thing(&self, name: &str) -> domain::Thing {
        self.things
            .find(name)
            .await
            .expect("query")
            .unwrap_or_else(|| panic!("missing thing {name}"))
    }

    async fn count(&self) -> usize {
        self.things
            .list(&ThingFilter::default())
            .await
            .expect("list")
            .len()
    }

    async fn assign(&self, name: &str, enabled: bool) {
        let mut thing = self.thing(name).await;
        thing.org_id = Some("org-1".to_string());
        thing.enabled = enabled;
        self.things.save(&thing).await.expect("save");
    }
}

fn packet(device: &str, readings: Vec<SensorReading>) -> DevicePacket {
    DevicePacket {
        device_id: device.to_string(),
        readings,
        ..DevicePacket::default()
    }
}

fn temperature(address: &str, value: f32) -> SensorReading {
    SensorReading {
        address: address.to_string(),
        temperature: Some(value),
        ..SensorReading::default()
    }
}

#[tokio::test]
async fn first_packet_registers_device_and_sensor() {
    let harness = Harness::new();
    let ingestor = harness.ingestor(Duration::from_secs(1));

    ingestor
        .process(&packet("d1", vec![temperature("s1", 4.5)]))
        .await
        .expect("process");

    let device = harness.thing("d1").await;
    assert_eq!(device.thing_type(), ThingType::Device);
    assert_eq!(device.piot_id.as_deref(), Some("d1"));
    assert_eq!(device.availability.topic, "available");
    assert_eq!(device.availability.yes, "yes");
    assert_eq!(device.availability.no, "no");

    let sensor = harness.thing("Ts1").await;
    let data = sensor.as_sensor().expect("sensor");
    assert_eq!(data.class, "temperature");
    assert_eq!(data.measurement_topic, "value");
    assert_eq!(data.unit, "C");
    assert_eq!(sensor.parent_id.as_deref(), Some(device.id.as_str()));

    // 未分配组织时不发布
    assert!(harness.broker.published().is_empty());
}

#[tokio::test]
async fn empty_device_is_rejected_without_side_effects() {
    let harness = Harness::new();
    let ingestor = harness.ingestor(Duration::from_secs(1));

    let err = ingestor
        .process(&packet("", vec![temperature("s1", 1.0)]))
        .await
        .expect_err("empty device");
    assert!(matches!(err, IngestError::InvalidPacket(_)));
    assert_eq!(harness.count().await, 0);
}

#[tokio::test]
async fn repeated_packet_inside_interval_is_rate_limited() {
    let harness = Harness::new();
    let ingestor = harness.ingestor(Duration::from_millis(200));

    ingestor
        .process(&packet("d1", vec![temperature("s1", 1.0)]))
        .await
        .expect("first");
    let err = ingestor
        .process(&packet("d1", vec![temperature("s2", 2.0)]))
        .await
        .expect_err("second");
    assert!(matches!(err, IngestError::RateLimited(_)));
    assert!(harness.things.find("Ts2").await.expect("query").is_none());
    assert_eq!(harness.count().await, 2);

    tokio::time::sleep(Duration::from_millis(250)).await;
    ingestor
        .process(&packet("d1", vec![temperature("s2", 2.0)]))
        .await
        .expect("third");
    assert!(harness.things.find("Ts2").await.expect("query").is_some());
}

#[tokio::test]
async fn registration_is_idempotent() {
    let harness = Harness::new();

    for _ in 0..2 {
        harness
            .ingestor(Duration::from_secs(1))
            .process(&packet("d1", vec![temperature("s1", 1.0)]))
            .await
            .expect("process");
    }

    assert_eq!(harness.count().await, 2);
}

#[tokio::test]
async fn classes_on_one_address_become_distinct_sensors() {
    let harness = Harness::new();
    let reading = SensorReading {
        address: "s1".to_string(),
        temperature: Some(21.5),
        humidity: Some(40.0),
        pressure: None,
    };

    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![reading]))
        .await
        .expect("process");

    let device = harness.thing("d1").await;
    let temperature = harness.thing("Ts1").await;
    let humidity = harness.thing("Hs1").await;
    assert_ne!(temperature.id, humidity.id);
    assert_eq!(humidity.as_sensor().expect("sensor").class, "humidity");
    assert_eq!(humidity.as_sensor().expect("sensor").unit, "%");
    assert_eq!(temperature.parent_id.as_deref(), Some(device.id.as_str()));
    assert_eq!(humidity.parent_id.as_deref(), Some(device.id.as_str()));
}

#[tokio::test]
async fn sensor_moves_to_last_reporting_device() {
    let harness = Harness::new();
    let ingestor = harness.ingestor(Duration::from_secs(1));

    ingestor
        .process(&packet("dA", vec![temperature("s1", 1.0)]))
        .await
        .expect("device A");
    ingestor
        .process(&packet("dB", vec![temperature("s1", 2.0)]))
        .await
        .expect("device B");

    let device_b = harness.thing("dB").await;
    let sensor = harness.thing("Ts1").await;
    assert_eq!(sensor.parent_id.as_deref(), Some(device_b.id.as_str()));
}

#[tokio::test]
async fn assigned_things_publish_state_and_values() {
    let harness = Harness::new();
    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 1.0)]))
        .await
        .expect("register");
    harness.assign("d1", true).await;
    harness.assign("Ts1", true).await;

    let mut second = packet("d1", vec![temperature("s1", 4.5)]);
    second.ip = Some("10.0.0.7".to_string());
    second.wifi_ssid = Some("home".to_string());
    second.wifi_strength = Some(-61.5);
    harness
        .ingestor(Duration::from_secs(1))
        .process(&second)
        .await
        .expect("publish");

    let expected: Vec<(String, String)> = [
        ("org/Acme/d1/available", "yes"),
        ("org/Acme/d1/net/ip", "10.0.0.7"),
        ("org/Acme/d1/net/wifi/ssid", "home"),
        ("org/Acme/d1/net/wifi/strength", "-61.500000"),
        ("org/Acme/Ts1/available", "yes"),
        ("org/Acme/Ts1/value", "4.5"),
        ("org/Acme/Ts1/value/unit", "C"),
    ]
    .into_iter()
    .map(|(topic, value)| (topic.to_string(), value.to_string()))
    .collect();
    assert_eq!(harness.broker.published(), expected);
}

#[tokio::test]
async fn unassigned_sensor_is_bookkept_but_not_published() {
    let harness = Harness::new();
    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 1.0)]))
        .await
        .expect("register");
    harness.assign("d1", true).await;

    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 2.0), temperature("s2", 3.0)]))
        .await
        .expect("process");

    let topics: Vec<String> = harness
        .broker
        .published()
        .into_iter()
        .map(|(topic, _)| topic)
        .collect();
    assert_eq!(topics, vec!["org/Acme/d1/available".to_string()]);
    assert!(harness.things.find("Ts2").await.expect("query").is_some());
}

#[tokio::test]
async fn disabled_device_skips_all_publication() {
    let harness = Harness::new();
    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 1.0)]))
        .await
        .expect("register");
    harness.assign("d1", false).await;
    harness.assign("Ts1", true).await;

    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 2.0), temperature("s3", 3.0)]))
        .await
        .expect("process");

    assert!(harness.broker.published().is_empty());
    assert!(harness.things.find("Ts3").await.expect("query").is_some());
}

#[tokio::test]
async fn sensor_name_cannot_report_as_device() {
    let harness = Harness::new();
    harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d1", vec![temperature("s1", 1.0)]))
        .await
        .expect("register");

    let err = harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("Ts1", vec![temperature("x9", 2.0)]))
        .await
        .expect_err("sensor as device");
    assert!(matches!(err, IngestError::Registry(_)));
    assert_eq!(harness.thing("Ts1").await.thing_type(), ThingType::Sensor);
    assert!(harness.things.find("Tx9").await.expect("query").is_none());
}

#[tokio::test]
async fn switch_name_cannot_report_as_device() {
    let harness = Harness::new();
    harness
        .things
        .register("d7", ThingType::Switch, None)
        .await
        .expect("switch");

    let err = harness
        .ingestor(Duration::from_secs(1))
        .process(&packet("d7", vec![temperature("s1", 1.0)]))
        .await
        .expect_err("switch as device");
    assert!(matches!(err, IngestError::Registry(_)));
    assert_eq!(harness.thing("d7").await.thing_type(), ThingType::Switch);
    assert!(harness.things.find("Ts1").await.expect("query").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_packets_for_one_device_pass_once() {
    let harness = Harness::new();
    let ingestor = Arc::new(harness.ingestor(Duration::from_secs(30)));

    let mut tasks = tokio::task::JoinSet::new();
    for index in 0..16 {
        let ingestor = ingestor.clone();
        tasks.spawn(async move {
            ingestor
                .process(&packet("d1", vec![temperature(&format!("s{index}"), 1.0)]))
                .await
        });
    }

    let mut accepted = 0;
    let mut limited = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.expect("join") {
            Ok(()) => accepted += 1,
            Err(IngestError::RateLimited(device)) => {
                assert_eq!(device, "d1");
                limited += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(limited, 15);
    // 设备加一个传感器
    assert_eq!(harness.count().await, 2);
}
