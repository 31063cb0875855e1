use super::*;
use crate::peer::protocol::{KeyRequest, SetRequest};
use crate::peer::{PeerClient, PeerPicker};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Origin backed by the fixed score table, counting loads per key.
fn score_loader(counts: Arc<Mutex<HashMap<String, usize>>>) -> Arc<dyn Loader> {
    loader_fn(move |key: String| {
        let counts = Arc::clone(&counts);
        async move {
            *counts.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
            let db: HashMap<&str, &str> =
                [("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into();
            match db.get(key.as_str()) {
                Some(value) => Ok(value.as_bytes().to_vec()),
                None => Err(anyhow::anyhow!("{} not found in origin", key)),
            }
        }
    })
}

// ============================================================
// FAKE PEERS
// ============================================================

#[derive(Default)]
struct FakePeerState {
    stores: Vec<SetRequest>,
    removes: Vec<KeyRequest>,
}

struct FakePeer {
    addr: String,
    /// Value served on fetch; `None` makes every call fail.
    value: Option<Vec<u8>>,
    state: Mutex<FakePeerState>,
}

impl FakePeer {
    fn serving(addr: &str, value: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.to_string(),
            value: Some(value.to_vec()),
            state: Mutex::default(),
        })
    }

    fn down(addr: &str) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.to_string(),
            value: None,
            state: Mutex::default(),
        })
    }

    fn unavailable(&self) -> CacheError {
        CacheError::PeerUnavailable {
            addr: self.addr.clone(),
            reason: "connection refused".to_string(),
        }
    }

    fn stores(&self) -> Vec<SetRequest> {
        self.state.lock().unwrap().stores.clone()
    }

    fn removes(&self) -> Vec<KeyRequest> {
        self.state.lock().unwrap().removes.clone()
    }
}

#[async_trait]
impl PeerClient for FakePeer {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn fetch(&self, _req: &KeyRequest) -> crate::error::Result<ByteView> {
        match &self.value {
            Some(value) => Ok(ByteView::from(value.clone())),
            None => Err(self.unavailable()),
        }
    }

    async fn store(&self, req: &SetRequest) -> crate::error::Result<()> {
        if self.value.is_none() {
            return Err(self.unavailable());
        }
        self.state.lock().unwrap().stores.push(req.clone());
        Ok(())
    }

    async fn remove(&self, req: &KeyRequest) -> crate::error::Result<()> {
        if self.value.is_none() {
            return Err(self.unavailable());
        }
        self.state.lock().unwrap().removes.push(req.clone());
        Ok(())
    }
}

struct FakePicker {
    /// key -> owning peer; unlisted keys are local.
    owners: HashMap<String, Arc<FakePeer>>,
    all: Vec<Arc<FakePeer>>,
}

impl PeerPicker for FakePicker {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>> {
        self.owners
            .get(key)
            .map(|peer| Arc::clone(peer) as Arc<dyn PeerClient>)
    }

    fn get_all(&self) -> Vec<Arc<dyn PeerClient>> {
        self.all
            .iter()
            .map(|peer| Arc::clone(peer) as Arc<dyn PeerClient>)
            .collect()
    }
}

// ============================================================
// LOAD PATH
// ============================================================

#[tokio::test]
async fn test_query_hits_origin_once_then_cache() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(counts.lock().unwrap()["Tom"], 1);

    // Second query is served from the main tier.
    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(counts.lock().unwrap()["Tom"], 1);

    let err = group.query("unknown").await.unwrap_err();
    assert!(matches!(err, CacheError::OriginMiss { .. }));
}

#[tokio::test]
async fn test_empty_key_resolves_to_empty_view() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    let view = group.query("").await.unwrap();
    assert!(view.is_empty());
    assert!(counts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_queries_invoke_origin_once() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let loads = Arc::clone(&counts);
    let loader = loader_fn(move |key: String| {
        let counts = Arc::clone(&loads);
        async move {
            *counts.lock().unwrap().entry(key).or_insert(0) += 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(b"value".to_vec())
        }
    });

    let registry = Registry::new();
    let group = registry.new_group("flight", 2048, loader);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let group = Arc::clone(&group);
        handles.push(tokio::spawn(async move { group.query("slow").await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().to_vec(), b"value");
    }
    assert_eq!(counts.lock().unwrap()["slow"], 1);
}

#[tokio::test]
async fn test_query_fetches_from_owning_peer_and_mirrors() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::serving("10.0.0.2:7000", b"remote-value");
    let picker = FakePicker {
        owners: [("Tom".to_string(), Arc::clone(&owner))].into(),
        all: vec![Arc::clone(&owner)],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"remote-value");

    // The origin stayed cold and the mirror tier took the copy.
    assert!(counts.lock().unwrap().is_empty());
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!(main_bytes, 0);
    assert_eq!(hot_bytes, ("Tom".len() + b"remote-value".len()) as i64);

    // Next query is a hot-tier hit, no second peer call needed.
    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"remote-value");
}

#[tokio::test]
async fn test_query_falls_back_to_origin_when_peer_fails() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::down("10.0.0.2:7000");
    let picker = FakePicker {
        owners: [("Tom".to_string(), Arc::clone(&owner))].into(),
        all: vec![owner],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(counts.lock().unwrap()["Tom"], 1);
}

// ============================================================
// WRITE PATH
// ============================================================

#[tokio::test]
async fn test_set_then_query_on_owning_node() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    group.set("Tom", b"999".to_vec(), None, false).await.unwrap();

    let view = group.query("Tom").await.unwrap();
    assert_eq!(view.to_vec(), b"999");
    assert!(counts.lock().unwrap().is_empty(), "origin must stay cold");
}

#[tokio::test]
async fn test_set_rejects_empty_key() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(counts));

    let err = group.set("", b"x".to_vec(), None, false).await.unwrap_err();
    assert_eq!(err, CacheError::EmptyKey);
}

#[tokio::test]
async fn test_set_forwards_to_owner_and_optionally_mirrors() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::serving("10.0.0.2:7000", b"unused");
    let picker = FakePicker {
        owners: [("Tom".to_string(), Arc::clone(&owner))].into(),
        all: vec![Arc::clone(&owner)],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("scores", 2048, score_loader(counts));

    group.set("Tom", b"631".to_vec(), None, false).await.unwrap();
    let stores = owner.stores();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].group, "scores");
    assert_eq!(stores[0].key, "Tom");
    assert_eq!(stores[0].value, b"631");
    assert_eq!(stores[0].expire, 0);
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!((main_bytes, hot_bytes), (0, 0), "no local copy without mirror");

    group.set("Tom", b"632".to_vec(), None, true).await.unwrap();
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!(main_bytes, 0);
    assert_eq!(hot_bytes, ("Tom".len() + b"632".len()) as i64);
}

#[tokio::test]
async fn test_set_with_expiry_falls_back_to_origin_after_ttl() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    group
        .set(
            "Tom",
            b"999".to_vec(),
            Some(std::time::SystemTime::now() + Duration::from_millis(50)),
            false,
        )
        .await
        .unwrap();
    assert_eq!(group.query("Tom").await.unwrap().to_vec(), b"999");
    assert!(counts.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(group.query("Tom").await.unwrap().to_vec(), b"630");
    assert_eq!(counts.lock().unwrap()["Tom"], 1);
}

// ============================================================
// REMOVE PATH
// ============================================================

#[tokio::test]
async fn test_remove_is_idempotent() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));

    group.set("Tom", b"999".to_vec(), None, false).await.unwrap();
    group.remove("Tom").await.unwrap();
    group.remove("Tom").await.unwrap();

    // Gone locally, so the next query goes back to the origin.
    assert_eq!(group.query("Tom").await.unwrap().to_vec(), b"630");
    assert_eq!(counts.lock().unwrap()["Tom"], 1);
}

#[tokio::test]
async fn test_remove_rejects_empty_key() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(counts));

    let err = group.remove("").await.unwrap_err();
    assert_eq!(err, CacheError::EmptyKey);
}

#[tokio::test]
async fn test_remove_fans_out_to_all_other_peers() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::serving("10.0.0.2:7000", b"v");
    let second = FakePeer::serving("10.0.0.3:7000", b"v");
    let third = FakePeer::serving("10.0.0.4:7000", b"v");
    let picker = FakePicker {
        owners: [("Tom".to_string(), Arc::clone(&owner))].into(),
        all: vec![Arc::clone(&owner), Arc::clone(&second), Arc::clone(&third)],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("scores", 2048, score_loader(counts));

    group.remove("Tom").await.unwrap();

    assert_eq!(owner.removes().len(), 1, "owner deleted first");
    assert_eq!(second.removes().len(), 1);
    assert_eq!(third.removes().len(), 1);
}

#[tokio::test]
async fn test_remove_aggregates_fanout_failures() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::serving("10.0.0.2:7000", b"v");
    let flaky = FakePeer::down("10.0.0.3:7000");
    let picker = FakePicker {
        owners: [("Tom".to_string(), Arc::clone(&owner))].into(),
        all: vec![Arc::clone(&owner), Arc::clone(&flaky)],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));
    group.set("Tom", b"999".to_vec(), None, true).await.unwrap();

    let err = group.remove("Tom").await.unwrap_err();
    match err {
        CacheError::FanOut(failures) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0], CacheError::PeerUnavailable { .. }));
        }
        other => panic!("expected fan-out composite, got {}", other),
    }

    // The local deletion happened despite the peer failure.
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!((main_bytes, hot_bytes), (0, 0));
}

// ============================================================
// BYTE BUDGET
// ============================================================

#[tokio::test]
async fn test_budget_holds_after_every_write() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let budget = 64;
    let group = registry.new_group("small", budget, score_loader(counts));

    for i in 0..10 {
        let key = format!("key-{}", i);
        group
            .set(&key, vec![b'x'; 20], None, false)
            .await
            .unwrap();
        let (main_bytes, hot_bytes) = group.tier_bytes();
        assert!(
            main_bytes + hot_bytes <= budget,
            "budget exceeded after write {}: {} + {}",
            i,
            main_bytes,
            hot_bytes
        );
    }
    assert!(group.tier_bytes().0 > 0, "most recent entries are retained");
}

#[tokio::test]
async fn test_budget_prefers_evicting_oversized_hot_tier() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let owner = FakePeer::serving("10.0.0.2:7000", b"0123456789");
    let picker = FakePicker {
        owners: [
            ("remote-a".to_string(), Arc::clone(&owner)),
            ("remote-b".to_string(), Arc::clone(&owner)),
        ]
        .into(),
        all: vec![Arc::clone(&owner)],
    };

    let registry = Registry::new();
    registry.register_picker(Arc::new(picker));
    let group = registry.new_group("tiers", 40, score_loader(counts));

    // Two mirrored fetches of 18 bytes each fit the budget...
    group.query("remote-a").await.unwrap();
    group.query("remote-b").await.unwrap();
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!(main_bytes, 0);
    assert_eq!(hot_bytes, 36);

    // ...and an authoritative write pushes the total over 40: the hot tier
    // gives way because it dwarfs main/8.
    group.set("local", vec![b'y'; 10], None, false).await.unwrap();
    let (main_bytes, hot_bytes) = group.tier_bytes();
    assert_eq!(main_bytes, 15);
    assert!(main_bytes + hot_bytes <= 40);
    assert!(hot_bytes < 36, "hot tier shrank to fit the budget");
}

// ============================================================
// REGISTRY
// ============================================================

#[tokio::test]
#[should_panic(expected = "duplicate registration of group")]
async fn test_duplicate_group_name_panics() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    registry.new_group("scores", 2048, score_loader(Arc::clone(&counts)));
    registry.new_group("scores", 2048, score_loader(counts));
}

#[tokio::test]
#[should_panic(expected = "peer picker registered more than once")]
async fn test_double_picker_registration_panics() {
    let registry = Registry::new();
    registry.register_picker(Arc::new(crate::peer::NoPeers));
    registry.register_picker(Arc::new(crate::peer::NoPeers));
}

#[tokio::test]
async fn test_group_lookup_by_name() {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();
    let group = registry.new_group("scores", 2048, score_loader(counts));

    let found = registry.get_group("scores").expect("group registered");
    assert_eq!(found.name(), group.name());
    assert!(registry.get_group("absent").is_none());
}
