//! Engine behaviour against in-memory collaborators.

use std::{
  collections::BTreeMap,
  convert::Infallible,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error,
  engine::{AlertEngine, CheckOutcome, CheckReport, TEST_MESSAGE, message_for},
  episode::{AlertEpisode, EpisodeStatus, NewEpisode},
  ledger::{AlertLedger, resolve_all_above},
  product::{Product, ProductId},
  source::{AlertConfig, ProductSource, StaticProfile},
  transport::Transport,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemCatalog {
  products: Mutex<BTreeMap<ProductId, Product>>,
}

impl MemCatalog {
  fn set_stock(&self, id: i64, name: &str, stock: u32) {
    let id = ProductId(id);
    self
      .products
      .lock()
      .unwrap()
      .insert(id, Product { id, name: name.into(), stock });
  }

  fn remove(&self, id: i64) {
    self.products.lock().unwrap().remove(&ProductId(id));
  }
}

impl ProductSource for MemCatalog {
  type Error = Infallible;

  async fn list_products_at_or_below(&self, threshold: u32) -> Result<Vec<Product>, Infallible> {
    Ok(
      self
        .products
        .lock()
        .unwrap()
        .values()
        .filter(|p| p.is_low(threshold))
        .cloned()
        .collect(),
    )
  }

  async fn get_current_stock(&self, product_id: ProductId) -> Result<Option<u32>, Infallible> {
    Ok(self.products.lock().unwrap().get(&product_id).map(|p| p.stock))
  }
}

#[derive(Debug, thiserror::Error)]
#[error("ledger unreachable")]
struct Unreachable;

#[derive(Default)]
struct MemLedger {
  episodes:    Mutex<Vec<AlertEpisode>>,
  unreachable: AtomicBool,
  /// Reject every insert as if another writer got there first.
  conflicting: AtomicBool,
  /// Go unreachable after this many successful inserts.
  outage_after: Mutex<Option<usize>>,
}

impl MemLedger {
  fn check(&self) -> Result<(), Unreachable> {
    if self.unreachable.load(Ordering::SeqCst) { Err(Unreachable) } else { Ok(()) }
  }

  fn all(&self) -> Vec<AlertEpisode> { self.episodes.lock().unwrap().clone() }

  fn for_key(&self, id: i64, threshold: u32) -> Vec<AlertEpisode> {
    self
      .all()
      .into_iter()
      .filter(|e| e.product_id == ProductId(id) && e.threshold == threshold)
      .collect()
  }

  fn push_open(&self, id: i64, threshold: u32) {
    self.episodes.lock().unwrap().push(AlertEpisode {
      episode_id:    Uuid::new_v4(),
      product_id:    ProductId(id),
      threshold,
      stock_at_open: 0,
      target:        "+15550100".into(),
      opened_at:     Utc::now(),
      status:        EpisodeStatus::Open,
    });
  }
}

impl AlertLedger for MemLedger {
  type Error = Unreachable;

  async fn find_open_episode(
    &self,
    product_id: ProductId,
    threshold: u32,
  ) -> Result<Option<AlertEpisode>, Unreachable> {
    self.check()?;
    Ok(
      self
        .episodes
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.product_id == product_id && e.threshold == threshold && e.is_open())
        .cloned(),
    )
  }

  async fn open_episode(&self, input: NewEpisode) -> Result<Option<AlertEpisode>, Unreachable> {
    self.check()?;
    if self.conflicting.load(Ordering::SeqCst) {
      return Ok(None);
    }
    let mut episodes = self.episodes.lock().unwrap();
    if episodes
      .iter()
      .any(|e| e.product_id == input.product_id && e.threshold == input.threshold && e.is_open())
    {
      return Ok(None);
    }
    let episode = AlertEpisode {
      episode_id:    Uuid::new_v4(),
      product_id:    input.product_id,
      threshold:     input.threshold,
      stock_at_open: input.stock_at_open,
      target:        input.target,
      opened_at:     Utc::now(),
      status:        EpisodeStatus::Open,
    };
    episodes.push(episode.clone());
    let mut outage_after = self.outage_after.lock().unwrap();
    if let Some(n) = outage_after.as_mut() {
      *n = n.saturating_sub(1);
      if *n == 0 {
        self.unreachable.store(true, Ordering::SeqCst);
      }
    }
    Ok(Some(episode))
  }

  async fn open_episodes(&self, threshold: u32) -> Result<Vec<AlertEpisode>, Unreachable> {
    self.check()?;
    Ok(
      self
        .episodes
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.threshold == threshold && e.is_open())
        .cloned()
        .collect(),
    )
  }

  async fn resolve_episodes(&self, ids: Vec<Uuid>) -> Result<usize, Unreachable> {
    self.check()?;
    let now = Utc::now();
    let mut count = 0;
    for e in self.episodes.lock().unwrap().iter_mut() {
      if ids.contains(&e.episode_id) && e.is_open() {
        e.status = EpisodeStatus::Resolved { at: now };
        count += 1;
      }
    }
    Ok(count)
  }

  async fn recent(&self, limit: usize) -> Result<Vec<AlertEpisode>, Unreachable> {
    self.check()?;
    Ok(self.all().into_iter().rev().take(limit).collect())
  }

  async fn episodes_for_product(
    &self,
    product_id: ProductId,
  ) -> Result<Vec<AlertEpisode>, Unreachable> {
    self.check()?;
    Ok(self.all().into_iter().rev().filter(|e| e.product_id == product_id).collect())
  }
}

struct RecordingTransport {
  sent:   Mutex<Vec<(String, String)>>,
  accept: AtomicBool,
  delay:  Duration,
}

impl RecordingTransport {
  fn new() -> Self {
    Self { sent: Mutex::default(), accept: AtomicBool::new(true), delay: Duration::ZERO }
  }

  fn slow(delay: Duration) -> Self { Self { delay, ..Self::new() } }

  fn count(&self) -> usize { self.sent.lock().unwrap().len() }
}

impl Transport for RecordingTransport {
  async fn send(&self, target: &str, message: &str) -> bool {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.sent.lock().unwrap().push((target.to_owned(), message.to_owned()));
    self.accept.load(Ordering::SeqCst)
  }
}

struct Harness {
  catalog:   Arc<MemCatalog>,
  ledger:    Arc<MemLedger>,
  transport: Arc<RecordingTransport>,
  engine:    AlertEngine<MemLedger, MemCatalog, RecordingTransport>,
}

fn harness_with(transport: RecordingTransport) -> Harness {
  let catalog = Arc::new(MemCatalog::default());
  let ledger = Arc::new(MemLedger::default());
  let transport = Arc::new(transport);
  let engine = AlertEngine::new(ledger.clone(), catalog.clone(), transport.clone());
  Harness { catalog, ledger, transport, engine }
}

fn harness() -> Harness { harness_with(RecordingTransport::new()) }

const TARGET: &str = "+15550100";

// ─── Suppression ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_checks_send_once_per_episode() {
  let h = harness();
  h.catalog.set_stock(1, "Gaming Chair", 3);

  let first = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(first.sent, 1);

  for _ in 0..4 {
    let again = h.engine.run_check(TARGET, 10).await.unwrap();
    assert_eq!(again.sent, 0);
    assert_eq!(again.suppressed, 1);
  }

  assert_eq!(h.transport.count(), 1);
  assert_eq!(h.ledger.for_key(1, 10).len(), 1);
}

#[tokio::test]
async fn restock_then_drop_opens_a_second_episode() {
  let h = harness();
  h.catalog.set_stock(1, "Gaming Chair", 3);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report, CheckReport { sent: 1, ..Default::default() });
  let open = h.ledger.for_key(1, 10);
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].stock_at_open, 3);
  assert!(open[0].is_open());

  h.catalog.set_stock(1, "Gaming Chair", 15);
  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report, CheckReport { resolved: 1, ..Default::default() });

  h.catalog.set_stock(1, "Gaming Chair", 2);
  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report.sent, 1);

  let episodes = h.ledger.for_key(1, 10);
  assert_eq!(episodes.len(), 2);
  assert!(episodes[0].status.is_resolved());
  assert!(episodes[0].status.resolved_at().is_some());
  assert_eq!(episodes[0].stock_at_open, 3);
  assert!(episodes[1].is_open());
  assert_eq!(episodes[1].stock_at_open, 2);
  assert_eq!(h.transport.count(), 2);
}

#[tokio::test]
async fn thresholds_are_independent_streams() {
  let h = harness();
  h.catalog.set_stock(1, "Office Desk", 4);

  assert_eq!(h.engine.run_check(TARGET, 10).await.unwrap().sent, 1);
  assert_eq!(h.engine.run_check(TARGET, 5).await.unwrap().sent, 1);
  assert_eq!(h.engine.run_check(TARGET, 10).await.unwrap().sent, 0);

  // Stock 7 is above 5 but still low for 10.
  h.catalog.set_stock(1, "Office Desk", 7);
  let at_five = h.engine.run_check(TARGET, 5).await.unwrap();
  assert_eq!(at_five.resolved, 1);
  assert_eq!(h.ledger.for_key(1, 10).iter().filter(|e| e.is_open()).count(), 1);
  assert_eq!(h.transport.count(), 2);
}

#[tokio::test]
async fn stock_exactly_at_threshold_and_zero_are_low() {
  let h = harness();
  h.catalog.set_stock(1, "Coffee Mug", 10);
  h.catalog.set_stock(2, "Winter Jacket", 0);
  h.catalog.set_stock(3, "Nike Air Max", 11);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report.sent, 2);
  assert_eq!(h.ledger.for_key(2, 10)[0].stock_at_open, 0);
  assert!(h.ledger.for_key(3, 10).is_empty());
}

#[tokio::test]
async fn duplicate_open_episodes_still_suppress() {
  let h = harness();
  h.catalog.set_stock(1, "Coffee Mug", 1);
  h.ledger.push_open(1, 10);
  h.ledger.push_open(1, 10);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report.suppressed, 1);
  assert_eq!(h.transport.count(), 0);
}

// ─── Transport failure ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_send_opens_nothing_and_is_retried() {
  let h = harness();
  h.catalog.set_stock(1, "Bluetooth Speaker", 0);
  h.transport.accept.store(false, Ordering::SeqCst);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report, CheckReport { failed: 1, ..Default::default() });
  assert!(h.ledger.all().is_empty());

  h.transport.accept.store(true, Ordering::SeqCst);
  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report.sent, 1);
  assert_eq!(h.transport.count(), 2);
  assert_eq!(h.ledger.all().len(), 1);
}

#[tokio::test]
async fn rejected_insert_after_send_counts_as_duplicated() {
  let h = harness();
  h.catalog.set_stock(1, "Coffee Mug", 1);
  h.ledger.conflicting.store(true, Ordering::SeqCst);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report, CheckReport { duplicated: 1, ..Default::default() });
  assert_eq!(h.transport.count(), 1);
}

// ─── Resolution ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_is_idempotent() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);
  h.catalog.set_stock(2, "B", 2);
  h.engine.run_check(TARGET, 10).await.unwrap();

  h.catalog.set_stock(1, "A", 50);
  h.catalog.set_stock(2, "B", 50);

  let first = resolve_all_above(&*h.ledger, &*h.catalog, 10).await.unwrap();
  let second = resolve_all_above(&*h.ledger, &*h.catalog, 10).await.unwrap();
  assert_eq!(first, 2);
  assert_eq!(second, 0);
}

#[tokio::test]
async fn resolve_keeps_episodes_of_removed_products_open() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);
  h.engine.run_check(TARGET, 10).await.unwrap();
  h.catalog.remove(1);

  let report = h.engine.run_check(TARGET, 10).await.unwrap();
  assert_eq!(report.resolved, 0);
  assert!(h.ledger.all()[0].is_open());
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_target_is_a_configuration_error() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);

  let err = h.engine.run_check("  ", 10).await.unwrap_err();
  assert!(err.cause.is_configuration());
  assert_eq!(err.completed, CheckReport::default());
  assert_eq!(h.transport.count(), 0);
  assert!(h.ledger.all().is_empty());
}

#[tokio::test]
async fn storage_failure_surfaces_instead_of_zero_sent() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);
  h.ledger.unreachable.store(true, Ordering::SeqCst);

  let err = h.engine.run_check(TARGET, 10).await.unwrap_err();
  assert!(matches!(err.cause, Error::Storage(_)));
  assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn partial_progress_is_reported_on_failure() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);
  h.catalog.set_stock(2, "B", 2);
  h.catalog.set_stock(3, "C", 3);
  h.catalog.set_stock(4, "D", 50);
  h.ledger.push_open(4, 10);
  *h.ledger.outage_after.lock().unwrap() = Some(1);

  let err = h.engine.run_check(TARGET, 10).await.unwrap_err();
  assert!(matches!(err.cause, Error::Storage(_)));
  assert_eq!(err.completed, CheckReport { sent: 1, resolved: 1, ..Default::default() });
  assert!(err.to_string().contains("sent=1 resolved=1"));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_send_once() {
  let h = Arc::new(harness_with(RecordingTransport::slow(Duration::from_millis(30))));
  h.catalog.set_stock(1, "Gaming Chair", 3);
  h.catalog.set_stock(2, "Office Desk", 0);

  let runs: Vec<_> = (0..8)
    .map(|_| {
      let h = h.clone();
      tokio::spawn(async move { h.engine.run_check(TARGET, 10).await.unwrap() })
    })
    .collect();

  let mut sent = 0;
  for run in runs {
    sent += run.await.unwrap().sent;
  }

  assert_eq!(sent, 2);
  assert_eq!(h.transport.count(), 2);
  assert_eq!(h.ledger.for_key(1, 10).len(), 1);
  assert_eq!(h.ledger.for_key(2, 10).len(), 1);
}

// ─── Profile-driven checks ───────────────────────────────────────────────────

fn profile(enabled: bool, target: &str) -> StaticProfile {
  StaticProfile(Some(AlertConfig { threshold: 10, target: target.into(), enabled }))
}

#[tokio::test]
async fn disabled_profile_skips_everything() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);

  let outcome = h.engine.run_configured(&profile(false, TARGET)).await.unwrap();
  assert_eq!(outcome, CheckOutcome::Disabled);
  assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn missing_profile_is_a_configuration_error() {
  let h = harness();
  let err = h.engine.run_configured(&StaticProfile(None)).await.unwrap_err();
  assert!(err.cause.is_configuration());
}

#[tokio::test]
async fn enabled_profile_runs_a_check() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);

  let outcome = h.engine.run_configured(&profile(true, TARGET)).await.unwrap();
  assert_eq!(outcome, CheckOutcome::Completed(CheckReport { sent: 1, ..Default::default() }));
  assert_eq!(h.transport.sent.lock().unwrap()[0].0, TARGET);

  let err = h.engine.run_configured(&profile(true, "")).await.unwrap_err();
  assert!(err.cause.is_configuration());
}

// ─── Transport test ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_message_bypasses_ledger() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);

  assert!(h.engine.send_test(TARGET).await.unwrap());
  h.transport.accept.store(false, Ordering::SeqCst);
  assert!(!h.engine.send_test(TARGET).await.unwrap());

  let sent = h.transport.sent.lock().unwrap().clone();
  assert_eq!(sent.len(), 2);
  assert!(sent.iter().all(|(to, body)| to == TARGET && body == TEST_MESSAGE));
  assert!(h.ledger.all().is_empty());
}

#[tokio::test]
async fn test_message_needs_a_target() {
  let h = harness();
  let err = h.engine.send_test(" ").await.unwrap_err();
  assert!(err.is_configuration());
  assert_eq!(h.transport.count(), 0);
}

#[test]
fn outcome_serialises_with_status_tag() {
  let json = serde_json::to_value(CheckOutcome::Completed(CheckReport {
    sent: 2,
    ..Default::default()
  }))
  .unwrap();
  assert_eq!(json["status"], "completed");
  assert_eq!(json["sent"], 2);

  let json = serde_json::to_value(CheckOutcome::Disabled).unwrap();
  assert_eq!(json, serde_json::json!({ "status": "disabled" }));
}

// ─── Status and message ──────────────────────────────────────────────────────

#[tokio::test]
async fn status_summarises_history() {
  let h = harness();
  h.catalog.set_stock(1, "A", 1);
  h.engine.run_check(TARGET, 10).await.unwrap();
  h.catalog.set_stock(1, "A", 20);
  h.engine.run_check(TARGET, 10).await.unwrap();
  h.catalog.set_stock(1, "A", 4);
  h.engine.run_check(TARGET, 10).await.unwrap();

  let status = h.engine.status(ProductId(1)).await.unwrap().unwrap();
  assert_eq!(status.current_stock, 4);
  assert_eq!(status.unresolved, 1);
  assert_eq!(status.resolved, 1);
  assert!(!status.can_send_new_alert);

  assert!(h.engine.status(ProductId(99)).await.unwrap().is_none());
}

#[test]
fn message_names_product_stock_and_threshold() {
  let product = Product { id: ProductId(7), name: "MacBook Pro 16-inch".into(), stock: 5 };
  let text = message_for(&product, 10);
  assert!(text.contains("MacBook Pro 16-inch"));
  assert!(text.contains("Current stock: 5"));
  assert!(text.contains("Threshold: 10"));
}

#[test]
fn episode_json_flattens_status() {
  let episode = AlertEpisode {
    episode_id:    Uuid::nil(),
    product_id:    ProductId(1),
    threshold:     10,
    stock_at_open: 3,
    target:        TARGET.into(),
    opened_at:     Utc::now(),
    status:        EpisodeStatus::Open,
  };
  let json = serde_json::to_value(&episode).unwrap();
  assert_eq!(json["status"], "open");
  assert_eq!(json["product_id"], 1);

  let back: AlertEpisode = serde_json::from_value(json).unwrap();
  assert_eq!(back, episode);
}
