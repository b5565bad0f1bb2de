//! Integration tests for the frontier
//!
//! These tests drive the public worker protocol (`next` / `finished`) the way
//! crawl workers would, with the fetch itself simulated by setting a status.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use sumi_frontier::frontier::{CrawlListener, MarkerQueue, Precondition};
use sumi_frontier::state::now_millis;
use sumi_frontier::{CandidateUri, Config, CrawlUri, FetchStatus, Frontier, NextUri, Uuri};
use tempfile::TempDir;

/// Creates a test configuration with politeness delays switched off
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.state_dir = dir.path().join("state").to_string_lossy().into_owned();
    config.politeness.delay_factor = 0.0;
    config.politeness.min_delay_ms = 0;
    config.politeness.min_interval_ms = 0;
    config.retry.retry_delay_seconds = 0;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

fn candidate(url: &str) -> CandidateUri {
    CandidateUri::parse(url).unwrap()
}

fn take(frontier: &Frontier, timeout_ms: u64) -> CrawlUri {
    match frontier.next(timeout_ms).unwrap() {
        NextUri::Uri(curi) => curi,
        other => panic!("expected a URI, got {:?}", other),
    }
}

fn finish(frontier: &Frontier, mut curi: CrawlUri, status: FetchStatus) {
    curi.fetch_status = status;
    frontier.finished(curi).unwrap();
}

/// Succeeds every URI until the frontier reports exhaustion, returning how
/// many URIs were emitted
fn drain(frontier: &Frontier) -> usize {
    let mut emitted = 0;
    loop {
        match frontier.next(100).unwrap() {
            NextUri::Uri(curi) => {
                emitted += 1;
                finish(frontier, curi, FetchStatus(200));
            }
            NextUri::TimedOut => continue,
            NextUri::Exhausted => return emitted,
            NextUri::Terminated => panic!("frontier terminated"),
        }
    }
}

#[test]
fn test_politeness_delay_between_same_host_fetches() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.politeness.min_delay_ms = 500;
    let frontier = Frontier::new(&config).unwrap();

    frontier.schedule(candidate("https://a.example/1")).unwrap();
    frontier.schedule(candidate("https://a.example/2")).unwrap();

    let mut first = take(&frontier, 0);
    assert_eq!(first.uuri().as_str(), "https://a.example/1");

    let began = now_millis();
    let completed = began + 5;
    first.set_fetch_result(FetchStatus(200), began, completed);
    frontier.finished(first).unwrap();

    let second = take(&frontier, 5_000);
    assert_eq!(second.uuri().as_str(), "https://a.example/2");
    assert!(
        now_millis() - completed >= 500,
        "second fetch released too early"
    );
}

#[test]
fn test_other_hosts_not_blocked_by_snoozed_host() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.politeness.min_delay_ms = 60_000;
    config.politeness.max_delay_ms = 60_000;
    let frontier = Frontier::new(&config).unwrap();

    frontier.schedule(candidate("https://a.example/1")).unwrap();
    frontier.schedule(candidate("https://a.example/2")).unwrap();
    frontier.schedule(candidate("https://b.example/1")).unwrap();

    let mut first = take(&frontier, 0);
    let now = now_millis();
    first.set_fetch_result(FetchStatus(200), now, now);
    frontier.finished(first).unwrap();

    assert_eq!(take(&frontier, 0).uuri().as_str(), "https://b.example/1");
    assert_eq!(frontier.next(50).unwrap(), NextUri::TimedOut);
    assert!(!frontier.is_empty().unwrap());
}

#[test]
fn test_dependent_released_after_prerequisites_succeed() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    frontier.schedule(candidate("https://a.example/page")).unwrap();

    // unresolved host: needs DNS first
    let mut page = take(&frontier, 0);
    assert_eq!(
        frontier.check_preconditions(&mut page),
        Precondition::Deferred(Uuri::dns("a.example").unwrap())
    );
    frontier.finished(page).unwrap();

    let dns = take(&frontier, 0);
    assert_eq!(dns.uuri().as_str(), "dns:a.example");
    frontier
        .server_cache()
        .record_dns("a.example", Some("127.0.0.1".parse().unwrap()));
    finish(&frontier, dns, FetchStatus(1));

    // resolved host: needs robots.txt next
    let mut page = take(&frontier, 0);
    assert_eq!(page.uuri().as_str(), "https://a.example/page");
    assert_eq!(
        frontier.check_preconditions(&mut page),
        Precondition::Deferred(Uuri::parse("https://a.example/robots.txt").unwrap())
    );
    frontier.finished(page).unwrap();

    let mut robots = take(&frontier, 0);
    assert_eq!(robots.uuri().as_str(), "https://a.example/robots.txt");
    assert_eq!(frontier.check_preconditions(&mut robots), Precondition::Proceed);
    // a missing robots.txt allows everything
    finish(&frontier, robots, FetchStatus(404));

    let mut page = take(&frontier, 0);
    assert_eq!(page.uuri().as_str(), "https://a.example/page");
    assert_eq!(page.deferrals, 2);
    assert_eq!(frontier.check_preconditions(&mut page), Precondition::Proceed);
    finish(&frontier, page, FetchStatus(200));

    assert_eq!(frontier.successfully_fetched_count(), 3);
    assert!(frontier.is_empty().unwrap());
}

#[test]
fn test_dependent_released_after_prerequisite_fails() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    frontier.schedule(candidate("https://gone.example/page")).unwrap();

    let mut page = take(&frontier, 0);
    frontier.check_preconditions(&mut page);
    frontier.finished(page).unwrap();

    let dns = take(&frontier, 0);
    finish(&frontier, dns, FetchStatus::DOMAIN_UNRESOLVABLE);

    let mut page = take(&frontier, 0);
    assert_eq!(page.uuri().as_str(), "https://gone.example/page");
    assert_eq!(
        frontier.check_preconditions(&mut page),
        Precondition::Precluded(FetchStatus::DOMAIN_UNRESOLVABLE)
    );
    frontier.finished(page).unwrap();

    assert_eq!(frontier.failed_fetch_count(), 2);
    assert_eq!(frontier.next(0).unwrap(), NextUri::Exhausted);
}

#[test]
fn test_retries_exhausted_become_failure() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retry.max_retries = 3;
    let frontier = Frontier::new(&config).unwrap();
    frontier.schedule(candidate("https://a.example/flaky")).unwrap();

    for attempt in 1..=3 {
        let curi = take(&frontier, 0);
        assert_eq!(curi.fetch_attempts, attempt - 1);
        finish(&frontier, curi, FetchStatus::CONNECT_FAILED);
        if attempt < 3 {
            assert_eq!(frontier.failed_fetch_count(), 0);
        }
    }

    assert_eq!(frontier.failed_fetch_count(), 1);
    assert_eq!(frontier.next(0).unwrap(), NextUri::Exhausted);
    let stats = frontier.stats().unwrap();
    assert_eq!(stats.retried, 2);
}

#[test]
fn test_disregarded_counted_separately() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    frontier.schedule(candidate("https://a.example/1")).unwrap();

    let curi = take(&frontier, 0);
    finish(&frontier, curi, FetchStatus::ROBOTS_PRECLUDED);

    assert_eq!(frontier.disregarded_fetch_count(), 1);
    assert_eq!(frontier.failed_fetch_count(), 0);
    assert_eq!(frontier.finished_uri_count(), 1);
    // robots exclusion retires but does not forget
    assert!(!frontier.schedule(candidate("https://a.example/1")).unwrap());
}

#[test]
fn test_dedup_emits_once() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();

    assert!(frontier.schedule(candidate("https://a.example/x")).unwrap());
    frontier.schedule(candidate("https://A.example/x#frag")).unwrap();

    assert_eq!(drain(&frontier), 1);
    assert_eq!(frontier.queued_uri_count(), 0);
}

#[test]
fn test_force_fetch_bypasses_dedup() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();

    frontier.schedule(candidate("https://a.example/x")).unwrap();
    assert_eq!(drain(&frontier), 1);

    assert!(!frontier.schedule(candidate("https://a.example/x")).unwrap());
    assert!(frontier
        .schedule(candidate("https://a.example/x").forced())
        .unwrap());
    assert_eq!(drain(&frontier), 1);
}

#[test]
fn test_exhaustion_tracks_in_process() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    assert!(frontier.is_empty().unwrap());

    frontier.schedule(candidate("https://a.example/1")).unwrap();
    assert!(!frontier.is_empty().unwrap());

    let curi = take(&frontier, 0);
    assert!(!frontier.is_empty().unwrap());
    assert_eq!(frontier.next(0).unwrap(), NextUri::TimedOut);

    finish(&frontier, curi, FetchStatus(200));
    assert!(frontier.is_empty().unwrap());
    assert_eq!(frontier.next(0).unwrap(), NextUri::Exhausted);
}

#[test]
fn test_recovery_log_replay() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("old-recover.log");
    fs::write(
        &log,
        "F+ https://a.example/1\n\
         F+ https://a.example/2\n\
         Fe https://a.example/1\n\
         F+ https://b.example/1\n\
         F+ https://b.example/2\n\
         Fs https://a.example/1\n\
         F+ https://c.example/1\n\
         Fs https://b.example/1\n\
         this line is garbage\n",
    )
    .unwrap();

    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    let summary = frontier.import_recover_log(&log).unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.rescheduled, 3);
    assert_eq!(summary.already_included, 2);
    assert_eq!(summary.skipped_lines, 1);
    assert_eq!(frontier.stats().unwrap().fingerprints, 2);
    assert_eq!(drain(&frontier), 3);
}

#[test]
fn test_replaying_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("old-recover.log");
    fs::write(
        &log,
        "F+ https://a.example/1\nF+ https://a.example/2\nF+ https://b.example/1\nFs https://a.example/2\n",
    )
    .unwrap();

    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    let first = frontier.import_recover_log(&log).unwrap();
    assert_eq!(first.rescheduled, 2);
    let discovered = frontier.discovered_uri_count();
    let queued = frontier.queued_uri_count();

    let again = frontier.import_recover_log(&log).unwrap();
    assert_eq!(again.completed, 0);
    assert_eq!(again.rescheduled, 0);
    assert_eq!(again.already_included, 3);
    assert_eq!(frontier.discovered_uri_count(), discovered);
    assert_eq!(frontier.queued_uri_count(), queued);

    assert_eq!(frontier.stats().unwrap().fingerprints, 1);
    assert_eq!(drain(&frontier), 2);
}

#[test]
fn test_recovery_round_trip_between_frontiers() {
    let first_dir = TempDir::new().unwrap();
    let first_config = create_test_config(&first_dir);
    let first = Frontier::new(&first_config).unwrap();
    for url in ["https://a.example/1", "https://b.example/1", "https://c.example/1"] {
        first.schedule(candidate(url)).unwrap();
    }
    let done = take(&first, 0);
    finish(&first, done, FetchStatus(200));
    drop(first);

    let second_dir = TempDir::new().unwrap();
    let second = Frontier::new(&create_test_config(&second_dir)).unwrap();
    let summary = second
        .import_recover_log(&first_config.recovery_log_path())
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.rescheduled, 2);
    assert_eq!(drain(&second), 2);
}

#[test]
fn test_concurrent_workers_never_share_a_host() {
    let dir = TempDir::new().unwrap();
    let frontier = Arc::new(Frontier::new(&create_test_config(&dir)).unwrap());
    for host in 0..5 {
        for page in 0..10 {
            frontier
                .schedule(candidate(&format!("https://h{}.example/{}", host, page)))
                .unwrap();
        }
    }

    let in_flight = Arc::new(Mutex::new(HashSet::new()));
    let emitted = Arc::new(AtomicU64::new(0));
    let mut workers = Vec::new();

    for _ in 0..4 {
        let frontier = frontier.clone();
        let in_flight = in_flight.clone();
        let emitted = emitted.clone();
        workers.push(thread::spawn(move || loop {
            match frontier.next(100).unwrap() {
                NextUri::Uri(curi) => {
                    let key = curi.class_key().to_string();
                    assert!(
                        in_flight.lock().unwrap().insert(key.clone()),
                        "two URIs of {} in flight",
                        key
                    );
                    emitted.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    in_flight.lock().unwrap().remove(&key);
                    finish(&frontier, curi, FetchStatus(200));
                }
                NextUri::TimedOut => continue,
                NextUri::Exhausted | NextUri::Terminated => break,
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(emitted.load(Ordering::SeqCst), 50);
    assert_eq!(frontier.successfully_fetched_count(), 50);
    assert!(frontier.is_empty().unwrap());
}

#[test]
fn test_batch_schedule_from_worker_threads() {
    let dir = TempDir::new().unwrap();
    let frontier = Arc::new(Frontier::new(&create_test_config(&dir)).unwrap());

    let mut handles = Vec::new();
    for t in 0..3 {
        let frontier = frontier.clone();
        handles.push(thread::spawn(move || {
            for i in 0..4 {
                frontier.batch_schedule(candidate(&format!("https://t{}.example/{}", t, i)));
            }
            frontier.batch_flush().unwrap()
        }));
    }
    let flushed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(flushed, 12);
    assert_eq!(frontier.discovered_uri_count(), 12);
    assert_eq!(drain(&frontier), 12);
}

#[test]
fn test_delete_and_list_queued_uris() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    for i in 0..6 {
        frontier
            .schedule(candidate(&format!("https://a.example/public/{}", i)))
            .unwrap();
        frontier
            .schedule(candidate(&format!("https://a.example/private/{}", i)))
            .unwrap();
    }
    // one in process, the rest routed into the host queue
    let curi = take(&frontier, 0);
    assert_eq!(frontier.next(0).unwrap(), NextUri::TimedOut);

    assert_eq!(frontier.delete_uris(".*/private/.*").unwrap(), 6);
    assert_eq!(frontier.deleted_uri_count(), 6);
    assert_eq!(frontier.queued_uri_count(), 5);

    let mut marker = frontier.get_initial_marker(".*", false).unwrap();
    let listed = frontier.get_uris_list(&mut marker, 100, false).unwrap();
    assert_eq!(listed.len(), 5);
    assert!(listed.iter().all(|u| u.contains("/public/")));
    assert!(!marker.has_next());

    finish(&frontier, curi, FetchStatus(200));
    assert_eq!(drain(&frontier), 5);
}

#[test]
fn test_flushed_high_priority_batch_keeps_order_for_busy_host() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();

    frontier.schedule(candidate("https://a.example/busy")).unwrap();
    let busy = take(&frontier, 0);

    for path in ["h1", "h2", "h3"] {
        frontier.batch_schedule_high(candidate(&format!("https://a.example/{}", path)));
    }
    assert_eq!(frontier.batch_flush().unwrap(), 3);
    assert_eq!(frontier.next(0).unwrap(), NextUri::TimedOut);

    finish(&frontier, busy, FetchStatus(200));
    let mut order = Vec::new();
    for _ in 0..3 {
        let curi = take(&frontier, 1_000);
        order.push(curi.uuri().to_string());
        finish(&frontier, curi, FetchStatus(200));
    }
    assert_eq!(
        order,
        vec!["https://a.example/h1", "https://a.example/h2", "https://a.example/h3"]
    );
}

#[test]
fn test_delete_within_one_queue() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(&create_test_config(&dir)).unwrap();
    for host in ["a.example", "b.example"] {
        for i in 0..3 {
            frontier
                .schedule(candidate(&format!("https://{}/{}", host, i)))
                .unwrap();
        }
    }
    frontier.schedule(candidate("https://c.example/0")).unwrap();
    let busy_a = take(&frontier, 0);
    let busy_b = take(&frontier, 0);
    assert_eq!(busy_a.uuri().as_str(), "https://a.example/0");
    assert_eq!(busy_b.uuri().as_str(), "https://b.example/0");
    // routes the rest of a and b into held queues, emits c
    let busy_c = take(&frontier, 0);

    frontier.schedule(candidate("https://d.example/1")).unwrap();
    let queue = MarkerQueue::named("a.example");
    assert_eq!(frontier.delete_uris_in_queue(&queue, ".*").unwrap(), 2);
    assert_eq!(frontier.delete_uris_in_queue(&MarkerQueue::PendingHigh, ".*").unwrap(), 0);
    assert_eq!(frontier.deleted_uri_count(), 2);

    let mut marker = frontier.get_initial_marker(".*", false).unwrap();
    let listed = frontier.get_uris_list(&mut marker, 100, false).unwrap();
    assert_eq!(
        listed,
        vec!["https://d.example/1", "https://b.example/1", "https://b.example/2"]
    );

    for curi in [busy_a, busy_b, busy_c] {
        finish(&frontier, curi, FetchStatus(200));
    }
    assert_eq!(drain(&frontier), 3);
}

#[derive(Default)]
struct CountingListener {
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

impl CrawlListener for CountingListener {
    fn on_success(&self, _curi: &CrawlUri) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _curi: &CrawlUri) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, _curi: &CrawlUri) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_listeners_notified() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retry.max_retries = 2;
    let frontier = Frontier::new(&config).unwrap();
    let listener = Arc::new(CountingListener::default());
    frontier.add_listener(listener.clone()).unwrap();

    frontier.schedule(candidate("https://a.example/ok")).unwrap();
    frontier.schedule(candidate("https://b.example/bad")).unwrap();

    loop {
        match frontier.next(0).unwrap() {
            NextUri::Uri(curi) if curi.uuri().as_str().ends_with("/ok") => {
                finish(&frontier, curi, FetchStatus(200))
            }
            NextUri::Uri(curi) => finish(&frontier, curi, FetchStatus::TIMEOUT),
            _ => break,
        }
    }

    assert_eq!(listener.successes.load(Ordering::SeqCst), 1);
    assert_eq!(listener.retries.load(Ordering::SeqCst), 1);
    assert_eq!(listener.failures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_seeds_respect_scope() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.seed.push(sumi_frontier::config::SeedEntry {
        domain: "*.example.com".to_string(),
        urls: vec![
            "https://www.example.com/".to_string(),
            "https://docs.example.com/start".to_string(),
        ],
    });
    let frontier = Frontier::new(&config).unwrap();

    assert_eq!(frontier.load_seeds(&config).unwrap(), 2);
    assert!(!frontier.schedule(candidate("https://other.org/")).unwrap());
    assert_eq!(frontier.stats().unwrap().out_of_scope, 1);

    let seed = take(&frontier, 0);
    assert!(seed.candidate.is_seed);
}
