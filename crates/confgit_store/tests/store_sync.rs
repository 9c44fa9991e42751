//! End-to-end synchronization: several stores converging through one
//! shared remote, counter-driven wakeups, and remote-URL changes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use confgit_repo::{MemoryRemote, MemoryRepository, Repository};
use confgit_store::{
    MemoryCounter, ProfileSpec, ProfileStore, SharedCounter, StoreConfig, StoreListener,
    SyncScheduler,
};

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn open_peer(
    remote: &Arc<MemoryRemote>,
    config: StoreConfig,
) -> (Arc<ProfileStore>, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::init("master"));
    repo.attach_remote("origin", "memory://shared", Arc::clone(remote));
    let store = ProfileStore::open(Arc::clone(&repo) as Arc<dyn Repository>, config).unwrap();
    (store, repo)
}

fn shared_remote() -> Arc<MemoryRemote> {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_branch("master", &[], "init remote");
    remote
}

fn no_attributes() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[derive(Default)]
struct Events {
    changes: AtomicUsize,
    urls: AtomicUsize,
}

impl StoreListener for Events {
    fn store_changed(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }
    fn remote_url_changed(&self, _url: &str) {
        self.urls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn a_version_written_by_one_peer_is_readable_by_another() {
    let remote = shared_remote();
    let (alpha, _) = open_peer(&remote, StoreConfig::new());
    let (beta, _) = open_peer(&remote, StoreConfig::new());

    alpha
        .create_version("master", "1.0", &no_attributes())
        .unwrap();
    alpha
        .create_profile(
            &ProfileSpec::new("1.0", "default").with_file("foo.properties", &b"a = 1\n"[..]),
        )
        .unwrap();

    // The write pushed; the read on the other peer pulls on cache miss.
    let version = beta.version("1.0").unwrap().expect("version after pull");
    let profile = version.profile("default").expect("profile after pull");
    assert_eq!(profile.configuration("foo").unwrap()["a"], "1");
    assert!(beta.has_version("1.0"));
}

#[test]
fn counter_notification_propagates_an_update() {
    let remote = shared_remote();
    let (alpha, _) = open_peer(&remote, StoreConfig::new());
    let idle = StoreConfig::new()
        .with_initial_sync_delay(Duration::from_secs(3600))
        .with_push_interval(Duration::from_secs(3600))
        .with_counter_delay(Duration::from_millis(2));
    let (beta, _) = open_peer(&remote, idle);

    alpha
        .create_version("master", "1.0", &no_attributes())
        .unwrap();
    alpha
        .create_profile(
            &ProfileSpec::new("1.0", "default").with_file("foo.properties", &b"a = 1\n"[..]),
        )
        .unwrap();

    let counter = Arc::new(MemoryCounter::new());
    let mut scheduler =
        SyncScheduler::start(Arc::clone(&beta), Some(counter.clone() as Arc<dyn SharedCounter>));

    // First wakeup materializes the version on the other peer.
    counter.increment();
    assert!(beta.has_version("1.0"));
    assert_eq!(
        beta.require_profile("1.0", "default")
            .unwrap()
            .configuration("foo")
            .unwrap()["a"],
        "1"
    );

    // A later update travels the same way.
    alpha
        .update_profile(
            &ProfileSpec::new("1.0", "default").with_file("foo.properties", &b"a = 2\n"[..]),
        )
        .unwrap();
    counter.increment();
    assert_eq!(
        beta.require_profile("1.0", "default")
            .unwrap()
            .configuration("foo")
            .unwrap()["a"],
        "2"
    );

    scheduler.stop();
}

#[test]
fn noop_remote_commits_do_not_notify() {
    let remote = shared_remote();
    let idle = StoreConfig::new()
        .with_initial_sync_delay(Duration::from_secs(3600))
        .with_push_interval(Duration::from_secs(3600))
        .with_counter_delay(Duration::from_millis(1));
    let (beta, _) = open_peer(&remote, idle);
    let events = Arc::new(Events::default());
    beta.add_listener(events.clone());

    let counter = Arc::new(MemoryCounter::new());
    let mut scheduler =
        SyncScheduler::start(Arc::clone(&beta), Some(counter.clone() as Arc<dyn SharedCounter>));

    // Nothing new on the remote: no notification.
    counter.increment();
    assert_eq!(events.changes.load(Ordering::SeqCst), 0);

    // A commit that changes no tree content: still no notification.
    remote.seed_empty_commit("master", "republish");
    counter.increment();
    assert_eq!(events.changes.load(Ordering::SeqCst), 0);

    // Real content: exactly one notification for the cycle.
    remote.seed_branch(
        "1.0",
        &[("profiles/default.profile/profile.attributes", b"")],
        "seed 1.0",
    );
    counter.increment();
    assert_eq!(events.changes.load(Ordering::SeqCst), 1);
    assert!(beta.has_version("1.0"));

    scheduler.stop();
}

#[test]
fn version_deletion_propagates_to_peers() {
    let remote = shared_remote();
    let (alpha, _) = open_peer(&remote, StoreConfig::new());
    let idle = StoreConfig::new()
        .with_initial_sync_delay(Duration::from_secs(3600))
        .with_push_interval(Duration::from_secs(3600))
        .with_counter_delay(Duration::from_millis(1));
    let (beta, beta_repo) = open_peer(&remote, idle);

    alpha
        .create_version("master", "1.0", &no_attributes())
        .unwrap();
    assert!(beta.version("1.0").unwrap().is_some());

    alpha.delete_version("1.0").unwrap();
    assert!(remote.tip("1.0").is_none());

    // Routine pulls never delete local branches.
    let counter = Arc::new(MemoryCounter::new());
    let mut scheduler =
        SyncScheduler::start(Arc::clone(&beta), Some(counter.clone() as Arc<dyn SharedCounter>));
    counter.increment();
    assert!(beta.has_version("1.0"));

    // Explicit remote-URL-change handling pulls with deletions enabled.
    beta.notify_remote_url_changed("memory://relocated");
    assert!(wait_until(Duration::from_secs(2), || !beta.has_version("1.0")));
    assert_eq!(
        beta_repo.config_value("remote.origin.url").unwrap().as_deref(),
        Some("memory://relocated")
    );

    scheduler.stop();
}

#[test]
fn remote_url_change_notifies_listeners() {
    let remote = shared_remote();
    let (store, repo) = open_peer(&remote, StoreConfig::new());
    let events = Arc::new(Events::default());
    store.add_listener(events.clone());

    store.notify_remote_url_changed("memory://moved");
    assert!(wait_until(Duration::from_secs(2), || {
        events.urls.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(
        repo.config_value("remote.origin.url").unwrap().as_deref(),
        Some("memory://moved")
    );
}

#[test]
fn a_configured_url_overrides_the_discovered_one() {
    let remote = shared_remote();
    let repo = Arc::new(MemoryRepository::init("master"));
    repo.attach_remote("origin", "memory://shared", Arc::clone(&remote));
    let store = ProfileStore::open(
        Arc::clone(&repo) as Arc<dyn Repository>,
        StoreConfig::new().with_configured_url("memory://pinned"),
    )
    .unwrap();

    // Opening already applied the configured URL.
    assert_eq!(
        repo.config_value("remote.origin.url").unwrap().as_deref(),
        Some("memory://pinned")
    );

    // A discovered URL cannot displace it.
    store.notify_remote_url_changed("memory://discovered");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(
        repo.config_value("remote.origin.url").unwrap().as_deref(),
        Some("memory://pinned")
    );
}

#[test]
fn schedulers_alone_converge_two_peers() {
    let remote = shared_remote();
    let fast = || {
        StoreConfig::new()
            .with_initial_sync_delay(Duration::from_millis(5))
            .with_push_interval(Duration::from_millis(10))
            .with_pull_on_push(true)
    };
    let (alpha, _) = open_peer(&remote, fast());
    let (beta, _) = open_peer(&remote, fast());

    let mut alpha_scheduler = SyncScheduler::start(Arc::clone(&alpha), None);
    let mut beta_scheduler = SyncScheduler::start(Arc::clone(&beta), None);

    alpha
        .create_version("master", "2.0", &no_attributes())
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || beta.has_version("2.0")));

    alpha_scheduler.stop();
    beta_scheduler.stop();
}
