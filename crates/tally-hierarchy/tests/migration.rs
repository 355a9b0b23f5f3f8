use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_hierarchy::{GroupHandle, MigrationError, SubjectAccount, UsageProbe};

/// Test stand-in for a descriptor table or page map: the subject's concrete
/// usage, settable by the test.
struct TestProbe {
    usage: AtomicU64,
}

impl TestProbe {
    fn new(usage: u64) -> Arc<Self> {
        Arc::new(TestProbe {
            usage: AtomicU64::new(usage),
        })
    }

    fn set(&self, usage: u64) {
        self.usage.store(usage, Ordering::SeqCst);
    }
}

impl UsageProbe for TestProbe {
    fn current_usage(&self) -> u64 {
        self.usage.load(Ordering::SeqCst)
    }
}

#[test]
fn migrate_moves_accounted_usage_between_siblings() {
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();

    let probe = TestProbe::new(0);
    let account = SubjectAccount::attach(&a, probe.clone());
    account.charge(50).unwrap();
    probe.set(50);

    account.migrate(&b).unwrap();
    assert!(account.group().same_group(&b));
    assert_eq!(a.usage(), 0);
    assert_eq!(b.usage(), 50);
    // Outside the differing path segments the sums are unchanged.
    assert_eq!(root.usage(), 50);
}

#[test]
fn failed_migration_leaves_everything_as_before() {
    // Subject with concrete usage 50 in A (limit 100); B's limit is 40.
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();
    a.set_limit(100).unwrap();
    b.set_limit(40).unwrap();

    let probe = TestProbe::new(0);
    let account = SubjectAccount::attach(&a, probe.clone());
    account.charge(50).unwrap();
    probe.set(50);

    let err = account.migrate(&b).unwrap_err();
    let MigrationError::LimitExceeded(charge_err) = err;
    assert_eq!(charge_err.node(), "/b");

    assert!(account.group().same_group(&a));
    assert_eq!(a.usage(), 50);
    assert_eq!(b.usage(), 0);
    assert_eq!(root.usage(), 50);
    assert_eq!(b.fail_count(), 1);
}

#[test]
fn admission_precheck_is_advisory() {
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();
    b.set_limit(40).unwrap();

    let probe = TestProbe::new(0);
    let account = SubjectAccount::attach(&a, probe.clone());

    probe.set(40);
    assert!(account.attempt_admission(&b));
    probe.set(41);
    assert!(!account.attempt_admission(&b));

    // Nothing was reserved by the successful pre-check.
    assert_eq!(b.usage(), 0);
    assert_eq!(b.margin(), 40);
}

#[test]
fn usage_growth_after_admission_makes_migrate_fail_cleanly() {
    // The pre-check/migrate gap is an accepted race: usage may grow in
    // between, and migrate then aborts rather than overcommitting.
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();
    b.set_limit(40).unwrap();

    let probe = TestProbe::new(0);
    let account = SubjectAccount::attach(&a, probe.clone());
    account.charge(30).unwrap();
    probe.set(30);

    assert!(account.attempt_admission(&b));

    account.charge(20).unwrap();
    probe.set(50);

    assert!(account.migrate(&b).is_err());
    assert!(account.group().same_group(&a));
    assert_eq!(a.usage(), 50);
    assert_eq!(b.usage(), 0);
}

#[test]
fn migrating_to_the_current_group_is_a_noop() {
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();

    let probe = TestProbe::new(0);
    let account = SubjectAccount::attach(&a, probe.clone());
    account.charge(10).unwrap();
    probe.set(10);

    account.migrate(&a).unwrap();
    assert_eq!(a.usage(), 10);
    assert_eq!(root.usage(), 10);
    assert!(account.group().same_group(&a));
}

#[test]
fn subject_with_zero_usage_migrates_anywhere_with_headroom() {
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();
    b.set_limit(0).unwrap();

    let account = SubjectAccount::attach(&a, TestProbe::new(0));
    account.migrate(&b).unwrap();
    assert!(account.group().same_group(&b));
    assert_eq!(b.usage(), 0);
}

#[test]
fn concurrent_migrations_of_one_subject_never_tear_the_accounting() {
    let root = GroupHandle::new_root(1000);
    let a = root.create_child("a").unwrap();
    let b = root.create_child("b").unwrap();

    let probe = TestProbe::new(0);
    let account = Arc::new(SubjectAccount::attach(&a, probe.clone()));
    account.charge(25).unwrap();
    probe.set(25);

    let mut handles = Vec::new();
    for worker in 0..4 {
        let account = Arc::clone(&account);
        let target = if worker % 2 == 0 { a.clone() } else { b.clone() };
        handles.push(std::thread::spawn(move || {
            for _ in 0..500 {
                account.migrate(&target).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // The subject ended up in exactly one group carrying the full amount.
    let home = account.group();
    assert!(home.same_group(&a) || home.same_group(&b));
    assert_eq!(home.usage(), 25);
    assert_eq!(a.usage() + b.usage(), 25);
    assert_eq!(root.usage(), 25);
}
