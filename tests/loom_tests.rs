//! Loom models of the ledger's concurrency protocol.
//!
//! The ledger relies on two properties:
//!
//! 1. **Prune vs insert** - pruning an empty child map under the parent's
//!    write lock never loses an insert that descended through the same parent.
//! 2. **Single role** - evacuate-then-insert under a per-partition lock leaves
//!    the partition in exactly one of the two role maps.
//!
//! The models use loom primitives standing in for a DashMap shard lock.
//!
//! ```sh
//! cargo test --test loom_tests --features loom --release
//! ```

#![cfg(feature = "loom")]

use std::collections::HashMap;

use loom::sync::{Arc, Mutex, RwLock};
use loom::thread;

type Shard = RwLock<HashMap<u32, Arc<Mutex<Vec<u32>>>>>;

/// Writer descends through the parent shard (read lock held) into the child;
/// the pruner removes the child only if empty, under the parent write lock.
#[test]
fn test_prune_never_loses_insert() {
    loom::model(|| {
        let parent: Arc<Shard> = Arc::new(RwLock::new(HashMap::new()));
        parent
            .write()
            .unwrap()
            .insert(1, Arc::new(Mutex::new(Vec::new())));

        let writer_parent = Arc::clone(&parent);
        let writer = thread::spawn(move || {
            let guard = writer_parent.read().unwrap();
            match guard.get(&1) {
                Some(child) => {
                    child.lock().unwrap().push(7);
                    true
                }
                None => false,
            }
        });

        let pruner_parent = Arc::clone(&parent);
        let pruner = thread::spawn(move || {
            let mut guard = pruner_parent.write().unwrap();
            let empty = guard
                .get(&1)
                .is_some_and(|child| child.lock().unwrap().is_empty());
            if empty {
                guard.remove(&1);
            }
        });

        let applied = writer.join().unwrap();
        pruner.join().unwrap();

        let guard = parent.read().unwrap();
        if applied {
            let child = guard.get(&1).expect("written child must survive pruning");
            assert_eq!(*child.lock().unwrap(), vec![7]);
        } else {
            assert!(guard.get(&1).is_none());
        }
    });
}

/// Two role changes for the same partition serialize on one transition lock.
#[test]
fn test_role_transitions_leave_single_owner() {
    loom::model(|| {
        let leader = Arc::new(Mutex::new(false));
        let follower = Arc::new(Mutex::new(true));
        let transition = Arc::new(Mutex::new(()));

        let spawn_move = |to_leader: bool| {
            let leader = Arc::clone(&leader);
            let follower = Arc::clone(&follower);
            let transition = Arc::clone(&transition);
            thread::spawn(move || {
                let _guard = transition.lock().unwrap();
                let (from, to) = if to_leader {
                    (&follower, &leader)
                } else {
                    (&leader, &follower)
                };
                *from.lock().unwrap() = false;
                *to.lock().unwrap() = true;
            })
        };

        let a = spawn_move(true);
        let b = spawn_move(false);

        let observer = {
            let leader = Arc::clone(&leader);
            let follower = Arc::clone(&follower);
            let transition = Arc::clone(&transition);
            thread::spawn(move || {
                let _guard = transition.lock().unwrap();
                let in_leader = *leader.lock().unwrap();
                let in_follower = *follower.lock().unwrap();
                assert!(in_leader ^ in_follower);
            })
        };

        a.join().unwrap();
        b.join().unwrap();
        observer.join().unwrap();

        let in_leader = *leader.lock().unwrap();
        let in_follower = *follower.lock().unwrap();
        assert!(in_leader ^ in_follower);
    });
}
