mod support;

use std::sync::{Arc, Barrier};
use std::thread;

use sheetsync::registry::{CellLockRegistry, CellRef};
use support::TestWorkspace;

#[test]
fn single_winner_per_contended_cell() {
    let registry = Arc::new(CellLockRegistry::default());
    let threads = 12;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for i in 0..threads {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            registry
                .acquire(CellRef::new("/doc.csv", 3, 0), &format!("user-{i}"))
                .is_ok()
        }));
    }

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1, "exactly one thread may win the cell");
    assert_eq!(registry.len(), 1);
}

#[test]
fn concurrent_inserts_keep_the_sheet_consistent() {
    let ws = Arc::new(TestWorkspace::new());
    ws.write_sheet("/doc.csv", &["h;h", "FIX;1", "1;a", "FOOT;0"]);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for i in 0..threads {
        let ws = Arc::clone(&ws);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            ws.engine
                .insert_row("/doc.csv", 0, &format!("user-{i}"))
                .expect("insert must not fail")
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let lines = ws.read_sheet("/doc.csv");
    assert_eq!(lines.len(), 4 + threads);
    assert_eq!(lines.last().map(String::as_str), Some("FOOT;0"));

    // Per-document exclusion means no insert saw a half-applied peer:
    // the final numbering is a clean 1..=N sequence.
    let footer = lines.len() - 1;
    for (offset, line) in lines[2..footer].iter().enumerate() {
        assert_eq!(
            line.split(';').next().unwrap(),
            (offset + 1).to_string(),
            "bad numbering in {lines:?}"
        );
    }
}

#[test]
fn concurrent_edits_on_different_sheets_do_not_interfere() {
    let ws = Arc::new(TestWorkspace::new());
    for i in 0..4 {
        ws.write_sheet(&format!("/s{i}.csv"), &["h;h", "FIX;1", "1;a", "FOOT;0"]);
    }

    let threads = 4;
    let rounds = 25;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for i in 0..threads {
        let ws = Arc::clone(&ws);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let sheet = format!("/s{i}.csv");
            for round in 0..rounds {
                ws.engine
                    .edit_cell(&sheet, 1, 1, &format!("v{round}"), &format!("user-{i}"))
                    .expect("edit must not fail");
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..4 {
        let lines = ws.read_sheet(&format!("/s{i}.csv"));
        assert_eq!(lines[2], format!("1;v{}", rounds - 1));
    }

    // One CellChanged event per edit made it to the feed.
    let batch = ws.feed.find_since(0);
    assert_eq!(batch.events.len(), threads * rounds);
}

#[test]
fn mutations_and_disconnects_race_safely() {
    let ws = Arc::new(TestWorkspace::new());
    ws.write_sheet("/doc.csv", &["h;h", "FIX;1", "1;a", "2;b", "3;c", "FOOT;0"]);

    let barrier = Arc::new(Barrier::new(3));

    // One user hammers locks, one inserts rows, one keeps releasing the
    // first user's locks (the disconnect path).
    let locker = {
        let ws = Arc::clone(&ws);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for row in 0..50usize {
                let _ = ws
                    .locks
                    .acquire(CellRef::new("/doc.csv", row % 5, 0), "flaky");
            }
        })
    };

    let inserter = {
        let ws = Arc::clone(&ws);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..10 {
                ws.engine.insert_row("/doc.csv", 1, "steady").unwrap();
            }
        })
    };

    let reaper = {
        let ws = Arc::clone(&ws);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..20 {
                ws.locks.release_all_by_owner("flaky");
                thread::yield_now();
            }
        })
    };

    locker.join().unwrap();
    inserter.join().unwrap();
    reaper.join().unwrap();

    // However the race interleaved, the document invariant held.
    let lines = ws.read_sheet("/doc.csv");
    assert_eq!(lines.len(), 16);
    let footer = lines.len() - 1;
    for (offset, line) in lines[2..footer].iter().enumerate() {
        assert_eq!(line.split(';').next().unwrap(), (offset + 1).to_string());
    }
}
