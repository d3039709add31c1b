#![no_main]

use std::sync::{Arc, Mutex};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use syncol_collections::SyncCollection;
use syncol_core::change::CollectionChange;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Add(u16),
    Insert { index: u8, value: u16 },
    Set { index: u8, value: u16 },
    RemoveAt(u8),
    Remove(u16),
    Move { from: u8, to: u8 },
    Clear,
    Mirror,
    DisposeMirror(u8),
}

const MAX_MIRRORS: usize = 8;

fuzz_target!(|input: (Vec<u16>, Vec<FuzzOp>)| {
    let (seed, ops) = input;
    let source = SyncCollection::from_vec(seed);
    let shadow = Arc::new(Mutex::new(source.to_vec()));
    let sink = Arc::clone(&shadow);
    let _listener = source.on_collection_changed(move |change: &CollectionChange<u16>| {
        if let Ok(mut shadow) = sink.lock() {
            change
                .apply_to(&mut shadow)
                .expect("emitted change must replay onto the shadow");
        }
    });
    let mut mirrors: Vec<SyncCollection<u32>> = Vec::new();

    for op in ops.into_iter().take(512) {
        let before = source.to_vec();
        let ok = match op {
            FuzzOp::Add(v) => source.add(v).is_ok(),
            FuzzOp::Insert { index, value } => source.insert(usize::from(index), value).is_ok(),
            FuzzOp::Set { index, value } => source.set(usize::from(index), value).is_ok(),
            FuzzOp::RemoveAt(index) => source.remove_at(usize::from(index)).is_ok(),
            FuzzOp::Remove(v) => source.remove(&v).is_ok(),
            FuzzOp::Move { from, to } => source
                .move_item(usize::from(from), usize::from(to))
                .is_ok(),
            FuzzOp::Clear => source.clear().is_ok(),
            FuzzOp::Mirror => {
                if mirrors.len() < MAX_MIRRORS {
                    let mirror = source
                        .mirror_map(|v: &u16| u32::from(*v) << 1)
                        .expect("mirror of live source");
                    mirrors.push(mirror);
                }
                true
            }
            FuzzOp::DisposeMirror(slot) => {
                if !mirrors.is_empty() {
                    let mirror = mirrors.remove(usize::from(slot) % mirrors.len());
                    mirror.dispose().expect("dispose mirror");
                    assert!(mirror.is_empty());
                }
                true
            }
        };
        if !ok {
            assert_eq!(source.to_vec(), before, "rejected op changed contents");
        }

        let current = source.to_vec();
        assert_eq!(*shadow.lock().expect("shadow lock"), current);
        let expected: Vec<u32> = current.iter().map(|v| u32::from(*v) << 1).collect();
        for mirror in &mirrors {
            assert_eq!(mirror.to_vec(), expected);
        }
    }
});
