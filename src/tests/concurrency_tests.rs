use super::{ramp_signal, ramp_track, read_range};
use crate::{InsertMode, LockKind, Sample, SampleLock};
use crossbeam::channel::bounded;
use std::thread;
use std::time::Duration;

const BLOCKED: Duration = Duration::from_millis(100);
const RELEASED: Duration = Duration::from_secs(5);

#[test]
fn test_disjoint_locks_never_block() {
    let track = ramp_track(100);
    let kinds = [
        LockKind::ReadShared,
        LockKind::WriteShared,
        LockKind::WriteExclusive,
    ];
    for held in kinds {
        for requested in kinds {
            let _a = SampleLock::new(&track, 0, 50, held);
            let b = SampleLock::try_new(&track, 50, 50, requested);
            assert!(b.is_some(), "{held:?} blocked disjoint {requested:?}");
        }
    }
}

#[test]
fn test_overlapping_exclusive_lock_blocks() {
    let track = ramp_track(100);
    let held = SampleLock::new(&track, 10, 20, LockKind::WriteExclusive);
    assert!(SampleLock::try_new(&track, 29, 5, LockKind::ReadShared).is_none());

    let (tx, rx) = bounded(1);
    let waiter = {
        let track = track.clone();
        thread::spawn(move || {
            let lock = SampleLock::new(&track, 0, 15, LockKind::ReadShared);
            tx.send(lock.offset()).unwrap();
        })
    };
    assert!(rx.recv_timeout(BLOCKED).is_err());
    drop(held);
    assert_eq!(rx.recv_timeout(RELEASED).unwrap(), 0);
    waiter.join().unwrap();
}

#[test]
fn test_open_ended_lock_covers_appended_data() {
    let track = ramp_track(10);
    let _writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
    // anything at or behind the old end is covered, however far out
    assert!(SampleLock::try_new(&track, 1_000_000, 1, LockKind::WriteExclusive).is_none());
    assert!(SampleLock::try_new(&track, 0, 10, LockKind::WriteExclusive).is_some());
}

#[test]
fn test_delete_waits_for_reader() {
    let track = ramp_track(100);
    let reader = track.open_sample_reader(0, 49).unwrap();

    let (tx, rx) = bounded(1);
    let deleter = {
        let track = track.clone();
        thread::spawn(move || {
            track.delete_range(40, 20).unwrap();
            tx.send(track.length()).unwrap();
        })
    };
    assert!(rx.recv_timeout(BLOCKED).is_err());
    assert_eq!(track.length(), 100);
    drop(reader);
    assert_eq!(rx.recv_timeout(RELEASED).unwrap(), 80);
    deleter.join().unwrap();
}

#[test]
fn test_overwrite_alongside_reader() {
    let track = ramp_track(100);
    let mut reader = track.open_sample_reader(0, 99).unwrap();
    let mut writer = track
        .open_sample_writer(InsertMode::Overwrite, 50, 59)
        .unwrap();
    writer.write(&[-1; 10]).unwrap();
    drop(writer);

    let mut out = vec![0; 100];
    assert_eq!(reader.read(&mut out), 100);
    assert_eq!(out[49], 49);
    assert_eq!(out[50], -1);
}

#[test]
fn test_overlapping_overwrites_are_serialized() {
    let track = ramp_track(100);
    let first = track
        .open_sample_writer(InsertMode::Overwrite, 0, 59)
        .unwrap();

    let (tx, rx) = bounded(1);
    let second = {
        let track = track.clone();
        thread::spawn(move || {
            let mut writer = track
                .open_sample_writer(InsertMode::Overwrite, 40, 99)
                .unwrap();
            writer.write(&[2; 60]).unwrap();
            drop(writer);
            tx.send(()).unwrap();
        })
    };
    assert!(rx.recv_timeout(BLOCKED).is_err());
    drop(first);
    rx.recv_timeout(RELEASED).unwrap();
    second.join().unwrap();
    assert_eq!(read_range(&track, 40, 99), vec![2; 60]);
}

#[test]
fn test_disjoint_overwrites_run_concurrently() {
    let track = ramp_track(1000);
    let handles: Vec<_> = (0..4)
        .map(|part| {
            let track = track.clone();
            thread::spawn(move || {
                let left = part * 250;
                let mut writer = track
                    .open_sample_writer(InsertMode::Overwrite, left, left + 249)
                    .unwrap();
                writer.write(&[part as Sample; 250]).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let content = read_range(&track, 0, 999);
    for (i, &sample) in content.iter().enumerate() {
        assert_eq!(sample, (i / 250) as Sample);
    }
}

#[test]
fn test_parallel_appends_on_separate_tracks() {
    let signal = ramp_signal(&[0, 0, 0, 0]);
    thread::scope(|scope| {
        for index in 0..signal.tracks() {
            let track = signal.track(index).unwrap();
            scope.spawn(move || {
                for chunk in 0..20 {
                    let mut writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
                    writer.write(&[chunk; 50]).unwrap();
                }
            });
        }
    });
    assert_eq!(signal.length(), 1000);
    for index in 0..signal.tracks() {
        let track = signal.track(index).unwrap();
        assert_eq!(track.length(), 1000);
        assert_eq!(read_range(&track, 950, 950), vec![19]);
    }
}

#[test]
fn test_insert_inside_open_reader_range() {
    let track = ramp_track(1000);
    let mut out = vec![0; 1000];

    // splitting the stripe under the reader without writing anything
    let mut reader = track.open_sample_reader(0, 999).unwrap();
    drop(track.open_sample_writer(InsertMode::Insert, 500, 0).unwrap());
    assert_eq!(track.stripe_count(), 2);
    assert_eq!(reader.read(&mut out), 1000);
    assert!(reader.eof());
    assert_eq!(out, (0..1000).collect::<Vec<Sample>>());
    drop(reader);

    // inserted samples show up in the range, the end moves out of it
    let mut reader = track.open_sample_reader(0, 999).unwrap();
    let mut writer = track.open_sample_writer(InsertMode::Insert, 500, 0).unwrap();
    writer.write(&[-1; 10]).unwrap();
    drop(writer);
    assert_eq!(reader.read(&mut out), 1000);
    assert_eq!(out[499], 499);
    assert_eq!(out[500..510], [-1; 10]);
    assert_eq!(out[510], 500);
    assert_eq!(out[999], 989);
    assert_eq!(track.length(), 1010);
}
