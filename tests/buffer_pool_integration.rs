//! Integration tests for the buffer pool.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use blockpool::{BufferPool, BufferPoolConfig, ErrorKind};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::{tempdir, TempDir};

const BLOCK_SIZE: usize = 8;

fn create_file(len: usize) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

fn create_pool(capacity: usize) -> BufferPool {
    BufferPool::new(
        BufferPoolConfig::new()
            .with_block_size(BLOCK_SIZE)
            .with_capacity(capacity),
    )
    .unwrap()
}

/// Data written survives many eviction cycles.
#[test]
fn test_data_persistence_across_evictions() {
    let (_dir, path) = create_file(BLOCK_SIZE * 10);
    let pool = create_pool(2);

    for n in 0..10u64 {
        let block = pool.get_file_block(&path, n).unwrap();
        block.write(&[n as u8; BLOCK_SIZE]).unwrap();
    }

    for n in 0..10u64 {
        let block = pool.get_file_block(&path, n).unwrap();
        assert_eq!(block.read().unwrap(), vec![n as u8; BLOCK_SIZE]);
    }

    assert!(pool.stats().snapshot().evictions >= 8);
}

/// Blocks in two different files never collide.
#[test]
fn test_two_files_distinct_keys() {
    let (dir, path_a) = create_file(BLOCK_SIZE);
    let path_b = dir.path().join("other.bin");
    std::fs::write(&path_b, vec![0xAA; BLOCK_SIZE]).unwrap();
    let pool = create_pool(2);

    let a = pool.get_file_block(&path_a, 0).unwrap();
    let b = pool.get_file_block(&path_b, 0).unwrap();
    assert_ne!(a, b);
    assert_eq!(b.read().unwrap(), vec![0xAA; BLOCK_SIZE]);
    assert_eq!(pool.len(), 2);
}

/// Flush through one pool, reload through a fresh one.
#[test]
fn test_flush_and_reload() {
    let (_dir, path) = create_file(BLOCK_SIZE * 2);
    let data = b"persist!";

    {
        let pool = create_pool(4);
        pool.get_file_block(&path, 1).unwrap().write(data).unwrap();
        pool.flush_all().unwrap();
    }

    {
        let pool = create_pool(4);
        let block = pool.get_file_block(&path, 1).unwrap();
        assert_eq!(block.read().unwrap(), data);
        assert!(!block.is_dirty().unwrap());
    }
}

/// Writing with fsync enabled lands on disk immediately.
#[test]
fn test_sync_on_flush() {
    let (_dir, path) = create_file(BLOCK_SIZE);
    let pool = BufferPool::new(
        BufferPoolConfig::new()
            .with_block_size(BLOCK_SIZE)
            .with_capacity(1)
            .with_sync_on_flush(true),
    )
    .unwrap();

    let block = pool.get_file_block(&path, 0).unwrap();
    block.write(b"synced!!").unwrap();
    block.flush().unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"synced!!");
}

/// Concurrent pinned writers to different blocks.
#[test]
fn test_concurrent_writers() {
    let (_dir, path) = create_file(BLOCK_SIZE * 4);
    let pool = Arc::new(create_pool(4));

    let mut handles = vec![];
    for n in 0..4u64 {
        let pool = Arc::clone(&pool);
        let path = path.clone();
        handles.push(thread::spawn(move || {
            for j in 0..50u8 {
                let block = pool.pin_file_block(&path, n).unwrap();
                block.write(&[j.wrapping_add(n as u8)]).unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    pool.free().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    for n in 0..4usize {
        assert_eq!(bytes[n * BLOCK_SIZE], 49u8.wrapping_add(n as u8));
    }
}

/// Threads that pin every slot make others fail fast instead of blocking.
#[test]
fn test_exhaustion_fails_fast_across_threads() {
    let (_dir, path) = create_file(BLOCK_SIZE * 4);
    let pool = Arc::new(create_pool(1));

    let guard = pool.pin_file_block(&path, 0).unwrap();
    let other = {
        let pool = Arc::clone(&pool);
        let path = path.clone();
        thread::spawn(move || pool.get_file_block(&path, 1).map(|_| ()).unwrap_err().kind())
    };

    assert_eq!(other.join().unwrap(), ErrorKind::ResourceExhausted);
    drop(guard);
    assert!(pool.get_file_block(&path, 1).is_ok());
}

// ============================================================================
// Model-based property test
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Read(u64),
    Write(u64, Vec<u8>),
    Flush(u64),
    Release(u64),
}

fn op_strategy(blocks: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..blocks).prop_map(Op::Read),
        (0..blocks, prop::collection::vec(any::<u8>(), 0..=BLOCK_SIZE))
            .prop_map(|(n, data)| Op::Write(n, data)),
        (0..blocks).prop_map(Op::Flush),
        (0..blocks).prop_map(Op::Release),
    ]
}

/// Apply a write to the in-memory model of the file, respecting EOF.
fn model_write(model: &mut [u8], n: u64, data: &[u8]) {
    let start = n as usize * BLOCK_SIZE;
    let end = (start + data.len()).min(model.len());
    if start < end {
        model[start..end].copy_from_slice(&data[..end - start]);
    }
}

fn model_block(model: &[u8], n: u64) -> Vec<u8> {
    let start = (n as usize * BLOCK_SIZE).min(model.len());
    let end = (start + BLOCK_SIZE).min(model.len());
    model[start..end].to_vec()
}

fn check_file(path: &Path, model: &[u8]) {
    assert_eq!(std::fs::read(path).unwrap(), model);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever mix of operations and evictions happens, reads always see the
    /// latest write, and after `free` the file matches the model exactly.
    #[test]
    fn prop_pool_matches_model(
        file_len in 1usize..(BLOCK_SIZE * 6),
        capacity in 1usize..4,
        ops in prop::collection::vec(op_strategy(7), 1..60),
    ) {
        let (_dir, path) = create_file(file_len);
        let mut model = std::fs::read(&path).unwrap();
        let pool = create_pool(capacity);

        for op in ops {
            match op {
                Op::Read(n) => {
                    let block = pool.get_file_block(&path, n).unwrap();
                    prop_assert_eq!(block.read().unwrap(), model_block(&model, n));
                }
                Op::Write(n, data) => {
                    let block = pool.get_file_block(&path, n).unwrap();
                    block.write(&data).unwrap();
                    model_write(&mut model, n, &data);
                    prop_assert!(block.is_dirty().unwrap());
                }
                Op::Flush(n) => {
                    pool.flush_block(&path, n).unwrap();
                }
                Op::Release(n) => {
                    let block = pool.get_file_block(&path, n).unwrap();
                    block.release().unwrap();
                    prop_assert!(!pool.contains(&path, n));
                    // other blocks may still be dirty; only this one is on disk
                    let on_disk = std::fs::read(&path).unwrap();
                    prop_assert_eq!(model_block(&on_disk, n), model_block(&model, n));
                }
            }
            prop_assert!(pool.len() <= capacity);
        }

        pool.free().unwrap();
        check_file(&path, &model);
    }
}
