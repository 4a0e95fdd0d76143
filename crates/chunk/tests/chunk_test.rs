//! Chunk lifecycle tests: fill, read back, persist and restore.

use alopex_chunk::{
    AppendStatus, Chunk, ChunkError, RunningStatistics, Sample, CHUNK_HEADER_SIZE,
};
use proptest::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use tempfile::TempDir;

/// Generate a regular series with slowly varying values.
fn generate_series(id: u64, count: u64) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let value = 50.0 + (i % 10) as f64;
            Sample::new(id, 1_000_000 + i * 100, value, (i % 4) as u32)
        })
        .collect()
}

fn fill(chunk: &mut Chunk, samples: &[Sample]) -> usize {
    let mut stored = 0;
    for sample in samples {
        match chunk.append(sample).unwrap() {
            AppendStatus::Written => stored += 1,
            AppendStatus::Full => break,
        }
    }
    stored
}

#[test]
fn test_fill_read_back() {
    let samples = generate_series(1, 10_000);
    let mut chunk = Chunk::new(1, 512);
    let stored = fill(&mut chunk, &samples);

    assert!(chunk.is_full());
    assert!(stored > 50, "only {} samples fit", stored);
    assert_eq!(chunk.count() as usize, stored);
    assert_eq!(chunk.min_time(), samples[0].time);
    assert_eq!(chunk.max_time(), samples[stored - 1].time);

    let read: Vec<Sample> = chunk.reader().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(read, &samples[..stored]);
}

#[test]
fn test_fullness_is_monotonic() {
    let samples = generate_series(2, 1_000);
    let mut chunk = Chunk::new(2, 32);
    let mut seen_full = false;
    for sample in &samples {
        let was_full = chunk.is_full();
        let status = chunk.append(sample).unwrap();
        if was_full {
            assert_eq!(status, AppendStatus::Full);
        }
        if status == AppendStatus::Full {
            assert!(chunk.is_full());
            seen_full = true;
        }
        if seen_full {
            assert!(chunk.is_full());
        }
    }
    assert!(seen_full);
}

#[test]
fn test_statistics_track_samples() {
    let samples = generate_series(3, 50);
    let mut chunk = Chunk::new(3, 1024);
    assert_eq!(fill(&mut chunk, &samples), 50);

    let stats = chunk.stats();
    assert_eq!(stats.count, 50);
    assert_eq!(stats.min_time, samples[0].time);
    assert_eq!(stats.max_time, samples[49].time);
    assert_eq!(stats.min_value, 50.0);
    assert_eq!(stats.max_value, 59.0);
    assert_eq!(stats.sum, samples.iter().map(|s| s.value).sum::<f64>());
    for flag in 0..4 {
        assert!(chunk.check_flag(flag));
    }
}

#[test]
fn test_reader_past_count() {
    let mut chunk = Chunk::new(4, 64);
    fill(&mut chunk, &generate_series(4, 3));
    let mut reader = chunk.reader().unwrap();
    for _ in 0..3 {
        reader.read_next().unwrap();
    }
    assert!(matches!(
        reader.read_next(),
        Err(ChunkError::ReadPastCount { count: 3 })
    ));
}

#[test]
fn test_out_of_order_sample_rejected() {
    let mut chunk = Chunk::new(5, 64);
    chunk.append(&Sample::new(5, 2_000, 1.0, 0)).unwrap();
    let err = chunk.append(&Sample::new(5, 1_000, 1.0, 0)).unwrap_err();
    assert!(matches!(
        err,
        ChunkError::DeltaOutOfRange {
            previous: 2_000,
            current: 1_000
        }
    ));
    assert_eq!(chunk.count(), 1);
}

#[test]
fn test_persist_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chunks.bin");

    let mut chunks = Vec::new();
    for id in 0..4u64 {
        let mut chunk = Chunk::new(id, 256);
        fill(&mut chunk, &generate_series(id, 100 + id * 10));
        chunks.push(chunk);
    }

    {
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        for chunk in &chunks {
            chunk.write_to(&mut writer).unwrap();
        }
        writer.flush().unwrap();
    }

    let len = std::fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(len, 4 * (CHUNK_HEADER_SIZE + 256));

    let mut reader = BufReader::new(File::open(&path).unwrap());
    for original in &chunks {
        let restored = Chunk::read_from(&mut reader).unwrap();
        assert!(restored.is_closed());
        assert!(!restored.is_arena_backed());
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.is_full(), original.is_full());
        assert_eq!(restored.stats(), original.stats());
        assert_eq!(restored.last(), original.last());
        assert_eq!(restored.read_all().unwrap(), original.read_all().unwrap());

        let mut restored = restored;
        let next = Sample::new(original.id(), original.max_time() + 1, 0.0, 0);
        assert_eq!(restored.append(&next).unwrap(), AppendStatus::Full);
    }
}

#[test]
fn test_truncated_file_is_io_error() {
    let mut chunk = Chunk::new(1, 64);
    fill(&mut chunk, &generate_series(1, 5));
    let mut bytes = Vec::new();
    chunk.write_to(&mut bytes).unwrap();
    bytes.truncate(CHUNK_HEADER_SIZE + 10);

    assert!(matches!(
        Chunk::read_from(&mut &bytes[..]),
        Err(ChunkError::IoError(_))
    ));
}

proptest! {
    /// Statistics of a range equal the merge of per-chunk statistics.
    #[test]
    fn test_chunk_stats_merge_proptest(
        values in prop::collection::vec(-1000i32..1000, 1..300),
        buffer_size in 16usize..128,
    ) {
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(9, i as u64 * 10, v as f64, (v & 7) as u32))
            .collect();

        let mut chunks = vec![Chunk::new(9, buffer_size)];
        for sample in &samples {
            let status = chunks.last_mut().unwrap().append(sample).unwrap();
            if status == AppendStatus::Full {
                let mut next = Chunk::new(9, buffer_size);
                prop_assert!(next.append(sample).unwrap().is_written());
                chunks.push(next);
            }
        }

        let mut expected = RunningStatistics::new();
        samples.iter().for_each(|s| expected.update(s));

        let merged = RunningStatistics::merged(chunks.iter().map(Chunk::stats));
        prop_assert_eq!(merged, expected);

        let read: Vec<Sample> = chunks
            .iter()
            .flat_map(|c| c.read_all().unwrap())
            .collect();
        prop_assert_eq!(read, samples);
    }
}
