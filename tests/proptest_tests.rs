//! Property-based tests using proptest.
//!
//! These tests verify invariants of the scratch buffer, the writer source and
//! archive path sanitizing using randomly generated inputs.

use proptest::prelude::*;
use zipstage::source::STAT_RECORD_LEN;
use zipstage::{ArchivePath, DataSource, EntryWriter, ScratchBuffer, SourceCommand, StatRecord};

/// Strategy for a sequence of non-empty chunks.
fn chunks_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..512), 0..16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Appends followed by reads reproduce the bytes in order, and `avail`
    /// strictly decreases to 0.
    #[test]
    fn scratch_buffer_is_fifo(chunks in chunks_strategy(), read_size in 1usize..300) {
        let mut scratch = ScratchBuffer::new().unwrap();
        let mut expected = Vec::new();
        for chunk in &chunks {
            scratch.append(chunk).unwrap();
            expected.extend_from_slice(chunk);
        }
        prop_assert_eq!(scratch.size(), expected.len() as u64);

        let mut out = Vec::new();
        let mut buf = vec![0u8; read_size];
        let mut last_avail = scratch.avail();
        loop {
            let n = scratch.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
            prop_assert!(scratch.avail() < last_avail);
            last_avail = scratch.avail();
        }
        prop_assert_eq!(scratch.avail(), 0);
        prop_assert_eq!(out, expected);
    }

    /// Interleaved appends and reads never lose or reorder bytes.
    #[test]
    fn scratch_buffer_interleaved(chunks in chunks_strategy(), read_size in 1usize..64) {
        let mut scratch = ScratchBuffer::new().unwrap();
        let mut expected = Vec::new();
        let mut out = Vec::new();
        let mut buf = vec![0u8; read_size];

        for chunk in &chunks {
            scratch.append(chunk).unwrap();
            expected.extend_from_slice(chunk);
            let n = scratch.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
            prop_assert_eq!(scratch.position() + scratch.avail(), scratch.size());
        }
        loop {
            let n = scratch.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        prop_assert_eq!(out, expected);
    }

    /// STAT reports the bytes appended so far, independent of reads.
    #[test]
    fn stat_size_tracks_appends(chunks in chunks_strategy(), reads in 0usize..4) {
        let path = ArchivePath::new("p.bin").unwrap();
        let (mut writer, mut source) = EntryWriter::with_source(path, true, None).unwrap();
        let mut appended = 0u64;
        let mut buf = [0u8; 37];

        for chunk in &chunks {
            writer.write(chunk).unwrap();
            appended += chunk.len() as u64;
            for _ in 0..reads {
                source.call(&mut buf, SourceCommand::Read).unwrap();
            }

            let mut record = [0u8; STAT_RECORD_LEN];
            source.call(&mut record, SourceCommand::Stat).unwrap();
            prop_assert_eq!(StatRecord::decode(&record).unwrap().size, appended);
        }
        source.call(&mut [], SourceCommand::Free).unwrap();
    }

    /// Sanitized paths are always accepted by the strict constructor.
    #[test]
    fn sanitized_paths_are_valid(raw in "[a-z./\\\\]{0,24}") {
        if let Ok(path) = ArchivePath::sanitized(&raw) {
            prop_assert!(ArchivePath::new(path.as_str()).is_ok());
            prop_assert!(!path.as_str().contains('\\'));
        }
    }
}
