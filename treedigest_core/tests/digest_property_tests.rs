//! Property tests: ring geometry never changes the digest

mod common;

use common::{config, write_file};
use proptest::prelude::*;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use treedigest_core::{BufferTransport, DigestRegistry, end_workers, start_workers};

const ALGORITHMS: &[&str] = &["crc32", "adler32", "md5", "sha1", "blake2s"];

fn transport() -> impl Strategy<Value = BufferTransport> {
    prop_oneof![Just(BufferTransport::Shared), Just(BufferTransport::Inline)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_pipeline_matches_one_shot(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        max_buffers in 1usize..6,
        block_size in 1usize..700,
        max_concurrent_jobs in 1usize..6,
        transport in transport(),
    ) {
        let runtime = Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let path = write_file(&temp_dir, "input.bin", &data);
        let registry = DigestRegistry::builtin();

        let mut cfg = config(ALGORITHMS, max_buffers, block_size, transport);
        cfg.max_concurrent_jobs = max_concurrent_jobs;

        let (digest, stats) = runtime.block_on(async {
            let mut pool = start_workers(&cfg, &registry).unwrap();
            let digest = pool.digest_file(&path).await.unwrap().unwrap();
            (digest, end_workers(pool).await.unwrap())
        });

        let expected_blocks = if data.is_empty() {
            1
        } else {
            data.len().div_ceil(block_size)
        };
        prop_assert_eq!(digest.bytes_read, data.len() as u64);
        prop_assert_eq!(digest.blocks, expected_blocks as u64);
        prop_assert!(stats.peak_buffers_in_use <= max_buffers);

        for name in ALGORITHMS {
            prop_assert_eq!(&digest.digests[*name], &registry.hash_bytes(name, &data).unwrap());
        }
    }
}
