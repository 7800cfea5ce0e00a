use chrono::Utc;
use dupetrail::actions::KeepStrategy;
use dupetrail::duplicates::{connected_components, group_by_size};
use dupetrail::hasher::{fast_digest_bytes, fast_digest_reader, strong_digest_bytes, strong_digest_reader};
use dupetrail::model::{FileRecord, PerceptualHash};
use proptest::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

proptest! {
    #[test]
    fn test_chunked_digests_match_in_memory(data in prop::collection::vec(any::<u8>(), 0..200_000)) {
        prop_assert_eq!(fast_digest_reader(Cursor::new(&data)).unwrap(), fast_digest_bytes(&data));
        prop_assert_eq!(strong_digest_reader(Cursor::new(&data)).unwrap(), strong_digest_bytes(&data));
    }

    #[test]
    fn test_fast_digest_is_16_hex_chars(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let digest = fast_digest_bytes(&data);
        prop_assert_eq!(digest.len(), 16);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_group_by_size_invariants(sizes in prop::collection::vec(0u64..50, 0..60), min_size in 0u64..10) {
        let files: Vec<FileRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| FileRecord::new(PathBuf::from(format!("/fake/{i}")), size, Utc::now()))
            .collect();

        let (groups, stats) = group_by_size(files, min_size);
        prop_assert_eq!(stats.total_files, sizes.len());

        let mut grouped = 0;
        for (size, members) in &groups {
            prop_assert!(members.len() >= 2);
            prop_assert!(*size >= min_size);
            for pair in members.windows(2) {
                prop_assert!(pair[0].index < pair[1].index);
            }
            for member in members {
                prop_assert_eq!(member.file.size, *size);
            }
            grouped += members.len();
        }
        let expected = sizes
            .iter()
            .filter(|&&s| s >= min_size && sizes.iter().filter(|&&t| t == s).count() >= 2)
            .count();
        prop_assert_eq!(grouped, expected);
    }

    #[test]
    fn test_components_partition_connected_indices(
        n in 0usize..40,
        edges in prop::collection::vec((0usize..50, 0usize..50), 0..80),
    ) {
        let groups = connected_components(n, edges.iter().copied());

        let mut seen = vec![false; n];
        let mut previous_first = None;
        for group in &groups {
            prop_assert!(group.len() >= 2);
            prop_assert!(group.windows(2).all(|w| w[0] < w[1]));
            if let Some(prev) = previous_first {
                prop_assert!(group[0] > prev);
            }
            previous_first = Some(group[0]);
            for &i in group {
                prop_assert!(!seen[i]);
                seen[i] = true;
            }
        }
        // Every in-range edge joins two members of the same group
        for &(a, b) in edges.iter().filter(|(a, b)| *a < n && *b < n && a != b) {
            let ga = groups.iter().position(|g| g.contains(&a));
            let gb = groups.iter().position(|g| g.contains(&b));
            prop_assert!(ga.is_some());
            prop_assert_eq!(ga, gb);
        }
    }

    #[test]
    fn test_hamming_distance_symmetric_and_bounded(a in any::<u64>(), b in any::<u64>()) {
        let x = PerceptualHash::new(a, "dhash").unwrap();
        let y = PerceptualHash::new(b, "dhash").unwrap();
        let d = x.distance(&y).unwrap();
        prop_assert_eq!(d, y.distance(&x).unwrap());
        prop_assert!(d <= 64);
        prop_assert_eq!(x.distance(&x).unwrap(), 0);
        prop_assert_eq!(d == 0, a == b);
    }

    #[test]
    fn test_keep_strategy_picks_a_member(
        sizes in prop::collection::vec(1u64..5, 2..10),
        strategy in prop::sample::select(KeepStrategy::ALL.to_vec()),
    ) {
        let members: Vec<FileRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, _)| FileRecord::new(PathBuf::from("/d/".to_string() + &"x".repeat(i + 1)), 7, Utc::now()))
            .collect();
        let kept = strategy.select(&members).unwrap();
        prop_assert!(kept < members.len());
        match strategy {
            KeepStrategy::First => prop_assert_eq!(kept, 0),
            KeepStrategy::Shortest => prop_assert_eq!(kept, 0),
            KeepStrategy::Longest => prop_assert_eq!(kept, members.len() - 1),
            KeepStrategy::Oldest | KeepStrategy::Newest => {}
        }
    }
}
