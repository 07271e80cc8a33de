//! Property tests for patch application on resource containers.
//!
//! Splices in one patch are interpreted against the container as it was
//! before the patch. These tests compare `apply_patch` against an independent
//! left-to-right rebuild that walks the original collection once.

use labplan_resource::{
    EquipmentLease, Resource, ResourceContainer, ResourceError, ResourceKind, ResourcePatch,
    ResourceSplice,
};
use proptest::prelude::*;

const KIND: ResourceKind = ResourceKind::EquipmentLease;

fn lease(n: u32) -> Resource {
    EquipmentLease::new(format!("L{n}")).into()
}

fn container(len: u32) -> ResourceContainer {
    ResourceContainer::from_resources(None, (0..len).map(lease))
}

/// Rebuild by walking the original collection and emitting each splice in turn.
fn reference(original: &[String], splices: &[(usize, usize, Vec<u32>)]) -> Vec<String> {
    let mut sorted = splices.to_vec();
    sorted.sort_by_key(|s| s.0);
    let mut out = Vec::new();
    let mut cursor = 0;
    for (start, end, items) in sorted {
        out.extend_from_slice(&original[cursor..start]);
        out.extend(items.into_iter().map(|n| format!("L{n}")));
        cursor = end;
    }
    out.extend_from_slice(&original[cursor..]);
    out
}

/// Disjoint splices over a collection of `len`: cut points chosen in order.
fn disjoint_splices(len: usize) -> impl Strategy<Value = Vec<(usize, usize, Vec<u32>)>> {
    proptest::collection::btree_set(0..=len, 0..=4).prop_flat_map(move |points| {
        let points: Vec<usize> = points.into_iter().collect();
        let n = points.len();
        (
            Just(points),
            proptest::collection::vec(0usize..3, n),
            proptest::collection::vec(proptest::collection::vec(100u32..200, 0..3), n),
        )
            .prop_map(move |(points, widths, items)| {
                let mut splices = Vec::new();
                let mut floor = 0;
                for ((start, width), items) in points.into_iter().zip(widths).zip(items) {
                    if start < floor {
                        continue;
                    }
                    let end = (start + width).min(len);
                    // keep the next start strictly past this one
                    floor = end.max(start + 1);
                    splices.push((start, end, items));
                }
                splices
            })
    })
}

proptest! {
    #[test]
    fn apply_matches_left_to_right_rebuild(
        (len, splices) in (0usize..8).prop_flat_map(|len| (Just(len), disjoint_splices(len)))
    ) {
        let base = container(len as u32);
        let original: Vec<String> = base
            .resources(KIND)
            .iter()
            .map(|r| r.name().to_string())
            .collect();

        let mut patch = ResourcePatch::new();
        for (start, end, items) in &splices {
            patch.push(KIND, ResourceSplice {
                start: *start,
                end: Some(*end),
                items: items.iter().copied().map(lease).collect(),
            });
        }

        let next = base.apply_patch(&patch).unwrap();
        let got: Vec<String> = next
            .resources(KIND)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        prop_assert_eq!(got, reference(&original, &splices));

        for (i, r) in next.resources(KIND).iter().enumerate() {
            prop_assert_eq!(r.index(), i);
        }
    }

    #[test]
    fn overlapping_pairs_never_apply(start in 0usize..4, width in 2usize..4, shift in 1usize..2) {
        let base = container(8);
        let patch = ResourcePatch::new()
            .with_splice(KIND, ResourceSplice::delete_range(start, start + width))
            .with_splice(KIND, ResourceSplice::delete_range(start + shift, start + shift + width));
        let overlapping = matches!(
            base.apply_patch(&patch),
            Err(ResourceError::OverlappingSplices { .. })
        );
        prop_assert!(overlapping);
    }
}

#[test]
fn append_and_delete_examples() {
    let two = container(2);

    let append = ResourcePatch::new().with_splice(KIND, ResourceSplice::insert(2, vec![lease(3)]));
    let names: Vec<_> = two
        .apply_patch(&append)
        .unwrap()
        .resources(KIND)
        .iter()
        .map(|r| r.name().to_string())
        .collect();
    assert_eq!(names, vec!["L0", "L1", "L3"]);

    let delete = ResourcePatch::new().with_splice(KIND, ResourceSplice::delete_range(0, 1));
    let after = two.apply_patch(&delete).unwrap();
    assert_eq!(after.resources(KIND)[0].name(), "L1");
}
