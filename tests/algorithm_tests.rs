mod common;

use common::*;
use flat_forward_list::{FlatForwardList, FlatListRead};

fn by_kind(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    record_kind(a).cmp(&record_kind(b))
}

fn list_from(records: &[(u32, &str)]) -> FlatForwardList<Record> {
    let mut list = FlatForwardList::new();
    for (kind, payload) in records {
        list.push_back(&record(*kind, payload.as_bytes())).unwrap();
    }
    list
}

fn payload_strings(list: &FlatForwardList<Record>) -> Vec<String> {
    list.iter()
        .map(|e| String::from_utf8(record_payload(e).to_vec()).unwrap())
        .collect()
}

#[test]
fn test_sort_is_stable() {
    let mut list = list_from(&[(3, "ccc"), (1, "a"), (2, "bb"), (1, "z")]);
    list.sort(by_kind).unwrap();

    assert_eq!(record_kinds(&list), vec![1, 1, 2, 3]);
    assert_eq!(payload_strings(&list), vec!["a", "z", "bb", "ccc"]);
    assert_well_formed(&list);
}

#[test]
fn test_sort_keeps_capacity() {
    let mut list = FlatForwardList::<Record>::with_capacity(256).unwrap();
    for kind in [5, 4, 3, 2, 1] {
        list.push_back(&record(kind, b"payload")).unwrap();
    }
    list.sort(by_kind).unwrap();

    assert_eq!(record_kinds(&list), vec![1, 2, 3, 4, 5]);
    assert_eq!(list.total_capacity(), 256);
    assert_well_formed(&list);
}

#[test]
fn test_sort_descending() {
    let mut list = list_from(&[(1, ""), (3, "three"), (2, "")]);
    list.sort(|a, b| by_kind(b, a)).unwrap();
    assert_eq!(record_kinds(&list), vec![3, 2, 1]);
}

#[test]
fn test_sort_trivial_lists() {
    let mut empty = FlatForwardList::<Record>::new();
    empty.sort(by_kind).unwrap();
    assert!(empty.is_empty());

    let mut single = list_from(&[(1, "x")]);
    single.sort(by_kind).unwrap();
    assert_eq!(record_kinds(&single), vec![1]);
}

#[test]
fn test_reverse() {
    let mut list = list_from(&[(1, "a"), (2, "bcdef"), (3, "")]);
    list.reverse().unwrap();

    assert_eq!(record_kinds(&list), vec![3, 2, 1]);
    assert_eq!(payload_strings(&list), vec!["", "bcdef", "a"]);
    assert_well_formed(&list);
}

#[test]
fn test_merge() {
    let mut ours = list_from(&[(1, "ours"), (3, "ours"), (5, "ours")]);
    let mut theirs = list_from(&[(2, "theirs"), (3, "theirs"), (4, "theirs")]);
    let their_capacity = theirs.total_capacity();

    ours.merge(&mut theirs, by_kind).unwrap();

    assert_eq!(record_kinds(&ours), vec![1, 2, 3, 3, 4, 5]);
    assert_eq!(
        payload_strings(&ours),
        vec!["ours", "theirs", "ours", "theirs", "theirs", "ours"]
    );
    assert_well_formed(&ours);

    assert!(theirs.is_empty());
    assert_eq!(theirs.total_capacity(), their_capacity);
}

#[test]
fn test_merge_into_empty_list() {
    let mut ours = FlatForwardList::<Record>::new();
    let mut theirs = list_from(&[(1, ""), (2, "")]);
    ours.merge(&mut theirs, by_kind).unwrap();

    assert_eq!(record_kinds(&ours), vec![1, 2]);
    assert!(theirs.is_empty());
}

#[test]
fn test_merge_with_empty_list() {
    let mut ours = list_from(&[(1, ""), (2, "")]);
    let mut theirs = FlatForwardList::<Record>::new();
    ours.merge(&mut theirs, by_kind).unwrap();
    assert_eq!(record_kinds(&ours), vec![1, 2]);
}

#[test]
fn test_merge_allocation_failure() {
    let allocator = TrackingAllocator::new();
    let mut ours = FlatForwardList::<Record, _>::new_in(allocator.clone());
    let mut theirs = FlatForwardList::<Record, _>::new_in(allocator.clone());
    ours.push_back(&record(1, b"")).unwrap();
    theirs.push_back(&record(2, b"")).unwrap();

    allocator.fail_next();
    assert!(ours.merge(&mut theirs, by_kind).is_err());
    assert_eq!(record_kinds(&ours), vec![1]);
    assert_eq!(record_kinds(&theirs), vec![2]);
    assert_eq!(allocator.live(), 2);
}

#[test]
fn test_unique() {
    let mut list = list_from(&[
        (1, "a"),
        (1, "b"),
        (2, "c"),
        (2, "d"),
        (2, "e"),
        (3, "f"),
        (1, "g"),
    ]);
    let removed = list.unique(|a, b| record_kind(a) == record_kind(b));

    assert_eq!(removed, 3);
    assert_eq!(record_kinds(&list), vec![1, 2, 3, 1]);
    assert_eq!(payload_strings(&list), vec!["a", "c", "f", "g"]);
    assert_well_formed(&list);
}

#[test]
fn test_unique_trailing_run() {
    let mut list = list_from(&[(1, ""), (2, ""), (2, "")]);
    assert_eq!(list.unique(|a, b| record_kind(a) == record_kind(b)), 1);
    assert_eq!(record_kinds(&list), vec![1, 2]);
    assert_eq!(record_link(list.back().unwrap()), 0);
}

#[test]
fn test_remove_if() {
    let mut list = list_from(&[(1, ""), (2, ""), (3, ""), (4, ""), (5, "")]);
    let removed = list.remove_if(|e| record_kind(e) % 2 == 0);

    assert_eq!(removed, 2);
    assert_eq!(record_kinds(&list), vec![1, 3, 5]);
    assert_well_formed(&list);
}

#[test]
fn test_remove_if_tests_each_record_once() {
    let mut list = list_from(&[(1, ""), (2, ""), (4, ""), (5, ""), (6, ""), (7, "")]);
    let mut seen = Vec::new();
    let removed = list.remove_if(|e| {
        seen.push(record_kind(e));
        record_kind(e) % 2 == 0
    });

    assert_eq!(removed, 3);
    assert_eq!(seen, vec![1, 2, 4, 5, 6, 7]);
    assert_eq!(record_kinds(&list), vec![1, 5, 7]);
    assert_well_formed(&list);
}

#[test]
fn test_remove_if_tail_and_everything() {
    let mut list = list_from(&[(1, ""), (2, ""), (4, "")]);
    assert_eq!(list.remove_if(|e| record_kind(e) % 2 == 0), 2);
    assert_eq!(record_kinds(&list), vec![1]);
    assert_eq!(record_link(list.front().unwrap()), 0);

    let mut list = list_from(&[(2, ""), (4, "")]);
    assert_eq!(list.remove_if(|_| true), 2);
    assert!(list.is_empty());
    assert!(list.total_capacity() > 0);
}

#[test]
fn test_sized_records_sort_and_reverse() {
    let mut list = FlatForwardList::<Tlv>::new();
    list.push_back(&tlv(3, b"three")).unwrap();
    list.push_back(&tlv(1, b"one")).unwrap();
    list.push_back(&tlv(2, b"")).unwrap();

    list.sort(|a, b| tlv_kind(a).cmp(&tlv_kind(b))).unwrap();
    assert_eq!(tlv_kinds(&list), vec![1, 2, 3]);
    assert_well_formed(&list);

    list.reverse().unwrap();
    assert_eq!(tlv_kinds(&list), vec![3, 2, 1]);
    assert_well_formed(&list);
}
