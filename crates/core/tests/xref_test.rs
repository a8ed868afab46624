use folio_core::document::{Location, XrefEntry, XrefResolver};
use folio_core::model::{Dictionary, ObjectKey, Value};
use folio_core::{DiagnosticKind, Diagnostics, PdfError};

fn at(offset: usize) -> XrefEntry {
    XrefEntry::InUse(Location::Offset {
        offset,
        generation: 0,
    })
}

fn trailer(entries: &[(&str, Value)]) -> Option<Dictionary> {
    Some(
        entries
            .iter()
            .map(|(k, v)| ((*k).into(), v.clone()))
            .collect(),
    )
}

#[test]
fn test_newest_fragment_location_wins() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(100, [(5, at(20)), (6, at(60))], trailer(&[]));
    resolver.add_fragment(
        500,
        [(5, at(450))],
        trailer(&[("Prev", Value::Int(100))]),
    );

    let table = resolver.resolve(500, &mut Diagnostics::new()).unwrap();
    assert_eq!(
        table.get(ObjectKey::new(5, 0)),
        Some(Location::Offset {
            offset: 450,
            generation: 0
        })
    );
    // untouched by the update
    assert!(table.contains(ObjectKey::new(6, 0)));
}

#[test]
fn test_trailer_keys_merge_per_key() {
    let root = Value::Reference(ObjectKey::new(1, 0));
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(
        100,
        [(1, at(10))],
        trailer(&[("Root", root.clone()), ("Size", Value::Int(2))]),
    );
    resolver.add_fragment(
        500,
        [(2, at(300))],
        trailer(&[("Prev", Value::Int(100)), ("Size", Value::Int(3))]),
    );

    let table = resolver.resolve(500, &mut Diagnostics::new()).unwrap();
    assert_eq!(table.trailer().get("Root"), Some(&root));
    assert_eq!(table.trailer().get("Size"), Some(&Value::Int(3)));
}

#[test]
fn test_generation_follows_newest_entry() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(100, [(4, at(10))], trailer(&[]));
    resolver.add_fragment(
        200,
        [(
            4,
            XrefEntry::InUse(Location::Offset {
                offset: 150,
                generation: 2,
            }),
        )],
        trailer(&[("Prev", Value::Int(100))]),
    );

    let table = resolver.resolve(200, &mut Diagnostics::new()).unwrap();
    assert!(table.get(ObjectKey::new(4, 0)).is_none());
    assert_eq!(table.key_for_number(4), Some(ObjectKey::new(4, 2)));
}

#[test]
fn test_reuse_after_free() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(100, [(3, at(10))], trailer(&[]));
    resolver.add_fragment(
        200,
        [(
            3,
            XrefEntry::Free {
                next: 0,
                generation: 1,
            },
        )],
        trailer(&[("Prev", Value::Int(100))]),
    );
    resolver.add_fragment(
        300,
        [(
            3,
            XrefEntry::InUse(Location::Offset {
                offset: 250,
                generation: 1,
            }),
        )],
        trailer(&[("Prev", Value::Int(200))]),
    );

    let table = resolver.resolve(300, &mut Diagnostics::new()).unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.contains(ObjectKey::new(3, 1)));
}

#[test]
fn test_missing_primary_merges_everything() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(100, [(1, at(10))], trailer(&[]));
    resolver.add_fragment(400, [(1, at(300)), (2, at(350))], trailer(&[]));

    let mut diags = Diagnostics::new();
    let table = resolver.resolve(999, &mut diags).unwrap();
    assert_eq!(diags.count(DiagnosticKind::XrefPrimaryMissing), 1);
    assert_eq!(
        table.get(ObjectKey::new(1, 0)),
        Some(Location::Offset {
            offset: 300,
            generation: 0
        })
    );
    assert_eq!(table.len(), 2);
}

#[test]
fn test_unreachable_fragment_ignored() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(100, [(1, at(10))], trailer(&[]));
    resolver.add_fragment(200, [(1, at(150))], trailer(&[]));

    let table = resolver.resolve(100, &mut Diagnostics::new()).unwrap();
    assert_eq!(
        table.get(ObjectKey::new(1, 0)),
        Some(Location::Offset {
            offset: 10,
            generation: 0
        })
    );
}

#[test]
fn test_resolve_twice_fails() {
    let mut resolver = XrefResolver::new();
    resolver.add_fragment(0, [(1, at(10))], trailer(&[]));
    resolver.resolve(0, &mut Diagnostics::new()).unwrap();
    assert!(resolver.is_resolved());
    assert!(matches!(
        resolver.resolve(0, &mut Diagnostics::new()),
        Err(PdfError::XrefAlreadyResolved)
    ));
}
